use crate::config::FusionConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Attitude {
    /// degrees
    pub pitch: f32,
    /// degrees
    pub roll: f32,
}

/// Orientation implied by gravity alone. `accel` in m/s² (any consistent
/// unit works).
pub fn static_attitude(accel: [f32; 3]) -> Attitude {
    let [ax, ay, az] = accel;
    Attitude {
        pitch: ay.atan2((ax * ax + az * az).sqrt()).to_degrees(),
        roll: (-ax).atan2(az).to_degrees(),
    }
}

#[derive(Debug, Clone)]
pub struct ComplementaryFilter {
    alpha: f32,
    attitude: Attitude,
    last_update_ms: Option<u32>,
}

impl ComplementaryFilter {
    pub fn new(config: FusionConfig) -> Self {
        ComplementaryFilter {
            alpha: config.alpha,
            attitude: Attitude::default(),
            last_update_ms: None,
        }
    }

    pub fn attitude(&self) -> Attitude {
        self.attitude
    }

    /// `true` once a previous sample exists to derive `dt` from.
    pub fn is_primed(&self) -> bool {
        self.last_update_ms.is_some()
    }

    /// Feeds one sample. `gyro` is in deg/s and `now_ms` is device time.
    ///
    /// The first call only records the timestamp and returns `None`.
    pub fn update(&mut self, accel: [f32; 3], gyro: [f32; 3], now_ms: u32) -> Option<Attitude> {
        let last_update_ms = self.last_update_ms.replace(now_ms)?;

        let dt = now_ms.wrapping_sub(last_update_ms) as f32 / 1000.0;
        let measured = static_attitude(accel);
        let alpha = self.alpha;

        self.attitude = Attitude {
            pitch: alpha * (self.attitude.pitch + gyro[0] * dt) + (1.0 - alpha) * measured.pitch,
            roll: alpha * (self.attitude.roll + gyro[1] * dt) + (1.0 - alpha) * measured.roll,
        };

        Some(self.attitude)
    }
}
