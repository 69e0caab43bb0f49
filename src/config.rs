/// Serial console baud rate.
pub const BAUD_RATE: u32 = 115200;

/// Radio channel shared by both units.
pub const ESPNOW_CHANNEL: u8 = 1;

/// Destination of every frame. Both units talk through broadcast.
pub const BROADCAST_ADDRESS: [u8; 6] = [0xFF; 6];

/// Sensor sampling cadence (10 Hz).
pub const SENSOR_READ_INTERVAL_MS: u32 = 100;

/// Telemetry transmission cadence (2 Hz).
pub const TRANSMISSION_INTERVAL_MS: u32 = 500;

/// Weight of gyro integration in the complementary filter.
pub const COMPLEMENTARY_FILTER_ALPHA: f32 = 0.98;

pub const SEA_LEVEL_PRESSURE_HPA: f32 = 1013.25;

/// ADC reference voltage.
pub const ADC_VREF: f32 = 3.3;
/// 10k/10k resistor divider in front of the ADC pin.
pub const ADC_DIVIDER: f32 = 2.0;
/// Full scale of the 12 bit ADC.
pub const ADC_MAX: u16 = 4095;

/// Inbound commands buffered between the receive callback and the loop.
/// Must be a power of two.
pub const COMMAND_QUEUE_DEPTH: usize = 8;

pub const LOG_DIRECTORY: &str = "/sdcard";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkConfig {
    pub channel: u8,
    pub peer_address: [u8; 6],
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            channel: ESPNOW_CHANNEL,
            peer_address: BROADCAST_ADDRESS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateConfig {
    pub sample_interval_ms: u32,
    pub transmit_interval_ms: u32,
}

impl Default for RateConfig {
    fn default() -> Self {
        RateConfig {
            sample_interval_ms: SENSOR_READ_INTERVAL_MS,
            transmit_interval_ms: TRANSMISSION_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    pub alpha: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        FusionConfig {
            alpha: COMPLEMENTARY_FILTER_ALPHA,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerConfig {
    pub vref: f32,
    pub divider: f32,
}

impl Default for PowerConfig {
    fn default() -> Self {
        PowerConfig {
            vref: ADC_VREF,
            divider: ADC_DIVIDER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AltimeterConfig {
    pub sea_level_hpa: f32,
}

impl Default for AltimeterConfig {
    fn default() -> Self {
        AltimeterConfig {
            sea_level_hpa: SEA_LEVEL_PRESSURE_HPA,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Config {
    pub link: LinkConfig,
    pub rates: RateConfig,
    pub fusion: FusionConfig,
    pub power: PowerConfig,
    pub altimeter: AltimeterConfig,
}

impl Config {
    pub fn with_peer_address(mut self, peer_address: [u8; 6]) -> Self {
        self.link.peer_address = peer_address;
        self
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.link.channel = channel;
        self
    }

    pub fn with_sample_interval(mut self, interval_ms: u32) -> Self {
        self.rates.sample_interval_ms = interval_ms;
        self
    }

    pub fn with_transmit_interval(mut self, interval_ms: u32) -> Self {
        self.rates.transmit_interval_ms = interval_ms;
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.fusion.alpha = alpha;
        self
    }

    pub fn with_sea_level_pressure(mut self, sea_level_hpa: f32) -> Self {
        self.altimeter.sea_level_hpa = sea_level_hpa;
        self
    }

    /// Applies `ROCKET_PEER`, `ROCKET_CHANNEL`, `ROCKET_SAMPLE_MS`,
    /// `ROCKET_TRANSMIT_MS`, `ROCKET_ALPHA` and `ROCKET_SEA_LEVEL_HPA`
    /// overrides. Values that do not parse are ignored.
    pub fn with_env_overrides(self) -> Self {
        let mut config = self;
        if let Some(mac) = std::env::var("ROCKET_PEER").ok().and_then(|v| parse_mac(&v)) {
            config = config.with_peer_address(mac);
        }
        if let Some(channel) = env_parse::<u8>("ROCKET_CHANNEL") {
            config = config.with_channel(channel);
        }
        if let Some(ms) = env_u32("ROCKET_SAMPLE_MS") {
            config = config.with_sample_interval(ms);
        }
        if let Some(ms) = env_u32("ROCKET_TRANSMIT_MS") {
            config = config.with_transmit_interval(ms);
        }
        if let Some(alpha) = env_parse::<f32>("ROCKET_ALPHA") {
            config = config.with_alpha(alpha);
        }
        if let Some(hpa) = env_parse::<f32>("ROCKET_SEA_LEVEL_HPA") {
            config = config.with_sea_level_pressure(hpa);
        }
        config
    }
}

pub fn env_u32(key: &str) -> Option<u32> {
    env_parse(key)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

/// Parses `XX:XX:XX:XX:XX:XX`, case insensitive.
pub fn parse_mac(text: &str) -> Option<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = text.trim().split(':');
    for byte in mac.iter_mut() {
        *byte = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    parts.next().is_none().then_some(mac)
}

/// Formats a MAC address as `XX:XX:XX:XX:XX:XX`.
pub fn format_mac(mac: &[u8]) -> heapless::String<18> {
    use core::fmt::Write;

    let mut out = heapless::String::new();
    for (i, byte) in mac.iter().take(6).enumerate() {
        if i > 0 {
            let _ = out.push(':');
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_firmware_constants() {
        let config = Config::default();
        assert_eq!(config.link.channel, 1);
        assert_eq!(config.link.peer_address, [0xFF; 6]);
        assert_eq!(config.rates.sample_interval_ms, 100);
        assert_eq!(config.rates.transmit_interval_ms, 500);
        assert_eq!(config.fusion.alpha, 0.98);
    }

    #[test]
    fn builders_override_single_fields() {
        let config = Config::default()
            .with_channel(6)
            .with_peer_address([0x10, 0x06, 0x1C, 0x69, 0xC1, 0x44])
            .with_sample_interval(20);
        assert_eq!(config.link.channel, 6);
        assert_eq!(config.link.peer_address[5], 0x44);
        assert_eq!(config.rates.sample_interval_ms, 20);
        assert_eq!(config.rates.transmit_interval_ms, 500);
    }

    #[test]
    fn mac_parsing() {
        assert_eq!(
            parse_mac("d4:d4:DA:aa:27:5c"),
            Some([0xD4, 0xD4, 0xDA, 0xAA, 0x27, 0x5C])
        );
        assert_eq!(parse_mac("D4:D4:DA:AA:27"), None);
        assert_eq!(parse_mac("D4:D4:DA:AA:27:5C:00"), None);
        assert_eq!(parse_mac("D4:D4:DA:AA:27:ZZ"), None);
    }

    #[test]
    fn env_overrides_reach_every_section() {
        std::env::set_var("ROCKET_PEER", "10:06:1C:69:C1:44");
        std::env::set_var("ROCKET_CHANNEL", "6");
        std::env::set_var("ROCKET_ALPHA", "0.9");
        std::env::set_var("ROCKET_SEA_LEVEL_HPA", "1020.5");
        let config = Config::default().with_env_overrides();
        for key in ["ROCKET_PEER", "ROCKET_CHANNEL", "ROCKET_ALPHA", "ROCKET_SEA_LEVEL_HPA"] {
            std::env::remove_var(key);
        }

        assert_eq!(config.link.peer_address, [0x10, 0x06, 0x1C, 0x69, 0xC1, 0x44]);
        assert_eq!(config.link.channel, 6);
        assert_eq!(config.fusion.alpha, 0.9);
        assert_eq!(config.altimeter.sea_level_hpa, 1020.5);
    }

    #[test]
    fn mac_formatting() {
        assert_eq!(
            format_mac(&[0xD4, 0xD4, 0xDA, 0xAA, 0x27, 0x5C]).as_str(),
            "D4:D4:DA:AA:27:5C"
        );
    }
}
