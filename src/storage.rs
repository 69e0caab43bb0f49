//! CSV flight log on the SD card (or any directory on the host).

use std::{
    fmt::Write as _,
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::{error::StorageError, flight::FlightLog, telemetry::TelemetryRecord};

const HEADER: &str = "timestamp,acc_x,acc_y,acc_z,gyro_x,gyro_y,gyro_z,temperature,pitch,roll,\
pressure,altitude,voltage_base,voltage_rocket,latitude,longitude,gps_altitude,\
day,month,year,hour,minute,second";

/// `flight_log_NNNNNN.csv`, NNNNNN being device seconds.
pub fn session_file_name(now_ms: u32) -> heapless::String<32> {
    let mut name = heapless::String::new();
    let _ = write!(name, "flight_log_{:06}.csv", now_ms / 1000);
    name
}

pub struct CsvSession {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl CsvSession {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct CsvFlightLog {
    directory: PathBuf,
}

impl CsvFlightLog {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        CsvFlightLog {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl FlightLog for CsvFlightLog {
    type Session = CsvSession;

    fn begin_session(&mut self, now_ms: u32) -> Result<CsvSession, StorageError> {
        let path = self.directory.join(session_file_name(now_ms).as_str());
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", HEADER)?;
        writer.flush()?;

        log::info!("flight log opened at {}", path.display());
        Ok(CsvSession { path, writer })
    }

    fn append_record(
        &mut self,
        session: &mut CsvSession,
        record: &TelemetryRecord,
    ) -> Result<(), StorageError> {
        let m = &record.motion;
        let p = &record.position;
        writeln!(
            session.writer,
            "{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},\
             {:.6},{:.6},{:.2},{},{},{},{},{},{}",
            record.timestamp,
            m.acc_x,
            m.acc_y,
            m.acc_z,
            m.gyro_x,
            m.gyro_y,
            m.gyro_z,
            m.temperature,
            m.pitch,
            m.roll,
            record.pressure.pressure,
            record.pressure.altitude,
            record.power.voltage_base,
            record.power.voltage_rocket,
            p.latitude,
            p.longitude,
            p.altitude,
            p.day,
            p.month,
            p.year,
            p.hour,
            p.minute,
            p.second,
        )?;
        Ok(())
    }

    fn end_session(&mut self, mut session: CsvSession, duration_secs: f32) -> Result<(), StorageError> {
        writeln!(session.writer, "# duration_s,{:.3}", duration_secs)?;
        session.writer.flush()?;
        log::info!("flight log closed at {}", session.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "rocket-telemetry-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn file_name_is_zero_padded_seconds() {
        assert_eq!(session_file_name(0).as_str(), "flight_log_000000.csv");
        assert_eq!(session_file_name(12_345).as_str(), "flight_log_000012.csv");
    }

    #[test]
    fn session_writes_header_rows_and_footer() {
        let dir = scratch_dir("session");
        let mut log = CsvFlightLog::new(&dir);

        let mut session = log.begin_session(7_000).unwrap();
        let path = session.path().to_path_buf();
        assert_eq!(path, dir.join("flight_log_000007.csv"));

        let mut record = TelemetryRecord::default();
        record.timestamp = 7.1;
        record.pressure.altitude = 12.5;
        log.append_record(&mut session, &record).unwrap();
        record.timestamp = 7.2;
        log.append_record(&mut session, &record).unwrap();
        log.end_session(session, 2.5).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: std::vec::Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].starts_with("7.100,"));
        assert_eq!(lines[1].split(',').count(), HEADER.split(',').count());
        assert!(lines[2].starts_with("7.200,"));
        assert_eq!(lines[3], "# duration_s,2.500");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_fails_to_open() {
        let mut log = CsvFlightLog::new(scratch_dir("missing").join("absent"));
        assert!(matches!(
            log.begin_session(0),
            Err(StorageError::Io(std::io::ErrorKind::NotFound))
        ));
    }
}
