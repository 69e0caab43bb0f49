//! NMEA 0183 receiver, GGA and RMC only.

use std::collections::VecDeque;

use heapless::Vec;

use crate::{error::GpsError, sensors::PositionSource, telemetry::PositionData};

/// Longest sentence NMEA allows is 82 characters.
pub const MAX_SENTENCE_LEN: usize = 96;

pub fn validate_checksum(line: &[u8]) -> bool {
    let mut parts = line.split(|&b| b == b'*');
    let payload = parts.next().unwrap_or(&[]);
    let checksum_hex = parts.next().unwrap_or(&[]);
    if payload.is_empty() || checksum_hex.len() < 2 {
        return false;
    }

    let payload = payload.strip_prefix(b"$").unwrap_or(payload);
    let provided = core::str::from_utf8(&checksum_hex[..2])
        .ok()
        .and_then(|s| u8::from_str_radix(s, 16).ok());

    provided == Some(nmea_checksum(payload))
}

/// XOR of every byte between `$` and `*`.
pub fn nmea_checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0, |acc, b| acc ^ b)
}

/// Assembles bytes into sentences and keeps the latest fix.
#[derive(Debug, Default)]
pub struct NmeaParser {
    line: Vec<u8, MAX_SENTENCE_LEN>,
    overflowed: bool,
    fix: PositionData,
    has_fix: bool,
}

impl NmeaParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte. Returns the outcome once a line is complete.
    pub fn feed(&mut self, byte: u8) -> Option<Result<(), GpsError>> {
        match byte {
            b'\r' | b'\n' => {
                if self.line.is_empty() {
                    return None;
                }
                let result = if self.overflowed {
                    Err(GpsError::InvalidData)
                } else {
                    let line = self.line.clone();
                    self.process_line(&line)
                };
                self.line.clear();
                self.overflowed = false;
                Some(result)
            }
            b'$' => {
                // a new sentence always restarts the buffer
                self.line.clear();
                self.overflowed = false;
                let _ = self.line.push(byte);
                None
            }
            _ => {
                if self.line.push(byte).is_err() {
                    self.overflowed = true;
                }
                None
            }
        }
    }

    pub fn process_line(&mut self, line: &[u8]) -> Result<(), GpsError> {
        if !validate_checksum(line) {
            return Err(GpsError::InvalidChecksum);
        }
        let Ok(sentence) = core::str::from_utf8(line) else {
            return Err(GpsError::InvalidData);
        };

        let body = sentence.split('*').next().unwrap_or("");
        let fields: Vec<&str, 24> = body.split(',').take(24).collect();

        match fields.first().copied() {
            Some("$GPGGA" | "$GNGGA") => self.process_gga(&fields),
            Some("$GPRMC" | "$GNRMC") => self.process_rmc(&fields),
            Some(_) => Ok(()),
            None => Err(GpsError::InvalidData),
        }
    }

    fn process_gga(&mut self, fields: &[&str]) -> Result<(), GpsError> {
        if fields.len() < 10 {
            return Err(GpsError::InvalidData);
        }

        if let Some((hour, minute, second)) = parse_time(fields[1]) {
            self.fix.hour = hour;
            self.fix.minute = minute;
            self.fix.second = second;
        }

        let quality = fields[6];
        self.has_fix = !quality.is_empty() && quality != "0";
        if !self.has_fix {
            return Ok(());
        }

        self.fix.latitude = parse_degrees(fields[2], fields[3]).ok_or(GpsError::InvalidData)?;
        self.fix.longitude = parse_degrees(fields[4], fields[5]).ok_or(GpsError::InvalidData)?;
        self.fix.altitude = fields[9].parse().unwrap_or(self.fix.altitude);
        Ok(())
    }

    fn process_rmc(&mut self, fields: &[&str]) -> Result<(), GpsError> {
        if fields.len() < 10 {
            return Err(GpsError::InvalidData);
        }

        if let Some((hour, minute, second)) = parse_time(fields[1]) {
            self.fix.hour = hour;
            self.fix.minute = minute;
            self.fix.second = second;
        }
        if let Some((day, month, year)) = parse_date(fields[9]) {
            self.fix.day = day;
            self.fix.month = month;
            self.fix.year = year;
        }
        Ok(())
    }

    /// Latest fix, `None` until the receiver reports one.
    pub fn position(&self) -> Option<PositionData> {
        self.has_fix.then_some(self.fix)
    }
}

/// `ddmm.mmmm` plus hemisphere to signed decimal degrees.
fn parse_degrees(raw: &str, hemisphere: &str) -> Option<f32> {
    let value: f64 = raw.parse().ok()?;
    let degrees = (value / 100.0).trunc();
    let decimal = degrees + (value - degrees * 100.0) / 60.0;

    match hemisphere {
        "N" | "E" => Some(decimal as f32),
        "S" | "W" => Some(-decimal as f32),
        _ => None,
    }
}

/// `hhmmss[.ss]`
fn parse_time(raw: &str) -> Option<(i32, i32, i32)> {
    Some((
        raw.get(0..2)?.parse().ok()?,
        raw.get(2..4)?.parse().ok()?,
        raw.get(4..6)?.parse().ok()?,
    ))
}

/// `ddmmyy`
fn parse_date(raw: &str) -> Option<(i32, i32, i32)> {
    let year: i32 = raw.get(4..6)?.parse().ok()?;
    Some((
        raw.get(0..2)?.parse().ok()?,
        raw.get(2..4)?.parse().ok()?,
        2000 + year,
    ))
}

/// Non-blocking byte source, the receiver's UART.
pub trait SerialSource {
    /// Copies whatever is buffered into `buf`, returning the count.
    fn read_available(&mut self, buf: &mut [u8]) -> usize;
}

impl SerialSource for VecDeque<u8> {
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        let count = buf.len().min(self.len());
        for (slot, byte) in buf.iter_mut().zip(self.drain(..count)) {
            *slot = byte;
        }
        count
    }
}

#[cfg(target_os = "espidf")]
impl SerialSource for esp_idf_hal::uart::UartDriver<'_> {
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        self.read(buf, esp_idf_hal::delay::NON_BLOCK).unwrap_or(0)
    }
}

pub struct Gps<S> {
    source: S,
    parser: NmeaParser,
}

impl<S: SerialSource> Gps<S> {
    pub fn new(source: S) -> Self {
        Gps {
            source,
            parser: NmeaParser::new(),
        }
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Drains the source into the parser.
    pub fn poll(&mut self) {
        let mut buf = [0u8; 64];
        loop {
            let count = self.source.read_available(&mut buf);
            if count == 0 {
                break;
            }
            for byte in &buf[..count] {
                if let Some(Err(e)) = self.parser.feed(*byte) {
                    log::debug!("skipping NMEA sentence: {}", e);
                }
            }
        }
    }
}

impl<S: SerialSource> PositionSource for Gps<S> {
    fn position(&mut self) -> Option<PositionData> {
        self.poll();
        self.parser.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GGA: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
    const RMC: &[u8] =
        b"$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";

    fn sentence(body: &str) -> std::string::String {
        format!("${}*{:02X}", body, nmea_checksum(body.as_bytes()))
    }

    #[test]
    fn test_validate_checksum() {
        assert!(validate_checksum(GGA));
        assert!(validate_checksum(RMC));
        assert!(!validate_checksum(b"$GPGGA,123519*00"));
        assert!(!validate_checksum(b"$GPGGA,123519"));
    }

    #[test]
    fn test_process_gga() {
        let mut parser = NmeaParser::new();
        parser.process_line(GGA).unwrap();

        let fix = parser.position().unwrap();
        assert!((fix.latitude - 48.1173).abs() < 1e-4);
        assert!((fix.longitude - 11.516_667).abs() < 1e-4);
        assert_eq!(fix.altitude, 545.4);
        assert_eq!((fix.hour, fix.minute, fix.second), (12, 35, 19));
    }

    #[test]
    fn rmc_sets_date() {
        let mut parser = NmeaParser::new();
        parser.process_line(GGA).unwrap();
        parser.process_line(RMC).unwrap();

        let fix = parser.position().unwrap();
        assert_eq!((fix.day, fix.month, fix.year), (23, 3, 2094));
    }

    #[test]
    fn southern_and_western_hemispheres_are_negative() {
        let line = sentence("GNGGA,131500.00,1547.634,S,04752.968,W,1,07,1.1,1172.0,M,,M,,");
        let mut parser = NmeaParser::new();
        parser.process_line(line.as_bytes()).unwrap();

        let fix = parser.position().unwrap();
        assert!((fix.latitude + 15.7939).abs() < 1e-4, "{}", fix.latitude);
        assert!((fix.longitude + 47.8828).abs() < 1e-4, "{}", fix.longitude);
    }

    #[test]
    fn no_fix_reports_none() {
        let line = sentence("GPGGA,123519,,,,,0,00,,,M,,M,,");
        let mut parser = NmeaParser::new();
        parser.process_line(line.as_bytes()).unwrap();
        assert_eq!(parser.position(), None);
    }

    #[test]
    fn corrupted_sentence_is_rejected() {
        let mut line = GGA.to_vec();
        line[10] = b'9';
        let mut parser = NmeaParser::new();
        assert_eq!(parser.process_line(&line), Err(GpsError::InvalidChecksum));
        assert_eq!(parser.position(), None);
    }

    #[test]
    fn bytes_are_assembled_into_sentences() {
        let mut parser = NmeaParser::new();
        let mut outcomes = std::vec::Vec::new();
        for byte in b"noise\r\n".iter().chain(GGA).chain(b"\r\n") {
            if let Some(outcome) = parser.feed(*byte) {
                outcomes.push(outcome);
            }
        }

        assert_eq!(outcomes.last(), Some(&Ok(())));
        assert!(parser.position().is_some());
    }

    #[test]
    fn overlong_lines_are_dropped() {
        let mut parser = NmeaParser::new();
        let mut last = None;
        for _ in 0..MAX_SENTENCE_LEN + 10 {
            parser.feed(b'A');
        }
        for byte in b"\n" {
            last = parser.feed(*byte);
        }
        assert_eq!(last, Some(Err(GpsError::InvalidData)));
    }

    #[test]
    fn gps_polls_its_source() {
        let mut source = VecDeque::new();
        source.extend(GGA.iter().copied());
        source.extend(b"\r\n".iter().copied());

        let mut gps = Gps::new(source);
        assert!(gps.position().is_some());
        assert!(gps.source_mut().is_empty());
    }
}
