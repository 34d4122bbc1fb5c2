//! # Record Parser
//!
//! Extracts the four labeled fields from an assembled frame.
//!
//! Each field is searched independently, so partial frames are fine: a
//! missing label or an unparseable number simply yields a null field.
//!
//! Example frame text:
//!
//! ```text
//! Temperature: 23.4 °C Humidity: 40 % Distance: 120 sm System state: Alarm!!!
//! ```

use std::sync::LazyLock;

use chrono::Local;
use regex::Regex;

use crate::record::SensorRecord;

static TEMPERATURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Temperature:\s*([0-9.]+)").expect("valid pattern"));

static HUMIDITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Humidity:\s*([0-9.]+)").expect("valid pattern"));

static DISTANCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Distance:\s*([0-9.]+)").expect("valid pattern"));

static STATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"System state:\s*([\w! ]+)").expect("valid pattern"));

/// Parse an assembled frame into a record.
///
/// The record is stamped with the wall clock at parse time. Fields whose
/// label is missing, or whose captured text fails numeric parsing, come
/// back as `None`; no frame is ever rejected.
pub fn parse(frame: &str) -> SensorRecord {
    SensorRecord {
        timestamp: Local::now(),
        temperature: capture_number(&TEMPERATURE_RE, frame),
        humidity: capture_number(&HUMIDITY_RE, frame),
        distance: capture_number(&DISTANCE_RE, frame),
        state: capture_state(frame),
    }
}

fn capture_number(re: &Regex, frame: &str) -> Option<f64> {
    re.captures(frame)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

fn capture_state(frame: &str) -> Option<String> {
    STATE_RE
        .captures(frame)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}
