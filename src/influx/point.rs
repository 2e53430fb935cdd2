use std::fmt;

use jiff::Zoned;

use crate::config::Config;
use crate::feed::meters::{Meter, MeterType};
use crate::feed::readings::Reading;

/// A value stored in an InfluxDB field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Integer(i64),
    String(String),
}

impl FieldValue {
    /// Integers get the `i` suffix, strings are quoted with `"` and `\` escaped.
    pub fn to_line_protocol(&self) -> String {
        match self {
            FieldValue::Integer(v) => format!("{}i", v),
            FieldValue::String(v) => {
                let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{}\"", escaped)
            }
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_line_protocol())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: Vec<(String, String)>,
    pub fields: Vec<(String, FieldValue)>,
    /// Interval start, whole seconds, in the configured zone
    pub time: Zoned,
}

impl Point {
    /// Civil form of the timestamp, `%Y-%m-%d %H:%M:%S`.
    pub fn civil_time(&self) -> String {
        self.time.strftime("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// One line, tags sorted by key, timestamp in seconds.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape_measurement(&self.measurement);

        let mut sorted_tags: Vec<_> = self.tags.iter().collect();
        sorted_tags.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, value) in sorted_tags {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }

        line.push(' ');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&value.to_line_protocol());
        }

        line.push(' ');
        line.push_str(&self.time.timestamp().as_second().to_string());
        line
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_line_protocol())
    }
}

fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

/// Tag keys, tag values and field keys escape the same three characters.
fn escape_key(s: &str) -> String {
    s.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

/// Turn one reading of `meter` into a point.
pub fn build_point(config: &Config, meter: &Meter, reading: &Reading) -> Point {
    let measurement = match meter.meter_type {
        MeterType::Gas => &config.measurements.gas,
        MeterType::Electric | MeterType::Unknown(_) => &config.measurements.electric,
    };
    let tags = vec![
        ("account".to_string(), config.account.clone()),
        ("meter_type".to_string(), meter.meter_type.to_string()),
        ("meter_id".to_string(), meter.id.clone()),
    ];
    let mut fields = vec![(
        meter.meter_type.field_name().to_string(),
        FieldValue::Integer(reading.value),
    )];
    if let Some(quality) = &reading.quality {
        fields.push(("quality".to_string(), FieldValue::String(quality.clone())));
    }
    Point {
        measurement: measurement.clone(),
        tags,
        fields,
        time: reading.start.to_zoned(config.time_zone.clone()),
    }
}
