use std::collections::HashMap;
use std::fmt::Display;

use log::{debug, info, warn};

use super::Feed;

/// Meter type as given by the ESPI `ServiceCategory.kind` code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeterType {
    Electric,
    Gas,
    /// Any other kind code, kept as it appeared in the feed
    Unknown(String),
}

impl MeterType {
    pub fn from_kind(kind: &str) -> MeterType {
        let kind = kind.trim();
        match kind.parse::<i64>() {
            Ok(0) => MeterType::Electric,
            Ok(1) => MeterType::Gas,
            Ok(n) => MeterType::Unknown(n.to_string()),
            Err(_) => MeterType::Unknown(kind.to_string()),
        }
    }

    /// Name of the field that carries the reading value.
    pub fn field_name(&self) -> &'static str {
        match self {
            MeterType::Electric => "watt",
            MeterType::Gas => "ccf",
            MeterType::Unknown(_) => "value",
        }
    }
}

impl Display for MeterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use MeterType::*;
        match self {
            Electric => write!(f, "electric"),
            Gas => write!(f, "gas"),
            Unknown(kind) => write!(f, "unknown_{}", kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meter {
    pub id: String,
    pub meter_type: MeterType,
    /// Title of the descriptor entry, e.g. "Electric"
    pub title: String,
}

/// Build the `meter_id -> Meter` map from the `UsagePoint` entries of the feed.
///
/// Entries without a resolvable `self` link are skipped.  If the same meter id
/// shows up twice the later entry wins.
pub fn classify_meters(feed: &Feed) -> HashMap<String, Meter> {
    let mut meters: HashMap<String, Meter> = HashMap::new();
    for entry in &feed.entries {
        let Some(kind) = entry.service_kind() else {
            continue;
        };
        let Some(meter_id) = entry.usage_point_id() else {
            debug!("Skipping usage point {:?}, no self link to a UsagePoint", entry.title);
            continue;
        };
        let meter_type = MeterType::from_kind(kind);
        if let MeterType::Unknown(_) = meter_type {
            warn!("Meter {} has unrecognized kind {:?}", meter_id, kind);
        }
        let meter = Meter {
            id: meter_id.to_string(),
            meter_type,
            title: entry.title.clone(),
        };
        if let Some(previous) = meters.insert(meter.id.clone(), meter) {
            warn!(
                "Meter {} described more than once, replacing {:?} ({})",
                previous.id, previous.title, previous.meter_type
            );
        }
    }
    info!("Found {} meter(s) in the feed", meters.len());
    meters
}
