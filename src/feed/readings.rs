use std::collections::HashMap;

use jiff::Timestamp;
use log::{debug, info, warn};

use super::meters::Meter;
use super::{Feed, IntervalReading};
use crate::error::Error;

/// One validated interval reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    /// Start of the interval, whole seconds
    pub start: Timestamp,
    pub value: i64,
    pub quality: Option<String>,
}

/// All readings of one meter, in feed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterReadings {
    pub meter: Meter,
    pub readings: Vec<Reading>,
}

/// Collect the interval readings of every classified meter.
///
/// Meters come out in the order their first readings entry appears in the feed,
/// readings in block order and then in order within each block.  A readings
/// entry that can't be tied to a classified meter is dropped.  A reading with a
/// non numeric start or value fails the whole extraction.
pub fn extract_readings(
    feed: &Feed,
    meters: &HashMap<String, Meter>,
) -> Result<Vec<MeterReadings>, Error> {
    let mut out: Vec<MeterReadings> = Vec::new();
    for entry in feed.entries.iter().filter(|e| e.is_readings()) {
        let Some(meter_id) = entry.usage_point_id() else {
            debug!("Skipping {:?}, no self link to a UsagePoint", entry.title);
            continue;
        };
        let Some(meter) = meters.get(meter_id) else {
            warn!("Skipping {:?}, meter {} is not in the feed", entry.title, meter_id);
            continue;
        };
        let blocks = entry.interval_blocks();
        if blocks.is_empty() {
            warn!("No IntervalBlock in {:?} for meter {}", entry.title, meter_id);
            continue;
        }

        let mut readings = Vec::new();
        for block in blocks {
            for raw in &block.readings {
                readings.push(parse_reading(meter_id, raw)?);
            }
        }
        if readings.is_empty() {
            warn!("No IntervalReading in {:?} for meter {}", entry.title, meter_id);
            continue;
        }
        debug!(
            "{} readings in {} blocks for meter {}",
            readings.len(),
            blocks.len(),
            meter_id
        );

        match out.iter_mut().find(|m| m.meter.id == meter.id) {
            Some(existing) => existing.readings.extend(readings),
            None => out.push(MeterReadings {
                meter: meter.clone(),
                readings,
            }),
        }
    }

    if out.is_empty() {
        return Err(Error::NoReadings {
            meters: meters.len(),
        });
    }
    info!(
        "Extracted {} readings for {} meter(s)",
        out.iter().map(|m| m.readings.len()).sum::<usize>(),
        out.len()
    );
    Ok(out)
}

fn parse_reading(meter_id: &str, raw: &IntervalReading) -> Result<Reading, Error> {
    let invalid = |field: &'static str, text: &str| Error::InvalidReading {
        meter_id: meter_id.to_string(),
        field,
        raw: text.to_string(),
    };

    let start_text = raw
        .time_period
        .as_ref()
        .and_then(|p| p.start.as_deref())
        .unwrap_or_default();
    let start = start_text
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|s| Timestamp::from_second(s).ok())
        .ok_or_else(|| invalid("start", start_text))?;

    let value_text = raw.value.as_deref().unwrap_or_default();
    let value = value_text
        .trim()
        .parse::<i64>()
        .map_err(|_| invalid("value", value_text))?;

    let quality = raw
        .reading_quality
        .as_ref()
        .and_then(|q| q.quality.as_deref())
        .map(|q| q.trim().to_string());

    Ok(Reading {
        start,
        value,
        quality,
    })
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;
    use crate::feed::decode;
    use crate::feed::meters::{classify_meters, MeterType};
    use crate::feed::tests::{feed_xml, reading_xml, readings_entry, usage_point_entry, USAGE_FEED};

    fn extract(xml: &str) -> Result<Vec<MeterReadings>, crate::Error> {
        let feed = decode(xml.as_bytes())?;
        let meters = classify_meters(&feed);
        extract_readings(&feed, &meters)
    }

    fn ts(seconds: i64) -> Timestamp {
        Timestamp::from_second(seconds).unwrap()
    }

    #[test]
    fn extract_usage_feed() -> Result<(), Box<dyn Error>> {
        let res = extract(USAGE_FEED)?;
        assert_eq!(res.len(), 2);

        let electric = &res[0];
        assert_eq!(electric.meter.id, "1234");
        assert_eq!(electric.meter.meter_type, MeterType::Electric);
        let starts: Vec<i64> = electric.readings.iter().map(|r| r.start.as_second()).collect();
        assert_eq!(
            starts,
            vec![1700000000, 1700003600, 1700007200, 1700086400, 1700090000]
        );
        let values: Vec<i64> = electric.readings.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![500, 620, 480, 510, 530]);
        assert_eq!(electric.readings[0].quality, None);
        assert_eq!(electric.readings[2].quality.as_deref(), Some("19"));

        let gas = &res[1];
        assert_eq!(gas.meter.id, "5678");
        assert_eq!(
            gas.readings,
            vec![
                Reading { start: ts(1700000000), value: 2, quality: None },
                Reading { start: ts(1700086400), value: 3, quality: None },
            ]
        );
        Ok(())
    }

    #[test]
    fn single_block_same_as_block_list() -> Result<(), Box<dyn Error>> {
        let block = format!(
            "<IntervalBlock>{}{}</IntervalBlock>",
            reading_xml("1700000000", "500"),
            reading_xml("1700003600", "600")
        );
        let meter = usage_point_entry("1234", "Electric", "0");
        let single = extract(&feed_xml(&format!(
            "{}{}",
            meter,
            readings_entry("1234", "Electric readings", &block)
        )))?;
        // same block split over two entries of the same meter
        let split = extract(&feed_xml(&format!(
            "{}{}{}",
            meter,
            readings_entry(
                "1234",
                "Electric readings",
                &format!("<IntervalBlock>{}</IntervalBlock>", reading_xml("1700000000", "500"))
            ),
            readings_entry(
                "1234",
                "Electric readings",
                &format!("<IntervalBlock>{}</IntervalBlock>", reading_xml("1700003600", "600"))
            ),
        )))?;
        assert_eq!(single, split);
        assert_eq!(single[0].readings.len(), 2);
        Ok(())
    }

    #[test]
    fn readings_for_unknown_meter_are_dropped() -> Result<(), Box<dyn Error>> {
        let block = format!("<IntervalBlock>{}</IntervalBlock>", reading_xml("1700000000", "500"));
        let res = extract(&feed_xml(&format!(
            "{}{}{}",
            usage_point_entry("1234", "Electric", "0"),
            readings_entry("9999", "Electric readings", &block),
            readings_entry("1234", "Electric readings", &block),
        )))?;
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].meter.id, "1234");
        assert_eq!(res[0].readings.len(), 1);
        Ok(())
    }

    #[test]
    fn missing_interval_block_is_not_fatal() -> Result<(), Box<dyn Error>> {
        let block = format!("<IntervalBlock>{}</IntervalBlock>", reading_xml("1700000000", "7"));
        let res = extract(&feed_xml(&format!(
            "{}{}{}{}",
            usage_point_entry("1234", "Electric", "0"),
            usage_point_entry("5678", "Gas", "1"),
            readings_entry("1234", "Electric readings", ""),
            readings_entry("5678", "Gas readings", &block),
        )))?;
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].meter.id, "5678");
        assert_eq!(res[0].readings[0].value, 7);
        Ok(())
    }

    #[test]
    fn no_readings_at_all() {
        let err = extract(&feed_xml(&format!(
            "{}{}",
            usage_point_entry("1234", "Electric", "0"),
            readings_entry(
                "9999",
                "Electric readings",
                &format!("<IntervalBlock>{}</IntervalBlock>", reading_xml("1", "1"))
            ),
        )))
        .unwrap_err();
        assert!(matches!(err, crate::Error::NoReadings { meters: 1 }), "{:?}", err);
    }

    #[test]
    fn non_numeric_value_is_fatal() {
        let block = format!(
            "<IntervalBlock>{}{}</IntervalBlock>",
            reading_xml("1700000000", "500"),
            reading_xml("1700003600", "12x")
        );
        let err = extract(&feed_xml(&format!(
            "{}{}",
            usage_point_entry("1234", "Electric", "0"),
            readings_entry("1234", "Electric readings", &block),
        )))
        .unwrap_err();
        match err {
            crate::Error::InvalidReading { meter_id, field, raw } => {
                assert_eq!(meter_id, "1234");
                assert_eq!(field, "value");
                assert_eq!(raw, "12x");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn non_numeric_start_is_fatal() {
        let block = format!(
            "<IntervalBlock>{}</IntervalBlock>",
            reading_xml("2023-11-14T22:13:20Z", "500")
        );
        let err = extract(&feed_xml(&format!(
            "{}{}",
            usage_point_entry("1234", "Electric", "0"),
            readings_entry("1234", "Electric readings", &block),
        )))
        .unwrap_err();
        assert!(
            matches!(err, crate::Error::InvalidReading { field: "start", .. }),
            "{:?}",
            err
        );
    }

    #[test]
    fn missing_value_is_fatal() {
        let block = "<IntervalBlock><IntervalReading><timePeriod><start>1700000000</start></timePeriod></IntervalReading></IntervalBlock>";
        let err = extract(&feed_xml(&format!(
            "{}{}",
            usage_point_entry("1234", "Electric", "0"),
            readings_entry("1234", "Electric readings", block),
        )))
        .unwrap_err();
        assert!(
            matches!(err, crate::Error::InvalidReading { field: "value", .. }),
            "{:?}",
            err
        );
    }
}
