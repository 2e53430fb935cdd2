use log::info;

use crate::config::Config;
use crate::error::Error;
use crate::feed::{self, meters::classify_meters, readings::extract_readings};
use crate::influx::{build_point, Sink, WriteMode, Writer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub meters: usize,
    pub meters_with_readings: usize,
    pub points: usize,
}

/// Decode one feed and push every reading through `writer`.
///
/// All readings are validated before the first point is written, so a bad
/// reading anywhere in the feed means nothing gets written.
pub fn process_feed<S: Sink>(
    config: &Config,
    bytes: &[u8],
    writer: &mut Writer<S>,
) -> Result<RunSummary, Error> {
    let feed = feed::decode(bytes)?;
    let meters = classify_meters(&feed);
    let by_meter = extract_readings(&feed, &meters)?;

    for meter_readings in &by_meter {
        for reading in &meter_readings.readings {
            let point = build_point(config, &meter_readings.meter, reading);
            writer.write(&point)?;
        }
    }
    let points = writer.finish()?;

    let summary = RunSummary {
        meters: meters.len(),
        meters_with_readings: by_meter.len(),
        points,
    };
    let verb = match writer.mode() {
        WriteMode::Persist => "wrote",
        WriteMode::DryRun => "would write (dry run)",
    };
    info!(
        "Account {}: {} meter(s), {} with readings, {} {} point(s)",
        config.account, summary.meters, summary.meters_with_readings, verb, summary.points
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;
    use crate::feed::tests::{feed_xml, reading_xml, readings_entry, usage_point_entry, USAGE_FEED};
    use crate::influx::point::tests::test_config;
    use crate::influx::sink::tests::MemorySink;

    #[test]
    fn one_electric_reading() -> Result<(), Box<dyn Error>> {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Info)
            .is_test(true)
            .try_init();
        let xml = feed_xml(&format!(
            "{}{}",
            usage_point_entry("1234", "Electric", "0"),
            readings_entry(
                "1234",
                "Electric readings",
                &format!("<IntervalBlock>{}</IntervalBlock>", reading_xml("1700000000", "500"))
            )
        ));
        let config = test_config();
        let mut writer = Writer::new(MemorySink::default(), WriteMode::Persist);
        let summary = process_feed(&config, xml.as_bytes(), &mut writer)?;
        assert_eq!(
            summary,
            RunSummary {
                meters: 1,
                meters_with_readings: 1,
                points: 1
            }
        );
        let sink = writer.into_inner();
        assert_eq!(
            sink.lines,
            vec!["dte_electric,account=abc,meter_id=1234,meter_type=electric watt=500i 1700000000"]
        );
        Ok(())
    }

    #[test]
    fn usage_feed_in_order() -> Result<(), Box<dyn Error>> {
        let config = test_config();
        let mut writer = Writer::new(MemorySink::default(), WriteMode::Persist);
        let summary = process_feed(&config, USAGE_FEED.as_bytes(), &mut writer)?;
        assert_eq!(summary.points, 7);
        let sink = writer.into_inner();
        let expected = vec![
            "dte_electric,account=abc,meter_id=1234,meter_type=electric watt=500i 1700000000",
            "dte_electric,account=abc,meter_id=1234,meter_type=electric watt=620i 1700003600",
            "dte_electric,account=abc,meter_id=1234,meter_type=electric watt=480i,quality=\"19\" 1700007200",
            "dte_electric,account=abc,meter_id=1234,meter_type=electric watt=510i 1700086400",
            "dte_electric,account=abc,meter_id=1234,meter_type=electric watt=530i 1700090000",
            "dte_gas,account=abc,meter_id=5678,meter_type=gas ccf=2i 1700000000",
            "dte_gas,account=abc,meter_id=5678,meter_type=gas ccf=3i 1700086400",
        ];
        assert_eq!(sink.lines, expected);
        assert_eq!(sink.flushes, 1);
        Ok(())
    }

    #[test]
    fn dry_run_writes_nothing() -> Result<(), Box<dyn Error>> {
        let config = test_config();
        let mut writer = Writer::new(MemorySink::default(), WriteMode::DryRun);
        let summary = process_feed(&config, USAGE_FEED.as_bytes(), &mut writer)?;
        assert_eq!(summary.points, 7);
        let sink = writer.into_inner();
        assert!(sink.lines.is_empty());
        assert_eq!(sink.flushes, 0);
        Ok(())
    }

    #[test]
    fn invalid_reading_writes_nothing() {
        let xml = feed_xml(&format!(
            "{}{}",
            usage_point_entry("1234", "Electric", "0"),
            readings_entry(
                "1234",
                "Electric readings",
                &format!(
                    "<IntervalBlock>{}{}</IntervalBlock>",
                    reading_xml("1700000000", "500"),
                    reading_xml("1700003600", "12x")
                )
            )
        ));
        let config = test_config();
        let mut writer = Writer::new(MemorySink::default(), WriteMode::Persist);
        let err = process_feed(&config, xml.as_bytes(), &mut writer).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidReading { .. }), "{:?}", err);
        let sink = writer.into_inner();
        assert!(sink.lines.is_empty());
        assert_eq!(sink.flushes, 0);
    }

    #[test]
    fn wrong_account_has_no_readings() {
        let xml = feed_xml(&usage_point_entry("1234", "Electric", "0"));
        let config = test_config();
        let mut writer = Writer::new(MemorySink::default(), WriteMode::Persist);
        let err = process_feed(&config, xml.as_bytes(), &mut writer).unwrap_err();
        assert!(matches!(err, crate::Error::NoReadings { .. }), "{:?}", err);
        assert!(err.to_string().contains("account id"));
    }
}
