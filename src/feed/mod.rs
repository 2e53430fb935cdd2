//! The Green Button (ESPI) Atom feed DTE publishes at
//! `https://usagedata.dteenergy.com/link/<uuid>`.
//!
//! The feed mixes two kinds of entries.  `UsagePoint` entries describe a meter,
//! readings entries (titled e.g. "Electric readings") carry one `IntervalBlock`
//! per day.  Both are tied to a meter through their `self` link:
//! `.../Subscription/<s>/UsagePoint/<meter_id>[/MeterReading/...]`.
//!
//! Repeated elements (`entry`, `link`, `IntervalBlock`, `IntervalReading`)
//! decode into a `Vec`, so a single block and a list of blocks look the same
//! to everything downstream.

pub mod client;
pub mod meters;
pub mod readings;

use log::debug;
use quick_xml::{events::Event, Reader};
use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Deserialize)]
pub struct Feed {
    #[serde(rename = "entry", default)]
    pub entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "link", default)]
    pub links: Vec<Link>,
    pub content: Option<Content>,
}

#[derive(Debug, Deserialize)]
pub struct Link {
    #[serde(rename = "@rel", default)]
    pub rel: String,
    #[serde(rename = "@href", default)]
    pub href: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Content {
    #[serde(rename = "UsagePoint")]
    pub usage_point: Option<UsagePoint>,
    #[serde(rename = "IntervalBlock", default)]
    pub interval_blocks: Vec<IntervalBlock>,
}

#[derive(Debug, Deserialize)]
pub struct UsagePoint {
    #[serde(rename = "ServiceCategory")]
    pub service_category: Option<ServiceCategory>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceCategory {
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IntervalBlock {
    #[serde(rename = "IntervalReading", default)]
    pub readings: Vec<IntervalReading>,
}

/// One reading as it appears in the feed.  Numbers stay text here, they are
/// validated by the extractor so a bad value can be reported with its meter.
#[derive(Debug, Deserialize)]
pub struct IntervalReading {
    #[serde(rename = "timePeriod")]
    pub time_period: Option<TimePeriod>,
    pub value: Option<String>,
    #[serde(rename = "ReadingQuality")]
    pub reading_quality: Option<ReadingQuality>,
}

#[derive(Debug, Deserialize)]
pub struct TimePeriod {
    pub duration: Option<String>,
    pub start: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReadingQuality {
    pub quality: Option<String>,
}

impl Entry {
    /// The meter id from the entry's `self` link, if it has one.
    pub fn usage_point_id(&self) -> Option<&str> {
        self.links
            .iter()
            .filter(|link| link.rel == "self")
            .find_map(|link| usage_point_segment(&link.href))
    }

    pub fn is_readings(&self) -> bool {
        self.title.to_lowercase().contains("readings")
    }

    /// The `ServiceCategory.kind` code, present on meter descriptor entries only.
    pub fn service_kind(&self) -> Option<&str> {
        self.content
            .as_ref()?
            .usage_point
            .as_ref()?
            .service_category
            .as_ref()?
            .kind
            .as_deref()
    }

    pub fn interval_blocks(&self) -> &[IntervalBlock] {
        match &self.content {
            Some(content) => &content.interval_blocks,
            None => &[],
        }
    }
}

/// Path segment right after `UsagePoint`, ignoring any query string.
fn usage_point_segment(href: &str) -> Option<&str> {
    let path = href.split(['?', '#']).next()?;
    let mut segments = path.split('/');
    segments.by_ref().find(|s| *s == "UsagePoint")?;
    segments.next().filter(|s| !s.is_empty())
}

/// Decode the raw feed.  Bytes that are not XML fail with [`Error::Decode`],
/// a well formed document that is not a feed with entries fails with
/// [`Error::MalformedFeed`].
pub fn decode(bytes: &[u8]) -> Result<Feed, Error> {
    let xml = std::str::from_utf8(bytes)
        .map_err(|e| Error::Decode(format!("feed is not valid UTF-8: {}", e)))?;

    let root = root_element(xml)?;
    if root != "feed" {
        return Err(Error::MalformedFeed(format!(
            "expected a <feed> root element, found <{}>",
            root
        )));
    }

    let feed: Feed = quick_xml::de::from_str(xml).map_err(|e| Error::Decode(e.to_string()))?;
    if feed.entries.is_empty() {
        return Err(Error::MalformedFeed("no <entry> under <feed>".to_string()));
    }
    debug!("Decoded feed with {} entries", feed.entries.len());
    Ok(feed)
}

/// Local name of the first element in the document.
fn root_element(xml: &str) -> Result<String, Error> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.local_name();
                return Ok(String::from_utf8_lossy(name.as_ref()).into_owned());
            }
            Ok(Event::Eof) => return Err(Error::Decode("document has no root element".to_string())),
            Ok(_) => {}
            Err(e) => {
                return Err(Error::Decode(format!(
                    "invalid XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }
}
