//! Points and the InfluxDB v2 write path.
//!
//! Line protocol:
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=val1,field2=val2 timestamp_s
//! ```
//!
//! See: <https://docs.influxdata.com/influxdb/v2/reference/syntax/line-protocol/>

pub mod point;
pub mod sink;

pub use point::{build_point, FieldValue, Point};
pub use sink::{InfluxSink, Sink, WriteMode, Writer};
