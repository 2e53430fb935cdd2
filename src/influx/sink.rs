use std::time::Duration;

use log::{debug, info};
use reqwest::{
    blocking::Client,
    header::{AUTHORIZATION, CONTENT_TYPE},
};

use super::Point;
use crate::config::InfluxConfig;
use crate::error::Error;

/// Where points end up.  `flush` is called once, after the last point.
pub trait Sink {
    fn write(&mut self, point: &Point) -> Result<(), Error>;

    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// Writes line protocol to the InfluxDB v2 `/api/v2/write` endpoint, in
/// batches of `batch_size` lines.
pub struct InfluxSink {
    client: Client,
    write_url: String,
    org: String,
    bucket: String,
    token: String,
    batch_size: usize,
    buffer: Vec<String>,
}

impl InfluxSink {
    pub fn new(config: &InfluxConfig) -> Result<InfluxSink, Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Write(format!("failed to build http client: {}", e)))?;
        Ok(InfluxSink {
            client,
            write_url: format!("{}/api/v2/write", config.url.trim_end_matches('/')),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
            token: config.token.clone(),
            batch_size: config.batch_size.max(1),
            buffer: Vec::with_capacity(config.batch_size.max(1)),
        })
    }

    fn post_buffer(&mut self) -> Result<(), Error> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let body = self.buffer.join("\n");
        let response = self
            .client
            .post(&self.write_url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "s"),
            ])
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .map_err(|e| Error::Write(format!("bucket {}: {}", self.bucket, e)))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(Error::Write(format!(
                "bucket {}: HTTP {} {}",
                self.bucket,
                status,
                text.trim()
            )));
        }
        debug!("Wrote {} lines to bucket {}", self.buffer.len(), self.bucket);
        self.buffer.clear();
        Ok(())
    }
}

impl Sink for InfluxSink {
    fn write(&mut self, point: &Point) -> Result<(), Error> {
        self.buffer.push(point.to_line_protocol());
        if self.buffer.len() >= self.batch_size {
            self.post_buffer()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.post_buffer()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Persist,
    /// Log every point, write nothing
    DryRun,
}

/// Logs every point and hands it to the sink unless running dry.
pub struct Writer<S> {
    sink: S,
    mode: WriteMode,
    points: usize,
}

impl<S: Sink> Writer<S> {
    pub fn new(sink: S, mode: WriteMode) -> Writer<S> {
        Writer {
            sink,
            mode,
            points: 0,
        }
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    pub fn write(&mut self, point: &Point) -> Result<(), Error> {
        info!("{}: {}", point.civil_time(), point);
        if self.mode == WriteMode::Persist {
            self.sink.write(point)?;
        }
        self.points += 1;
        Ok(())
    }

    /// Flush the sink and return the number of points seen.
    pub fn finish(&mut self) -> Result<usize, Error> {
        if self.mode == WriteMode::Persist {
            self.sink.flush()?;
        }
        Ok(self.points)
    }

    pub fn into_inner(self) -> S {
        self.sink
    }
}
