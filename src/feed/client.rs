use std::{fs, path::Path, time::Duration};

use log::info;
use reqwest::{
    blocking::Client,
    header::{ACCEPT, USER_AGENT},
    StatusCode,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, FetchError};

pub const DEFAULT_FEED_BASE_URL: &str = "https://usagedata.dteenergy.com/link";

pub fn feed_url(base_url: &str, account: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), account)
}

/// Download the usage feed.  DTE answers bad links with a JSON error envelope,
/// which is turned into [`FetchError::Provider`].
pub fn download_feed(url: &str) -> Result<Vec<u8>, Error> {
    let client = Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(FetchError::from)?;
    let response = client
        .get(url)
        .header(USER_AGENT, "Mozilla/5.0")
        .header(ACCEPT, "application/atom+xml, application/xml, text/xml")
        .send()
        .map_err(FetchError::from)?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(fetch_error(status, url, &body).into());
    }
    let bytes = response.bytes().map_err(FetchError::from)?;
    info!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes.to_vec())
}

/// Read a feed saved to disk earlier.
pub fn read_feed_file(path: &Path) -> Result<Vec<u8>, Error> {
    let bytes = fs::read(path).map_err(|source| FetchError::Io {
        path: path.display().to_string(),
        source,
    })?;
    info!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "statusCode")]
    status_code: Value,
    message: String,
    code: Value,
}

fn fetch_error(status: StatusCode, url: &str, body: &str) -> FetchError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error }) => FetchError::Provider {
            status_code: plain(&error.status_code),
            message: error.message,
            code: plain(&error.code),
        },
        Err(_) => FetchError::Status {
            status,
            url: url.to_string(),
        },
    }
}

/// Strings without their JSON quotes, everything else as JSON.
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
