use thiserror::Error;

/// Everything that can abort a run.  Each message names the stage it came from.
#[derive(Error, Debug)]
pub enum Error {
    #[error("config: {key}: {reason}")]
    Config { key: String, reason: String },

    #[error("fetch: {0}")]
    Fetch(#[from] FetchError),

    #[error("decode: {0}")]
    Decode(String),

    #[error("decode: malformed feed, {0}")]
    MalformedFeed(String),

    #[error("extract: invalid reading for meter {meter_id}, {field} {raw:?} is not a valid integer")]
    InvalidReading {
        meter_id: String,
        field: &'static str,
        raw: String,
    },

    #[error("extract: no interval readings matched any of the {meters} classified meter(s), is the account id correct?")]
    NoReadings { meters: usize },

    #[error("write: {0}")]
    Write(String),
}

impl Error {
    pub fn missing_setting(key: &str, env_var: &str) -> Self {
        Error::Config {
            key: key.to_string(),
            reason: format!(
                "required setting is missing, set {} or add it to the config file",
                env_var
            ),
        }
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    /// The provider answered with its JSON error envelope.
    #[error("Error {status_code}: {message} (code {code})")]
    Provider {
        status_code: String,
        message: String,
        code: String,
    },

    #[error("HTTP {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}
