use std::{env, fmt, fs, path::Path};

use jiff::tz::TimeZone;
use log::{debug, info};
use serde::Deserialize;

use crate::error::Error;
use crate::feed::client::DEFAULT_FEED_BASE_URL;

pub const DEFAULT_MEASUREMENT_ELECTRIC: &str = "dte_electric";
pub const DEFAULT_MEASUREMENT_GAS: &str = "dte_gas";
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Settings for one run, resolved once at startup and passed down by reference.
#[derive(Debug, Clone)]
pub struct Config {
    /// The DTE usage data link id (the uuid at the end of the feed url)
    pub account: String,
    pub feed_base_url: String,
    pub influx: InfluxConfig,
    pub measurements: Measurements,
    /// Zone used to render the interval start times
    pub time_zone: TimeZone,
}

#[derive(Clone)]
pub struct InfluxConfig {
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: String,
    pub batch_size: usize,
}

impl fmt::Debug for InfluxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxConfig")
            .field("url", &self.url)
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("token", &"***")
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurements {
    pub electric: String,
    pub gas: String,
}

impl Default for Measurements {
    fn default() -> Self {
        Measurements {
            electric: DEFAULT_MEASUREMENT_ELECTRIC.to_string(),
            gas: DEFAULT_MEASUREMENT_GAS.to_string(),
        }
    }
}

/// Shape of the JSON5 config file.  Every value is optional here, the
/// environment can supply it instead.
///
/// ```json5
/// {
///   dte: { uuid: "..." },
///   influx: { url: "http://localhost:8086", org: "home", bucket: "energy", token: "..." },
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub dte: DteSection,
    #[serde(default)]
    pub influx: InfluxSection,
    pub timezone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DteSection {
    pub uuid: Option<String>,
    pub feed_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InfluxSection {
    pub url: Option<String>,
    pub org: Option<String>,
    pub bucket: Option<String>,
    pub token: Option<String>,
    pub measurement_electric: Option<String>,
    pub measurement_gas: Option<String>,
    pub batch_size: Option<usize>,
}

impl FileConfig {
    /// A missing file is fine, all settings may come from the environment.
    pub fn read(path: &Path) -> Result<FileConfig, Error> {
        if !path.exists() {
            debug!("No config file at {}, using environment only", path.display());
            return Ok(FileConfig::default());
        }
        let contents = fs::read_to_string(path).map_err(|e| Error::Config {
            key: path.display().to_string(),
            reason: e.to_string(),
        })?;
        FileConfig::parse(&contents).map_err(|e| match e {
            Error::Config { reason, .. } => Error::Config {
                key: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    pub fn parse(contents: &str) -> Result<FileConfig, Error> {
        json5::from_str(contents).map_err(|e| Error::Config {
            key: "config file".to_string(),
            reason: e.to_string(),
        })
    }
}

/// Looks a setting up in the environment first, then in the config file.
struct Resolver<'a, F> {
    env: F,
    file: &'a FileConfig,
}

impl<'a, F> Resolver<'a, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn lookup(&self, env_var: &str, file_value: Option<&str>) -> Option<String> {
        (self.env)(env_var)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| {
                file_value
                    .filter(|v| !v.trim().is_empty())
                    .map(str::to_string)
            })
            .map(|v| v.trim().to_string())
    }

    fn required(&self, key: &str, env_var: &str, file_value: Option<&str>) -> Result<String, Error> {
        self.lookup(env_var, file_value)
            .ok_or_else(|| Error::missing_setting(key, env_var))
    }

    fn or_default(&self, env_var: &str, file_value: Option<&str>, default: &str) -> String {
        self.lookup(env_var, file_value)
            .unwrap_or_else(|| default.to_string())
    }
}

impl Config {
    /// Resolve from the process environment and the config file at `path`.
    pub fn load(path: &Path) -> Result<Config, Error> {
        let file = FileConfig::read(path)?;
        Config::resolve(|name| env::var(name).ok(), &file)
    }

    /// Resolution order for every setting: env variable, config file, default.
    /// Required settings without a default fail with the setting's key.
    pub fn resolve<F>(env: F, file: &FileConfig) -> Result<Config, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let r = Resolver { env, file };
        let dte = &file.dte;
        let influx = &file.influx;

        let account = r.required("dte.uuid", "DTE_UUID", dte.uuid.as_deref())?;
        let feed_base_url = r.or_default(
            "DTE_FEED_BASE_URL",
            dte.feed_base_url.as_deref(),
            DEFAULT_FEED_BASE_URL,
        );

        let batch_size_file = influx.batch_size.map(|n| n.to_string());
        let batch_size = r.or_default(
            "INFLUX_BATCH_SIZE",
            batch_size_file.as_deref(),
            &DEFAULT_BATCH_SIZE.to_string(),
        );
        let batch_size = match batch_size.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                return Err(Error::Config {
                    key: "influx.batch_size".to_string(),
                    reason: format!("{:?} is not a positive integer", batch_size),
                })
            }
        };

        let influx_config = InfluxConfig {
            url: r.required("influx.url", "INFLUX_URL", influx.url.as_deref())?,
            org: r.required("influx.org", "INFLUX_ORG", influx.org.as_deref())?,
            bucket: r.required("influx.bucket", "INFLUX_BUCKET", influx.bucket.as_deref())?,
            token: r.required("influx.token", "INFLUX_TOKEN", influx.token.as_deref())?,
            batch_size,
        };

        let measurements = Measurements {
            electric: r.or_default(
                "INFLUX_MEASUREMENT_ELECTRIC",
                influx.measurement_electric.as_deref(),
                DEFAULT_MEASUREMENT_ELECTRIC,
            ),
            gas: r.or_default(
                "INFLUX_MEASUREMENT_GAS",
                influx.measurement_gas.as_deref(),
                DEFAULT_MEASUREMENT_GAS,
            ),
        };

        let time_zone = match r.lookup("DTE_TIMEZONE", file.timezone.as_deref()) {
            Some(name) => TimeZone::get(&name).map_err(|e| Error::Config {
                key: "timezone".to_string(),
                reason: format!("unknown time zone {:?}: {}", name, e),
            })?,
            None => TimeZone::system(),
        };

        info!(
            "Resolved config for account {}, bucket {} at {}",
            account, influx_config.bucket, influx_config.url
        );
        Ok(Config {
            account,
            feed_base_url,
            influx: influx_config,
            measurements,
            time_zone,
        })
    }
}
