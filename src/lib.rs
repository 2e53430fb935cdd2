pub mod config;
pub mod error;
pub mod feed;
pub mod influx;
pub mod job;

pub use error::Error;
