use std::net::AddrParseError;
use thiserror::Error;
use truth_ticks::ConfigError;

/// All startup errors of the server. Client protocol errors are replied as `error` messages and
/// never surface here.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid {var}: {value} ({source})")]
    InvalidAddr {
        var: &'static str,
        value: String,
        source: AddrParseError,
    },

    #[error("invalid {var}: {value}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("invalid WATCHLIST entry: {0}")]
    InvalidWatchlist(String),

    #[error("failed to read config file {path}: {source}")]
    ReadConfig {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid engine configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },
}
