use crate::error::ServerError;
use smol_str::SmolStr;
use std::{net::SocketAddr, time::Duration};
use truth_ticks::SessionCalendar;
use truth_ticks_mm::EngineConfig;

const DEFAULT_ADDR: &str = "0.0.0.0:9101";
const DEFAULT_BUFFER_SIZE: usize = 1_000;
const DEFAULT_SCORE_INTERVAL_SECS: u64 = 30;

/// Symbol scored on every interval, with the average daily volume to score it against.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchlistEntry {
    pub symbol: SmolStr,
    pub average_daily_volume: f64,
}

/// Server configuration, resolved from environment variables at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `WS_ADDR`
    pub addr: SocketAddr,
    /// `WS_BUFFER_SIZE`
    pub buffer_size: usize,
    /// `SCORE_INTERVAL_SECS`
    pub score_interval: Duration,
    /// `WATCHLIST`, formatted `SYM:ADV,SYM:ADV`
    pub watchlist: Vec<WatchlistEntry>,
    /// `TRADING_HOURS_WINDOWS`: clip timeframe windows to trading sessions
    pub trading_hours_windows: bool,
    /// Loaded from the JSON file at `TRUTH_TICKS_CONFIG`, defaults otherwise
    pub engine: EngineConfig,
    pub calendar: SessionCalendar,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Resolve the configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServerError> {
        let addr_value = lookup("WS_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_value
            .parse::<SocketAddr>()
            .map_err(|source| ServerError::InvalidAddr {
                var: "WS_ADDR",
                value: addr_value.clone(),
                source,
            })?;

        let buffer_size = parse_number(&lookup, "WS_BUFFER_SIZE", DEFAULT_BUFFER_SIZE)?;
        let interval_secs =
            parse_number(&lookup, "SCORE_INTERVAL_SECS", DEFAULT_SCORE_INTERVAL_SECS)?;

        let watchlist = match lookup("WATCHLIST") {
            Some(value) => parse_watchlist(&value)?,
            None => Vec::new(),
        };

        let trading_hours_windows = lookup("TRADING_HOURS_WINDOWS")
            .is_some_and(|value| matches!(value.trim(), "1" | "true" | "TRUE" | "yes"));

        let engine = match lookup("TRUTH_TICKS_CONFIG") {
            Some(path) => {
                let contents = std::fs::read_to_string(&path)
                    .map_err(|source| ServerError::ReadConfig { path, source })?;
                EngineConfig::from_json_str(&contents)?
            }
            None => EngineConfig::default(),
        };

        Ok(Self {
            addr,
            buffer_size: buffer_size.max(1),
            score_interval: Duration::from_secs(interval_secs.max(1)),
            watchlist,
            trading_hours_windows,
            engine,
            calendar: SessionCalendar::default(),
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ServerError> {
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ServerError::InvalidNumber { var, value }),
        None => Ok(default),
    }
}

/// Parse `SYM:ADV` pairs separated by commas. Blank entries are skipped.
pub fn parse_watchlist(input: &str) -> Result<Vec<WatchlistEntry>, ServerError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (symbol, adv) = entry
                .split_once(':')
                .ok_or_else(|| ServerError::InvalidWatchlist(entry.to_string()))?;
            let symbol = symbol.trim();
            let average_daily_volume: f64 = adv
                .trim()
                .parse()
                .map_err(|_| ServerError::InvalidWatchlist(entry.to_string()))?;
            let valid_adv = average_daily_volume.is_finite() && average_daily_volume > 0.0;
            if symbol.is_empty() || !valid_adv {
                return Err(ServerError::InvalidWatchlist(entry.to_string()));
            }
            Ok(WatchlistEntry {
                symbol: SmolStr::new(symbol),
                average_daily_volume,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.addr, "0.0.0.0:9101".parse().unwrap());
        assert_eq!(config.buffer_size, 1_000);
        assert_eq!(config.score_interval, Duration::from_secs(30));
        assert!(config.watchlist.is_empty());
        assert!(!config.trading_hours_windows);
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("WS_ADDR", "127.0.0.1:9200"),
            ("WS_BUFFER_SIZE", "64"),
            ("SCORE_INTERVAL_SECS", "5"),
            ("WATCHLIST", "PFF-A:5000, PFF-B:12000"),
            ("TRADING_HOURS_WINDOWS", "true"),
        ]))
        .unwrap();

        assert_eq!(config.addr.port(), 9200);
        assert_eq!(config.buffer_size, 64);
        assert_eq!(config.score_interval, Duration::from_secs(5));
        assert_eq!(config.watchlist.len(), 2);
        assert_eq!(config.watchlist[1].symbol, "PFF-B");
        assert_eq!(config.watchlist[1].average_daily_volume, 12_000.0);
        assert!(config.trading_hours_windows);
    }

    #[test]
    fn test_invalid_values() {
        struct TestCase {
            input: (&'static str, &'static str),
        }

        let tests = vec![
            // TC0
            TestCase {
                input: ("WS_ADDR", "not-an-addr"),
            },
            // TC1
            TestCase {
                input: ("WS_BUFFER_SIZE", "-3"),
            },
            // TC2
            TestCase {
                input: ("WATCHLIST", "PFF-A"),
            },
            // TC3
            TestCase {
                input: ("WATCHLIST", "PFF-A:0"),
            },
            // TC4
            TestCase {
                input: ("TRUTH_TICKS_CONFIG", "/nonexistent/truth-ticks.json"),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert!(
                ServerConfig::from_lookup(lookup(&[test.input])).is_err(),
                "TC{} failed",
                index
            );
        }
    }

    #[test]
    fn test_parse_watchlist_skips_blank_entries() {
        let watchlist = parse_watchlist("AAA:100, ,BBB : 250.5,").unwrap();
        assert_eq!(
            watchlist,
            vec![
                WatchlistEntry { symbol: SmolStr::new("AAA"), average_daily_volume: 100.0 },
                WatchlistEntry { symbol: SmolStr::new("BBB"), average_daily_volume: 250.5 },
            ]
        );
    }
}
