//! JSON messages exchanged with WebSocket clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::debug;
use truth_ticks::{RawPrint, TimeframeMetrics};
use truth_ticks_mm::{MmEngine, MmScoreResult, ScoreRequest};

/// Message sent by a client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Trade print from a feed adapter.
    Print {
        symbol: SmolStr,
        #[serde(flatten)]
        print: RawPrint,
    },
    Score {
        symbol: SmolStr,
        #[serde(flatten)]
        request: ScoreRequest,
    },
    Metrics {
        symbol: SmolStr,
        average_daily_volume: f64,
    },
}

/// Message sent to clients, either as a reply or broadcast.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        message: String,
        timestamp: DateTime<Utc>,
    },
    Score(Box<MmScoreResult>),
    Metrics {
        symbol: SmolStr,
        metrics: Vec<TimeframeMetrics>,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn welcome() -> Self {
        Self::Welcome {
            message: "Connected to truth-ticks market-making feed".to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Apply a raw client text frame to the engine, returning the reply if one is due.
///
/// Accepted and dropped prints are not acknowledged.
pub fn handle_text(engine: &MmEngine, text: &str) -> Option<ServerMessage> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(error) => return Some(ServerMessage::error(format!("invalid message: {error}"))),
    };

    match message {
        ClientMessage::Print { symbol, print } => {
            if !engine.add_print(&symbol, print) {
                debug!(%symbol, "client print dropped");
            }
            None
        }
        ClientMessage::Score { symbol, request } => Some(ServerMessage::Score(Box::new(
            engine.score(&symbol, &request),
        ))),
        ClientMessage::Metrics {
            symbol,
            average_daily_volume,
        } => Some(ServerMessage::Metrics {
            metrics: engine.timeframe_metrics(&symbol, average_daily_volume),
            symbol,
        }),
    }
}
