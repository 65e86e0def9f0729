mod config;
mod error;
mod protocol;

use crate::{
    config::{ServerConfig, WatchlistEntry},
    error::ServerError,
    protocol::{ServerMessage, handle_text},
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use smol_str::SmolStr;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{broadcast, mpsc},
    time::interval,
};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use truth_ticks::{SessionCalendar, TradingCalendar};
use truth_ticks_mm::{MarketMode, MmEngine, ScoreRequest};

#[tokio::main]
async fn main() {
    // Initialize logging
    init_logging();

    if let Err(error) = run().await {
        error!(%error, "truth-ticks server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ServerError> {
    let config = ServerConfig::from_env()?;
    info!("Starting truth-ticks WebSocket server");

    let mut engine = MmEngine::new(config.engine.clone())?;
    if config.trading_hours_windows {
        info!("Timeframe windows clipped to trading sessions");
        engine = engine.with_calendar(config.calendar.clone());
    }
    let engine = Arc::new(engine);

    info!("WebSocket broadcast buffer size: {}", config.buffer_size);
    let (tx, _rx) = broadcast::channel::<ServerMessage>(config.buffer_size);
    let tx = Arc::new(tx);

    let listener = TcpListener::bind(&config.addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.addr,
            source,
        })?;
    info!("WebSocket server listening on ws://{}", config.addr);

    if config.watchlist.is_empty() {
        info!("WATCHLIST empty, periodic scoring disabled");
    } else {
        info!(
            symbols = config.watchlist.len(),
            interval_secs = config.score_interval.as_secs(),
            "Periodic watchlist scoring enabled"
        );
        tokio::spawn(score_watchlist(
            engine.clone(),
            config.watchlist.clone(),
            config.calendar.clone(),
            config.score_interval,
            tx.clone(),
        ));
    }

    tokio::select! {
        _ = accept_loop(listener, engine, tx) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    Ok(())
}

async fn accept_loop(
    listener: TcpListener,
    engine: Arc<MmEngine>,
    tx: Arc<broadcast::Sender<ServerMessage>>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                info!("New WebSocket connection from {}", peer_addr);
                tokio::spawn(handle_client(stream, peer_addr, engine.clone(), tx.clone()));
            }
            Err(error) => {
                warn!(%error, "Failed to accept connection");
            }
        }
    }
}

/// Score every watchlist symbol on each tick and broadcast the results.
async fn score_watchlist(
    engine: Arc<MmEngine>,
    watchlist: Vec<WatchlistEntry>,
    calendar: SessionCalendar,
    period: Duration,
    tx: Arc<broadcast::Sender<ServerMessage>>,
) {
    let mut ticker = interval(period);
    loop {
        ticker.tick().await;

        let mode = if calendar.is_open(Utc::now().timestamp()) {
            MarketMode::MarketOpen
        } else {
            MarketMode::MarketClosed
        };
        let requests: Vec<(SmolStr, ScoreRequest)> = watchlist
            .iter()
            .map(|entry| {
                (
                    entry.symbol.clone(),
                    ScoreRequest::new(entry.average_daily_volume, mode),
                )
            })
            .collect();

        let scorer = engine.clone();
        let scoring = tokio::task::spawn_blocking(move || scorer.score_many(&requests));
        let results = match scoring.await {
            Ok(results) => results,
            Err(error) => {
                error!(%error, "Watchlist scoring task failed");
                continue;
            }
        };

        let tradeable = results.iter().filter(|result| result.tradeable_mm).count();
        info!(%mode, symbols = results.len(), tradeable, "Scored watchlist");

        for result in results {
            // No subscribers is not an error
            let _ = tx.send(ServerMessage::Score(Box::new(result)));
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    peer_addr: SocketAddr,
    engine: Arc<MmEngine>,
    tx: Arc<broadcast::Sender<ServerMessage>>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed for {}: {}", peer_addr, e);
            return;
        }
    };

    info!("WebSocket handshake completed for {}", peer_addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let mut rx = tx.subscribe();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Send welcome message
    if let Ok(msg) = serde_json::to_string(&ServerMessage::welcome()) {
        let _ = ws_sender.send(Message::Text(msg.into())).await;
    }

    // Forward broadcast scores and direct replies to this client
    let mut send_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                reply = reply_rx.recv() => match reply {
                    Some(reply) => reply,
                    None => break,
                },
                event = rx.recv() => match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Client {} lagged, skipped {} messages", peer_addr, skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Broadcast channel closed for {}", peer_addr);
                        break;
                    }
                },
            };

            if let Ok(json) = serde_json::to_string(&message) {
                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Apply prints and answer score/metrics requests
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(Message::Ping(_)) => {
                    debug!("Received ping from {}", peer_addr);
                }
                Ok(Message::Text(text)) => {
                    if let Some(reply) = handle_text(&engine, text.as_str()) {
                        if reply_tx.send(reply).is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", peer_addr, e);
                    break;
                }
                _ => {}
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            info!("Send task completed for {}", peer_addr);
            recv_task.abort();
        }
        _ = &mut recv_task => {
            info!("Receive task completed for {}", peer_addr);
            send_task.abort();
        }
    }

    info!("WebSocket connection closed for {}", peer_addr);
}

/// `RUST_LOG` filter, defaulting to `info`. `LOG_FORMAT=json` switches to JSON lines.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
