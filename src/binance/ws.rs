use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite;
use url::Url;

use super::types::parse_trade_frame;
use crate::error::AppError;
use crate::event::{IngestPhase, IngestStatus};
use crate::tick_store::TickStore;

/// Upper bound on a single receive. Expiry is not an error; it only gives the
/// loop a chance to observe cancellation on a quiet stream.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Exponential backoff for reconnection.
struct ExponentialBackoff {
    current: Duration,
    initial: Duration,
    max: Duration,
    factor: f64,
    attempt: u32,
}

impl ExponentialBackoff {
    fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            current: initial,
            initial,
            max,
            factor,
            attempt: 0,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.attempt += 1;
        self.current = Duration::from_secs_f64(
            (self.current.as_secs_f64() * self.factor).min(self.max.as_secs_f64()),
        );
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
        self.attempt = 0;
    }
}

/// Build the combined-stream URL subscribing to `<symbol>@trade` for every
/// symbol, e.g. `wss://host:9443/stream?streams=btcusdt@trade/ethusdt@trade`.
/// Any path on `ws_base_url` is replaced.
pub fn combined_stream_url(ws_base_url: &str, symbols: &[String]) -> Result<Url, AppError> {
    if symbols.is_empty() {
        return Err(AppError::Config(
            "at least one symbol is required for the trade stream".to_string(),
        ));
    }
    let mut url = Url::parse(ws_base_url)
        .map_err(|e| AppError::Config(format!("invalid ws_base_url '{}': {}", ws_base_url, e)))?;
    let streams = symbols
        .iter()
        .map(|s| format!("{}@trade", s.trim().to_ascii_lowercase()))
        .collect::<Vec<_>>()
        .join("/");
    url.set_path("/stream");
    url.set_query(Some(&format!("streams={}", streams)));
    Ok(url)
}

/// Consumes the combined trade stream and appends every parsed tick to the
/// store before reading the next frame.
pub struct TradeStreamConsumer {
    url: Url,
    store: Arc<TickStore>,
    status_tx: Arc<watch::Sender<IngestStatus>>,
}

impl TradeStreamConsumer {
    pub fn new(
        ws_base_url: &str,
        symbols: &[String],
        store: Arc<TickStore>,
        status_tx: Arc<watch::Sender<IngestStatus>>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            url: combined_stream_url(ws_base_url, symbols)?,
            store,
            status_tx,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn set_phase(&self, phase: IngestPhase) {
        self.status_tx.send_modify(|s| s.phase = phase);
    }

    /// Publish a failure that happened outside the consumer loop.
    pub fn mark_failed(&self, reason: String) {
        self.set_phase(IngestPhase::Failed(reason));
    }

    /// Run until `shutdown` flips to true. Network failures reconnect with
    /// backoff; a store failure ends the loop with an error.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), 2.0);

        loop {
            if *shutdown.borrow() {
                break;
            }
            self.set_phase(IngestPhase::Connecting);
            match self.connect_once(&mut shutdown, &mut backoff).await {
                Ok(()) => break,
                Err(e) if is_store_failure(&e) => {
                    tracing::error!(error = %e, "Tick store rejected insert, stopping ingest");
                    self.set_phase(IngestPhase::Failed(format!("{:#}", e)));
                    return Err(e);
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    let attempt = backoff.attempt;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Trade stream disconnected, reconnecting"
                    );
                    self.status_tx.send_modify(|s| {
                        s.reconnects += 1;
                        s.phase = IngestPhase::Reconnecting {
                            attempt,
                            delay_ms: delay.as_millis() as u64,
                        };
                    });

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => continue,
                        _ = shutdown.changed() => {
                            tracing::info!("Shutdown during reconnect");
                            break;
                        }
                    }
                }
            }
        }

        self.set_phase(IngestPhase::Stopped);
        tracing::info!(url = %self.url, "Trade stream consumer stopped");
        Ok(())
    }

    async fn connect_once(
        &self,
        shutdown: &mut watch::Receiver<bool>,
        backoff: &mut ExponentialBackoff,
    ) -> Result<()> {
        tracing::info!(url = %self.url, "Connecting to trade stream");

        let (ws_stream, _resp) = tokio::select! {
            res = tokio_tungstenite::connect_async(self.url.as_str()) => {
                res.map_err(|e| AppError::WebSocket(format!("connect failed: {}", e)))?
            }
            _ = shutdown.changed() => return Ok(()),
        };

        backoff.reset();
        self.set_phase(IngestPhase::Connected);
        tracing::info!("Trade stream connected");

        let (mut write, mut read) = ws_stream.split();

        let outcome = loop {
            if *shutdown.borrow() {
                break Ok(());
            }
            let next = tokio::select! {
                next = tokio::time::timeout(RECV_TIMEOUT, read.next()) => next,
                _ = shutdown.changed() => break Ok(()),
            };
            let Ok(msg) = next else {
                continue;
            };
            match msg {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    if let Err(e) = self.handle_frame(&text) {
                        break Err(anyhow::Error::new(e));
                    }
                }
                Some(Ok(tungstenite::Message::Binary(bytes))) => {
                    let handled = match std::str::from_utf8(&bytes) {
                        Ok(text) => self.handle_frame(text),
                        Err(_) => {
                            self.record_drop("binary frame is not UTF-8");
                            Ok(())
                        }
                    };
                    if let Err(e) = handled {
                        break Err(anyhow::Error::new(e));
                    }
                }
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    break Err(AppError::WebSocket(format!("closed by server: {:?}", frame)).into());
                }
                Some(Ok(_)) => {
                    // Ping/Pong are answered by tungstenite.
                }
                Some(Err(e)) => {
                    break Err(AppError::WebSocket(format!("read error: {}", e)).into());
                }
                None => {
                    break Err(AppError::WebSocket("stream ended".to_string()).into());
                }
            }
        };

        if let Err(e) = write.send(tungstenite::Message::Close(None)).await {
            tracing::debug!(error = %e, "Close frame not delivered");
        }
        outcome
    }

    fn handle_frame(&self, text: &str) -> Result<(), AppError> {
        let received_ms = chrono::Utc::now().timestamp_millis();
        let Some(tick) = parse_trade_frame(text, received_ms) else {
            self.record_drop("unparsable trade frame");
            return Ok(());
        };
        self.store.insert_tick(&tick)?;
        self.status_tx.send_modify(|s| {
            s.ticks_stored += 1;
            s.last_tick_ms = Some(tick.timestamp_ms);
        });
        Ok(())
    }

    fn record_drop(&self, reason: &'static str) {
        tracing::debug!(reason, "Dropping inbound frame");
        self.status_tx.send_modify(|s| s.frames_dropped += 1);
    }
}

fn is_store_failure(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<AppError>(), Some(AppError::Store(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_cap_and_resets() {
        let mut b = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(4), 2.0);
        assert_eq!(b.next_delay(), Duration::from_secs(1));
        assert_eq!(b.next_delay(), Duration::from_secs(2));
        assert_eq!(b.next_delay(), Duration::from_secs(4));
        assert_eq!(b.next_delay(), Duration::from_secs(4));
        assert_eq!(b.attempt, 4);
        b.reset();
        assert_eq!(b.attempt, 0);
        assert_eq!(b.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn store_failures_are_recognised_through_anyhow() {
        let err = anyhow::Error::new(AppError::Store(rusqlite::Error::InvalidQuery));
        assert!(is_store_failure(&err));
        let err = anyhow::Error::new(AppError::WebSocket("stream ended".to_string()));
        assert!(!is_store_failure(&err));
    }
}
