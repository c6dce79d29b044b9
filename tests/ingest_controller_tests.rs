use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use pair_analytics::event::IngestPhase;
use pair_analytics::ingest::IngestController;
use pair_analytics::tick_store::{TickStore, IN_MEMORY_PATH};

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    cond()
}

fn temp_db_path(tag: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir()
        .join(format!("pair-analytics-ingest-{}-{}-{}.db", tag, std::process::id(), nanos))
        .to_string_lossy()
        .into_owned()
}

fn remove_db(path: &str) {
    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(format!("{}-wal", path));
    let _ = std::fs::remove_file(format!("{}-shm", path));
}

const BTC_TRADE: &str =
    r#"{"stream":"btcusdt@trade","data":{"e":"trade","E":1001,"T":1000,"s":"BTCUSDT","p":"20000.0","q":"0.01"}}"#;

/// Base URL of a port nothing listens on.
fn refused_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("ws://127.0.0.1:{}", port)
}

/// Local stand-in for the exchange: accepts one websocket client, sends
/// `frames`, then idles until the client closes.
fn spawn_trade_server(frames: Vec<String>) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let port = listener.local_addr().unwrap().port();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            for frame in frames {
                ws.send(Message::Text(frame)).await.unwrap();
            }
            while let Some(msg) = ws.next().await {
                match msg {
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });
    });
    format!("ws://127.0.0.1:{}", port)
}

#[test]
fn stop_on_never_started_controller_is_a_no_op() {
    let store = TickStore::open(IN_MEMORY_PATH).unwrap();
    let controller = IngestController::new(refused_base_url().as_str(), vec!["BTCUSDT".into()], store);
    assert!(controller.stop());
    assert!(!controller.is_running());
    assert_eq!(controller.workers_spawned(), 0);
    assert_eq!(controller.status().phase, IngestPhase::Idle);
}

#[test]
/// A second start while the worker is alive must not spawn another worker.
fn start_is_idempotent_while_running() {
    let store = TickStore::open(IN_MEMORY_PATH).unwrap();
    let controller = IngestController::new(&refused_base_url(), vec!["BTCUSDT".into()], store);

    assert!(controller.start().unwrap());
    assert!(!controller.start().unwrap());
    assert_eq!(controller.workers_spawned(), 1);
    assert!(controller.is_running());

    let started = Instant::now();
    assert!(controller.stop());
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(!controller.is_running());
}

#[test]
/// Connection failures surface as a reconnecting phase instead of a silently
/// dead worker.
fn refused_connection_is_reported_as_reconnecting() {
    let store = TickStore::open(IN_MEMORY_PATH).unwrap();
    let controller = IngestController::new(&refused_base_url(), vec!["BTCUSDT".into()], store);
    controller.start().unwrap();

    assert!(wait_until(Duration::from_secs(5), || matches!(
        controller.status().phase,
        IngestPhase::Reconnecting { .. }
    )));
    assert!(controller.status().reconnects >= 1);

    assert!(controller.stop());
    assert_eq!(controller.status().phase, IngestPhase::Stopped);
}

#[test]
fn controller_can_restart_after_stop() {
    let store = TickStore::open(IN_MEMORY_PATH).unwrap();
    let controller = IngestController::new(&refused_base_url(), vec!["BTCUSDT".into()], store);
    assert!(controller.start().unwrap());
    assert!(controller.stop());
    assert!(controller.start().unwrap());
    assert_eq!(controller.workers_spawned(), 2);
    assert!(controller.stop());
}

#[test]
fn invalid_base_url_fails_start_without_spawning() {
    let store = TickStore::open(IN_MEMORY_PATH).unwrap();
    let controller = IngestController::new("not a url", vec!["BTCUSDT".into()], store);
    assert!(controller.start().is_err());
    assert_eq!(controller.workers_spawned(), 0);
}

#[test]
/// End to end against a local server: parsed frames are stored, a malformed
/// frame is counted and skipped, and stop returns within its bound.
fn streamed_trades_reach_the_store() {
    let frames = vec![
        BTC_TRADE.to_string(),
        "{not json".to_string(),
        r#"{"e":"trade","E":901,"T":900,"s":"ETHUSDT","p":"1500.5"}"#.to_string(),
    ];
    let base_url = spawn_trade_server(frames);
    let store = TickStore::open(IN_MEMORY_PATH).unwrap();
    let controller = IngestController::new(
        &base_url,
        vec!["BTCUSDT".into(), "ETHUSDT".into()],
        Arc::clone(&store),
    );
    assert!(controller.start().unwrap());

    assert!(wait_until(Duration::from_secs(10), || {
        let s = controller.status();
        s.ticks_stored == 2 && s.frames_dropped == 1
    }));
    let status = controller.status();
    assert_eq!(status.phase, IngestPhase::Connected);
    assert_eq!(status.last_tick_ms, Some(900));

    let ticks = store.get_ticks(&["BTCUSDT", "ETHUSDT"], None, None).unwrap();
    assert_eq!(ticks.len(), 2);
    assert_eq!(ticks[0].symbol, "ETHUSDT");
    assert_eq!(ticks[0].qty, 0.0);
    assert_eq!(ticks[1].timestamp_ms, 1000);
    assert_eq!(store.get_latest_timestamp("BTCUSDT").unwrap(), Some(1000));

    let started = Instant::now();
    assert!(controller.stop());
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(controller.status().phase, IngestPhase::Stopped);
}

#[test]
/// A worker that outlives the stop deadline stays the active worker: a later
/// start must not spawn a second writer next to it.
fn start_after_timed_out_stop_does_not_spawn_second_worker() {
    let path = temp_db_path("stuck");
    let store = TickStore::open(&path).unwrap();
    // Another connection holds the write lock, so the worker's first insert
    // waits in sqlite's busy handler instead of observing shutdown.
    let blocker = rusqlite::Connection::open(&path).unwrap();
    blocker.execute_batch("BEGIN EXCLUSIVE").unwrap();

    let base_url = spawn_trade_server(vec![BTC_TRADE.to_string()]);
    let controller =
        IngestController::new(&base_url, vec!["BTCUSDT".into()], Arc::clone(&store));
    assert!(controller.start().unwrap());
    assert!(wait_until(Duration::from_secs(5), || {
        controller.status().phase == IngestPhase::Connected
    }));
    std::thread::sleep(Duration::from_millis(300));

    assert!(!controller.stop());
    assert!(controller.is_running());
    assert!(!controller.start().unwrap());
    assert_eq!(controller.workers_spawned(), 1);

    blocker.execute_batch("COMMIT").unwrap();
    assert!(wait_until(Duration::from_secs(5), || !controller.is_running()));
    assert!(controller.stop());
    assert_eq!(controller.status().ticks_stored, 1);
    assert_eq!(controller.status().phase, IngestPhase::Stopped);

    drop((controller, blocker, store));
    remove_db(&path);
}

#[test]
/// Insert failures end the worker for good; they are not retried as network
/// errors.
fn store_failure_fails_the_worker_without_reconnecting() {
    let path = temp_db_path("broken");
    let store = TickStore::open(&path).unwrap();
    rusqlite::Connection::open(&path)
        .unwrap()
        .execute_batch("DROP TABLE ticks")
        .unwrap();

    let base_url = spawn_trade_server(vec![BTC_TRADE.to_string()]);
    let controller =
        IngestController::new(&base_url, vec!["BTCUSDT".into()], Arc::clone(&store));
    assert!(controller.start().unwrap());

    assert!(wait_until(Duration::from_secs(10), || !controller.is_running()));
    let status = controller.status();
    assert!(
        matches!(status.phase, IngestPhase::Failed(_)),
        "phase {:?}",
        status.phase
    );
    assert_eq!(status.reconnects, 0);
    assert_eq!(status.ticks_stored, 0);
    assert!(controller.stop());

    drop((controller, store));
    remove_db(&path);
}
