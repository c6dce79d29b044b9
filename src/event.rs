/// Lifecycle phase of the ingest worker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IngestPhase {
    #[default]
    Idle,
    Connecting,
    Connected,
    Reconnecting {
        attempt: u32,
        delay_ms: u64,
    },
    Stopped,
    Failed(String),
}

/// Snapshot published by the ingest worker on every state change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IngestStatus {
    pub phase: IngestPhase,
    pub ticks_stored: u64,
    pub frames_dropped: u64,
    pub reconnects: u32,
    pub last_tick_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedHealth {
    /// Worker never started or was stopped.
    NotStarted,
    Failed,
    Reconnecting,
    /// Connected (or connecting) but the store has nothing for this symbol yet.
    AwaitingData,
    Live,
    Stale,
}

/// Tell "no data yet" apart from "broken feed" for one symbol, combining the
/// worker phase with the newest stored timestamp for that symbol.
pub fn classify_feed_health(
    status: &IngestStatus,
    latest_tick_ms: Option<i64>,
    now_ms: i64,
    stale_after_ms: i64,
) -> FeedHealth {
    match status.phase {
        IngestPhase::Idle | IngestPhase::Stopped => return FeedHealth::NotStarted,
        IngestPhase::Failed(_) => return FeedHealth::Failed,
        IngestPhase::Reconnecting { .. } => return FeedHealth::Reconnecting,
        IngestPhase::Connecting | IngestPhase::Connected => {}
    }
    match latest_tick_ms {
        None => FeedHealth::AwaitingData,
        Some(ts) if now_ms.saturating_sub(ts) > stale_after_ms => FeedHealth::Stale,
        Some(_) => FeedHealth::Live,
    }
}
