use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid interval '{0}'")]
    InvalidInterval(String),

    #[error("tick store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
