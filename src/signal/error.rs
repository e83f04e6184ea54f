use thiserror::Error;
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("channel id must be within 1..=12, got {0}")]
    InvalidChannel(u8),
    #[error("channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
    #[error("samples per tick mismatch on lead {channel}: expected {expected}, got {actual}")]
    SampleCountMismatch {
        channel: u8,
        expected: usize,
        actual: usize,
    },
    #[error("cannot roll {requested} samples into a buffer of length {capacity}")]
    RollTooLarge { requested: usize, capacity: usize },
    #[error("buffer length drifted on lead {channel}: expected {expected}, got {actual}")]
    LengthDrift {
        channel: u8,
        expected: usize,
        actual: usize,
    },
    #[error("samples per tick must be greater than zero")]
    EmptyStep,
    #[error("stale snapshot: version {offered} is not newer than published {current}")]
    StaleSnapshot { current: u64, offered: u64 },
    #[error("scheduler is already running")]
    AlreadyRunning,
    #[error("scheduler is still shutting down after a timed-out stop")]
    Stopping,
    #[error("scheduler thread panicked; its state is gone")]
    SchedulerLost,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to render plot: {0}")]
    Plot(String),
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for StreamError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        StreamError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for StreamError {
    fn from(value: image::ImageError) -> Self {
        StreamError::Plot(value.to_string())
    }
}
