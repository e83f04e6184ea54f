//! Synthetic 12-lead ECG engine: per-lead waveform synthesis, fixed-length rolling buffers
//! advanced on a timer, and a snapshot mailbox for readers running on their own schedule.
pub mod config;
pub mod engine;
pub mod signal;
pub mod types;
pub use config::EngineConfig;
pub use engine::EcgEngine;
pub use signal::{
    render_lead_png, render_snapshot_pngs, ChannelSummary, PlotStyle, Snapshot,
    SnapshotPublisher, StreamError,
};
pub use types::{ChannelId, StopOutcome, StreamCommand, WaveformParameters, CHANNEL_COUNT};
