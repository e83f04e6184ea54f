// src/signal/mod.rs
pub mod buffer;
pub mod error;
pub mod plot;
pub mod scheduler;
pub mod snapshot;
pub mod synth;
pub use buffer::{ChannelBuffer, ChannelSet, TickUpdate};
pub use error::StreamError;
pub use plot::{render_lead_png, render_snapshot_pngs, PlotStyle};
pub use scheduler::{StreamScheduler, TickReport};
pub use snapshot::{ChannelSummary, LeadSamples, Snapshot, SnapshotPublisher};
pub use synth::{ChannelStep, SynthSettings, WaveformSynthesizer};
