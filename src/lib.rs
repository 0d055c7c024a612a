//! Face-touch detection for a live camera feed.
//!
//! Frames are gated by an adaptive sampling rate, compared against the
//! previous frame's fingerprint to detect movement, and only while the
//! person is moving run through a hand segmentation model whose mask is
//! reduced to a touch / no-touch decision. Alerts are debounced and handed
//! to an [`alert::AlertSink`].

pub mod alert;
pub mod capture;
pub mod clock;
pub mod config;
pub mod frame;
pub mod inference;
pub mod movement;
pub mod output;
pub mod pipeline;
pub mod rate;
pub mod touch;

pub use config::{Config, ConfigError};
pub use frame::Frame;
pub use pipeline::{Cycle, Pipeline};
