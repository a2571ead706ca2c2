//! Output artifact cache: synthesized audio files and their lifecycle.

pub mod cache;
pub mod sweeper;

pub use cache::{ArtifactCache, SweepReport};
pub use sweeper::{SweeperHandle, spawn_background_sweep, spawn_sweeper};
