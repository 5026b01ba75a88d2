//! Label-driven container healing
//!
//! Provides:
//! - The label taxonomy and per-container overrides
//! - The health and cleanup passes run on every tick
//! - Action outcomes and sweep reports

pub mod labels;
pub mod monitor;
pub mod recovery;

pub use labels::LabelPolicy;
pub use monitor::Monitor;
pub use recovery::Report;
