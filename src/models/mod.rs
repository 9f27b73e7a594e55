//! Data Models
//!
//! Application-level configuration models. Pipeline data types live in
//! `panelsim-core`.

pub mod settings;

pub use settings::{PanelsimConfig, StorageBackend};
