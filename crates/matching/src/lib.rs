pub mod config;
pub mod engine;
pub mod phone;
pub mod stats;

pub use config::MatchingConfig;
pub use engine::{resolve, Resolution};
pub use phone::normalize_phone;
pub use stats::ResolutionStats;
