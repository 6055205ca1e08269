pub mod config;
pub mod engine;
pub mod resolution;

#[cfg(any(test, feature = "test-support"))]
pub mod fakes;

pub use config::MetricsWorkerConfig;
pub use engine::models::MetricsQuery;
pub use engine::service::MetricsEngine;
pub use resolution::ResolutionJob;
