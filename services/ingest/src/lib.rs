pub mod config;
pub mod connector;
pub mod crm;
pub mod orchestrator;
pub mod retry;
pub mod transform;

#[cfg(any(test, feature = "test-support"))]
pub mod fakes;

pub use config::IngestConfig;
pub use connector::{Connector, StartedSync, SyncRequest};
pub use crm::client::{CrmClient, CrmClientConfig, UpstreamError};
pub use orchestrator::SyncOrchestrator;
pub use retry::RetryPolicy;
