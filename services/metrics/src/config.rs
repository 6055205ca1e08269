use std::time::Duration;

use crmirror_common::error::{CrmirrorError, CrmirrorResult};
use crmirror_config::parse_var_or;

/// Match rebuild loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsWorkerConfig {
    pub rebuild_interval: Duration,
}

impl MetricsWorkerConfig {
    pub fn from_env() -> CrmirrorResult<Self> {
        let secs: u64 = parse_var_or("MATCH_REBUILD_INTERVAL_SECS", 900)?;
        if secs == 0 {
            return Err(CrmirrorError::Config(
                "MATCH_REBUILD_INTERVAL_SECS must be positive".to_owned(),
            ));
        }
        Ok(Self {
            rebuild_interval: Duration::from_secs(secs),
        })
    }
}
