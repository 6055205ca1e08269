use std::time::Duration;

use crmirror_common::error::{CrmirrorError, CrmirrorResult};
use crmirror_config::{get_var_or, parse_var_or};
use crmirror_db::sync::models::SyncMode;

/// Worker loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestConfig {
    /// Pause between passes; `None` runs a single pass and exits.
    pub interval: Option<Duration>,
    pub mode: SyncMode,
}

impl IngestConfig {
    pub fn from_env() -> CrmirrorResult<Self> {
        let interval = match std::env::var("SYNC_INTERVAL_SECS") {
            Ok(_) => {
                let secs: u64 = parse_var_or("SYNC_INTERVAL_SECS", 0)?;
                if secs == 0 {
                    return Err(CrmirrorError::Config(
                        "SYNC_INTERVAL_SECS must be positive".to_owned(),
                    ));
                }
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        let mode = get_var_or("SYNC_MODE", "incremental")
            .parse()
            .map_err(|e: String| CrmirrorError::Config(format!("invalid SYNC_MODE: {e}")))?;

        Ok(Self { interval, mode })
    }
}
