use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// CRM object families mirrored locally.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Contacts,
    Deals,
    Calls,
    Owners,
}

impl ObjectType {
    /// Sync order: owners first so directory lookups resolve for the rest.
    pub const ALL: [ObjectType; 4] = [Self::Owners, Self::Contacts, Self::Deals, Self::Calls];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contacts => "contacts",
            Self::Deals => "deals",
            Self::Calls => "calls",
            Self::Owners => "owners",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "contacts" => Ok(Self::Contacts),
            "deals" => Ok(Self::Deals),
            "calls" => Ok(Self::Calls),
            "owners" => Ok(Self::Owners),
            _ => Err(format!("unknown object type: {value}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown run status: {value}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TriggeredBy {
    Cron,
    Manual,
    Api,
}

impl TriggeredBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cron => "cron",
            Self::Manual => "manual",
            Self::Api => "api",
        }
    }
}

impl FromStr for TriggeredBy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "cron" => Ok(Self::Cron),
            "manual" => Ok(Self::Manual),
            "api" => Ok(Self::Api),
            _ => Err(format!("unknown trigger: {value}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Full,
    #[default]
    Incremental,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "full" => Ok(Self::Full),
            "incremental" => Ok(Self::Incremental),
            _ => Err(format!("unknown sync mode: {value}")),
        }
    }
}

/// Record counters accumulated over one run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunCounts {
    pub fetched: i64,
    pub inserted: i64,
    pub updated: i64,
    pub failed: i64,
}

impl RunCounts {
    pub fn committed(&self) -> i64 {
        self.inserted + self.updated
    }

    /// Terminal status for a run that reached the end of its pages.
    ///
    /// `failed` only when records were fetched and none of them committed.
    pub fn outcome(&self) -> RunStatus {
        if self.failed == 0 {
            RunStatus::Success
        } else if self.committed() > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub object_type: ObjectType,
    pub mode: SyncMode,
    pub status: RunStatus,
    pub triggered_by: TriggeredBy,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub records_fetched: i64,
    pub records_inserted: i64,
    pub records_updated: i64,
    pub records_failed: i64,
    pub error_message: Option<String>,
}

impl SyncRun {
    pub fn counts(&self) -> RunCounts {
        RunCounts {
            fetched: self.records_fetched,
            inserted: self.records_inserted,
            updated: self.records_updated,
            failed: self.records_failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncRunFilter {
    pub object_type: Option<ObjectType>,
    pub status: Option<RunStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl SyncRunFilter {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 500;

    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
