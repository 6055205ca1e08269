use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::matches::models::CallContactMatch;
use crate::owners::models::Owner;
use crate::sync::models::SyncRun;

/// Owner and time window applied identically to every entity family.
///
/// Bounds are half-open: `from <= at < until`. A row without a timestamp is admitted
/// only when the scope has no time bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsScope {
    pub owner_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl MetricsScope {
    /// Inclusive calendar dates to `[date_from 00:00, date_to + 1 day 00:00)` in UTC.
    pub fn from_dates(
        owner_id: Option<String>,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> Self {
        Self {
            owner_id,
            from: date_from.map(start_of_day),
            until: date_to.map(|d| start_of_day(d) + Duration::days(1)),
        }
    }

    /// Same window, any owner.
    pub fn without_owner(&self) -> Self {
        Self {
            owner_id: None,
            ..self.clone()
        }
    }

    pub fn admits_time(&self, at: Option<DateTime<Utc>>) -> bool {
        match at {
            Some(at) => {
                self.from.map_or(true, |from| at >= from)
                    && self.until.map_or(true, |until| at < until)
            }
            None => self.from.is_none() && self.until.is_none(),
        }
    }

    pub fn admits_owner(&self, owner_id: Option<&str>) -> bool {
        match self.owner_id.as_deref() {
            Some(wanted) => owner_id == Some(wanted),
            None => true,
        }
    }

    pub fn admits(&self, owner_id: Option<&str>, at: Option<DateTime<Utc>>) -> bool {
        self.admits_owner(owner_id) && self.admits_time(at)
    }
}

fn start_of_day(d: NaiveDate) -> DateTime<Utc> {
    d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactFact {
    pub external_id: String,
    pub owner_id: Option<String>,
    pub lifecycle_stage: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealFact {
    pub external_id: String,
    pub owner_id: Option<String>,
    pub contact_id: Option<String>,
    pub stage: Option<String>,
    pub amount: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallFact {
    pub external_id: String,
    pub owner_id: Option<String>,
    pub call_timestamp: Option<DateTime<Utc>>,
}

/// Everything one aggregation needs, read from a single snapshot.
///
/// Entity lists are time-scoped only; the owner part of `scope` is applied by the
/// engine so attribution can see every owner in the window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsDataset {
    pub scope: MetricsScope,
    pub contacts: Vec<ContactFact>,
    pub deals: Vec<DealFact>,
    pub calls: Vec<CallFact>,
    /// Matches for the calls in `calls`.
    pub matches: Vec<CallContactMatch>,
    /// Owner of every contact referenced by an in-window deal, in or out of the window.
    pub deal_contact_owners: HashMap<String, Option<String>>,
    pub owners: Vec<Owner>,
    /// Latest success or partial run per object type.
    pub last_successful: Vec<SyncRun>,
}
