use chrono::{DateTime, NaiveDate, Utc};
use crmirror_common::error::{CrmirrorError, CrmirrorResult};
use crmirror_common::types::Observed;
use crmirror_db::metrics::models::MetricsScope;
use crmirror_db::sync::models::{ObjectType, RunStatus};
use serde::{Deserialize, Serialize};

/// Caller filter. Dates are inclusive UTC calendar days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsQuery {
    pub owner_id: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl MetricsQuery {
    pub fn validate(&self) -> CrmirrorResult<()> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(CrmirrorError::Validation(format!(
                    "date_from ({from}) is after date_to ({to})"
                )));
            }
        }
        if self.owner_id.as_deref().is_some_and(|o| o.trim().is_empty()) {
            return Err(CrmirrorError::Validation("owner_id must not be blank".to_owned()));
        }
        Ok(())
    }

    pub fn scope(&self) -> MetricsScope {
        MetricsScope::from_dates(self.owner_id.clone(), self.date_from, self.date_to)
    }

    /// Both bounds, or a validation error naming the first missing one.
    pub fn require_range(&self) -> CrmirrorResult<(NaiveDate, NaiveDate)> {
        let from = self
            .date_from
            .ok_or_else(|| CrmirrorError::Validation("date_from is required".to_owned()))?;
        let to = self
            .date_to
            .ok_or_else(|| CrmirrorError::Validation("date_to is required".to_owned()))?;
        Ok((from, to))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelBucket {
    pub stage: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelReport {
    pub contacts: Vec<FunnelBucket>,
    pub deals: Vec<FunnelBucket>,
    pub total_contacts: i64,
    pub total_deals: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesReport {
    /// Deal property summed for revenue.
    pub amount_field: String,
    pub won_deals: i64,
    /// Won deals carrying a value for `amount_field`.
    pub amount_populated: i64,
    pub total_sales: Observed<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionReport {
    pub deals_total: i64,
    pub deals_won: i64,
    pub deal_win_rate: f64,
    pub contacts_total: i64,
    pub customers: i64,
    pub contact_conversion_rate: f64,
    pub sales: SalesReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionPolicy {
    DealOwner,
    ContactOwner,
}

/// Which rule supplied a call's owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionKey {
    DealOwner,
    ContactOwner,
    CallOwner,
    Unattributed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallAttribution {
    pub call_id: String,
    pub owner_id: Option<String>,
    pub key: AttributionKey,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionCounts {
    pub deal_owner: i64,
    pub contact_owner: i64,
    pub call_owner: i64,
    pub unattributed: i64,
}

impl AttributionCounts {
    pub fn record(&mut self, key: AttributionKey) {
        match key {
            AttributionKey::DealOwner => self.deal_owner += 1,
            AttributionKey::ContactOwner => self.contact_owner += 1,
            AttributionKey::CallOwner => self.call_owner += 1,
            AttributionKey::Unattributed => self.unattributed += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerCallToClose {
    pub owner_id: String,
    pub display_name: String,
    pub calls: i64,
    pub won_deals: i64,
    pub call_to_close_rate: f64,
}

/// Raw call totals next to the matched subset they were derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTotals {
    pub total_calls: i64,
    pub matched_calls: i64,
    pub unmatched_calls: i64,
    pub ambiguous_calls: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToCloseReport {
    pub policy: AttributionPolicy,
    pub deal_owner_coverage: f64,
    pub totals: CallTotals,
    pub owners: Vec<OwnerCallToClose>,
    pub key_counts: AttributionCounts,
    pub attribution: Vec<CallAttribution>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineCounts {
    pub contacts: i64,
    pub deals: i64,
    pub won_deals: i64,
    pub calls: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineBucket {
    /// First day covered, clipped to `date_from`.
    pub start: NaiveDate,
    /// Last day covered, clipped to `date_to`.
    pub end: NaiveDate,
    #[serde(flatten)]
    pub counts: TimelineCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineReport {
    pub granularity: Granularity,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub buckets: Vec<TimelineBucket>,
    pub totals: TimelineCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastSync {
    pub object_type: ObjectType,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub generated_at: DateTime<Utc>,
    pub filter: MetricsQuery,
    pub funnel: FunnelReport,
    pub conversion: ConversionReport,
    pub calls: CallTotals,
    pub attribution_policy: AttributionPolicy,
    pub last_synced: Vec<LastSync>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_range_is_rejected() {
        let q = MetricsQuery {
            date_from: NaiveDate::from_ymd_opt(2026, 3, 10),
            date_to: NaiveDate::from_ymd_opt(2026, 3, 1),
            ..Default::default()
        };
        assert!(matches!(q.validate(), Err(CrmirrorError::Validation(_))));
    }

    #[test]
    fn missing_bound_is_named() {
        let q = MetricsQuery {
            date_from: NaiveDate::from_ymd_opt(2026, 3, 1),
            ..Default::default()
        };
        let err = q.require_range().unwrap_err();
        assert!(err.to_string().contains("date_to"), "got: {err}");

        let err = MetricsQuery::default().require_range().unwrap_err();
        assert!(err.to_string().contains("date_from"), "got: {err}");
    }

    #[test]
    fn bucket_counts_flatten_into_bucket() {
        let bucket = TimelineBucket {
            start: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 3, 8).unwrap(),
            counts: TimelineCounts {
                contacts: 1,
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&bucket).unwrap();
        assert_eq!(json["contacts"], 1);
        assert_eq!(json["start"], "2026-03-02");
    }
}
