//! Shared report fixture: one March 2026 book of business across two owners.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use crmirror_db::matches::models::CallContactMatch;
use crmirror_db::metrics::models::{CallFact, ContactFact, DealFact, MetricsDataset, MetricsScope};
use crmirror_db::owners::models::Owner;

pub fn at(m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, m, d, 12, 0, 0).unwrap()
}

pub fn contact(id: &str, owner: Option<&str>, stage: Option<&str>, created: DateTime<Utc>) -> ContactFact {
    ContactFact {
        external_id: id.to_string(),
        owner_id: owner.map(str::to_string),
        lifecycle_stage: stage.map(str::to_string),
        created_at: Some(created),
    }
}

pub fn deal(
    id: &str,
    owner: Option<&str>,
    contact: Option<&str>,
    stage: &str,
    amount: Option<f64>,
    created: DateTime<Utc>,
) -> DealFact {
    DealFact {
        external_id: id.to_string(),
        owner_id: owner.map(str::to_string),
        contact_id: contact.map(str::to_string),
        stage: Some(stage.to_string()),
        amount,
        created_at: Some(created),
    }
}

pub fn call(id: &str, owner: Option<&str>, when: DateTime<Utc>) -> CallFact {
    CallFact {
        external_id: id.to_string(),
        owner_id: owner.map(str::to_string),
        call_timestamp: Some(when),
    }
}

pub fn matched(call_id: &str, contact_id: &str, owner: Option<&str>, ambiguous: bool) -> CallContactMatch {
    CallContactMatch {
        call_id: call_id.to_string(),
        contact_id: contact_id.to_string(),
        owner_id: owner.map(str::to_string),
        call_timestamp: None,
        normalized_phone: "5551234567".to_string(),
        candidate_count: if ambiguous { 2 } else { 1 },
        ambiguous,
        rebuilt_at: at(3, 31),
    }
}

pub fn owner(id: &str, name: &str) -> Owner {
    Owner {
        external_id: id.to_string(),
        upstream_name: Some(name.to_string()),
        email: None,
        display_name_override: None,
        synced_at: at(3, 1),
        updated_at: at(3, 1),
    }
}

/// Contacts c1..c3 and deals d1..d3 fall in March, c4 and k5 in April.
///
/// Calls k1, k2, k4 are matched; k3 is not. k4 is logged by o2 against o1's contact.
pub fn book() -> MetricsDataset {
    MetricsDataset {
        scope: MetricsScope::default(),
        contacts: vec![
            contact("c1", Some("o1"), Some("customer"), at(3, 2)),
            contact("c2", Some("o2"), Some("lead"), at(3, 5)),
            contact("c3", None, Some("not-a-stage"), at(3, 10)),
            contact("c4", Some("o1"), Some("lead"), at(4, 20)),
        ],
        deals: vec![
            deal("d1", Some("o1"), Some("c1"), "closedwon", Some(1000.0), at(3, 3)),
            deal("d2", Some("o2"), Some("c2"), "appointmentscheduled", None, at(3, 6)),
            deal("d3", None, Some("c3"), "closedwon", None, at(3, 12)),
        ],
        calls: vec![
            call("k1", Some("o1"), at(3, 2)),
            call("k2", Some("o2"), at(3, 5)),
            call("k3", None, at(3, 7)),
            call("k4", Some("o2"), at(3, 20)),
            call("k5", Some("o1"), at(4, 21)),
        ],
        matches: vec![
            matched("k1", "c1", Some("o1"), false),
            matched("k2", "c2", Some("o2"), true),
            matched("k4", "c1", Some("o1"), false),
        ],
        deal_contact_owners: HashMap::from([
            ("c1".to_string(), Some("o1".to_string())),
            ("c2".to_string(), Some("o2".to_string())),
            ("c3".to_string(), None),
        ]),
        owners: vec![owner("o1", "Ana Ortiz"), owner("o2", "Ben Okafor")],
        last_successful: Vec::new(),
    }
}

/// `book()` under `scope`, the way the store would return it: time window applied, owner not.
pub fn scoped(dataset: MetricsDataset, scope: MetricsScope) -> MetricsDataset {
    crate::fakes::snapshot(&dataset, &scope)
}

pub fn march(owner: Option<&str>) -> MetricsScope {
    MetricsScope::from_dates(
        owner.map(str::to_string),
        chrono::NaiveDate::from_ymd_opt(2026, 3, 1),
        chrono::NaiveDate::from_ymd_opt(2026, 3, 31),
    )
}
