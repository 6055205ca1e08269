use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use crmirror_common::types::Observed;
use crmirror_db::matches::models::CallContactMatch;
use crmirror_db::metrics::models::{CallFact, ContactFact, DealFact, MetricsDataset};

use super::classify::{
    deal_stage_bucket, is_closed_won, is_customer, lifecycle_bucket, DEAL_STAGES,
    LIFECYCLE_STAGES, UNKNOWN_BUCKET,
};
use super::models::{
    AttributionCounts, AttributionKey, AttributionPolicy, CallAttribution, CallToCloseReport,
    CallTotals, ConversionReport, FunnelBucket, FunnelReport, OwnerCallToClose, SalesReport,
};

/// The canonical deal value property: full contract value.
pub const AMOUNT_FIELD: &str = "amount";

/// Deal-owner coverage at or above which deals, not contacts, own attribution.
pub const DEAL_OWNER_COVERAGE_THRESHOLD: f64 = 0.5;

/// Division that reports 0 instead of NaN or infinity.
pub fn ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator <= 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// The dataset rows admitted by its full scope, owner included.
#[derive(Debug, Clone)]
pub struct ScopedView<'a> {
    pub contacts: Vec<&'a ContactFact>,
    pub deals: Vec<&'a DealFact>,
    pub calls: Vec<&'a CallFact>,
}

impl<'a> ScopedView<'a> {
    pub fn new(dataset: &'a MetricsDataset) -> Self {
        let scope = &dataset.scope;
        Self {
            contacts: dataset
                .contacts
                .iter()
                .filter(|c| scope.admits(c.owner_id.as_deref(), c.created_at))
                .collect(),
            deals: dataset
                .deals
                .iter()
                .filter(|d| scope.admits(d.owner_id.as_deref(), d.created_at))
                .collect(),
            calls: dataset
                .calls
                .iter()
                .filter(|c| scope.admits(c.owner_id.as_deref(), c.call_timestamp))
                .collect(),
        }
    }

    pub fn won_deals(&self) -> Vec<&'a DealFact> {
        self.deals
            .iter()
            .copied()
            .filter(|d| is_closed_won(d.stage.as_deref()))
            .collect()
    }
}

fn buckets(
    stages: &[&'static str],
    values: impl Iterator<Item = &'static str>,
) -> (Vec<FunnelBucket>, i64) {
    let mut counts: HashMap<&str, i64> = HashMap::new();
    let mut total = 0;
    for v in values {
        *counts.entry(v).or_default() += 1;
        total += 1;
    }
    let ordered = stages
        .iter()
        .copied()
        .chain(std::iter::once(UNKNOWN_BUCKET))
        .map(|stage| FunnelBucket {
            stage: stage.to_string(),
            count: counts.get(stage).copied().unwrap_or(0),
        })
        .collect();
    (ordered, total)
}

pub fn funnel(view: &ScopedView<'_>) -> FunnelReport {
    let (contacts, total_contacts) = buckets(
        LIFECYCLE_STAGES,
        view.contacts
            .iter()
            .map(|c| lifecycle_bucket(c.lifecycle_stage.as_deref())),
    );
    let (deals, total_deals) = buckets(
        DEAL_STAGES,
        view.deals
            .iter()
            .map(|d| deal_stage_bucket(d.stage.as_deref())),
    );
    FunnelReport {
        contacts,
        deals,
        total_contacts,
        total_deals,
    }
}

pub fn sales(view: &ScopedView<'_>) -> SalesReport {
    let won = view.won_deals();
    let amounts: Vec<f64> = won.iter().filter_map(|d| d.amount).collect();

    let total_sales = if !won.is_empty() && amounts.is_empty() {
        Observed::unavailable(format!(
            "{} closed-won deals, none with {AMOUNT_FIELD}",
            won.len()
        ))
    } else {
        Observed::value(amounts.iter().sum())
    };

    SalesReport {
        amount_field: AMOUNT_FIELD.to_string(),
        won_deals: won.len() as i64,
        amount_populated: amounts.len() as i64,
        total_sales,
    }
}

pub fn conversion(view: &ScopedView<'_>) -> ConversionReport {
    let deals_total = view.deals.len() as i64;
    let deals_won = view.won_deals().len() as i64;
    let contacts_total = view.contacts.len() as i64;
    let customers = view
        .contacts
        .iter()
        .filter(|c| is_customer(c.lifecycle_stage.as_deref()))
        .count() as i64;

    ConversionReport {
        deals_total,
        deals_won,
        deal_win_rate: ratio(deals_won, deals_total),
        contacts_total,
        customers,
        contact_conversion_rate: ratio(customers, contacts_total),
        sales: sales(view),
    }
}

fn matches_by_call(dataset: &MetricsDataset) -> HashMap<&str, &CallContactMatch> {
    dataset
        .matches
        .iter()
        .map(|m| (m.call_id.as_str(), m))
        .collect()
}

pub fn call_totals(dataset: &MetricsDataset, view: &ScopedView<'_>) -> CallTotals {
    let matches = matches_by_call(dataset);
    let mut totals = CallTotals {
        total_calls: view.calls.len() as i64,
        ..Default::default()
    };
    for call in &view.calls {
        if let Some(m) = matches.get(call.external_id.as_str()) {
            totals.matched_calls += 1;
            if m.ambiguous {
                totals.ambiguous_calls += 1;
            }
        }
    }
    totals.unmatched_calls = totals.total_calls - totals.matched_calls;
    totals
}

/// Policy decided on every deal in the time window, whoever owns it.
pub fn attribution_policy(dataset: &MetricsDataset) -> (AttributionPolicy, f64) {
    let window = dataset.scope.without_owner();
    let deals: Vec<&DealFact> = dataset
        .deals
        .iter()
        .filter(|d| window.admits_time(d.created_at))
        .collect();
    let owned = deals.iter().filter(|d| d.owner_id.is_some()).count() as i64;
    let coverage = ratio(owned, deals.len() as i64);

    let policy = if !deals.is_empty() && coverage >= DEAL_OWNER_COVERAGE_THRESHOLD {
        AttributionPolicy::DealOwner
    } else {
        AttributionPolicy::ContactOwner
    };
    (policy, coverage)
}

fn owner_of(
    policy: AttributionPolicy,
    call: &CallFact,
    matched: Option<&CallContactMatch>,
    latest_deal: &HashMap<&str, &DealFact>,
) -> (Option<String>, AttributionKey) {
    if let Some(m) = matched {
        if policy == AttributionPolicy::DealOwner {
            if let Some(owner) = latest_deal
                .get(m.contact_id.as_str())
                .and_then(|d| d.owner_id.clone())
            {
                return (Some(owner), AttributionKey::DealOwner);
            }
        }
        if let Some(owner) = m.owner_id.clone() {
            return (Some(owner), AttributionKey::ContactOwner);
        }
    }
    match call.owner_id.clone() {
        Some(owner) => (Some(owner), AttributionKey::CallOwner),
        None => (None, AttributionKey::Unattributed),
    }
}

fn won_deal_owner(
    policy: AttributionPolicy,
    deal: &DealFact,
    contact_owners: &HashMap<String, Option<String>>,
) -> Option<String> {
    if policy == AttributionPolicy::DealOwner && deal.owner_id.is_some() {
        return deal.owner_id.clone();
    }
    deal.contact_id
        .as_ref()
        .and_then(|c| contact_owners.get(c))
        .and_then(|o| o.clone())
        .or_else(|| deal.owner_id.clone())
}

/// Per-owner won deals over attributed calls.
///
/// Attribution runs over the whole time window; an owner filter selects rows afterwards.
pub fn call_to_close(dataset: &MetricsDataset, view: &ScopedView<'_>) -> CallToCloseReport {
    let (policy, coverage) = attribution_policy(dataset);
    let window = dataset.scope.without_owner();
    let owner_filter = dataset.scope.owner_id.as_deref();
    let matches = matches_by_call(dataset);

    let window_deals: Vec<&DealFact> = dataset
        .deals
        .iter()
        .filter(|d| window.admits_time(d.created_at))
        .collect();

    // most recently created deal per contact; ties go to the smaller id
    let mut latest_deal: HashMap<&str, &DealFact> = HashMap::new();
    for deal in &window_deals {
        let Some(contact_id) = deal.contact_id.as_deref() else {
            continue;
        };
        let replace = match latest_deal.get(contact_id) {
            Some(current) => {
                (deal.created_at, Reverse(&deal.external_id))
                    > (current.created_at, Reverse(&current.external_id))
            }
            None => true,
        };
        if replace {
            latest_deal.insert(contact_id, deal);
        }
    }

    let mut per_owner: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    let mut attribution = Vec::new();
    let mut key_counts = AttributionCounts::default();

    let mut window_calls: Vec<&CallFact> = dataset
        .calls
        .iter()
        .filter(|c| window.admits_time(c.call_timestamp))
        .collect();
    window_calls.sort_by(|a, b| a.external_id.cmp(&b.external_id));

    for call in window_calls {
        let matched = matches.get(call.external_id.as_str()).copied();
        let (owner_id, key) = owner_of(policy, call, matched, &latest_deal);
        if owner_filter.is_some() && owner_id.as_deref() != owner_filter {
            continue;
        }
        if let Some(owner) = &owner_id {
            per_owner.entry(owner.clone()).or_default().0 += 1;
        }
        key_counts.record(key);
        attribution.push(CallAttribution {
            call_id: call.external_id.clone(),
            owner_id,
            key,
        });
    }

    for deal in window_deals.iter().filter(|d| is_closed_won(d.stage.as_deref())) {
        let Some(owner) = won_deal_owner(policy, deal, &dataset.deal_contact_owners) else {
            continue;
        };
        if owner_filter.is_some_and(|f| f != owner) {
            continue;
        }
        per_owner.entry(owner).or_default().1 += 1;
    }

    let names: HashMap<&str, String> = dataset
        .owners
        .iter()
        .map(|o| (o.external_id.as_str(), o.display_name()))
        .collect();

    let mut owners: Vec<OwnerCallToClose> = per_owner
        .into_iter()
        .map(|(owner_id, (calls, won_deals))| OwnerCallToClose {
            display_name: names
                .get(owner_id.as_str())
                .cloned()
                .unwrap_or_else(|| owner_id.clone()),
            owner_id,
            calls,
            won_deals,
            call_to_close_rate: ratio(won_deals, calls),
        })
        .collect();
    owners.sort_by(|a, b| b.calls.cmp(&a.calls).then_with(|| a.owner_id.cmp(&b.owner_id)));

    CallToCloseReport {
        policy,
        deal_owner_coverage: coverage,
        totals: call_totals(dataset, view),
        owners,
        key_counts,
        attribution,
    }
}
