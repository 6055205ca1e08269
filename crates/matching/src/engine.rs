use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use crmirror_db::matches::models::CallContactMatch;
use crmirror_db::mirror::models::{CallNumbers, ContactPhones};

use crate::config::MatchingConfig;
use crate::phone::normalize_phone;
use crate::stats::ResolutionStats;

#[derive(Debug, Clone)]
pub struct Resolution {
    /// One entry per matched call, ordered by call id.
    pub matches: Vec<CallContactMatch>,
    pub stats: ResolutionStats,
}

/// Normalized phone to the contacts listing it under `phone` or `mobile_phone`.
fn build_index<'a>(
    config: &MatchingConfig,
    contacts: &'a [ContactPhones],
    stats: &mut ResolutionStats,
) -> HashMap<String, Vec<&'a ContactPhones>> {
    let mut index: HashMap<String, Vec<&ContactPhones>> = HashMap::new();

    for contact in contacts {
        let keys: Vec<String> = [contact.phone.as_deref(), contact.mobile_phone.as_deref()]
            .into_iter()
            .flatten()
            .filter_map(|raw| normalize_phone(raw, config))
            .collect();

        if keys.is_empty() {
            stats.contacts_without_phone += 1;
            continue;
        }
        stats.contacts_indexed += 1;

        for key in keys {
            let bucket = index.entry(key).or_default();
            // phone and mobile_phone may normalize to the same key
            if !bucket.iter().any(|c| c.external_id == contact.external_id) {
                bucket.push(contact);
            }
        }
    }

    index
}

/// Owned contacts first, then most recently updated, then smallest external id.
fn pick<'a>(candidates: &[&'a ContactPhones]) -> Option<&'a ContactPhones> {
    candidates.iter().copied().min_by(|a, b| {
        (a.owner_id.is_none(), Reverse(a.last_updated), &a.external_id).cmp(&(
            b.owner_id.is_none(),
            Reverse(b.last_updated),
            &b.external_id,
        ))
    })
}

/// Link every call to at most one contact by normalized counterpart number.
///
/// Pure over its inputs: the same contacts and calls always give the same matches.
pub fn resolve(
    config: &MatchingConfig,
    contacts: &[ContactPhones],
    calls: &[CallNumbers],
    rebuilt_at: DateTime<Utc>,
) -> Resolution {
    let mut stats = ResolutionStats::default();
    let index = build_index(config, contacts, &mut stats);
    let mut matches = Vec::new();

    for call in calls {
        stats.calls_considered += 1;

        let Some(key) = call
            .counterpart_number()
            .and_then(|raw| normalize_phone(raw, config))
        else {
            stats.calls_without_phone += 1;
            continue;
        };

        let Some(candidates) = index.get(&key) else {
            stats.unmatched += 1;
            continue;
        };
        let Some(winner) = pick(candidates) else {
            stats.unmatched += 1;
            continue;
        };

        let ambiguous = candidates.len() > 1;
        if ambiguous {
            stats.ambiguous += 1;
            tracing::debug!(
                call_id = %call.external_id,
                candidates = candidates.len(),
                contact_id = %winner.external_id,
                "ambiguous phone match resolved by tie-break"
            );
        }
        stats.matched += 1;

        matches.push(CallContactMatch {
            call_id: call.external_id.clone(),
            contact_id: winner.external_id.clone(),
            owner_id: winner.owner_id.clone(),
            call_timestamp: call.call_timestamp,
            normalized_phone: key,
            candidate_count: i32::try_from(candidates.len()).unwrap_or(i32::MAX),
            ambiguous,
            rebuilt_at,
        });
    }

    matches.sort_by(|a, b| a.call_id.cmp(&b.call_id));
    Resolution { matches, stats }
}
