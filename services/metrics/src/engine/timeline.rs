use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};

use super::classify::is_closed_won;
use super::compute::ScopedView;
use super::models::{Granularity, TimelineBucket, TimelineCounts, TimelineReport};

/// Daily up to 31 days of span, weekly up to 90, monthly beyond.
pub fn granularity(date_from: NaiveDate, date_to: NaiveDate) -> Granularity {
    let span_days = (date_to - date_from).num_days();
    if span_days <= 31 {
        Granularity::Daily
    } else if span_days <= 90 {
        Granularity::Weekly
    } else {
        Granularity::Monthly
    }
}

/// First day of the period containing `date`. Weeks start on Monday.
pub fn period_start(granularity: Granularity, date: NaiveDate) -> NaiveDate {
    match granularity {
        Granularity::Daily => date,
        Granularity::Weekly => {
            date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
        }
        Granularity::Monthly => date - Duration::days(i64::from(date.day0())),
    }
}

fn next_period(granularity: Granularity, start: NaiveDate) -> Option<NaiveDate> {
    match granularity {
        Granularity::Daily => start.checked_add_signed(Duration::days(1)),
        Granularity::Weekly => start.checked_add_signed(Duration::days(7)),
        Granularity::Monthly => start.checked_add_months(Months::new(1)),
    }
}

fn bump(
    slots: &mut BTreeMap<NaiveDate, TimelineCounts>,
    granularity: Granularity,
    at: Option<DateTime<Utc>>,
    field: fn(&mut TimelineCounts) -> &mut i64,
) {
    if let Some(at) = at {
        if let Some(counts) = slots.get_mut(&period_start(granularity, at.date_naive())) {
            *field(counts) += 1;
        }
    }
}

/// Bucketed series over `[date_from, date_to]`, every period present, zeros included.
pub fn timeline(view: &ScopedView<'_>, date_from: NaiveDate, date_to: NaiveDate) -> TimelineReport {
    let granularity = granularity(date_from, date_to);

    let mut slots: BTreeMap<NaiveDate, TimelineCounts> = BTreeMap::new();
    let mut cursor = Some(period_start(granularity, date_from));
    while let Some(start) = cursor.filter(|s| *s <= date_to) {
        slots.insert(start, TimelineCounts::default());
        cursor = next_period(granularity, start);
    }

    for c in &view.contacts {
        bump(&mut slots, granularity, c.created_at, |t| &mut t.contacts);
    }
    for d in &view.deals {
        bump(&mut slots, granularity, d.created_at, |t| &mut t.deals);
        if is_closed_won(d.stage.as_deref()) {
            bump(&mut slots, granularity, d.created_at, |t| &mut t.won_deals);
        }
    }
    for c in &view.calls {
        bump(&mut slots, granularity, c.call_timestamp, |t| &mut t.calls);
    }

    let totals = TimelineCounts {
        contacts: view.contacts.len() as i64,
        deals: view.deals.len() as i64,
        won_deals: view.won_deals().len() as i64,
        calls: view.calls.len() as i64,
    };

    let buckets = slots
        .into_iter()
        .map(|(start, counts)| {
            let end = next_period(granularity, start)
                .and_then(|next| next.pred_opt())
                .map_or(date_to, |last| last.min(date_to));
            TimelineBucket {
                start: start.max(date_from),
                end,
                counts,
            }
        })
        .collect();

    TimelineReport {
        granularity,
        date_from,
        date_to,
        buckets,
        totals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{book, march, scoped};
    use crmirror_db::metrics::models::MetricsDataset;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    #[test]
    fn granularity_follows_span() {
        let from = d(3, 1);
        assert_eq!(granularity(from, d(3, 21)), Granularity::Daily);
        assert_eq!(granularity(from, d(4, 1)), Granularity::Daily);
        assert_eq!(granularity(from, d(4, 30)), Granularity::Weekly);
        assert_eq!(granularity(from, d(5, 30)), Granularity::Weekly);
        assert_eq!(granularity(from, d(5, 31)), Granularity::Monthly);
        assert_eq!(granularity(from, d(9, 17)), Granularity::Monthly);
    }

    #[test]
    fn weeks_start_on_monday() {
        // 2026-03-04 is a Wednesday
        assert_eq!(period_start(Granularity::Weekly, d(3, 4)), d(3, 2));
        assert_eq!(period_start(Granularity::Weekly, d(3, 2)), d(3, 2));
        assert_eq!(period_start(Granularity::Monthly, d(3, 31)), d(3, 1));
    }

    #[test]
    fn daily_buckets_sum_to_totals() {
        let ds = scoped(book(), march(None));
        let report = timeline(&ScopedView::new(&ds), d(3, 1), d(3, 31));

        assert_eq!(report.granularity, Granularity::Daily);
        assert_eq!(report.buckets.len(), 31);
        let sum = |f: fn(&TimelineCounts) -> i64| report.buckets.iter().map(|b| f(&b.counts)).sum::<i64>();
        assert_eq!(sum(|c| c.contacts), report.totals.contacts);
        assert_eq!(sum(|c| c.deals), report.totals.deals);
        assert_eq!(sum(|c| c.won_deals), report.totals.won_deals);
        assert_eq!(sum(|c| c.calls), report.totals.calls);
        assert_eq!(report.totals.calls, 4);

        let mar2 = report.buckets.iter().find(|b| b.start == d(3, 2)).unwrap();
        assert_eq!(mar2.counts.contacts, 1);
        assert_eq!(mar2.counts.calls, 1);
    }

    #[test]
    fn weekly_buckets_are_clipped_to_the_range() {
        let ds = scoped(book(), march(None));
        let report = timeline(&ScopedView::new(&ds), d(3, 4), d(5, 1));

        assert_eq!(report.granularity, Granularity::Weekly);
        let first = report.buckets.first().unwrap();
        assert_eq!((first.start, first.end), (d(3, 4), d(3, 8)));
        let last = report.buckets.last().unwrap();
        assert_eq!((last.start, last.end), (d(4, 27), d(5, 1)));
        assert!(report.buckets.iter().all(|b| b.start <= b.end));
        assert!(report.buckets.windows(2).all(|w| w[0].end.succ_opt() == Some(w[1].start)));
    }

    #[test]
    fn empty_periods_are_present_with_zeros() {
        let ds = MetricsDataset::default();
        let report = timeline(&ScopedView::new(&ds), d(2, 15), d(12, 31));

        assert_eq!(report.granularity, Granularity::Monthly);
        assert_eq!(report.buckets.len(), 11);
        assert_eq!(report.buckets[0].start, d(2, 15));
        assert_eq!(report.buckets[0].end, d(2, 28));
        assert!(report.buckets.iter().all(|b| b.counts == TimelineCounts::default()));
    }
}
