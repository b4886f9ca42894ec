//! Statistics aggregator — dashboard metrics over a [`ComplaintSnapshot`].
//!
//! Everything here is a pure function of the snapshot. Nothing is cached or
//! maintained incrementally.
//!
//! Top-N ties keep first-seen order of the snapshot, which the store returns
//! newest first.

use crate::{
    complaint::{Category, Complaint, DisplayStatus},
    config::StatsConfig,
    delay::DelayClassifier,
    snapshot::ComplaintSnapshot,
    types::Timestamp,
};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

// ── Output types ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityCount {
    pub city_id: String,
    pub city_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: Category,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyCohort {
    /// Sunday that opens the week (UTC).
    pub week_start: NaiveDate,
    pub total_complaints: usize,
    /// Complaints filed this week that are resolved now, whenever that happened.
    pub resolved_complaints: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopReporter {
    pub masked_phone: String,
    pub citizen_name: String,
    pub complaint_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedHighlight {
    pub complaint_id: String,
    pub reference_number: String,
    pub category: Category,
    pub city_id: String,
    pub nagar_id: String,
    pub resolved_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub total: usize,
    pub pending: usize,
    pub delayed: usize,
    pub assigned: usize,
    pub in_progress: usize,
    pub resolved: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub generated_at: Timestamp,
    pub city_scope: Option<String>,
    pub status: StatusBreakdown,
    pub resolution_rate: f64,
    pub mean_resolution_hours: Option<f64>,
    pub top_cities: Vec<CityCount>,
    pub trending_categories: Vec<CategoryCount>,
    pub weekly_cohorts: Vec<WeeklyCohort>,
    pub top_reporter: Option<TopReporter>,
    pub recently_resolved: Vec<ResolvedHighlight>,
}

// ── Aggregator ─────────────────────────────────────────────────────

pub struct StatisticsAggregator {
    config: StatsConfig,
    classifier: DelayClassifier,
}

impl StatisticsAggregator {
    pub fn new(config: StatsConfig, classifier: DelayClassifier) -> Self {
        Self { config, classifier }
    }

    pub fn compute(&self, snapshot: &ComplaintSnapshot) -> DashboardStats {
        let complaints = &snapshot.complaints;
        let now = snapshot.taken_at;
        DashboardStats {
            generated_at: now,
            city_scope: snapshot.city_scope.clone(),
            status: status_breakdown(complaints, &self.classifier, now),
            resolution_rate: resolution_rate(complaints),
            mean_resolution_hours: mean_resolution_hours(complaints),
            top_cities: top_cities(snapshot, self.config.top_cities),
            trending_categories: trending_categories(complaints, self.config.top_categories),
            weekly_cohorts: weekly_cohorts(complaints, now, self.config.cohort_weeks),
            top_reporter: top_reporter(complaints, now, self.config.top_reporter_window_days),
            recently_resolved: recently_resolved(complaints, self.config.recent_resolved),
        }
    }
}

// ── Metrics ────────────────────────────────────────────────────────

/// Percentage resolved, one decimal place. Zero when there is nothing to count.
pub fn resolution_rate(complaints: &[Complaint]) -> f64 {
    let total = complaints.len();
    if total == 0 {
        return 0.0;
    }
    let resolved = complaints.iter().filter(|c| c.resolved_at.is_some()).count();
    let pct = resolved as f64 * 100.0 / total as f64;
    (pct * 10.0).round() / 10.0
}

/// Count keys, sort by count descending, keep `n`. Ties keep first-seen order.
pub fn top_n<K, I>(keys: I, n: usize) -> Vec<(K, usize)>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = K>,
{
    let mut counts: Vec<(K, usize)> = Vec::new();
    let mut index: HashMap<K, usize> = HashMap::new();
    for key in keys {
        match index.get(&key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(key.clone(), counts.len());
                counts.push((key, 1));
            }
        }
    }
    // Stable sort: equal counts stay in first-seen order.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(n);
    counts
}

pub fn top_cities(snapshot: &ComplaintSnapshot, n: usize) -> Vec<CityCount> {
    top_n(snapshot.complaints.iter().map(|c| c.city_id.as_str()), n)
        .into_iter()
        .map(|(city_id, count)| CityCount {
            city_id: city_id.to_string(),
            city_name: snapshot.geo.city_name(city_id).unwrap_or(city_id).to_string(),
            count,
        })
        .collect()
}

pub fn trending_categories(complaints: &[Complaint], n: usize) -> Vec<CategoryCount> {
    top_n(complaints.iter().map(|c| c.category), n)
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect()
}

/// The Sunday on or before `ts` (UTC date).
pub fn week_start(ts: Timestamp) -> NaiveDate {
    let date = ts.date_naive();
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

/// Complaints bucketed by Sunday-aligned creation week over the trailing
/// `weeks` weeks (the current week included). Only non-empty weeks appear,
/// oldest first.
pub fn weekly_cohorts(complaints: &[Complaint], now: Timestamp, weeks: u32) -> Vec<WeeklyCohort> {
    let current = week_start(now);
    let earliest = current - Duration::weeks(i64::from(weeks.saturating_sub(1)));

    let mut buckets: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();
    for c in complaints {
        let week = week_start(c.created_at);
        if week < earliest || week > current {
            continue;
        }
        let entry = buckets.entry(week).or_default();
        entry.0 += 1;
        if c.resolved_at.is_some() {
            entry.1 += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(week_start, (total, resolved))| WeeklyCohort {
            week_start,
            total_complaints: total,
            resolved_complaints: resolved,
        })
        .collect()
}

/// Phone with the most complaints filed in the trailing window.
pub fn top_reporter(complaints: &[Complaint], now: Timestamp, window_days: i64) -> Option<TopReporter> {
    let since = now - Duration::days(window_days);
    let recent: Vec<&Complaint> = complaints
        .iter()
        .filter(|c| c.created_at > since && c.created_at <= now)
        .collect();

    let (phone, count) = top_n(recent.iter().map(|c| c.citizen_phone.as_str()), 1)
        .into_iter()
        .next()?;
    let citizen_name = recent
        .iter()
        .find(|c| c.citizen_phone == phone)
        .map(|c| c.citizen_name.clone())
        .unwrap_or_default();

    Some(TopReporter {
        masked_phone: mask_phone(phone),
        citizen_name,
        complaint_count: count,
    })
}

/// Hide every character except the last four.
pub fn mask_phone(phone: &str) -> String {
    let len = phone.chars().count();
    let hidden = len.saturating_sub(4);
    phone
        .chars()
        .enumerate()
        .map(|(i, ch)| if i < hidden { '*' } else { ch })
        .collect()
}

/// Most recently resolved first.
pub fn recently_resolved(complaints: &[Complaint], n: usize) -> Vec<ResolvedHighlight> {
    let mut resolved: Vec<(&Complaint, Timestamp)> = complaints
        .iter()
        .filter_map(|c| c.resolved_at.map(|at| (c, at)))
        .collect();
    resolved.sort_by(|a, b| b.1.cmp(&a.1));
    resolved
        .into_iter()
        .take(n)
        .map(|(c, resolved_at)| ResolvedHighlight {
            complaint_id: c.complaint_id.clone(),
            reference_number: c.reference_number(),
            category: c.category,
            city_id: c.city_id.clone(),
            nagar_id: c.nagar_id.clone(),
            resolved_at,
        })
        .collect()
}

pub fn status_breakdown(
    complaints: &[Complaint],
    classifier: &DelayClassifier,
    now: Timestamp,
) -> StatusBreakdown {
    let mut out = StatusBreakdown {
        total: complaints.len(),
        ..Default::default()
    };
    for c in complaints {
        match classifier.display_status(c, now) {
            DisplayStatus::Pending => out.pending += 1,
            DisplayStatus::Delayed => out.delayed += 1,
            DisplayStatus::Assigned => out.assigned += 1,
            DisplayStatus::InProgress => out.in_progress += 1,
            DisplayStatus::Resolved => out.resolved += 1,
        }
    }
    out
}

/// Mean hours from filing to resolution, one decimal place.
pub fn mean_resolution_hours(complaints: &[Complaint]) -> Option<f64> {
    let durations: Vec<i64> = complaints
        .iter()
        .filter_map(|c| c.resolved_at.map(|r| (r - c.created_at).num_minutes()))
        .collect();
    if durations.is_empty() {
        return None;
    }
    let mean_minutes = durations.iter().sum::<i64>() as f64 / durations.len() as f64;
    Some((mean_minutes / 60.0 * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complaint::ComplaintStatus;
    use crate::geo::{City, GeoSnapshot, State};
    use chrono::{TimeZone, Utc};

    fn complaint(seq: i64, city: &str, category: Category, created_at: Timestamp) -> Complaint {
        Complaint {
            complaint_id: format!("cmp-{seq}"),
            ref_seq: seq,
            category,
            description: "d".into(),
            state_id: "s".into(),
            city_id: city.into(),
            nagar_id: format!("{city}-n"),
            address: None,
            location: None,
            citizen_name: format!("citizen {seq}"),
            citizen_phone: format!("90000000{seq:02}"),
            status: ComplaintStatus::Pending,
            photo_url: None,
            before_photo_url: None,
            after_photo_url: None,
            assigned_contractor_id: None,
            created_at,
            assigned_at: None,
            resolved_at: None,
            updated_at: created_at,
        }
    }

    fn resolve(mut c: Complaint, at: Timestamp) -> Complaint {
        c.status = ComplaintStatus::Resolved;
        c.resolved_at = Some(at);
        c
    }

    // Wednesday.
    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn resolution_rate_of_nothing_is_zero() {
        assert_eq!(resolution_rate(&[]), 0.0);
    }

    #[test]
    fn resolution_rate_rounds_to_one_decimal() {
        let t = now();
        let cs = vec![
            resolve(complaint(1, "a", Category::Roads, t), t),
            complaint(2, "a", Category::Roads, t),
            complaint(3, "a", Category::Roads, t),
        ];
        assert_eq!(resolution_rate(&cs), 33.3);
    }

    #[test]
    fn top_n_sorts_descending_and_truncates() {
        let got = top_n(["x", "y", "y", "z", "z", "z"], 2);
        assert_eq!(got, vec![("z", 3), ("y", 2)]);
    }

    #[test]
    fn top_n_ties_keep_first_seen_order() {
        let got = top_n(["b", "a", "a", "b", "c"], 3);
        assert_eq!(got, vec![("b", 2), ("a", 2), ("c", 1)]);
    }

    #[test]
    fn top_cities_uses_names_and_limit() {
        let t = now();
        let complaints: Vec<Complaint> = ["pune", "pune", "nashik", "thane", "pune", "nashik"]
            .iter()
            .enumerate()
            .map(|(i, city)| complaint(i as i64, city, Category::Roads, t))
            .collect();
        let geo = GeoSnapshot::from_rows(
            vec![State { state_id: "s".into(), name: "S".into() }],
            vec![City { city_id: "pune".into(), state_id: "s".into(), name: "Pune".into() }],
            vec![],
        );
        let snap = ComplaintSnapshot::from_parts(t, complaints, geo);
        let top = top_cities(&snap, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].city_name, "Pune");
        assert_eq!(top[0].count, 3);
        assert_eq!(top[1].city_id, "nashik");
        assert_eq!(top[1].city_name, "nashik");
    }

    #[test]
    fn week_start_is_sunday() {
        let sunday = NaiveDate::from_ymd_opt(2024, 6, 16).unwrap();
        assert_eq!(week_start(now()), sunday);
        assert_eq!(week_start(Utc.with_ymd_and_hms(2024, 6, 16, 0, 0, 0).unwrap()), sunday);
        assert_eq!(
            week_start(Utc.with_ymd_and_hms(2024, 6, 15, 23, 59, 59).unwrap()),
            NaiveDate::from_ymd_opt(2024, 6, 9).unwrap()
        );
    }

    #[test]
    fn ten_complaints_over_three_weeks_make_three_cohorts() {
        let t = now();
        let this_week = t - Duration::days(1);
        let last_week = t - Duration::days(7);
        let two_back = t - Duration::days(14);

        let mut cs = Vec::new();
        for i in 0..4 {
            cs.push(complaint(i, "a", Category::Roads, this_week));
        }
        for i in 4..7 {
            cs.push(complaint(i, "a", Category::Sewage, last_week));
        }
        for i in 7..10 {
            cs.push(complaint(i, "a", Category::Sanitation, two_back));
        }
        cs[0] = resolve(cs[0].clone(), t);
        cs[4] = resolve(cs[4].clone(), t);
        cs[5] = resolve(cs[5].clone(), t);
        cs[9] = resolve(cs[9].clone(), t);

        let cohorts = weekly_cohorts(&cs, t, 8);
        assert_eq!(cohorts.len(), 3);
        let totals: Vec<usize> = cohorts.iter().map(|c| c.total_complaints).collect();
        let resolved: Vec<usize> = cohorts.iter().map(|c| c.resolved_complaints).collect();
        assert_eq!(totals, vec![3, 3, 4]);
        assert_eq!(resolved, vec![1, 2, 1]);
        for c in &cohorts {
            assert!(c.resolved_complaints <= c.total_complaints);
        }
        assert!(cohorts.windows(2).all(|w| w[0].week_start < w[1].week_start));
    }

    #[test]
    fn cohorts_ignore_weeks_outside_window() {
        let t = now();
        let cs = vec![
            complaint(1, "a", Category::Roads, t - Duration::weeks(8)),
            complaint(2, "a", Category::Roads, t - Duration::weeks(7)),
        ];
        let cohorts = weekly_cohorts(&cs, t, 8);
        assert_eq!(cohorts.len(), 1);
        assert_eq!(cohorts[0].total_complaints, 1);
    }

    #[test]
    fn top_reporter_within_window_masked() {
        let t = now();
        let mut a1 = complaint(1, "a", Category::Roads, t - Duration::days(1));
        let mut a2 = complaint(2, "a", Category::Roads, t - Duration::days(2));
        let b = complaint(3, "a", Category::Roads, t - Duration::days(3));
        let mut old = complaint(4, "a", Category::Roads, t - Duration::days(10));
        a1.citizen_phone = "9876543210".into();
        a2.citizen_phone = "9876543210".into();
        old.citizen_phone = b.citizen_phone.clone();
        let mut old2 = old.clone();
        old2.complaint_id = "cmp-5".into();

        let top = top_reporter(&[a1, a2, b, old, old2], t, 7).unwrap();
        assert_eq!(top.complaint_count, 2);
        assert_eq!(top.masked_phone, "******3210");
        assert_eq!(top.citizen_name, "citizen 1");
    }

    #[test]
    fn top_reporter_none_when_window_empty() {
        let t = now();
        let cs = vec![complaint(1, "a", Category::Roads, t - Duration::days(30))];
        assert!(top_reporter(&cs, t, 7).is_none());
    }

    #[test]
    fn mask_short_phone() {
        assert_eq!(mask_phone("1234"), "1234");
        assert_eq!(mask_phone("+919812345678"), "*********5678");
    }

    #[test]
    fn recently_resolved_newest_first() {
        let t = now();
        let cs = vec![
            resolve(complaint(1, "a", Category::Roads, t - Duration::days(5)), t - Duration::days(3)),
            complaint(2, "a", Category::Roads, t),
            resolve(complaint(3, "a", Category::Roads, t - Duration::days(5)), t - Duration::days(1)),
            resolve(complaint(4, "a", Category::Roads, t - Duration::days(5)), t - Duration::days(2)),
        ];
        let got: Vec<i64> = recently_resolved(&cs, 2)
            .iter()
            .map(|h| h.reference_number[4..].parse().unwrap())
            .collect();
        assert_eq!(got, vec![3, 4]);
    }

    #[test]
    fn breakdown_counts_delayed_separately() {
        let t = now();
        let cs = vec![
            complaint(1, "a", Category::Roads, t - Duration::days(10)),
            complaint(2, "a", Category::Roads, t - Duration::days(1)),
            resolve(complaint(3, "a", Category::Roads, t - Duration::days(20)), t),
        ];
        let b = status_breakdown(&cs, &DelayClassifier::default(), t);
        assert_eq!(b.total, 3);
        assert_eq!(b.delayed, 1);
        assert_eq!(b.pending, 1);
        assert_eq!(b.resolved, 1);
    }

    #[test]
    fn mean_resolution_hours_averages() {
        let t = now();
        let cs = vec![
            resolve(complaint(1, "a", Category::Roads, t - Duration::hours(10)), t),
            resolve(complaint(2, "a", Category::Roads, t - Duration::hours(20)), t),
            complaint(3, "a", Category::Roads, t),
        ];
        assert_eq!(mean_resolution_hours(&cs), Some(15.0));
        assert_eq!(mean_resolution_hours(&[]), None);
    }
}
