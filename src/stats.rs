//! Figures for the admin dashboard.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde_json::{json, Value as JsonValue};

use crate::backend::ReportStore;
use crate::error::Result;
use crate::model::Report;
use crate::status::DogStatus;


pub const CHART_DAYS: i64 = 7;


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCount {
    /// `M/D`
    pub label: String,
    pub count: usize,
}

/// What the store knows that the report snapshot does not.
#[derive(Debug, Clone, Default)]
pub struct StoreCounts {
    pub total_users: i64,
    pub total_updates: i64,
    pub recent_signups: Vec<DateTime<Utc>>,
    pub total_views: i64,
    pub unique_visitors: i64,
    pub recent_views: Vec<(String, DateTime<Utc>)>,
}

impl StoreCounts {
    pub fn load(store: &dyn ReportStore, now: DateTime<Utc>) -> Result<Self> {
        let since = chart_start(now);

        Ok(StoreCounts {
            total_users: store.count_profiles()?,
            total_updates: store.count_status_updates()?,
            recent_signups: store.profile_signups_since(since)?,
            total_views: store.count_page_views()?,
            unique_visitors: store.count_unique_visitors()?,
            recent_views: store.page_views_since(since)?,
        })
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub total_reports: usize,
    pub total_users: i64,
    pub total_updates: i64,
    pub reports_today: usize,
    pub status_counts: Vec<(DogStatus, usize)>,
    pub daily_reports: Vec<DailyCount>,
    pub daily_signups: Vec<DailyCount>,
    pub total_views: i64,
    pub unique_visitors: i64,
    pub views_today: usize,
    pub visitors_today: usize,
    pub daily_views: Vec<DailyCount>,
    pub daily_visitors: Vec<DailyCount>,
}

impl DashboardStats {
    pub fn collect(reports: &[Report], store: &dyn ReportStore, now: DateTime<Utc>)
        -> Result<Self> {

        let counts = StoreCounts::load(store, now)?;
        Ok(DashboardStats::compute(reports, &counts, now))
    }

    /// Days are UTC calendar days. The last bucket is today.
    pub fn compute(reports: &[Report], counts: &StoreCounts, now: DateTime<Utc>) -> Self {
        let today = now.naive_utc().date();
        let report_times = reports.iter().map(|r| r.created_at).collect::<Vec<_>>();
        let view_times = counts.recent_views.iter().map(|(_, t)| *t).collect::<Vec<_>>();

        let status_counts = DogStatus::ALL.iter()
            .map(|&status| (status, reports.iter().filter(|r| r.status == status).count()))
            .collect();

        let daily_visitors = chart_days(now).into_iter()
            .map(|day| DailyCount {
                label: day_label(day),
                count: distinct_visitors_on(&counts.recent_views, day),
            })
            .collect();

        DashboardStats {
            total_reports: reports.len(),
            total_users: counts.total_users,
            total_updates: counts.total_updates,
            reports_today: count_on(&report_times, today),
            status_counts,
            daily_reports: daily_counts(&report_times, now),
            daily_signups: daily_counts(&counts.recent_signups, now),
            total_views: counts.total_views,
            unique_visitors: counts.unique_visitors,
            views_today: count_on(&view_times, today),
            visitors_today: distinct_visitors_on(&counts.recent_views, today),
            daily_views: daily_counts(&view_times, now),
            daily_visitors,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        let statuses = self.status_counts.iter()
            .map(|(status, cnt)| (status.as_str().to_owned(), json!(cnt)))
            .collect::<serde_json::Map<_, _>>();

        json!({
            "total_reports": self.total_reports,
            "total_users": self.total_users,
            "total_updates": self.total_updates,
            "reports_today": self.reports_today,
            "status_counts": statuses,
            "daily_reports": daily_json(&self.daily_reports),
            "daily_signups": daily_json(&self.daily_signups),
            "total_views": self.total_views,
            "unique_visitors": self.unique_visitors,
            "views_today": self.views_today,
            "visitors_today": self.visitors_today,
            "daily_views": daily_json(&self.daily_views),
            "daily_visitors": daily_json(&self.daily_visitors),
        })
    }
}


fn chart_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(CHART_DAYS)
}

/// Oldest first, ending today.
fn chart_days(now: DateTime<Utc>) -> Vec<NaiveDate> {
    (0..CHART_DAYS).rev()
        .map(|back| (now - Duration::days(back)).naive_utc().date())
        .collect()
}

fn day_label(day: NaiveDate) -> String {
    format!("{}/{}", day.month(), day.day())
}

fn count_on(times: &[DateTime<Utc>], day: NaiveDate) -> usize {
    times.iter().filter(|t| t.naive_utc().date() == day).count()
}

fn distinct_visitors_on(views: &[(String, DateTime<Utc>)], day: NaiveDate) -> usize {
    let mut visitors = views.iter()
        .filter(|(_, t)| t.naive_utc().date() == day)
        .map(|(visitor, _)| visitor.as_str())
        .collect::<Vec<_>>();
    visitors.sort_unstable();
    visitors.dedup();
    visitors.len()
}

fn daily_counts(times: &[DateTime<Utc>], now: DateTime<Utc>) -> Vec<DailyCount> {
    chart_days(now).into_iter()
        .map(|day| DailyCount {
            label: day_label(day),
            count: count_on(times, day),
        })
        .collect()
}

fn daily_json(days: &[DailyCount]) -> JsonValue {
    json!(days.iter()
        .map(|d| json!({ "date": d.label, "count": d.count }))
        .collect::<Vec<_>>())
}
