//! Seams to the hosted services the map sits on: the relational store, its
//! change feed, object storage and the identity provider.

use std::sync::Arc;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    Report, StatusUpdate, Profile, User,
    NewReport, NewStatusUpdate, NewPageView,
};
use crate::status::DogStatus;


pub const REPORT_TABLE: &'static str = "dog_reports";


pub trait ReportStore: Send + Sync {
    /// All reports, newest first.
    fn fetch_reports(&self) -> Result<Vec<Report>>;
    fn get_report(&self, id: i32) -> Result<Option<Report>>;
    fn insert_report(&self, report: &NewReport) -> Result<Report>;
    /// Returns the number of rows touched.
    fn update_report_status(&self, id: i32, status: DogStatus) -> Result<usize>;
    fn update_report_location(&self, id: i32, latitude: f64, longitude: f64) -> Result<usize>;
    fn delete_report(&self, id: i32) -> Result<usize>;

    fn insert_status_update(&self, update: &NewStatusUpdate) -> Result<StatusUpdate>;
    /// History of one report, newest first.
    fn fetch_status_updates(&self, report_id: i32) -> Result<Vec<StatusUpdate>>;
    fn count_status_updates(&self) -> Result<i64>;

    fn get_profile(&self, user_id: &str) -> Result<Option<Profile>>;
    fn count_profiles(&self) -> Result<i64>;
    fn profile_signups_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>>;

    fn insert_page_view(&self, view: &NewPageView) -> Result<()>;
    fn count_page_views(&self) -> Result<i64>;
    fn count_unique_visitors(&self) -> Result<i64>;
    /// `(visitor_id, created_at)` of every view since `since`.
    fn page_views_since(&self, since: DateTime<Utc>) -> Result<Vec<(String, DateTime<Utc>)>>;
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMask {
    insert: bool,
    update: bool,
    delete: bool,
}

impl EventMask {
    pub const ALL: EventMask = EventMask { insert: true, update: true, delete: true };

    #[cfg(test)]
    pub fn only(kind: ChangeKind) -> Self {
        EventMask {
            insert: kind == ChangeKind::Insert,
            update: kind == ChangeKind::Update,
            delete: kind == ChangeKind::Delete,
        }
    }

    pub fn matches(&self, kind: ChangeKind) -> bool {
        match kind {
            ChangeKind::Insert => self.insert,
            ChangeKind::Update => self.update,
            ChangeKind::Delete => self.delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub row_id: Option<i32>,
}

impl ChangeEvent {
    pub fn new(table: &str, kind: ChangeKind, row_id: Option<i32>) -> Self {
        ChangeEvent {
            table: table.to_owned(),
            kind,
            row_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

pub type ChangeCallback = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Push notifications for row-level mutations. Delivery is asynchronous and
/// unordered relative to concurrent local writes.
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self, table: &str, mask: EventMask, callback: ChangeCallback)
        -> Result<SubscriptionId>;
    fn unsubscribe(&self, id: SubscriptionId);
}


pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` under `key` and returns the stored key.
    fn upload(&self, key: &str, bytes: &[u8]) -> Result<String>;
    fn public_url(&self, key: &str) -> String;
}


pub trait Identity {
    fn current_user(&self) -> Option<User>;
}


/// Handles to every hosted service, shared by the report feed.
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn ReportStore>,
    pub changes: Arc<dyn ChangeFeed>,
    pub storage: Arc<dyn ObjectStorage>,
}
