//! In-memory stand-ins for the hosted services, used by unit tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, mpsc},
    sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
};
use chrono::{DateTime, Duration, Utc};

use crate::backend::{
    Backend, ChangeCallback, ChangeEvent, ChangeFeed, EventMask, Identity,
    ObjectStorage, ReportStore, SubscriptionId,
};
use crate::error::{Error, Result};
use crate::geocode_sys::{Geocoder, Place};
use crate::lang::Lang;
use crate::model::{
    NewPageView, NewReport, NewStatusUpdate, Profile, Report, StatusUpdate, User,
};
use crate::status::DogStatus;


pub fn report(id: i32, lat: f64, lng: f64, status: DogStatus, age_mins: i64) -> Report {
    let created_at = Utc::now() - Duration::minutes(age_mins);
    Report {
        id,
        user_id: "owner".into(),
        latitude: lat,
        longitude: lng,
        status,
        description: None,
        photo_url: None,
        dog_count: 1,
        created_at,
        updated_at: created_at,
    }
}


#[derive(Default)]
struct MemoryState {
    reports: Vec<Report>,
    updates: Vec<StatusUpdate>,
    profiles: Vec<Profile>,
    page_views: Vec<(NewPageView, DateTime<Utc>)>,
    next_id: i32,
}

struct FetchGate {
    entered: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fetches: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_report_updates: AtomicBool,
    gate: Mutex<Option<FetchGate>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryStore::default())
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Only the report-row half of a status update fails.
    pub fn fail_report_updates(&self, fail: bool) {
        self.fail_report_updates.store(fail, Ordering::SeqCst);
    }

    /// The next fetch reads its rows, signals `entered`, then waits for
    /// `release` before returning them.
    pub fn hold_next_fetch(&self) -> (mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some(FetchGate {
            entered: entered_tx,
            release: release_rx,
        });
        (entered_rx, release_tx)
    }

    pub fn seed(&self, report: Report) {
        let mut state = self.state.lock().unwrap();
        state.next_id = state.next_id.max(report.id);
        state.reports.push(report);
    }

    pub fn add_profile(&self, user_id: &str, is_admin: bool, age_days: i64) {
        let mut state = self.state.lock().unwrap();
        let id = state.profiles.len() as i32 + 1;
        state.profiles.push(Profile {
            id,
            user_id: user_id.to_owned(),
            display_name: None,
            avatar_url: None,
            is_admin,
            created_at: Utc::now() - Duration::days(age_days),
        });
    }

    pub fn reports(&self) -> Vec<Report> {
        self.state.lock().unwrap().reports.clone()
    }

    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.state.lock().unwrap().updates.clone()
    }

    pub fn page_views(&self) -> Vec<NewPageView> {
        self.state.lock().unwrap().page_views.iter()
            .map(|(v, _)| v.clone())
            .collect()
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(Error::remote("store unavailable"))
        }
        else {
            Ok(())
        }
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(Error::remote("store unavailable"))
        }
        else {
            Ok(())
        }
    }
}

impl ReportStore for MemoryStore {
    fn fetch_reports(&self) -> Result<Vec<Report>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_read()?;

        let mut reports = self.reports();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            let _ = gate.release.recv();
        }

        Ok(reports)
    }

    fn get_report(&self, id: i32) -> Result<Option<Report>> {
        self.check_read()?;
        Ok(self.reports().into_iter().find(|r| r.id == id))
    }

    fn insert_report(&self, report: &NewReport) -> Result<Report> {
        self.check_write()?;

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let now = Utc::now();
        let inserted = Report {
            id: state.next_id,
            user_id: report.user_id.clone(),
            latitude: report.latitude,
            longitude: report.longitude,
            status: report.status,
            description: report.description.clone(),
            photo_url: report.photo_url.clone(),
            dog_count: report.dog_count,
            created_at: now,
            updated_at: now,
        };
        state.reports.push(inserted.clone());
        Ok(inserted)
    }

    fn update_report_status(&self, id: i32, status: DogStatus) -> Result<usize> {
        self.check_write()?;
        if self.fail_report_updates.load(Ordering::SeqCst) {
            return Err(Error::remote("report update failed"));
        }

        let mut state = self.state.lock().unwrap();
        let mut cnt = 0;
        for r in state.reports.iter_mut().filter(|r| r.id == id) {
            r.status = status;
            r.updated_at = Utc::now();
            cnt += 1;
        }
        Ok(cnt)
    }

    fn update_report_location(&self, id: i32, latitude: f64, longitude: f64) -> Result<usize> {
        self.check_write()?;

        let mut state = self.state.lock().unwrap();
        let mut cnt = 0;
        for r in state.reports.iter_mut().filter(|r| r.id == id) {
            r.latitude = latitude;
            r.longitude = longitude;
            cnt += 1;
        }
        Ok(cnt)
    }

    fn delete_report(&self, id: i32) -> Result<usize> {
        self.check_write()?;

        let mut state = self.state.lock().unwrap();
        let before = state.reports.len();
        state.reports.retain(|r| r.id != id);
        Ok(before - state.reports.len())
    }

    fn insert_status_update(&self, update: &NewStatusUpdate) -> Result<StatusUpdate> {
        self.check_write()?;

        let mut state = self.state.lock().unwrap();
        let inserted = StatusUpdate {
            id: state.updates.len() as i32 + 1,
            report_id: update.report_id,
            user_id: update.user_id.clone(),
            status: update.status,
            note: update.note.clone(),
            photo_url: update.photo_url.clone(),
            created_at: Utc::now(),
        };
        state.updates.push(inserted.clone());
        Ok(inserted)
    }

    fn fetch_status_updates(&self, report_id: i32) -> Result<Vec<StatusUpdate>> {
        self.check_read()?;

        let mut updates = self.updates().into_iter()
            .filter(|u| u.report_id == report_id)
            .collect::<Vec<_>>();
        updates.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(updates)
    }

    fn count_status_updates(&self) -> Result<i64> {
        self.check_read()?;
        Ok(self.state.lock().unwrap().updates.len() as i64)
    }

    fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        self.check_read()?;
        Ok(self.state.lock().unwrap().profiles.iter()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    fn count_profiles(&self) -> Result<i64> {
        self.check_read()?;
        Ok(self.state.lock().unwrap().profiles.len() as i64)
    }

    fn profile_signups_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        self.check_read()?;
        Ok(self.state.lock().unwrap().profiles.iter()
            .map(|p| p.created_at)
            .filter(|&t| t >= since)
            .collect())
    }

    fn insert_page_view(&self, view: &NewPageView) -> Result<()> {
        self.check_write()?;
        self.state.lock().unwrap().page_views.push((view.clone(), Utc::now()));
        Ok(())
    }

    fn count_page_views(&self) -> Result<i64> {
        self.check_read()?;
        Ok(self.state.lock().unwrap().page_views.len() as i64)
    }

    fn count_unique_visitors(&self) -> Result<i64> {
        self.check_read()?;
        let mut visitors = self.page_views().into_iter()
            .map(|v| v.visitor_id)
            .collect::<Vec<_>>();
        visitors.sort();
        visitors.dedup();
        Ok(visitors.len() as i64)
    }

    fn page_views_since(&self, since: DateTime<Utc>) -> Result<Vec<(String, DateTime<Utc>)>> {
        self.check_read()?;
        Ok(self.state.lock().unwrap().page_views.iter()
            .filter(|(_, t)| *t >= since)
            .map(|(v, t)| (v.visitor_id.clone(), *t))
            .collect())
    }
}


/// A change feed whose events are fired by hand, synchronously.
#[derive(Default)]
pub struct ManualFeed {
    subscribers: Mutex<Vec<(SubscriptionId, String, EventMask, Arc<ChangeCallback>)>>,
    unsubscribed: Mutex<Vec<SubscriptionId>>,
    next_id: AtomicU64,
    refuse: AtomicBool,
}

impl ManualFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(ManualFeed::default())
    }

    pub fn refuse_subscriptions(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }

    pub fn fire(&self, event: ChangeEvent) {
        let targets = self.subscribers.lock().unwrap().iter()
            .filter(|(_, table, mask, _)| *table == event.table && mask.matches(event.kind))
            .map(|(_, _, _, callback)| callback.clone())
            .collect::<Vec<_>>();

        for callback in targets {
            (*callback)(&event);
        }
    }

    pub fn active(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    pub fn unsubscribed(&self) -> Vec<SubscriptionId> {
        self.unsubscribed.lock().unwrap().clone()
    }
}

impl ChangeFeed for ManualFeed {
    fn subscribe(&self, table: &str, mask: EventMask, callback: ChangeCallback)
        -> Result<SubscriptionId> {

        if self.refuse.load(Ordering::SeqCst) {
            return Err(Error::remote("realtime unavailable"));
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.subscribers.lock().unwrap()
            .push((id, table.to_owned(), mask, Arc::new(callback)));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().unwrap().retain(|(sid, _, _, _)| *sid != id);
        self.unsubscribed.lock().unwrap().push(id);
    }
}


#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryStorage::default())
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }
}

impl ObjectStorage for MemoryStorage {
    fn upload(&self, key: &str, bytes: &[u8]) -> Result<String> {
        self.objects.lock().unwrap().insert(key.to_owned(), bytes.to_vec());
        Ok(key.to_owned())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://storage.test/dog-photos/{}", key)
    }
}


pub struct TestUser(pub Option<User>);

impl TestUser {
    pub fn signed_in(id: &str) -> Self {
        TestUser(Some(User { id: id.to_owned() }))
    }

    pub fn anonymous() -> Self {
        TestUser(None)
    }
}

impl Identity for TestUser {
    fn current_user(&self) -> Option<User> {
        self.0.clone()
    }
}


#[derive(Default)]
pub struct FakeGeocoder {
    pub queries: Mutex<Vec<(String, Lang)>>,
}

impl Geocoder for FakeGeocoder {
    fn search(&self, query: &str, lang: Lang) -> Result<Vec<Place>> {
        self.queries.lock().unwrap().push((query.to_owned(), lang));
        Ok(vec![Place {
            display_name: format!("{}, Bangkok, Thailand", query),
            lat: "13.7563".into(),
            lon: "100.5018".into(),
        }])
    }
}


pub struct Fakes {
    pub store: Arc<MemoryStore>,
    pub changes: Arc<ManualFeed>,
    pub storage: Arc<MemoryStorage>,
}

impl Fakes {
    pub fn new() -> Self {
        Fakes {
            store: MemoryStore::new(),
            changes: ManualFeed::new(),
            storage: MemoryStorage::new(),
        }
    }

    pub fn backend(&self) -> Backend {
        Backend {
            store: self.store.clone(),
            changes: self.changes.clone(),
            storage: self.storage.clone(),
        }
    }
}
