use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak},
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use chrono::Utc;
use threadpool::ThreadPool;

use crate::backend::{Backend, ChangeEvent, EventMask, Identity, SubscriptionId, REPORT_TABLE};
use crate::error::{Error, Result};
use crate::geo;
use crate::model::{
    self, NewReport, NewStatusUpdate, Report, ReportDraft, StatusDraft, StatusUpdate, User,
};
use crate::task_scheduler::{Task, TaskSchedulerBuilder};
use crate::util;


const PHOTO_KEY_RAND_LEN: usize = 10;
const RESYNC_RETRY_DELAY: Duration = Duration::from_secs(60);


struct Snapshot {
    seq: u64,
    reports: Arc<Vec<Report>>,
}

struct Shared {
    backend: Backend,
    snapshot: RwLock<Snapshot>,
    next_seq: AtomicU64,
    pool: Mutex<ThreadPool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    /// Fetches every report and installs the result unless a fetch that
    /// started later has already been installed. Returns whether it was.
    fn refetch(&self) -> Result<bool> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let reports = self.backend.store.fetch_reports()?;

        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        if seq > snapshot.seq {
            *snapshot = Snapshot {
                seq,
                reports: Arc::new(reports),
            };
            Ok(true)
        }
        else {
            info!("Discard stale report fetch #{} (have #{})", seq, snapshot.seq);
            Ok(false)
        }
    }

    fn refetch_soft(&self) -> bool {
        match self.refetch() {
            Ok(_) => true,
            Err(err) => {
                warn!("Fail to fetch reports: {}", err);
                false
            },
        }
    }

    fn schedule_refetch(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        lock(&self.pool).execute(move || {
            if let Some(shared) = weak.upgrade() {
                shared.refetch_soft();
            }
        });
    }
}


/// Live, newest-first list of every report. It is refetched in full
/// whenever the store reports a change on the report table.
pub struct ReportFeed {
    shared: Arc<Shared>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl ReportFeed {
    pub fn mount(backend: Backend, workers: usize) -> Self {
        let shared = Arc::new(Shared {
            backend,
            snapshot: RwLock::new(Snapshot {
                seq: 0,
                reports: Arc::new(Vec::new()),
            }),
            next_seq: AtomicU64::new(0),
            pool: Mutex::new(ThreadPool::with_name("report-feed".into(), workers.max(1))),
        });

        if shared.refetch_soft() {
            info!("Loaded {} reports", shared.snapshot.read()
                .unwrap_or_else(PoisonError::into_inner).reports.len());
        }

        let weak = Arc::downgrade(&shared);
        let on_change = move |event: &ChangeEvent| {
            if let Some(shared) = weak.upgrade() {
                info!("Report change {:?} on {:?}, refetching", event.kind, event.row_id);
                shared.schedule_refetch();
            }
        };

        let subscription = shared.backend.changes
            .subscribe(REPORT_TABLE, EventMask::ALL, Box::new(on_change));
        let subscription = match subscription {
            Ok(id) => Some(id),
            Err(err) => {
                error!("Fail to subscribe to report changes: {}", err);
                None
            },
        };

        ReportFeed {
            shared,
            subscription: Mutex::new(subscription),
        }
    }

    /// Releases the change subscription. Later calls do nothing.
    pub fn teardown(&self) {
        if let Some(id) = lock(&self.subscription).take() {
            self.shared.backend.changes.unsubscribe(id);
            info!("Released report change subscription");
        }
    }

    #[cfg(test)]
    pub fn is_subscribed(&self) -> bool {
        lock(&self.subscription).is_some()
    }

    pub fn snapshot(&self) -> Arc<Vec<Report>> {
        self.shared.snapshot.read()
            .unwrap_or_else(PoisonError::into_inner)
            .reports
            .clone()
    }

    /// Refetches now. On failure the previous snapshot stays in place and
    /// false is returned.
    pub fn refresh(&self) -> bool {
        self.shared.refetch_soft()
    }

    /// Blocks until every queued change-triggered refetch has finished.
    #[cfg(test)]
    pub fn wait_idle(&self) {
        let pool = lock(&self.shared.pool).clone();
        pool.join();
    }

    pub fn resync_handle(&self) -> ResyncHandle {
        ResyncHandle(Arc::downgrade(&self.shared))
    }

    /// Looks in the snapshot first, then asks the store.
    pub fn find_report(&self, id: i32) -> Result<Report> {
        if let Some(report) = self.snapshot().iter().find(|r| r.id == id) {
            return Ok(report.clone());
        }

        self.shared.backend.store.get_report(id)?
            .ok_or(Error::NotFound)
    }

    pub fn status_updates(&self, report_id: i32) -> Result<Vec<StatusUpdate>> {
        self.shared.backend.store.fetch_status_updates(report_id)
    }

    pub fn is_admin(&self, identity: &dyn Identity) -> Result<bool> {
        match identity.current_user() {
            Some(user) => self.user_is_admin(&user),
            None => Ok(false),
        }
    }

    fn user_is_admin(&self, user: &User) -> Result<bool> {
        let profile = self.shared.backend.store.get_profile(&user.id)?;
        Ok(profile.map_or(false, |p| p.is_admin))
    }

    fn require_admin(&self, identity: &dyn Identity) -> Result<User> {
        let user = require_user(identity)?;
        if self.user_is_admin(&user)? {
            Ok(user)
        }
        else {
            Err(Error::Forbidden)
        }
    }

    /// Inserts a report owned by the acting user. The snapshot picks it up
    /// through the change feed, not here.
    pub fn create_report(&self, identity: &dyn Identity, draft: ReportDraft) -> Result<Report> {
        let user = require_user(identity)?;

        if let Some(err) = draft.verify_error() {
            return Err(Error::validation(err));
        }
        let (latitude, longitude) = draft.location.ok_or(Error::validation("No location"))?;

        let report = self.shared.backend.store.insert_report(&NewReport {
            user_id: user.id,
            latitude,
            longitude,
            status: draft.status,
            description: model::non_empty(draft.description),
            photo_url: model::non_empty(draft.photo_url),
            dog_count: draft.dog_count.unwrap_or(1),
        })?;

        info!("Report #{} created by {}", report.id, report.user_id);
        Ok(report)
    }

    /// Appends to the report's history and then overwrites its current
    /// status. The two writes are not atomic.
    pub fn add_status_update(&self, identity: &dyn Identity, report_id: i32, draft: StatusDraft)
        -> Result<StatusUpdate> {

        let user = require_user(identity)?;

        if let Some(err) = draft.verify_error() {
            return Err(Error::validation(err));
        }

        let store = &self.shared.backend.store;
        if store.get_report(report_id)?.is_none() {
            return Err(Error::NotFound);
        }

        let update = store.insert_status_update(&NewStatusUpdate {
            report_id,
            user_id: user.id,
            status: draft.status,
            note: model::non_empty(draft.note),
            photo_url: model::non_empty(draft.photo_url),
        })?;

        if let Err(err) = store.update_report_status(report_id, draft.status) {
            warn!("Status update #{} saved but report #{} kept its status: {}",
                update.id, report_id, err);
            return Err(err);
        }

        Ok(update)
    }

    pub fn move_report(&self, identity: &dyn Identity, id: i32, latitude: f64, longitude: f64)
        -> Result<()> {

        let admin = self.require_admin(identity)?;

        if !geo::is_valid_coordinate(latitude, longitude) {
            return Err(Error::validation("Location is out of range"));
        }

        match self.shared.backend.store.update_report_location(id, latitude, longitude)? {
            0 => Err(Error::NotFound),
            _ => {
                info!("Report #{} moved by {}", id, admin.id);
                Ok(())
            },
        }
    }

    /// Status history is left in place.
    pub fn delete_report(&self, identity: &dyn Identity, id: i32) -> Result<()> {
        let user = require_user(identity)?;

        let store = &self.shared.backend.store;
        let report = store.get_report(id)?.ok_or(Error::NotFound)?;

        if report.user_id != user.id && !self.user_is_admin(&user)? {
            return Err(Error::Forbidden);
        }

        match store.delete_report(id)? {
            0 => Err(Error::NotFound),
            _ => {
                info!("Report #{} deleted by {}", id, user.id);
                Ok(())
            },
        }
    }

    /// Stores the photo under a fresh `{millis}-{random}.{ext}` key and
    /// returns its public URL.
    pub fn upload_photo(&self, ext: &str, bytes: &[u8]) -> Result<String> {
        let storage = &self.shared.backend.storage;
        let key = photo_key(Utc::now().timestamp_millis(), ext);
        let stored = storage.upload(&key, bytes)?;

        Ok(storage.public_url(&stored))
    }
}

impl Drop for ReportFeed {
    fn drop(&mut self) {
        self.teardown();
    }
}


/// Lets a periodic job refetch without keeping the feed alive.
#[derive(Clone)]
pub struct ResyncHandle(Weak<Shared>);

impl ResyncHandle {
    /// `None` once the feed is gone.
    pub fn resync(&self) -> Option<bool> {
        self.0.upgrade().map(|shared| shared.refetch_soft())
    }
}


/// Periodic full refetch backing up missed change events. A zero period
/// disables it.
pub fn init_resync(feed: &ReportFeed, period: Duration, scheduler: &mut TaskSchedulerBuilder) {
    if period == Duration::from_secs(0) {
        info!("Periodic report resync disabled");
        return;
    }

    let handle = feed.resync_handle();
    scheduler.add_task(Task::new("report-resync", move || {
        match handle.resync() {
            Some(true) => Some(period),
            Some(false) => Some(RESYNC_RETRY_DELAY.min(period)),
            None => None,
        }
    }, period));
}


fn require_user(identity: &dyn Identity) -> Result<User> {
    identity.current_user().ok_or(Error::AuthenticationRequired)
}

fn photo_key(millis: i64, ext: &str) -> String {
    format!("{}-{}.{}",
        millis,
        util::generate_rand_id(PHOTO_KEY_RAND_LEN).to_ascii_lowercase(),
        ext.to_ascii_lowercase())
}


#[cfg(test)]
mod tests {
    use std::thread;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::backend::ChangeKind;
    use crate::status::DogStatus;
    use crate::testing::{report, Fakes, TestUser};

    fn ids(reports: &[Report]) -> Vec<i32> {
        reports.iter().map(|r| r.id).collect()
    }

    fn change(kind: ChangeKind, id: i32) -> ChangeEvent {
        ChangeEvent::new(REPORT_TABLE, kind, Some(id))
    }

    #[test]
    fn mount_loads_newest_first_and_subscribes() {
        let fakes = Fakes::new();
        fakes.store.seed(report(1, 13.75, 100.50, DogStatus::Spotted, 30));
        fakes.store.seed(report(2, 13.76, 100.51, DogStatus::Hungry, 5));

        let feed = ReportFeed::mount(fakes.backend(), 1);

        assert_eq!(ids(&feed.snapshot()), vec![2, 1]);
        assert_eq!(fakes.store.fetch_count(), 1);
        assert_eq!(fakes.changes.active(), 1);
        assert!(feed.is_subscribed());
    }

    #[test]
    fn change_event_triggers_refetch() {
        let fakes = Fakes::new();
        let feed = ReportFeed::mount(fakes.backend(), 2);
        assert!(feed.snapshot().is_empty());

        fakes.store.seed(report(7, 13.75, 100.50, DogStatus::Urgent, 0));
        fakes.changes.fire(change(ChangeKind::Insert, 7));
        feed.wait_idle();

        assert_eq!(fakes.store.fetch_count(), 2);
        assert_eq!(ids(&feed.snapshot()), vec![7]);
    }

    #[test]
    fn events_on_other_tables_are_ignored() {
        let fakes = Fakes::new();
        let feed = ReportFeed::mount(fakes.backend(), 1);

        fakes.changes.fire(ChangeEvent::new("status_updates", ChangeKind::Insert, Some(1)));
        feed.wait_idle();

        assert_eq!(fakes.store.fetch_count(), 1);
    }

    #[test]
    fn failed_fetch_keeps_snapshot() {
        let fakes = Fakes::new();
        fakes.store.seed(report(1, 13.75, 100.50, DogStatus::Fed, 10));
        let feed = ReportFeed::mount(fakes.backend(), 1);

        fakes.store.fail_reads(true);
        fakes.store.seed(report(2, 13.75, 100.50, DogStatus::Fed, 0));
        assert!(!feed.refresh());
        fakes.changes.fire(change(ChangeKind::Insert, 2));
        feed.wait_idle();

        assert_eq!(ids(&feed.snapshot()), vec![1]);

        fakes.store.fail_reads(false);
        assert!(feed.refresh());
        assert_eq!(ids(&feed.snapshot()), vec![2, 1]);
    }

    #[test]
    fn failed_initial_fetch_mounts_empty() {
        let fakes = Fakes::new();
        fakes.store.seed(report(1, 13.75, 100.50, DogStatus::Fed, 10));
        fakes.store.fail_reads(true);

        let feed = ReportFeed::mount(fakes.backend(), 1);

        assert!(feed.snapshot().is_empty());
        assert!(feed.is_subscribed());
    }

    #[test]
    fn stale_fetch_never_overwrites_newer() {
        let fakes = Fakes::new();
        fakes.store.seed(report(1, 13.75, 100.50, DogStatus::Fed, 10));
        let feed = Arc::new(ReportFeed::mount(fakes.backend(), 1));

        let (entered, release) = fakes.store.hold_next_fetch();
        let slow = {
            let feed = feed.clone();
            thread::spawn(move || feed.refresh())
        };
        entered.recv().unwrap();

        fakes.store.seed(report(2, 13.75, 100.50, DogStatus::Fed, 0));
        assert!(feed.refresh());
        assert_eq!(ids(&feed.snapshot()), vec![2, 1]);

        release.send(()).unwrap();
        assert!(slow.join().unwrap());
        assert_eq!(ids(&feed.snapshot()), vec![2, 1]);
    }

    #[test]
    fn teardown_unsubscribes_once() {
        let fakes = Fakes::new();
        let feed = ReportFeed::mount(fakes.backend(), 1);

        feed.teardown();
        feed.teardown();
        drop(feed);

        assert_eq!(fakes.changes.active(), 0);
        assert_eq!(fakes.changes.unsubscribed().len(), 1);
    }

    #[test]
    fn refused_subscription_still_serves() {
        let fakes = Fakes::new();
        fakes.changes.refuse_subscriptions();
        fakes.store.seed(report(1, 13.75, 100.50, DogStatus::Fed, 10));

        let feed = ReportFeed::mount(fakes.backend(), 1);
        assert!(!feed.is_subscribed());
        assert_eq!(ids(&feed.snapshot()), vec![1]);

        drop(feed);
        assert!(fakes.changes.unsubscribed().is_empty());
    }

    #[test]
    fn resync_handle_outlives_feed() {
        let fakes = Fakes::new();
        let feed = ReportFeed::mount(fakes.backend(), 1);
        let handle = feed.resync_handle();

        assert_eq!(handle.resync(), Some(true));
        assert_eq!(fakes.store.fetch_count(), 2);

        drop(feed);
        assert_eq!(handle.resync(), None);
    }

    #[test]
    fn resync_task_is_optional() {
        let fakes = Fakes::new();
        let feed = ReportFeed::mount(fakes.backend(), 1);

        let mut scheduler = TaskSchedulerBuilder::new();
        init_resync(&feed, Duration::from_secs(0), &mut scheduler);
        assert_eq!(scheduler.task_count(), 0);

        init_resync(&feed, Duration::from_secs(300), &mut scheduler);
        assert_eq!(scheduler.task_count(), 1);
    }

    #[test]
    fn create_requires_session() {
        let fakes = Fakes::new();
        let feed = ReportFeed::mount(fakes.backend(), 1);
        let draft = ReportDraft::at(13.75, 100.5, DogStatus::Spotted);

        let result = feed.create_report(&TestUser::anonymous(), draft);

        assert!(matches!(result, Err(Error::AuthenticationRequired)));
        assert!(fakes.store.reports().is_empty());
    }

    #[test]
    fn create_validates_before_writing() {
        let fakes = Fakes::new();
        let feed = ReportFeed::mount(fakes.backend(), 1);
        let mut draft = ReportDraft::at(13.75, 100.5, DogStatus::Spotted);
        draft.location = None;

        let result = feed.create_report(&TestUser::signed_in("u1"), draft);

        match result {
            Err(Error::Validation(msg)) => assert_eq!(msg, "Please select a location on the map"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(fakes.store.reports().is_empty());
    }

    #[test]
    fn create_attaches_owner_without_local_update() {
        let fakes = Fakes::new();
        let feed = ReportFeed::mount(fakes.backend(), 1);
        let mut draft = ReportDraft::at(13.75, 100.5, DogStatus::Hungry);
        draft.description = Some("   ".into());
        draft.dog_count = Some(3);

        let created = feed.create_report(&TestUser::signed_in("u1"), draft).unwrap();

        assert_eq!(created.user_id, "u1");
        assert_eq!(created.dog_count, 3);
        assert_eq!(created.description, None);
        assert!(feed.snapshot().is_empty());

        fakes.changes.fire(change(ChangeKind::Insert, created.id));
        feed.wait_idle();
        assert_eq!(ids(&feed.snapshot()), vec![created.id]);
    }

    #[test]
    fn create_defaults_to_one_dog() {
        let fakes = Fakes::new();
        let feed = ReportFeed::mount(fakes.backend(), 1);

        let created = feed.create_report(&TestUser::signed_in("u1"),
            ReportDraft::at(13.75, 100.5, DogStatus::Friendly)).unwrap();

        assert_eq!(created.dog_count, 1);
    }

    #[test]
    fn create_propagates_store_failure() {
        let fakes = Fakes::new();
        let feed = ReportFeed::mount(fakes.backend(), 1);
        fakes.store.fail_writes(true);

        let result = feed.create_report(&TestUser::signed_in("u1"),
            ReportDraft::at(13.75, 100.5, DogStatus::Spotted));

        assert!(matches!(result, Err(Error::Remote(_))));
    }

    #[test]
    fn status_update_writes_history_and_report() {
        let fakes = Fakes::new();
        fakes.store.seed(report(1, 13.75, 100.50, DogStatus::Hungry, 10));
        let feed = ReportFeed::mount(fakes.backend(), 1);

        let draft = StatusDraft {
            status: DogStatus::Fed,
            note: Some("gave rice".into()),
            photo_url: None,
        };
        let update = feed.add_status_update(&TestUser::signed_in("u2"), 1, draft).unwrap();

        assert_eq!(update.report_id, 1);
        assert_eq!(update.user_id, "u2");
        assert_eq!(fakes.store.reports()[0].status, DogStatus::Fed);
        assert_eq!(feed.status_updates(1).unwrap(), vec![update]);
    }

    #[test]
    fn status_update_second_write_failure_is_reported() {
        let fakes = Fakes::new();
        fakes.store.seed(report(1, 13.75, 100.50, DogStatus::Hungry, 10));
        let feed = ReportFeed::mount(fakes.backend(), 1);
        fakes.store.fail_report_updates(true);

        let draft = StatusDraft {
            status: DogStatus::Rescued,
            note: None,
            photo_url: None,
        };
        let result = feed.add_status_update(&TestUser::signed_in("u2"), 1, draft);

        assert!(matches!(result, Err(Error::Remote(_))));
        assert_eq!(fakes.store.updates().len(), 1);
        assert_eq!(fakes.store.reports()[0].status, DogStatus::Hungry);
    }

    #[test]
    fn status_update_for_missing_report() {
        let fakes = Fakes::new();
        let feed = ReportFeed::mount(fakes.backend(), 1);

        let draft = StatusDraft {
            status: DogStatus::Fed,
            note: None,
            photo_url: None,
        };
        let result = feed.add_status_update(&TestUser::signed_in("u2"), 9, draft);

        assert!(matches!(result, Err(Error::NotFound)));
        assert!(fakes.store.updates().is_empty());
    }

    #[test]
    fn move_is_admin_only() {
        let fakes = Fakes::new();
        fakes.store.seed(report(1, 13.75, 100.50, DogStatus::Spotted, 10));
        fakes.store.add_profile("admin", true, 30);
        fakes.store.add_profile("u1", false, 30);
        let feed = ReportFeed::mount(fakes.backend(), 1);

        assert!(matches!(feed.move_report(&TestUser::anonymous(), 1, 13.8, 100.6),
            Err(Error::AuthenticationRequired)));
        assert!(matches!(feed.move_report(&TestUser::signed_in("u1"), 1, 13.8, 100.6),
            Err(Error::Forbidden)));
        assert!(matches!(feed.move_report(&TestUser::signed_in("admin"), 1, 95.0, 100.6),
            Err(Error::Validation(_))));
        assert!(matches!(feed.move_report(&TestUser::signed_in("admin"), 42, 13.8, 100.6),
            Err(Error::NotFound)));

        feed.move_report(&TestUser::signed_in("admin"), 1, 13.8, 100.6).unwrap();
        let moved = &fakes.store.reports()[0];
        assert_eq!((moved.latitude, moved.longitude), (13.8, 100.6));
    }

    #[test]
    fn delete_by_owner_or_admin_keeps_history() {
        let fakes = Fakes::new();
        let mut owned = report(1, 13.75, 100.50, DogStatus::Spotted, 10);
        owned.user_id = "u1".into();
        fakes.store.seed(owned);
        fakes.store.seed(report(2, 13.75, 100.50, DogStatus::Spotted, 10));
        fakes.store.add_profile("admin", true, 30);
        let feed = ReportFeed::mount(fakes.backend(), 1);

        let draft = StatusDraft {
            status: DogStatus::Fed,
            note: None,
            photo_url: None,
        };
        feed.add_status_update(&TestUser::signed_in("u3"), 1, draft).unwrap();

        assert!(matches!(feed.delete_report(&TestUser::signed_in("u3"), 1),
            Err(Error::Forbidden)));
        feed.delete_report(&TestUser::signed_in("u1"), 1).unwrap();
        feed.delete_report(&TestUser::signed_in("admin"), 2).unwrap();
        assert!(matches!(feed.delete_report(&TestUser::signed_in("admin"), 2),
            Err(Error::NotFound)));

        assert!(fakes.store.reports().is_empty());
        assert_eq!(feed.status_updates(1).unwrap().len(), 1);
    }

    #[test]
    fn find_report_falls_back_to_store() {
        let fakes = Fakes::new();
        fakes.store.seed(report(1, 13.75, 100.50, DogStatus::Spotted, 10));
        let feed = ReportFeed::mount(fakes.backend(), 1);
        fakes.store.seed(report(2, 13.75, 100.50, DogStatus::Sick, 0));

        assert_eq!(feed.find_report(1).unwrap().id, 1);
        assert_eq!(feed.find_report(2).unwrap().status, DogStatus::Sick);
        assert!(matches!(feed.find_report(3), Err(Error::NotFound)));
    }

    #[test]
    fn is_admin_reads_profile() {
        let fakes = Fakes::new();
        fakes.store.add_profile("admin", true, 1);
        let feed = ReportFeed::mount(fakes.backend(), 1);

        assert!(feed.is_admin(&TestUser::signed_in("admin")).unwrap());
        assert!(!feed.is_admin(&TestUser::signed_in("nobody")).unwrap());
        assert!(!feed.is_admin(&TestUser::anonymous()).unwrap());
    }

    #[test]
    fn uploads_under_timestamped_key() {
        let fakes = Fakes::new();
        let feed = ReportFeed::mount(fakes.backend(), 1);

        let url = feed.upload_photo("PNG", b"png").unwrap();

        let key = url.rsplit('/').next().unwrap();
        let (millis, rest) = key.split_at(key.find('-').unwrap());
        assert!(millis.parse::<i64>().unwrap() > 0);
        assert!(rest.ends_with(".png"));
        assert_eq!(rest.len(), 1 + PHOTO_KEY_RAND_LEN + 4);
        assert!(rest[1..1 + PHOTO_KEY_RAND_LEN].chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_eq!(fakes.storage.get(key), Some(b"png".to_vec()));
    }
}
