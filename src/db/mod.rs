pub mod models;
pub mod schema;


use std::cell::RefCell;
use std::sync::Arc;
use std::time::SystemTime;

use diesel::prelude::*;
use diesel::pg::PgConnection;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use chrono::{DateTime, Utc};

use crate::backend::{ChangeEvent, ChangeKind, ReportStore, REPORT_TABLE};
use crate::change_feed::LocalFeed;
use crate::error::{Error, Result};
use crate::model;
use crate::status::DogStatus;
use schema::dog_reports::dsl::{self as r_dsl};
use schema::status_updates::dsl::{self as su_dsl};
use schema::profiles::dsl::{self as p_dsl};
use schema::page_views::dsl::{self as pv_dsl};


thread_local! {
    static DB_CONN: RefCell<Option<PgConnection>> = RefCell::new(None);
}


/// PostgreSQL-backed store. Each worker thread lazily opens its own
/// connection. Successful writes to `dog_reports` are published to the
/// attached change feed.
pub struct PgStore {
    database_url: String,
    changes: Option<Arc<LocalFeed>>,
}

impl PgStore {
    pub fn new(database_url: &str) -> Self {
        PgStore {
            database_url: database_url.to_owned(),
            changes: None,
        }
    }

    pub fn with_change_feed(mut self, changes: Arc<LocalFeed>) -> Self {
        self.changes = Some(changes);
        self
    }

    fn with_conn<T, F>(&self, job: F) -> Result<T> where
        F: FnOnce(&PgConnection) -> QueryResult<T> {

        DB_CONN.with(|cell| -> Result<T> {
            let mut slot = cell.borrow_mut();

            let conn = match slot.take() {
                Some(conn) => conn,
                None => {
                    info!("Open database connection");
                    PgConnection::establish(&self.database_url)?
                },
            };

            let result = job(&conn);

            // A connection that can no longer send commands is dropped and
            // reopened on next use.
            match result {
                Err(DieselError::DatabaseError(DatabaseErrorKind::UnableToSendCommand, _)) => {
                    warn!("Drop broken database connection");
                },
                _ => *slot = Some(conn),
            }

            result.map_err(Error::from)
        })
    }

    fn notify(&self, kind: ChangeKind, row_id: i32) {
        if let Some(ref changes) = self.changes {
            changes.publish(ChangeEvent::new(REPORT_TABLE, kind, Some(row_id)));
        }
    }

    fn notify_touched(&self, kind: ChangeKind, row_id: i32, cnt: usize) -> usize {
        if cnt > 0 {
            self.notify(kind, row_id);
        }
        cnt
    }
}

impl ReportStore for PgStore {
    fn fetch_reports(&self) -> Result<Vec<model::Report>> {
        self.with_conn(|conn| {
            r_dsl::dog_reports
                .order(r_dsl::created_at.desc())
                .load::<models::DogReport>(conn)
        })?
        .into_iter()
        .map(models::DogReport::into_report)
        .collect()
    }

    fn get_report(&self, id: i32) -> Result<Option<model::Report>> {
        self.with_conn(|conn| {
            r_dsl::dog_reports
                .find(id)
                .first::<models::DogReport>(conn)
                .optional()
        })?
        .map(models::DogReport::into_report)
        .transpose()
    }

    fn insert_report(&self, report: &model::NewReport) -> Result<model::Report> {
        let row = models::NewDogReport::stamped(report, SystemTime::now());

        let inserted = self.with_conn(|conn| {
            diesel::insert_into(schema::dog_reports::table)
                .values(&row)
                .get_result::<models::DogReport>(conn)
        })?
        .into_report()?;

        self.notify(ChangeKind::Insert, inserted.id);
        Ok(inserted)
    }

    fn update_report_status(&self, id: i32, status: DogStatus) -> Result<usize> {
        let cnt = self.with_conn(|conn| {
            diesel::update(r_dsl::dog_reports.find(id))
                .set((
                    r_dsl::status.eq(status.as_str()),
                    r_dsl::updated_at.eq(SystemTime::now()),
                ))
                .execute(conn)
        })?;

        Ok(self.notify_touched(ChangeKind::Update, id, cnt))
    }

    fn update_report_location(&self, id: i32, latitude: f64, longitude: f64) -> Result<usize> {
        let cnt = self.with_conn(|conn| {
            diesel::update(r_dsl::dog_reports.find(id))
                .set((
                    r_dsl::latitude.eq(latitude),
                    r_dsl::longitude.eq(longitude),
                    r_dsl::updated_at.eq(SystemTime::now()),
                ))
                .execute(conn)
        })?;

        Ok(self.notify_touched(ChangeKind::Update, id, cnt))
    }

    fn delete_report(&self, id: i32) -> Result<usize> {
        let cnt = self.with_conn(|conn| {
            diesel::delete(r_dsl::dog_reports.find(id))
                .execute(conn)
        })?;

        Ok(self.notify_touched(ChangeKind::Delete, id, cnt))
    }

    fn insert_status_update(&self, update: &model::NewStatusUpdate) -> Result<model::StatusUpdate> {
        let row = models::NewStatusUpdate::stamped(update, SystemTime::now());

        self.with_conn(|conn| {
            diesel::insert_into(schema::status_updates::table)
                .values(&row)
                .get_result::<models::StatusUpdate>(conn)
        })?
        .into_update()
    }

    fn fetch_status_updates(&self, report_id: i32) -> Result<Vec<model::StatusUpdate>> {
        self.with_conn(|conn| {
            su_dsl::status_updates
                .filter(su_dsl::report_id.eq(report_id))
                .order(su_dsl::created_at.desc())
                .load::<models::StatusUpdate>(conn)
        })?
        .into_iter()
        .map(models::StatusUpdate::into_update)
        .collect()
    }

    fn count_status_updates(&self) -> Result<i64> {
        self.with_conn(|conn| {
            su_dsl::status_updates
                .count()
                .get_result::<i64>(conn)
        })
    }

    fn get_profile(&self, user_id: &str) -> Result<Option<model::Profile>> {
        let profile = self.with_conn(|conn| {
            p_dsl::profiles
                .filter(p_dsl::user_id.eq(user_id))
                .first::<models::Profile>(conn)
                .optional()
        })?;

        Ok(profile.map(Into::into))
    }

    fn count_profiles(&self) -> Result<i64> {
        self.with_conn(|conn| {
            p_dsl::profiles
                .count()
                .get_result::<i64>(conn)
        })
    }

    fn profile_signups_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        let times = self.with_conn(|conn| {
            p_dsl::profiles
                .select(p_dsl::created_at)
                .filter(p_dsl::created_at.ge(SystemTime::from(since)))
                .load::<SystemTime>(conn)
        })?;

        Ok(times.into_iter().map(DateTime::<Utc>::from).collect())
    }

    fn insert_page_view(&self, view: &model::NewPageView) -> Result<()> {
        let row = models::NewPageView::stamped(view, SystemTime::now());

        self.with_conn(|conn| {
            diesel::insert_into(schema::page_views::table)
                .values(&row)
                .execute(conn)
        })
        .map(|_| ())
    }

    fn count_page_views(&self) -> Result<i64> {
        self.with_conn(|conn| {
            pv_dsl::page_views
                .count()
                .get_result::<i64>(conn)
        })
    }

    fn count_unique_visitors(&self) -> Result<i64> {
        let visitors = self.with_conn(|conn| {
            pv_dsl::page_views
                .select(pv_dsl::visitor_id)
                .distinct()
                .load::<String>(conn)
        })?;

        Ok(visitors.len() as i64)
    }

    fn page_views_since(&self, since: DateTime<Utc>) -> Result<Vec<(String, DateTime<Utc>)>> {
        let views = self.with_conn(|conn| {
            pv_dsl::page_views
                .select((pv_dsl::visitor_id, pv_dsl::created_at))
                .filter(pv_dsl::created_at.ge(SystemTime::from(since)))
                .load::<(String, SystemTime)>(conn)
        })?;

        Ok(views.into_iter()
            .map(|(visitor, time)| (visitor, DateTime::<Utc>::from(time)))
            .collect())
    }
}
