use std::time::SystemTime;
use chrono::{DateTime, Utc};

use super::schema::{dog_reports, status_updates, page_views};
use crate::error::{Error, Result};
use crate::model;
use crate::status::DogStatus;


fn parse_status(raw: &str) -> Result<DogStatus> {
    raw.parse().map_err(|err: crate::status::UnknownStatus| Error::remote(err.to_string()))
}


#[derive(Queryable)]
pub struct DogReport {
    pub id: i32,
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: String,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub dog_count: i32,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl DogReport {
    pub fn into_report(self) -> Result<model::Report> {
        Ok(model::Report {
            status: parse_status(&self.status)?,
            id: self.id,
            user_id: self.user_id,
            latitude: self.latitude,
            longitude: self.longitude,
            description: self.description,
            photo_url: self.photo_url,
            dog_count: self.dog_count,
            created_at: DateTime::<Utc>::from(self.created_at),
            updated_at: DateTime::<Utc>::from(self.updated_at),
        })
    }
}

#[derive(Insertable)]
#[table_name="dog_reports"]
pub struct NewDogReport<'a> {
    pub user_id: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub status: &'a str,
    pub description: Option<&'a str>,
    pub photo_url: Option<&'a str>,
    pub dog_count: i32,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl<'a> NewDogReport<'a> {
    pub fn stamped(report: &'a model::NewReport, now: SystemTime) -> Self {
        NewDogReport {
            user_id: &report.user_id,
            latitude: report.latitude,
            longitude: report.longitude,
            status: report.status.as_str(),
            description: report.description.as_ref().map(String::as_str),
            photo_url: report.photo_url.as_ref().map(String::as_str),
            dog_count: report.dog_count,
            created_at: now,
            updated_at: now,
        }
    }
}


#[derive(Queryable)]
pub struct StatusUpdate {
    pub id: i32,
    pub report_id: i32,
    pub user_id: String,
    pub status: String,
    pub note: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: SystemTime,
}

impl StatusUpdate {
    pub fn into_update(self) -> Result<model::StatusUpdate> {
        Ok(model::StatusUpdate {
            status: parse_status(&self.status)?,
            id: self.id,
            report_id: self.report_id,
            user_id: self.user_id,
            note: self.note,
            photo_url: self.photo_url,
            created_at: DateTime::<Utc>::from(self.created_at),
        })
    }
}

#[derive(Insertable)]
#[table_name="status_updates"]
pub struct NewStatusUpdate<'a> {
    pub report_id: i32,
    pub user_id: &'a str,
    pub status: &'a str,
    pub note: Option<&'a str>,
    pub photo_url: Option<&'a str>,
    pub created_at: SystemTime,
}

impl<'a> NewStatusUpdate<'a> {
    pub fn stamped(update: &'a model::NewStatusUpdate, now: SystemTime) -> Self {
        NewStatusUpdate {
            report_id: update.report_id,
            user_id: &update.user_id,
            status: update.status.as_str(),
            note: update.note.as_ref().map(String::as_str),
            photo_url: update.photo_url.as_ref().map(String::as_str),
            created_at: now,
        }
    }
}


#[derive(Queryable)]
pub struct Profile {
    pub id: i32,
    pub user_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub created_at: SystemTime,
}

impl From<Profile> for model::Profile {
    fn from(p: Profile) -> Self {
        model::Profile {
            id: p.id,
            user_id: p.user_id,
            display_name: p.display_name,
            avatar_url: p.avatar_url,
            is_admin: p.is_admin,
            created_at: DateTime::<Utc>::from(p.created_at),
        }
    }
}


#[derive(Insertable)]
#[table_name="page_views"]
pub struct NewPageView<'a> {
    pub visitor_id: &'a str,
    pub fingerprint: &'a str,
    pub path: &'a str,
    pub referrer: Option<&'a str>,
    pub created_at: SystemTime,
}

impl<'a> NewPageView<'a> {
    pub fn stamped(view: &'a model::NewPageView, now: SystemTime) -> Self {
        NewPageView {
            visitor_id: &view.visitor_id,
            fingerprint: &view.fingerprint,
            path: &view.path,
            referrer: view.referrer.as_ref().map(String::as_str),
            created_at: now,
        }
    }
}
