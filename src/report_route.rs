use std::io::{self, Read};
use chrono::{DateTime, Utc};
use rocket::{
    State,
    data::Data,
    request::Form,
    response::content::Json,
};
use serde_json::{json, Value as JsonValue};

use crate::backend::Identity;
use crate::error::{Error, Result};
use crate::lang::{self, Lang};
use crate::model::{Report, ReportDraft, StatusDraft};
use crate::report_feed::ReportFeed;
use crate::session::Session;
use crate::status::DogStatus;
use crate::util;
use crate::zone;


const FILE_UPLOAD_LIMIT: usize = (8 * 1024 * 1024 / 3) * 4; // chars


/// A report as the map shows it: row fields plus its zone, status style
/// and age.
pub fn report_view(report: &Report, lang: Lang, now: DateTime<Utc>) -> JsonValue {
    let mut view = report.to_json();

    view["zone"] = zone::find_nearest_zone(report.latitude, report.longitude)
        .map_or(JsonValue::Null, |z| z.to_json(lang));
    view["status_info"] = report.status.to_json(lang);
    view["age"] = json!(lang::time_ago(report.created_at, now, lang));

    view
}

fn parse_status(raw: &str) -> Result<DogStatus> {
    raw.trim().parse().map_err(|_| Error::validation("Invalid status"))
}


#[derive(FromForm)]
pub struct ReportForm {
    latitude: Option<f64>,
    longitude: Option<f64>,
    status: String,
    description: Option<String>,
    photo_url: Option<String>,
    dog_count: Option<i32>,
}

impl ReportForm {
    fn into_draft(self) -> Result<ReportDraft> {
        Ok(ReportDraft {
            location: self.latitude.and_then(|lat| self.longitude.map(|lng| (lat, lng))),
            status: parse_status(&self.status)?,
            description: self.description,
            photo_url: self.photo_url,
            dog_count: self.dog_count,
        })
    }
}

#[derive(FromForm)]
pub struct StatusForm {
    report_id: i32,
    status: String,
    note: Option<String>,
    photo_url: Option<String>,
}

impl StatusForm {
    fn into_draft(self) -> Result<StatusDraft> {
        Ok(StatusDraft {
            status: parse_status(&self.status)?,
            note: self.note,
            photo_url: self.photo_url,
        })
    }
}


#[get("/report?<id>&<lang>")]
pub fn get_report(id: i32, lang: Option<String>, feed: State<ReportFeed>) -> Result<Json<String>> {
    let lang = Lang::parse_or_default(lang.as_ref().map(String::as_str));
    let report = feed.find_report(id)?;

    Ok(Json(report_view(&report, lang, Utc::now()).to_string()))
}

#[get("/report/status-updates?<id>")]
pub fn get_status_updates(id: i32, feed: State<ReportFeed>) -> Result<Json<String>> {
    let updates = feed.status_updates(id)?
        .iter()
        .map(|u| u.to_json())
        .collect::<Vec<_>>();

    Ok(Json(json!({
        "size": updates.len(),
        "updates": updates,
    }).to_string()))
}

#[post("/report", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_report(form: Option<Form<ReportForm>>, session: Session, feed: State<ReportFeed>)
    -> Result<String> {

    if session.current_user().is_none() {
        return Err(Error::AuthenticationRequired);
    }

    let form = form.ok_or_else(|| Error::validation("Invalid form"))?;
    let draft = form.into_inner().into_draft()?;

    let report = feed.create_report(&session, draft)?;
    Ok(report.id.to_string())
}

#[post("/report/status", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_status_update(form: Option<Form<StatusForm>>, session: Session,
    feed: State<ReportFeed>) -> Result<Json<String>> {

    if session.current_user().is_none() {
        return Err(Error::AuthenticationRequired);
    }

    let form = form.ok_or_else(|| Error::validation("Invalid form"))?.into_inner();
    let report_id = form.report_id;
    let draft = form.into_draft()?;

    let update = feed.add_status_update(&session, report_id, draft)?;
    Ok(Json(update.to_json().to_string()))
}

#[delete("/report?<id>")]
pub fn delete_report(id: i32, session: Session, feed: State<ReportFeed>) -> Result<String> {
    feed.delete_report(&session, id)?;
    Ok(id.to_string())
}

fn read_data_uri<R: Read>(body: R) -> Result<String> {
    let mut data_uri = String::new();
    let read = body.take(FILE_UPLOAD_LIMIT as u64 + 1)
        .read_to_string(&mut data_uri)
        .map_err(|err| match err.kind() {
            io::ErrorKind::InvalidData => Error::validation("Invalid uri"),
            _ => Error::from(err),
        })?;

    if read > FILE_UPLOAD_LIMIT {
        Err(Error::validation("The file is too large"))
    }
    else {
        Ok(data_uri)
    }
}

/// Takes a base64 `data:image/...` URI and returns the stored photo's URL.
#[post("/upload-photo", format="plain", data="<data>")]
pub fn post_upload_photo(data: Data, session: Session, feed: State<ReportFeed>)
    -> Result<Json<String>> {

    if session.current_user().is_none() {
        return Err(Error::AuthenticationRequired);
    }

    let data_uri = read_data_uri(data.open())?;
    let (ext, bytes) = util::decode_image_data_uri(&data_uri)?;
    let url = feed.upload_photo(&ext, &bytes)?;

    Ok(Json(json!({ "url": url }).to_string()))
}
