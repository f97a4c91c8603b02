use chrono::Utc;
use rocket::{
    State,
    request::Form,
    response::content::Json,
};
use serde_json::json;

use crate::backend::{Backend, Identity};
use crate::error::{Error, Result};
use crate::report_feed::ReportFeed;
use crate::session::Session;
use crate::stats::DashboardStats;
use crate::status::DogStatus;


#[derive(FromForm)]
pub struct MoveForm {
    id: i32,
    latitude: f64,
    longitude: f64,
}


fn require_admin(session: &Session, feed: &ReportFeed) -> Result<()> {
    if session.current_user().is_none() {
        Err(Error::AuthenticationRequired)
    }
    else if feed.is_admin(session)? {
        Ok(())
    }
    else {
        Err(Error::Forbidden)
    }
}


#[get("/admin/stats")]
pub fn get_stats(session: Session, feed: State<ReportFeed>, backend: State<Backend>)
    -> Result<Json<String>> {

    require_admin(&session, &feed)?;

    let stats = DashboardStats::collect(&feed.snapshot(), &*backend.store, Utc::now())?;
    Ok(Json(stats.to_json().to_string()))
}

/// Every report, newest first, optionally narrowed to one status.
#[get("/admin/reports?<status>")]
pub fn get_reports(status: Option<String>, session: Session, feed: State<ReportFeed>)
    -> Result<Json<String>> {

    require_admin(&session, &feed)?;

    let status = match status.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<DogStatus>()
            .map_err(|err| Error::validation(err.to_string()))?),
        None => None,
    };

    let reports = feed.snapshot();
    let listed = reports.iter()
        .filter(|r| status.map_or(true, |s| r.status == s))
        .map(|r| r.to_json())
        .collect::<Vec<_>>();

    Ok(Json(json!({
        "total": reports.len(),
        "size": listed.len(),
        "reports": listed,
    }).to_string()))
}

#[post("/admin/report/move", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_move_report(form: Option<Form<MoveForm>>, session: Session, feed: State<ReportFeed>)
    -> Result<String> {

    let form = form.ok_or_else(|| Error::validation("Invalid form"))?;
    feed.move_report(&session, form.id, form.latitude, form.longitude)?;

    Ok(form.id.to_string())
}
