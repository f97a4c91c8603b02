use std::collections::BTreeSet;
use chrono::Utc;
use rocket::{
    State,
    response::content::Json,
};
use serde_json::{json, Value as JsonValue};

use crate::error::{Error, Result};
use crate::lang::Lang;
use crate::report_feed::ReportFeed;
use crate::report_route::report_view;
use crate::status::DogStatus;
use crate::zone::{self, Zone};


/// `status=hungry,hurt`. Blank entries are skipped.
pub fn parse_status_list(raw: Option<&str>) -> Result<BTreeSet<DogStatus>> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<DogStatus>().map_err(|err| Error::validation(err.to_string())))
        .collect()
}

fn zone_entry(zone: &Zone, count: usize, lang: Lang) -> JsonValue {
    let mut entry = zone.to_json(lang);
    entry["count"] = json!(count);
    entry
}


#[get("/zones?<search>&<lang>")]
pub fn get_zones(search: Option<String>, lang: Option<String>, feed: State<ReportFeed>)
    -> Json<String> {

    let lang = Lang::parse_or_default(lang.as_ref().map(String::as_str));
    let reports = feed.snapshot();
    let counts = zone::zone_report_counts(&reports, zone::registry());

    let count_of = |zone: &Zone| counts.iter()
        .find(|(z, _)| z.id == zone.id)
        .map_or(0, |(_, cnt)| *cnt);
    let entries = |zones: Vec<&Zone>| zones.into_iter()
        .map(|z| zone_entry(z, count_of(z), lang))
        .collect::<Vec<_>>();

    let body = match search.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(query) => {
            let found = entries(zone::search_zones(query));
            json!({
                "total": reports.len(),
                "size": found.len(),
                "zones": found,
            })
        },
        None => {
            let popular = entries(zone::popular_zones());
            let other = entries(zone::other_zones());
            json!({
                "total": reports.len(),
                "size": popular.len() + other.len(),
                "popular": popular,
                "other": other,
            })
        },
    };

    Json(body.to_string())
}

#[get("/report-map?<zone>&<status>&<lang>")]
pub fn get_report_map(zone: Option<String>, status: Option<String>, lang: Option<String>,
    feed: State<ReportFeed>) -> Result<Json<String>> {

    let lang = Lang::parse_or_default(lang.as_ref().map(String::as_str));
    let selected = match zone.as_ref().filter(|id| !id.is_empty()) {
        Some(id) => Some(zone::find_zone(id).ok_or(Error::NotFound)?),
        None => None,
    };
    let statuses = parse_status_list(status.as_ref().map(String::as_str))?;

    let reports = feed.snapshot();
    let in_zone = zone::filter_by_zone(&reports, selected);
    let visible = zone::filter_by_status(in_zone, &statuses);

    let now = Utc::now();
    let views = visible.iter()
        .map(|r| report_view(r, lang, now))
        .collect::<Vec<_>>();

    Ok(Json(json!({
        "zone": selected.map(|z| z.to_json(lang)),
        "total": reports.len(),
        "size": views.len(),
        "reports": views,
    }).to_string()))
}
