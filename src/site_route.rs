use std::path::PathBuf;
use rocket::{
    State,
    http::Cookies,
    request::Form,
    response::{NamedFile, content::Json},
};
use serde_json::{json, Value as JsonValue};

use crate::backend::{Backend, ReportStore};
use crate::config::Config;
use crate::lang::{Lang, TRANSLATIONS};
use crate::model::{self, NewPageView};
use crate::report_feed::ReportFeed;
use crate::session::Session;
use crate::status::DogStatus;


const MAX_PAGE_VIEW_FIELD_LEN: usize = 2048;


#[get("/")]
pub fn index() -> &'static str {
    "Dog Help Map Server"
}

#[get("/photos/<file..>")]
pub fn get_photo(file: PathBuf, config: State<Config>) -> Option<NamedFile> {
    NamedFile::open(config.photo_dir.join(file)).ok()
}


pub fn translation_table(lang: Lang) -> JsonValue {
    let strings = TRANSLATIONS.iter()
        .map(|(key, label)| (key.to_string(), json!(label.get(lang))))
        .collect::<serde_json::Map<_, _>>();
    let statuses = DogStatus::ALL.iter()
        .map(|status| status.to_json(lang))
        .collect::<Vec<_>>();

    json!({
        "lang": lang.as_str(),
        "strings": strings,
        "statuses": statuses,
    })
}

#[get("/i18n?<lang>")]
pub fn get_translations(lang: Option<String>) -> Json<String> {
    let lang = Lang::parse_or_default(lang.as_ref().map(String::as_str));
    Json(translation_table(lang).to_string())
}


#[derive(FromForm)]
pub struct PageViewForm {
    visitor_id: String,
    fingerprint: String,
    path: String,
    referrer: Option<String>,
}

impl PageViewForm {
    fn verify_error(&self) -> Option<&'static str> {
        let too_long = |s: &str| s.len() > MAX_PAGE_VIEW_FIELD_LEN;

        if self.visitor_id.trim().is_empty() {
            Some("Missing visitor")
        }
        else if too_long(&self.visitor_id) || too_long(&self.fingerprint) || too_long(&self.path)
            || self.referrer.as_ref().map_or(false, |r| too_long(r)) {
            Some("Field too long")
        }
        else {
            None
        }
    }
}

/// Telemetry never fails the caller: problems are logged and the view is
/// dropped. Returns whether a row was written.
pub fn record_page_view(store: &dyn ReportStore, from_admin: bool, view: &NewPageView) -> bool {
    if from_admin {
        return false;
    }

    match store.insert_page_view(view) {
        Ok(()) => true,
        Err(err) => {
            warn!("Fail to record page view of {}: {}", view.path, err);
            false
        },
    }
}

#[post("/page-view", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_page_view(form: Option<Form<PageViewForm>>, session: Session,
    feed: State<ReportFeed>, backend: State<Backend>) -> &'static str {

    let form = match form {
        Some(form) => form.into_inner(),
        None => return "",
    };
    if let Some(err) = form.verify_error() {
        info!("Drop page view: {}", err);
        return "";
    }

    let from_admin = feed.is_admin(&session).unwrap_or_else(|err| {
        warn!("Fail to check admin for page view: {}", err);
        false
    });

    let view = NewPageView {
        visitor_id: form.visitor_id,
        fingerprint: form.fingerprint,
        path: form.path,
        referrer: model::non_empty(form.referrer),
    };
    record_page_view(&*backend.store, from_admin, &view);

    ""
}


#[get("/test-login?<user_id>")]
pub fn test_login(user_id: String, mut cookies: Cookies) -> String {
    Session::start(&mut cookies, &user_id);
    user_id
}

#[post("/logout")]
pub fn post_logout(mut cookies: Cookies) -> &'static str {
    Session::end(&mut cookies);
    ""
}
