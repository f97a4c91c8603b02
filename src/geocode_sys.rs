use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    sync::atomic::{AtomicU64, Ordering},
    thread,
    time::Duration,
};
use rocket::{
    State,
    response::content::Json,
};
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use serde_json::{json, Value as JsonValue};

use crate::error::{Error, Result};
use crate::lang::Lang;


pub const MIN_QUERY_LEN: usize = 2;
pub const DEBOUNCE: Duration = Duration::from_millis(400);
const RESULT_LIMIT: &'static str = "5";
const COUNTRY_CODES: &'static str = "th";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);


#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub display_name: String,
    pub lat: String,
    pub lon: String,
}

impl Place {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.lat.parse::<f64>(), self.lon.parse::<f64>()) {
            (Ok(lat), Ok(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "display_name": self.display_name,
            "lat": self.lat,
            "lon": self.lon,
        })
    }
}


pub trait Geocoder: Send + Sync {
    fn search(&self, query: &str, lang: Lang) -> Result<Vec<Place>>;
}

pub fn is_searchable(query: &str) -> bool {
    query.chars().count() >= MIN_QUERY_LEN
}


/// Free-text place search against a Nominatim endpoint, limited to Thailand.
pub struct Nominatim {
    client: reqwest::Client,
    url: String,
}

impl Nominatim {
    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Nominatim {
            client,
            url: url.to_owned(),
        })
    }
}

impl Geocoder for Nominatim {
    fn search(&self, query: &str, lang: Lang) -> Result<Vec<Place>> {
        if !is_searchable(query) {
            return Ok(Vec::new());
        }

        let body = self.client.get(&self.url)
            .query(&[
                ("format", "json"),
                ("q", query),
                ("countrycodes", COUNTRY_CODES),
                ("limit", RESULT_LIMIT),
            ])
            .header(ACCEPT_LANGUAGE, lang.as_str())
            .header(USER_AGENT, concat!("dog-help-map-server/", env!("CARGO_PKG_VERSION")))
            .send()
            .and_then(|res| res.error_for_status())
            .and_then(|mut res| res.text())?;

        parse_places(&body)
    }
}

/// Entries without a name or numeric coordinates are skipped.
pub fn parse_places(body: &str) -> Result<Vec<Place>> {
    let value = serde_json::from_str::<JsonValue>(body)
        .map_err(|err| Error::remote(err.to_string()))?;

    let entries = value.as_array()
        .ok_or_else(|| Error::remote("Invalid geocoder response"))?;

    let places = entries.iter()
        .filter_map(|entry| {
            let display_name = entry["display_name"].as_str()?;
            let lat = entry["lat"].as_str()?;
            let lon = entry["lon"].as_str()?;

            Some(Place {
                display_name: display_name.to_owned(),
                lat: lat.to_owned(),
                lon: lon.to_owned(),
            })
        })
        .filter(|place| place.coordinates().is_some())
        .collect();

    Ok(places)
}


/// Ticket for one search request from one client. Only the newest ticket
/// of a client may reach the geocoder.
struct Ticket {
    client: String,
    id: u64,
}

/// Collapses a burst of searches from the same client into one geocoder
/// request: each search waits out the quiet period and is dropped if the
/// client searched again meanwhile. Queries too short to search cancel the
/// client's pending search and resolve to no results without a request.
pub struct SearchDebouncer {
    geocoder: Arc<dyn Geocoder>,
    quiet: Duration,
    next_ticket: AtomicU64,
    latest: Mutex<HashMap<String, u64>>,
}

impl SearchDebouncer {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        SearchDebouncer {
            geocoder,
            quiet: DEBOUNCE,
            next_ticket: AtomicU64::new(0),
            latest: Mutex::new(HashMap::new()),
        }
    }

    pub fn quiet_period(mut self, quiet: Duration) -> Self {
        self.quiet = quiet;
        self
    }

    fn latest(&self) -> MutexGuard<HashMap<String, u64>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, client: &str) -> Ticket {
        let id = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        self.latest().insert(client.to_owned(), id);

        Ticket {
            client: client.to_owned(),
            id,
        }
    }

    fn cancel(&self, client: &str) {
        self.latest().remove(client);
    }

    /// `None` when a newer search from the same client superseded this one.
    fn resolve(&self, ticket: &Ticket, query: &str, lang: Lang) -> Result<Option<Vec<Place>>> {
        {
            let mut latest = self.latest();
            if latest.get(&ticket.client) != Some(&ticket.id) {
                return Ok(None);
            }
            latest.remove(&ticket.client);
        }

        self.geocoder.search(query, lang).map(Some)
    }

    /// Blocks for the quiet period, then searches unless superseded.
    pub fn search(&self, client: &str, query: &str, lang: Lang) -> Result<Option<Vec<Place>>> {
        if !is_searchable(query) {
            self.cancel(client);
            return Ok(Some(Vec::new()));
        }

        let ticket = self.begin(client);
        if self.quiet > Duration::from_secs(0) {
            thread::sleep(self.quiet);
        }
        self.resolve(&ticket, query, lang)
    }
}


fn client_key(visitor: Option<&str>, remote: Option<SocketAddr>) -> String {
    match visitor.map(str::trim).filter(|v| !v.is_empty()) {
        Some(visitor) => format!("v:{}", visitor),
        None => remote.map_or_else(String::new, |addr| format!("ip:{}", addr.ip())),
    }
}

/// `superseded` is set when the same visitor searched again within the
/// quiet period; the newer request carries the results.
#[get("/geocode?<q>&<lang>&<visitor>")]
pub fn get_geocode(q: String, lang: Option<String>, visitor: Option<String>,
    remote: Option<SocketAddr>, debouncer: State<SearchDebouncer>) -> Result<Json<String>> {

    let lang = Lang::parse_or_default(lang.as_ref().map(String::as_str));
    let client = client_key(visitor.as_ref().map(String::as_str), remote);

    let body = match debouncer.search(&client, &q, lang)? {
        Some(places) => json!({
            "places": places.iter().map(Place::to_json).collect::<Vec<_>>(),
            "size": places.len(),
            "superseded": false,
        }),
        None => json!({
            "places": [],
            "size": 0,
            "superseded": true,
        }),
    };

    Ok(Json(body.to_string()))
}
