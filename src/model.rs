use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};

use crate::geo;
use crate::status::DogStatus;


const MAX_TEXT_LEN: usize = 65536;
const MAX_DOG_COUNT: i32 = 999;


#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub id: i32,
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: DogStatus,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub dog_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub fn to_json(&self) -> JsonValue {
        json!({
            "id": self.id,
            "user_id": self.user_id,
            "latitude": self.latitude,
            "longitude": self.longitude,
            "status": self.status.as_str(),
            "description": self.description,
            "photo_url": self.photo_url,
            "dog_count": self.dog_count,
            "created_at": self.created_at.timestamp(),
            "updated_at": self.updated_at.timestamp(),
        })
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub id: i32,
    pub report_id: i32,
    pub user_id: String,
    pub status: DogStatus,
    pub note: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn to_json(&self) -> JsonValue {
        json!({
            "id": self.id,
            "report_id": self.report_id,
            "user_id": self.user_id,
            "status": self.status.as_str(),
            "note": self.note,
            "photo_url": self.photo_url,
            "created_at": self.created_at.timestamp(),
        })
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: i32,
    pub user_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}


/// A signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
}


/// Row values for a report insert. The store stamps the timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: DogStatus,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub dog_count: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewStatusUpdate {
    pub report_id: i32,
    pub user_id: String,
    pub status: DogStatus,
    pub note: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPageView {
    pub visitor_id: String,
    pub fingerprint: String,
    pub path: String,
    pub referrer: Option<String>,
}


/// What a user submits when reporting a dog.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDraft {
    pub location: Option<(f64, f64)>,
    pub status: DogStatus,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub dog_count: Option<i32>,
}

impl ReportDraft {
    pub fn at(latitude: f64, longitude: f64, status: DogStatus) -> Self {
        ReportDraft {
            location: Some((latitude, longitude)),
            status,
            description: None,
            photo_url: None,
            dog_count: None,
        }
    }

    pub fn verify_error(&self) -> Option<&'static str> {
        match self.location {
            None => return Some("Please select a location on the map"),
            Some((lat, lng)) if !geo::is_valid_coordinate(lat, lng) => {
                return Some("Location is out of range")
            },
            _ => (),
        }

        match self.dog_count {
            Some(cnt) if cnt < 1 => Some("There must be at least one dog"),
            Some(cnt) if cnt > MAX_DOG_COUNT => Some("Too many dogs"),
            _ if text_too_long(&self.description) => {
                Some("The maximum length of the description is 65536")
            },
            _ if url_too_long(&self.photo_url) => Some("Invalid photo"),
            _ => None,
        }
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct StatusDraft {
    pub status: DogStatus,
    pub note: Option<String>,
    pub photo_url: Option<String>,
}

impl StatusDraft {
    pub fn verify_error(&self) -> Option<&'static str> {
        if text_too_long(&self.note) {
            Some("The maximum length of the note is 65536")
        }
        else if url_too_long(&self.photo_url) {
            Some("Invalid photo")
        }
        else {
            None
        }
    }
}


/// Blank optional text counts as absent.
pub fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

fn text_too_long(text: &Option<String>) -> bool {
    text.as_ref().map_or(false, |t| t.len() >= MAX_TEXT_LEN)
}

fn url_too_long(url: &Option<String>) -> bool {
    url.as_ref().map_or(false, |u| u.len() > 1024)
}
