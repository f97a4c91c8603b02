use std::{
    env,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};
use log::LevelFilter;

use crate::error::{Error, Result};


const DEFAULT_PHOTO_DIR: &'static str = "upload/photos/";
const DEFAULT_GEOCODER_URL: &'static str = "https://nominatim.openstreetmap.org/search";
const DEBUG_ENVS: [&'static str; 4] = ["dev", "development", "staging", "stage"];


pub struct Config {
    pub database_url: String,
    pub rocket_env: String,
    pub photo_dir: PathBuf,
    pub public_base_url: String,
    pub geocoder_url: String,
    pub sentry_dsn: Option<String>,
    pub log_level: LevelFilter,
    /// Zero disables the periodic resync job.
    pub resync_period: Duration,
    pub feed_workers: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self> where
        F: Fn(&str) -> Option<String> {

        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::Config("DATABASE_URL must be set".into()))?;

        let rocket_env = lookup("ROCKET_ENV").unwrap_or_else(|| {
            if cfg!(debug_assertions) {
                "development".into()
            }
            else {
                "production".into()
            }
        });

        Ok(Config {
            database_url,
            rocket_env,
            photo_dir: lookup("PHOTO_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PHOTO_DIR)),
            public_base_url: lookup("PUBLIC_BASE_URL").unwrap_or_default(),
            geocoder_url: lookup("GEOCODER_URL")
                .unwrap_or_else(|| DEFAULT_GEOCODER_URL.into()),
            sentry_dsn: lookup("SENTRY_DSN").filter(|dsn| !dsn.is_empty()),
            log_level: parse_var(&lookup, "LOG_LEVEL", LevelFilter::Info)?,
            resync_period: Duration::from_secs(parse_var(&lookup, "RESYNC_SECS", 300)?),
            feed_workers: parse_var(&lookup, "FEED_WORKERS", 2usize)?.max(1),
        })
    }

    pub fn is_debug(&self) -> bool {
        DEBUG_ENVS.iter().any(|&v| v == self.rocket_env)
    }

    /// URL prefix photos are served under.
    pub fn photo_url_prefix(&self) -> String {
        format!("{}/photos", self.public_base_url.trim_end_matches('/'))
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T> where
    F: Fn(&str) -> Option<String>,
    T: FromStr {

    match lookup(key) {
        Some(raw) => raw.trim().parse()
            .map_err(|_| Error::Config(format!("Invalid {} value: {}", key, raw))),
        None => Ok(default),
    }
}
