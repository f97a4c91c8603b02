use log::{Record, Metadata, LevelFilter};
use chrono::Utc;

use crate::config::Config;


pub struct Logger {
    level: LevelFilter,
}

impl Logger {
    pub fn new(level: LevelFilter) -> Self {
        Logger { level }
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("[{}] [{}] {} - {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S"),
                record.target(), record.level(), record.args());
        }
    }

    fn flush(&self) {}
}


/// Installs the global logger. With a DSN configured, records also flow to
/// Sentry; keep the returned guard alive until shutdown.
pub fn init(config: &Config) -> Option<sentry::ClientInitGuard> {
    let logger = Logger::new(config.log_level);

    let guard = config.sentry_dsn.as_ref().and_then(|dsn| {
        match dsn.parse::<sentry::types::Dsn>() {
            Ok(dsn) => Some(sentry::init(sentry::ClientOptions {
                dsn: Some(dsn),
                release: sentry::release_name!(),
                environment: Some(config.rocket_env.clone().into()),
                ..Default::default()
            })),
            Err(err) => {
                eprintln!("Ignore invalid SENTRY_DSN: {}", err);
                None
            },
        }
    });

    let installed = if guard.is_some() {
        log::set_boxed_logger(Box::new(sentry_log::SentryLogger::with_dest(logger)))
    }
    else {
        log::set_boxed_logger(Box::new(logger))
    };

    match installed {
        Ok(_) => log::set_max_level(config.log_level),
        Err(err) => eprintln!("Logger already installed: {}", err),
    }

    guard
}
