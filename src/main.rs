#![feature(proc_macro_hygiene, decl_macro)]


#[macro_use] extern crate lazy_static;
#[macro_use] extern crate rocket;
#[macro_use] extern crate diesel;
#[macro_use] extern crate log;


mod error;
mod config;
mod logger;
mod util;
mod geo;
mod lang;
mod status;
mod model;
mod zone;
mod backend;
mod change_feed;
mod storage;
mod db;
mod session;
mod task_scheduler;
mod report_feed;
mod stats;
mod geocode_sys;
mod report_route;
mod zone_route;
mod admin_route;
mod site_route;
#[cfg(test)]
mod testing;


use std::{process, sync::Arc};

use crate::backend::Backend;
use crate::change_feed::LocalFeed;
use crate::config::Config;
use crate::db::PgStore;
use crate::geocode_sys::{Geocoder, Nominatim, SearchDebouncer};
use crate::report_feed::ReportFeed;
use crate::storage::DirStorage;
use crate::task_scheduler::TaskSchedulerBuilder;


fn build_rocket(config: Config, backend: Backend, feed: ReportFeed, search: SearchDebouncer)
    -> rocket::Rocket {

    if config.is_debug() {
        // Debug
        rocket::ignite()
            .mount("/", routes![site_route::test_login])
    }
    else {
        // Release
        rocket::ignite()
    }
    .mount("/", routes![
        site_route::index,
        site_route::get_photo,
        site_route::get_translations,
        site_route::post_page_view,
        site_route::post_logout,
    ])
    .mount("/", routes![
        zone_route::get_zones,
        zone_route::get_report_map,
    ])
    .mount("/", routes![
        report_route::get_report,
        report_route::get_status_updates,
        report_route::post_report,
        report_route::post_status_update,
        report_route::delete_report,
        report_route::post_upload_photo,
    ])
    .mount("/", routes![
        admin_route::get_stats,
        admin_route::get_reports,
        admin_route::post_move_report,
    ])
    .mount("/", routes![
        geocode_sys::get_geocode,
    ])
    .manage(config)
    .manage(backend)
    .manage(feed)
    .manage(search)
}


fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        },
    };

    let _sentry = logger::init(&config);

    let storage = match DirStorage::open(&config.photo_dir, &config.photo_url_prefix()) {
        Ok(storage) => storage,
        Err(err) => {
            error!("Fail to open photo storage: {}", err);
            process::exit(1);
        },
    };

    let geocoder: Arc<dyn Geocoder> = match Nominatim::new(&config.geocoder_url) {
        Ok(geocoder) => Arc::new(geocoder),
        Err(err) => {
            error!("Fail to create geocoder: {}", err);
            process::exit(1);
        },
    };

    let changes = LocalFeed::start();
    let store = PgStore::new(&config.database_url).with_change_feed(changes.clone());

    let backend = Backend {
        store: Arc::new(store),
        changes: changes.clone(),
        storage: Arc::new(storage),
    };

    let feed = ReportFeed::mount(backend.clone(), config.feed_workers);

    let mut scheduler = TaskSchedulerBuilder::new();
    report_feed::init_resync(&feed, config.resync_period, &mut scheduler);
    let scheduler = scheduler.build();

    let search = SearchDebouncer::new(geocoder);
    let err = build_rocket(config, backend, feed, search).launch();
    error!("Launch failed: {}", err);

    scheduler.join();
    changes.close();
}
