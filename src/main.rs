use std::fs;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use log::{info, warn};

use timecapsule_backend::config::Config;
use timecapsule_backend::db;
use timecapsule_backend::handlers;
use timecapsule_backend::scheduler::UnlockScheduler;
use timecapsule_backend::service::CapsuleService;
use timecapsule_backend::storage::local::LocalBackend;
use timecapsule_backend::storage::remote::RemoteBackend;
use timecapsule_backend::storage::FallbackStore;
use timecapsule_backend::utils;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    fs::create_dir_all(&config.upload_dir)?;

    // The remote backend is optional: without DATABASE_URL the process runs
    // on the local store alone, the same degraded mode the fallback path uses.
    let remote = match &config.database_url {
        Some(url) => match db::create_pool(url) {
            Ok(pool) => {
                let s3 = utils::s3::create_s3_client(config.aws_region.clone()).await;
                Some(RemoteBackend::new(pool, s3, config.storage_bucket.clone()))
            }
            Err(e) => {
                warn!("remote backend unavailable: {}, using the local store only", e);
                None
            }
        },
        None => {
            info!("DATABASE_URL not set, using the local store only");
            None
        }
    };

    let local = LocalBackend::new(config.local_db_path.clone(), config.upload_dir.clone());
    let store = Arc::new(FallbackStore::new(remote, local));
    let service = web::Data::new(CapsuleService::new(store.clone()));

    // The handle must outlive the server loop or the scheduler stops early.
    let _scheduler = UnlockScheduler::new(
        store,
        Duration::from_secs(config.check_interval_seconds),
    )
    .spawn();

    info!("Starting server at {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .service(web::resource("/").route(web::get().to(handlers::health::index)))
            .service(
                web::resource("/api/capsules")
                    .route(web::get().to(handlers::capsule::list_capsules))
                    .route(web::post().to(handlers::capsule::create_capsule)),
            )
            .service(
                web::resource("/api/capsules/json")
                    .route(web::post().to(handlers::capsule::create_capsule_json)),
            )
            .service(
                web::resource("/api/capsules/{id}")
                    .route(web::get().to(handlers::capsule::get_capsule_detail)),
            )
            .service(
                web::resource("/api/capsules/{id}/unlock")
                    .route(web::post().to(handlers::capsule::manual_unlock)),
            )
            .service(web::resource("/api/health").route(web::get().to(handlers::health::health_check)))
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
