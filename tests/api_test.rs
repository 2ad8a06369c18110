use actix_web::{test, web, App};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

use timecapsule_backend::handlers;
use timecapsule_backend::service::CapsuleService;
use timecapsule_backend::storage::local::LocalBackend;
use timecapsule_backend::storage::FallbackStore;

fn capsule_service(dir: &TempDir) -> web::Data<CapsuleService> {
    let local = LocalBackend::new(dir.path().join("local_db.json"), dir.path().join("uploads"));
    let store = Arc::new(FallbackStore::new(None, local));
    web::Data::new(CapsuleService::new(store))
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
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
    .service(web::resource("/api/health").route(web::get().to(handlers::health::health_check)));
}

#[actix_web::test]
async fn health_endpoint_reports_healthy() {
    let dir = TempDir::new().unwrap();
    let app =
        test::init_service(App::new().app_data(capsule_service(&dir)).configure(routes)).await;

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].as_i64().unwrap() > 0);
}

#[actix_web::test]
async fn create_detail_unlock_flow_over_local_store() {
    let dir = TempDir::new().unwrap();
    let app =
        test::init_service(App::new().app_data(capsule_service(&dir)).configure(routes)).await;

    let req = test::TestRequest::post()
        .uri("/api/capsules/json")
        .set_json(json!({
            "title": "graduation",
            "owner": "alice@example.com",
            "unlockDate": "2999-01-01",
            "message": "see you then"
        }))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["title"], "graduation");
    assert_eq!(created["is_unlocked"], false);

    let req = test::TestRequest::get()
        .uri(&format!("/api/capsules/{}", id))
        .to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail["unlocked"], false);
    assert_eq!(detail["capsule"]["owner"], "alice@example.com");

    let req = test::TestRequest::post()
        .uri(&format!("/api/capsules/{}/unlock", id))
        .to_request();
    let unlock: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(unlock["success"], true);

    let req = test::TestRequest::get()
        .uri(&format!("/api/capsules/{}", id))
        .to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail["unlocked"], true);
    assert_eq!(detail["capsule"]["is_unlocked"], true);
}

#[actix_web::test]
async fn multipart_create_stores_attachment_and_resolves_url_when_due() {
    let dir = TempDir::new().unwrap();
    let app =
        test::init_service(App::new().app_data(capsule_service(&dir)).configure(routes)).await;

    let boundary = "X-CAPSULE-TEST-BOUNDARY";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nwith files\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"owner\"\r\n\r\nalice@example.com\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"unlockDate\"\r\n\r\n2020-01-01\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"note.txt\"\r\n\
         Content-Type: text/plain\r\n\r\nhello future\r\n\
         --{b}--\r\n",
        b = boundary
    );
    let req = test::TestRequest::post()
        .uri("/api/capsules")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        ))
        .set_payload(body)
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["title"], "with files");

    // 2020 is in the past, so the attachment URL must resolve.
    let req = test::TestRequest::get()
        .uri(&format!("/api/capsules/{}", id))
        .to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail["unlocked"], true);
    let files = detail["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["original_name"], "note.txt");
    let url = files[0]["url"].as_str().unwrap();
    assert!(url.starts_with("/uploads/"));
    assert!(url.ends_with("note.txt"));
}

#[actix_web::test]
async fn list_returns_only_the_requested_owner() {
    let dir = TempDir::new().unwrap();
    let app =
        test::init_service(App::new().app_data(capsule_service(&dir)).configure(routes)).await;

    for (owner, title) in [
        ("alice@example.com", "one"),
        ("bob@example.com", "two"),
        ("alice@example.com", "three"),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/capsules/json")
            .set_json(json!({
                "title": title,
                "owner": owner,
                "unlockDate": "2999-01-01"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    let req = test::TestRequest::get()
        .uri("/api/capsules?owner=alice@example.com")
        .to_request();
    let capsules: Value = test::call_and_read_body_json(&app, req).await;
    let capsules = capsules.as_array().unwrap();
    assert_eq!(capsules.len(), 2);
    assert!(capsules.iter().all(|c| c["owner"] == "alice@example.com"));
}

#[actix_web::test]
async fn malformed_unlock_date_is_a_client_error() {
    let dir = TempDir::new().unwrap();
    let app =
        test::init_service(App::new().app_data(capsule_service(&dir)).configure(routes)).await;

    let req = test::TestRequest::post()
        .uri("/api/capsules/json")
        .set_json(json!({
            "title": "bad",
            "owner": "alice@example.com",
            "unlockDate": "not-a-date"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

    // Nothing was persisted.
    let req = test::TestRequest::get()
        .uri("/api/capsules?owner=alice@example.com")
        .to_request();
    let capsules: Value = test::call_and_read_body_json(&app, req).await;
    assert!(capsules.as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn unknown_capsule_is_not_found() {
    let dir = TempDir::new().unwrap();
    let app =
        test::init_service(App::new().app_data(capsule_service(&dir)).configure(routes)).await;

    let req = test::TestRequest::get().uri("/api/capsules/404").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/capsules/404/unlock")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
}
