use actix_web::HttpResponse;
use serde_json::json;

use crate::utils::datetime::now_millis;

pub async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "Digital Time Capsule API" }))
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": now_millis(),
    }))
}
