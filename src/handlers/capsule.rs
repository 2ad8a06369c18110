use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::errors::AppError;
use crate::service::{CapsuleService, Upload};
use crate::utils::validation::validate_payload;

#[derive(Deserialize, Validate)]
pub struct CapsuleCreate {
    #[validate(length(min = 1, max = 200))]
    title: String,
    #[validate(length(min = 1, max = 200))]
    owner: String,
    #[serde(rename = "unlockDate")]
    unlock_date: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
pub struct ListQuery {
    owner: Option<String>,
}

pub async fn list_capsules(
    service: web::Data<CapsuleService>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, actix_web::Error> {
    let owner = query
        .owner
        .clone()
        .unwrap_or_else(|| "alice@example.com".to_string());
    let capsules = service.list(&owner).await?;
    Ok(HttpResponse::Ok().json(capsules))
}

async fn read_bytes(field: &mut Field) -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::Validation(format!("upload read failed: {}", e)))?;
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

async fn read_text(field: &mut Field) -> Result<String, AppError> {
    let bytes = read_bytes(field).await?;
    String::from_utf8(bytes)
        .map_err(|_| AppError::Validation("Form field is not valid UTF-8".to_string()))
}

/// Multipart create: text fields `title`, `owner`, `unlockDate`, `message`
/// plus any number of `files` parts.
pub async fn create_capsule(
    service: web::Data<CapsuleService>,
    mut payload: Multipart,
) -> Result<HttpResponse, actix_web::Error> {
    let mut title = None;
    let mut owner = None;
    let mut unlock_date = None;
    let mut message = String::new();
    let mut attachments: Vec<Upload> = Vec::new();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| AppError::Validation(e.to_string()))?;
        let name = field.name().to_string();
        match name.as_str() {
            "title" => title = Some(read_text(&mut field).await?),
            "owner" => owner = Some(read_text(&mut field).await?),
            "unlockDate" => unlock_date = Some(read_text(&mut field).await?),
            "message" => message = read_text(&mut field).await?,
            "files" => {
                let filename = field
                    .content_disposition()
                    .get_filename()
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "attachment".to_string());
                let declared = field.content_type().map(|m| m.to_string());
                let bytes = read_bytes(&mut field).await?;
                // Sniff the mimetype when the client did not declare one.
                let mimetype = declared
                    .or_else(|| infer::get(&bytes).map(|t| t.mime_type().to_string()))
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                attachments.push(Upload {
                    filename,
                    mimetype,
                    bytes,
                });
            }
            _ => {
                read_bytes(&mut field).await?;
            }
        }
    }

    let title = title.ok_or_else(|| AppError::Validation("Missing field: title".to_string()))?;
    let owner = owner.ok_or_else(|| AppError::Validation("Missing field: owner".to_string()))?;
    let unlock_date =
        unlock_date.ok_or_else(|| AppError::Validation("Missing field: unlockDate".to_string()))?;

    let capsule = service
        .create(&title, &owner, &unlock_date, &message, attachments)
        .await?;
    Ok(HttpResponse::Ok().json(capsule))
}

/// JSON create, no file uploads.
pub async fn create_capsule_json(
    service: web::Data<CapsuleService>,
    payload: web::Json<CapsuleCreate>,
) -> Result<HttpResponse, actix_web::Error> {
    validate_payload(&*payload)?;

    let capsule = service
        .create(
            &payload.title,
            &payload.owner,
            &payload.unlock_date,
            &payload.message,
            Vec::new(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(capsule))
}

pub async fn get_capsule_detail(
    service: web::Data<CapsuleService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, actix_web::Error> {
    let detail = service.detail(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

pub async fn manual_unlock(
    service: web::Data<CapsuleService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, actix_web::Error> {
    let id = path.into_inner();
    service.manual_unlock(id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Capsule {} unlocked", id),
    })))
}
