use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::get,
    routing::put,
    Json, Router,
};
use tracing::instrument;

use crate::{auth::jwt::AuthUser, error::ApiError, state::AppState};

use super::dto::{CategoryForm, CategoryResponse, ImageUpload, MessageResponse};
use super::service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:id",
            put(update_category).delete(delete_category),
        )
        // Above the 5 MiB image ceiling so the store can answer with a
        // proper validation error instead of a raw 413.
        .layer(DefaultBodyLimit::max(8 * 1024 * 1024))
}

fn bad_field(e: MultipartError) -> ApiError {
    ApiError::validation(format!("malformed multipart field: {e}"))
}

async fn read_form(mut mp: Multipart) -> Result<CategoryForm, ApiError> {
    let mut form = CategoryForm::default();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("malformed multipart body: {e}")))?
    {
        match field.name().unwrap_or_default().to_string().as_str() {
            "name" => {
                form.name = Some(field.text().await.map_err(bad_field)?);
            }
            "item_count" => {
                let raw = field.text().await.map_err(bad_field)?;
                if !raw.trim().is_empty() {
                    let count = raw
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| ApiError::validation("item_count must be an integer"))?;
                    form.item_count = Some(count);
                }
            }
            service::IMAGE_FIELD => {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let body = field.bytes().await.map_err(bad_field)?;
                form.image = Some(ImageUpload {
                    original_name,
                    content_type,
                    body,
                });
            }
            // Unknown fields are ignored.
            _ => {}
        }
    }
    Ok(form)
}

#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
    AuthUser(_claims): AuthUser,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    Ok(Json(service::list(&state).await?))
}

#[instrument(skip(state, mp))]
pub async fn create_category(
    State(state): State<AppState>,
    AuthUser(_claims): AuthUser,
    mp: Multipart,
) -> Result<(StatusCode, Json<CategoryResponse>), ApiError> {
    let form = read_form(mp).await?;
    let category = service::create(&state, form).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state, mp))]
pub async fn update_category(
    State(state): State<AppState>,
    AuthUser(_claims): AuthUser,
    Path(id): Path<i64>,
    mp: Multipart,
) -> Result<Json<CategoryResponse>, ApiError> {
    let form = read_form(mp).await?;
    Ok(Json(service::update(&state, id, form).await?))
}

#[instrument(skip(state))]
pub async fn delete_category(
    State(state): State<AppState>,
    AuthUser(_claims): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    service::delete(&state, id).await?;
    Ok(Json(MessageResponse {
        message: "category deleted".into(),
    }))
}
