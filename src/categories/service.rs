use tracing::{info, warn};

use crate::{
    categories::{
        dto::{CategoryForm, CategoryResponse, ImageUpload},
        repo::Category,
    },
    error::ApiError,
    state::AppState,
};

/// Multipart field name uploads arrive under; also the filename prefix.
pub(crate) const IMAGE_FIELD: &str = "image";

fn project(state: &AppState, row: Category) -> CategoryResponse {
    CategoryResponse {
        id: row.id,
        name: row.name,
        item_count: row.item_count,
        image: row.image.map(|f| state.storage.resolve(&f)),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

async fn store_image(state: &AppState, upload: ImageUpload) -> Result<String, ApiError> {
    state
        .storage
        .store(
            IMAGE_FIELD,
            &upload.original_name,
            &upload.content_type,
            upload.body,
        )
        .await
}

/// All categories, most recently created first.
pub async fn list(state: &AppState) -> Result<Vec<CategoryResponse>, ApiError> {
    let rows = Category::list(&state.db).await?;
    Ok(rows.into_iter().map(|row| project(state, row)).collect())
}

pub async fn create(state: &AppState, form: CategoryForm) -> Result<CategoryResponse, ApiError> {
    let name = form.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    let item_count = form.item_count.unwrap_or(0);
    if item_count < 0 {
        return Err(ApiError::validation("item_count must not be negative"));
    }

    if Category::find_by_name(&state.db, name).await?.is_some() {
        warn!(%name, "category name already exists");
        return Err(ApiError::conflict("category name already exists"));
    }

    // The asset write happens first so a rejected upload never leaves a row
    // behind.
    let filename = match form.image {
        Some(upload) => Some(store_image(state, upload).await?),
        None => None,
    };

    let row = Category::create(&state.db, name, item_count, filename.as_deref())
        .await
        // Two concurrent creates with the same name: the loser surfaces here.
        .map_err(|e| ApiError::conflict_on_unique(e, "category name already exists"))?;

    info!(category_id = row.id, "category created");
    Ok(project(state, row))
}

/// Partial update: unspecified fields keep their prior values. A replaced
/// image leaves the old file on disk; only category deletion cleans up.
pub async fn update(
    state: &AppState,
    id: i64,
    form: CategoryForm,
) -> Result<CategoryResponse, ApiError> {
    let Some(existing) = Category::find_by_id(&state.db, id).await? else {
        return Err(ApiError::not_found("category not found"));
    };

    let name = match form.name.as_deref().map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => existing.name.clone(),
    };
    let item_count = form.item_count.unwrap_or(existing.item_count);
    if item_count < 0 {
        return Err(ApiError::validation("item_count must not be negative"));
    }
    let image = match form.image {
        Some(upload) => Some(store_image(state, upload).await?),
        None => existing.image.clone(),
    };

    let row = Category::update(&state.db, id, &name, item_count, image.as_deref())
        .await
        .map_err(|e| ApiError::conflict_on_unique(e, "category name already exists"))?;

    info!(category_id = id, "category updated");
    Ok(project(state, row))
}

pub async fn delete(state: &AppState, id: i64) -> Result<(), ApiError> {
    let Some(existing) = Category::find_by_id(&state.db, id).await? else {
        return Err(ApiError::not_found("category not found"));
    };

    // Best effort: a file already missing from disk must not block the row
    // deletion.
    if let Some(filename) = &existing.image {
        if let Err(e) = state.storage.delete(filename).await {
            warn!(error = %e, %filename, "failed to remove category image");
        }
    }

    Category::delete(&state.db, id).await?;
    info!(category_id = id, "category deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn form(name: &str) -> CategoryForm {
        CategoryForm {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn png_upload() -> ImageUpload {
        ImageUpload {
            original_name: "cover.png".into(),
            content_type: "image/png".into(),
            body: Bytes::from_static(b"png-bytes"),
        }
    }

    fn stored_filename(resolved: &str) -> &str {
        resolved.strip_prefix("/uploads/").expect("resolved path")
    }

    #[tokio::test]
    async fn create_and_list_most_recent_first() {
        let (state, _) = AppState::fake().await;

        create(&state, form("Winter")).await.expect("create winter");
        create(&state, form("Summer Clothes"))
            .await
            .expect("create summer");

        let listed = list(&state).await.expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "Summer Clothes");
        assert_eq!(listed[1].name, "Winter");
        assert_eq!(listed[0].item_count, 0);
        assert!(listed[0].image.is_none());
    }

    #[tokio::test]
    async fn duplicate_name_conflicts() {
        let (state, _) = AppState::fake().await;
        create(&state, form("Summer Clothes")).await.expect("first");
        let err = create(&state, form("Summer Clothes")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn create_requires_a_name() {
        let (state, _) = AppState::fake().await;
        let err = create(&state, CategoryForm::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = create(&state, form("   ")).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn create_rejects_negative_item_count() {
        let (state, _) = AppState::fake().await;
        let err = create(
            &state,
            CategoryForm {
                name: Some("Shoes".into()),
                item_count: Some(-3),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn create_with_image_stores_and_resolves() {
        let (state, storage) = AppState::fake().await;

        let created = create(
            &state,
            CategoryForm {
                name: Some("Shoes".into()),
                item_count: Some(12),
                image: Some(png_upload()),
            },
        )
        .await
        .expect("create");

        let resolved = created.image.as_deref().expect("image path");
        assert!(storage.contains(stored_filename(resolved)));
        assert_eq!(created.item_count, 12);
    }

    #[tokio::test]
    async fn non_image_upload_leaves_no_row() {
        let (state, storage) = AppState::fake().await;

        let err = create(
            &state,
            CategoryForm {
                name: Some("Shoes".into()),
                item_count: None,
                image: Some(ImageUpload {
                    original_name: "malware.exe".into(),
                    content_type: "application/octet-stream".into(),
                    body: Bytes::from_static(b"MZ"),
                }),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(storage.file_count(), 0);
        assert!(list(&state).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn partial_update_keeps_unspecified_fields() {
        let (state, _) = AppState::fake().await;
        let created = create(
            &state,
            CategoryForm {
                name: Some("Shoes".into()),
                item_count: Some(3),
                image: Some(png_upload()),
            },
        )
        .await
        .expect("create");

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let updated = update(
            &state,
            created.id,
            CategoryForm {
                name: None,
                item_count: Some(7),
                image: None,
            },
        )
        .await
        .expect("update");

        assert_eq!(updated.name, "Shoes");
        assert_eq!(updated.item_count, 7);
        assert_eq!(updated.image, created.image);
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn replacing_the_image_keeps_the_old_file() {
        let (state, storage) = AppState::fake().await;
        let created = create(
            &state,
            CategoryForm {
                name: Some("Shoes".into()),
                item_count: None,
                image: Some(png_upload()),
            },
        )
        .await
        .expect("create");
        let old = stored_filename(created.image.as_deref().expect("image")).to_string();

        let updated = update(
            &state,
            created.id,
            CategoryForm {
                name: None,
                item_count: None,
                image: Some(ImageUpload {
                    original_name: "new-cover.jpg".into(),
                    content_type: "image/jpeg".into(),
                    body: Bytes::from_static(b"jpg-bytes"),
                }),
            },
        )
        .await
        .expect("update");

        assert_ne!(updated.image, created.image);
        // The replaced file is not cleaned up here.
        assert!(storage.contains(&old));
        assert_eq!(storage.file_count(), 2);
    }

    #[tokio::test]
    async fn update_of_missing_category_is_not_found() {
        let (state, _) = AppState::fake().await;
        let err = update(&state, 404, form("Anything")).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn rename_onto_existing_name_conflicts() {
        let (state, _) = AppState::fake().await;
        create(&state, form("Winter")).await.expect("winter");
        let summer = create(&state, form("Summer Clothes")).await.expect("summer");

        let err = update(&state, summer.id, form("Winter")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn delete_removes_row_and_backing_file() {
        let (state, storage) = AppState::fake().await;
        let created = create(
            &state,
            CategoryForm {
                name: Some("Shoes".into()),
                item_count: None,
                image: Some(png_upload()),
            },
        )
        .await
        .expect("create");
        let filename = stored_filename(created.image.as_deref().expect("image")).to_string();

        delete(&state, created.id).await.expect("delete");

        assert!(!storage.contains(&filename));
        let err = update(&state, created.id, form("Shoes")).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_tolerates_an_already_missing_file() {
        let (state, storage) = AppState::fake().await;
        let created = create(
            &state,
            CategoryForm {
                name: Some("Shoes".into()),
                item_count: None,
                image: Some(png_upload()),
            },
        )
        .await
        .expect("create");
        let filename = stored_filename(created.image.as_deref().expect("image")).to_string();

        // The file disappears out from under us.
        storage.remove(&filename).await;

        delete(&state, created.id).await.expect("delete still works");
        assert!(list(&state).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn delete_of_missing_category_is_not_found() {
        let (state, _) = AppState::fake().await;
        let err = delete(&state, 404).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
