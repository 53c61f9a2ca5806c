use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    images::services::{multipart_error, store_recipe_image, UploadItem},
    response::ApiResponse,
    state::AppState,
};

pub fn upload_routes() -> Router<AppState> {
    Router::new().route("/uploads", post(upload_image))
}

#[derive(Debug, Serialize)]
pub struct UploadedImage {
    pub path: String,
}

/// POST /api/uploads, multipart field `imagem`.
#[instrument(skip(state, who, mp), fields(user_id = who.id))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    mut mp: Multipart,
) -> AppResult<Json<ApiResponse<UploadedImage>>> {
    while let Some(field) = mp.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("imagem") {
            continue;
        }
        let item = UploadItem::from_field(field).await?;
        if item.is_empty() {
            break;
        }
        let path = store_recipe_image(state.storage.as_ref(), item).await?;
        return Ok(Json(
            ApiResponse::ok(UploadedImage { path }).with_message("Imagem carregada com sucesso"),
        ));
    }
    Err(AppError::Validation("Nenhum ficheiro enviado".into()))
}
