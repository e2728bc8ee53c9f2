use crate::api::error::AppError;
use crate::services::staging::StagedFile;
use crate::services::transform::TransformationPlan;
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use futures::TryStreamExt;
use serde::Serialize;
use tokio_util::io::StreamReader;
use utoipa::ToSchema;

const MISSING_IMAGE_MESSAGE: &str = "Please upload an image!";

/// Multipart form accepted by `POST /profile`
#[derive(ToSchema)]
pub struct AvatarUploadForm {
    /// PNG or JPEG image, at most 1 MiB
    #[schema(value_type = String, format = Binary)]
    pub avatar: String,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub message: String,
    pub public_id: String,
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[utoipa::path(
    post,
    path = "/profile",
    request_body(content = AvatarUploadForm, content_type = "multipart/form-data", description = "Avatar image upload (field `avatar`, PNG or JPEG, max 1 MiB)"),
    responses(
        (status = 200, description = "Avatar transformed", body = ProfileResponse),
        (status = 400, description = "No valid image attached"),
        (status = 413, description = "Upload exceeds the size limit"),
        (status = 502, description = "Transformation provider failed")
    ),
    tag = "profile"
)]
pub async fn upload_avatar(
    State(state): State<crate::AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProfileResponse>, AppError> {
    let mut staged: Option<StagedFile> = None;

    let result: Result<Json<ProfileResponse>, AppError> = async {
        while let Some(field) = multipart.next_field().await.map_err(|e| {
            // axum reports body-limit overruns as 413
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                AppError::PayloadTooLarge(
                    "Request body exceeds the maximum allowed limit".to_string(),
                )
            } else {
                AppError::BadRequest(e.to_string())
            }
        })? {
            if field.name() != Some("avatar") {
                continue;
            }

            let original_filename = field.file_name().unwrap_or("unnamed").to_string();
            let content_type = field.content_type().map(|s| s.to_string());

            let body_with_io_error = field.map_err(std::io::Error::other);
            let reader = StreamReader::new(body_with_io_error);

            match state
                .stager
                .stage(&original_filename, content_type.as_deref(), reader)
                .await
            {
                // A repeated `avatar` field supersedes the earlier one;
                // the superseded staged copy must not linger on disk.
                Ok(file) => {
                    if let Some(previous) = staged.replace(file) {
                        previous.discard().await;
                    }
                }
                // A gated-out file is reported exactly like a missing one;
                // the distinction only lives in the logs.
                Err(AppError::BadRequest(reason)) => {
                    tracing::info!(%reason, "avatar rejected by upload gate");
                }
                Err(e) => return Err(e),
            }
        }

        let file = staged
            .take()
            .ok_or_else(|| AppError::BadRequest(MISSING_IMAGE_MESSAGE.to_string()))?;

        let outcome = state
            .transformer
            .transform(&file.path, &TransformationPlan::avatar())
            .await;

        // The staged copy is only needed for the provider call
        file.discard().await;

        let outcome = outcome.map_err(|e| AppError::Transform(e.to_string()))?;

        Ok(Json(ProfileResponse {
            message: "Avatar transformed".to_string(),
            public_id: outcome.public_id,
            url: outcome.secure_url,
            width: outcome.width,
            height: outcome.height,
        }))
    }
    .await;

    match result {
        Ok(res) => Ok(res),
        Err(e) => {
            // Consume the remaining multipart stream to avoid a TCP reset
            // on early rejection
            tracing::warn!("Avatar upload failed early: {}. Consuming remaining stream...", e);
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            if let Some(file) = staged.take() {
                file.discard().await;
            }
            Err(e)
        }
    }
}
