use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use campus_core::{ApiResponse, AppError};
use tracing::instrument;

use super::model::{FilesUploadForm, ProfileUploadForm, UploadKind, UploadedFile, content_type_for};
use super::service::{IncomingFile, UploadService};
use crate::middleware::auth::{AuthUser, MaybeAuthUser};
use crate::middleware::role::RequireStaff;
use crate::modules::users::service::UserService;
use crate::state::AppState;

/// Reads every part named after the kind's field, stopping a part as soon
/// as it grows past the size limit.
async fn read_files(
    mut multipart: Multipart,
    kind: UploadKind,
) -> Result<Vec<IncomingFile>, AppError> {
    let mut files = Vec::new();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(kind.field()) {
            continue;
        }
        if files.len() == kind.max_files() {
            return Err(AppError::bad_request(format!(
                "At most {} files may be uploaded at once",
                kind.max_files()
            )));
        }

        let name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::bad_request(format!("Failed to read upload: {e}")))?
        {
            if bytes.len() + chunk.len() > kind.max_bytes() {
                return Err(AppError::bad_request(format!(
                    "File exceeds maximum size of {} bytes",
                    kind.max_bytes()
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        files.push(IncomingFile {
            name,
            content_type,
            bytes,
        });
    }

    Ok(files)
}

/// Upload a profile photo
#[utoipa::path(
    post,
    path = "/api/uploads/profile",
    request_body(content = ProfileUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Photo stored and set on the caller", body = ApiResponse<UploadedFile>),
        (status = 400, description = "Missing file, wrong type or too large"),
    ),
    security(("bearer_auth" = [])),
    tag = "Uploads"
)]
#[instrument(skip(state, auth_user, multipart), fields(user.id = %auth_user.user_id))]
pub async fn upload_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<UploadedFile>>), AppError> {
    let files = read_files(multipart, UploadKind::Profile).await?;
    let mut stored =
        UploadService::store(state.storage.as_ref(), UploadKind::Profile, files).await?;
    let Some(photo) = stored.pop() else {
        return Err(AppError::bad_request("No file provided in field 'file'"));
    };

    let key = format!("{}/{}", UploadKind::Profile.dir(), photo.file_name);
    UserService::set_profile_photo(&state.db, auth_user.user_id, &key).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(photo, "Profile photo updated")),
    ))
}

/// Upload course material files
#[utoipa::path(
    post,
    path = "/api/uploads/materials",
    request_body(content = FilesUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Files stored", body = ApiResponse<Vec<UploadedFile>>),
        (status = 400, description = "Missing files, wrong type or too large"),
        (status = 403, description = "Staff only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Uploads"
)]
#[instrument(skip(state, _staff, multipart))]
pub async fn upload_materials(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<Vec<UploadedFile>>>), AppError> {
    let files = read_files(multipart, UploadKind::Materials).await?;
    let stored = UploadService::store(state.storage.as_ref(), UploadKind::Materials, files).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(stored, "Files uploaded")),
    ))
}

/// Upload message attachments
#[utoipa::path(
    post,
    path = "/api/uploads/messages",
    request_body(content = FilesUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Files stored", body = ApiResponse<Vec<UploadedFile>>),
        (status = 400, description = "Missing files, wrong type or too large"),
    ),
    security(("bearer_auth" = [])),
    tag = "Uploads"
)]
#[instrument(skip(state, _auth_user, multipart))]
pub async fn upload_messages(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<Vec<UploadedFile>>>), AppError> {
    let files = read_files(multipart, UploadKind::Messages).await?;
    let stored = UploadService::store(state.storage.as_ref(), UploadKind::Messages, files).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(stored, "Files uploaded")),
    ))
}

/// Download a stored file
#[utoipa::path(
    get,
    path = "/api/uploads/{kind}/{file_name}",
    params(
        ("kind" = String, Path, description = "profile, materials or messages"),
        ("file_name" = String, Path, description = "Stored file name")
    ),
    responses(
        (status = 200, description = "File contents"),
        (status = 400, description = "Unknown kind"),
        (status = 401, description = "Authentication required for this kind"),
        (status = 404, description = "File not found"),
    ),
    tag = "Uploads"
)]
#[instrument(skip(state, auth_user))]
pub async fn get_file(
    State(state): State<AppState>,
    MaybeAuthUser(auth_user): MaybeAuthUser,
    Path((kind, file_name)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let kind: UploadKind = kind.parse()?;
    if !kind.is_public() && auth_user.is_none() {
        return Err(AppError::unauthorized("Authentication required"));
    }

    let bytes = UploadService::load(state.storage.as_ref(), kind, &file_name).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&file_name))], bytes))
}
