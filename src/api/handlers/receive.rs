use crate::AppState;
use crate::services::receiver::{FilePart, UploadRequest};
use crate::services::spool::SpooledFile;
use axum::{
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use std::path::Path;
use tokio_util::io::StreamReader;
use tracing::warn;
use utoipa::ToSchema;

/// Multipart form accepted by `POST /receive_backup`
#[derive(ToSchema)]
pub struct ReceiveBackupForm {
    /// Backup archive bytes; the part must carry a filename
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// Name to store the backup under
    pub filename: String,
    /// Shared upload password
    pub password: String,
    /// SHA-256 of the file as 64 hex characters
    pub sha256: String,
}

#[utoipa::path(
    post,
    path = "/receive_backup",
    request_body(content = ReceiveBackupForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "`done`, or `error: <reason>` when the upload was refused", body = String),
        (status = 405, description = "Method not allowed")
    ),
    tag = "backup"
)]
pub async fn receive_backup(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let request = match multipart {
        Ok(multipart) => {
            let spool_dir = state.receiver.spool_dir().await;
            read_upload(multipart, &spool_dir).await
        }
        Err(rejection) => {
            warn!("Request body is not multipart: {}", rejection);
            UploadRequest::default()
        }
    };

    match state.receiver.receive(request).await {
        Ok(_) => (StatusCode::OK, "done").into_response(),
        Err(e) => e.into_response(),
    }
}

/// Collects the upload fields. The file part is streamed to disk under
/// `spool_dir` as it arrives. The first real file part and the first
/// occurrence of each text field win; unknown fields are skipped.
async fn read_upload(mut multipart: Multipart, spool_dir: &Path) -> UploadRequest {
    let mut request = UploadRequest::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart body: {}", e);
                break;
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" if !matches!(request.file, FilePart::Content(_)) => {
                if field.file_name().is_none() {
                    request.file = FilePart::NotAFile;
                    continue;
                }
                let reader = StreamReader::new(Box::pin(field.map_err(std::io::Error::other)));
                match SpooledFile::from_reader(spool_dir, reader).await {
                    Ok(spooled) => request.file = FilePart::Content(spooled),
                    Err(e) => {
                        warn!("Failed to read file part: {}", e);
                        request.file = FilePart::NotAFile;
                        break;
                    }
                }
            }
            "filename" if request.filename.is_none() => {
                request.filename = field.text().await.ok();
            }
            "password" if request.password.is_none() => {
                request.password = field.text().await.ok();
            }
            "sha256" if request.sha256.is_none() => {
                request.sha256 = field.text().await.ok();
            }
            _ => {}
        }
    }

    request
}
