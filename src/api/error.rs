use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use thiserror::Error;

/// Every way a backup upload can end short of `done`.
///
/// The `Display` text is what the client receives after `error: `.
#[derive(Error, Debug)]
pub enum ReceiveError {
    #[error("file is not in request.files")]
    FileMissing,

    #[error("file is none")]
    FileNone,

    #[error("filename is none")]
    FilenameNone,

    #[error("password is none")]
    PasswordNone,

    #[error("sha256_from_form is none")]
    ChecksumNone,

    #[error("filename validation failed")]
    InvalidFilename,

    #[error("sha256 checksum validation failed")]
    InvalidChecksum,

    #[error("password validation failed")]
    InvalidPassword,

    #[error("wrong password")]
    WrongPassword,

    #[error("upload folder {} do not exist", .0.display())]
    UploadFolderMissing(PathBuf),

    #[error("failed to store file")]
    Storage(#[source] std::io::Error),

    #[error("failed to compute sha256 checksum")]
    Checksum(#[source] std::io::Error),

    #[error("sha256 checksum do not match")]
    ChecksumMismatch,
}

impl ReceiveError {
    /// Short machine friendly tag used in log records
    pub fn reason(&self) -> &'static str {
        match self {
            ReceiveError::FileMissing => "file_missing",
            ReceiveError::FileNone => "file_none",
            ReceiveError::FilenameNone => "filename_none",
            ReceiveError::PasswordNone => "password_none",
            ReceiveError::ChecksumNone => "checksum_none",
            ReceiveError::InvalidFilename => "invalid_filename",
            ReceiveError::InvalidChecksum => "invalid_checksum",
            ReceiveError::InvalidPassword => "invalid_password",
            ReceiveError::WrongPassword => "wrong_password",
            ReceiveError::UploadFolderMissing(_) => "upload_folder_missing",
            ReceiveError::Storage(_) => "storage",
            ReceiveError::Checksum(_) => "checksum_io",
            ReceiveError::ChecksumMismatch => "checksum_mismatch",
        }
    }
}

impl IntoResponse for ReceiveError {
    fn into_response(self) -> Response {
        // Failures are reported in the body; the transport status stays 200.
        (StatusCode::OK, format!("error: {}", self)).into_response()
    }
}
