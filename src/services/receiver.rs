use crate::api::error::ReceiveError;
use crate::config::ReceiverConfig;
use crate::services::auth::{Authentication, PasswordAuthenticator};
use crate::services::spool::SpooledFile;
use crate::utils::hash::sha256_of_file;
use crate::utils::validation::{
    is_filename_allowed, is_password_allowed, is_sha256_allowed, sanitize_filename,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

/// The `file` part of an upload as it arrived.
#[derive(Debug, Default)]
pub enum FilePart {
    /// No part named `file` in the request
    #[default]
    Absent,
    /// A `file` part without a filename, i.e. not a file upload
    NotAFile,
    Content(SpooledFile),
}

/// One upload as extracted from the request, before any checks.
#[derive(Debug, Default)]
pub struct UploadRequest {
    pub file: FilePart,
    pub filename: Option<String>,
    pub password: Option<String>,
    pub sha256: Option<String>,
}

/// A backup that was written to the upload folder and matched its checksum
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub path: PathBuf,
    pub size: u64,
    pub sha256: String,
}

/// Runs the receive pipeline for single uploads. Holds no per-request state.
#[derive(Debug, Clone)]
pub struct BackupReceiver {
    upload_folder: PathBuf,
    authenticator: PasswordAuthenticator,
    auth_failure_delay: Duration,
}

impl BackupReceiver {
    pub fn new(config: &ReceiverConfig) -> Self {
        Self {
            upload_folder: config.upload_folder.clone(),
            authenticator: PasswordAuthenticator::new(&config.password_hash),
            auth_failure_delay: config.auth_failure_delay,
        }
    }

    pub fn upload_folder(&self) -> &Path {
        &self.upload_folder
    }

    /// Where incoming file parts are spooled before the checks run. The
    /// upload folder itself when it exists, so accepting a file is a rename.
    pub async fn spool_dir(&self) -> PathBuf {
        if is_dir(&self.upload_folder).await {
            self.upload_folder.clone()
        } else {
            std::env::temp_dir()
        }
    }

    /// Processes one upload end to end and logs its outcome.
    ///
    /// Checks run in a fixed order and the first failure ends the request.
    /// A checksum mismatch is reported only after the file has been written,
    /// and the file is left in place.
    pub async fn receive(&self, request: UploadRequest) -> Result<StoredFile, ReceiveError> {
        let result = self.process(request).await;

        match &result {
            Ok(stored) => info!(
                path = %stored.path.display(),
                size = stored.size,
                sha256 = %stored.sha256,
                "receive_backup() done"
            ),
            Err(e) => match e {
                ReceiveError::Storage(source) | ReceiveError::Checksum(source) => error!(
                    reason = e.reason(),
                    cause = %source,
                    "receive_backup() {}",
                    e
                ),
                _ => error!(reason = e.reason(), "receive_backup() {}", e),
            },
        }

        result
    }

    async fn process(&self, request: UploadRequest) -> Result<StoredFile, ReceiveError> {
        let content = match request.file {
            FilePart::Absent => return Err(ReceiveError::FileMissing),
            FilePart::NotAFile => return Err(ReceiveError::FileNone),
            FilePart::Content(content) => content,
        };
        let filename = request.filename.ok_or(ReceiveError::FilenameNone)?;
        let password = request.password.ok_or(ReceiveError::PasswordNone)?;
        let sha256_from_form = request.sha256.ok_or(ReceiveError::ChecksumNone)?;

        let filename = filename.trim();
        let password = password.trim();
        let sha256_from_form = sha256_from_form.trim();

        if !is_filename_allowed(filename) {
            return Err(ReceiveError::InvalidFilename);
        }
        if !is_sha256_allowed(sha256_from_form) {
            return Err(ReceiveError::InvalidChecksum);
        }
        if !is_password_allowed(password) {
            return Err(ReceiveError::InvalidPassword);
        }

        self.authenticate(password).await?;

        if !is_dir(&self.upload_folder).await {
            return Err(ReceiveError::UploadFolderMissing(self.upload_folder.clone()));
        }

        let safe_name = sanitize_filename(filename).map_err(|e| {
            tracing::warn!("Sanitizer rejected a validated filename: {}", e);
            ReceiveError::InvalidFilename
        })?;
        let full_path = self.upload_folder.join(safe_name);

        let size = content
            .persist(&full_path)
            .await
            .map_err(ReceiveError::Storage)?;

        let sha256_from_file = sha256_of_file(&full_path)
            .await
            .map_err(ReceiveError::Checksum)?;

        // Exact string comparison: an uppercase form value never matches.
        if sha256_from_form != sha256_from_file {
            return Err(ReceiveError::ChecksumMismatch);
        }

        Ok(StoredFile {
            path: full_path,
            size,
            sha256: sha256_from_file,
        })
    }

    /// Verifies the password, paying the full Argon2 cost every time. A
    /// rejection of either kind waits `auth_failure_delay` before returning.
    async fn authenticate(&self, password: &str) -> Result<(), ReceiveError> {
        match self.authenticator.verify_blocking(password.to_string()).await {
            Authentication::Authenticated => Ok(()),
            Authentication::Rejected => {
                tokio::time::sleep(self.auth_failure_delay).await;
                Err(ReceiveError::WrongPassword)
            }
        }
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
