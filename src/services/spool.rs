use std::io;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::{AsyncBufRead, AsyncWriteExt};
use tracing::warn;

/// An incoming file part written to a hidden temporary file.
///
/// The temporary file is removed when this is dropped without being
/// persisted, so rejected uploads leave nothing behind.
#[derive(Debug)]
pub struct SpooledFile {
    temp: NamedTempFile,
    size: u64,
}

impl SpooledFile {
    /// Streams `reader` into a new temporary file inside `dir`, one buffered
    /// chunk at a time.
    pub async fn from_reader<R: AsyncBufRead + Unpin>(
        dir: &Path,
        mut reader: R,
    ) -> io::Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix(".incoming-")
            .tempfile_in(dir)?;

        let mut file = tokio::fs::File::from_std(temp.reopen()?);
        let size = tokio::io::copy_buf(&mut reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        Ok(Self { temp, size })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Moves the spooled bytes to `dest`, replacing whatever is there.
    ///
    /// Renames when `dest` is on the same filesystem and copies otherwise.
    pub async fn persist(self, dest: &Path) -> io::Result<u64> {
        let size = self.size;
        match self.temp.persist(dest) {
            Ok(_) => Ok(size),
            Err(tempfile::PersistError { error, file }) => {
                warn!(
                    "Rename into {} failed ({}), copying instead",
                    dest.display(),
                    error
                );
                tokio::fs::copy(file.path(), dest).await?;
                Ok(size)
            }
        }
    }
}
