use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read size used when hashing streams and files (64 KiB)
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

pub fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Hashes everything `reader` yields, `HASH_CHUNK_SIZE` bytes at a time.
pub async fn calculate_hash_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Lowercase hex SHA-256 of the file at `path`, streamed from disk.
pub async fn sha256_of_file(path: impl AsRef<Path>) -> std::io::Result<String> {
    let file = tokio::fs::File::open(path).await?;
    calculate_hash_from_reader(file).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_calculate_hash() {
        let data = b"hello world";
        let hash = calculate_hash(data);
        // SHA-256 for "hello world"
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[tokio::test]
    async fn test_calculate_hash_from_reader() {
        let data = b"hello world";
        let hash = calculate_hash_from_reader(&data[..]).await.unwrap();
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_calculate_hash_empty() {
        assert_eq!(calculate_hash(b""), EMPTY_SHA256);
    }

    #[tokio::test]
    async fn test_sha256_of_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(sha256_of_file(file.path()).await.unwrap(), EMPTY_SHA256);
    }

    #[tokio::test]
    async fn test_sha256_of_binary_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x00, 0x01, 0x02, 0x03, 0x04, 0x05]).unwrap();
        file.flush().unwrap();

        assert_eq!(
            sha256_of_file(file.path()).await.unwrap(),
            "17e88db187afd62c16e5debf3e6527cd006bc012bc90b51a810cd80c2d511f43"
        );
    }

    #[tokio::test]
    async fn test_sha256_of_file_larger_than_chunk() {
        let data = vec![b'A'; 100_000];
        assert!(data.len() > HASH_CHUNK_SIZE);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let from_file = sha256_of_file(file.path()).await.unwrap();
        assert_eq!(
            from_file,
            "e6631225e83d23bf67657e85109ad5deb3570e1405d7aaa23a2485ae8582c143"
        );
        // independent one-shot digest over the same bytes
        assert_eq!(from_file, calculate_hash(&data));
    }

    #[tokio::test]
    async fn test_sha256_of_file_is_stable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"nightly backup").unwrap();
        file.flush().unwrap();

        let first = sha256_of_file(file.path()).await.unwrap();
        let second = sha256_of_file(file.path()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_sha256_of_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = sha256_of_file(dir.path().join("missing.tar"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
