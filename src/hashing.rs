use std::{
    fs::File,
    io::{ErrorKind, Read},
    path::Path,
};

use log::error;
use sha2::{Digest, Sha256};

/// Digest recorded when the file does not exist.
pub const HASH_NOT_AVAILABLE: &str = "n/a";
/// Digest recorded when the file exists but could not be read.
pub const HASH_ERROR: &str = "hash_error";

const CHUNK_SIZE: usize = 4096;

/// SHA-256 of the file's full content as lowercase hex.
///
/// Never fails: a missing file yields [`HASH_NOT_AVAILABLE`] and any other
/// read failure is logged and yields [`HASH_ERROR`].
pub fn file_digest(path: &Path) -> String {
    if !path.exists() {
        return HASH_NOT_AVAILABLE.to_string();
    }

    match stream_digest(path) {
        Ok(digest) => digest,
        // Removed between the existence check and the open.
        Err(err) if err.kind() == ErrorKind::NotFound => HASH_NOT_AVAILABLE.to_string(),
        Err(err) => {
            error!("hash calculation failed for {}: {err}", path.display());
            HASH_ERROR.to_string()
        }
    }
}

/// [`file_digest`] on the blocking pool.
pub async fn file_digest_async(path: &Path) -> String {
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || file_digest(&owned)).await {
        Ok(digest) => digest,
        Err(err) => {
            error!("hash worker join failed for {}: {err}", path.display());
            HASH_ERROR.to_string()
        }
    }
}

fn stream_digest(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn digest_matches_known_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(
            file_digest(&path),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn digest_spans_multiple_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.log");
        let mut file = File::create(&path).unwrap();
        let payload = vec![b'x'; CHUNK_SIZE * 3 + 17];
        file.write_all(&payload).unwrap();
        drop(file);

        let expected = format!("{:x}", Sha256::digest(&payload));
        assert_eq!(file_digest(&path), expected);
    }

    #[test]
    fn missing_file_is_not_available() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(file_digest(&dir.path().join("gone.log")), HASH_NOT_AVAILABLE);
    }

    #[test]
    fn unreadable_path_is_hash_error() {
        // A directory exists but cannot be read as a byte stream.
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(file_digest(dir.path()), HASH_ERROR);
    }

    #[tokio::test]
    async fn deleted_before_async_hash_is_not_available() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.log");
        std::fs::write(&path, b"data").unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(file_digest_async(&path).await, HASH_NOT_AVAILABLE);
    }
}
