//! Content digests used to confirm a published archive matches its staged copy.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read buffer size, archives are never loaded whole
static CHUNK_SIZE: usize = 64 * 1024;

/// SHA-256 digest of a file's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchiveDigest([u8; 32]);

impl ArchiveDigest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Display for ArchiveDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

pub fn digest<P: AsRef<Path>>(path: P) -> Result<ArchiveDigest> {
    let path = path.as_ref();
    File::open(path)
        .map_err(Error::from)
        .and_then(digest_reader)
        .with_msg(format!("Failed to hash {:?}", path))
}

fn digest_reader<R: Read>(mut reader: R) -> Result<ArchiveDigest> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    Ok(ArchiveDigest(out))
}

pub fn verify_equal(a: &ArchiveDigest, b: &ArchiveDigest) -> bool {
    a.as_bytes() == b.as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_digest_of_known_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("abc.bin");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(
            digest(&path).unwrap().to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_is_stable_for_same_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.bin");
        std::fs::write(&path, b"hello from wuergback").unwrap();

        assert!(verify_equal(&digest(&path).unwrap(), &digest(&path).unwrap()));
    }

    #[test]
    fn test_identical_bytes_give_equal_digests() {
        let temp_dir = TempDir::new().unwrap();
        // Larger than one chunk so the streaming loop runs more than once.
        let content = (0..CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect::<Vec<_>>();
        let a = temp_dir.path().join("a.bin");
        let b = temp_dir.path().join("b.bin");
        std::fs::write(&a, &content).unwrap();
        std::fs::write(&b, &content).unwrap();

        assert!(verify_equal(&digest(&a).unwrap(), &digest(&b).unwrap()));
    }

    #[test]
    fn test_one_differing_byte_changes_digest() {
        let temp_dir = TempDir::new().unwrap();
        let mut content = vec![7u8; CHUNK_SIZE + 1];
        let a = temp_dir.path().join("a.bin");
        std::fs::write(&a, &content).unwrap();
        content[CHUNK_SIZE] = 8;
        let b = temp_dir.path().join("b.bin");
        std::fs::write(&b, &content).unwrap();

        assert!(!verify_equal(&digest(&a).unwrap(), &digest(&b).unwrap()));
    }

    #[test]
    fn test_truncated_file_changes_digest() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.bin");
        let b = temp_dir.path().join("b.bin");
        std::fs::write(&a, b"full archive content").unwrap();
        std::fs::write(&b, b"full archive").unwrap();

        assert!(!verify_equal(&digest(&a).unwrap(), &digest(&b).unwrap()));
    }

    #[test]
    fn test_digest_of_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(digest(temp_dir.path().join("missing.bin")).is_err());
    }
}
