//! Directory bundle codec.
//!
//! Serializes a directory tree into a single gzip-compressed bincode blob
//! and back. Used by the config-store and log-archive connectors, whose
//! backends are plain directories on disk.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use vigil_common::{Error, Result};

/// Gzip magic bytes, checked by the smoke test before any decode attempt.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One file inside a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleEntry {
    /// Path relative to the bundled directory root
    pub path: String,
    /// Unix permission bits
    pub mode: u32,
    /// File contents
    pub contents: Vec<u8>,
}

/// A bundled directory tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirBundle {
    pub entries: Vec<BundleEntry>,
}

/// Read a directory tree into a compressed bundle blob.
pub fn pack_dir(dir: &Path) -> Result<Vec<u8>> {
    let mut bundle = DirBundle::default();
    collect_entries(dir, dir, &mut bundle)?;
    // Stable ordering so identical trees produce identical digests.
    bundle.entries.sort_by(|a, b| a.path.cmp(&b.path));

    let serialized = bincode::serialize(&bundle)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&serialized)?;
    Ok(encoder.finish()?)
}

/// Unpack a bundle blob into `dir`, replacing any existing contents.
pub fn unpack_to(dir: &Path, data: &[u8]) -> Result<()> {
    let bundle = decode(data)?;

    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;

    for entry in &bundle.entries {
        let target = dir.join(&entry.path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, &entry.contents)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&target, std::fs::Permissions::from_mode(entry.mode))?;
        }
    }
    Ok(())
}

/// Decode a bundle blob fully.
pub fn decode(data: &[u8]) -> Result<DirBundle> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| Error::Serialization(format!("bundle decompression failed: {}", e)))?;
    Ok(bincode::deserialize(&decompressed)?)
}

/// Shallow validity check: gzip magic plus a decodable leading block.
///
/// Catches truncation and header corruption without unpacking the whole
/// bundle.
pub fn check_header(data: &[u8]) -> Result<()> {
    if data.len() < 2 || data[..2] != GZIP_MAGIC {
        return Err(Error::IntegrityFailure {
            item: "bundle".to_string(),
            reason: "missing gzip magic".to_string(),
        });
    }
    let mut decoder = GzDecoder::new(data);
    let mut head = [0u8; 4096];
    match decoder.read(&mut head) {
        Ok(_) => Ok(()),
        Err(e) => Err(Error::IntegrityFailure {
            item: "bundle".to_string(),
            reason: format!("leading block unreadable: {}", e),
        }),
    }
}

fn collect_entries(root: &Path, dir: &Path, bundle: &mut DirBundle) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_entries(root, &path, bundle)?;
        } else if file_type.is_file() {
            let relative = path
                .strip_prefix(root)
                .map_err(|e| Error::Internal(format!("path outside bundle root: {}", e)))?
                .to_string_lossy()
                .into_owned();
            let mode = {
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    entry.metadata()?.permissions().mode()
                }
                #[cfg(not(unix))]
                {
                    0o644
                }
            };
            bundle.entries.push(BundleEntry {
                path: relative,
                mode,
                contents: std::fs::read(&path)?,
            });
        }
        // Symlinks and special files are intentionally skipped.
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("app.json"), b"{\"retention\": 30}").unwrap();
        std::fs::write(dir.path().join("nested/services.json"), b"[\"ssh\",\"http\"]").unwrap();
        dir
    }

    #[test]
    fn pack_unpack_round_trip() {
        let src = fixture_dir();
        let blob = pack_dir(src.path()).unwrap();

        let dest = TempDir::new().unwrap();
        let target = dest.path().join("restored");
        unpack_to(&target, &blob).unwrap();

        assert_eq!(
            std::fs::read(target.join("app.json")).unwrap(),
            b"{\"retention\": 30}"
        );
        assert_eq!(
            std::fs::read(target.join("nested/services.json")).unwrap(),
            b"[\"ssh\",\"http\"]"
        );
    }

    #[test]
    fn unpack_replaces_existing_contents() {
        let src = fixture_dir();
        let blob = pack_dir(src.path()).unwrap();

        let dest = TempDir::new().unwrap();
        std::fs::write(dest.path().join("stale.json"), b"old").unwrap();
        unpack_to(dest.path(), &blob).unwrap();

        assert!(!dest.path().join("stale.json").exists());
        assert!(dest.path().join("app.json").exists());
    }

    #[test]
    fn header_check_rejects_truncation_and_garbage() {
        let src = fixture_dir();
        let blob = pack_dir(src.path()).unwrap();

        assert!(check_header(&blob).is_ok());
        assert!(check_header(b"not a bundle").is_err());
        assert!(check_header(&blob[..1]).is_err());
    }

    #[test]
    fn identical_trees_pack_identically() {
        let src = fixture_dir();
        let a = pack_dir(src.path()).unwrap();
        let b = pack_dir(src.path()).unwrap();
        assert_eq!(a, b);
    }
}
