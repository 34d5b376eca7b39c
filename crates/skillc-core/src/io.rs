use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Readers never observe a half-written artifact.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Write only when the bytes differ from what is on disk. Returns true if
/// the file was (re)written.
pub fn write_if_changed(path: &Path, data: &[u8]) -> Result<bool> {
    if path.is_file() && std::fs::read(path)? == data {
        return Ok(false);
    }
    atomic_write(path, data)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("AGENTS.md");
        atomic_write(&path, b"# Guide").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Guide");
    }

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("skills/a/test-cases.json");
        atomic_write(&path, b"[]").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn write_if_changed_skips_identical_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("AGENTS.md");
        assert!(write_if_changed(&path, b"v1").unwrap());
        assert!(!write_if_changed(&path, b"v1").unwrap());
        assert!(write_if_changed(&path, b"v2").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "v2");
    }
}
