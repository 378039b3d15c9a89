//! Writing manifests to disk
//!
//! Files are written atomically (temp file + rename) so a failed run never
//! leaves a half-written manifest behind.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::Manifest;

/// Writes manifests into a directory, one file per scope
pub struct ManifestWriter {
    dir: PathBuf,
    prefix: String,
}

impl ManifestWriter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path a manifest will be written to
    pub fn path_for(&self, manifest: &Manifest) -> PathBuf {
        self.dir.join(manifest.scope.file_name(&self.prefix))
    }

    /// Writes one manifest, returning its path
    pub fn write(&self, manifest: &Manifest) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create output directory: {}", self.dir.display())
        })?;

        let path = self.path_for(manifest);
        write_atomic(&path, &manifest.text)?;
        Ok(path)
    }

    /// Writes every manifest, returning their paths in order
    pub fn write_all(&self, manifests: &[Manifest]) -> Result<Vec<PathBuf>> {
        manifests.iter().map(|m| self.write(m)).collect()
    }
}

/// Writes content to a temp file beside `path`, then renames it into place
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let temp_path = path.with_extension("xml.tmp");

    fs::write(&temp_path, content)
        .with_context(|| format!("Failed to write temp file: {}", temp_path.display()))?;

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ManifestScope;
    use tempfile::TempDir;

    fn manifest(scope: ManifestScope, text: &str) -> Manifest {
        Manifest {
            scope,
            member_count: 0,
            test_names: vec![],
            text: text.to_string(),
            warnings: vec![],
        }
    }

    #[test]
    fn writes_named_files() {
        let dir = TempDir::new().unwrap();
        let writer = ManifestWriter::new(dir.path().join("out"), "package");

        let paths = writer
            .write_all(&[
                manifest(ManifestScope::All, "all\n"),
                manifest(ManifestScope::Stage(0), "first\n"),
            ])
            .unwrap();

        assert_eq!(paths[0], dir.path().join("out/package-all.xml"));
        assert_eq!(paths[1], dir.path().join("out/package-group-1.xml"));
        assert_eq!(fs::read_to_string(&paths[1]).unwrap(), "first\n");
    }

    #[test]
    fn overwrites_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let writer = ManifestWriter::new(dir.path(), "pkg");

        writer.write(&manifest(ManifestScope::Unassigned, "old")).unwrap();
        let path = writer.write(&manifest(ManifestScope::Unassigned, "new")).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
