//! Writing artifacts to the output directory.
//!
//! Every artifact path is validated to stay inside the output directory.
//! The files of one chunk are written to temporary names first and renamed
//! once all of them are on disk, so a failed chunk never leaves a partial
//! file behind.

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use tracing::warn;

use crate::{Error, Result};

/// Normalize the output directory to an absolute, cleaned path.
pub fn normalize_dir(dir: &Path, root: &Path) -> PathBuf {
    let cleaned = dir.clean();
    if cleaned.is_absolute() {
        cleaned
    } else {
        root.join(cleaned).clean()
    }
}

/// Resolve `filename` under `base_dir`, rejecting anything that escapes it.
pub fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    if filename.contains('\0') {
        return Err(Error::InvalidOutputPath("filename contains null byte".to_string()));
    }

    #[cfg(target_os = "windows")]
    {
        let upper = filename.to_uppercase();
        let device_names = [
            "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
            "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
        ];
        for device in &device_names {
            if upper == *device || upper.starts_with(&format!("{device}.")) {
                return Err(Error::InvalidOutputPath(format!(
                    "filename is a reserved device name: {filename}"
                )));
            }
        }
    }

    let full_path = base_dir.join(Path::new(filename).clean()).clean();
    if !full_path.starts_with(base_dir) || full_path == base_dir {
        return Err(Error::InvalidOutputPath(format!(
            "'{}' escapes output directory '{}' (resolved to '{}')",
            filename,
            base_dir.display(),
            full_path.display()
        )));
    }

    Ok(full_path)
}

/// Write all `(path, bytes)` pairs or none of them.
pub fn write_files_atomic(operations: &[(PathBuf, Vec<u8>)]) -> std::io::Result<()> {
    let mut temp_files: Vec<(PathBuf, &Path)> = Vec::with_capacity(operations.len());

    for (target_path, content) in operations {
        let staged = (|| {
            if let Some(parent) = target_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let temp_path = temp_path_for(target_path);
            fs::write(&temp_path, content)?;
            Ok::<_, std::io::Error>(temp_path)
        })();
        match staged {
            Ok(temp_path) => temp_files.push((temp_path, target_path)),
            Err(e) => {
                cleanup_temp_files(&temp_files);
                return Err(e);
            }
        }
    }

    for (temp_path, target_path) in &temp_files {
        if let Err(e) = fs::rename(temp_path, target_path) {
            cleanup_temp_files(&temp_files);
            return Err(e);
        }
    }

    Ok(())
}

/// Remove the output directory, refusing to delete `root` or any parent of it.
pub fn clean_output_dir(dir: &Path, root: &Path) -> Result<()> {
    if root.starts_with(dir) {
        return Err(Error::InvalidOutputPath(format!(
            "refusing to clean '{}': it contains the project root",
            dir.display()
        )));
    }
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tote-tmp");
    target.with_file_name(name)
}

fn cleanup_temp_files(temp_files: &[(PathBuf, &Path)]) {
    for (temp_path, _) in temp_files {
        if temp_path.exists()
            && let Err(e) = fs::remove_file(temp_path)
        {
            warn!(path = %temp_path.display(), error = %e, "failed to remove temporary file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn validate_output_path_normal() {
        let base = Path::new("/tmp/output");
        assert_eq!(
            validate_output_path(base, "index.js").unwrap(),
            Path::new("/tmp/output/index.js")
        );
        assert_eq!(
            validate_output_path(base, "./js/bundle.js").unwrap(),
            Path::new("/tmp/output/js/bundle.js")
        );
    }

    #[test]
    fn validate_output_path_traversal() {
        let base = Path::new("/tmp/output");
        assert!(matches!(
            validate_output_path(base, "../etc/passwd"),
            Err(Error::InvalidOutputPath(_))
        ));
        assert!(validate_output_path(base, "safe/../../../../../../etc/passwd").is_err());
        assert!(validate_output_path(base, "file\0name.js").is_err());
        assert!(validate_output_path(base, ".").is_err());
    }

    #[test]
    fn atomic_write_creates_parents_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.js");
        let b = dir.path().join("nested/b.css");
        write_files_atomic(&[(a.clone(), b"a".to_vec()), (b.clone(), b"b".to_vec())]).unwrap();

        assert_eq!(fs::read(&a).unwrap(), b"a");
        assert_eq!(fs::read(&b).unwrap(), b"b");
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tote-tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn clean_refuses_project_root() {
        let dir = TempDir::new().unwrap();
        assert!(clean_output_dir(dir.path(), dir.path()).is_err());

        let out = dir.path().join("dist");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("old.js"), "old").unwrap();
        clean_output_dir(&out, dir.path()).unwrap();
        assert!(!out.exists());
        clean_output_dir(&out, dir.path()).unwrap();
    }
}
