use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "cadence";

/// Resolve `path` to an absolute, symlink-free string suitable for identifying
/// the same file across processes.
///
/// Paths that do not exist yet cannot be canonicalized directly; for those the
/// parent directory is canonicalized and the file name re-attached, and if
/// that fails too the lexically absolute path is returned.
pub fn canonical_path_string(path: &Path) -> String {
    canonical_path(path).to_string_lossy().to_string()
}

pub fn canonical_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }

    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    if let (Some(parent), Some(name)) = (absolute.parent(), absolute.file_name()) {
        if let Ok(parent) = std::fs::canonicalize(parent) {
            return parent.join(name);
        }
    }

    log::debug!(
        "Could not canonicalize '{}', using '{}'",
        path.display(),
        absolute.display()
    );
    absolute
}

/// Per-user configuration directory, e.g. `~/.config/cadence`.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        })
        .join(APP_DIR_NAME)
}

/// Directory holding bundled resources such as translation catalogs.
///
/// `CADENCE_RESOURCE_DIR` overrides the platform data directory.
pub fn resource_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("CADENCE_RESOURCE_DIR").filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_path_of_existing_file_is_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("song.scd");
        std::fs::write(&file, "").unwrap();

        let canonical = canonical_path(&file);
        assert!(canonical.is_absolute());
        assert_eq!(canonical, std::fs::canonicalize(&file).unwrap());
    }

    #[test]
    fn canonical_path_removes_dot_segments() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.scd"), "").unwrap();

        let indirect = dir.path().join("sub").join("..").join("a.scd");
        assert_eq!(
            canonical_path(&indirect),
            std::fs::canonicalize(dir.path().join("a.scd")).unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn canonical_path_resolves_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("real.scd");
        std::fs::write(&target, "").unwrap();
        let link = dir.path().join("link.scd");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert_eq!(
            canonical_path(&link),
            std::fs::canonicalize(&target).unwrap()
        );
    }

    #[test]
    fn missing_file_keeps_canonical_parent() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-yet.scd");

        let canonical = canonical_path(&missing);
        assert_eq!(
            canonical,
            std::fs::canonicalize(dir.path()).unwrap().join("not-yet.scd")
        );
    }

    #[test]
    fn missing_directory_falls_back_to_absolute() {
        let canonical = canonical_path(Path::new("no/such/dir/file.scd"));
        assert!(canonical.is_absolute());
        assert!(canonical.ends_with("no/such/dir/file.scd"));
    }

    #[test]
    fn config_dir_is_namespaced() {
        assert!(config_dir().ends_with(APP_DIR_NAME));
    }
}
