//! Deny-list enforcement for download targets and upload sources.

use std::path::{Component, Path, PathBuf};

use crate::error::AnyloadError;

/// Fail with [`AnyloadError::PermissionDenied`] if `path` is, or is nested
/// under, any entry of `deny_list`.
///
/// Both the lexical absolute form and the symlink-resolved form of `path`
/// are checked. Paths that do not exist yet are resolved through their
/// nearest existing ancestor. No file is created or opened.
pub fn ensure_allowed(path: &Path, deny_list: &[PathBuf]) -> Result<(), AnyloadError> {
    if deny_list.is_empty() {
        return Ok(());
    }

    let lexical = absolute_lexical(path)?;
    let resolved = resolve_existing_prefix(&lexical);

    for blocked in deny_list {
        let blocked_lexical = absolute_lexical(blocked)?;
        let blocked_resolved = blocked_lexical
            .canonicalize()
            .unwrap_or_else(|_| blocked_lexical.clone());

        for candidate in [&lexical, &resolved] {
            if candidate.starts_with(&blocked_lexical) || candidate.starts_with(&blocked_resolved) {
                return Err(AnyloadError::PermissionDenied {
                    path: lexical.clone(),
                    blocked: blocked.clone(),
                });
            }
        }
    }

    Ok(())
}

/// Absolute form of `path` with `.` and `..` collapsed, without touching the
/// filesystem beyond reading the current directory.
pub fn absolute_lexical(path: &Path) -> Result<PathBuf, AnyloadError> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let mut tail = Vec::new();
    let mut current = Some(path);

    while let Some(candidate) = current {
        if let Ok(canonical) = candidate.canonicalize() {
            let mut resolved = canonical;
            for segment in tail.iter().rev() {
                resolved.push(segment);
            }
            return resolved;
        }
        if let Some(name) = candidate.file_name() {
            tail.push(name.to_os_string());
        }
        current = candidate.parent();
    }

    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_equal_and_nested_paths() {
        let deny = vec![PathBuf::from("/etc")];
        assert!(ensure_allowed(Path::new("/etc"), &deny).is_err());
        assert!(ensure_allowed(Path::new("/etc/anyload/x"), &deny).is_err());
        assert!(ensure_allowed(Path::new("/tmp/../etc/passwd"), &deny).is_err());
    }

    #[test]
    fn sibling_with_shared_prefix_is_allowed() {
        let deny = vec![PathBuf::from("/etc")];
        assert!(ensure_allowed(Path::new("/etcetera/file"), &deny).is_ok());
    }

    #[test]
    fn symlink_into_blocked_dir_is_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let blocked = tmp.path().join("secrets");
        std::fs::create_dir(&blocked).expect("mkdir");
        let link = tmp.path().join("innocent");
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(&blocked, &link).expect("symlink");
            let deny = vec![blocked.clone()];
            let err = ensure_allowed(&link.join("new-file.json"), &deny).expect_err("blocked");
            assert!(matches!(err, AnyloadError::PermissionDenied { .. }));
        }
    }

    #[test]
    fn empty_deny_list_allows_everything() {
        assert!(ensure_allowed(Path::new("/etc/passwd"), &[]).is_ok());
    }

    #[test]
    fn lexical_normalisation_collapses_dots() {
        let normalized = absolute_lexical(Path::new("/a/./b/../c")).expect("normalize");
        assert_eq!(normalized, PathBuf::from("/a/c"));
    }
}
