use std::path::{Component, Path, PathBuf};

/// Joins a stored file name onto its destination directory.
///
/// The name may contain sub-directories, but absolute paths and `..`
/// components are rejected so a file can never land outside `dest`.
pub fn join_destination(dest: &str, filename: &str) -> Result<PathBuf, String> {
    if filename.is_empty() {
        return Err("Filename cannot be empty".to_string());
    }

    for component in Path::new(filename).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                tracing::warn!("Path traversal attempt detected: {}", filename);
                return Err(format!("'{}' escapes the destination directory", filename));
            }
        }
    }

    Ok(Path::new(dest).join(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name() {
        assert_eq!(
            join_destination("/tmp/uploads", "sample1.txt").unwrap(),
            PathBuf::from("/tmp/uploads/sample1.txt")
        );
    }

    #[test]
    fn test_nested_name_is_allowed() {
        assert_eq!(
            join_destination("/tmp", "avatars/me.png").unwrap(),
            PathBuf::from("/tmp/avatars/me.png")
        );
    }

    #[test]
    fn test_traversal_is_rejected() {
        assert!(join_destination("/tmp", "../etc/passwd").is_err());
        assert!(join_destination("/tmp", "a/../../b").is_err());
        assert!(join_destination("/tmp", "/etc/passwd").is_err());
        assert!(join_destination("/tmp", "").is_err());
    }
}
