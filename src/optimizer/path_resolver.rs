//! # Path Resolution Module
//!
//! Mirroring logic shared by the batch and update modes: a file at
//! `input/A/B/f.ext` has its artifacts in `output/A/B/`.

use crate::error::{PipelineError, Result};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Computes mirrored output locations
pub struct PathResolver;

impl PathResolver {
    /// Output directory for a file living in `relative_dir` under the input root
    pub fn mirror_dir(output_root: &Path, relative_dir: &Path) -> PathBuf {
        output_root.join(relative_dir)
    }

    /// Path of `path` relative to `root`.
    ///
    /// Works for files that no longer exist: both sides are made absolute and
    /// normalised lexically first. Only if that fails are symlinks resolved,
    /// using the root and the file's parent directory.
    pub async fn relative_to_root(path: &Path, root: &Path) -> Result<PathBuf> {
        let outside = || PipelineError::OutsideInputRoot {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        };

        let absolute_path = Self::absolute(path)?;
        let absolute_root = Self::absolute(root)?;

        let relative = match absolute_path.strip_prefix(&absolute_root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => Self::relative_through_symlinks(&absolute_path, &absolute_root)
                .await
                .ok_or_else(outside)?,
        };

        if relative.as_os_str().is_empty() {
            return Err(outside());
        }

        debug!("Resolved {} relative to {}: {}", path.display(), root.display(), relative.display());
        Ok(relative)
    }

    async fn relative_through_symlinks(path: &Path, root: &Path) -> Option<PathBuf> {
        let root = tokio::fs::canonicalize(root).await.ok()?;
        let parent = tokio::fs::canonicalize(path.parent()?).await.ok()?;
        let file = parent.join(path.file_name()?);
        file.strip_prefix(&root).ok().map(Path::to_path_buf)
    }

    /// Absolute, lexically normalised form of `path` (`.` and `..` removed)
    pub fn absolute(path: &Path) -> Result<PathBuf> {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            let cwd = std::env::current_dir().map_err(|e| PipelineError::io(path, e))?;
            cwd.join(path)
        };
        Ok(Self::normalize(&joined))
    }

    fn normalize(path: &Path) -> PathBuf {
        let mut normalized = PathBuf::new();
        for component in path.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    normalized.pop();
                }
                other => normalized.push(other.as_os_str()),
            }
        }
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_dir() {
        assert_eq!(
            PathResolver::mirror_dir(Path::new("public"), Path::new("a/b")),
            PathBuf::from("public/a/b")
        );
        assert_eq!(
            PathResolver::mirror_dir(Path::new("public"), Path::new("")),
            PathBuf::from("public")
        );
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            PathResolver::normalize(Path::new("/src/./img/../img/a.png")),
            PathBuf::from("/src/img/a.png")
        );
    }

    #[tokio::test]
    async fn test_relative_for_missing_file() {
        let relative = PathResolver::relative_to_root(
            Path::new("/does/not/exist/src/sub/photo.jpg"),
            Path::new("/does/not/exist/src/"),
        )
        .await
        .unwrap();
        assert_eq!(relative, PathBuf::from("sub/photo.jpg"));
    }

    #[tokio::test]
    async fn test_relative_with_relative_paths() {
        let relative = PathResolver::relative_to_root(Path::new("src/./a/../b/x.png"), Path::new("src"))
            .await
            .unwrap();
        assert_eq!(relative, PathBuf::from("b/x.png"));
    }

    #[tokio::test]
    async fn test_outside_root_is_rejected() {
        let err = PathResolver::relative_to_root(Path::new("/elsewhere/x.png"), Path::new("/src"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::OutsideInputRoot { .. }));

        let err = PathResolver::relative_to_root(Path::new("/src"), Path::new("/src"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::OutsideInputRoot { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_root() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let real = temp_dir.path().join("real");
        std::fs::create_dir_all(real.join("sub")).unwrap();
        let link = temp_dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        // Changed path reported through the real directory, root configured via the link
        let relative = PathResolver::relative_to_root(&real.join("sub/gone.png"), &link)
            .await
            .unwrap();
        assert_eq!(relative, PathBuf::from("sub/gone.png"));
    }
}
