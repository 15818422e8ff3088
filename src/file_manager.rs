//! # File Management Module
//!
//! Discovery of source files and small filesystem helpers.
//!
//! ## Harvesting
//! `FileManager::harvest` walks a root directory of arbitrary depth and
//! returns every regular file under it. Each directory listing runs as its
//! own task in a `JoinSet`; a finished listing spawns tasks for the
//! subdirectories it found. The harvest is complete when the set drains, so
//! directories discovered late are always waited for.
//!
//! ## Error tolerance
//! - Unreadable directory: logged, its subtree contributes nothing
//! - Entry that cannot be stat'ed: logged and skipped
//! - Missing root: logged, empty result
//!
//! Symlinks to files are followed. Symlinks to directories are not descended.
//!
//! ## Example:
//! ```rust,no_run
//! # async fn demo() {
//! use assetpress::file_manager::FileManager;
//!
//! let harvest = FileManager::harvest("src/img").await;
//! for file in &harvest.files {
//!     println!("{}", file.relative.display());
//! }
//! # }
//! ```

use crate::error::{PipelineError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// A regular file found under the input root
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DiscoveredFile {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Path relative to the input root, used to mirror the layout
    pub relative: PathBuf,
}

impl DiscoveredFile {
    /// Directory of the file relative to the root (empty at the top level)
    pub fn relative_dir(&self) -> &Path {
        self.relative.parent().unwrap_or(Path::new(""))
    }
}

/// Everything a harvest found
#[derive(Debug, Default)]
pub struct Harvest {
    pub files: Vec<DiscoveredFile>,
    /// Directories whose listing failed (the root included)
    pub unreadable: Vec<PathBuf>,
}

/// Contents of one directory listing
#[derive(Default)]
struct Listing {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
}

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Recursively collect every regular file under `root`
    pub async fn harvest(root: impl AsRef<Path>) -> Harvest {
        let root = root.as_ref();
        let mut harvest = Harvest::default();

        let root = match fs::canonicalize(root).await {
            Ok(root) => root,
            Err(e) => {
                error!("Cannot read directory {}: {}", root.display(), e);
                harvest.unreadable.push(root.to_path_buf());
                return harvest;
            }
        };

        let mut pending = JoinSet::new();
        pending.spawn(Self::list_dir(root.clone()));

        while let Some(joined) = pending.join_next().await {
            let (dir, listing) = match joined {
                Ok(result) => result,
                Err(e) => {
                    error!("Directory listing task failed: {}", e);
                    continue;
                }
            };

            match listing {
                Ok(listing) => {
                    for sub_dir in listing.dirs {
                        pending.spawn(Self::list_dir(sub_dir));
                    }
                    for path in listing.files {
                        let relative = path
                            .strip_prefix(&root)
                            .map(Path::to_path_buf)
                            .unwrap_or_else(|_| PathBuf::from(path.file_name().unwrap_or_default()));
                        harvest.files.push(DiscoveredFile { path, relative });
                    }
                }
                Err(e) => {
                    error!("Cannot read directory {}: {}", dir.display(), e);
                    harvest.unreadable.push(dir);
                }
            }
        }

        debug!(
            "Harvested {} files under {} ({} unreadable directories)",
            harvest.files.len(),
            root.display(),
            harvest.unreadable.len()
        );
        harvest
    }

    /// Lists one directory, splitting entries into files and subdirectories
    async fn list_dir(dir: PathBuf) -> (PathBuf, Result<Listing>) {
        let result = Self::read_listing(&dir).await;
        (dir, result)
    }

    async fn read_listing(dir: &Path) -> Result<Listing> {
        let mut listing = Listing::default();
        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| PipelineError::io(dir, e))?;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return Err(PipelineError::io(dir, e)),
            };
            let path = entry.path();

            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(e) => {
                    warn!("Cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };

            if file_type.is_dir() {
                listing.dirs.push(path);
            } else if file_type.is_file() {
                listing.files.push(path);
            } else if file_type.is_symlink() {
                match fs::metadata(&path).await {
                    Ok(target) if target.is_file() => listing.files.push(path),
                    Ok(_) => debug!("Not following directory symlink {}", path.display()),
                    Err(e) => warn!("Cannot stat {}: {}", path.display(), e),
                }
            }
        }

        Ok(listing)
    }

    /// Create `dir` and its parents if needed. Safe to race with other tasks.
    pub async fn ensure_dir(dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| PipelineError::io(dir, e))
    }

    /// Write `bytes` to `output` through a temporary sibling file, so readers
    /// never see a partially written artifact. Blocking; call from the
    /// blocking pool.
    pub fn write_atomic(output: &Path, bytes: &[u8]) -> Result<u64> {
        let mut temp = Self::temp_sibling(output)?;
        temp.write_all(bytes)
            .map_err(|e| PipelineError::io(temp.path(), e))?;
        Self::persist(temp, output)?;
        Ok(bytes.len() as u64)
    }

    /// Byte-for-byte copy of `input` to `output`, atomic like `write_atomic`
    pub fn copy_atomic(input: &Path, output: &Path) -> Result<u64> {
        let mut source = std::fs::File::open(input).map_err(|e| PipelineError::io(input, e))?;
        let mut temp = Self::temp_sibling(output)?;
        let copied = std::io::copy(&mut source, temp.as_file_mut())
            .map_err(|e| PipelineError::io(input, e))?;
        Self::persist(temp, output)?;
        Ok(copied)
    }

    /// Empty temporary file in the directory `output` will live in
    pub(crate) fn temp_sibling(output: &Path) -> Result<NamedTempFile> {
        let dir = output
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        NamedTempFile::new_in(dir).map_err(|e| PipelineError::io(dir, e))
    }

    /// Rename a finished temporary file onto `output`
    pub(crate) fn persist(temp: NamedTempFile, output: &Path) -> Result<()> {
        // Temporary files are created owner-only; artifacts are meant to be served.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o644))
                .map_err(|e| PipelineError::io(temp.path(), e))?;
        }
        temp.persist(output)
            .map_err(|e| PipelineError::io(output, e.error))?;
        Ok(())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[tokio::test]
    async fn test_harvest_finds_every_nested_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let files = [
            "a.jpg",
            "b.png",
            "sub/c.gif",
            "sub/deeper/d.svg",
            "sub/deeper/still/e.txt",
            "other/f.jpeg",
        ];
        for file in files {
            touch(root, file);
        }
        std::fs::create_dir_all(root.join("empty/nested")).unwrap();

        let harvest = FileManager::harvest(root).await;

        let found: BTreeSet<PathBuf> = harvest.files.iter().map(|f| f.relative.clone()).collect();
        let expected: BTreeSet<PathBuf> = files.iter().map(PathBuf::from).collect();
        assert_eq!(harvest.files.len(), files.len());
        assert_eq!(found, expected);
        assert!(harvest.unreadable.is_empty());
        assert!(harvest.files.iter().all(|f| f.path.is_absolute() && f.path.is_file()));
    }

    #[tokio::test]
    async fn test_relative_dir() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "x/y/z.png");
        touch(temp_dir.path(), "top.png");

        let mut harvest = FileManager::harvest(temp_dir.path()).await;
        harvest.files.sort_by(|a, b| a.relative.cmp(&b.relative));

        assert_eq!(harvest.files[0].relative_dir(), Path::new(""));
        assert_eq!(harvest.files[1].relative_dir(), Path::new("x/y"));
    }

    #[tokio::test]
    async fn test_missing_root_returns_empty() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");

        let harvest = FileManager::harvest(&missing).await;

        assert!(harvest.files.is_empty());
        assert_eq!(harvest.unreadable, vec![missing]);
    }

    #[tokio::test]
    async fn test_empty_root() {
        let temp_dir = TempDir::new().unwrap();
        let harvest = FileManager::harvest(temp_dir.path()).await;
        assert!(harvest.files.is_empty());
        assert!(harvest.unreadable.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "top.png");
        touch(root, "open/a.jpg");
        touch(root, "locked/hidden.gif");
        touch(root, "locked/deeper/also-hidden.gif");
        let locked = root.join("locked");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Permissions do not apply to root
        if std::fs::read_dir(&locked).is_ok() {
            std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let harvest = FileManager::harvest(root).await;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut found: Vec<_> = harvest.files.iter().map(|f| f.relative.clone()).collect();
        found.sort();
        assert_eq!(found, vec![PathBuf::from("open/a.jpg"), PathBuf::from("top.png")]);

        let canonical_root = std::fs::canonicalize(root).unwrap();
        assert_eq!(harvest.unreadable, vec![canonical_root.join("locked")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_directory_symlinks_are_not_followed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "real/a.png");
        std::os::unix::fs::symlink(root.join("real"), root.join("loop")).unwrap();
        std::os::unix::fs::symlink(root.join("real/a.png"), root.join("link.png")).unwrap();

        let harvest = FileManager::harvest(root).await;
        let mut found: Vec<_> = harvest.files.iter().map(|f| f.relative.clone()).collect();
        found.sort();

        assert_eq!(found, vec![PathBuf::from("link.png"), PathBuf::from("real/a.png")]);
    }

    #[test]
    fn test_harvest_from_sync_context() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "one.gif");
        touch(temp_dir.path(), "two/three.gif");

        let harvest = tokio_test::block_on(FileManager::harvest(temp_dir.path()));
        assert_eq!(harvest.files.len(), 2);
    }

    #[test]
    fn test_atomic_copy_and_write() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("logo.svg");
        std::fs::write(&source, b"<svg/>").unwrap();

        let copy = temp_dir.path().join("copy.svg");
        assert_eq!(FileManager::copy_atomic(&source, &copy).unwrap(), 6);
        assert_eq!(std::fs::read(&copy).unwrap(), b"<svg/>");

        let written = temp_dir.path().join("out.bin");
        assert_eq!(FileManager::write_atomic(&written, b"abc").unwrap(), 3);
        assert_eq!(std::fs::read(&written).unwrap(), b"abc");

        // Only the three files, no temporaries left behind
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_failed_copy_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("gone.svg");

        let err = FileManager::copy_atomic(&temp_dir.path().join("missing.svg"), &target).unwrap_err();

        assert!(err.is_not_found());
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(2048), "2.00 KB");
        assert_eq!(FileManager::format_size(5 * 1024 * 1024), "5.00 MB");
    }
}
