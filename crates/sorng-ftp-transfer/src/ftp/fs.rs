//! Local filesystem access used for validation and directory enumeration.

use crate::ftp::error::FtpResult;
use std::path::Path;
use walkdir::WalkDir;

/// A regular file found while enumerating a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileEntry {
    pub path: String,
    pub size: u64,
}

pub trait Filesystem: Send + Sync {
    fn exists(&self, path: &str) -> bool;
    fn is_file(&self, path: &str) -> bool;
    fn is_dir(&self, path: &str) -> bool;
    fn file_size(&self, path: &str) -> FtpResult<u64>;
    fn create_dir_all(&self, path: &str) -> FtpResult<()>;
    /// Regular files directly inside `dir` (not recursive), ordered by name.
    /// Symlinks count as the file they point at.
    fn list_files(&self, dir: &str) -> FtpResult<Vec<LocalFileEntry>>;
    /// Final path component, or the whole path if it has none.
    fn file_name(&self, path: &str) -> String {
        Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string())
    }
}

/// [`Filesystem`] over `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn is_file(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }

    fn is_dir(&self, path: &str) -> bool {
        Path::new(path).is_dir()
    }

    fn file_size(&self, path: &str) -> FtpResult<u64> {
        Ok(std::fs::metadata(path)?.len())
    }

    fn create_dir_all(&self, path: &str) -> FtpResult<()> {
        if path.is_empty() {
            return Ok(());
        }
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    fn list_files(&self, dir: &str) -> FtpResult<Vec<LocalFileEntry>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Skipping unreadable entry in {}: {}", dir, e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let size = match entry.metadata() {
                Ok(m) => m.len(),
                Err(e) => {
                    log::warn!("Skipping {}: cannot stat: {}", entry.path().display(), e);
                    continue;
                }
            };
            files.push(LocalFileEntry {
                path: entry.path().to_string_lossy().into_owned(),
                size,
            });
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_only_top_level_regular_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"bb").unwrap();
        std::fs::write(dir.path().join("a.h264"), b"aaaa").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.txt"), b"c").unwrap();

        let fs = LocalFilesystem;
        let files = fs.list_files(dir.path().to_str().unwrap()).unwrap();
        let names: Vec<String> = files.iter().map(|f| fs.file_name(&f.path)).collect();
        assert_eq!(names, vec!["a.h264", "b.txt"]);
        assert_eq!(files[0].size, 4);
        assert_eq!(files[1].size, 2);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_resolve_to_their_targets() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let real = outside.path().join("real.h264");
        std::fs::write(&real, b"123456").unwrap();
        symlink(&real, dir.path().join("linked.h264")).unwrap();
        symlink(outside.path(), dir.path().join("linked_dir")).unwrap();
        symlink(dir.path().join("gone.bin"), dir.path().join("dangling.bin")).unwrap();
        std::fs::write(dir.path().join("plain.txt"), b"p").unwrap();

        let fs = LocalFilesystem;
        let files = fs.list_files(dir.path().to_str().unwrap()).unwrap();
        let names: Vec<String> = files.iter().map(|f| fs.file_name(&f.path)).collect();
        assert_eq!(names, vec!["linked.h264", "plain.txt"]);
        assert_eq!(files[0].size, 6);
    }

    #[test]
    fn kind_checks() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.bin");
        std::fs::write(&file, b"x").unwrap();
        let fs = LocalFilesystem;
        let d = dir.path().to_str().unwrap();
        let f = file.to_str().unwrap();
        assert!(fs.is_dir(d) && !fs.is_file(d));
        assert!(fs.is_file(f) && fs.exists(f));
        assert_eq!(fs.file_size(f).unwrap(), 1);
        assert!(!fs.exists(&format!("{}/missing", d)));
    }

    #[test]
    fn create_dir_all_builds_parents() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("x").join("y").join("z");
        LocalFilesystem.create_dir_all(deep.to_str().unwrap()).unwrap();
        assert!(deep.is_dir());
    }
}
