use glob::{MatchOptions, Pattern};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Filesystem operations the pipeline stages rely on. Stages only ever
/// move or delete files, so each file has exactly one owning folder.
pub trait FileSystem {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    /// Files directly inside `dir` whose extension matches, ignoring case.
    /// Sorted by path.
    fn list_files(&self, dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>>;
    fn create_dir(&self, path: &Path) -> io::Result<()>;
    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_files(&self, dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Directory not found: {}", dir.display()),
            ));
        }

        let pattern = format!(
            "{}/*.{}",
            Pattern::escape(&dir.to_string_lossy()),
            Pattern::escape(extension)
        );
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };

        let entries = glob::glob_with(&pattern, options)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let mut files = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => error!("Error reading entry in {}: {}", dir.display(), e),
            }
        }
        files.sort();
        Ok(files)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                if !from.is_file() {
                    return Err(rename_err);
                }
                // rename cannot cross filesystems
                debug!(
                    "rename {} -> {} failed ({}), copying instead",
                    from.display(),
                    to.display(),
                    rename_err
                );
                fs::copy(from, to)?;
                fs::remove_file(from)
            }
        }
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(path, contents)
    }
}

/// Snapshot of the documents waiting in the download area. The fetch
/// stage fills that folder as a side effect; the redaction stage drains
/// it through this queue.
#[derive(Debug)]
pub struct PendingDocuments {
    documents: Vec<PathBuf>,
}

impl PendingDocuments {
    pub const EXTENSION: &'static str = "pdf";

    pub fn scan(fs: &dyn FileSystem, download_dir: &Path) -> io::Result<Self> {
        let documents = fs.list_files(download_dir, Self::EXTENSION)?;
        debug!(
            "{} pending documents in {}",
            documents.len(),
            download_dir.display()
        );
        Ok(Self { documents })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl IntoIterator for PendingDocuments {
    type Item = PathBuf;
    type IntoIter = std::vec::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_list_files_matches_extension_case_insensitively() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("b.PDF"), b"x").unwrap();
        fs::write(tmp.path().join("a.pdf"), b"x").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(tmp.path().join("folder.pdf")).unwrap();

        let files = LocalFs.list_files(tmp.path(), "pdf").unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.PDF"]);
    }

    #[test]
    fn test_list_files_handles_glob_characters_in_dir() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("batch [2024]");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("orders.xlsx"), b"x").unwrap();

        let files = LocalFs.list_files(&dir, "xlsx").unwrap();
        assert_eq!(files, vec![dir.join("orders.xlsx")]);
    }

    #[test]
    fn test_move_file_leaves_single_copy() {
        let tmp = tempdir().unwrap();
        let from = tmp.path().join("a.pdf");
        let to_dir = tmp.path().join("out");
        fs::create_dir(&to_dir).unwrap();
        fs::write(&from, b"content").unwrap();

        LocalFs.move_file(&from, &to_dir.join("a.pdf")).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read(to_dir.join("a.pdf")).unwrap(), b"content");
    }

    #[test]
    fn test_pending_documents_snapshot() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("AAA.pdf"), b"x").unwrap();
        fs::write(tmp.path().join("orders.xlsx"), b"x").unwrap();

        let pending = PendingDocuments::scan(&LocalFs, tmp.path()).unwrap();
        // later arrivals are not part of this snapshot
        fs::write(tmp.path().join("BBB.pdf"), b"x").unwrap();
        assert_eq!(pending.len(), 1);
        let docs: Vec<PathBuf> = pending.into_iter().collect();
        assert_eq!(docs, vec![tmp.path().join("AAA.pdf")]);
    }
}
