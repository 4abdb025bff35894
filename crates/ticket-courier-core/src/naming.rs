use crate::error::Error;
use crate::fs::FileSystem;
use std::io;
use std::path::{Path, PathBuf};

/// Return a path inside `folder` that does not exist yet, appending
/// `_1`, `_2`, ... before the extension until one is free.
///
/// Nothing is reserved: another writer may take the returned path before
/// the caller uses it. The pipeline is the only writer to its folders.
pub fn unique_path(fs: &dyn FileSystem, folder: &Path, candidate: &str) -> Result<PathBuf, Error> {
    if candidate.is_empty() {
        return Err(Error::InvalidName("candidate file name is empty".to_string()));
    }
    if !fs.is_dir(folder) {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Folder not found: {}", folder.display()),
        )));
    }

    let first = folder.join(candidate);
    if !fs.exists(&first) {
        return Ok(first);
    }

    let (stem, extension) = split_name(candidate);
    let mut counter: u64 = 1;
    loop {
        let name = match extension {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        let path = folder.join(name);
        if !fs.exists(&path) {
            return Ok(path);
        }
        counter += 1;
    }
}

fn split_name(name: &str) -> (&str, Option<&str>) {
    let path = Path::new(name);
    match (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|s| s.to_str()),
    ) {
        (Some(stem), Some(ext)) => (stem, Some(ext)),
        _ => (name, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFs;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_free_name_is_returned_unchanged() {
        let tmp = tempdir().unwrap();
        let path = unique_path(&LocalFs, tmp.path(), "f.pdf").unwrap();
        assert_eq!(path, tmp.path().join("f.pdf"));
    }

    #[test]
    fn test_suffix_sequence_increases_as_names_are_taken() {
        let tmp = tempdir().unwrap();
        let mut allocated = Vec::new();
        for _ in 0..4 {
            let path = unique_path(&LocalFs, tmp.path(), "f.pdf").unwrap();
            assert!(!path.exists());
            fs::write(&path, b"x").unwrap();
            allocated.push(path.file_name().unwrap().to_string_lossy().into_owned());
        }
        assert_eq!(allocated, vec!["f.pdf", "f_1.pdf", "f_2.pdf", "f_3.pdf"]);
    }

    #[test]
    fn test_extensionless_names_get_plain_suffix() {
        let tmp = tempdir().unwrap();
        fs::create_dir(tmp.path().join("orders")).unwrap();
        fs::create_dir(tmp.path().join("orders_1")).unwrap();
        let path = unique_path(&LocalFs, tmp.path(), "orders").unwrap();
        assert_eq!(path, tmp.path().join("orders_2"));
    }

    #[test]
    fn test_numbering_restarts_and_only_checks_exact_candidates() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("f.pdf"), b"x").unwrap();
        fs::write(tmp.path().join("f_5.pdf"), b"x").unwrap();
        let path = unique_path(&LocalFs, tmp.path(), "f.pdf").unwrap();
        assert_eq!(path, tmp.path().join("f_1.pdf"));
    }

    #[test]
    fn test_only_last_extension_is_preserved() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("data.tar.gz"), b"x").unwrap();
        let path = unique_path(&LocalFs, tmp.path(), "data.tar.gz").unwrap();
        assert_eq!(path, tmp.path().join("data.tar_1.gz"));
    }

    #[test]
    fn test_rejects_empty_candidate_and_missing_folder() {
        let tmp = tempdir().unwrap();
        assert!(matches!(
            unique_path(&LocalFs, tmp.path(), ""),
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(
            unique_path(&LocalFs, &tmp.path().join("missing"), "f.pdf"),
            Err(Error::Io(_))
        ));
    }
}
