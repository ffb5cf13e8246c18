//! `tar.bz2` archives of run directories

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use bzip2::Compression;
use bzip2::write::BzEncoder;

/// File extension of every archive written under the backups root
pub const ARCHIVE_EXTENSION: &str = "tar.bz2";

/// Archive `dir` into `root/<name>.tar.bz2`, with `name` as the top-level
/// entry inside the archive.
///
/// An existing archive of the same name is replaced. Returns the archive path.
pub fn compress_directory(root: &Path, dir: &Path, name: &str) -> io::Result<PathBuf> {
    let archive_path = root.join(format!("{}.{}", name, ARCHIVE_EXTENSION));
    tracing::info!("compressing: {} => {}", dir.display(), archive_path.display());

    let file = File::create(&archive_path)?;
    let encoder = BzEncoder::new(BufWriter::new(file), Compression::best());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all(name, dir)?;

    let encoder = builder.into_inner()?;
    let mut writer = encoder.finish()?;
    io::Write::flush(&mut writer)?;

    Ok(archive_path)
}

/// Names of the directories directly under `root`, sorted, excluding `skip`.
pub fn directories_except(root: &Path, skip: &str) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name != skip {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bzip2::read::BzDecoder;

    fn entries(archive: &Path) -> Vec<String> {
        let file = File::open(archive).unwrap();
        let mut reader = tar::Archive::new(BzDecoder::new(file));
        let mut names: Vec<String> = reader
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_compress_directory_uses_name_as_root() {
        let root = tempfile::tempdir().unwrap();
        let run = root.path().join("2024-01-01_00-00-00");
        fs::create_dir_all(run.join("web")).unwrap();
        fs::write(run.join("web").join("index.html"), b"<html/>").unwrap();

        let archive = compress_directory(root.path(), &run, "2024-01-01_00-00-00").unwrap();

        assert_eq!(archive, root.path().join("2024-01-01_00-00-00.tar.bz2"));
        let names = entries(&archive);
        assert!(names.contains(&"2024-01-01_00-00-00/web/index.html".to_string()));
        assert!(names.iter().all(|n| n.starts_with("2024-01-01_00-00-00")));
    }

    #[test]
    fn test_compress_directory_missing_source() {
        let root = tempfile::tempdir().unwrap();
        assert!(compress_directory(root.path(), &root.path().join("gone"), "gone").is_err());
    }

    #[test]
    fn test_directories_except() {
        let root = tempfile::tempdir().unwrap();
        for name in ["b", "a", "current"] {
            fs::create_dir(root.path().join(name)).unwrap();
        }
        fs::write(root.path().join("old.tar.bz2"), b"x").unwrap();

        assert_eq!(directories_except(root.path(), "current").unwrap(), vec!["a", "b"]);
    }
}
