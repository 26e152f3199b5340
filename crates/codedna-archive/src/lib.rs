//! Thin reads over plugin artifact archives (JARs) and exploded directories.
//!
//! This crate deliberately stops at "give me the bytes of every `.class`
//! entry": multi-release JAR resolution, module descriptors, and classpath
//! caching are a different problem than fingerprinting, and are left to
//! whatever packages this crate for a specific marketplace.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("zip error reading {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// A compiled plugin artifact: either a JAR file or a directory of `.class`
/// files laid out the way an exploded build output would be.
#[derive(Clone, Debug)]
pub struct Archive {
    path: PathBuf,
}

impl Archive {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a single named entry. Returns `Ok(None)` if it doesn't exist.
    pub fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        if self.path.is_dir() {
            let candidate = self.path.join(name);
            if !candidate.exists() {
                return Ok(None);
            }
            let mut buf = Vec::new();
            File::open(&candidate)
                .and_then(|mut f| f.read_to_end(&mut buf))
                .map_err(|source| ArchiveError::Io {
                    path: candidate.clone(),
                    source,
                })?;
            return Ok(Some(buf));
        }

        let file = File::open(&self.path).map_err(|source| ArchiveError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut zip = ZipArchive::new(file).map_err(|source| ArchiveError::Zip {
            path: self.path.clone(),
            source,
        })?;
        match zip.by_name(name) {
            Ok(mut entry) => {
                let mut buf = Vec::new();
                entry
                    .read_to_end(&mut buf)
                    .map_err(|source| ArchiveError::Io {
                        path: self.path.clone(),
                        source,
                    })?;
                Ok(Some(buf))
            }
            Err(zip::result::ZipError::FileNotFound) => Ok(None),
            Err(source) => Err(ArchiveError::Zip {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Returns the internal name and raw bytes of every `.class` entry in the
    /// artifact, in the order the archive lists them.
    pub fn class_entries(&self) -> Result<Vec<(String, Vec<u8>)>> {
        if self.path.is_dir() {
            return self.class_entries_from_dir();
        }

        let file = File::open(&self.path).map_err(|source| ArchiveError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut zip = ZipArchive::new(file).map_err(|source| ArchiveError::Zip {
            path: self.path.clone(),
            source,
        })?;

        let mut out = Vec::new();
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).map_err(|source| ArchiveError::Zip {
                path: self.path.clone(),
                source,
            })?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            if !name.ends_with(".class") {
                continue;
            }
            let mut buf = Vec::new();
            entry
                .read_to_end(&mut buf)
                .map_err(|source| ArchiveError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            out.push((name, buf));
        }
        Ok(out)
    }

    fn class_entries_from_dir(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(&self.path)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("class"))
            .collect();
        paths.sort();

        let mut out = Vec::new();
        for entry in paths {
            let relative = entry
                .strip_prefix(&self.path)
                .unwrap_or(&entry)
                .to_string_lossy()
                .replace('\\', "/");
            let mut buf = Vec::new();
            File::open(&entry)
                .and_then(|mut f| f.read_to_end(&mut buf))
                .map_err(|source| ArchiveError::Io {
                    path: entry.clone(),
                    source,
                })?;
            out.push((relative, buf));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_class_files_from_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("com/example")).unwrap();
        std::fs::write(dir.path().join("com/example/Foo.class"), b"stub").unwrap();
        std::fs::write(dir.path().join("README.md"), b"not a class file").unwrap();

        let archive = Archive::new(dir.path());
        let entries = archive.class_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "com/example/Foo.class");
        assert_eq!(entries[0].1, b"stub");
    }

    #[test]
    fn reads_class_files_from_a_zip() {
        let dir = tempfile::tempdir().unwrap();
        let jar_path = dir.path().join("plugin.jar");
        let file = File::create(&jar_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file::<_, ()>("com/example/Foo.class", Default::default())
            .unwrap();
        writer.write_all(b"stub").unwrap();
        writer.finish().unwrap();

        let archive = Archive::new(&jar_path);
        let entries = archive.class_entries().unwrap();
        assert_eq!(entries, vec![("com/example/Foo.class".to_string(), b"stub".to_vec())]);
    }

    #[test]
    fn missing_entry_is_none_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path());
        assert_eq!(archive.read("missing.class").unwrap(), None);
    }
}
