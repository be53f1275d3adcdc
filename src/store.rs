//! Keyed stores of per-sample call arrays.
//!
//! The streamer only needs to list the arrays, learn their length and read
//! contiguous slices of them, which is what [`ArrayStore`] exposes.
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Name of the array group inside a [`DirectoryStore`], when present.
pub const ARRAY_GROUP: &str = "accs";

pub trait ArrayStore {
    /// Names of every array in the store, sorted.
    fn list_keys(&self) -> Result<Vec<String>>;

    /// Number of calls in the array `key`.
    fn len(&self, key: &str) -> Result<usize>;

    /// Calls `start..end` of the array `key`.
    fn read_slice(&self, key: &str, start: usize, end: usize) -> Result<Vec<u8>>;
}

fn out_of_bounds(key: &str, start: usize, end: usize, len: usize) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!(
            "slice {}..{} is out of bounds for array `{}` of length {}",
            start, end, key, len
        ),
    ))
}

/// Arrays held in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    arrays: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the array `key`.
    pub fn insert(&mut self, key: &str, calls: &[u8]) -> &mut Self {
        self.arrays.insert(key.into(), calls.to_vec());
        self
    }

    fn array(&self, key: &str) -> Result<&Vec<u8>> {
        self.arrays.get(key).ok_or_else(|| Error::missing_key(key))
    }
}

impl ArrayStore for MemoryStore {
    fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.arrays.keys().cloned().collect())
    }

    fn len(&self, key: &str) -> Result<usize> {
        Ok(self.array(key)?.len())
    }

    fn read_slice(&self, key: &str, start: usize, end: usize) -> Result<Vec<u8>> {
        let array = self.array(key)?;
        array
            .get(start..end)
            .map(|calls| calls.to_vec())
            .ok_or_else(|| out_of_bounds(key, start, end, array.len()))
    }
}

/// Arrays stored as flat files, one byte per call, in a directory.
///
/// If the directory has an `accs/` subdirectory the arrays are read from
/// there instead. Hidden files are ignored. Slices are read with a seek so an
/// array is never loaded whole.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
    arrays: BTreeMap<String, PathBuf>,
}

impl DirectoryStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("array store `{}` is not a directory", path.display()),
            )));
        }
        let group = path.join(ARRAY_GROUP);
        let root = if group.is_dir() { group } else { path.to_path_buf() };

        let mut arrays = BTreeMap::new();
        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().into_string().map_err(|name| {
                Error::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("array name {:?} is not valid UTF-8", name),
                ))
            })?;
            if name.starts_with('.') {
                continue;
            }
            arrays.insert(name, entry.path());
        }
        Ok(Self { root, arrays })
    }

    /// Directory the arrays are read from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> Result<&PathBuf> {
        self.arrays.get(key).ok_or_else(|| Error::missing_key(key))
    }
}

impl ArrayStore for DirectoryStore {
    fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.arrays.keys().cloned().collect())
    }

    fn len(&self, key: &str) -> Result<usize> {
        Ok(fs::metadata(self.path(key)?)?.len() as usize)
    }

    fn read_slice(&self, key: &str, start: usize, end: usize) -> Result<Vec<u8>> {
        let len = self.len(key)?;
        if start > end || end > len {
            return Err(out_of_bounds(key, start, end, len));
        }
        let mut file = File::open(self.path(key)?)?;
        file.seek(SeekFrom::Start(start as u64))?;
        let mut calls = vec![0u8; end - start];
        file.read_exact(&mut calls)?;
        Ok(calls)
    }
}
