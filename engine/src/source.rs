//! [`MmapSource`]: a bounded random-access byte reader over a memory-mapped
//! file. The map is the single owner of the file contents; indexers, fetchers,
//! and scanners share it by [`Arc`] and read through [`MmapSource::slice`] at
//! their own offsets.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;

use crate::{Error, MorphResult};

/// A read-only memory map of one file.
///
/// Concurrent reads are safe; the map is released when the last [`Arc`] drops.
#[derive(Debug)]
pub struct MmapSource {
    map: Mmap,
    path: PathBuf,
}

impl MmapSource {
    /// Map `path` read-only. Missing or empty files fail here rather than on
    /// first read.
    pub fn open(path: impl AsRef<Path>) -> MorphResult<Arc<Self>> {
        let path = path.as_ref();
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(Error::EmptyFile);
        }
        // SAFETY: the mapping is private and read-only; we never hand out
        // slices that outlive the Arc that owns it.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Arc::new(Self {
            map,
            path: path.to_path_buf(),
        }))
    }

    pub fn len(&self) -> u64 {
        self.map.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Borrow `len` bytes starting at `offset`. The bounds check is written
    /// overflow-safe: `offset + len` is never computed on untrusted values.
    pub fn slice(&self, offset: u64, len: usize) -> MorphResult<&[u8]> {
        if len as u64 > self.len() || offset > self.len() - len as u64 {
            return Err(Error::ReadOutOfBounds {
                offset,
                len,
                source_len: self.len(),
            });
        }
        let start = offset as usize;
        Ok(&self.map[start..start + len])
    }

    /// Borrow everything from `offset` to the end of the file.
    pub fn tail(&self, offset: u64) -> MorphResult<&[u8]> {
        if offset > self.len() {
            return Err(Error::ReadOutOfBounds {
                offset,
                len: 0,
                source_len: self.len(),
            });
        }
        Ok(&self.map[offset as usize..])
    }

    /// Copy bytes at `offset` into `dst`, validating the whole range first.
    pub fn read(&self, offset: u64, dst: &mut [u8]) -> MorphResult<()> {
        dst.copy_from_slice(self.slice(offset, dst.len())?);
        Ok(())
    }
}
