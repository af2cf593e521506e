//! Shared destination-file handle with positional writes.
//!
//! Every Part holds a clone of this handle, but only the compile phase
//! writes through it, at disjoint offsets. Each `write_at` is
//! independent (pwrite-style), so the handle is safe to share.

use std::fs::File;
use std::io;
#[cfg(unix)]
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct DestFile {
    file: Arc<File>,
    path: PathBuf,
}

impl DestFile {
    /// Create (or truncate) the destination file and preallocate `size`
    /// bytes when the total is known up front.
    pub fn create(path: &Path, size: u64) -> io::Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        if size > 0 {
            file.set_len(size)?;
        }
        Ok(Self {
            file: Arc::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Open an existing destination file for resume (read+write, no
    /// truncation).
    pub fn open_existing(path: &Path) -> io::Result<Self> {
        let file = File::options().read(true).write(true).open(path)?;
        Ok(Self {
            file: Arc::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Write `data` at `offset` without moving any shared cursor.
    /// A short write is surfaced as `WriteZero`.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        let n = self.file.write_at(data, offset)?;
        if n != data.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {} of {} bytes", n, data.len()),
            ));
        }
        Ok(())
    }

    /// Non-Unix fallback: seek + write on a cloned descriptor.
    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = self.file.try_clone()?;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)?;
        Ok(())
    }

    /// Read up to `buf.len()` bytes at `offset`. Used by the compile
    /// phase to re-hash already-compiled ranges on resume.
    #[cfg(unix)]
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read_at(buf, offset)
    }

    #[cfg(not(unix))]
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::io::{Read, Seek, SeekFrom};
        let mut f = self.file.try_clone()?;
        f.seek(SeekFrom::Start(offset))?;
        f.read(buf)
    }

    /// Sync file contents to disk.
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_preallocates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let f = DestFile::create(&path, 1024).unwrap();
        assert_eq!(f.len().unwrap(), 1024);
    }

    #[test]
    fn disjoint_positional_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let f = DestFile::create(&path, 8).unwrap();
        f.write_at(4, b"BBBB").unwrap();
        f.write_at(0, b"AAAA").unwrap();
        f.sync().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"AAAABBBB");
    }

    #[test]
    fn clones_share_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let f = DestFile::create(&path, 4).unwrap();
        let g = f.clone();
        f.write_at(0, b"ab").unwrap();
        g.write_at(2, b"cd").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"abcd");
    }

    #[test]
    fn read_at_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let f = DestFile::create(&path, 6).unwrap();
        f.write_at(0, b"abcdef").unwrap();
        let mut buf = [0u8; 3];
        let n = f.read_at(2, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"cde");
    }
}
