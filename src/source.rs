//! Random-access byte sources for file-backed graphs.
//!
//! `FileGraph` decodes records lazily, reading a handful of bytes per
//! operation, so its backing storage is abstracted as a narrow positioned
//! read capability rather than a streaming reader. A memory-mapped file
//! (`memmap2::Mmap` derefs to `[u8]`) and a plain `File` both qualify.
//!
//! # Contract
//! - `read_at` fills the whole buffer or fails; short reads surface as
//!   `UnexpectedEof`.
//! - Reads take `&self`; implementations must be safe for concurrent
//!   readers if the graph built on top is to be shared.
//! - The source's lifetime is the caller's problem: graphs borrow it and
//!   never close it.

use std::fs::File;
use std::io;

/// Positioned read capability consumed by [`crate::FileGraph`].
pub trait ReadAt {
    /// Returns the total length of the source in bytes.
    fn len(&self) -> io::Result<u64>;

    /// Reads exactly `buf.len()` bytes starting at `offset`.
    ///
    /// # Errors
    /// `UnexpectedEof` if the source ends before the buffer is filled; any
    /// other I/O error is passed through unmodified.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Returns true if the source is empty.
    fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl ReadAt for [u8] {
    fn len(&self) -> io::Result<u64> {
        Ok(<[u8]>::len(self) as u64)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::UnexpectedEof, "offset beyond source"))?;
        let end = start.checked_add(buf.len()).ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "read range overflows")
        })?;
        let slice = self.get(start..end).ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of source")
        })?;
        buf.copy_from_slice(slice);
        Ok(())
    }
}

#[cfg(unix)]
impl ReadAt for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        std::os::unix::fs::FileExt::read_exact_at(self, buf, offset)
    }
}

#[cfg(windows)]
impl ReadAt for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn read_at(&self, offset: u64, mut buf: &mut [u8]) -> io::Result<()> {
        let mut offset = offset;
        while !buf.is_empty() {
            match std::os::windows::fs::FileExt::seek_read(self, buf, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "read past end of file",
                    ));
                }
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl<T: ReadAt + ?Sized> ReadAt for &T {
    fn len(&self) -> io::Result<u64> {
        (**self).len()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_at(offset, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_read_at_exact() {
        let data = [1u8, 2, 3, 4, 5];
        let mut buf = [0u8; 3];
        data[..].read_at(1, &mut buf).unwrap();
        assert_eq!(buf, [2, 3, 4]);
    }

    #[test]
    fn slice_read_past_end_is_eof() {
        let data = [1u8, 2, 3];
        let mut buf = [0u8; 3];
        let err = data[..].read_at(1, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn slice_len() {
        assert_eq!(ReadAt::len(&[0u8; 7][..]).unwrap(), 7);
        assert!(!ReadAt::is_empty(&[0u8; 7][..]).unwrap());
        assert!(ReadAt::is_empty(&[][..]).unwrap());
    }

    #[test]
    fn reference_delegates() {
        let data = [9u8, 8, 7];
        let by_ref: &[u8] = &data;
        let mut buf = [0u8; 2];
        (&by_ref).read_at(0, &mut buf).unwrap();
        assert_eq!(buf, [9, 8]);
    }
}
