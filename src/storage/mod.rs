//! Storage Module
//!
//! Positioned I/O over the single backing data file, plus startup recovery.
//!
//! ## Responsibilities
//! - Absolute-offset reads, so concurrent readers never share a cursor
//! - Absolute-offset appends issued by the single writer
//! - Truncation back to the last good size after a failed append
//! - Rebuilding the index by scanning the log on open
//!
//! ## File Layout
//! ```text
//! offset 0
//! ┌──────────────────────────────┐
//! │ Record 1  (padded to 256·n)  │
//! ├──────────────────────────────┤
//! │ Record 2  (padded to 256·n)  │
//! ├──────────────────────────────┤
//! │ ...                          │
//! └──────────────────────────────┘
//! logical size (next append offset)
//! ```
//!
//! There is no manifest or separate index file; each record carries its own checksum.

mod recovery;

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

pub use recovery::{LogRecovery, RecoveryResult};

/// Random-access byte source
pub trait ReadAt {
    /// Fill `buf` from the bytes starting at `offset`, or fail with `UnexpectedEof`
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()>;
}

/// The backing log file as seen by the engine.
///
/// Implemented for `std::fs::File`; tests substitute their own implementation
/// to inject write failures.
pub trait LogFile: ReadAt + Send + Sync {
    /// Write all of `buf` starting at `offset`
    fn write_all_at(&self, buf: &[u8], offset: u64) -> io::Result<()>;

    /// Truncate or extend the file to exactly `size` bytes
    fn set_len(&self, size: u64) -> io::Result<()>;

    /// Flush file contents to stable storage
    fn sync_data(&self) -> io::Result<()>;

    /// Current physical size of the file
    fn file_size(&self) -> io::Result<u64>;
}

/// Open (or create) a data file for reading and appending
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

// =============================================================================
// std::fs::File
// =============================================================================

impl ReadAt for File {
    #[cfg(unix)]
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        std::os::unix::fs::FileExt::read_exact_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        use std::os::windows::fs::FileExt;

        while !buf.is_empty() {
            match self.seek_read(buf, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "failed to fill whole buffer",
                    ))
                }
                Ok(n) => {
                    let tmp = buf;
                    buf = &mut tmp[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl LogFile for File {
    #[cfg(unix)]
    fn write_all_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
        std::os::unix::fs::FileExt::write_all_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn write_all_at(&self, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
        use std::os::windows::fs::FileExt;

        while !buf.is_empty() {
            match self.seek_write(buf, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    ))
                }
                Ok(n) => {
                    buf = &buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn set_len(&self, size: u64) -> io::Result<()> {
        File::set_len(self, size)
    }

    fn sync_data(&self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn file_size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}
