//! Cursor-style handle over an indexed compressed stream.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::codec::{read_index, RECORD_LEN};
use crate::error::{Error, Result};
use crate::extract::extract;
use crate::index::Index;
use crate::window::{ResidentWindows, WindowFile, WindowSource};

/// Side-file locations for a compressed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub index: PathBuf,
    pub windows: PathBuf,
}

impl IndexPaths {
    /// `<path>.idx` and `<path>.idx.ucs`, appended to the full file name.
    pub fn for_compressed(path: impl AsRef<Path>) -> Self {
        let mut index = OsString::from(path.as_ref().as_os_str());
        index.push(".idx");
        let mut windows = index.clone();
        windows.push(".ucs");
        Self {
            index: PathBuf::from(index),
            windows: PathBuf::from(windows),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekOutcome {
    pub position: u64,
    /// The requested position fell outside `[0, len]` and was pulled back.
    pub clamped: bool,
}

/// Read-only handle giving `read`/`seek`/`tell` over the decompressed
/// contents of a gzip or zlib file, backed by an access-point index.
///
/// Every read repositions the compressed input, so a handle must not be
/// shared between threads without external locking. The index itself is
/// behind an `Arc` and can back any number of handles.
pub struct IndexedStream<R, S> {
    input: R,
    windows: S,
    index: Arc<Index>,
    pos: u64,
    end: u64,
}

impl IndexedStream<File, WindowFile<File>> {
    /// Opens `path` with its side files at the default locations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let paths = IndexPaths::for_compressed(path);
        Self::open_with(path, &paths.index, &paths.windows)
    }

    /// Opens a compressed file with explicit index and window file paths.
    ///
    /// A missing index file yields [`Error::IndexNotFound`] without any
    /// warning: callers are expected to fall back to sequential decoding.
    pub fn open_with(
        compressed: impl AsRef<Path>,
        index_path: impl AsRef<Path>,
        windows_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let compressed = compressed.as_ref();
        let index_path = index_path.as_ref();
        let windows_path = windows_path.as_ref();

        let index_file = match File::open(index_path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("no index at {}", index_path.display());
                return Err(Error::IndexNotFound(index_path.to_path_buf()));
            }
            Err(err) => return Err(Error::Io(err)),
        };
        let window_file = File::open(windows_path).map_err(|err| {
            warn!("cannot open window file {}: {err}", windows_path.display());
            Error::Io(err)
        })?;
        let input = File::open(compressed).map_err(|err| {
            warn!("cannot open {}: {err}", compressed.display());
            Error::Io(err)
        })?;

        let index_len = index_file.metadata()?.len();
        if index_len == 0 {
            return Err(Error::EmptyIndex);
        }
        if index_len % RECORD_LEN as u64 != 0 {
            return Err(Error::corrupt(format!(
                "index file {} is {} bytes, not a multiple of {}",
                index_path.display(),
                index_len,
                RECORD_LEN
            )));
        }

        let stream = Self::from_parts(input, BufReader::new(index_file), window_file)?;
        info!(
            "opened {} via {} ({} access points, {} bytes)",
            compressed.display(),
            index_path.display(),
            stream.index.len(),
            stream.end
        );
        Ok(stream)
    }
}

impl<R: Read + Seek, F: Read + Seek> IndexedStream<R, WindowFile<F>> {
    /// Builds a handle from already-open compressed, index and window
    /// sources. Windows are read lazily from `window_source`.
    pub fn from_parts<I: Read>(input: R, index_source: I, window_source: F) -> Result<Self> {
        let index = read_index(index_source)?;
        Ok(Self::new(input, Arc::new(index), WindowFile::new(window_source)))
    }
}

impl<R: Read + Seek> IndexedStream<R, ResidentWindows> {
    /// Builds a handle over an in-memory index that still holds its windows.
    pub fn with_index(input: R, index: Arc<Index>) -> Result<Self> {
        let windows = ResidentWindows::new(Arc::clone(&index))?;
        Ok(Self::new(input, index, windows))
    }
}

impl<R: Read + Seek, S: WindowSource> IndexedStream<R, S> {
    pub fn new(input: R, index: Arc<Index>, windows: S) -> Self {
        let end = index.uncompressed_len();
        Self {
            input,
            windows,
            index,
            pos: 0,
            end,
        }
    }

    /// Reads from the cursor, advancing it by the bytes produced. Returns
    /// fewer than `buf.len()` bytes only at end of data.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = extract(
            &mut self.input,
            self.index.points(),
            &mut self.windows,
            self.pos,
            buf,
        )?;
        self.pos += n as u64;
        Ok(n)
    }

    /// Reads exactly `buf.len()` bytes; `false` when end of data cut the
    /// read short. This is a fixed-length read, not a line read.
    pub fn read_fixed(&mut self, buf: &mut [u8]) -> Result<bool> {
        Ok(self.read(buf)? == buf.len())
    }

    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte)? {
            1 => Ok(Some(byte[0])),
            _ => Ok(None),
        }
    }

    /// Moves the cursor, clamping to `[0, len]` instead of failing.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> SeekOutcome {
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => self.pos as i128,
            Whence::End => self.end as i128,
        };
        let target = base + offset as i128;
        let position = target.clamp(0, self.end as i128) as u64;
        let clamped = position as i128 != target;
        if clamped {
            warn!("seek to {target} clamped to {position} (len {})", self.end);
        }
        self.pos = position;
        SeekOutcome { position, clamped }
    }

    pub fn tell(&self) -> u64 {
        self.pos
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.end
    }

    /// Decompressed length of the stream.
    pub fn len(&self) -> u64 {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end == 0
    }

    pub fn index(&self) -> &Arc<Index> {
        &self.index
    }

    pub fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(Error::Unsupported("writing through an index"))
    }

    pub fn write_str(&mut self, _s: &str) -> Result<usize> {
        Err(Error::Unsupported("writing through an index"))
    }

    pub fn write_byte(&mut self, _byte: u8) -> Result<()> {
        Err(Error::Unsupported("writing through an index"))
    }

    pub fn flush(&mut self) -> Result<()> {
        Err(Error::Unsupported("writing through an index"))
    }

    /// Releases the compressed input and window source.
    pub fn close(self) -> Result<()> {
        debug!("closing indexed stream at {}/{}", self.pos, self.end);
        Ok(())
    }
}

impl<R: Read + Seek, S: WindowSource> Read for IndexedStream<R, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        IndexedStream::read(self, buf).map_err(io::Error::from)
    }
}

impl<R: Read + Seek, S: WindowSource> Seek for IndexedStream<R, S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            SeekFrom::Start(n) => (i64::try_from(n).unwrap_or(i64::MAX), Whence::Start),
            SeekFrom::Current(n) => (n, Whence::Current),
            SeekFrom::End(n) => (n, Whence::End),
        };
        Ok(IndexedStream::seek(self, offset, whence).position)
    }
}

impl<R: Read + Seek, S: WindowSource> Write for IndexedStream<R, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        IndexedStream::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        IndexedStream::flush(self).map_err(io::Error::from)
    }
}
