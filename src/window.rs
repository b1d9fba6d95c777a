//! 32 KiB back-reference windows.
//!
//! A checkpoint is only usable together with the 32 KiB of output that
//! precedes it. During a build the output lands in a [`SlidingWindow`] ring;
//! each checkpoint takes a linear [`Window`] snapshot of it. At extraction
//! time windows come from a [`WindowSource`]: either the snapshots kept in
//! memory by the builder, or fixed-size blocks of the window side file.

use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::index::Index;

/// Size of the deflate back-reference window and of every snapshot.
pub const WINDOW_SIZE: usize = 32_768;

/// Linear copy of the 32 KiB preceding an access point, oldest byte first.
/// Zero-filled ahead of the stream's first byte.
#[derive(Clone, PartialEq, Eq)]
pub struct Window {
    bytes: Box<[u8]>,
}

impl Window {
    /// Wraps a block read from a window side file.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() != WINDOW_SIZE {
            return Err(Error::corrupt(format!(
                "window block is {} bytes, expected {WINDOW_SIZE}",
                bytes.len()
            )));
        }
        Ok(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window").field("len", &self.bytes.len()).finish()
    }
}

/// Ring buffer receiving decompressed output during an index build.
///
/// The engine writes straight into [`SlidingWindow::spare`]; once the buffer
/// is full the cursor wraps to the front and older bytes are overwritten.
pub(crate) struct SlidingWindow {
    buf: Box<[u8]>,
    next: usize,
}

impl SlidingWindow {
    pub(crate) fn new() -> Self {
        Self {
            buf: vec![0u8; WINDOW_SIZE].into_boxed_slice(),
            next: WINDOW_SIZE,
        }
    }

    /// Free space after the write cursor. Wraps the cursor first if the
    /// previous pass filled the buffer.
    pub(crate) fn spare(&mut self) -> &mut [u8] {
        if self.next == WINDOW_SIZE {
            self.next = 0;
        }
        &mut self.buf[self.next..]
    }

    pub(crate) fn advance(&mut self, produced: usize) {
        self.next += produced;
        debug_assert!(self.next <= WINDOW_SIZE);
    }

    /// Bytes of the current pass not yet written (zlib's `avail_out`).
    pub(crate) fn left(&self) -> usize {
        WINDOW_SIZE - self.next
    }

    /// Copies the ring out in true byte order: the tail of the previous
    /// pass, then the head of the current one.
    pub(crate) fn snapshot(&self) -> Result<Window> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(WINDOW_SIZE)
            .map_err(|_| Error::OutOfMemory("window snapshot"))?;
        bytes.extend_from_slice(&self.buf[self.next..]);
        bytes.extend_from_slice(&self.buf[..self.next]);
        Ok(Window {
            bytes: bytes.into_boxed_slice(),
        })
    }
}

/// Supplies the window for the access point at a given list position.
pub trait WindowSource {
    fn window(&mut self, position: usize) -> Result<&[u8]>;
}

impl WindowSource for &[Window] {
    fn window(&mut self, position: usize) -> Result<&[u8]> {
        window_at(self, position)
    }
}

fn window_at(windows: &[Window], position: usize) -> Result<&[u8]> {
    windows
        .get(position)
        .map(Window::as_bytes)
        .ok_or_else(|| Error::corrupt(format!("no window for access point {position}")))
}

/// Windows held in memory by a shared [`Index`].
#[derive(Debug, Clone)]
pub struct ResidentWindows {
    index: Arc<Index>,
}

impl ResidentWindows {
    pub fn new(index: Arc<Index>) -> Result<Self> {
        if index.windows().is_none() {
            return Err(Error::WindowsNotResident);
        }
        Ok(Self { index })
    }
}

impl WindowSource for ResidentWindows {
    fn window(&mut self, position: usize) -> Result<&[u8]> {
        let windows = self.index.windows().ok_or(Error::WindowsNotResident)?;
        window_at(windows, position)
    }
}

/// Windows read on demand from a window side file: block `n` lives at byte
/// offset `n * WINDOW_SIZE`.
pub struct WindowFile<R> {
    inner: R,
    buf: Box<[u8]>,
}

impl<R: Read + Seek> WindowFile<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: vec![0u8; WINDOW_SIZE].into_boxed_slice(),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> WindowSource for WindowFile<R> {
    fn window(&mut self, position: usize) -> Result<&[u8]> {
        let offset = (position as u64)
            .checked_mul(WINDOW_SIZE as u64)
            .ok_or_else(|| Error::corrupt("window offset overflow"))?;
        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner
            .read_exact(&mut self.buf)
            .map_err(|err| Error::from_read(err, "window file"))?;
        Ok(&self.buf)
    }
}
