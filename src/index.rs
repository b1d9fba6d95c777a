//! Access-point index over a gzip or zlib stream.
//!
//! One sequential pass through the compressed stream records a checkpoint
//! at deflate block boundaries roughly every `span` bytes of output, plus
//! one at the very start and one at end of stream. Each checkpoint keeps
//! the 32 KiB of output preceding it so decoding can restart there.

use std::io::{ErrorKind, Read};

use log::{debug, info, trace};

use crate::error::{Error, Result};
use crate::inflate::{Container, Flush, Inflater};
use crate::window::{SlidingWindow, Window};

/// Default distance in output bytes between access points.
pub const DEFAULT_SPAN: u64 = 4_194_304;
/// Compressed bytes read from the input per refill.
pub const CHUNK_SIZE: usize = 16_384;
/// Capacity the point list starts with; it doubles from there.
const INITIAL_POINTS: usize = 8;

/// A position where decoding can resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPoint {
    /// Offset in the decompressed stream.
    pub uncompressed_offset: u64,
    /// Offset of the first full compressed byte of the block.
    pub compressed_offset: u64,
    /// Bits (0..=7) of the byte before `compressed_offset` that belong to
    /// the block.
    pub bits: u8,
}

/// Ordered access points, and optionally the window for each of them.
///
/// Windows are positionally correlated with points. An index read back
/// from a side file carries no windows; extraction then fetches them from
/// the window file through [`crate::WindowFile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    points: Vec<AccessPoint>,
    windows: Option<Vec<Window>>,
}

impl Index {
    pub(crate) fn new(points: Vec<AccessPoint>, windows: Option<Vec<Window>>) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::EmptyIndex);
        }
        if let Some(windows) = &windows {
            if windows.len() != points.len() {
                return Err(Error::corrupt(format!(
                    "{} windows for {} access points",
                    windows.len(),
                    points.len()
                )));
            }
        }
        Ok(Self { points, windows })
    }

    pub fn points(&self) -> &[AccessPoint] {
        &self.points
    }

    pub fn windows(&self) -> Option<&[Window]> {
        self.windows.as_deref()
    }

    /// Number of access points, end-of-stream sentinel included.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total decompressed length, taken from the final access point.
    pub fn uncompressed_len(&self) -> u64 {
        self.points
            .last()
            .map(|point| point.uncompressed_offset)
            .unwrap_or(0)
    }

    /// Drops the resident windows, keeping only the points.
    pub fn without_windows(self) -> Self {
        Self {
            points: self.points,
            windows: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub span: u64,
    pub chunk_size: usize,
    pub keep_windows: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            span: DEFAULT_SPAN,
            chunk_size: CHUNK_SIZE,
            keep_windows: true,
        }
    }
}

impl IndexConfig {
    pub fn with_span(mut self, span: u64) -> Self {
        self.span = span;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_keep_windows(mut self, keep_windows: bool) -> Self {
        self.keep_windows = keep_windows;
        self
    }
}

/// Builds an index with the default settings and the given span.
pub fn build_index<R: Read>(input: R, span: u64) -> Result<Index> {
    IndexBuilder::new(IndexConfig::default().with_span(span)).build(input)
}

pub struct IndexBuilder {
    config: IndexConfig,
    points: Vec<AccessPoint>,
    windows: Vec<Window>,
    last_out: u64,
}

impl IndexBuilder {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            points: Vec::new(),
            windows: Vec::new(),
            last_out: 0,
        }
    }

    /// Decodes the first gzip or zlib member of `input` end to end.
    ///
    /// Only the first member is indexed; bytes after its trailer are never
    /// read past the current chunk. On any error the partial lists are
    /// dropped with the builder.
    pub fn build<R: Read>(mut self, mut input: R) -> Result<Index> {
        if self.config.chunk_size == 0 {
            return Err(Error::InvalidArgument("chunk_size must be > 0"));
        }

        let mut inflater = Inflater::new(Container::Auto)?;
        let mut ring = SlidingWindow::new();
        let mut chunk = vec![0u8; self.config.chunk_size];
        let mut total_in: u64 = 0;
        let mut total_out: u64 = 0;

        'stream: loop {
            let filled = read_chunk(&mut input, &mut chunk)?;
            if filled == 0 {
                return Err(Error::corrupt("compressed stream ended before its trailer"));
            }

            let mut pos = 0;
            while pos < filled {
                let progress = inflater.inflate(&chunk[pos..filled], ring.spare(), Flush::Block)?;
                ring.advance(progress.produced);
                pos += progress.consumed;
                total_in += progress.consumed as u64;
                total_out += progress.produced as u64;

                if progress.stream_end {
                    break 'stream;
                }

                let Some(boundary) = progress.boundary else {
                    continue;
                };
                if boundary.last_block {
                    continue;
                }
                if total_out == 0 || total_out - self.last_out > self.config.span {
                    self.add_point(boundary.bits, total_in, total_out, &ring)?;
                }
            }
        }

        // End-of-stream sentinel, regardless of spacing.
        self.add_point(inflater.pending_bits(), total_in, total_out, &ring)?;
        self.finish()
    }

    fn add_point(&mut self, bits: u8, total_in: u64, total_out: u64, ring: &SlidingWindow) -> Result<()> {
        reserve_slot(&mut self.points, "access point list")?;
        if self.config.keep_windows {
            reserve_slot(&mut self.windows, "window list")?;
            self.windows.push(ring.snapshot()?);
        }
        self.points.push(AccessPoint {
            uncompressed_offset: total_out,
            compressed_offset: total_in,
            bits,
        });
        self.last_out = total_out;
        debug!(
            "access point {}: out={} in={} bits={}",
            self.points.len() - 1,
            total_out,
            total_in,
            bits
        );
        trace!("window ring has {} bytes left in this pass", ring.left());
        Ok(())
    }

    fn finish(mut self) -> Result<Index> {
        self.points.shrink_to_fit();
        let windows = if self.config.keep_windows {
            self.windows.shrink_to_fit();
            Some(self.windows)
        } else {
            None
        };
        info!(
            "index built: {} access points over {} bytes (span {})",
            self.points.len(),
            self.last_out,
            self.config.span
        );
        Index::new(self.points, windows)
    }
}

/// Grows `list` by doubling (from `INITIAL_POINTS`) when it is full.
pub(crate) fn reserve_slot<T>(list: &mut Vec<T>, what: &'static str) -> Result<()> {
    if list.len() == list.capacity() {
        let additional = list.capacity().max(INITIAL_POINTS);
        list.try_reserve_exact(additional)
            .map_err(|_| Error::OutOfMemory(what))?;
    }
    Ok(())
}

/// Reads until `buf` is full or the input is exhausted.
pub(crate) fn read_chunk<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::Io(err)),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::{Cursor, Write};

    fn sample(len: usize) -> Vec<u8> {
        let mut state: u32 = 0x1234_5678;
        let words = [&b"alpha "[..], b"beta ", b"gamma ", b"delta\n", b"epsilon "];
        let mut out = Vec::with_capacity(len + 16);
        while out.len() < len {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let word = words[(state >> 16) as usize % words.len()];
            out.extend_from_slice(word);
            out.push((state >> 8) as u8);
        }
        out.truncate(len);
        out
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn first_point_at_zero_and_sentinel_at_end() {
        let data = sample(300_000);
        let index = build_index(Cursor::new(gzip(&data)), 65_536).unwrap();

        let points = index.points();
        assert!(points.len() >= 3);
        assert_eq!(points[0].uncompressed_offset, 0);
        assert_eq!(index.uncompressed_len(), data.len() as u64);
        for pair in points.windows(2) {
            assert!(pair[0].uncompressed_offset <= pair[1].uncompressed_offset);
            assert!(pair[0].compressed_offset <= pair[1].compressed_offset);
        }
        assert!(points.iter().all(|p| p.bits <= 7));
        assert_eq!(index.windows().map(|w| w.len()), Some(points.len()));
    }

    #[test]
    fn interior_points_respect_span() {
        let data = sample(400_000);
        let span = 50_000;
        let index = build_index(Cursor::new(gzip(&data)), span).unwrap();
        let points = index.points();
        // Interior gaps exceed span; the sentinel may be closer.
        for pair in points[..points.len() - 1].windows(2) {
            assert!(pair[1].uncompressed_offset - pair[0].uncompressed_offset > span);
        }
    }

    #[test]
    fn zlib_container_is_detected() {
        let data = sample(100_000);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&data).unwrap();
        let compressed = encoder.finish().unwrap();

        let index = build_index(Cursor::new(compressed), DEFAULT_SPAN).unwrap();
        assert_eq!(index.points()[0].uncompressed_offset, 0);
        assert_eq!(index.uncompressed_len(), data.len() as u64);
    }

    #[test]
    fn first_window_is_all_zero() {
        let index = build_index(Cursor::new(gzip(&sample(10_000))), DEFAULT_SPAN).unwrap();
        let windows = index.windows().unwrap();
        assert!(windows[0].as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn windows_can_be_skipped() {
        let config = IndexConfig::default().with_span(16_384).with_keep_windows(false);
        let index = IndexBuilder::new(config)
            .build(Cursor::new(gzip(&sample(200_000))))
            .unwrap();
        assert!(index.windows().is_none());
        assert!(index.len() >= 2);
    }

    #[test]
    fn point_list_capacity_doubles_from_eight() {
        let mut list: Vec<u32> = Vec::new();
        let mut seen = Vec::new();
        for n in 0..40 {
            reserve_slot(&mut list, "test").unwrap();
            list.push(n);
            if seen.last() != Some(&list.capacity()) {
                seen.push(list.capacity());
            }
        }
        assert_eq!(seen, vec![8, 16, 32, 64]);
    }

    #[test]
    fn truncated_stream_is_corrupt() {
        let compressed = gzip(&sample(50_000));
        let cut = &compressed[..compressed.len() / 2];
        let err = build_index(Cursor::new(cut.to_vec()), DEFAULT_SPAN).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn bad_checksum_is_corrupt() {
        let mut compressed = gzip(&sample(50_000));
        let crc_at = compressed.len() - 8;
        compressed[crc_at] ^= 0xff;
        let err = build_index(Cursor::new(compressed), DEFAULT_SPAN).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let config = IndexConfig::default().with_chunk_size(0);
        let err = IndexBuilder::new(config)
            .build(Cursor::new(gzip(b"abc")))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
