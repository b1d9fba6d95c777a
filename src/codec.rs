//! Index and window side files.
//!
//! The index file is a bare sequence of fixed-width little-endian records,
//! one per access point: `i64 uncompressed_offset`, `i64 compressed_offset`,
//! `i32 bits`. The window file is the matching sequence of 32 KiB blocks.
//! Neither file has a header; the point count is the file length divided by
//! the record width.

use std::io::{Read, Write};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::index::{read_chunk, reserve_slot, AccessPoint, Index};

/// Width of one index record in bytes.
pub const RECORD_LEN: usize = 20;

/// Writes one index record and one window block per access point.
///
/// Returns the number of points written. The index must still hold its
/// windows (it was built in this process with `keep_windows`).
pub fn write_index<I: Write, W: Write>(index: &Index, mut index_sink: I, mut window_sink: W) -> Result<usize> {
    let windows = index.windows().ok_or(Error::WindowsNotResident)?;
    let mut written = 0;
    for (point, window) in index.points().iter().zip(windows) {
        index_sink.write_all(&encode_record(point)?)?;
        window_sink.write_all(window.as_bytes())?;
        written += 1;
    }
    index_sink.flush()?;
    window_sink.flush()?;
    debug!("wrote {written} index records");
    Ok(written)
}

/// Reads index records until end of file. Windows are not loaded.
///
/// A partial record at the end of the file is dropped.
pub fn read_index<R: Read>(mut source: R) -> Result<Index> {
    let mut points: Vec<AccessPoint> = Vec::new();
    let mut buf = [0u8; RECORD_LEN];
    loop {
        let filled = read_chunk(&mut source, &mut buf)?;
        if filled == 0 {
            break;
        }
        if filled < RECORD_LEN {
            warn!("discarding partial index record ({filled} of {RECORD_LEN} bytes)");
            break;
        }
        let point = decode_record(&buf)?;
        if let Some(prev) = points.last() {
            if point.uncompressed_offset < prev.uncompressed_offset
                || point.compressed_offset < prev.compressed_offset
            {
                return Err(Error::corrupt(format!(
                    "index record {} is out of order",
                    points.len()
                )));
            }
        }
        reserve_slot(&mut points, "access point list")?;
        points.push(point);
    }
    points.shrink_to_fit();
    debug!("read {} index records", points.len());
    Index::new(points, None)
}

fn encode_record(point: &AccessPoint) -> Result<[u8; RECORD_LEN]> {
    let out = i64::try_from(point.uncompressed_offset)
        .map_err(|_| Error::InvalidArgument("uncompressed offset exceeds i64"))?;
    let input = i64::try_from(point.compressed_offset)
        .map_err(|_| Error::InvalidArgument("compressed offset exceeds i64"))?;
    let mut buf = [0u8; RECORD_LEN];
    buf[0..8].copy_from_slice(&out.to_le_bytes());
    buf[8..16].copy_from_slice(&input.to_le_bytes());
    buf[16..20].copy_from_slice(&i32::from(point.bits).to_le_bytes());
    Ok(buf)
}

fn decode_record(buf: &[u8; RECORD_LEN]) -> Result<AccessPoint> {
    let out = i64::from_le_bytes(buf[0..8].try_into().expect("slice length"));
    let input = i64::from_le_bytes(buf[8..16].try_into().expect("slice length"));
    let bits = i32::from_le_bytes(buf[16..20].try_into().expect("slice length"));

    let uncompressed_offset =
        u64::try_from(out).map_err(|_| Error::corrupt("negative uncompressed offset"))?;
    let compressed_offset =
        u64::try_from(input).map_err(|_| Error::corrupt("negative compressed offset"))?;
    if !(0..=7).contains(&bits) {
        return Err(Error::corrupt(format!("bit offset {bits} out of range")));
    }
    if bits > 0 && compressed_offset == 0 {
        return Err(Error::corrupt("bit offset without a preceding byte"));
    }
    Ok(AccessPoint {
        uncompressed_offset,
        compressed_offset,
        bits: bits as u8,
    })
}
