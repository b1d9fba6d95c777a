mod common;

use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use flate2::Compression;
use gzindex::{
    build_index, write_index, Error, IndexPaths, IndexedStream, Whence, RECORD_LEN,
};
use tempfile::tempdir;

use common::{gzip, sample};

/// Writes `<dir>/data.gz` plus its side files; returns the data and path.
fn indexed_file(dir: &Path, len: usize, span: u64) -> (Vec<u8>, std::path::PathBuf) {
    let data = sample(len);
    let compressed = gzip(&data, Compression::default());
    let path = dir.join("data.gz");
    fs::write(&path, &compressed).expect("write gz");

    let index = build_index(Cursor::new(&compressed), span).expect("build");
    let paths = IndexPaths::for_compressed(&path);
    write_index(
        &index,
        BufWriter::new(File::create(&paths.index).expect("create idx")),
        BufWriter::new(File::create(&paths.windows).expect("create ucs")),
    )
    .expect("write side files");
    (data, path)
}

#[test]
fn open_read_seek_tell() {
    let dir = tempdir().expect("tempdir");
    let (data, path) = indexed_file(dir.path(), 500_000, 80_000);

    let mut stream = IndexedStream::open(&path).expect("open");
    assert_eq!(stream.len(), data.len() as u64);
    assert_eq!(stream.tell(), 0);

    let mut buf = vec![0u8; 1000];
    assert_eq!(stream.read(&mut buf).expect("read"), 1000);
    assert_eq!(&buf[..], &data[..1000]);
    assert_eq!(stream.tell(), 1000);

    let outcome = stream.seek(300_000, Whence::Start);
    assert!(!outcome.clamped);
    assert!(stream.read_fixed(&mut buf).expect("read_fixed"));
    assert_eq!(&buf[..], &data[300_000..301_000]);
    assert_eq!(stream.tell(), 301_000);

    stream.seek(-10, Whence::End);
    assert!(!stream.read_fixed(&mut buf).expect("short read_fixed"));
    assert!(stream.is_eof());

    stream.rewind();
    assert_eq!(stream.read_byte().expect("byte"), Some(data[0]));
    stream.close().expect("close");
}

#[test]
fn io_traits_read_to_end() {
    let dir = tempdir().expect("tempdir");
    let (data, path) = indexed_file(dir.path(), 200_000, 50_000);

    let mut stream = IndexedStream::open(&path).expect("open");
    Seek::seek(&mut stream, SeekFrom::Start(150_000)).expect("seek");
    let mut rest = Vec::new();
    Read::read_to_end(&mut stream, &mut rest).expect("read_to_end");
    assert_eq!(rest, &data[150_000..]);
}

#[test]
fn seek_past_end_clamps() {
    let dir = tempdir().expect("tempdir");
    let (data, path) = indexed_file(dir.path(), 50_000, 20_000);

    let mut stream = IndexedStream::open(&path).expect("open");
    let outcome = stream.seek(10, Whence::End);
    assert!(outcome.clamped);
    assert_eq!(outcome.position, data.len() as u64);
    let outcome = stream.seek(-1_000_000, Whence::Current);
    assert!(outcome.clamped);
    assert_eq!(stream.tell(), 0);
}

#[test]
fn missing_index_is_distinct() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("plain.gz");
    fs::write(&path, gzip(b"no index here", Compression::default())).expect("write gz");

    let err = IndexedStream::open(&path).err().expect("open must fail");
    assert!(matches!(err, Error::IndexNotFound(_)));
}

#[test]
fn empty_index_is_distinct_from_corrupt() {
    let dir = tempdir().expect("tempdir");
    let (_, path) = indexed_file(dir.path(), 10_000, 4_096);
    let paths = IndexPaths::for_compressed(&path);

    fs::write(&paths.index, b"").expect("truncate idx");
    let err = IndexedStream::open(&path).err().expect("empty index");
    assert!(matches!(err, Error::EmptyIndex));

    fs::write(&paths.index, vec![0u8; RECORD_LEN + 3]).expect("ragged idx");
    let err = IndexedStream::open(&path).err().expect("ragged index");
    assert!(matches!(err, Error::Corrupt(_)));
}

#[test]
fn explicit_side_file_paths() {
    let dir = tempdir().expect("tempdir");
    let (data, path) = indexed_file(dir.path(), 120_000, 30_000);
    let paths = IndexPaths::for_compressed(&path);
    let idx = dir.path().join("elsewhere.idx");
    let ucs = dir.path().join("elsewhere.ucs");
    fs::rename(&paths.index, &idx).expect("move idx");
    fs::rename(&paths.windows, &ucs).expect("move ucs");

    assert!(matches!(
        IndexedStream::open(&path).err(),
        Some(Error::IndexNotFound(_))
    ));
    let mut stream = IndexedStream::open_with(&path, &idx, &ucs).expect("open_with");
    stream.seek(100_000, Whence::Start);
    let mut buf = vec![0u8; 500];
    assert_eq!(stream.read(&mut buf).expect("read"), 500);
    assert_eq!(&buf[..], &data[100_000..100_500]);
}

#[test]
fn writes_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let (_, path) = indexed_file(dir.path(), 5_000, 1_000);

    let mut stream = IndexedStream::open(&path).expect("open");
    assert!(matches!(stream.write(b"data"), Err(Error::Unsupported(_))));
    assert!(matches!(stream.write_str("data"), Err(Error::Unsupported(_))));
    assert!(matches!(stream.write_byte(1), Err(Error::Unsupported(_))));
    assert!(matches!(stream.flush(), Err(Error::Unsupported(_))));
}

#[test]
fn in_memory_index_shared_between_handles() {
    let data = sample(200_000);
    let compressed = gzip(&data, Compression::default());
    let index = Arc::new(build_index(Cursor::new(&compressed), 40_000).expect("build"));

    let mut a = IndexedStream::with_index(Cursor::new(compressed.clone()), Arc::clone(&index))
        .expect("first handle");
    let mut b = IndexedStream::with_index(Cursor::new(compressed), Arc::clone(&index))
        .expect("second handle");
    a.seek(10_000, Whence::Start);
    b.seek(190_000, Whence::Start);

    let mut buf = [0u8; 256];
    a.read(&mut buf).expect("read a");
    assert_eq!(&buf[..], &data[10_000..10_256]);
    b.read(&mut buf).expect("read b");
    assert_eq!(&buf[..], &data[190_000..190_256]);
}

#[test]
fn handle_from_parts_reads_lazy_windows() {
    let data = sample(90_000);
    let compressed = gzip(&data, Compression::default());
    let index = build_index(Cursor::new(&compressed), 20_000).expect("build");
    let mut idx = Vec::new();
    let mut ucs = Vec::new();
    write_index(&index, &mut idx, &mut ucs).expect("write");

    let mut stream = IndexedStream::from_parts(
        Cursor::new(compressed),
        Cursor::new(idx),
        Cursor::new(ucs),
    )
    .expect("from_parts");
    stream.seek(-300, Whence::End);
    let mut tail = Vec::new();
    Read::read_to_end(&mut stream, &mut tail).expect("read tail");
    assert_eq!(tail, &data[data.len() - 300..]);
}
