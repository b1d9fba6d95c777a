use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gzindex::{IndexPaths, IndexedStream, Whence};

const COPY_BUF: usize = 64 * 1024;

#[derive(Parser)]
#[command(name = "gzindex-cat")]
#[command(about = "Print a byte range of an indexed gzip or zlib file")]
struct Cli {
    /// Compressed input file
    input: PathBuf,

    /// Index file path (default: <input>.idx)
    #[arg(long, requires = "windows")]
    index: Option<PathBuf>,

    /// Window file path (default: <input>.idx.ucs)
    #[arg(long, requires = "index")]
    windows: Option<PathBuf>,

    /// Uncompressed offset to start at
    #[arg(long, default_value_t = 0)]
    offset: u64,

    /// Bytes to print (default: to end of data)
    #[arg(long)]
    length: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let defaults = IndexPaths::for_compressed(&cli.input);
    let index_path = cli.index.unwrap_or(defaults.index);
    let windows_path = cli.windows.unwrap_or(defaults.windows);

    let mut stream = IndexedStream::open_with(&cli.input, &index_path, &windows_path)
        .with_context(|| format!("open {} with {}", cli.input.display(), index_path.display()))?;
    let offset = i64::try_from(cli.offset).context("offset too large")?;
    stream.seek(offset, Whence::Start);

    let mut remaining = cli.length.unwrap_or(u64::MAX);
    let mut buf = vec![0u8; COPY_BUF];
    let stdout = io::stdout();
    let mut out = stdout.lock();
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = stream
            .read(&mut buf[..want])
            .with_context(|| format!("read at offset {}", stream.tell()))?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        remaining -= n as u64;
    }
    out.flush()?;
    stream.close()?;
    Ok(())
}
