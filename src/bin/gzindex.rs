use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use gzindex::{write_index, IndexBuilder, IndexConfig, IndexPaths, DEFAULT_SPAN};

#[derive(Parser)]
#[command(name = "gzindex")]
#[command(about = "Build a random-access index for a gzip or zlib file")]
struct Cli {
    /// Compressed input file
    input: PathBuf,

    /// Index file path (default: <input>.idx)
    #[arg(requires = "windows")]
    index: Option<PathBuf>,

    /// Window file path (default: <input>.idx.ucs)
    #[arg(requires = "index")]
    windows: Option<PathBuf>,

    /// Uncompressed bytes between access points
    #[arg(long, default_value_t = DEFAULT_SPAN)]
    span: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let defaults = IndexPaths::for_compressed(&cli.input);
    let index_path = cli.index.unwrap_or(defaults.index);
    let windows_path = cli.windows.unwrap_or(defaults.windows);

    let input = File::open(&cli.input)
        .with_context(|| format!("open {}", cli.input.display()))?;
    let config = IndexConfig::default().with_span(cli.span);
    let index = IndexBuilder::new(config)
        .build(BufReader::new(input))
        .with_context(|| format!("build index for {}", cli.input.display()))?;

    println!("Creating index files");
    let index_sink = File::create(&index_path)
        .with_context(|| format!("create {}", index_path.display()))?;
    let window_sink = File::create(&windows_path)
        .with_context(|| format!("create {}", windows_path.display()))?;
    let written = write_index(&index, BufWriter::new(index_sink), BufWriter::new(window_sink))
        .context("write index files")?;
    if written != index.len() {
        bail!("wrote {written} of {} access points", index.len());
    }

    println!("Index files created with {written} access points");
    Ok(())
}
