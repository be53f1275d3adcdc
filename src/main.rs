//! matrix2vcf: converts a directory of per-sample call arrays into a VCF.
//!
//! matrix2vcf seq_5_5/ Chr5.vcf.gz Chr5

use anyhow::{Context, Result};
use clap::Parser;
use genomics_vcf::pipeline::Pipeline;
use genomics_vcf::progress::LogObserver;
use genomics_vcf::DEFAULT_CHUNK_SIZE;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "matrix2vcf",
    version,
    about = "Convert a per-sample genotype call matrix into a VCF"
)]
struct Cli {
    /// Array store directory, one file of single byte calls per sample
    input: PathBuf,

    /// Output VCF; gzip compressed when the name ends in .gz
    output: PathBuf,

    /// Chromosome or contig label written to every record
    chrom: String,

    /// Positions read from the store per window
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Array holding the reference calls (default: last array in sorted order)
    #[arg(long)]
    reference: Option<String>,

    /// Path of the intermediate table (default: derived from the output path)
    #[arg(long, conflicts_with = "pipelined")]
    intermediate: Option<PathBuf>,

    /// Keep the intermediate table after a run
    #[arg(long, conflicts_with = "pipelined")]
    keep_intermediate: bool,

    /// Stream windows straight to the encoder instead of through a table on disk
    #[arg(long)]
    pipelined: bool,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut pipeline = Pipeline::new(&cli.input, &cli.output, &cli.chrom);
    pipeline
        .chunk_size(cli.chunk_size)
        .reference(cli.reference.as_deref())
        .keep_intermediate(cli.keep_intermediate)
        .pipelined(cli.pipelined);
    if let Some(path) = &cli.intermediate {
        pipeline.intermediate(path);
    }

    let summary = pipeline.run(&mut LogObserver).with_context(|| {
        format!(
            "failed to convert {} to {}",
            cli.input.display(),
            cli.output.display()
        )
    })?;

    tracing::info!(
        rows = summary.rows,
        records = summary.records,
        skipped = summary.skipped,
        "wrote {}",
        cli.output.display()
    );
    Ok(())
}
