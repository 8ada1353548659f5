use std::{
    fs,
    io::{self, BufRead, Write},
};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use gtidx::{DEFAULT_INDEX_RATE, DEFAULT_MAX_LOOKAHEAD, IndexBuilder, LocusIndex, decode_locus};
use log::info;

#[derive(Parser)]
#[clap(version, about = "Build and query locus indexes of sorted genomic text files")]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the index of a sorted source file
    Build(BuildArgs),

    /// Print the first line carrying a locus
    Query(QueryArgs),

    /// Summarize the index of a source file
    Info(InfoArgs),
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Source file to index
    #[clap(required = true)]
    input: String,

    /// Zero-based chromosome column
    #[clap(short = 'c', long, default_value_t = 0)]
    chrom_col: usize,

    /// Zero-based position column
    #[clap(short = 'p', long, default_value_t = 1)]
    pos_col: usize,

    /// Field delimiter
    #[clap(short = 'd', long, default_value = "\t")]
    delimiter: String,

    /// Number of header lines to skip
    #[clap(short = 's', long, default_value_t = 0)]
    skip_lines: usize,

    /// Skip leading lines starting with this prefix
    #[clap(short = 'i', long)]
    ignore_startswith: Option<String>,

    /// Approximate fraction of lines to index [1: dense]
    #[clap(short = 'r', long, default_value_t = DEFAULT_INDEX_RATE)]
    index_rate: f64,

    /// Maximum repeated-locus lines skipped per sparse probe
    #[clap(long, default_value_t = DEFAULT_MAX_LOOKAHEAD)]
    max_lookahead: usize,
}

#[derive(clap::Args)]
struct QueryArgs {
    /// Indexed source file
    #[clap(required = true)]
    input: String,

    /// Chromosome label (a leading "chr" is ignored)
    #[clap(required = true)]
    chrom: String,

    /// Position
    #[clap(required = true)]
    pos: u64,
}

#[derive(clap::Args)]
struct InfoArgs {
    /// Indexed source file
    #[clap(required = true)]
    input: String,

    /// Also print every entry
    #[clap(short = 'e', long)]
    entries: bool,
}

fn build(args: &BuildArgs) -> Result<()> {
    let mut builder = IndexBuilder::new(args.chrom_col, args.pos_col)
        .delimiter(&args.delimiter)
        .skip_lines(args.skip_lines)
        .index_rate(args.index_rate)
        .max_lookahead(args.max_lookahead);
    if let Some(prefix) = &args.ignore_startswith {
        builder = builder.ignore_startswith(prefix);
    }

    let output = builder.build_with_stats(&args.input)?;
    let stats = output.stats;
    info!(
        "Data region: {} bytes from byte {}",
        stats.data_bytes, stats.data_start
    );
    if let Some(seek_jump) = stats.seek_jump {
        info!(
            "Estimated {:.0} lines of {:.1} bytes, stride {} bytes",
            stats.approx_line_count, stats.mean_line_length, seek_jump
        );
    }
    if stats.capped_probes > 0 {
        info!("{} probes hit the lookahead limit", stats.capped_probes);
    }
    println!("{}", output.sidecar.display());
    Ok(())
}

fn query(args: &QueryArgs) -> Result<()> {
    let index = LocusIndex::open(&args.input)?;
    let mut reader = fs::File::open(&args.input).map(io::BufReader::new)?;

    if !index.goto(&mut reader, &args.chrom, args.pos)? {
        bail!("Locus {}:{} not found in {}", args.chrom, args.pos, args.input);
    }

    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(&line)?;
    if !line.ends_with(b"\n") {
        stdout.write_all(b"\n")?;
    }
    Ok(())
}

fn summarize(args: &InfoArgs) -> Result<()> {
    let index = LocusIndex::open(&args.input)?;
    let metadata = index.metadata();

    let mut writer = io::BufWriter::new(io::stdout());
    writeln!(writer, "Entries: {}", index.len())?;
    writeln!(writer, "Index rate: {}", metadata.index_rate)?;
    writeln!(writer, "Source bytes: {}", metadata.source_bytes)?;
    writeln!(writer, "Delimiter: {:?}", metadata.layout.delimiter)?;
    writeln!(
        writer,
        "Columns: chrom={} pos={}",
        metadata.layout.chrom_column, metadata.layout.pos_column
    )?;
    writeln!(
        writer,
        "Chromosomes: {}",
        index.chromosomes().collect::<Vec<_>>().join(",")
    )?;

    if args.entries {
        for entry in index.entries() {
            let (code, pos) = decode_locus(entry.code);
            let chrom = metadata.chromosomes.label(code).unwrap_or("?");
            writeln!(writer, "{chrom}\t{pos}\t{}", entry.offset)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();
    match &args.command {
        Command::Build(args) => build(args),
        Command::Query(args) => query(args),
        Command::Info(args) => summarize(args),
    }
}
