//! `rdbsplit` command-line entry point.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::error;

use rdbsplit::{GIB, ReadStrategy, SectionCounts, SplitOptions, logging, split_file};

/// Split a Redis RDB snapshot into parts of roughly equal size
#[derive(Parser, Debug)]
#[command(name = "rdbsplit")]
#[command(version, about, long_about = None)]
struct Args {
  /// RDB file to split
  #[arg(long, default_value = "dump.rdb")]
  name: PathBuf,

  /// Target size of each part, in GB
  #[arg(long, default_value_t = 4)]
  target_size_gb: u64,

  /// Log level
  #[arg(long, value_enum, default_value_t = LogLevel::Info)]
  log: LogLevel,

  /// Directory receiving part1.rdb, part2.rdb, ...
  #[arg(long, default_value = "rdb_dir")]
  output_dir: PathBuf,

  /// What database section headers declare as key and TTL counts
  #[arg(long, value_enum, default_value_t = CountsArg::Patch)]
  section_counts: CountsArg,

  /// Memory-map the source instead of buffered reads
  #[arg(long)]
  mmap: bool,

  /// LZF-compress long strings in the parts
  #[arg(long)]
  compress: bool,

  /// Skip the CRC64 check of the source
  #[arg(long)]
  no_verify_checksum: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogLevel {
  Info,
  Debug,
  Trace,
}

impl LogLevel {
  fn as_str(self) -> &'static str {
    match self {
      LogLevel::Info => "info",
      LogLevel::Debug => "debug",
      LogLevel::Trace => "trace",
    }
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum CountsArg {
  /// True counts, patched in when a part is closed
  Patch,
  /// Zero counts
  Placeholder,
}

impl Args {
  fn options(&self) -> SplitOptions {
    let mut options = SplitOptions::new(&self.output_dir);
    options.target_size = self.target_size_gb.saturating_mul(GIB);
    options.section_counts = match self.section_counts {
      CountsArg::Patch => SectionCounts::Patch,
      CountsArg::Placeholder => SectionCounts::Placeholder,
    };
    if self.mmap {
      options.read_strategy = ReadStrategy::Mmap;
    }
    options.compression = self.compress;
    options.verify_checksum = !self.no_verify_checksum;
    options
  }
}

fn main() {
  let args = Args::parse();
  logging::init(args.log.as_str());

  if let Err(e) = split_file(&args.name, &args.options()) {
    error!(target: "rdbsplit", "{}", e);
    std::process::exit(1);
  }
}
