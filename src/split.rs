use std::fs;
use std::path::Path;

use tracing::{error, info, warn};

use crate::config::SplitOptions;
use crate::decoder::Decoder;
use crate::error::{Error, Result};
use crate::output::{self, DirOutput};
use crate::source::SourceReader;
use crate::splitter::{SplitReport, Splitter};

/// Splits the snapshot at `path` into `part<N>.rdb` files under
/// `options.output_dir`.
///
/// The options are validated against the source size before the output
/// directory is touched.
pub fn split_file(path: &Path, options: &SplitOptions) -> Result<SplitReport> {
  let source_size = fs::metadata(path)
    .map_err(|e| Error::Config(format!("cannot read source {}: {}", path.display(), e)))?
    .len();
  options.validate(source_size)?;

  let reader = SourceReader::open(path, options)
    .map_err(|e| Error::Config(format!("cannot open source {}: {}", path.display(), e)))?;

  warn!(
    target: "rdbsplit",
    "Splitting {} ({} bytes) into {} with a target of {} bytes per part",
    path.display(),
    source_size,
    options.output_dir.display(),
    options.target_size
  );

  let output = DirOutput::new(options)?;
  let splitter = Splitter::new(output, options)?;
  let mut decoder = Decoder::new(reader).verify_checksum(options.verify_checksum);

  let report = match splitter.run(&mut decoder) {
    Ok(report) => report,
    Err(e) => {
      error!(target: "rdbsplit", offset = decoder.position(), "Failed to split {}: {}", path.display(), e);
      return Err(e);
    }
  };

  output::warn_stale(&options.output_dir, report.parts())?;
  info!(
    target: "rdbsplit",
    version = decoder.version(),
    records = report.records_read,
    skipped = report.records_skipped,
    "Done splitting RDB file into {} parts.",
    report.parts()
  );
  Ok(report)
}
