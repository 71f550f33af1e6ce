use tracing::{debug, info};

use crate::config::SplitOptions;
use crate::decoder::RecordSource;
use crate::error::{Error, Result};
use crate::output::ShardOutput;
use crate::record::Record;
use crate::shard::{Shard, ShardSummary};

/// Totals of one split.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitReport {
  /// Finalized shards, in index order.
  pub shards: Vec<ShardSummary>,
  pub records_read: u64,
  pub records_written: u64,
  pub records_skipped: u64,
}

impl SplitReport {
  /// Number of `part<N>.rdb` containers produced.
  pub fn parts(&self) -> u32 {
    self.shards.len() as u32
  }

  pub fn bytes_written(&self) -> u64 {
    self.shards.iter().map(|s| s.bytes_written).sum()
  }
}

/// Routes records into size-bounded shards.
///
/// Exactly one shard is open at a time. A record goes to a new shard when it
/// would push the active one past `target_size`, unless the active shard is
/// still empty: a record larger than the target gets a shard of its own.
pub struct Splitter<O: ShardOutput> {
  output: O,
  target_size: u64,
  // None only while rotating or after an error.
  active: Option<Shard<O::Writer>>,
  report: SplitReport,
}

impl<O: ShardOutput> Splitter<O> {
  /// Opens shard 1 right away, so even an empty source produces one container.
  pub fn new(output: O, options: &SplitOptions) -> Result<Self> {
    if options.target_size == 0 {
      return Err(Error::Config("target size must be > 0".into()));
    }
    let mut splitter = Self {
      output,
      target_size: options.target_size,
      active: None,
      report: SplitReport::default(),
    };
    splitter.open_shard(1)?;
    Ok(splitter)
  }

  /// Index of the shard currently receiving records.
  pub fn active_index(&self) -> Option<u32> {
    self.active.as_ref().map(Shard::index)
  }

  /// Creates shard `index` and makes it the active one.
  fn open_shard(&mut self, index: u32) -> Result<()> {
    let writer = self.output.create(index)?;
    let shard = Shard::open(index, writer)?;
    debug!(target: "rdbsplit", shard = index, "Opened {}", self.output.location(index));
    self.active = Some(shard);
    Ok(())
  }

  fn active_shard(&mut self) -> Result<&mut Shard<O::Writer>> {
    self
      .active
      .as_mut()
      .ok_or_else(|| Error::Config("splitter has no open shard".into()))
  }

  fn close_active(&mut self) -> Result<u32> {
    let shard = self
      .active
      .take()
      .ok_or_else(|| Error::Config("splitter has no open shard".into()))?;
    let summary = shard.finalize()?;
    info!(
      target: "rdbsplit",
      shard = summary.index,
      records = summary.records,
      bytes = summary.bytes_written,
      "Finished {}",
      self.output.location(summary.index)
    );
    let index = summary.index;
    self.report.shards.push(summary);
    Ok(index)
  }

  /// Routes one record into the active shard, rotating first when needed.
  pub fn process(&mut self, record: Record) -> Result<()> {
    let target = self.target_size;
    let shard = self.active_shard()?;
    let accumulated = shard.accumulated_size();
    if accumulated > 0 && accumulated.saturating_add(record.size) > target {
      let closed = self.close_active()?;
      self.open_shard(closed + 1)?;
    }

    let shard = self.active_shard()?;
    shard.enter_db(record.db)?;
    let written = shard.write(&record)?;
    shard.add_size(record.size);

    self.report.records_read += 1;
    if written {
      self.report.records_written += 1;
    } else {
      self.report.records_skipped += 1;
    }
    Ok(())
  }

  /// Writes the trailer of the active shard and returns the totals.
  pub fn finalize(mut self) -> Result<SplitReport> {
    self.close_active()?;
    Ok(self.report)
  }

  /// Feeds every record of `source` through [`Splitter::process`], then
  /// finalizes. On error the active shard is dropped without a trailer.
  pub fn run<S: RecordSource>(mut self, source: &mut S) -> Result<SplitReport> {
    source.parse(|record| {
      self.process(record)?;
      Ok(true)
    })?;
    self.finalize()
  }
}
