mod common;
use common::{TestEnv, read_rdb, sample_records, strip};
use rdbsplit::{Error, ReadStrategy, SectionCounts, split_file};
use std::fs;

#[test]
fn test_split_file_keeps_every_record_in_order() {
  let env = TestEnv::new(2_000);
  let records = sample_records(300);
  let size = env.write_source(&records);
  assert!(size > 4 * env.options.target_size);

  let report = split_file(&env.source, &env.options).unwrap();
  assert!(report.parts() > 1);
  assert_eq!(report.records_read, 300);
  assert_eq!(report.records_written, 300);
  assert_eq!(report.records_skipped, 0);

  let parts = env.read_parts();
  assert_eq!(parts.len() as u32, report.parts());
  assert!(parts.iter().all(|p| !p.is_empty()));

  let joined: Vec<_> = parts.into_iter().flatten().collect();
  assert_eq!(strip(&joined), strip(&read_rdb(&env.source)));
}

#[test]
fn test_shards_respect_target_size() {
  let env = TestEnv::new(1_500);
  let size = env.write_source(&sample_records(200));
  assert!(size > 3_000);

  let report = split_file(&env.source, &env.options).unwrap();
  for shard in &report.shards {
    assert!(shard.records > 0);
    assert!(shard.accumulated_size <= env.options.target_size, "shard {} too big", shard.index);
  }
  let total: u64 = report.shards.iter().map(|s| s.accumulated_size).sum();
  let source_records: u64 = read_rdb(&env.source).iter().map(|r| r.size).sum();
  assert_eq!(total, source_records);
}

#[test]
fn test_mmap_and_placeholder_produce_loadable_parts() {
  let mut env = TestEnv::new(1_000);
  env.options.read_strategy = ReadStrategy::Mmap;
  env.options.section_counts = SectionCounts::Placeholder;
  env.options.compression = true;
  let records = sample_records(150);
  env.write_source(&records);

  let report = split_file(&env.source, &env.options).unwrap();
  let parts = env.read_parts();
  assert_eq!(parts.len() as u32, report.parts());
  let joined: Vec<_> = parts.into_iter().flatten().collect();
  assert_eq!(strip(&joined), strip(&records));
}

#[test]
fn test_target_at_half_source_is_rejected_before_output() {
  let mut env = TestEnv::new(0);
  let size = env.write_source(&sample_records(50));
  env.options.target_size = size / 2;

  let result = split_file(&env.source, &env.options);
  assert!(matches!(result, Err(Error::Config(_))));
  assert!(!env.options.output_dir.exists());
}

#[test]
fn test_zero_target_is_rejected() {
  let env = TestEnv::new(0);
  env.write_source(&sample_records(10));
  assert!(matches!(split_file(&env.source, &env.options), Err(Error::Config(_))));
  assert!(!env.options.output_dir.exists());
}

#[test]
fn test_missing_source_is_a_config_error() {
  let env = TestEnv::new(100);
  let result = split_file(&env.root.join("nope.rdb"), &env.options);
  assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_existing_output_dir_is_reused() {
  let env = TestEnv::new(1_000);
  env.write_source(&sample_records(100));
  fs::create_dir(&env.options.output_dir).unwrap();
  fs::write(env.options.output_dir.join("part99.rdb"), b"stale").unwrap();

  let report = split_file(&env.source, &env.options).unwrap();
  assert!(report.parts() >= 2);
  // Stale parts from earlier runs are reported, not removed.
  assert!(env.options.output_dir.join("part99.rdb").exists());
}
