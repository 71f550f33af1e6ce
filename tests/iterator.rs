mod common;
use common::{TestEnv, sample_records, strip};
use rdbsplit::{Decoder, ReadStrategy, RecordSource, SourceReader};

#[test]
fn test_decoder_reads_source_in_order() {
  let env = TestEnv::new(1_000);
  let records = sample_records(64);
  env.write_source(&records);

  let reader = SourceReader::open(&env.source, &env.options).unwrap();
  let mut decoder = Decoder::new(reader);
  let decoded: Vec<_> = decoder.by_ref().collect::<rdbsplit::Result<_>>().unwrap();

  assert_eq!(strip(&decoded), strip(&records));
  assert_eq!(decoder.version(), 9);
  assert_eq!(decoder.aux_fields()[0].0, b"redis-ver".to_vec());
  assert_eq!(decoder.position(), std::fs::metadata(&env.source).unwrap().len());
}

#[test]
fn test_record_sizes_cover_the_body() {
  let mut env = TestEnv::new(1_000);
  env.options.read_strategy = ReadStrategy::Mmap;
  env.write_source(&sample_records(40));

  let reader = SourceReader::open(&env.source, &env.options).unwrap();
  let decoded: Vec<_> = Decoder::new(reader).collect::<rdbsplit::Result<_>>().unwrap();

  // Every record reports a plausible encoded size, larger with an expiration.
  for record in &decoded {
    assert!(record.size > record.key.len() as u64);
    if record.expire_ms.is_some() {
      assert!(record.size > 9 + record.key.len() as u64);
    }
  }
}

#[test]
fn test_parse_stops_when_asked() {
  let env = TestEnv::new(1_000);
  env.write_source(&sample_records(50));

  let reader = SourceReader::open(&env.source, &env.options).unwrap();
  let mut decoder = Decoder::new(reader);
  let mut seen = Vec::new();
  decoder
    .parse(|record| {
      seen.push(record.key);
      Ok(seen.len() < 10)
    })
    .unwrap();

  assert_eq!(seen.len(), 10);
  assert_eq!(seen[9], b"key:00009".to_vec());

  // The decoder resumes where parsing stopped.
  let next = decoder.next().unwrap().unwrap();
  assert_eq!(next.key, b"key:00010".to_vec());
}
