use litdb_core::Error;
use litdb_vector::FlatIpIndex;
use tempfile::tempdir;

fn sample() -> FlatIpIndex {
    FlatIpIndex::build(&[
        vec![1.0, 0.0, 0.0],
        vec![0.0, 1.0, 0.0],
        vec![0.6, 0.8, 0.0],
        vec![1.0, 0.0, 0.0],
    ])
    .expect("build")
}

#[test]
fn search_orders_by_inner_product_then_row() {
    let index = sample();
    assert_eq!(index.len(), 4);
    assert_eq!(index.dim(), 3);

    let hits = index.search(&[1.0, 0.0, 0.0], 3).expect("search");
    let ids: Vec<usize> = hits.iter().map(|(id, _)| *id).collect();
    // rows 0 and 3 tie at 1.0; lower id first
    assert_eq!(ids, vec![0, 3, 2]);
    assert!((hits[2].1 - 0.6).abs() < 1e-6);
}

#[test]
fn k_larger_than_rows_returns_all() {
    let index = sample();
    let hits = index.search(&[0.0, 1.0, 0.0], 10).expect("search");
    assert_eq!(hits.len(), 4);
    assert_eq!(hits[0].0, 1);
}

#[test]
fn dimension_mismatch_is_rejected() {
    let index = sample();
    assert!(matches!(index.search(&[1.0, 0.0], 2), Err(Error::DimensionMismatch { expected: 3, actual: 2 })));
    assert!(matches!(
        FlatIpIndex::build(&[vec![1.0, 0.0], vec![1.0]]),
        Err(Error::DimensionMismatch { expected: 2, actual: 1 })
    ));
    assert!(matches!(FlatIpIndex::build(&[]), Err(Error::EmptyCorpus)));
}

#[test]
fn file_round_trip_preserves_results() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("vectors.bin");
    let index = sample();
    index.write_to(&path).expect("write");
    let loaded = FlatIpIndex::read_from(&path).expect("read");
    assert_eq!(loaded, index);

    let q = [0.3, 0.9, 0.1];
    assert_eq!(loaded.search(&q, 4).expect("search"), index.search(&q, 4).expect("search"));
}

#[test]
fn corrupted_blob_is_detected() {
    let mut bytes = sample().to_bytes();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xff;
    assert!(matches!(FlatIpIndex::from_bytes(&bytes), Err(Error::SnapshotCorrupt(_))));

    let bytes = sample().to_bytes();
    assert!(matches!(FlatIpIndex::from_bytes(&bytes[..bytes.len() - 4]), Err(Error::SnapshotCorrupt(_))));
    assert!(matches!(FlatIpIndex::read_from(std::path::Path::new("/nonexistent/vectors.bin")), Err(Error::SnapshotCorrupt(_))));
}
