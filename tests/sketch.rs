//! End-to-end property tests for the sketch: accuracy, merge semantics and
//! serialization round-trips.

use cardinality_sketch::{HashWidth, HllError, HyperLogLog, Mode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use test_case::test_case;

#[test_case(HashWidth::W32)]
#[test_case(HashWidth::W64)]
fn test_known_distinct_count_accuracy(width: HashWidth) {
    let mut sketch: HyperLogLog = HyperLogLog::new(14, width).unwrap();
    let n = 10_000u64;
    for i in 0..n {
        sketch.insert(&i);
    }

    let estimate = sketch.estimate();
    let relative_error = (estimate - n as f64).abs() / n as f64;
    // Allow 3x the expected standard error of 1.04 / sqrt(2^14).
    assert!(
        relative_error <= 3.0 * sketch.standard_error(),
        "estimate {estimate} too far from {n} (relative error {relative_error})"
    );
}

#[test]
fn test_monotonicity() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut sketch: HyperLogLog = HyperLogLog::new(12, HashWidth::W64).unwrap();
    let mut previous = 0.0;
    for _ in 0..2_000 {
        sketch.insert(&rng.gen::<u64>());
        let current = sketch.estimate();
        assert!(
            current >= previous,
            "estimate decreased from {previous} to {current}"
        );
        previous = current;
    }
}

#[test]
fn test_duplicate_insensitivity() {
    let mut sketch: HyperLogLog = HyperLogLog::new(12, HashWidth::W64).unwrap();
    sketch.insert("repeated element");
    let baseline = sketch.estimate();

    for _ in 0..1_000 {
        sketch.insert("repeated element");
    }
    assert_eq!(sketch.estimate(), baseline);
    assert_eq!(sketch.count(), 1);
}

/// Merging shard sketches must equal feeding the union of their elements into
/// a single sketch, regardless of partitioning or merge order.
#[test_case(300; "sparse result")]
#[test_case(20_000; "dense result")]
fn test_merge_equals_union(n: u64) {
    let mut rng = StdRng::seed_from_u64(42);
    let elements: Vec<u64> = (0..n).map(|_| rng.gen()).collect();

    let mut reference: HyperLogLog = HyperLogLog::new(12, HashWidth::W64).unwrap();
    for element in &elements {
        reference.insert(element);
    }

    // Partition over three shards by element value.
    let mut shards: Vec<HyperLogLog> = (0..3)
        .map(|_| HyperLogLog::new(12, HashWidth::W64).unwrap())
        .collect();
    for element in &elements {
        shards[(element % 3) as usize].insert(element);
    }

    // Left-to-right fold.
    let mut forward = shards[0].clone();
    forward.merge(&shards[1]).unwrap();
    forward.merge(&shards[2]).unwrap();
    assert_eq!(forward.to_bytes(), reference.to_bytes());
    // The incremental harmonic sum can differ from the reference in the last
    // ulp depending on update order.
    let difference = (forward.estimate() - reference.estimate()).abs();
    assert!(difference <= 1e-9 * reference.estimate().max(1.0));

    // Opposite order gives the identical register state: merge is
    // associative and commutative.
    let mut backward = shards[2].clone();
    backward.merge(&shards[1]).unwrap();
    backward.merge(&shards[0]).unwrap();
    assert_eq!(backward.to_bytes(), reference.to_bytes());
}

#[test]
fn test_merge_idempotent_and_empty_identity() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut sketch: HyperLogLog = HyperLogLog::new(10, HashWidth::W64).unwrap();
    for _ in 0..5_000u64 {
        sketch.insert(&rng.gen::<u64>());
    }

    let before = sketch.to_bytes();
    let copy = sketch.clone();
    sketch.merge(&copy).unwrap();
    assert_eq!(sketch.to_bytes(), before);

    let empty = HyperLogLog::new(10, HashWidth::W64).unwrap();
    sketch.merge(&empty).unwrap();
    assert_eq!(sketch.to_bytes(), before);
}

#[test]
fn test_precision_mismatch_rejection() {
    let mut a: HyperLogLog = HyperLogLog::new(12, HashWidth::W64).unwrap();
    let b = HyperLogLog::new(13, HashWidth::W64).unwrap();
    assert!(matches!(
        a.merge(&b),
        Err(HllError::PrecisionMismatch { .. })
    ));

    let mut c: HyperLogLog = HyperLogLog::new(12, HashWidth::W32).unwrap();
    let d = HyperLogLog::new(12, HashWidth::W64).unwrap();
    assert!(matches!(
        c.merge(&d),
        Err(HllError::PrecisionMismatch { .. })
    ));
}

#[test_case(0; "empty")]
#[test_case(50; "sparse")]
#[test_case(50_000; "dense")]
fn test_serialization_round_trip(n: u64) {
    let mut rng = StdRng::seed_from_u64(11);
    let mut sketch: HyperLogLog = HyperLogLog::new(12, HashWidth::W64).unwrap();
    for _ in 0..n {
        sketch.insert(&rng.gen::<u64>());
    }

    let bytes = sketch.to_bytes();
    let restored = HyperLogLog::from_bytes(&bytes).unwrap();
    assert_eq!(restored, sketch);
    assert_eq!(restored.mode(), sketch.mode());
    assert_eq!(restored.to_bytes(), bytes);

    // Decoding rebuilds the harmonic sum from the registers, so allow for
    // rounding differences against the incrementally maintained one.
    let difference = (restored.estimate() - sketch.estimate()).abs();
    assert!(difference <= 1e-9 * sketch.estimate().max(1.0));
}

#[test]
fn test_deserialized_sketch_remains_usable() {
    let mut sketch: HyperLogLog = HyperLogLog::new(12, HashWidth::W64).unwrap();
    for i in 0..500u64 {
        sketch.insert(&i);
    }

    let mut restored: HyperLogLog = HyperLogLog::from_bytes(&sketch.to_bytes()).unwrap();
    for i in 500..1_000u64 {
        restored.insert(&i);
        sketch.insert(&i);
    }
    assert_eq!(restored.to_bytes(), sketch.to_bytes());
}

#[test]
fn test_sparse_dense_equivalence() {
    // Same elements, one sketch left sparse and one forced dense from the
    // start: estimates agree before promotion.
    let mut rng = StdRng::seed_from_u64(23);
    let mut sparse: HyperLogLog = HyperLogLog::new(12, HashWidth::W64).unwrap();
    let mut dense: HyperLogLog = HyperLogLog::new_dense(12, HashWidth::W64).unwrap();

    for _ in 0..1_000u64 {
        let element = rng.gen::<u64>();
        sparse.insert(&element);
        dense.insert(&element);
    }
    assert_eq!(sparse.mode(), Mode::Sparse);
    assert_eq!(dense.mode(), Mode::Dense);

    let difference = (sparse.estimate() - dense.estimate()).abs();
    assert!(
        difference <= 1e-9 * dense.estimate().max(1.0),
        "sparse estimate {} diverged from dense estimate {}",
        sparse.estimate(),
        dense.estimate()
    );
}

#[test]
fn test_malformed_encodings_rejected() {
    let mut sketch: HyperLogLog = HyperLogLog::new(12, HashWidth::W64).unwrap();
    for i in 0..100u64 {
        sketch.insert(&i);
    }
    let valid = sketch.to_bytes();

    // Sanity check the baseline before corrupting it.
    let baseline: Result<HyperLogLog, HllError> = HyperLogLog::from_bytes(&valid);
    assert!(baseline.is_ok());

    let corrupt = |mutate: &dyn Fn(&mut Vec<u8>)| -> Result<HyperLogLog, HllError> {
        let mut bytes = valid.clone();
        mutate(&mut bytes);
        HyperLogLog::from_bytes(&bytes)
    };

    // Bad magic.
    assert!(matches!(
        corrupt(&|b| b[0] = b'X'),
        Err(HllError::MalformedEncoding(_))
    ));
    // Unsupported version.
    assert!(matches!(
        corrupt(&|b| b[2] = 99),
        Err(HllError::MalformedEncoding(_))
    ));
    // Precision outside range.
    assert!(matches!(
        corrupt(&|b| b[3] = 25),
        Err(HllError::MalformedEncoding(_))
    ));
    // Unknown width tag.
    assert!(matches!(
        corrupt(&|b| b[4] = 33),
        Err(HllError::MalformedEncoding(_))
    ));
    // Unknown mode tag.
    assert!(matches!(
        corrupt(&|b| b[5] = 2),
        Err(HllError::MalformedEncoding(_))
    ));
    // Truncated payload.
    assert!(matches!(
        corrupt(&|b| {
            b.pop();
        }),
        Err(HllError::MalformedEncoding(_))
    ));
    // Trailing garbage.
    assert!(matches!(
        corrupt(&|b| b.push(0xff)),
        Err(HllError::MalformedEncoding(_))
    ));
    // Empty input.
    let empty: Result<HyperLogLog, HllError> = HyperLogLog::from_bytes(&[]);
    assert!(matches!(empty, Err(HllError::MalformedEncoding(_))));
}

#[test]
fn test_malformed_dense_register_rejected() {
    let mut sketch: HyperLogLog = HyperLogLog::new_dense(4, HashWidth::W64).unwrap();
    sketch.insert(&1u64);
    let mut bytes = sketch.to_bytes();

    // Rank 61 exceeds w - p = 60 for p = 4 / W64.
    let last = bytes.len() - 1;
    bytes[last] = 61;
    let decoded: Result<HyperLogLog, HllError> = HyperLogLog::from_bytes(&bytes);
    assert!(matches!(decoded, Err(HllError::MalformedEncoding(_))));
}
