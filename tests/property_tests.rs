use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use pefseq::Sequence;

fn sorted(mut values: Vec<u64>) -> Vec<u64> {
    values.sort_unstable();
    values
}

proptest! {
    #[test]
    fn roundtrip_and_block_locality(
        values in prop::collection::vec(0..100_000u64, 0..400).prop_map(sorted),
        block_size in 1..64u32,
    ) {
        let seq = Sequence::from_values(&values, block_size).unwrap();
        prop_assert_eq!(seq.len(), values.len());
        prop_assert_eq!(
            seq.num_blocks(),
            values.len().div_ceil(block_size as usize)
        );
        prop_assert_eq!(seq.decode(), values.clone());

        // Concatenated per-block decode equals the input.
        let mut concat = Vec::new();
        for i in 0..seq.num_blocks() {
            concat.extend(seq.decode_block(i).unwrap());
        }
        prop_assert_eq!(concat, values.clone());

        // Random access agrees with the input at every position.
        for (i, &v) in values.iter().enumerate() {
            prop_assert_eq!(seq.get(i).unwrap(), v);
        }
        prop_assert!(seq.get(values.len()).is_err());
    }

    #[test]
    fn serialization_idempotence(
        values in prop::collection::vec(0..1_000_000u64, 0..300).prop_map(sorted),
        block_size in 1..128u32,
    ) {
        let seq = Sequence::from_values(&values, block_size).unwrap();
        let bytes = seq.serialize();
        let back = Sequence::deserialize(&bytes).unwrap();

        prop_assert_eq!(back.decode(), seq.decode());
        prop_assert_eq!(back.get_meta(), seq.get_meta());
        prop_assert_eq!(back.block_size(), seq.block_size());
        prop_assert_eq!(back.universe(), seq.universe());
        prop_assert_eq!(back.serialize(), bytes);
    }

    #[test]
    fn set_algebra_matches_btreeset_model(
        a_raw in prop::collection::btree_set(0..5_000u64, 0..200),
        b_raw in prop::collection::btree_set(0..5_000u64, 0..200),
    ) {
        let av: Vec<u64> = a_raw.iter().copied().collect();
        let bv: Vec<u64> = b_raw.iter().copied().collect();
        let a = Sequence::from_values(&av, 16).unwrap();
        let b = Sequence::from_values(&bv, 16).unwrap();

        let inter: Vec<u64> = a_raw.intersection(&b_raw).copied().collect();
        let uni: Vec<u64> = a_raw.union(&b_raw).copied().collect();
        let diff: Vec<u64> = a_raw.difference(&b_raw).copied().collect();

        prop_assert_eq!((&a & &b).decode(), inter);
        prop_assert_eq!((&a | &b).decode(), uni);
        prop_assert_eq!((&a - &b).decode(), diff);
    }

    #[test]
    fn unique_matches_dedup_model(
        values in prop::collection::vec(0..500u64, 0..300).prop_map(sorted),
    ) {
        let seq = Sequence::from_values(&values, 8).unwrap();
        let mut model = values.clone();
        model.dedup();
        prop_assert_eq!(seq.unique().decode(), model);
    }

    #[test]
    fn filter_by_count_matches_multiplicity_model(
        values in prop::collection::vec(0..100u64, 0..300).prop_map(sorted),
        lo in 1..4usize,
        span in 0..4usize,
    ) {
        let hi = lo + span;
        let seq = Sequence::from_values(&values, 8).unwrap();

        let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
        for &v in &values {
            *counts.entry(v).or_default() += 1;
        }

        let mut multiset_model = Vec::new();
        let mut set_model = Vec::new();
        for (&v, &c) in &counts {
            if (lo..=hi).contains(&c) {
                multiset_model.extend(std::iter::repeat(v).take(c));
                set_model.push(v);
            }
        }

        prop_assert_eq!(
            seq.filter_by_count(lo, hi, true).unwrap().decode(),
            multiset_model
        );
        prop_assert_eq!(
            seq.filter_by_count(lo, hi, false).unwrap().decode(),
            set_model
        );
    }

    #[test]
    fn intersect_multiset_multiplicities(
        values in prop::collection::vec(0..50u64, 0..200),
        others in prop::collection::vec(0..50u64, 0..200),
    ) {
        let av = sorted(values);
        let bv = sorted(others);
        let a = Sequence::from_values(&av, 8).unwrap();
        let b = Sequence::from_values(&bv, 8).unwrap();

        let mut ca: BTreeMap<u64, usize> = BTreeMap::new();
        for &v in &av { *ca.entry(v).or_default() += 1; }
        let mut cb: BTreeMap<u64, usize> = BTreeMap::new();
        for &v in &bv { *cb.entry(v).or_default() += 1; }

        let mut model = Vec::new();
        for (&v, &n) in &ca {
            if let Some(&m) = cb.get(&v) {
                model.extend(std::iter::repeat(v).take(n.min(m)));
            }
        }
        prop_assert_eq!(a.intersect(&b).decode(), model);
    }
}

// Deterministic pseudo-random values (splitmix64).
fn pseudo_random_sorted(n: usize, modulus: u64, seed: u64) -> Vec<u64> {
    let mut state = seed;
    let mut out: Vec<u64> = (0..n)
        .map(|_| {
            state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
            let mut z = state;
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            (z ^ (z >> 31)) % modulus
        })
        .collect();
    out.sort_unstable();
    out
}

#[test]
fn reference_scenario_4096_values_32_blocks() {
    let _ = env_logger::builder().is_test(true).try_init();
    let values = pseudo_random_sorted(4096, 1 << 16, 42);
    let seq = Sequence::from_values(&values, 128).unwrap();

    assert_eq!(seq.len(), 4096);
    assert_eq!(seq.num_blocks(), 32);
    assert_eq!(seq.decode_block(0).unwrap(), &values[..128]);
    assert_eq!(seq.decode(), values);
}

#[test]
fn difference_after_unique_on_both_operands() {
    let a = Sequence::from_values(&pseudo_random_sorted(500, 400, 1), 16).unwrap();
    let b = Sequence::from_values(&pseudo_random_sorted(300, 400, 2), 16).unwrap();
    let (ua, ub) = (a.unique(), b.unique());

    let sa: BTreeSet<u64> = ua.decode().into_iter().collect();
    let sb: BTreeSet<u64> = ub.decode().into_iter().collect();
    let model: Vec<u64> = sa.difference(&sb).copied().collect();

    assert_eq!((&ua - &ub).decode(), model);
}

#[test]
fn state_capture_restore_is_behaviorally_identical() {
    let values = pseudo_random_sorted(1333, 1 << 20, 9);
    let seq = Sequence::from_values(&values, 128).unwrap();

    // Opaque export/import, as a host process boundary would use it.
    let state = seq.serialize();
    let restored = Sequence::deserialize(&state).unwrap();

    assert_eq!(restored.decode(), seq.decode());
    assert_eq!(restored.get_meta(), seq.get_meta());
    for i in (0..values.len()).step_by(97) {
        assert_eq!(restored.get(i).unwrap(), seq.get(i).unwrap());
    }
}
