use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;

/// Keys drawn from a small cube so inserts frequently overwrite.
fn small_key() -> impl Strategy<Value = GridKey> {
    (-8i32..8, -8i32..8, -2i32..2).prop_map(GridKey::from)
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 3)]
    Insert(#[proptest(strategy = "small_key()")] GridKey, u16),
    Get(#[proptest(strategy = "small_key()")] GridKey),
    Range(
        #[proptest(strategy = "small_key()")] GridKey,
        #[proptest(strategy = "small_key()")] GridKey,
    ),
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(any::<Op>(), 0..=1500)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        max_shrink_iters: 20_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(order in 2usize..=6, ops in ops_strategy()) {
        let mut t: FluidGrid<u16> = FluidGrid::with_order(order).unwrap();
        let mut m: BTreeMap<GridKey, u16> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    prop_assert_eq!(t.insert_key(key, value), m.insert(key, value));
                }
                Op::Get(key) => {
                    prop_assert_eq!(t.get(&key), m.get(&key));
                }
                Op::Range(a, b) => {
                    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                    let got: Vec<(GridKey, u16)> = t.range(lo..=hi).map(|(k, v)| (k, *v)).collect();
                    let expected: Vec<(GridKey, u16)> = m.range(lo..=hi).map(|(k, v)| (*k, *v)).collect();
                    prop_assert_eq!(got, expected);
                }
            }
            prop_assert_eq!(t.len(), m.len());
        }

        prop_assert_eq!(t.check_invariants(), Ok(()));
        let got: Vec<(GridKey, u16)> = t.iter().map(|(k, v)| (k, *v)).collect();
        let expected: Vec<(GridKey, u16)> = m.into_iter().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_last_write_wins(order in 2usize..=5, writes in prop::collection::vec((any::<GridKey>(), any::<i32>()), 0..=600)) {
        let mut t: FluidGrid = FluidGrid::with_order(order).unwrap();
        let mut last: BTreeMap<GridKey, i32> = BTreeMap::new();

        for (key, material_id) in writes {
            t.insert(key.x, key.y, key.z, Cell::new([0.0; 3], 0.0, material_id));
            last.insert(key, material_id);
        }

        prop_assert_eq!(t.len(), last.len());
        for (key, material_id) in &last {
            prop_assert_eq!(t.get(key).map(|c| c.material_id), Some(*material_id));
        }
        prop_assert_eq!(t.check_invariants(), Ok(()));
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys = vec![
        GridKey::new(0, 0, 0),
        GridKey::new(-1, -1, -1),
        GridKey::new(0, 0, 1),
        GridKey::new(0, 1, -5),
        GridKey::new(1, -9, 0),
        GridKey::new(-1, 2, 0),
        GridKey::new(3, 3, 3),
    ];

    for_each_permutation(&keys, |perm| {
        let mut t: FluidGrid<usize> = FluidGrid::with_order(2).unwrap();
        let mut m: BTreeMap<GridKey, usize> = BTreeMap::new();

        for (i, k) in perm.into_iter().enumerate() {
            assert_eq!(t.insert_key(k, i), m.insert(k, i));
        }

        t.check_invariants().unwrap();
        let got: Vec<(GridKey, usize)> = t.iter().map(|(k, v)| (k, *v)).collect();
        let expected: Vec<(GridKey, usize)> = m.into_iter().collect();
        assert_eq!(got, expected);
    });
}
