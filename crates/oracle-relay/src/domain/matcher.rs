//! Request matching
//!
//! Selects the oracles that are expected to answer a request. Pure function
//! over the pool, no I/O.

use crate::domain::oracle::{OracleIdentity, RegisteredOraclePool};

/// Every oracle whose index triple contains `request_index`, in pool order.
///
/// An empty result is a normal outcome.
pub fn match_oracles(pool: &RegisteredOraclePool, request_index: u8) -> Vec<&OracleIdentity> {
    pool.iter().filter(|o| o.serves(request_index)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::oracle::{IndexTriple, OracleHandle, INDEX_BOUND};
    use proptest::prelude::*;

    fn pool_of(triples: &[[u8; 3]]) -> RegisteredOraclePool {
        let mut pool = RegisteredOraclePool::new();
        for (i, triple) in triples.iter().enumerate() {
            pool.insert(OracleIdentity::new(
                OracleHandle::new(format!("0x{:02}", i + 1)),
                IndexTriple::new(*triple).unwrap(),
            ))
            .unwrap();
        }
        pool
    }

    #[test]
    fn test_matches_shared_index() {
        let pool = pool_of(&[[1, 4, 7], [2, 4, 9], [3, 5, 7]]);
        let matched: Vec<_> = match_oracles(&pool, 4)
            .into_iter()
            .map(|o| o.handle.as_str())
            .collect();
        assert_eq!(matched, vec!["0x01", "0x02"]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let pool = pool_of(&[[1, 4, 7], [2, 4, 9], [3, 5, 7]]);
        assert!(match_oracles(&pool, 8).is_empty());
        assert!(match_oracles(&RegisteredOraclePool::new(), 4).is_empty());
    }

    fn distinct_triple() -> impl Strategy<Value = [u8; 3]> {
        proptest::sample::subsequence((0..INDEX_BOUND).collect::<Vec<_>>(), 3)
            .prop_shuffle()
            .prop_map(|v| [v[0], v[1], v[2]])
    }

    proptest! {
        #[test]
        fn proptest_match_is_exact_subset(
            triples in proptest::collection::vec(distinct_triple(), 0..40),
            index in 0..INDEX_BOUND,
        ) {
            let pool = pool_of(&triples);
            let matched = match_oracles(&pool, index);

            let expected: Vec<_> = pool.iter().filter(|o| o.index_triple.contains(index)).collect();
            prop_assert_eq!(&matched, &expected);
            for oracle in pool.iter() {
                let was_matched = matched.iter().any(|m| m.handle == oracle.handle);
                prop_assert_eq!(was_matched, oracle.index_triple.values().contains(&index));
            }
        }
    }
}
