//! Splitting keyword lists into provider-sized batches.

use keyplan_shared::{KeyplanError, Result};

/// Split `keywords` into ordered batches of at most `limit` entries.
///
/// Every keyword lands in exactly one batch and relative order is kept.
/// An empty input yields no batches.
pub fn chunk_keywords(keywords: &[String], limit: usize) -> Result<Vec<Vec<String>>> {
    if limit == 0 {
        return Err(KeyplanError::validation("batch size limit must be positive"));
    }

    Ok(keywords.chunks(limit).map(<[String]>::to_vec).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("kw-{i:03}")).collect()
    }

    #[test]
    fn empty_input_yields_no_batches() {
        assert!(chunk_keywords(&[], 20).unwrap().is_empty());
    }

    #[test]
    fn batch_count_is_ceiling_of_n_over_limit() {
        for n in [1, 19, 20, 21, 40, 41, 97] {
            let batches = chunk_keywords(&keywords(n), 20).unwrap();
            assert_eq!(batches.len(), n.div_ceil(20), "n = {n}");
            assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= 20));
        }
    }

    #[test]
    fn batches_cover_input_once_in_order() {
        let input = keywords(45);
        let batches = chunk_keywords(&input, 20).unwrap();
        assert_eq!(batches[0].len(), 20);
        assert_eq!(batches[1].len(), 20);
        assert_eq!(batches[2].len(), 5);

        let flattened: Vec<String> = batches.into_iter().flatten().collect();
        assert_eq!(flattened, input);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let err = chunk_keywords(&keywords(3), 0).unwrap_err();
        assert!(err.to_string().contains("must be positive"));
    }
}
