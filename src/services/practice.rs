use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::db::models::VocabularyItem;

pub(crate) const DEFAULT_TEST_SIZE: usize = 10;

/// Correct when the trimmed answer is non-empty and contains, or is contained in, the
/// primary meaning.
pub(crate) fn judge_answer(answer: &str, expected: &str) -> bool {
    let answer = answer.trim();
    let expected = expected.trim();
    if answer.is_empty() || expected.is_empty() {
        return false;
    }
    answer.contains(expected) || expected.contains(answer)
}

/// Random sample of up to `size` items. A seed makes the draw reproducible.
pub(crate) fn sample_test_pool(
    items: &[VocabularyItem],
    size: usize,
    seed: Option<u64>,
) -> Vec<VocabularyItem> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    items.choose_multiple(&mut rng, size.min(items.len())).cloned().collect()
}
