//! Iterator helpers.

use std::iter::Zip;

/// Like [`Iterator::zip`], but panics if the iterators have different lengths.
///
/// Used where two sequences are expected to line up one-to-one (network outputs and anchors,
/// landmarks and their mapped positions), so that a mismatch is caught instead of silently
/// truncating.
#[track_caller]
pub fn zip_exact<A, B>(a: A, b: B) -> Zip<A::IntoIter, B::IntoIter>
where
    A: IntoIterator,
    B: IntoIterator,
    A::IntoIter: ExactSizeIterator,
    B::IntoIter: ExactSizeIterator,
{
    let a = a.into_iter();
    let b = b.into_iter();
    assert_eq!(
        a.len(),
        b.len(),
        "`zip_exact` called on iterators with different lengths"
    );

    a.zip(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zips_equal_lengths() {
        let v: Vec<_> = zip_exact([1, 2], ["a", "b"]).collect();
        assert_eq!(v, [(1, "a"), (2, "b")]);
    }

    #[test]
    #[should_panic(expected = "different lengths")]
    fn panics_on_length_mismatch() {
        zip_exact([1, 2, 3], [1, 2]).for_each(drop);
    }
}
