//! Pure key arithmetic for the implicit addressing scheme
//!
//! Every key, written in `nbits`-bit binary, names both a data point and a
//! canonical slot in a perfect binary tree: a key with `h` trailing zero
//! bits sits at height `h` and terminates the interval of width `2^h`
//! ending at the key. Navigation is arithmetic on the key itself; no
//! separate node identities exist.

use super::TreeError;

/// Height of a key: the number of trailing zero bits.
///
/// Odd keys are leaves (height 0); the canonical root `2^(nbits-1)` has
/// height `nbits - 1`. Key 0 has no canonical slot and is rejected.
pub fn height(x: u64) -> Result<u32, TreeError> {
    if x == 0 {
        return Err(TreeError::NullKey);
    }
    Ok(x.trailing_zeros())
}

/// Canonical ancestor of `x` at height `i`: clear the bits below `i`, then
/// set bit `i`.
#[inline]
pub fn ancestor_at(x: u64, i: u32) -> u64 {
    debug_assert!(i < 64);
    (x >> i << i) | (1 << i)
}

/// Lowest canonical node whose interval contains both `x` and `y`.
///
/// Scans upward from `max(height(x), height(y))`, returning the first
/// height at which the two masked-and-set addresses coincide. For keys
/// inside the `nbits` universe the scan meets at the root at the latest;
/// escaping it means the structure's key arithmetic is broken.
pub fn common_ancestor(x: u64, y: u64, nbits: u32) -> Result<u64, TreeError> {
    if x == y {
        return Ok(x);
    }
    let mut i = height(x)?.max(height(y)?);
    while i < nbits {
        let ax = ancestor_at(x, i);
        let ay = ancestor_at(y, i);
        if ax == ay {
            return Ok(ax);
        }
        i += 1;
    }
    Err(TreeError::Internal(format!(
        "common-ancestor search for {x} and {y} escaped the {nbits}-bit universe"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn height_counts_trailing_zeros() {
        assert_eq!(height(1).unwrap(), 0);
        assert_eq!(height(5342).unwrap(), 1);
        assert_eq!(height(8192).unwrap(), 13);
        assert_eq!(height(0).unwrap_err(), TreeError::NullKey);
    }

    #[test_case(5342, 13, 8192; "root of a 14-bit universe")]
    #[test_case(5342, 12, 4096; "left half")]
    #[test_case(5342, 11, 6144; "ancestor above the key")]
    #[test_case(5342, 1, 5342; "the key's own slot")]
    #[test_case(7, 0, 7; "leaf is its own height-0 ancestor")]
    fn ancestor_masking(x: u64, i: u32, expected: u64) {
        assert_eq!(ancestor_at(x, i), expected);
    }

    #[test]
    fn common_ancestor_of_adjacent_keys() {
        assert_eq!(common_ancestor(2, 3, 2).unwrap(), 2);
        assert_eq!(common_ancestor(1, 3, 2).unwrap(), 2);
    }

    #[test]
    fn common_ancestor_across_halves() {
        // 1234 and 5678 first share an address at height 12.
        assert_eq!(common_ancestor(1234, 5678, 14).unwrap(), 4096);
        // A key can be the ancestor of its own neighbour.
        assert_eq!(common_ancestor(1234, 1236, 14).unwrap(), 1236);
        assert_eq!(common_ancestor(1234, 1238, 14).unwrap(), 1236);
    }

    #[test]
    fn common_ancestor_is_symmetric() {
        for &(a, b) in &[(1u64, 2u64), (100, 7000), (5342, 5343), (1, 16383)] {
            assert_eq!(
                common_ancestor(a, b, 14).unwrap(),
                common_ancestor(b, a, 14).unwrap()
            );
        }
    }

    #[test]
    fn equal_keys_are_their_own_ancestor() {
        assert_eq!(common_ancestor(5342, 5342, 14).unwrap(), 5342);
    }
}
