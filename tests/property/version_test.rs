// tests/property/version_test.rs

use proptest::prelude::*;
use serverhub::core::handshake::versions_compatible;

proptest! {
    #[test]
    fn test_last_digit_never_matters(prefix in 1u32..100_000, a in 0u32..10, b in 0u32..10) {
        prop_assert!(versions_compatible(prefix * 10 + a, prefix * 10 + b));
    }

    #[test]
    fn test_different_prefixes_are_incompatible(
        p in 1u32..100_000,
        q in 1u32..100_000,
        a in 0u32..10,
        b in 0u32..10,
    ) {
        prop_assume!(p != q);
        prop_assert!(!versions_compatible(p * 10 + a, q * 10 + b));
    }

    #[test]
    fn test_compatibility_is_symmetric(x in any::<u32>(), y in any::<u32>()) {
        prop_assert_eq!(versions_compatible(x, y), versions_compatible(y, x));
    }
}
