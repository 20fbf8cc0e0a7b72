//! Currency helpers

/// Half-cent tolerance used when comparing currency amounts
pub const CENT_TOLERANCE: f64 = 0.005;

/// Round a currency amount to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Whether two currency amounts are equal to the cent
pub fn money_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < CENT_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(10.126), 10.13);
        assert_eq!(round2(10.124), 10.12);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn test_money_eq() {
        assert!(money_eq(10.0, 10.004));
        assert!(!money_eq(10.0, 10.01));
    }

    proptest! {
        #[test]
        fn prop_round2_is_idempotent(value in -1_000_000.0f64..1_000_000.0) {
            let once = round2(value);
            prop_assert!(money_eq(round2(once), once));
        }
    }
}
