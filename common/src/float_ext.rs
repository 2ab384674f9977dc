pub trait FloatExt {
    fn approximately_eq(self, other: Self) -> bool;
    fn approximately_eq_eps(self, other: Self, eps: Self) -> bool;
}

impl FloatExt for f64 {
    fn approximately_eq(self, other: Self) -> bool {
        self.approximately_eq_eps(other, crate::EPSILON)
    }

    fn approximately_eq_eps(self, other: Self, eps: Self) -> bool {
        (self - other).abs() < eps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractions_compare_equal() {
        assert!((4.0_f64 / 9.0).approximately_eq(0.444_444_444_444_444_4));
        assert!((11.0_f64 / 3.0 / (25.0 / 3.0)).approximately_eq(11.0 / 25.0));
        assert!(!(7.0_f64 / 30.0).approximately_eq(0.2334));
    }

    #[test]
    fn nan_is_never_equal() {
        assert!(!f64::NAN.approximately_eq(f64::NAN));
        assert!(!f64::NAN.approximately_eq(0.0));
    }

    #[test]
    fn infinity_not_equal_to_finite() {
        assert!(!f64::INFINITY.approximately_eq(1.0));
        assert!(!1.0_f64.approximately_eq(f64::INFINITY));
    }

    #[test]
    fn custom_tolerance() {
        assert!(1.0_f64.approximately_eq_eps(1.05, 0.1));
        assert!(!1.0_f64.approximately_eq_eps(1.05, 0.01));
    }
}
