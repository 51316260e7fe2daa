//! Approximate-equality assertions shared by unit and integration tests.

#[macro_export]
macro_rules! assert_approx_eq {
    ($expected:expr, $actual:expr) => {
        $crate::assert_approx_eq!($expected, $actual, 1e-9)
    };
    ($expected:expr, $actual:expr, $eps:expr) => {{
        let (expected, actual): (f64, f64) = ($expected, $actual);
        assert!(
            (expected - actual).abs() < $eps,
            "Expected {}, but got {}",
            expected,
            actual
        );
    }};
}

#[macro_export]
macro_rules! assert_approx_complex_eq {
    ($expected_re:expr, $expected_im:expr, $actual:expr) => {
        $crate::assert_approx_complex_eq!($expected_re, $expected_im, $actual, 1e-9)
    };
    ($expected_re:expr, $expected_im:expr, $actual:expr, $eps:expr) => {{
        let actual: $crate::Qbit = $actual;
        assert!(
            ($expected_re - actual.re).abs() < $eps && ($expected_im - actual.im).abs() < $eps,
            "Expected {}+{}i, but got {}",
            $expected_re,
            $expected_im,
            actual
        );
    }};
}
