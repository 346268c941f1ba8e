//! Numeric policy: render a scalar factor as an integer ratio `p/q`, found
//! by the smallest `q` in `[1, 1024]` such that `|f*q - round(f*q)| < 1e-10`.
//! The 1e-10 threshold is the same one used for diagram-deduplication; it
//! must stay exact.

use crate::error::{Error, Result};

const EPSILON: f64 = 1e-10;
const MAX_Q: i64 = 1024;

/// Finds the smallest denominator `q` (and matching numerator `p`)
/// approximating `f`. Fails with `IrrationalFactor` if none of
/// `q = 1..=1024` gets within `EPSILON`.
pub fn prefac(f: f64) -> Result<(i64, i64)> {
    for q in 1..=MAX_Q {
        let scaled = f * q as f64;
        let p = scaled.round();
        if (scaled - p).abs() < EPSILON {
            return Ok((p as i64, q));
        }
    }
    Err(Error::IrrationalFactor(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefac_finds_exact_unit_fractions() {
        assert_eq!(prefac(0.5).unwrap(), (1, 2));
        assert_eq!(prefac(1.0).unwrap(), (1, 1));
        assert_eq!(prefac(-0.25).unwrap(), (-1, 4));
    }

    #[test]
    fn prefac_round_trips_within_epsilon() {
        for f in [0.5, 0.125, 2.0 / 3.0, -1.0 / 7.0, 17.0 / 512.0] {
            let (p, q) = prefac(f).unwrap();
            assert!((p as f64 / q as f64 - f).abs() < 1e-9);
        }
    }

    #[test]
    fn prefac_rejects_factors_with_no_small_denominator() {
        assert_eq!(prefac(std::f64::consts::PI / 1e6), Err(Error::IrrationalFactor(std::f64::consts::PI / 1e6)));
    }
}
