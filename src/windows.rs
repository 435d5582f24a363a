//! Hamming window generation and the matching spectral gain correction.

use num_traits::Float;

/// Symmetric Hamming window of length `n`:
/// `w[k] = 0.54 - 0.46 cos(2πk/(n-1))`.
///
/// ```
/// use approx::assert_relative_eq;
/// use spod_rs::windows::hamming;
///
/// let w: Vec<f64> = hamming(5);
/// assert_relative_eq!(w[0], 0.08, epsilon = 1e-12);
/// assert_relative_eq!(w[2], 1.0, epsilon = 1e-12);
/// assert_relative_eq!(w[4], 0.08, epsilon = 1e-12);
/// ```
pub fn hamming<F: Float>(n: usize) -> Vec<F> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![F::one()];
    }
    let a0 = F::from(0.54).unwrap();
    let a1 = F::from(0.46).unwrap();
    let tau = F::from(2.0 * core::f64::consts::PI).unwrap();
    let nm1 = F::from(n - 1).unwrap();
    (0..n)
        .map(|k| a0 - a1 * (tau * F::from(k).unwrap() / nm1).cos())
        .collect()
}

/// Window gain correction `1 / mean(w)`, applied multiplicatively to the
/// Fourier coefficients of each windowed segment so that a flat unit signal
/// keeps unit DC amplitude.
///
/// ```
/// use approx::assert_relative_eq;
/// use spod_rs::windows::gain_correction;
///
/// assert_relative_eq!(gain_correction(&[1.0f64; 8]), 1.0, epsilon = 1e-12);
/// assert_relative_eq!(gain_correction(&[0.5f64; 8]), 2.0, epsilon = 1e-12);
/// ```
pub fn gain_correction<F: Float + core::iter::Sum>(w: &[F]) -> F {
    let sum: F = w.iter().copied().sum();
    F::from(w.len()).unwrap() / sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn hamming_is_symmetric_and_bounded() {
        let w: Vec<f64> = hamming(64);
        for k in 0..64 {
            assert!(w[k] > 0.0 && w[k] <= 1.0);
            assert_relative_eq!(w[k], w[63 - k], epsilon = 1e-14);
        }
    }

    #[test]
    fn hamming_endpoints() {
        let w: Vec<f64> = hamming(33);
        assert_relative_eq!(w[0], 0.08, epsilon = 1e-12);
        assert_relative_eq!(w[32], 0.08, epsilon = 1e-12);
        assert_relative_eq!(w[16], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_lengths() {
        assert!(hamming::<f64>(0).is_empty());
        assert_eq!(hamming::<f64>(1), vec![1.0]);
    }

    #[test]
    fn gain_inverts_the_mean() {
        let w: Vec<f64> = hamming(64);
        let g = gain_correction(&w);
        let mean = w.iter().sum::<f64>() / 64.0;
        assert_relative_eq!(g * mean, 1.0, epsilon = 1e-14);
    }
}
