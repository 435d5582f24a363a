//! Frequency grid construction for one- and two-sided spectra.

/// Frequency axis for a DFT of length `n_dft` with timestep `dt`.
///
/// One-sided (real data): `⌊n_dft/2⌋ + 1` non-negative, monotone increasing
/// bins `k/(n_dft·dt)`. Two-sided (complex data): `n_dft` bins in FFT
/// order, with the upper half shifted down by the sampling rate `1/dt`.
///
/// ```
/// use approx::assert_relative_eq;
/// use spod_rs::frequency_axis;
///
/// let f = frequency_axis(8, 0.5, false);
/// assert_eq!(f.len(), 5);
/// assert_relative_eq!(f[4], 1.0, epsilon = 1e-14);
///
/// let f = frequency_axis(8, 0.5, true);
/// assert_eq!(f.len(), 8);
/// assert_relative_eq!(f[5], -0.75, epsilon = 1e-14);
/// ```
pub fn frequency_axis(n_dft: usize, dt: f64, two_sided: bool) -> Vec<f64> {
    let df = 1.0 / (n_dft as f64 * dt);
    if two_sided {
        let split = n_dft.div_ceil(2);
        (0..n_dft)
            .map(|k| {
                if k < split {
                    k as f64 * df
                } else {
                    k as f64 * df - 1.0 / dt
                }
            })
            .collect()
    } else {
        (0..=n_dft / 2).map(|k| k as f64 * df).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::frequency_axis;
    use approx::assert_relative_eq;

    #[test]
    fn one_sided_is_monotone_from_zero() {
        let f = frequency_axis(64, 2.0, false);
        assert_eq!(f.len(), 33);
        assert_relative_eq!(f[0], 0.0);
        for k in 1..f.len() {
            assert!(f[k] > f[k - 1]);
            assert_relative_eq!(f[k], k as f64 / 128.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn two_sided_even_splits_at_nyquist() {
        let f = frequency_axis(8, 1.0, true);
        let expected = [0.0, 0.125, 0.25, 0.375, -0.5, -0.375, -0.25, -0.125];
        for (a, b) in f.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-14);
        }
    }

    #[test]
    fn two_sided_odd_has_no_nyquist_bin() {
        let f = frequency_axis(5, 1.0, true);
        let expected = [0.0, 0.2, 0.4, -0.4, -0.2];
        for (a, b) in f.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-14);
        }
    }
}
