//! Gamma-family special functions backing the chi-squared confidence
//! bounds.
//!
//! Only the members the solver needs are implemented: the log-gamma
//! function, the regularized lower incomplete gamma function `P(a, x)`, and
//! its inverse in `x`. All three operate at `f64` and are accurate to
//! roughly 1e-13 over the argument ranges the solver produces
//! (`a = n_blks ≥ 2`, probabilities away from the endpoints).

const LANCZOS: [f64; 14] = [
    57.156_235_665_862_923_5,
    -59.597_960_355_475_491_2,
    14.136_097_974_741_747_1,
    -0.491_913_816_097_620_199,
    0.339_946_499_848_118_887e-4,
    0.465_236_289_270_485_756e-4,
    -0.983_744_753_048_795_646e-4,
    0.158_088_703_224_912_494e-3,
    -0.210_264_441_724_104_883e-3,
    0.217_439_618_115_212_643e-3,
    -0.164_318_106_536_763_890e-3,
    0.844_182_239_838_527_433e-4,
    -0.261_908_384_015_814_087e-4,
    0.368_991_826_595_316_234e-5,
];

/// Natural log of the gamma function for `x > 0`.
///
/// ```
/// use approx::assert_relative_eq;
/// use spod_rs::special::ln_gamma;
///
/// assert_relative_eq!(ln_gamma(6.0), 120f64.ln(), epsilon = 1e-12);
/// assert_relative_eq!(
///     ln_gamma(0.5),
///     core::f64::consts::PI.sqrt().ln(),
///     epsilon = 1e-12
/// );
/// ```
pub fn ln_gamma(x: f64) -> f64 {
    debug_assert!(x > 0.0);
    let tmp = x + 5.242_187_5;
    let tmp = (x + 0.5) * tmp.ln() - tmp;
    let mut ser = 0.999_999_999_999_997_092;
    let mut y = x;
    for c in LANCZOS {
        y += 1.0;
        ser += c / y;
    }
    tmp + (2.506_628_274_631_000_5 * ser / x).ln()
}

/// Regularized lower incomplete gamma function `P(a, x)` for `a > 0`,
/// `x >= 0`.
///
/// Uses the power series for `x < a + 1` and the Lentz continued fraction
/// for the complementary function otherwise.
///
/// ```
/// use approx::assert_relative_eq;
/// use spod_rs::special::gammainc;
///
/// // P(1, x) = 1 - exp(-x)
/// assert_relative_eq!(gammainc(1.0, 2.0), 1.0 - (-2f64).exp(), epsilon = 1e-13);
/// ```
pub fn gammainc(a: f64, x: f64) -> f64 {
    debug_assert!(a > 0.0 && x >= 0.0);
    if x == 0.0 {
        return 0.0;
    }
    if x < a + 1.0 {
        lower_series(a, x)
    } else {
        1.0 - upper_continued_fraction(a, x)
    }
}

fn lower_series(a: f64, x: f64) -> f64 {
    let gln = ln_gamma(a);
    let mut ap = a;
    let mut del = 1.0 / a;
    let mut sum = del;
    loop {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * f64::EPSILON {
            return sum * (-x + a * x.ln() - gln).exp();
        }
    }
}

fn upper_continued_fraction(a: f64, x: f64) -> f64 {
    const FPMIN: f64 = f64::MIN_POSITIVE / f64::EPSILON;
    let gln = ln_gamma(a);
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / FPMIN;
    let mut d = 1.0 / b;
    let mut h = d;
    let mut i = 1.0f64;
    loop {
        let an = -i * (i - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = b + an / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() <= f64::EPSILON {
            return (-x + a * x.ln() - gln).exp() * h;
        }
        i += 1.0;
    }
}

/// Inverse of [`gammainc`] in `x`: returns the `x` with `P(a, x) = p`.
///
/// A quantile-based initial guess is polished by Halley-damped Newton
/// iterations on `P(a, x) - p`.
///
/// ```
/// use approx::assert_relative_eq;
/// use spod_rs::special::{gammainc, gammaincinv};
///
/// let x = gammaincinv(31.0, 0.95);
/// assert_relative_eq!(gammainc(31.0, x), 0.95, epsilon = 1e-10);
/// ```
pub fn gammaincinv(a: f64, p: f64) -> f64 {
    debug_assert!(a > 0.0 && (0.0..1.0).contains(&p));
    if p == 0.0 {
        return 0.0;
    }

    let gln = ln_gamma(a);
    let a1 = a - 1.0;
    let mut x = initial_guess(a, p);

    // Newton with a Halley correction, as for any smooth monotone CDF.
    let (lna1, afac) = if a > 1.0 {
        let lna1 = a1.ln();
        (lna1, (a1 * (lna1 - 1.0) - gln).exp())
    } else {
        (0.0, 0.0)
    };
    for _ in 0..12 {
        if x <= 0.0 {
            return 0.0;
        }
        let err = gammainc(a, x) - p;
        let t = if a > 1.0 {
            afac * (-(x - a1) + a1 * (x.ln() - lna1)).exp()
        } else {
            (-x + a1 * x.ln() - gln).exp()
        };
        let u = err / t;
        let step = u / (1.0 - 0.5 * (u * (a1 / x - 1.0)).min(1.0));
        x -= step;
        if x <= 0.0 {
            x = 0.5 * (x + step);
        }
        if step.abs() < f64::EPSILON * x {
            break;
        }
    }
    x
}

fn initial_guess(a: f64, p: f64) -> f64 {
    if a > 1.0 {
        // Wilson-Hilferty through a rational normal quantile.
        let pp = if p < 0.5 { p } else { 1.0 - p };
        let t = (-2.0 * pp.ln()).sqrt();
        let mut z = (2.30753 + t * 0.27061) / (1.0 + t * (0.99229 + t * 0.04481)) - t;
        if p < 0.5 {
            z = -z;
        }
        (a * (1.0 - 1.0 / (9.0 * a) - z / (3.0 * a.sqrt())).powi(3)).max(1e-3)
    } else {
        let t = 1.0 - a * (0.253 + 0.12 * a);
        if p < t {
            (p / t).powf(1.0 / a)
        } else {
            1.0 - ((1.0 - (p - t) / (1.0 - t)).ln())
        }
    }
}

/// Chi-squared quantile with `dof` degrees of freedom, through the
/// Gamma(dof/2, 1/2) reduction.
pub fn chi_squared_quantile(p: f64, dof: f64) -> f64 {
    2.0 * gammaincinv(0.5 * dof, p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ln_gamma_matches_factorials() {
        for n in 1..10u32 {
            let factorial: f64 = (1..n).map(|k| k as f64).product();
            assert_relative_eq!(ln_gamma(n as f64), factorial.ln(), epsilon = 1e-12);
        }
    }

    #[test]
    fn gammainc_exponential_identity() {
        for &x in &[0.1, 0.5, 1.0, 3.0, 10.0] {
            assert_relative_eq!(gammainc(1.0, x), 1.0 - (-x as f64).exp(), epsilon = 1e-13);
        }
    }

    #[test]
    fn gammainc_is_monotone_and_bounded() {
        let a = 15.5;
        let mut prev = 0.0;
        for i in 1..60 {
            let x = i as f64;
            let p = gammainc(a, x);
            assert!((0.0..=1.0).contains(&p));
            assert!(p >= prev);
            prev = p;
        }
    }

    #[test]
    fn gammaincinv_round_trips() {
        for &a in &[0.5, 1.0, 2.0, 15.5, 31.0, 128.0] {
            for &p in &[0.01, 0.05, 0.5, 0.95, 0.99] {
                let x = gammaincinv(a, p);
                assert_relative_eq!(gammainc(a, x), p, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn interval_factors_tighten_with_more_segments() {
        let width = |n_blks: f64| {
            let dof = 2.0 * n_blks;
            dof / chi_squared_quantile(0.05, dof) - dof / chi_squared_quantile(0.95, dof)
        };
        assert!(width(8.0) > width(32.0));
        assert!(width(32.0) > width(128.0));
    }

    #[test]
    fn chi_squared_two_dof_is_closed_form() {
        // chi2 with 2 dof is Exp(1/2): quantile(p) = -2 ln(1 - p)
        for &p in &[0.05, 0.5, 0.95] {
            assert_relative_eq!(
                chi_squared_quantile(p, 2.0),
                -2.0 * (1.0 - p).ln(),
                epsilon = 1e-9
            );
        }
    }
}
