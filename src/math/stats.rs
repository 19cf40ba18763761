//! Statistical primitives shared by the risk calculators.
//!
//! Includes sample moments, the Acklam rational approximation of the inverse
//! standard-normal CDF, and the chi-square(1) survival function used by the
//! VaR backtests.

use crate::types::error::{RiskError, RiskResult};

/// Arithmetic mean of a sample. Returns 0.0 for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1 denominator).
///
/// Returns 0.0 when fewer than two observations are supplied.
#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Pearson correlation of two equally-sized samples.
///
/// Returns 0.0 when either sample has zero variance. The result is clamped
/// to [-1, 1] to absorb floating-point error.
#[must_use]
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }

    let mean_x = mean(&x[..n]);
    let mean_y = mean(&y[..n]);

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }

    (cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0)
}

/// Inverse standard-normal CDF (quantile function).
///
/// Acklam's rational approximation, accurate to roughly 1.15e-9 over the
/// full open interval.
///
/// # Errors
///
/// Returns [`RiskError::InvalidParameter`] when `p` is outside (0, 1).
pub fn inverse_normal_cdf(p: f64) -> RiskResult<f64> {
    if !(0.0..=1.0).contains(&p) || p == 0.0 || p == 1.0 {
        return Err(RiskError::InvalidParameter(format!(
            "probability must be in (0, 1), got {}",
            p
        )));
    }

    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];

    const P_LOW: f64 = 0.02425;
    const P_HIGH: f64 = 1.0 - P_LOW;

    let x = if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= P_HIGH {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    Ok(x)
}

/// Standard normal probability density at `x`.
#[must_use]
pub fn standard_normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// Complementary error function.
///
/// Abramowitz & Stegun 7.1.26, maximum absolute error 1.5e-7.
#[must_use]
pub fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * z);
    let poly = t
        * (0.254829592
            + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    let result = poly * (-z * z).exp();
    if x >= 0.0 { result } else { 2.0 - result }
}

/// Survival function of the chi-square distribution with one degree of
/// freedom: `P(X > x)`.
///
/// For k = 1 the survival function reduces to `erfc(sqrt(x / 2))`, which is
/// all the Kupiec and Christoffersen likelihood-ratio tests require.
#[must_use]
pub fn chi_square_1df_survival(x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    erfc((x / 2.0).sqrt())
}
