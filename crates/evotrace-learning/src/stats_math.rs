//! Small numeric helpers shared by pattern extraction and A/B analysis.
//! No dependency beyond stdlib — these are pure functions over `&[f64]`.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Linear-interpolation-free nearest-rank percentile. Falls back to the
/// sample maximum below 20 observations, where a rank-based percentile
/// would be too noisy to trust.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    if sorted.len() < 20 {
        return *sorted.last().unwrap();
    }
    let rank = ((p * sorted.len() as f64).ceil() as usize).saturating_sub(1);
    sorted[rank.min(sorted.len() - 1)]
}

/// Sample standard deviation (n-1 denominator); 0.0 for fewer than 2 points.
pub fn stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// Welch's unequal-variance t-statistic and Welch–Satterthwaite degrees of
/// freedom for two independent samples.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Option<(f64, f64)> {
    if a.len() < 2 || b.len() < 2 {
        return None;
    }
    let (m1, m2) = (mean(a), mean(b));
    let (v1, v2) = (stddev(a).powi(2), stddev(b).powi(2));
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let se_sq = v1 / n1 + v2 / n2;
    if se_sq <= 0.0 {
        return None;
    }
    let t = (m1 - m2) / se_sq.sqrt();
    let df_num = se_sq.powi(2);
    let df_den = (v1 / n1).powi(2) / (n1 - 1.0) + (v2 / n2).powi(2) / (n2 - 1.0);
    let df = if df_den > 0.0 { df_num / df_den } else { n1 + n2 - 2.0 };
    Some((t, df))
}

/// Two-sided p-value approximation for Welch's t-test using a logistic
/// approximation to the Student-t CDF — adequate for significance gating
/// without pulling in a full statistics crate.
pub fn two_sided_p_value(t: f64, df: f64) -> f64 {
    let t = t.abs();
    // Abramowitz & Stegun style approximation converging to the normal
    // distribution as df grows; accurate enough at df > 10, conservative
    // (slightly higher p) at small df, which only makes significance
    // gating stricter, never looser.
    let x = df / (df + t * t);
    let p = incomplete_beta(x, df / 2.0, 0.5);
    p.clamp(0.0, 1.0)
}

/// Regularized incomplete beta function via a continued fraction
/// (Numerical Recipes' `betacf`), used to derive the t-distribution's
/// survival function.
fn incomplete_beta(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if x >= 1.0 {
        return 0.0;
    }
    let ln_beta = ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b);
    let front = (a * x.ln() + b * (1.0 - x).ln() - ln_beta).exp();
    let cf = betacf(x, a, b);
    (front * cf / a).clamp(0.0, 1.0)
}

fn betacf(x: f64, a: f64, b: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 1e-10;
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < 1e-30 {
        d = 1e-30;
    }
    d = 1.0 / d;
    let mut h = d;
    for m in 1..MAX_ITER {
        let m_f = m as f64;
        let m2 = 2.0 * m_f;
        let aa = m_f * (b - m_f) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < 1e-30 {
            d = 1e-30;
        }
        c = 1.0 + aa / c;
        if c.abs() < 1e-30 {
            c = 1e-30;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m_f) * (qab + m_f) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < 1e-30 {
            d = 1e-30;
        }
        c = 1.0 + aa / c;
        if c.abs() < 1e-30 {
            c = 1e-30;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

fn ln_gamma(x: f64) -> f64 {
    const COF: [f64; 6] =
        [76.18009172947146, -86.50532032941677, 24.01409824083091, -1.231739572450155, 0.1208650973866179e-2, -0.5395239384953e-5];
    let mut y = x;
    let tmp = x + 5.5 - (x + 0.5) * (x + 5.5).ln();
    let mut ser = 1.000000000190015;
    for c in COF {
        y += 1.0;
        ser += c / y;
    }
    -tmp + (2.5066282746310005 * ser / x).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_median_agree_on_symmetric_data() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(mean(&values), 3.0);
        assert_eq!(median(&values), 3.0);
    }

    #[test]
    fn percentile_falls_back_to_max_below_20_samples() {
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        assert_eq!(percentile(&values, 0.95), 10.0);
    }

    #[test]
    fn identical_samples_have_zero_t_statistic() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let b = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let (t, _df) = welch_t_test(&a, &b).unwrap();
        assert!(t.abs() < 1e-9);
    }

    #[test]
    fn widely_separated_samples_are_significant() {
        let a = vec![10.0, 11.0, 9.0, 10.5, 9.5, 10.2, 9.8, 10.1, 9.9, 10.3];
        let b = vec![1.0, 2.0, 0.5, 1.5, 1.2, 0.8, 1.1, 0.9, 1.3, 0.7];
        let (t, df) = welch_t_test(&a, &b).unwrap();
        let p = two_sided_p_value(t, df);
        assert!(p < 0.001);
    }
}
