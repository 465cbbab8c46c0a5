//! Two-sample Kolmogorov-Smirnov test.
//!
//! The statistic is `D = sup |F_base(x) - F_candidate(x)|` over the pooled
//! sample. Small samples get the exact null distribution of `D` (lattice path
//! counting); large samples use the asymptotic Kolmogorov distribution with
//! the usual effective-size correction.

use serde::{Deserialize, Serialize};

/// How a p-value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KsMethod {
    Exact,
    Asymptotic,
    /// No test was run: the column is absent from the candidate, or one
    /// side has no values once missing cells are dropped.
    Skipped,
}

impl std::fmt::Display for KsMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KsMethod::Exact => write!(f, "exact"),
            KsMethod::Asymptotic => write!(f, "asymptotic"),
            KsMethod::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of one two-sample test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsOutcome {
    pub statistic: f64,
    pub p_value: f64,
    pub method: KsMethod,
}

/// Run the two-sided test on two non-empty samples. Inputs need not be sorted.
///
/// `exact_max_cells` bounds `n * m` for the exact computation.
pub fn ks_2samp(base: &[f64], candidate: &[f64], exact_max_cells: usize) -> KsOutcome {
    let mut a = base.to_vec();
    let mut b = candidate.to_vec();
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);

    let n = a.len();
    let m = b.len();
    let k = statistic_numerator(&a, &b);
    let cells = n as u64 * m as u64;
    let statistic = if cells == 0 { 0.0 } else { k as f64 / cells as f64 };

    if k == 0 {
        return KsOutcome {
            statistic,
            p_value: 1.0,
            method: KsMethod::Exact,
        };
    }

    if cells <= exact_max_cells as u64 {
        KsOutcome {
            statistic,
            p_value: exact_p_value(k, n, m),
            method: KsMethod::Exact,
        }
    } else {
        KsOutcome {
            statistic,
            p_value: asymptotic_p_value(statistic, n, m),
            method: KsMethod::Asymptotic,
        }
    }
}

/// `D * n * m` for sorted samples. Every attainable `D` is a multiple of
/// `1 / (n * m)`, so the integer form is exact.
pub fn statistic_numerator(a: &[f64], b: &[f64]) -> u64 {
    let n = a.len();
    let m = b.len();
    let (mut i, mut j) = (0usize, 0usize);
    let mut max = 0u64;

    while i < n && j < m {
        let x = if a[i] <= b[j] { a[i] } else { b[j] };
        while i < n && a[i] <= x {
            i += 1;
        }
        while j < m && b[j] <= x {
            j += 1;
        }
        let diff = (i as u64 * m as u64).abs_diff(j as u64 * n as u64);
        max = max.max(diff);
    }
    max
}

/// `P(D >= k / (n m))` under the null.
///
/// Equal sample sizes count the paths leaving the band directly, which keeps
/// full relative precision far into the tail. Otherwise the paths staying
/// strictly inside `|i/n - j/m| < d` are counted and the result is `1 - inside`,
/// which bottoms out near machine epsilon.
pub fn exact_p_value(k: u64, n: usize, m: usize) -> f64 {
    if k == 0 || n == 0 || m == 0 {
        return 1.0;
    }
    if n == m {
        // With n == m every attainable numerator is a multiple of n.
        let h = k.div_ceil(n as u64) as usize;
        return prob_outside_square(n, h).clamp(0.0, 1.0);
    }
    (1.0 - prob_inside_band(k, n, m)).clamp(0.0, 1.0)
}

/// Probability that a path of `n` steps right and `n` steps up reaches a
/// diagonal `h` steps away from the main one, by inclusion-exclusion over
/// reflections.
fn prob_outside_square(n: usize, h: usize) -> f64 {
    if h == 0 {
        return 1.0;
    }
    let nf = n as f64;
    let hf = h as f64;
    let mut p = 0.0;
    for k in (0..=n / h).rev() {
        let offset = k as f64 * hf;
        let mut term = 1.0;
        for j in 0..h {
            let jf = j as f64;
            term = (nf - offset - jf) * term / (nf + offset + jf + 1.0);
        }
        p = term * (1.0 - p);
    }
    2.0 * p
}

fn prob_inside_band(k: u64, n: usize, m: usize) -> f64 {
    let (small, large) = if n <= m { (n, m) } else { (m, n) };
    let sd = small as f64;
    let ld = large as f64;
    // Half-step below d keeps the comparison clear of rounding.
    let q = (k as f64 - 0.5) / (sd * ld);

    let mut u: Vec<f64> = (0..=large)
        .map(|j| if j as f64 / ld > q { 0.0 } else { 1.0 })
        .collect();

    for i in 1..=small {
        let w = i as f64 / (i + large) as f64;
        let fi = i as f64 / sd;
        u[0] = if fi > q { 0.0 } else { w * u[0] };
        for j in 1..=large {
            u[j] = if (fi - j as f64 / ld).abs() > q {
                0.0
            } else {
                w * u[j] + u[j - 1]
            };
        }
    }
    u[large]
}

/// Asymptotic p-value with effective sample size `n m / (n + m)`.
pub fn asymptotic_p_value(statistic: f64, n: usize, m: usize) -> f64 {
    if n == 0 || m == 0 {
        return 1.0;
    }
    let en = (n as f64 * m as f64) / (n + m) as f64;
    let sqrt_en = en.sqrt();
    let lambda = (sqrt_en + 0.12 + 0.11 / sqrt_en) * statistic;
    kolmogorov_sf(lambda)
}

/// Survival function of the Kolmogorov distribution,
/// `Q(λ) = 2 Σ_{k≥1} (-1)^{k-1} exp(-2 k² λ²)`.
pub fn kolmogorov_sf(lambda: f64) -> f64 {
    // Below this the series converges poorly and Q is 1 to double precision.
    if lambda < 0.2 {
        return 1.0;
    }
    let a2 = -2.0 * lambda * lambda;
    let mut sum = 0.0;
    let mut sign = 2.0;
    let mut previous = 0.0f64;
    for k in 1..=100 {
        let kf = f64::from(k);
        let term = sign * (a2 * kf * kf).exp();
        sum += term;
        if term.abs() <= 1e-3 * previous || term.abs() <= 1e-10 * sum.abs() {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        previous = term.abs();
    }
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(lo: i32, hi: i32) -> Vec<f64> {
        (lo..hi).map(f64::from).collect()
    }

    #[test]
    fn test_identical_samples_p_is_one() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let out = ks_2samp(&x, &x, 1_000_000);
        assert_eq!(out.statistic, 0.0);
        assert_eq!(out.p_value, 1.0);
        assert_eq!(out.method, KsMethod::Exact);
    }

    #[test]
    fn test_disjoint_samples_exact() {
        let out = ks_2samp(&range(0, 10), &range(1000, 1010), 1_000_000);
        assert_eq!(out.statistic, 1.0);
        // 2 / C(20, 10)
        let expected = 2.0 / 184_756.0;
        assert!((out.p_value - expected).abs() < 1e-12, "p = {}", out.p_value);
    }

    #[test]
    fn test_exact_small_case_by_enumeration() {
        // One value against two: D = 1 in 2 of the 3 equally likely orderings.
        assert!((exact_p_value(2, 1, 2) - 2.0 / 3.0).abs() < 1e-12);
        assert!((exact_p_value(2, 2, 1) - 2.0 / 3.0).abs() < 1e-12);
        // n = m = 1: D is always 1.
        assert!((exact_p_value(1, 1, 1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_equal_sizes_keep_precision_in_the_tail() {
        // Disjoint samples of 100: 2 / C(200, 100).
        let out = ks_2samp(&range(0, 100), &range(1000, 1100), 1_000_000);
        assert_eq!(out.method, KsMethod::Exact);
        let expected = 2.208_760_693_199_503e-59;
        assert!(
            ((out.p_value - expected) / expected).abs() < 1e-9,
            "p = {:e}",
            out.p_value
        );
    }

    #[test]
    fn test_outside_square_agrees_with_band_count() {
        for n in [1usize, 2, 5, 12] {
            for k in 1..=(n * n) as u64 {
                let outside = exact_p_value(k, n, n);
                let inside = (1.0 - prob_inside_band(k, n, n)).clamp(0.0, 1.0);
                assert!((outside - inside).abs() < 1e-12, "n = {n}, k = {k}");
            }
        }
    }

    #[test]
    fn test_statistic_with_ties() {
        let a = vec![1.0, 1.0, 2.0, 2.0];
        let b = vec![1.0, 2.0, 2.0, 2.0];
        // F_a(1) = 0.5, F_b(1) = 0.25
        assert_eq!(statistic_numerator(&a, &b), 4);
        let out = ks_2samp(&a, &b, 1_000_000);
        assert!((out.statistic - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_statistic_symmetric() {
        let a = vec![0.3, 1.7, 2.2, 5.0, 9.1];
        let b = vec![0.1, 0.2, 4.4];
        assert_eq!(statistic_numerator(&a, &b), statistic_numerator(&b, &a));
        let ab = ks_2samp(&a, &b, 1_000_000);
        let ba = ks_2samp(&b, &a, 1_000_000);
        assert!((ab.p_value - ba.p_value).abs() < 1e-12);
    }

    #[test]
    fn test_asymptotic_branch_used_above_limit() {
        let out = ks_2samp(&range(0, 10), &range(1000, 1010), 50);
        assert_eq!(out.method, KsMethod::Asymptotic);
        assert!(out.p_value < 1e-3);
    }

    #[test]
    fn test_asymptotic_close_to_exact_for_moderate_samples() {
        let a: Vec<f64> = (0..200).map(|i| f64::from(i) * 0.5).collect();
        let b: Vec<f64> = (0..200).map(|i| f64::from(i) * 0.5 + 12.0).collect();
        let exact = ks_2samp(&a, &b, usize::MAX);
        let approx = ks_2samp(&a, &b, 0);
        assert_eq!(exact.method, KsMethod::Exact);
        assert_eq!(approx.method, KsMethod::Asymptotic);
        assert!((exact.p_value - approx.p_value).abs() < 0.02);
    }

    #[test]
    fn test_kolmogorov_sf_known_values() {
        // Q(1.36) is the classic 5% critical point.
        assert!((kolmogorov_sf(1.36) - 0.05).abs() < 2e-3);
        assert_eq!(kolmogorov_sf(0.0), 1.0);
        assert!(kolmogorov_sf(5.0) < 1e-20);
    }

    #[test]
    fn test_p_value_in_unit_interval() {
        let a = vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let b = vec![2.0, 7.0, 1.0, 8.0, 2.0, 8.0];
        let out = ks_2samp(&a, &b, 1_000_000);
        assert!((0.0..=1.0).contains(&out.p_value));
        assert!((0.0..=1.0).contains(&out.statistic));
    }
}
