//! Two-sided Fisher's exact test and phred-score conversion, used for both
//! the somatic score and per-sample strand-bias score. Computed via
//! log-factorials (`statrs::function::gamma::ln_gamma`) rather than htslib's
//! `kt_fisher_exact`, since there's no pure-Rust binding for it.

use statrs::function::gamma::ln_gamma;

/// A 2x2 contingency table:
/// ```text
///          allele A   allele B
/// group 1   row1.0      row1.1
/// group 2   row2.0      row2.1
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ContingencyTable {
    pub row1: (i64, i64),
    pub row2: (i64, i64),
}

fn ln_choose(n: i64, k: i64) -> f64 {
    if k < 0 || k > n {
        return f64::NEG_INFINITY;
    }
    ln_gamma((n + 1) as f64) - ln_gamma((k + 1) as f64) - ln_gamma((n - k + 1) as f64)
}

/// Log-probability of a hypergeometric table with top-left cell `a`, given
/// fixed row/column margins.
fn ln_hypergeom_prob(a: i64, row1_total: i64, row2_total: i64, col1_total: i64) -> f64 {
    let n = row1_total + row2_total;
    ln_choose(row1_total, a) + ln_choose(row2_total, col1_total - a) - ln_choose(n, col1_total)
}

/// Two-sided Fisher's exact test p-value: the sum of hypergeometric
/// probabilities no more likely than the observed table, over every table
/// with the same margins.
pub fn two_sided_p_value(table: &ContingencyTable) -> f64 {
    let (a, b) = table.row1;
    let (c, d) = table.row2;
    let row1_total = a + b;
    let row2_total = c + d;
    let col1_total = a + c;
    let n = row1_total + row2_total;
    if n == 0 {
        return 1.0;
    }

    let lo = 0.max(col1_total - row2_total);
    let hi = row1_total.min(col1_total);
    if lo > hi {
        return 1.0;
    }

    let ln_probs: Vec<f64> = (lo..=hi).map(|k| ln_hypergeom_prob(k, row1_total, row2_total, col1_total)).collect();
    let ln_observed = ln_hypergeom_prob(a, row1_total, row2_total, col1_total);
    let max_ln = ln_probs.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    // Sum (via log-sum-exp for numerical stability) every table whose
    // probability is no greater than the observed table's, up to a small
    // relative tolerance to absorb floating-point rounding.
    const EPS: f64 = 1e-7;
    let sum: f64 = ln_probs
        .iter()
        .filter(|&&lp| lp <= ln_observed + EPS)
        .map(|&lp| (lp - max_ln).exp())
        .sum();
    (sum.ln() + max_ln).exp().clamp(0.0, 1.0)
}

pub const MAX_PHRED_SCORE: u8 = 255;

/// `-10 * log10(p)`, clamped to `[0, 255]`.
pub fn phred_from_p(p: f64) -> u8 {
    if p <= 0.0 {
        return MAX_PHRED_SCORE;
    }
    let phred = -10.0 * p.log10();
    phred.clamp(0.0, MAX_PHRED_SCORE as f64).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_proportions_give_a_high_p_value() {
        let table = ContingencyTable { row1: (10, 10), row2: (10, 10) };
        let p = two_sided_p_value(&table);
        assert!(p > 0.5, "expected no association, got p={p}");
    }

    #[test]
    fn strongly_skewed_table_gives_a_low_p_value() {
        let table = ContingencyTable { row1: (20, 0), row2: (0, 20) };
        let p = two_sided_p_value(&table);
        assert!(p < 1e-6, "expected strong association, got p={p}");
    }

    #[test]
    fn phred_conversion_clamps_at_max() {
        assert_eq!(phred_from_p(0.0), MAX_PHRED_SCORE);
        assert_eq!(phred_from_p(1.0), 0);
    }

    #[test]
    fn empty_table_is_non_significant() {
        let table = ContingencyTable { row1: (0, 0), row2: (0, 0) };
        assert_eq!(two_sided_p_value(&table), 1.0);
    }
}
