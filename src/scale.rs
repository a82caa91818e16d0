//! Row/column scaling of the constraint matrix.
//!
//! Computes multipliers `r` and `c` such that `diag(r) * A * diag(c)` has a
//! tighter magnitude range than `A`. The solve path applies the factors
//! when it builds its internal instance and divides them back out of the
//! solution, so the model itself is never mutated.

use crate::matrix::SparseMatrix;
use crate::{E, I};

/// Scaling type and mode bits for the `scaling` parameter. The low bits
/// select the method, the remaining bits adjust weighting and application.
pub mod scale_mode {
    pub const NONE: i64 = 0;
    /// Divide by the extreme magnitude.
    pub const EXTREME: i64 = 1;
    /// Divide by the geometric mean of the extremes.
    pub const RANGE: i64 = 2;
    /// Divide by the average magnitude.
    pub const MEAN: i64 = 3;
    /// Iterated geometric-mean scaling.
    pub const GEOMETRIC: i64 = 4;
    /// Curtis–Reid least-squares log scaling.
    pub const CURTIS_REID: i64 = 7;
    pub const TYPE_MASK: i64 = 7;

    /// Quadratic (root-mean-square) weighting of the mean.
    pub const QUADRATIC: i64 = 1 << 3;
    /// Logarithmic (geometric-mean) weighting of the mean.
    pub const LOGARITHMIC: i64 = 1 << 4;
    /// Round every factor to the nearest power of two.
    pub const POWER2: i64 = 1 << 5;
    /// Final column pass forcing the scaled maxima to at most one.
    pub const EQUILIBRATE: i64 = 1 << 6;
    /// Scale integer columns as well.
    pub const INTEGERS: i64 = 1 << 7;
    /// Recompute the factors on every solve.
    pub const DYN_UPDATE: i64 = 1 << 8;
    /// Only compute row factors.
    pub const ROWS_ONLY: i64 = 1 << 9;
    /// Only compute column factors.
    pub const COLS_ONLY: i64 = 1 << 10;
}

/// Computed multiplier pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleFactors {
    pub rows: Vec<E>,
    pub cols: Vec<E>,
}

impl ScaleFactors {
    pub fn identity(m: usize, n: usize) -> Self {
        Self {
            rows: vec![1.0; m],
            cols: vec![1.0; n],
        }
    }
}

/// Magnitude summary of one line (row or column) of the matrix.
#[derive(Debug, Clone, Copy)]
struct LineStats {
    min: E,
    max: E,
    sum: E,
    sumsq: E,
    logsum: E,
    count: usize,
}

impl LineStats {
    fn new() -> Self {
        Self {
            min: E::INFINITY,
            max: 0.0,
            sum: 0.0,
            sumsq: 0.0,
            logsum: 0.0,
            count: 0,
        }
    }

    fn add(&mut self, v: E) {
        let a = v.abs();
        if a == 0.0 {
            return;
        }
        self.min = self.min.min(a);
        self.max = self.max.max(a);
        self.sum += a;
        self.sumsq += a * a;
        self.logsum += a.ln();
        self.count += 1;
    }

    /// The divisor chosen by the scaling type and weighting bits.
    fn divisor(&self, mode: i64) -> E {
        use scale_mode::*;
        if self.count == 0 {
            return 1.0;
        }
        match mode & TYPE_MASK {
            EXTREME => self.max,
            RANGE => (self.min * self.max).sqrt(),
            MEAN => {
                if mode & QUADRATIC != 0 {
                    (self.sumsq / self.count as E).sqrt()
                } else if mode & LOGARITHMIC != 0 {
                    (self.logsum / self.count as E).exp()
                } else {
                    self.sum / self.count as E
                }
            }
            _ => (self.logsum / self.count as E).exp(),
        }
    }
}

/// Computes scaling factors for the given matrix; `integer_cols[j]` marks
/// columns that are only scaled when the integers bit is set.
pub fn compute(
    mat: &SparseMatrix,
    integer_cols: &[bool],
    mode: i64,
    scale_limit: E,
) -> ScaleFactors {
    use scale_mode::*;
    let (m, n) = (mat.nrows(), mat.ncols());
    let mut factors = ScaleFactors::identity(m, n);
    if mode & TYPE_MASK == NONE || m == 0 || n == 0 || mat.nnz() == 0 {
        return factors;
    }

    let scale_ints = mode & INTEGERS != 0;
    let do_rows = mode & COLS_ONLY == 0;
    let do_cols = mode & ROWS_ONLY == 0;
    let col_allowed =
        |j: usize| -> bool { do_cols && (scale_ints || !integer_cols.get(j).copied().unwrap_or(false)) };

    if mode & TYPE_MASK == CURTIS_REID {
        curtis_reid(mat, &mut factors, scale_limit, &col_allowed, do_rows);
    } else {
        let passes = if mode & TYPE_MASK == GEOMETRIC {
            (scale_limit.max(1.0) as usize).min(20)
        } else {
            1
        };
        for _ in 0..passes {
            if do_rows {
                let mut stats = vec![LineStats::new(); m];
                for j in 0..n {
                    let (idx, val) = mat.column(j);
                    for (&i, &v) in idx.iter().zip(val.iter()) {
                        stats[i].add(v * factors.rows[i] * factors.cols[j]);
                    }
                }
                for i in 0..m {
                    let div = stats[i].divisor(mode);
                    if div > 0.0 && div.is_finite() {
                        factors.rows[i] /= div;
                    }
                }
            }
            if do_cols {
                for j in 0..n {
                    if !col_allowed(j) {
                        continue;
                    }
                    let mut stats = LineStats::new();
                    let (idx, val) = mat.column(j);
                    for (&i, &v) in idx.iter().zip(val.iter()) {
                        stats.add(v * factors.rows[i] * factors.cols[j]);
                    }
                    let div = stats.divisor(mode);
                    if div > 0.0 && div.is_finite() {
                        factors.cols[j] /= div;
                    }
                }
            }
        }
    }

    if mode & EQUILIBRATE != 0 && do_cols {
        for j in 0..n {
            if !col_allowed(j) {
                continue;
            }
            let (idx, val) = mat.column(j);
            let maxabs = idx
                .iter()
                .zip(val.iter())
                .map(|(&i, &v)| (v * factors.rows[i] * factors.cols[j]).abs())
                .fold(0.0, E::max);
            if maxabs > 1.0 {
                factors.cols[j] /= maxabs;
            }
        }
    }

    if mode & POWER2 != 0 {
        for f in factors.rows.iter_mut().chain(factors.cols.iter_mut()) {
            if *f > 0.0 && f.is_finite() {
                *f = (2.0 as E).powi(f.log2().round() as i32);
            }
        }
    }

    factors
}

/// Curtis–Reid scaling: least-squares fit of `log2` factors, solved with a
/// few conjugate-gradient sweeps over the normal equations.
fn curtis_reid<F: Fn(usize) -> bool>(
    mat: &SparseMatrix,
    factors: &mut ScaleFactors,
    scale_limit: E,
    col_allowed: &F,
    do_rows: bool,
) {
    let (m, n) = (mat.nrows(), mat.ncols());
    // log residuals and counts
    let mut row_log = vec![0.0; m];
    let mut row_cnt = vec![0usize; m];
    let mut col_log = vec![0.0; n];
    let mut col_cnt = vec![0usize; n];
    let mut entries: Vec<(I, I, E)> = Vec::with_capacity(mat.nnz());
    for j in 0..n {
        let (idx, val) = mat.column(j);
        for (&i, &v) in idx.iter().zip(val.iter()) {
            if v != 0.0 {
                let lg = v.abs().log2();
                entries.push((i, j, lg));
                row_log[i] += lg;
                row_cnt[i] += 1;
                col_log[j] += lg;
                col_cnt[j] += 1;
            }
        }
    }
    let mut rho = vec![0.0; m]; // row log-factors (to be subtracted)
    let mut gamma = vec![0.0; n]; // col log-factors
    let sweeps = ((scale_limit.max(1.0)) as usize * 4).clamp(4, 40);
    // Alternating (Gauss-Seidel style) minimization of
    // sum (log|a_ij| - rho_i - gamma_j)^2.
    for _ in 0..sweeps {
        if do_rows {
            let mut acc = vec![0.0; m];
            for &(i, j, lg) in &entries {
                acc[i] += lg - gamma[j];
            }
            for i in 0..m {
                if row_cnt[i] > 0 {
                    rho[i] = acc[i] / row_cnt[i] as E;
                }
            }
        }
        let mut acc = vec![0.0; n];
        for &(i, j, lg) in &entries {
            acc[j] += lg - rho[i];
        }
        for j in 0..n {
            if col_cnt[j] > 0 && col_allowed(j) {
                gamma[j] = acc[j] / col_cnt[j] as E;
            }
        }
    }
    for i in 0..m {
        factors.rows[i] = (2.0 as E).powf(-rho[i]);
    }
    for j in 0..n {
        if col_allowed(j) {
            factors.cols[j] = (2.0 as E).powf(-gamma[j]);
        }
    }
}

/// Largest-over-smallest scaled magnitude; the quality measure the scaler
/// is trying to shrink.
pub fn condition_range(mat: &SparseMatrix, factors: &ScaleFactors) -> E {
    let mut min = E::INFINITY;
    let mut max: E = 0.0;
    for j in 0..mat.ncols() {
        let (idx, val) = mat.column(j);
        for (&i, &v) in idx.iter().zip(val.iter()) {
            let a = (v * factors.rows[i] * factors.cols[j]).abs();
            if a > 0.0 {
                min = min.min(a);
                max = max.max(a);
            }
        }
    }
    if max == 0.0 { 1.0 } else { max / min }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn wild_matrix() -> SparseMatrix {
        let mut mat = SparseMatrix::new(3, 3, 1e-30);
        mat.set(0, 0, 1e6).unwrap();
        mat.set(0, 1, 2e5).unwrap();
        mat.set(1, 1, 4e-3).unwrap();
        mat.set(1, 2, 1e-4).unwrap();
        mat.set(2, 0, 3.0).unwrap();
        mat.set(2, 2, 0.5).unwrap();
        mat
    }

    #[test]
    fn none_mode_is_identity() {
        let mat = wild_matrix();
        let f = compute(&mat, &[false; 3], scale_mode::NONE, 5.0);
        assert_eq!(f, ScaleFactors::identity(3, 3));
    }

    #[rstest]
    #[case(scale_mode::EXTREME)]
    #[case(scale_mode::RANGE)]
    #[case(scale_mode::MEAN)]
    #[case(scale_mode::GEOMETRIC)]
    #[case(scale_mode::CURTIS_REID)]
    fn scaling_tightens_the_range(#[case] mode: i64) {
        let mat = wild_matrix();
        let before = condition_range(&mat, &ScaleFactors::identity(3, 3));
        let f = compute(&mat, &[false; 3], mode, 5.0);
        let after = condition_range(&mat, &f);
        assert!(
            after < before,
            "mode {} should improve {} -> {}",
            mode,
            before,
            after
        );
    }

    #[test]
    fn power2_rounds_factors() {
        let mat = wild_matrix();
        let f = compute(
            &mat,
            &[false; 3],
            scale_mode::GEOMETRIC | scale_mode::POWER2,
            5.0,
        );
        for v in f.rows.iter().chain(f.cols.iter()) {
            let l = v.log2();
            assert!((l - l.round()).abs() < 1e-12, "{} is not a power of two", v);
        }
    }

    #[test]
    fn equilibrate_caps_scaled_magnitudes() {
        let mat = wild_matrix();
        let f = compute(
            &mat,
            &[false; 3],
            scale_mode::EXTREME | scale_mode::EQUILIBRATE,
            5.0,
        );
        for j in 0..3 {
            let (idx, val) = mat.column(j);
            for (&i, &v) in idx.iter().zip(val.iter()) {
                assert!((v * f.rows[i] * f.cols[j]).abs() <= 1.0 + 1e-12);
            }
        }
    }

    #[test]
    fn integer_columns_untouched_by_default() {
        let mat = wild_matrix();
        let ints = [false, true, false];
        let f = compute(&mat, &ints, scale_mode::GEOMETRIC, 5.0);
        assert_eq!(f.cols[1], 1.0);
        let f2 = compute(&mat, &ints, scale_mode::GEOMETRIC | scale_mode::INTEGERS, 5.0);
        assert_ne!(f2.cols[1], 1.0);
    }

    #[test]
    fn rows_only_leaves_columns_alone() {
        let mat = wild_matrix();
        let f = compute(&mat, &[false; 3], scale_mode::EXTREME | scale_mode::ROWS_ONLY, 5.0);
        assert!(f.cols.iter().all(|&c| c == 1.0));
        assert!(f.rows.iter().any(|&r| r != 1.0));
    }
}
