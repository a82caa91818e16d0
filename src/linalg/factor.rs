//! Sparse LU factorization of the simplex basis with dynamic Markowitz
//! pivoting, and the FTRAN/BTRAN transformations built on it.
//!
//! The basis is the column set `B = [col(basis[0]), .., col(basis[m-1])]`
//! where member `j < n` selects structural column `j` of the constraint
//! matrix and member `j >= n` selects the slack column `-e_{j-n}`.
//!
//! Factorization produces `B = L * F * U` up to row/column permutations:
//! `L` as a sequence of column etas in elimination order, `F` as the
//! Forest–Tomlin row etas accumulated by updates, and `U` kept both
//! row-wise and column-wise (original row / basis position coordinates) so
//! both solve directions and the update's spike elimination can traverse
//! it cheaply.

use crate::linalg::eta::{EtaFile, ProductEta, RowEta, UpdateMode};
use crate::matrix::SparseMatrix;
use crate::{E, I};

const NIL: usize = usize::MAX;

/// Tunables of the factorization engine.
#[derive(Debug, Clone, Copy)]
pub struct BfpOptions {
    /// Pivot magnitude rejection threshold.
    pub eps_pivot: E,
    /// Drop tolerance for computed elements.
    pub eps_el: E,
    /// Threshold stability factor: a pivot must satisfy
    /// `|a(i,j)| >= tau * max_k |a(k,j)|`.
    pub tau: E,
    /// Basis exchanges absorbed before a refactorization is requested.
    pub max_updates: usize,
    /// Growth bound on `max_abs / init_max_abs` before a refactorization is
    /// requested.
    pub growth_limit: E,
}

impl Default for BfpOptions {
    fn default() -> Self {
        Self {
            eps_pivot: 2e-7,
            eps_el: 1e-12,
            tau: 0.1,
            max_updates: 250,
            growth_limit: 1e8,
        }
    }
}

/// Outcome of a full factorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactorInfo {
    Ok,
    /// The basis is numerically singular; the listed rows and basis
    /// positions could not be pivoted. The caller repairs the basis (slack
    /// substitution) and refactorizes.
    Singular {
        rows: Vec<usize>,
        positions: Vec<usize>,
    },
}

/// Outcome of absorbing one basis exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    Ok,
    /// The replacement pivot vanished; refactorize with the new basis.
    Singular,
    /// The update was absorbed but a refactorization should happen before
    /// the next solve.
    NeedRefactor,
}

/// Lifecycle of the factorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BfpState {
    #[default]
    Absent,
    Valid,
    Stale,
}

/// One base `L` column eta: subtract `mult * z[pivot_row]` from each listed
/// row during the forward pass.
#[derive(Debug, Clone)]
struct LCol {
    pivot_row: usize,
    entries: Vec<(usize, E)>,
}

/// Doubly linked ring of rows or columns bucketed by active nonzero count,
/// used to reach the next Markowitz candidate without scanning.
#[derive(Debug, Clone)]
struct CountRing {
    head: Vec<usize>,
    next: Vec<usize>,
    prev: Vec<usize>,
    count: Vec<usize>,
}

impl CountRing {
    fn new(n: usize) -> Self {
        Self {
            head: vec![NIL; n + 2],
            next: vec![NIL; n],
            prev: vec![NIL; n],
            count: vec![0; n],
        }
    }

    fn insert(&mut self, item: usize, count: usize) {
        self.count[item] = count;
        let h = self.head[count];
        self.next[item] = h;
        self.prev[item] = NIL;
        if h != NIL {
            self.prev[h] = item;
        }
        self.head[count] = item;
    }

    fn remove(&mut self, item: usize) {
        let (p, n) = (self.prev[item], self.next[item]);
        if p != NIL {
            self.next[p] = n;
        } else {
            self.head[self.count[item]] = n;
        }
        if n != NIL {
            self.prev[n] = p;
        }
        self.next[item] = NIL;
        self.prev[item] = NIL;
    }

    fn reassign(&mut self, item: usize, count: usize) {
        self.remove(item);
        self.insert(item, count);
    }
}

/// LU factorization of the current basis with eta updates.
#[derive(Debug, Clone)]
pub struct BasisFactorization {
    m: usize,
    opts: BfpOptions,
    mode: UpdateMode,
    state: BfpState,
    // stage <-> original row
    rp: Vec<usize>,
    rs: Vec<usize>,
    // stage <-> basis position
    cp: Vec<usize>,
    cs: Vec<usize>,
    letas: Vec<LCol>,
    etas: EtaFile,
    ft_updates: usize,
    /// Off-diagonal U entries by original row: `(basis position, value)`.
    urow: Vec<Vec<(usize, E)>>,
    /// Off-diagonal U entries by basis position: `(original row, value)`.
    ucol: Vec<Vec<(usize, E)>>,
    /// Diagonal pivot of the (unique) stage owned by each original row.
    udiag: Vec<E>,
    init_max_abs: E,
    max_abs: E,
    factor_count: usize,
}

impl BasisFactorization {
    pub fn new(mode: UpdateMode, opts: BfpOptions) -> Self {
        Self {
            m: 0,
            opts,
            mode,
            state: BfpState::Absent,
            rp: Vec::new(),
            rs: Vec::new(),
            cp: Vec::new(),
            cs: Vec::new(),
            letas: Vec::new(),
            etas: EtaFile::default(),
            ft_updates: 0,
            urow: Vec::new(),
            ucol: Vec::new(),
            udiag: Vec::new(),
            init_max_abs: 1.0,
            max_abs: 1.0,
            factor_count: 0,
        }
    }

    pub fn state(&self) -> BfpState {
        self.state
    }

    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    /// Total basis exchanges absorbed since the last factorization.
    pub fn updates(&self) -> usize {
        self.etas.product.len() + self.ft_updates
    }

    pub fn factor_count(&self) -> usize {
        self.factor_count
    }

    /// Gathers the basis column for member `j` in original-row coordinates.
    fn basis_column(mat: &SparseMatrix, j: usize) -> Vec<(usize, E)> {
        let n = mat.ncols();
        if j < n {
            let (idx, val) = mat.column(j);
            idx.iter().copied().zip(val.iter().copied()).collect()
        } else {
            vec![(j - n, -1.0)]
        }
    }

    /// Recomputes the factorization from scratch for the given basis.
    pub fn factor(&mut self, mat: &SparseMatrix, basis: &[I]) -> FactorInfo {
        let m = mat.nrows();
        debug_assert_eq!(basis.len(), m);
        self.m = m;
        self.rp = vec![NIL; m];
        self.rs = vec![NIL; m];
        self.cp = vec![NIL; m];
        self.cs = vec![NIL; m];
        self.letas.clear();
        self.etas.clear();
        self.ft_updates = 0;
        self.urow = vec![Vec::new(); m];
        self.ucol = vec![Vec::new(); m];
        self.udiag = vec![0.0; m];
        self.factor_count += 1;

        // Mutable working copy of the basis columns.
        let mut work: Vec<Vec<(usize, E)>> = (0..m)
            .map(|p| Self::basis_column(mat, basis[p]))
            .collect();
        let mut row_active = vec![true; m];
        let mut col_active = vec![true; m];
        // Columns possibly holding a nonzero of each row (lazy, may contain
        // stale references that are re-checked on use).
        let mut rowlist: Vec<Vec<usize>> = vec![Vec::new(); m];
        let mut rowcount = vec![0usize; m];
        let mut colcount = vec![0usize; m];
        for (p, col) in work.iter().enumerate() {
            colcount[p] = col.len();
            for &(r, _) in col {
                rowlist[r].push(p);
                rowcount[r] += 1;
            }
        }
        let mut col_ring = CountRing::new(m);
        let mut row_ring = CountRing::new(m);
        for p in 0..m {
            col_ring.insert(p, colcount[p]);
        }
        for r in 0..m {
            row_ring.insert(r, rowcount[r]);
        }

        let entry_val = |work: &Vec<Vec<(usize, E)>>, p: usize, r: usize| -> Option<E> {
            work[p].iter().find(|&&(row, _)| row == r).map(|&(_, v)| v)
        };

        self.init_max_abs = 0.0;
        let mut stages = 0usize;

        for k in 0..m {
            // Pivot selection: singleton passes first, then bounded
            // Markowitz search over the lowest count buckets.
            let mut best: Option<(usize, usize, E, usize)> = None; // (row, pos, val, markowitz)
            // Singleton columns carry no fill at all.
            let mut c = col_ring.head[1];
            while c != NIL {
                if col_active[c] {
                    if let Some(&(r, v)) = work[c].iter().find(|&&(r, _)| row_active[r]) {
                        if v.abs() >= self.opts.eps_pivot {
                            best = Some((r, c, v, 0));
                            break;
                        }
                    }
                }
                c = col_ring.next[c];
            }
            if best.is_none() {
                // Singleton rows are fill-free as well.
                let mut r = row_ring.head[1];
                while r != NIL {
                    if row_active[r] {
                        let found = rowlist[r].iter().copied().find_map(|p| {
                            if !col_active[p] {
                                return None;
                            }
                            entry_val(&work, p, r).map(|v| (p, v))
                        });
                        if let Some((p, v)) = found {
                            if v.abs() >= self.opts.eps_pivot {
                                best = Some((r, p, v, 0));
                                break;
                            }
                        }
                    }
                    r = row_ring.next[r];
                }
            }
            if best.is_none() {
                // General Markowitz: examine a bounded number of the
                // sparsest candidate columns.
                const MAX_SCAN: usize = 8;
                let mut scanned = 0;
                'outer: for count in 2..=m {
                    let mut c = col_ring.head[count];
                    while c != NIL {
                        if col_active[c] {
                            let colmax = work[c]
                                .iter()
                                .filter(|&&(r, _)| row_active[r])
                                .map(|&(_, v)| v.abs())
                                .fold(0.0, E::max);
                            for &(r, v) in work[c].iter().filter(|&&(r, _)| row_active[r]) {
                                if v.abs() < self.opts.eps_pivot
                                    || v.abs() < self.opts.tau * colmax
                                {
                                    continue;
                                }
                                let mc = (rowcount[r] - 1) * (colcount[c] - 1);
                                let better = match best {
                                    None => true,
                                    Some((_, _, bv, bm)) => {
                                        mc < bm || (mc == bm && v.abs() > bv.abs())
                                    }
                                };
                                if better {
                                    best = Some((r, c, v, mc));
                                }
                            }
                            scanned += 1;
                            if scanned >= MAX_SCAN && best.is_some() {
                                break 'outer;
                            }
                        }
                        c = col_ring.next[c];
                    }
                }
            }
            if best.is_none() {
                // Last resort: any active entry above the pivot tolerance.
                for p in 0..m {
                    if !col_active[p] {
                        continue;
                    }
                    for &(r, v) in work[p].iter().filter(|&&(r, _)| row_active[r]) {
                        if v.abs() >= self.opts.eps_pivot {
                            let mc = (rowcount[r] - 1) * (colcount[p] - 1);
                            let better = match best {
                                None => true,
                                Some((_, _, bv, bm)) => mc < bm || (mc == bm && v.abs() > bv.abs()),
                            };
                            if better {
                                best = Some((r, p, v, mc));
                            }
                        }
                    }
                }
            }

            let Some((pr, pc, pv, _)) = best else {
                break; // remaining structure is singular
            };
            stages = k + 1;

            self.rp[k] = pr;
            self.rs[pr] = k;
            self.cp[k] = pc;
            self.cs[pc] = k;

            // Split the pivot column into the L eta (active rows) and the
            // frozen U entries (rows pivoted at earlier stages).
            let mut leta = LCol {
                pivot_row: pr,
                entries: Vec::new(),
            };
            let mut pivot_active: Vec<(usize, E)> = Vec::new();
            for &(r, v) in &work[pc] {
                if r == pr {
                    continue;
                }
                if row_active[r] {
                    leta.entries.push((r, v / pv));
                    pivot_active.push((r, v));
                } else {
                    self.ucol[pc].push((r, v));
                    self.urow[r].push((pc, v));
                    self.init_max_abs = self.init_max_abs.max(v.abs());
                }
            }
            self.udiag[pr] = pv;
            self.init_max_abs = self.init_max_abs.max(pv.abs());

            // Deactivate pivot row and column, maintaining counts and rings.
            row_active[pr] = false;
            col_active[pc] = false;
            row_ring.remove(pr);
            col_ring.remove(pc);
            for &(r, _) in &pivot_active {
                rowcount[r] -= 1;
                row_ring.reassign(r, rowcount[r]);
            }
            // rowlist references are lazy and may repeat after a drop/refill
            // cycle; dedupe before using them for count arithmetic.
            let mut pivot_row_cols: Vec<usize> = rowlist[pr]
                .iter()
                .copied()
                .filter(|&p| p != pc && col_active[p] && entry_val(&work, p, pr).is_some())
                .collect();
            pivot_row_cols.sort_unstable();
            pivot_row_cols.dedup();
            for &p in &pivot_row_cols {
                colcount[p] -= 1;
                col_ring.reassign(p, colcount[p]);
            }

            // Rank-one elimination on the active submatrix.
            for &c2 in &pivot_row_cols {
                let Some(u2) = entry_val(&work, c2, pr) else {
                    continue;
                };
                for &(r, v) in &pivot_active {
                    let mult = v / pv;
                    let delta = mult * u2;
                    if delta == 0.0 {
                        continue;
                    }
                    let pos = work[c2].iter().position(|&(row, _)| row == r);
                    match pos {
                        Some(idx) => {
                            work[c2][idx].1 -= delta;
                            if work[c2][idx].1.abs() <= self.opts.eps_el {
                                work[c2].swap_remove(idx);
                                colcount[c2] -= 1;
                                col_ring.reassign(c2, colcount[c2]);
                                rowcount[r] -= 1;
                                row_ring.reassign(r, rowcount[r]);
                            }
                        }
                        None => {
                            work[c2].push((r, -delta));
                            rowlist[r].push(c2);
                            colcount[c2] += 1;
                            col_ring.reassign(c2, colcount[c2]);
                            rowcount[r] += 1;
                            row_ring.reassign(r, rowcount[r]);
                        }
                    }
                }
            }

            self.letas.push(leta);
        }

        if stages < m {
            let rows: Vec<usize> = (0..m).filter(|&r| row_active[r]).collect();
            let positions: Vec<usize> = (0..m).filter(|&p| col_active[p]).collect();
            self.state = BfpState::Absent;
            return FactorInfo::Singular { rows, positions };
        }

        if self.init_max_abs == 0.0 {
            self.init_max_abs = 1.0;
        }
        self.max_abs = self.init_max_abs;
        self.state = BfpState::Valid;
        FactorInfo::Ok
    }

    /// Recomputes from scratch; alias for [`BasisFactorization::factor`]
    /// matching the external trigger.
    pub fn refactor(&mut self, mat: &SparseMatrix, basis: &[I]) -> FactorInfo {
        self.factor(mat, basis)
    }

    /// Applies the base `L` etas and the Forest–Tomlin row etas to a work
    /// vector in original-row coordinates.
    fn apply_l(&self, z: &mut [E]) {
        for eta in &self.letas {
            let zp = z[eta.pivot_row];
            if zp != 0.0 {
                for &(r, l) in &eta.entries {
                    z[r] -= l * zp;
                }
            }
        }
        for eta in &self.etas.rows {
            eta.apply(z);
        }
    }

    /// `y <- B^{-1} rhs`. Input in original-row coordinates, output indexed
    /// by basis position.
    pub fn ftran(&self, rhs: &[E]) -> Vec<E> {
        debug_assert_eq!(rhs.len(), self.m);
        let mut z = rhs.to_vec();
        self.apply_l(&mut z);
        // Back substitution on U.
        let mut w = vec![0.0; self.m];
        for k in (0..self.m).rev() {
            let r = self.rp[k];
            let c = self.cp[k];
            let mut acc = z[r];
            for &(c2, u) in &self.urow[r] {
                acc -= u * w[c2];
            }
            w[c] = acc / self.udiag[r];
        }
        for eta in &self.etas.product {
            eta.apply(&mut w);
        }
        w
    }

    /// `y <- B^{-T} rhs`. Input indexed by basis position, output in
    /// original-row coordinates.
    pub fn btran(&self, rhs: &[E]) -> Vec<E> {
        debug_assert_eq!(rhs.len(), self.m);
        let mut c_work = rhs.to_vec();
        for eta in self.etas.product.iter().rev() {
            eta.apply_transposed(&mut c_work);
        }
        // Forward substitution on U^T.
        let mut t = vec![0.0; self.m];
        for k in 0..self.m {
            let r = self.rp[k];
            let c = self.cp[k];
            let mut acc = c_work[c];
            for &(r2, u) in &self.ucol[c] {
                acc -= u * t[r2];
            }
            t[r] = acc / self.udiag[r];
        }
        for eta in self.etas.rows.iter().rev() {
            eta.apply_transposed(&mut t);
        }
        for eta in self.letas.iter().rev() {
            let mut acc = t[eta.pivot_row];
            for &(r, l) in &eta.entries {
                acc -= l * t[r];
            }
            t[eta.pivot_row] = acc;
        }
        t
    }

    /// Absorbs one basis exchange: the member at `leaving_pos` is replaced
    /// by the column whose original-row entries are `entering` and whose
    /// FTRAN image is `alpha`.
    pub fn update(
        &mut self,
        entering: &[(usize, E)],
        leaving_pos: usize,
        alpha: &[E],
    ) -> UpdateStatus {
        if self.state != BfpState::Valid {
            return UpdateStatus::NeedRefactor;
        }
        match self.mode {
            UpdateMode::ProductForm => {
                if alpha[leaving_pos].abs() < self.opts.eps_pivot {
                    self.state = BfpState::Stale;
                    return UpdateStatus::Singular;
                }
                let eta = ProductEta::from_alpha(alpha, leaving_pos, self.opts.eps_el);
                self.max_abs = self.max_abs.max(
                    eta.entries
                        .iter()
                        .map(|&(_, v)| v.abs())
                        .fold(eta.pivot_val.abs(), E::max),
                );
                self.etas.product.push(eta);
            }
            UpdateMode::ForestTomlin => {
                if let Some(status) = self.forest_tomlin_update(entering, leaving_pos) {
                    return status;
                }
            }
        }
        if self.updates() >= self.opts.max_updates
            || self.max_abs / self.init_max_abs > self.opts.growth_limit
        {
            self.state = BfpState::Stale;
            return UpdateStatus::NeedRefactor;
        }
        UpdateStatus::Ok
    }

    /// Permutation-and-spike update of `U`; returns a terminal status on
    /// failure, `None` on success.
    fn forest_tomlin_update(
        &mut self,
        entering: &[(usize, E)],
        leaving_pos: usize,
    ) -> Option<UpdateStatus> {
        let m = self.m;
        // Spike: the entering column pushed through L and the prior row
        // etas, left in original-row coordinates.
        let mut w = vec![0.0; m];
        for &(r, v) in entering {
            w[r] += v;
        }
        self.apply_l(&mut w);

        let k0 = self.cs[leaving_pos];
        let r0 = self.rp[k0];

        // Drop the leaving column from both U mirrors.
        let old_col = std::mem::take(&mut self.ucol[leaving_pos]);
        for (r, _) in old_col {
            self.urow[r].retain(|&(c, _)| c != leaving_pos);
        }

        // Gather row r0 densely (by basis position) and drop it from the
        // column mirrors.
        let mut rowvals = vec![0.0; m];
        let old_row = std::mem::take(&mut self.urow[r0]);
        for (c, u) in old_row {
            rowvals[c] = u;
            self.ucol[c].retain(|&(r, _)| r != r0);
        }

        // Cycle the permutations: stages k0+1.. shift down, the pivot pair
        // moves last.
        for k in k0..m - 1 {
            self.rp[k] = self.rp[k + 1];
            self.rs[self.rp[k]] = k;
            self.cp[k] = self.cp[k + 1];
            self.cs[self.cp[k]] = k;
        }
        self.rp[m - 1] = r0;
        self.rs[r0] = m - 1;
        self.cp[m - 1] = leaving_pos;
        self.cs[leaving_pos] = m - 1;

        // Insert the spike as the (new) last column.
        rowvals[leaving_pos] = w[r0];
        for (r, &v) in w.iter().enumerate() {
            if r != r0 && v.abs() > self.opts.eps_el {
                self.ucol[leaving_pos].push((r, v));
                self.urow[r].push((leaving_pos, v));
                self.max_abs = self.max_abs.max(v.abs());
            }
        }

        // Eliminate the displaced row against the diagonal of each earlier
        // stage, recording the multipliers as row etas.
        for k in k0..m - 1 {
            let c = self.cp[k];
            let v = rowvals[c];
            rowvals[c] = 0.0;
            if v.abs() <= self.opts.eps_el {
                continue;
            }
            let r_diag = self.rp[k];
            let mult = v / self.udiag[r_diag];
            for &(c2, u2) in &self.urow[r_diag] {
                rowvals[c2] -= mult * u2;
            }
            self.etas.rows.push(RowEta {
                target: r0,
                source: r_diag,
                mult,
            });
        }

        let diag = rowvals[leaving_pos];
        if diag.abs() < self.opts.eps_pivot {
            self.state = BfpState::Stale;
            return Some(UpdateStatus::Singular);
        }
        self.udiag[r0] = diag;
        self.max_abs = self.max_abs.max(diag.abs());
        self.ft_updates += 1;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::eta::UpdateMode;
    use rstest::rstest;

    /// 3x4 structural matrix used across the tests:
    ///
    /// ```text
    ///      c0   c1   c2   c3
    /// r0 [ 2.0  1.0   .   1.0 ]
    /// r1 [  .   3.0  1.0  2.0 ]
    /// r2 [ 1.0   .   2.0   .  ]
    /// ```
    fn sample_matrix() -> SparseMatrix {
        let mut mat = SparseMatrix::new(3, 4, 1e-12);
        mat.set(0, 0, 2.0).unwrap();
        mat.set(2, 0, 1.0).unwrap();
        mat.set(0, 1, 1.0).unwrap();
        mat.set(1, 1, 3.0).unwrap();
        mat.set(1, 2, 1.0).unwrap();
        mat.set(2, 2, 2.0).unwrap();
        mat.set(0, 3, 1.0).unwrap();
        mat.set(1, 3, 2.0).unwrap();
        mat
    }

    fn dense_basis(mat: &SparseMatrix, basis: &[usize]) -> Vec<Vec<E>> {
        let m = mat.nrows();
        let mut b = vec![vec![0.0; m]; m]; // b[row][pos]
        for (p, &j) in basis.iter().enumerate() {
            for (r, v) in BasisFactorization::basis_column(mat, j) {
                b[r][p] = v;
            }
        }
        b
    }

    fn mul_basis(b: &[Vec<E>], x: &[E]) -> Vec<E> {
        let m = b.len();
        (0..m).map(|r| (0..m).map(|p| b[r][p] * x[p]).sum()).collect()
    }

    fn mul_basis_t(b: &[Vec<E>], y: &[E]) -> Vec<E> {
        let m = b.len();
        (0..m).map(|p| (0..m).map(|r| b[r][p] * y[r]).sum()).collect()
    }

    fn assert_close(a: &[E], b: &[E], tol: E) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < tol, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn slack_basis_is_negated_identity() {
        let mat = sample_matrix();
        let basis = vec![4, 5, 6]; // slack of each row
        let mut bfp = BasisFactorization::new(UpdateMode::ForestTomlin, BfpOptions::default());
        assert_eq!(bfp.factor(&mat, &basis), FactorInfo::Ok);
        let x = bfp.ftran(&[3.0, -1.0, 2.0]);
        assert_close(&x, &[-3.0, 1.0, -2.0], 1e-12);
        let y = bfp.btran(&[1.0, 2.0, 3.0]);
        assert_close(&y, &[-1.0, -2.0, -3.0], 1e-12);
    }

    #[rstest]
    #[case(vec![0, 1, 2])]
    #[case(vec![0, 2, 5])]
    #[case(vec![3, 1, 6])]
    #[case(vec![4, 3, 0])]
    fn ftran_btran_solve_the_basis(#[case] basis: Vec<usize>) {
        let mat = sample_matrix();
        let b = dense_basis(&mat, &basis);
        let mut bfp = BasisFactorization::new(UpdateMode::ForestTomlin, BfpOptions::default());
        assert_eq!(bfp.factor(&mat, &basis), FactorInfo::Ok);

        let rhs = vec![1.0, -2.0, 0.5];
        let x = bfp.ftran(&rhs);
        assert_close(&mul_basis(&b, &x), &rhs, 1e-9);

        let c = vec![0.25, 1.0, -1.0];
        let y = bfp.btran(&c);
        assert_close(&mul_basis_t(&b, &y), &c, 1e-9);
    }

    #[test]
    fn singular_basis_reports_leftovers() {
        let mat = sample_matrix();
        // Two copies of column 0 cannot both be pivoted.
        let basis = vec![0, 0, 5];
        let mut bfp = BasisFactorization::new(UpdateMode::ForestTomlin, BfpOptions::default());
        match bfp.factor(&mat, &basis) {
            FactorInfo::Singular { rows, positions } => {
                assert!(!rows.is_empty());
                assert!(!positions.is_empty());
            }
            FactorInfo::Ok => panic!("duplicate column basis must be singular"),
        }
    }

    #[rstest]
    #[case(UpdateMode::ForestTomlin)]
    #[case(UpdateMode::ProductForm)]
    fn update_matches_fresh_factorization(#[case] mode: UpdateMode) {
        let mat = sample_matrix();
        let mut basis = vec![4, 1, 6]; // slack r0, col 1, slack r2
        let mut bfp = BasisFactorization::new(mode, BfpOptions::default());
        assert_eq!(bfp.factor(&mat, &basis), FactorInfo::Ok);

        // Exchange: column 2 enters, position 2 (slack of r2) leaves.
        let entering = BasisFactorization::basis_column(&mat, 2);
        let mut rhs = vec![0.0; 3];
        for &(r, v) in &entering {
            rhs[r] += v;
        }
        let alpha = bfp.ftran(&rhs);
        assert_eq!(bfp.update(&entering, 2, &alpha), UpdateStatus::Ok);
        basis[2] = 2;

        let b = dense_basis(&mat, &basis);
        let rhs = vec![1.0, 2.0, 3.0];
        let x = bfp.ftran(&rhs);
        assert_close(&mul_basis(&b, &x), &rhs, 1e-9);
        let c = vec![-1.0, 0.5, 2.0];
        let y = bfp.btran(&c);
        assert_close(&mul_basis_t(&b, &y), &c, 1e-9);
    }

    #[rstest]
    #[case(UpdateMode::ForestTomlin)]
    #[case(UpdateMode::ProductForm)]
    fn chained_updates_stay_consistent(#[case] mode: UpdateMode) {
        let mat = sample_matrix();
        let mut basis = vec![4, 5, 6];
        let mut bfp = BasisFactorization::new(mode, BfpOptions::default());
        assert_eq!(bfp.factor(&mat, &basis), FactorInfo::Ok);

        // Bring structural columns in one at a time.
        for (enter, pos) in [(0usize, 0usize), (1, 1), (2, 2)] {
            let entering = BasisFactorization::basis_column(&mat, enter);
            let mut rhs = vec![0.0; 3];
            for &(r, v) in &entering {
                rhs[r] += v;
            }
            let alpha = bfp.ftran(&rhs);
            assert_eq!(bfp.update(&entering, pos, &alpha), UpdateStatus::Ok);
            basis[pos] = enter;

            let b = dense_basis(&mat, &basis);
            let probe = vec![0.5, -1.5, 2.5];
            let x = bfp.ftran(&probe);
            assert_close(&mul_basis(&b, &x), &probe, 1e-8);
            let y = bfp.btran(&probe);
            assert_close(&mul_basis_t(&b, &y), &probe, 1e-8);
        }
    }

    #[test]
    fn update_limit_requests_refactorization() {
        let mat = sample_matrix();
        let basis = vec![4, 5, 6];
        let opts = BfpOptions {
            max_updates: 1,
            ..BfpOptions::default()
        };
        let mut bfp = BasisFactorization::new(UpdateMode::ProductForm, opts);
        assert_eq!(bfp.factor(&mat, &basis), FactorInfo::Ok);

        let entering = BasisFactorization::basis_column(&mat, 0);
        let mut rhs = vec![0.0; 3];
        for &(r, v) in &entering {
            rhs[r] += v;
        }
        let alpha = bfp.ftran(&rhs);
        assert_eq!(
            bfp.update(&entering, 0, &alpha),
            UpdateStatus::NeedRefactor
        );
        assert_eq!(bfp.state(), BfpState::Stale);
    }

    #[test]
    fn ft_update_on_permuted_factor() {
        // Force a nontrivial permutation by starting from structural
        // columns, then replace the middle position.
        let mat = sample_matrix();
        let mut basis = vec![3, 2, 0];
        let mut bfp = BasisFactorization::new(UpdateMode::ForestTomlin, BfpOptions::default());
        assert_eq!(bfp.factor(&mat, &basis), FactorInfo::Ok);

        let entering = BasisFactorization::basis_column(&mat, 5); // slack r1
        let mut rhs = vec![0.0; 3];
        for &(r, v) in &entering {
            rhs[r] += v;
        }
        let alpha = bfp.ftran(&rhs);
        assert_eq!(bfp.update(&entering, 1, &alpha), UpdateStatus::Ok);
        basis[1] = 5;

        let b = dense_basis(&mat, &basis);
        let probe = vec![2.0, 0.0, -1.0];
        let x = bfp.ftran(&probe);
        assert_close(&mul_basis(&b, &x), &probe, 1e-9);
    }
}
