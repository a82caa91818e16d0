//! Column-major sparse storage for the constraint matrix.
//!
//! Each column owns a contiguous run of the shared value/row-index arena:
//! `values[start[c]..start[c] + len[c])`, with `len[c] <= max[c]` slots
//! reserved. Columns are kept on a doubly linked list in arena order so a
//! column can grow into the gap ahead of it, be relocated to the arena tail
//! (`remax`), or be repacked by a full compaction, all without touching the
//! other columns' views.
//!
//! A row-major mirror is materialized on demand; it is a read-only snapshot
//! and is invalidated by any mutation.

use crate::{E, I, SolverError};

const NIL: usize = usize::MAX;

/// Extra slots reserved whenever a column region is (re)allocated.
const COL_SLACK: usize = 4;

/// Column-major compressed sparse matrix with per-column growth regions.
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    nrows: usize,
    ncols: usize,
    start: Vec<usize>,
    len: Vec<usize>,
    max: Vec<usize>,
    // Doubly linked list of columns in arena order.
    ring_next: Vec<usize>,
    ring_prev: Vec<usize>,
    ring_head: usize,
    ring_tail: usize,
    rowidx: Vec<I>,
    values: Vec<E>,
    /// First unused arena slot.
    arena_end: usize,
    /// Elements with magnitude at or below this are dropped.
    eps_el: E,
}

/// Read-only row-major snapshot of a [`SparseMatrix`].
#[derive(Debug, Clone)]
pub struct RowMajor {
    pub row_start: Vec<usize>,
    pub colidx: Vec<I>,
    pub values: Vec<E>,
}

impl RowMajor {
    /// The nonzeros of row `r` as parallel column-index / value slices.
    pub fn row(&self, r: usize) -> (&[I], &[E]) {
        let lo = self.row_start[r];
        let hi = self.row_start[r + 1];
        (&self.colidx[lo..hi], &self.values[lo..hi])
    }
}

impl SparseMatrix {
    pub fn new(nrows: usize, ncols: usize, eps_el: E) -> Self {
        let mut m = Self {
            nrows,
            ncols: 0,
            start: Vec::new(),
            len: Vec::new(),
            max: Vec::new(),
            ring_next: Vec::new(),
            ring_prev: Vec::new(),
            ring_head: NIL,
            ring_tail: NIL,
            rowidx: Vec::new(),
            values: Vec::new(),
            arena_end: 0,
            eps_el,
        };
        m.append_cols(ncols);
        m
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.len.iter().sum()
    }

    pub fn eps_el(&self) -> E {
        self.eps_el
    }

    pub fn set_eps_el(&mut self, eps: E) {
        self.eps_el = eps;
    }

    /// Appends `count` empty rows.
    pub fn append_rows(&mut self, count: usize) {
        self.nrows += count;
    }

    /// Appends `count` empty columns at the tail of the ring.
    pub fn append_cols(&mut self, count: usize) {
        for _ in 0..count {
            let c = self.ncols;
            self.start.push(self.arena_end);
            self.len.push(0);
            self.max.push(0);
            self.ring_next.push(NIL);
            self.ring_prev.push(self.ring_tail);
            if self.ring_tail != NIL {
                self.ring_next[self.ring_tail] = c;
            } else {
                self.ring_head = c;
            }
            self.ring_tail = c;
            self.ncols += 1;
        }
    }

    /// Removes column `c`; columns above shift down by one.
    pub fn remove_col(&mut self, c: usize) -> Result<(), SolverError> {
        if c >= self.ncols {
            return Err(SolverError::InvalidIndex);
        }
        // Unlink from the ring.
        let (prev, next) = (self.ring_prev[c], self.ring_next[c]);
        if prev != NIL {
            self.ring_next[prev] = next;
        } else {
            self.ring_head = next;
        }
        if next != NIL {
            self.ring_prev[next] = prev;
        } else {
            self.ring_tail = prev;
        }
        self.start.remove(c);
        self.len.remove(c);
        self.max.remove(c);
        self.ring_next.remove(c);
        self.ring_prev.remove(c);
        // Ring entries hold column slots; renumber those above the hole.
        for link in self.ring_next.iter_mut().chain(self.ring_prev.iter_mut()) {
            if *link != NIL && *link > c {
                *link -= 1;
            }
        }
        if self.ring_head != NIL && self.ring_head > c {
            self.ring_head -= 1;
        }
        if self.ring_tail != NIL && self.ring_tail > c {
            self.ring_tail -= 1;
        }
        self.ncols -= 1;
        Ok(())
    }

    /// Removes row `r`, dropping its elements; rows above shift down by one.
    pub fn remove_row(&mut self, r: usize) -> Result<(), SolverError> {
        if r >= self.nrows {
            return Err(SolverError::InvalidIndex);
        }
        for c in 0..self.ncols {
            let lo = self.start[c];
            let mut k = 0;
            while k < self.len[c] {
                let row = self.rowidx[lo + k];
                if row == r {
                    // Swap-delete inside the column region, then restore order.
                    let last = lo + self.len[c] - 1;
                    self.rowidx.swap(lo + k, last);
                    self.values.swap(lo + k, last);
                    self.len[c] -= 1;
                    self.sort_column(c);
                } else {
                    if row > r {
                        self.rowidx[lo + k] = row - 1;
                    }
                    k += 1;
                }
            }
        }
        self.nrows -= 1;
        Ok(())
    }

    fn sort_column(&mut self, c: usize) {
        let lo = self.start[c];
        let hi = lo + self.len[c];
        let mut pairs: Vec<(I, E)> = self.rowidx[lo..hi]
            .iter()
            .copied()
            .zip(self.values[lo..hi].iter().copied())
            .collect();
        pairs.sort_by_key(|&(r, _)| r);
        for (k, (r, v)) in pairs.into_iter().enumerate() {
            self.rowidx[lo + k] = r;
            self.values[lo + k] = v;
        }
    }

    /// The nonzeros of column `c` as parallel row-index / value slices.
    ///
    /// The view is stable until the next mutation.
    pub fn column(&self, c: usize) -> (&[I], &[E]) {
        let lo = self.start[c];
        let hi = lo + self.len[c];
        (&self.rowidx[lo..hi], &self.values[lo..hi])
    }

    pub fn col_len(&self, c: usize) -> usize {
        self.len[c]
    }

    /// Value at `(r, c)`, zero when the position is structurally empty.
    pub fn get(&self, r: usize, c: usize) -> E {
        let (idx, val) = self.column(c);
        match idx.binary_search(&r) {
            Ok(k) => val[k],
            Err(_) => 0.0,
        }
    }

    /// Adds `v` to the element at `(r, c)`, inserting or dropping as needed.
    ///
    /// An existing element whose updated magnitude falls to `eps_el` or below
    /// is removed from the structure.
    pub fn add_coefficient(&mut self, r: usize, c: usize, v: E) -> Result<(), SolverError> {
        if r >= self.nrows || c >= self.ncols {
            return Err(SolverError::InvalidIndex);
        }
        let lo = self.start[c];
        match self.rowidx[lo..lo + self.len[c]].binary_search(&r) {
            Ok(k) => {
                let sum = self.values[lo + k] + v;
                if sum.abs() <= self.eps_el {
                    self.delete_at(c, k);
                } else {
                    self.values[lo + k] = sum;
                }
            }
            Err(k) => {
                if v.abs() > self.eps_el {
                    self.insert_at(c, k, r, v);
                }
            }
        }
        Ok(())
    }

    /// Overwrites the element at `(r, c)`; a magnitude at or below `eps_el`
    /// removes it.
    pub fn set(&mut self, r: usize, c: usize, v: E) -> Result<(), SolverError> {
        if r >= self.nrows || c >= self.ncols {
            return Err(SolverError::InvalidIndex);
        }
        let lo = self.start[c];
        match self.rowidx[lo..lo + self.len[c]].binary_search(&r) {
            Ok(k) => {
                if v.abs() <= self.eps_el {
                    self.delete_at(c, k);
                } else {
                    self.values[lo + k] = v;
                }
            }
            Err(k) => {
                if v.abs() > self.eps_el {
                    self.insert_at(c, k, r, v);
                }
            }
        }
        Ok(())
    }

    /// Replaces the whole of column `c` with the given sparse entries.
    pub fn set_column(&mut self, c: usize, entries: &[(I, E)]) -> Result<(), SolverError> {
        if c >= self.ncols {
            return Err(SolverError::InvalidIndex);
        }
        if entries.iter().any(|&(r, _)| r >= self.nrows) {
            return Err(SolverError::InvalidIndex);
        }
        self.len[c] = 0;
        let mut sorted: Vec<(I, E)> = entries
            .iter()
            .copied()
            .filter(|&(_, v)| v.abs() > self.eps_el)
            .collect();
        sorted.sort_by_key(|&(r, _)| r);
        for (k, (r, v)) in sorted.into_iter().enumerate() {
            self.insert_at(c, k, r, v);
        }
        Ok(())
    }

    fn delete_at(&mut self, c: usize, k: usize) {
        let lo = self.start[c];
        let n = self.len[c];
        for i in k..n - 1 {
            self.rowidx[lo + i] = self.rowidx[lo + i + 1];
            self.values[lo + i] = self.values[lo + i + 1];
        }
        self.len[c] = n - 1;
    }

    fn insert_at(&mut self, c: usize, k: usize, r: I, v: E) {
        if self.len[c] == self.max[c] {
            self.remax(c, self.max[c] * 2 + COL_SLACK);
        }
        let lo = self.start[c];
        let n = self.len[c];
        for i in (k..n).rev() {
            self.rowidx[lo + i + 1] = self.rowidx[lo + i];
            self.values[lo + i + 1] = self.values[lo + i];
        }
        self.rowidx[lo + k] = r;
        self.values[lo + k] = v;
        self.len[c] = n + 1;
    }

    /// Grows column `c` to `new_max` reserved slots, relocating it to the
    /// arena tail; triggers a compaction first when the arena has drifted too
    /// far from its packed size.
    fn remax(&mut self, c: usize, new_max: usize) {
        if self.arena_end + new_max > 2 * self.nnz() + new_max + COL_SLACK * self.ncols {
            self.compact();
        }
        let old_lo = self.start[c];
        let n = self.len[c];
        let new_lo = self.arena_end;
        self.values.resize(new_lo + new_max, 0.0);
        self.rowidx.resize(new_lo + new_max, 0);
        for i in 0..n {
            self.rowidx[new_lo + i] = self.rowidx[old_lo + i];
            self.values[new_lo + i] = self.values[old_lo + i];
        }
        self.start[c] = new_lo;
        self.max[c] = new_max;
        self.arena_end = new_lo + new_max;
        // Move the column to the ring tail to match its arena position.
        if self.ring_tail != c {
            let (prev, next) = (self.ring_prev[c], self.ring_next[c]);
            if prev != NIL {
                self.ring_next[prev] = next;
            } else {
                self.ring_head = next;
            }
            if next != NIL {
                self.ring_prev[next] = prev;
            }
            self.ring_prev[c] = self.ring_tail;
            self.ring_next[c] = NIL;
            self.ring_next[self.ring_tail] = c;
            self.ring_tail = c;
        }
    }

    /// Repacks the arena in ring order, leaving `COL_SLACK` headroom per
    /// column.
    fn compact(&mut self) {
        let mut new_rowidx = Vec::with_capacity(self.nnz() + COL_SLACK * self.ncols);
        let mut new_values = Vec::with_capacity(self.nnz() + COL_SLACK * self.ncols);
        let mut c = self.ring_head;
        while c != NIL {
            let lo = self.start[c];
            let n = self.len[c];
            self.start[c] = new_rowidx.len();
            self.max[c] = n + COL_SLACK;
            new_rowidx.extend_from_slice(&self.rowidx[lo..lo + n]);
            new_values.extend_from_slice(&self.values[lo..lo + n]);
            new_rowidx.resize(self.start[c] + self.max[c], 0);
            new_values.resize(self.start[c] + self.max[c], 0.0);
            c = self.ring_next[c];
        }
        self.arena_end = new_rowidx.len();
        self.rowidx = new_rowidx;
        self.values = new_values;
    }

    /// Multiplies every element of column `c` by `factor`.
    pub fn scale_col(&mut self, c: usize, factor: E) {
        let lo = self.start[c];
        for i in 0..self.len[c] {
            self.values[lo + i] *= factor;
        }
    }

    /// Multiplies every element of row `r` by `factor`.
    pub fn scale_row(&mut self, r: usize, factor: E) {
        for c in 0..self.ncols {
            let lo = self.start[c];
            if let Ok(k) = self.rowidx[lo..lo + self.len[c]].binary_search(&r) {
                self.values[lo + k] *= factor;
            }
        }
    }

    /// `y += mult * column(c)`: the scaled-SAXPY primitive used by the
    /// factorization's triangular solves and by activity computation.
    pub fn axpy_column(&self, c: usize, mult: E, y: &mut [E]) {
        let (idx, val) = self.column(c);
        for (&r, &v) in idx.iter().zip(val.iter()) {
            y[r] += mult * v;
        }
    }

    /// `A^T x` restricted to column `c`: the dot product of column `c` with
    /// the dense vector `x`.
    pub fn dot_column(&self, c: usize, x: &[E]) -> E {
        let (idx, val) = self.column(c);
        idx.iter().zip(val.iter()).map(|(&r, &v)| x[r] * v).sum()
    }

    /// Builds the row-major mirror.
    pub fn to_row_major(&self) -> RowMajor {
        let mut counts = vec![0usize; self.nrows + 1];
        for c in 0..self.ncols {
            let (idx, _) = self.column(c);
            for &r in idx {
                counts[r + 1] += 1;
            }
        }
        for r in 0..self.nrows {
            counts[r + 1] += counts[r];
        }
        let row_start = counts.clone();
        let nnz = self.nnz();
        let mut colidx = vec![0 as I; nnz];
        let mut values = vec![0.0; nnz];
        let mut cursor = row_start.clone();
        for c in 0..self.ncols {
            let (idx, val) = self.column(c);
            for (&r, &v) in idx.iter().zip(val.iter()) {
                colidx[cursor[r]] = c;
                values[cursor[r]] = v;
                cursor[r] += 1;
            }
        }
        RowMajor {
            row_start,
            colidx,
            values,
        }
    }

    /// Structural sanity: ascending in-range row indices per column, region
    /// bookkeeping consistent.
    pub fn validate(&self) -> bool {
        for c in 0..self.ncols {
            if self.len[c] > self.max[c] {
                return false;
            }
            let (idx, _) = self.column(c);
            for w in idx.windows(2) {
                if w[0] >= w[1] {
                    return false;
                }
            }
            if idx.iter().any(|&r| r >= self.nrows) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SparseMatrix {
        // [ 2 . 1 ]
        // [ . 3 4 ]
        let mut m = SparseMatrix::new(2, 3, 1e-12);
        m.set(0, 0, 2.0).unwrap();
        m.set(1, 1, 3.0).unwrap();
        m.set(0, 2, 1.0).unwrap();
        m.set(1, 2, 4.0).unwrap();
        m
    }

    #[test]
    fn insert_and_get() {
        let m = sample();
        assert_eq!(m.nnz(), 4);
        assert_eq!(m.get(0, 0), 2.0);
        assert_eq!(m.get(1, 0), 0.0);
        assert_eq!(m.get(1, 2), 4.0);
        assert!(m.validate());
    }

    #[test]
    fn add_coefficient_accumulates_and_drops() {
        let mut m = sample();
        m.add_coefficient(0, 0, 1.5).unwrap();
        assert_eq!(m.get(0, 0), 3.5);
        m.add_coefficient(0, 0, -3.5).unwrap();
        assert_eq!(m.get(0, 0), 0.0);
        assert_eq!(m.nnz(), 3);
        assert!(m.validate());
    }

    #[test]
    fn out_of_range_is_rejected() {
        let mut m = sample();
        assert_eq!(m.set(5, 0, 1.0), Err(SolverError::InvalidIndex));
        assert_eq!(m.add_coefficient(0, 9, 1.0), Err(SolverError::InvalidIndex));
    }

    #[test]
    fn column_view_is_sorted() {
        let mut m = SparseMatrix::new(4, 1, 1e-12);
        m.set(3, 0, 3.0).unwrap();
        m.set(0, 0, 1.0).unwrap();
        m.set(2, 0, 2.0).unwrap();
        let (idx, val) = m.column(0);
        assert_eq!(idx, &[0, 2, 3]);
        assert_eq!(val, &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn growth_over_slack_relocates() {
        let mut m = SparseMatrix::new(64, 2, 1e-12);
        for r in 0..64 {
            m.set(r, 0, r as E + 1.0).unwrap();
            m.set(r, 1, -(r as E) - 1.0).unwrap();
        }
        assert_eq!(m.nnz(), 128);
        for r in 0..64 {
            assert_eq!(m.get(r, 0), r as E + 1.0);
            assert_eq!(m.get(r, 1), -(r as E) - 1.0);
        }
        assert!(m.validate());
    }

    #[test]
    fn remove_row_and_col() {
        let mut m = sample();
        m.remove_col(1).unwrap();
        assert_eq!(m.ncols(), 2);
        assert_eq!(m.get(0, 1), 1.0); // old column 2 shifted down
        m.remove_row(0).unwrap();
        assert_eq!(m.nrows(), 1);
        assert_eq!(m.get(0, 1), 4.0); // old row 1 shifted up
        assert!(m.validate());
    }

    #[test]
    fn row_major_mirror_matches() {
        let m = sample();
        let rm = m.to_row_major();
        let (cols, vals) = rm.row(0);
        assert_eq!(cols, &[0, 2]);
        assert_eq!(vals, &[2.0, 1.0]);
        let (cols, vals) = rm.row(1);
        assert_eq!(cols, &[1, 2]);
        assert_eq!(vals, &[3.0, 4.0]);
    }

    #[test]
    fn axpy_and_dot() {
        let m = sample();
        let mut y = vec![0.0; 2];
        m.axpy_column(2, 2.0, &mut y);
        assert_eq!(y, vec![2.0, 8.0]);
        assert_eq!(m.dot_column(2, &[1.0, 1.0]), 5.0);
    }

    #[test]
    fn scaling() {
        let mut m = sample();
        m.scale_col(2, 0.5);
        assert_eq!(m.get(0, 2), 0.5);
        assert_eq!(m.get(1, 2), 2.0);
        m.scale_row(1, 2.0);
        assert_eq!(m.get(1, 1), 6.0);
        assert_eq!(m.get(1, 2), 4.0);
    }
}
