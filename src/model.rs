//! The model container: variables, rows, bounds, objective, integrality
//! marks, SOS and linking structures, names, and scaling factors.
//!
//! The container is sense-agnostic storage: the objective is kept exactly as
//! the user stated it together with a `maximize` flag, and the solve path
//! canonicalizes to internal maximization at its boundary. Every mutation is
//! recorded in the change log so downstream caches (factorization, activity,
//! incumbent) know to invalidate themselves.

use std::collections::HashMap;

use crate::matrix::SparseMatrix;
use crate::{E, I, INFINITY, SolverError, is_infinite};

/// Kind of a decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VarKind {
    #[default]
    Continuous,
    Integer,
    /// Integer restricted to `{0, 1}`.
    Binary,
    /// Either exactly zero or within `[sc_lower, ub]`.
    SemiContinuous,
}

/// Basis status of a variable or row slack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BasisStatus {
    Basic,
    #[default]
    AtLower,
    AtUpper,
    /// Nonbasic with both bounds infinite.
    Free,
    /// Nonbasic with equal bounds.
    Fixed,
}

/// Row type tag, derived from the row's bound pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowType {
    /// No finite side.
    Free,
    /// Finite right side only: `a^T x <= rhs`.
    Le,
    /// Finite left side only: `a^T x >= lhs`.
    Ge,
    /// Equal sides.
    Eq,
    /// Both sides finite and distinct.
    Range,
    /// The objective pseudo-row (used by the text formats).
    Of,
}

/// Preferred rounding direction when branching on a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BranchDir {
    /// Follow the global floor-first parameter.
    #[default]
    Default,
    Ceiling,
    Floor,
    /// Pick per-node from the fractional part.
    Auto,
}

/// A decision variable.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: Option<String>,
    pub kind: VarKind,
    pub lb: E,
    pub ub: E,
    pub obj: E,
    /// Lower edge of the semi-continuous band (meaningful for
    /// [`VarKind::SemiContinuous`]).
    pub sc_lower: E,
    pub branch_dir: BranchDir,
    pub priority: i32,
    pub scale: E,
    pub status: BasisStatus,
}

impl Default for Variable {
    fn default() -> Self {
        Self {
            name: None,
            kind: VarKind::Continuous,
            lb: 0.0,
            ub: INFINITY,
            obj: 0.0,
            sc_lower: 0.0,
            branch_dir: BranchDir::Default,
            priority: 0,
            scale: 1.0,
            status: BasisStatus::AtLower,
        }
    }
}

impl Variable {
    pub fn is_integral(&self) -> bool {
        matches!(self.kind, VarKind::Integer | VarKind::Binary)
    }
}

/// A constraint row. `lhs = rhs` denotes equality; an infinite side denotes
/// a one-sided row.
#[derive(Debug, Clone)]
pub struct Row {
    pub name: Option<String>,
    pub lhs: E,
    pub rhs: E,
    pub scale: E,
    /// Basis status of the row's slack.
    pub status: BasisStatus,
    /// Lagrangean ("soft") constraint, priced into the objective rather than
    /// enforced by the simplex.
    pub lagrangean: bool,
}

impl Default for Row {
    fn default() -> Self {
        Self {
            name: None,
            lhs: -INFINITY,
            rhs: INFINITY,
            scale: 1.0,
            status: BasisStatus::Basic,
            lagrangean: false,
        }
    }
}

impl Row {
    pub fn row_type(&self) -> RowType {
        let l = is_infinite(self.lhs);
        let r = is_infinite(self.rhs);
        match (l, r) {
            (true, true) => RowType::Free,
            (true, false) => RowType::Le,
            (false, true) => RowType::Ge,
            (false, false) if self.lhs == self.rhs => RowType::Eq,
            (false, false) => RowType::Range,
        }
    }
}

/// SOS flavor: at most one nonzero, or at most two weight-consecutive
/// nonzeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SosKind {
    Type1,
    Type2,
}

/// A special ordered set over model columns.
#[derive(Debug, Clone)]
pub struct SosSet {
    pub name: String,
    pub kind: SosKind,
    pub priority: i32,
    /// `(column, weight)`, kept sorted by ascending weight.
    pub members: Vec<(I, E)>,
}

/// Links an integer variable to a lazily materialized partition of binaries:
/// `v = offset + sum(i * b[i])` with `sum(b[i]) = 1`.
#[derive(Debug, Clone)]
pub struct LinkingSet {
    pub int_var: I,
    pub offset: i64,
    /// Binary copy per domain value; `None` until materialized.
    pub binaries: Vec<Option<I>>,
    /// Count of materialized binaries currently fixed to zero.
    pub zero_fixed: usize,
    /// Count of materialized binaries currently fixed to one.
    pub one_fixed: usize,
}

/// Where a dual variable produced by [`Model::dualize_with_map`] came
/// from; the session uses this to push a dual solve back onto the primal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualOrigin {
    /// The finite right side of a row.
    RowUpper(I),
    /// The finite left side of a row.
    RowLower(I),
    /// A finite variable upper bound.
    ColUpper(I),
    /// A nonzero finite variable lower bound.
    ColLower(I),
}

/// Counters of structural mutations since the last solve, consumed by the
/// session to invalidate the factorization and cached activities.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeLog {
    pub cols_added: usize,
    pub cols_removed: usize,
    pub rows_added: usize,
    pub rows_removed: usize,
    pub coefficients_changed: usize,
    pub objective_changed: bool,
    pub bounds_changed: bool,
}

impl ChangeLog {
    pub fn any(&self) -> bool {
        self.cols_added
            + self.cols_removed
            + self.rows_added
            + self.rows_removed
            + self.coefficients_changed
            > 0
            || self.objective_changed
            || self.bounds_changed
    }

    pub fn clear(&mut self) {
        *self = ChangeLog::default();
    }
}

/// Constraint sense used when adding rows through the public surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Free,
    Le,
    Ge,
    Eq,
}

/// A mixed-integer linear program:
///
/// ```text
/// max / min  c^T x
/// s.t.       lhs <= A x <= rhs
///            lb  <=   x <= ub
/// ```
///
/// with integrality, semi-continuity, SOS, and linking structure on a
/// declared subset of `x`.
#[derive(Debug, Clone)]
pub struct Model {
    mat: SparseMatrix,
    vars: Vec<Variable>,
    rows: Vec<Row>,
    maximize: bool,
    sos: Vec<SosSet>,
    linking: Vec<LinkingSet>,
    row_names: HashMap<String, I>,
    col_names: HashMap<String, I>,
    /// Row scaling factors from the most recent scaling pass.
    pub row_scale: Vec<E>,
    /// Column scaling factors from the most recent scaling pass.
    pub col_scale: Vec<E>,
    changes: ChangeLog,
}

impl Model {
    /// Creates a model with `rows` empty constraints and `cols` variables.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            mat: SparseMatrix::new(rows, cols, 1e-12),
            vars: vec![Variable::default(); cols],
            rows: vec![Row::default(); rows],
            maximize: false,
            sos: Vec::new(),
            linking: Vec::new(),
            row_names: HashMap::new(),
            col_names: HashMap::new(),
            row_scale: vec![1.0; rows],
            col_scale: vec![1.0; cols],
            changes: ChangeLog::default(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.vars.len()
    }

    pub fn nnz(&self) -> usize {
        self.mat.nnz()
    }

    pub fn matrix(&self) -> &SparseMatrix {
        &self.mat
    }

    pub fn var(&self, c: usize) -> &Variable {
        &self.vars[c]
    }

    pub fn var_mut(&mut self, c: usize) -> &mut Variable {
        &mut self.vars[c]
    }

    pub fn row(&self, r: usize) -> &Row {
        &self.rows[r]
    }

    pub fn row_mut(&mut self, r: usize) -> &mut Row {
        &mut self.rows[r]
    }

    pub fn vars(&self) -> &[Variable] {
        &self.vars
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn sos_sets(&self) -> &[SosSet] {
        &self.sos
    }

    pub fn linking_sets(&self) -> &[LinkingSet] {
        &self.linking
    }

    pub fn is_maximize(&self) -> bool {
        self.maximize
    }

    pub fn set_maximize(&mut self, maximize: bool) {
        if self.maximize != maximize {
            self.maximize = maximize;
            self.changes.objective_changed = true;
        }
    }

    pub fn changes(&self) -> &ChangeLog {
        &self.changes
    }

    pub fn clear_changes(&mut self) {
        self.changes.clear();
    }

    /// Grows the model to at least the given dimensions.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        if rows > self.rows.len() {
            let extra = rows - self.rows.len();
            self.mat.append_rows(extra);
            self.rows.extend((0..extra).map(|_| Row::default()));
            self.row_scale.resize(rows, 1.0);
            self.changes.rows_added += extra;
        }
        if cols > self.vars.len() {
            let extra = cols - self.vars.len();
            self.mat.append_cols(extra);
            self.vars.extend((0..extra).map(|_| Variable::default()));
            self.col_scale.resize(cols, 1.0);
            self.changes.cols_added += extra;
        }
    }

    // --- rows ---------------------------------------------------------

    /// Appends a constraint from a dense coefficient slice.
    pub fn add_constraint(
        &mut self,
        coefs: &[E],
        kind: ConstraintKind,
        rh: E,
    ) -> Result<I, SolverError> {
        if coefs.len() != self.n_cols() {
            return Err(SolverError::DimensionMismatch);
        }
        let entries: Vec<(I, E)> = coefs
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0.0)
            .map(|(j, &v)| (j, v))
            .collect();
        self.add_constraint_ex(&entries, kind, rh)
    }

    /// Appends a constraint from `(column, coefficient)` pairs.
    pub fn add_constraint_ex(
        &mut self,
        entries: &[(I, E)],
        kind: ConstraintKind,
        rh: E,
    ) -> Result<I, SolverError> {
        if entries.iter().any(|&(j, _)| j >= self.n_cols()) {
            return Err(SolverError::InvalidIndex);
        }
        let r = self.n_rows();
        self.mat.append_rows(1);
        let mut row = Row::default();
        match kind {
            ConstraintKind::Free => {}
            ConstraintKind::Le => row.rhs = rh,
            ConstraintKind::Ge => row.lhs = rh,
            ConstraintKind::Eq => {
                row.lhs = rh;
                row.rhs = rh;
            }
        }
        self.rows.push(row);
        self.row_scale.push(1.0);
        for &(j, v) in entries {
            self.mat.add_coefficient(r, j, v)?;
        }
        self.changes.rows_added += 1;
        Ok(r)
    }

    /// Removes a constraint; rows above shift down by one.
    pub fn del_constraint(&mut self, r: usize) -> Result<(), SolverError> {
        if r >= self.n_rows() {
            return Err(SolverError::InvalidIndex);
        }
        self.mat.remove_row(r)?;
        if let Some(name) = self.rows[r].name.take() {
            self.row_names.remove(&name);
        }
        self.rows.remove(r);
        self.row_scale.remove(r);
        for idx in self.row_names.values_mut() {
            if *idx > r {
                *idx -= 1;
            }
        }
        self.changes.rows_removed += 1;
        Ok(())
    }

    /// Replaces the coefficients of row `r` (dense).
    pub fn set_row(&mut self, r: usize, coefs: &[E]) -> Result<(), SolverError> {
        if r >= self.n_rows() {
            return Err(SolverError::InvalidIndex);
        }
        if coefs.len() != self.n_cols() {
            return Err(SolverError::DimensionMismatch);
        }
        for (j, &v) in coefs.iter().enumerate() {
            self.mat.set(r, j, v)?;
        }
        self.changes.coefficients_changed += 1;
        Ok(())
    }

    /// Dense coefficient vector of row `r`.
    pub fn get_row(&self, r: usize) -> Result<Vec<E>, SolverError> {
        if r >= self.n_rows() {
            return Err(SolverError::InvalidIndex);
        }
        let mut out = vec![0.0; self.n_cols()];
        for j in 0..self.n_cols() {
            out[j] = self.mat.get(r, j);
        }
        Ok(out)
    }

    /// Rewrites the bound pair of row `r` for the given type and right-hand
    /// side.
    pub fn set_constr_type(
        &mut self,
        r: usize,
        kind: ConstraintKind,
    ) -> Result<(), SolverError> {
        if r >= self.n_rows() {
            return Err(SolverError::InvalidIndex);
        }
        let row = &mut self.rows[r];
        let rh = if is_infinite(row.rhs) { row.lhs } else { row.rhs };
        match kind {
            ConstraintKind::Free => {
                row.lhs = -INFINITY;
                row.rhs = INFINITY;
            }
            ConstraintKind::Le => {
                row.lhs = -INFINITY;
                row.rhs = rh;
            }
            ConstraintKind::Ge => {
                row.lhs = rh;
                row.rhs = INFINITY;
            }
            ConstraintKind::Eq => {
                row.lhs = rh;
                row.rhs = rh;
            }
        }
        self.changes.bounds_changed = true;
        Ok(())
    }

    /// Sets the principal right-hand side of row `r` (the finite side in the
    /// row's current orientation).
    pub fn set_rh(&mut self, r: usize, value: E) -> Result<(), SolverError> {
        if r >= self.n_rows() {
            return Err(SolverError::InvalidIndex);
        }
        let row = &mut self.rows[r];
        match row.row_type() {
            RowType::Ge => row.lhs = value,
            RowType::Eq => {
                row.lhs = value;
                row.rhs = value;
            }
            _ => row.rhs = value,
        }
        self.changes.bounds_changed = true;
        Ok(())
    }

    pub fn get_rh(&self, r: usize) -> Result<E, SolverError> {
        if r >= self.n_rows() {
            return Err(SolverError::InvalidIndex);
        }
        let row = &self.rows[r];
        Ok(match row.row_type() {
            RowType::Ge => row.lhs,
            _ => row.rhs,
        })
    }

    /// Widens row `r` into a range of the given width around its principal
    /// side.
    pub fn set_rh_range(&mut self, r: usize, range: E) -> Result<(), SolverError> {
        if r >= self.n_rows() {
            return Err(SolverError::InvalidIndex);
        }
        let row = &mut self.rows[r];
        match row.row_type() {
            RowType::Ge => row.rhs = row.lhs + range.abs(),
            _ => row.lhs = row.rhs - range.abs(),
        }
        self.changes.bounds_changed = true;
        Ok(())
    }

    /// Replaces every right-hand side at once; `values[r]` applies to row
    /// `r`.
    pub fn set_rh_vec(&mut self, values: &[E]) -> Result<(), SolverError> {
        if values.len() != self.n_rows() {
            return Err(SolverError::DimensionMismatch);
        }
        for (r, &v) in values.iter().enumerate() {
            self.set_rh(r, v)?;
        }
        Ok(())
    }

    /// Appends a Lagrangean ("soft") constraint.
    pub fn add_lag_con(
        &mut self,
        coefs: &[E],
        kind: ConstraintKind,
        rh: E,
    ) -> Result<I, SolverError> {
        let r = self.add_constraint(coefs, kind, rh)?;
        self.rows[r].lagrangean = true;
        Ok(r)
    }

    // --- columns ------------------------------------------------------

    /// Appends a variable with a dense constraint-coefficient slice.
    pub fn add_column(&mut self, coefs: &[E]) -> Result<I, SolverError> {
        if coefs.len() != self.n_rows() {
            return Err(SolverError::DimensionMismatch);
        }
        let entries: Vec<(I, E)> = coefs
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0.0)
            .map(|(i, &v)| (i, v))
            .collect();
        self.add_column_ex(&entries)
    }

    /// Appends a variable from `(row, coefficient)` pairs.
    pub fn add_column_ex(&mut self, entries: &[(I, E)]) -> Result<I, SolverError> {
        if entries.iter().any(|&(i, _)| i >= self.n_rows()) {
            return Err(SolverError::InvalidIndex);
        }
        let c = self.n_cols();
        self.mat.append_cols(1);
        self.vars.push(Variable::default());
        self.col_scale.push(1.0);
        self.mat.set_column(c, entries)?;
        self.changes.cols_added += 1;
        Ok(c)
    }

    /// Removes a variable; columns above shift down by one. Fails while the
    /// column is referenced by an SOS or linking set.
    pub fn del_column(&mut self, c: usize) -> Result<(), SolverError> {
        if c >= self.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        if self.is_sos_var(c)
            || self
                .linking
                .iter()
                .any(|l| l.int_var == c || l.binaries.iter().any(|b| *b == Some(c)))
        {
            return Err(SolverError::Unsupported);
        }
        self.mat.remove_col(c)?;
        if let Some(name) = self.vars[c].name.take() {
            self.col_names.remove(&name);
        }
        self.vars.remove(c);
        self.col_scale.remove(c);
        for idx in self.col_names.values_mut() {
            if *idx > c {
                *idx -= 1;
            }
        }
        for set in &mut self.sos {
            for (j, _) in set.members.iter_mut() {
                if *j > c {
                    *j -= 1;
                }
            }
        }
        for link in &mut self.linking {
            if link.int_var > c {
                link.int_var -= 1;
            }
            for b in link.binaries.iter_mut().flatten() {
                if *b > c {
                    *b -= 1;
                }
            }
        }
        self.changes.cols_removed += 1;
        Ok(())
    }

    /// Replaces the constraint coefficients of column `c` (dense).
    pub fn set_column(&mut self, c: usize, coefs: &[E]) -> Result<(), SolverError> {
        if c >= self.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        if coefs.len() != self.n_rows() {
            return Err(SolverError::DimensionMismatch);
        }
        let entries: Vec<(I, E)> = coefs
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0.0)
            .map(|(i, &v)| (i, v))
            .collect();
        self.mat.set_column(c, &entries)?;
        self.changes.coefficients_changed += 1;
        Ok(())
    }

    /// Dense coefficient vector of column `c`.
    pub fn get_column(&self, c: usize) -> Result<Vec<E>, SolverError> {
        if c >= self.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        let mut out = vec![0.0; self.n_rows()];
        let (idx, val) = self.mat.column(c);
        for (&r, &v) in idx.iter().zip(val.iter()) {
            out[r] = v;
        }
        Ok(out)
    }

    /// Sparse view of column `c`.
    pub fn get_column_ex(&self, c: usize) -> Result<Vec<(I, E)>, SolverError> {
        if c >= self.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        let (idx, val) = self.mat.column(c);
        Ok(idx.iter().copied().zip(val.iter().copied()).collect())
    }

    /// `true` when column `c` has at least one constraint coefficient.
    pub fn column_in_lp(&self, c: usize) -> bool {
        c < self.n_cols() && self.mat.col_len(c) > 0
    }

    // --- objective ----------------------------------------------------

    pub fn set_obj(&mut self, c: usize, value: E) -> Result<(), SolverError> {
        if c >= self.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        self.vars[c].obj = value;
        self.changes.objective_changed = true;
        Ok(())
    }

    /// Replaces the whole objective function (dense).
    pub fn set_obj_fn(&mut self, coefs: &[E]) -> Result<(), SolverError> {
        if coefs.len() != self.n_cols() {
            return Err(SolverError::DimensionMismatch);
        }
        for (j, &v) in coefs.iter().enumerate() {
            self.vars[j].obj = v;
        }
        self.changes.objective_changed = true;
        Ok(())
    }

    /// Replaces the objective from `(column, coefficient)` pairs.
    pub fn set_obj_fn_ex(&mut self, entries: &[(I, E)]) -> Result<(), SolverError> {
        if entries.iter().any(|&(j, _)| j >= self.n_cols()) {
            return Err(SolverError::InvalidIndex);
        }
        for v in &mut self.vars {
            v.obj = 0.0;
        }
        for &(j, v) in entries {
            self.vars[j].obj = v;
        }
        self.changes.objective_changed = true;
        Ok(())
    }

    pub fn get_obj(&self, c: usize) -> Result<E, SolverError> {
        if c >= self.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        Ok(self.vars[c].obj)
    }

    // --- bounds & kinds -----------------------------------------------

    pub fn set_bounds(&mut self, c: usize, lb: E, ub: E) -> Result<(), SolverError> {
        if c >= self.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        if lb > ub {
            return Err(SolverError::InvalidBounds);
        }
        self.vars[c].lb = lb;
        self.vars[c].ub = ub;
        self.changes.bounds_changed = true;
        self.linking_on_bound_change(c);
        Ok(())
    }

    /// Intersects the stored bounds with `[lb, ub]` instead of replacing
    /// them.
    pub fn set_bounds_tighter(&mut self, c: usize, lb: E, ub: E) -> Result<(), SolverError> {
        if c >= self.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        let new_lb = self.vars[c].lb.max(lb);
        let new_ub = self.vars[c].ub.min(ub);
        self.set_bounds(c, new_lb, new_ub)
    }

    pub fn set_lowbo(&mut self, c: usize, lb: E) -> Result<(), SolverError> {
        if c >= self.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        self.set_bounds(c, lb, self.vars[c].ub)
    }

    pub fn set_upbo(&mut self, c: usize, ub: E) -> Result<(), SolverError> {
        if c >= self.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        self.set_bounds(c, self.vars[c].lb, ub)
    }

    /// Frees the variable in both directions.
    pub fn set_unbounded(&mut self, c: usize) -> Result<(), SolverError> {
        self.set_bounds(c, -INFINITY, INFINITY)
    }

    pub fn is_unbounded(&self, c: usize) -> bool {
        c < self.n_cols() && is_infinite(self.vars[c].lb) && is_infinite(self.vars[c].ub)
    }

    pub fn is_negative(&self, c: usize) -> bool {
        c < self.n_cols() && self.vars[c].ub <= 0.0 && self.vars[c].lb < 0.0
    }

    pub fn set_int(&mut self, c: usize, int: bool) -> Result<(), SolverError> {
        if c >= self.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        self.vars[c].kind = if int {
            VarKind::Integer
        } else {
            VarKind::Continuous
        };
        Ok(())
    }

    pub fn set_binary(&mut self, c: usize, bin: bool) -> Result<(), SolverError> {
        if c >= self.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        if bin {
            self.vars[c].kind = VarKind::Binary;
            self.set_bounds(c, 0.0, 1.0)?;
        } else {
            self.vars[c].kind = VarKind::Continuous;
        }
        Ok(())
    }

    pub fn set_semicont(&mut self, c: usize, sc: bool) -> Result<(), SolverError> {
        if c >= self.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        if sc {
            self.vars[c].kind = VarKind::SemiContinuous;
            // The declared lower bound becomes the band edge; the variable
            // itself may still take zero.
            self.vars[c].sc_lower = self.vars[c].lb.max(0.0);
        } else {
            self.vars[c].kind = VarKind::Continuous;
        }
        Ok(())
    }

    // --- SOS ----------------------------------------------------------

    /// Adds a special ordered set; members are `(column, weight)` pairs.
    pub fn add_sos(
        &mut self,
        name: &str,
        kind: SosKind,
        priority: i32,
        members: &[(I, E)],
    ) -> Result<usize, SolverError> {
        if members.iter().any(|&(j, _)| j >= self.n_cols()) {
            return Err(SolverError::InvalidIndex);
        }
        let mut members = members.to_vec();
        members.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        self.sos.push(SosSet {
            name: name.to_string(),
            kind,
            priority,
            members,
        });
        Ok(self.sos.len() - 1)
    }

    pub fn is_sos_var(&self, c: usize) -> bool {
        self.sos
            .iter()
            .any(|s| s.members.iter().any(|&(j, _)| j == c))
    }

    // --- linking sets -------------------------------------------------

    /// Declares a linking structure for an integer variable whose domain is
    /// `[offset, offset + size)`.
    pub fn add_linking(&mut self, int_var: I, offset: i64, size: usize) -> Result<usize, SolverError> {
        if int_var >= self.n_cols() || !self.vars[int_var].is_integral() {
            return Err(SolverError::InvalidIndex);
        }
        self.linking.push(LinkingSet {
            int_var,
            offset,
            binaries: vec![None; size],
            zero_fixed: 0,
            one_fixed: 0,
        });
        Ok(self.linking.len() - 1)
    }

    /// Returns the binary copies of linking set `s`, creating the columns on
    /// first request and wiring them into the fixing counters.
    pub fn materialize_linking(&mut self, s: usize) -> Result<Vec<I>, SolverError> {
        if s >= self.linking.len() {
            return Err(SolverError::InvalidIndex);
        }
        let size = self.linking[s].binaries.len();
        let int_var = self.linking[s].int_var;
        for i in 0..size {
            if self.linking[s].binaries[i].is_none() {
                let c = self.add_column_ex(&[])?;
                self.set_binary(c, true)?;
                self.vars[c].name = Some(format!(
                    "{}#{}",
                    self.vars[int_var]
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("C{}", int_var + 1)),
                    i
                ));
                self.linking[s].binaries[i] = Some(c);
            }
        }
        self.recount_linking(s);
        Ok(self.linking[s].binaries.iter().map(|b| b.unwrap()).collect())
    }

    fn recount_linking(&mut self, s: usize) {
        let (mut zeros, mut ones) = (0, 0);
        for b in self.linking[s].binaries.iter().flatten() {
            let v = &self.vars[*b];
            if v.lb == v.ub {
                if v.lb == 0.0 {
                    zeros += 1;
                } else {
                    ones += 1;
                }
            }
        }
        self.linking[s].zero_fixed = zeros;
        self.linking[s].one_fixed = ones;
    }

    /// Re-derives the zero/one fixing counters of every linking set touching
    /// column `c`, and propagates a one-fixing to the integer view.
    fn linking_on_bound_change(&mut self, c: usize) {
        for s in 0..self.linking.len() {
            let touches = self.linking[s].binaries.iter().any(|b| *b == Some(c));
            if !touches {
                continue;
            }
            self.recount_linking(s);
            // Exactly one binary pinned to 1 pins the integer, and vice
            // versa a fully zero-fixed complement does the same.
            let link = &self.linking[s];
            let int_var = link.int_var;
            let offset = link.offset;
            let pinned: Vec<usize> = link
                .binaries
                .iter()
                .enumerate()
                .filter(|(_, b)| {
                    b.is_some_and(|j| self.vars[j].lb == 1.0 && self.vars[j].ub == 1.0)
                })
                .map(|(i, _)| i)
                .collect();
            if pinned.len() == 1 {
                let value = offset + pinned[0] as i64;
                let v = &mut self.vars[int_var];
                v.lb = value as E;
                v.ub = value as E;
                self.changes.bounds_changed = true;
            }
        }
    }

    /// Checks linking invariants for fixed integers: exactly one binary
    /// fixed at one iff the integer is fixed to a single value.
    pub fn linking_consistent(&self, s: usize) -> bool {
        let link = &self.linking[s];
        let v = &self.vars[link.int_var];
        let int_fixed = v.lb == v.ub;
        if !link.binaries.iter().all(|b| b.is_some()) {
            return true; // nothing materialized yet, nothing to contradict
        }
        if int_fixed {
            link.one_fixed == 1
        } else {
            link.one_fixed == 0
        }
    }

    // --- matrix elements ---------------------------------------------

    pub fn set_mat(&mut self, r: usize, c: usize, v: E) -> Result<(), SolverError> {
        self.mat.set(r, c, v)?;
        self.changes.coefficients_changed += 1;
        Ok(())
    }

    pub fn get_mat(&self, r: usize, c: usize) -> E {
        if r >= self.n_rows() || c >= self.n_cols() {
            return 0.0;
        }
        self.mat.get(r, c)
    }

    /// Element by position in the column-major nonzero sequence.
    pub fn get_mat_by_index(&self, index: usize) -> Option<(I, I, E)> {
        let mut seen = 0;
        for c in 0..self.n_cols() {
            let (idx, val) = self.mat.column(c);
            if index < seen + idx.len() {
                let k = index - seen;
                return Some((idx[k], c, val[k]));
            }
            seen += idx.len();
        }
        None
    }

    pub fn get_nonzeros(&self) -> usize {
        self.mat.nnz()
    }

    // --- names --------------------------------------------------------

    pub fn set_row_name(&mut self, r: usize, name: &str) -> Result<(), SolverError> {
        if r >= self.n_rows() {
            return Err(SolverError::InvalidIndex);
        }
        if let Some(old) = self.rows[r].name.take() {
            self.row_names.remove(&old);
        }
        self.rows[r].name = Some(name.to_string());
        self.row_names.insert(name.to_string(), r);
        Ok(())
    }

    /// Row name, falling back to the conventional `R<i>` (1-based).
    pub fn get_row_name(&self, r: usize) -> String {
        self.rows
            .get(r)
            .and_then(|row| row.name.clone())
            .unwrap_or_else(|| format!("R{}", r + 1))
    }

    pub fn set_col_name(&mut self, c: usize, name: &str) -> Result<(), SolverError> {
        if c >= self.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        if let Some(old) = self.vars[c].name.take() {
            self.col_names.remove(&old);
        }
        self.vars[c].name = Some(name.to_string());
        self.col_names.insert(name.to_string(), c);
        Ok(())
    }

    /// Column name, falling back to the conventional `C<j>` (1-based).
    pub fn get_col_name(&self, c: usize) -> String {
        self.vars
            .get(c)
            .and_then(|v| v.name.clone())
            .unwrap_or_else(|| format!("C{}", c + 1))
    }

    pub fn find_row(&self, name: &str) -> Option<I> {
        self.row_names.get(name).copied()
    }

    pub fn find_col(&self, name: &str) -> Option<I> {
        self.col_names.get(name).copied()
    }

    // --- derived ------------------------------------------------------

    /// Row activities `A x` for a dense point.
    pub fn activities(&self, x: &[E]) -> Vec<E> {
        let mut act = vec![0.0; self.n_rows()];
        for c in 0..self.n_cols() {
            if x[c] != 0.0 {
                self.mat.axpy_column(c, x[c], &mut act);
            }
        }
        act
    }

    /// Objective value `c^T x` in the user's sense.
    pub fn objective_value(&self, x: &[E]) -> E {
        self.vars
            .iter()
            .zip(x.iter())
            .map(|(v, &xi)| v.obj * xi)
            .sum()
    }

    /// Builds the explicit LP dual of this model (continuous part only).
    ///
    /// For internal-maximization `max c^T x, A x <= b`, the dual is
    /// `min b^T y, A^T y >= c, y >= 0`; general bound pairs produce the
    /// corresponding signed duals. Integrality marks are not carried over.
    pub fn dualize(&self) -> Result<Model, SolverError> {
        self.dualize_with_map().map(|(dual, _)| dual)
    }

    /// Like [`Model::dualize`], also returning where each dual variable
    /// came from so a dual solve can be mapped back onto this model.
    pub fn dualize_with_map(&self) -> Result<(Model, Vec<DualOrigin>), SolverError> {
        // Normalize every row to <= / >= pairs, then transpose. Range rows
        // contribute two duals; this keeps the construction exact.
        struct OneSided {
            entries: Vec<(I, E)>,
            rh: E,
        }
        let mut folded: Vec<OneSided> = Vec::new();
        let mut origins: Vec<DualOrigin> = Vec::new();
        for r in 0..self.n_rows() {
            let row = &self.rows[r];
            let entries: Vec<(I, E)> = (0..self.n_cols())
                .filter_map(|c| {
                    let v = self.mat.get(r, c);
                    (v != 0.0).then_some((c, v))
                })
                .collect();
            if !is_infinite(row.rhs) {
                folded.push(OneSided {
                    entries: entries.clone(),
                    rh: row.rhs,
                });
                origins.push(DualOrigin::RowUpper(r));
            }
            if !is_infinite(row.lhs) {
                folded.push(OneSided {
                    entries: entries.iter().map(|&(c, v)| (c, -v)).collect(),
                    rh: -row.lhs,
                });
                origins.push(DualOrigin::RowLower(r));
            }
        }
        // Primal max c^T x s.t. Dx <= d, x >= 0 (bounds folded into rows).
        for c in 0..self.n_cols() {
            let v = &self.vars[c];
            if is_infinite(v.lb) {
                return Err(SolverError::Unsupported); // free primal needs an equality dual
            }
            if !is_infinite(v.ub) {
                folded.push(OneSided {
                    entries: vec![(c, 1.0)],
                    rh: v.ub,
                });
                origins.push(DualOrigin::ColUpper(c));
            }
            if v.lb != 0.0 {
                folded.push(OneSided {
                    entries: vec![(c, -1.0)],
                    rh: -v.lb,
                });
                origins.push(DualOrigin::ColLower(c));
            }
        }
        let m = folded.len();
        let n = self.n_cols();
        let mut dual = Model::new(n, m);
        dual.set_maximize(!self.maximize);
        let internal_sign = if self.maximize { 1.0 } else { -1.0 };
        for (i, row) in folded.iter().enumerate() {
            dual.vars[i].obj = internal_sign * row.rh;
            dual.vars[i].lb = 0.0;
            dual.vars[i].ub = INFINITY;
            for &(c, v) in &row.entries {
                dual.mat.set(c, i, v)?;
            }
        }
        for c in 0..n {
            // max primal: min d^T y with D^T y >= c; min primal arrives
            // here sign-flipped (max -d^T y with D^T y >= -c), so the row
            // sense is the same in both orientations.
            dual.rows[c].lhs = internal_sign * self.vars[c].obj;
            dual.rows[c].rhs = INFINITY;
        }
        Ok((dual, origins))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_var_model() -> Model {
        let mut m = Model::new(0, 2);
        m.set_obj_fn(&[143.0, 60.0]).unwrap();
        m.add_constraint(&[120.0, 210.0], ConstraintKind::Le, 15000.0)
            .unwrap();
        m.add_constraint(&[110.0, 30.0], ConstraintKind::Le, 4000.0)
            .unwrap();
        m.add_constraint(&[1.0, 1.0], ConstraintKind::Le, 75.0)
            .unwrap();
        m.set_maximize(true);
        m
    }

    #[test]
    fn build_and_query() {
        let m = two_var_model();
        assert_eq!(m.n_rows(), 3);
        assert_eq!(m.n_cols(), 2);
        assert_eq!(m.get_mat(0, 1), 210.0);
        assert_eq!(m.row(1).row_type(), RowType::Le);
        assert_eq!(m.get_rh(2).unwrap(), 75.0);
    }

    #[test]
    fn row_types_follow_bounds() {
        let mut m = Model::new(1, 1);
        assert_eq!(m.row(0).row_type(), RowType::Free);
        m.set_constr_type(0, ConstraintKind::Eq).unwrap();
        m.set_rh(0, 3.0).unwrap();
        assert_eq!(m.row(0).row_type(), RowType::Eq);
        m.set_rh_range(0, 2.0).unwrap();
        assert_eq!(m.row(0).row_type(), RowType::Range);
        assert_eq!(m.row(0).lhs, 1.0);
    }

    #[test]
    fn bounds_validation() {
        let mut m = Model::new(0, 1);
        assert_eq!(m.set_bounds(0, 2.0, 1.0), Err(SolverError::InvalidBounds));
        m.set_bounds(0, 1.0, 2.0).unwrap();
        m.set_bounds_tighter(0, 0.0, 1.5).unwrap();
        assert_eq!(m.var(0).lb, 1.0);
        assert_eq!(m.var(0).ub, 1.5);
    }

    #[test]
    fn change_log_tracks_mutations() {
        let mut m = two_var_model();
        m.clear_changes();
        assert!(!m.changes().any());
        m.set_obj(0, 1.0).unwrap();
        assert!(m.changes().objective_changed);
        m.set_mat(0, 0, 5.0).unwrap();
        assert_eq!(m.changes().coefficients_changed, 1);
    }

    #[test]
    fn names_round_trip() {
        let mut m = two_var_model();
        m.set_row_name(0, "capacity").unwrap();
        m.set_col_name(1, "y").unwrap();
        assert_eq!(m.get_row_name(0), "capacity");
        assert_eq!(m.get_row_name(1), "R2");
        assert_eq!(m.find_col("y"), Some(1));
        m.del_constraint(0).unwrap();
        assert_eq!(m.find_row("capacity"), None);
    }

    #[test]
    fn sos_members_sorted_by_weight() {
        let mut m = Model::new(0, 3);
        m.add_sos("s", SosKind::Type1, 1, &[(2, 3.0), (0, 1.0), (1, 2.0)])
            .unwrap();
        let weights: Vec<E> = m.sos_sets()[0].members.iter().map(|&(_, w)| w).collect();
        assert_eq!(weights, vec![1.0, 2.0, 3.0]);
        assert!(m.is_sos_var(1));
        assert_eq!(m.del_column(1), Err(SolverError::Unsupported));
    }

    #[test]
    fn linking_materializes_lazily() {
        let mut m = Model::new(0, 1);
        m.set_int(0, true).unwrap();
        m.set_bounds(0, 2.0, 4.0).unwrap();
        let s = m.add_linking(0, 2, 3).unwrap();
        assert_eq!(m.n_cols(), 1);
        let bins = m.materialize_linking(s).unwrap();
        assert_eq!(bins.len(), 3);
        assert_eq!(m.n_cols(), 4);
        // Fixing the middle binary pins the integer to offset + 1 = 3.
        m.set_bounds(bins[1], 1.0, 1.0).unwrap();
        assert_eq!(m.var(0).lb, 3.0);
        assert_eq!(m.var(0).ub, 3.0);
        assert!(m.linking_consistent(s));
    }

    #[test]
    fn activities_and_objective() {
        let m = two_var_model();
        let x = [21.875, 53.125];
        let act = m.activities(&x);
        assert!((act[0] - (120.0 * 21.875 + 210.0 * 53.125)).abs() < 1e-9);
        assert!((m.objective_value(&x) - 6315.625).abs() < 1e-9);
    }

    #[test]
    fn semicontinuous_keeps_band_edge() {
        let mut m = Model::new(0, 1);
        m.set_bounds(0, 2.0, 5.0).unwrap();
        m.set_semicont(0, true).unwrap();
        assert_eq!(m.var(0).kind, VarKind::SemiContinuous);
        assert_eq!(m.var(0).sc_lower, 2.0);
    }
}
