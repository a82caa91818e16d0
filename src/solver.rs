//! The solver session: owns the model, parameter store, hook table, and
//! solve state, and exposes the full public operation surface.
//!
//! `solve` runs the pipeline presolve -> scale -> simplex (-> branch and
//! bound when discrete structure exists) -> postsolve, converting between
//! the user's sense and the internal maximization form at this boundary
//! and nowhere else.

use std::io::Write;
use std::time::Instant;

use crate::callback::{
    AbortHook, BranchHook, HookTable, LogHook, MsgHook, NodeHook,
};
use crate::interface;
use crate::linalg::BfpKind;
use crate::mip::{BranchAndBound, LinkBranch, MipMeta, MipOptions, SosBranchSet};
use crate::model::{
    BasisStatus, BranchDir, ConstraintKind, DualOrigin, Model, RowType, SosKind, VarKind,
};
use crate::params::{EpsLevel, ParamValue, Params};
use crate::presolve::{self, Presolver, presolve_ops};
use crate::scale::{self, ScaleFactors, scale_mode};
use crate::simplex::{LpInstance, Simplex, SimplexOptions, simplex_type};
use crate::terminators::{MultipleTerminators, NoOpTerminator, Terminator, TimeOutTerminator};
use crate::matrix::SparseMatrix;
use crate::{E, I, INFINITY, SolverError, Status, Verbosity, is_infinite};

/// Basis crash heuristics applied before phase 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrashMode {
    #[default]
    Nothing,
    /// Seed the basis with the structurally heaviest eligible columns.
    MostFeasible,
}

/// Interface contracted to external model-exchange plugins; the session
/// only brokers calls, the plugin owns its format.
pub trait XliPlugin {
    fn read(&mut self, path: &str, model: &mut Model) -> Result<(), SolverError>;
    fn write(&mut self, path: &str, model: &Model) -> Result<(), SolverError>;
}

/// Everything the last solve produced, in user space.
#[derive(Debug, Clone)]
struct SolveOutputs {
    status: Status,
    /// Structural variable values.
    x: Vec<E>,
    /// Row activities.
    activity: Vec<E>,
    /// Objective in the user's sense.
    obj: E,
    /// Row duals in the user's sense.
    duals: Vec<E>,
    /// Reduced costs per structural column, user sense.
    reduced: Vec<E>,
    /// Solve-space basis statuses (columns then rows), when they map 1:1
    /// to the original model.
    statuses: Option<Vec<BasisStatus>>,
}

/// A solver session. One session owns its model and state exclusively;
/// distinct sessions are independent.
pub struct Solver {
    model: Model,
    params: Params,
    hooks: HookTable,
    bfp: BfpKind,
    crash: CrashMode,
    output: Box<dyn Write>,
    saved_basis: Option<Vec<BasisStatus>>,
    outputs: Option<SolveOutputs>,
    engine: Option<(Simplex, LpInstance)>,
    last_scale: Option<ScaleFactors>,
    /// Dual values were derived for the last solve (presolve may withhold
    /// them unless the `DUALS` technique bit asks for the derivation).
    duals_available: bool,
    /// Sensitivity information may be ranged for the last solve (gated by
    /// the `SENS_DUALS` technique bit under presolve).
    sens_available: bool,
    presolve_loops_done: usize,
    solution_count: usize,
    total_nodes: usize,
    total_iter: usize,
    max_level: usize,
    solve_secs: f64,
}

impl Solver {
    /// Creates a session holding a model with the given dimensions.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            model: Model::new(rows, cols),
            params: Params::default(),
            hooks: HookTable::default(),
            bfp: BfpKind::default(),
            crash: CrashMode::default(),
            output: Box::new(std::io::stdout()),
            saved_basis: None,
            outputs: None,
            engine: None,
            last_scale: None,
            duals_available: true,
            sens_available: true,
            presolve_loops_done: 0,
            solution_count: 0,
            total_nodes: 0,
            total_iter: 0,
            max_level: 0,
            solve_secs: 0.0,
        }
    }

    /// Creates a session around an existing model.
    pub fn from_model(model: Model) -> Self {
        let mut s = Self::new(0, 0);
        s.model = model;
        s
    }

    /// Copies the model and parameters into a fresh session; hooks and
    /// solve state do not carry over.
    pub fn copy_lp(&self) -> Solver {
        let mut s = Solver::from_model(self.model.clone());
        s.params = self.params.clone();
        s.bfp = self.bfp;
        s.crash = self.crash;
        s
    }

    /// Builds a session solving the explicit LP dual of this model.
    pub fn dualize_lp(&self) -> Result<Solver, SolverError> {
        Ok(Solver::from_model(self.model.dualize()?))
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Structural mutations invalidate the factorization, incumbent, and
    /// cached results.
    fn invalidate(&mut self) {
        self.outputs = None;
        self.engine = None;
    }

    fn sense_sign(&self) -> E {
        if self.model.is_maximize() { 1.0 } else { -1.0 }
    }

    fn log(&mut self, level: Verbosity, message: &str) {
        let session_level = Verbosity::from_level(self.params.verbose);
        self.hooks.emit_log(session_level, level, message);
    }

    // --- model shape --------------------------------------------------

    pub fn resize_lp(&mut self, rows: usize, cols: usize) {
        self.model.resize(rows, cols);
        self.invalidate();
    }

    pub fn get_n_rows(&self) -> usize {
        self.model.n_rows()
    }

    pub fn get_n_cols(&self) -> usize {
        self.model.n_cols()
    }

    pub fn get_nonzeros(&self) -> usize {
        self.model.get_nonzeros()
    }

    // --- rows ---------------------------------------------------------

    pub fn add_constraint(
        &mut self,
        coefs: &[E],
        kind: ConstraintKind,
        rh: E,
    ) -> Result<I, SolverError> {
        self.invalidate();
        self.model.add_constraint(coefs, kind, rh)
    }

    pub fn add_constraint_ex(
        &mut self,
        entries: &[(I, E)],
        kind: ConstraintKind,
        rh: E,
    ) -> Result<I, SolverError> {
        self.invalidate();
        self.model.add_constraint_ex(entries, kind, rh)
    }

    pub fn del_constraint(&mut self, row: usize) -> Result<(), SolverError> {
        self.invalidate();
        self.model.del_constraint(row)
    }

    pub fn set_row(&mut self, row: usize, coefs: &[E]) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_row(row, coefs)
    }

    pub fn get_row(&self, row: usize) -> Result<Vec<E>, SolverError> {
        self.model.get_row(row)
    }

    pub fn set_constr_type(&mut self, row: usize, kind: ConstraintKind) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_constr_type(row, kind)
    }

    pub fn get_constr_type(&self, row: usize) -> Result<RowType, SolverError> {
        if row >= self.model.n_rows() {
            return Err(SolverError::InvalidIndex);
        }
        Ok(self.model.row(row).row_type())
    }

    pub fn set_rh(&mut self, row: usize, value: E) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_rh(row, value)
    }

    pub fn get_rh(&self, row: usize) -> Result<E, SolverError> {
        self.model.get_rh(row)
    }

    pub fn set_rh_range(&mut self, row: usize, range: E) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_rh_range(row, range)
    }

    pub fn set_rh_vec(&mut self, values: &[E]) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_rh_vec(values)
    }

    pub fn add_lag_con(
        &mut self,
        coefs: &[E],
        kind: ConstraintKind,
        rh: E,
    ) -> Result<I, SolverError> {
        self.invalidate();
        self.model.add_lag_con(coefs, kind, rh)
    }

    pub fn set_row_name(&mut self, row: usize, name: &str) -> Result<(), SolverError> {
        self.model.set_row_name(row, name)
    }

    pub fn get_row_name(&self, row: usize) -> String {
        self.model.get_row_name(row)
    }

    /// Name of the row in the model as originally loaded (identical to
    /// [`Solver::get_row_name`]; reductions never rename surviving rows).
    pub fn get_origrow_name(&self, row: usize) -> String {
        self.model.get_row_name(row)
    }

    // --- columns ------------------------------------------------------

    pub fn add_column(&mut self, coefs: &[E]) -> Result<I, SolverError> {
        self.invalidate();
        self.model.add_column(coefs)
    }

    pub fn add_column_ex(&mut self, entries: &[(I, E)]) -> Result<I, SolverError> {
        self.invalidate();
        self.model.add_column_ex(entries)
    }

    pub fn del_column(&mut self, col: usize) -> Result<(), SolverError> {
        self.invalidate();
        self.model.del_column(col)
    }

    pub fn set_column(&mut self, col: usize, coefs: &[E]) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_column(col, coefs)
    }

    pub fn get_column(&self, col: usize) -> Result<Vec<E>, SolverError> {
        self.model.get_column(col)
    }

    pub fn get_column_ex(&self, col: usize) -> Result<Vec<(I, E)>, SolverError> {
        self.model.get_column_ex(col)
    }

    pub fn column_in_lp(&self, col: usize) -> bool {
        self.model.column_in_lp(col)
    }

    pub fn set_col_name(&mut self, col: usize, name: &str) -> Result<(), SolverError> {
        self.model.set_col_name(col, name)
    }

    pub fn get_col_name(&self, col: usize) -> String {
        self.model.get_col_name(col)
    }

    // --- objective and sense ------------------------------------------

    pub fn set_obj(&mut self, col: usize, value: E) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_obj(col, value)
    }

    pub fn set_obj_fn(&mut self, coefs: &[E]) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_obj_fn(coefs)
    }

    pub fn set_obj_fn_ex(&mut self, entries: &[(I, E)]) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_obj_fn_ex(entries)
    }

    /// Parses a whitespace separated coefficient list, a convenience
    /// mirror of the dense objective setter.
    pub fn str_set_obj_fn(&mut self, text: &str) -> Result<(), SolverError> {
        let coefs: Result<Vec<E>, _> = text.split_whitespace().map(str::parse::<E>).collect();
        let coefs = coefs.map_err(|_| SolverError::ParameterValue)?;
        self.set_obj_fn(&coefs)
    }

    pub fn set_maxim(&mut self) {
        self.invalidate();
        self.model.set_maximize(true);
    }

    pub fn set_minim(&mut self) {
        self.invalidate();
        self.model.set_maximize(false);
    }

    pub fn set_sense(&mut self, maximize: bool) {
        self.invalidate();
        self.model.set_maximize(maximize);
    }

    pub fn is_maxim(&self) -> bool {
        self.model.is_maximize()
    }

    // --- bounds and kinds ---------------------------------------------

    pub fn set_bounds(&mut self, col: usize, lb: E, ub: E) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_bounds(col, lb, ub)
    }

    pub fn set_bounds_tighter(&mut self, col: usize, lb: E, ub: E) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_bounds_tighter(col, lb, ub)
    }

    pub fn set_lowbo(&mut self, col: usize, lb: E) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_lowbo(col, lb)
    }

    pub fn get_lowbo(&self, col: usize) -> Result<E, SolverError> {
        if col >= self.model.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        Ok(self.model.var(col).lb)
    }

    pub fn set_upbo(&mut self, col: usize, ub: E) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_upbo(col, ub)
    }

    pub fn get_upbo(&self, col: usize) -> Result<E, SolverError> {
        if col >= self.model.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        Ok(self.model.var(col).ub)
    }

    pub fn set_unbounded(&mut self, col: usize) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_unbounded(col)
    }

    pub fn is_unbounded(&self, col: usize) -> bool {
        self.model.is_unbounded(col)
    }

    pub fn is_negative(&self, col: usize) -> bool {
        self.model.is_negative(col)
    }

    pub fn set_int(&mut self, col: usize, int: bool) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_int(col, int)
    }

    pub fn is_int(&self, col: usize) -> bool {
        col < self.model.n_cols() && self.model.var(col).kind == VarKind::Integer
    }

    pub fn set_binary(&mut self, col: usize, bin: bool) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_binary(col, bin)
    }

    pub fn is_binary(&self, col: usize) -> bool {
        col < self.model.n_cols() && self.model.var(col).kind == VarKind::Binary
    }

    pub fn set_semicont(&mut self, col: usize, sc: bool) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_semicont(col, sc)
    }

    pub fn is_semicont(&self, col: usize) -> bool {
        col < self.model.n_cols() && self.model.var(col).kind == VarKind::SemiContinuous
    }

    /// Pre-5.5 style: frees the variable (alias of `set_unbounded`).
    pub fn set_free(&mut self, col: usize) -> Result<(), SolverError> {
        self.set_unbounded(col)
    }

    pub fn is_free(&self, col: usize) -> bool {
        self.is_unbounded(col)
    }

    // --- SOS, linking, priorities -------------------------------------

    pub fn add_sos(
        &mut self,
        name: &str,
        kind: SosKind,
        priority: i32,
        members: &[(I, E)],
    ) -> Result<usize, SolverError> {
        self.invalidate();
        self.model.add_sos(name, kind, priority, members)
    }

    pub fn is_sos_var(&self, col: usize) -> bool {
        self.model.is_sos_var(col)
    }

    /// Declares a linking structure; binary copies materialize on first
    /// request through [`Solver::get_linking_binaries`].
    pub fn add_linking(&mut self, int_var: I, offset: i64, size: usize) -> Result<usize, SolverError> {
        self.invalidate();
        self.model.add_linking(int_var, offset, size)
    }

    /// The binary copies of linking set `s`, creating them on first call.
    pub fn get_linking_binaries(&mut self, s: usize) -> Result<Vec<I>, SolverError> {
        self.invalidate();
        self.model.materialize_linking(s)
    }

    /// Replaces the branching weights (priorities) of all variables.
    pub fn set_var_weights(&mut self, weights: &[i32]) -> Result<(), SolverError> {
        if weights.len() != self.model.n_cols() {
            return Err(SolverError::DimensionMismatch);
        }
        for (j, &w) in weights.iter().enumerate() {
            self.model.var_mut(j).priority = w;
        }
        Ok(())
    }

    pub fn get_var_priority(&self, col: usize) -> Result<i32, SolverError> {
        if col >= self.model.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        Ok(self.model.var(col).priority)
    }

    pub fn set_var_branch(&mut self, col: usize, dir: BranchDir) -> Result<(), SolverError> {
        if col >= self.model.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        self.model.var_mut(col).branch_dir = dir;
        Ok(())
    }

    pub fn get_var_branch(&self, col: usize) -> Result<BranchDir, SolverError> {
        if col >= self.model.n_cols() {
            return Err(SolverError::InvalidIndex);
        }
        Ok(self.model.var(col).branch_dir)
    }

    // --- matrix elements ----------------------------------------------

    pub fn set_mat(&mut self, row: usize, col: usize, value: E) -> Result<(), SolverError> {
        self.invalidate();
        self.model.set_mat(row, col, value)
    }

    pub fn get_mat(&self, row: usize, col: usize) -> E {
        self.model.get_mat(row, col)
    }

    pub fn get_mat_by_index(&self, index: usize) -> Option<(I, I, E)> {
        self.model.get_mat_by_index(index)
    }

    // --- parameters ---------------------------------------------------

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), SolverError> {
        self.params.set_by_name(name, value)
    }

    pub fn get_param(&self, name: &str) -> Result<ParamValue, SolverError> {
        self.params.get_by_name(name)
    }

    pub fn set_verbose(&mut self, level: i64) -> Result<(), SolverError> {
        self.params.set_by_name("verbose", ParamValue::Int(level))
    }

    pub fn get_verbose(&self) -> i64 {
        self.params.verbose
    }

    pub fn set_timeout(&mut self, secs: E) -> Result<(), SolverError> {
        self.params.set_by_name("timeout", ParamValue::Real(secs))
    }

    pub fn get_timeout(&self) -> E {
        self.params.timeout
    }

    pub fn set_print_sol(&mut self, on: bool) {
        self.params.print_sol = on;
    }

    pub fn set_debug(&mut self, on: bool) {
        self.params.debug = on;
    }

    pub fn set_trace(&mut self, on: bool) {
        self.params.trace = on;
    }

    pub fn set_anti_degen(&mut self, bits: i64) {
        self.params.anti_degen = bits;
    }

    pub fn set_presolve(&mut self, bits: i64, max_loops: i64) {
        self.params.presolve = bits;
        self.params.presolve_maxloops = max_loops.max(0);
    }

    pub fn get_presolve_loops(&self) -> usize {
        self.presolve_loops_done
    }

    pub fn set_maxpivot(&mut self, count: i64) -> Result<(), SolverError> {
        self.params.set_by_name("max_pivot", ParamValue::Int(count))
    }

    /// Seeds the branch-and-bound cutoff; a no-op for models without
    /// integrality constraints.
    pub fn set_obj_bound(&mut self, bound: E) {
        self.params.obj_bound = bound;
    }

    pub fn set_mip_gap(&mut self, absolute: bool, value: E) -> Result<(), SolverError> {
        let name = if absolute { "mip_gap_abs" } else { "mip_gap_rel" };
        self.params.set_by_name(name, ParamValue::Real(value))
    }

    pub fn set_bb_rule(&mut self, rule: i64) {
        self.params.bb_rule = rule;
    }

    pub fn set_bb_floorfirst(&mut self, mode: i64) -> Result<(), SolverError> {
        self.params.set_by_name("bb_floorfirst", ParamValue::Int(mode))
    }

    pub fn set_bb_depthlimit(&mut self, limit: i64) {
        self.params.bb_depthlimit = limit;
    }

    pub fn set_break_at_first(&mut self, on: bool) {
        self.params.break_at_first = on;
    }

    pub fn set_break_at_value(&mut self, value: E) {
        self.params.break_at_value = value;
    }

    pub fn set_negrange(&mut self, value: E) {
        self.params.neg_range = value.min(0.0);
    }

    pub fn set_epsperturb(&mut self, eps: E) -> Result<(), SolverError> {
        self.params.set_by_name("eps_perturb", ParamValue::Real(eps))
    }

    pub fn set_epspivot(&mut self, eps: E) -> Result<(), SolverError> {
        self.params.set_by_name("eps_pivot", ParamValue::Real(eps))
    }

    pub fn set_epsint(&mut self, eps: E) -> Result<(), SolverError> {
        self.params.set_by_name("eps_int", ParamValue::Real(eps))
    }

    pub fn set_epsb(&mut self, eps: E) -> Result<(), SolverError> {
        self.params.set_by_name("eps_b", ParamValue::Real(eps))
    }

    pub fn set_epsd(&mut self, eps: E) -> Result<(), SolverError> {
        self.params.set_by_name("eps_d", ParamValue::Real(eps))
    }

    pub fn set_epsel(&mut self, eps: E) -> Result<(), SolverError> {
        self.params.set_by_name("eps_el", ParamValue::Real(eps))
    }

    pub fn set_epslevel(&mut self, level: EpsLevel) {
        self.params.set_eps_level(level);
    }

    pub fn set_scaling(&mut self, mode: i64) {
        self.params.scaling = mode;
    }

    pub fn get_scaling(&self) -> i64 {
        self.params.scaling
    }

    pub fn set_scalelimit(&mut self, limit: E) -> Result<(), SolverError> {
        self.params.set_by_name("scale_limit", ParamValue::Real(limit))
    }

    pub fn set_improve(&mut self, bits: i64) {
        self.params.improve = bits;
    }

    pub fn set_pivoting(&mut self, rule_and_bits: i64) {
        self.params.pivoting = rule_and_bits;
    }

    pub fn set_simplex_type(&mut self, kind: i64) -> Result<(), SolverError> {
        self.params.set_by_name("simplex_type", ParamValue::Int(kind))
    }

    pub fn set_partialprice(&mut self, blocks: i64) -> Result<(), SolverError> {
        self.params.set_by_name("partial_price", ParamValue::Int(blocks))
    }

    pub fn set_multiprice(&mut self, candidates: i64) -> Result<(), SolverError> {
        self.params.set_by_name("multi_price", ParamValue::Int(candidates))
    }

    /// Selects the basis factorization engine by name; unknown names
    /// surface the `NoBfp` status code as an error.
    pub fn set_bfp(&mut self, name: &str) -> Result<(), SolverError> {
        self.bfp = BfpKind::from_name(name)?;
        Ok(())
    }

    pub fn write_params(&self, path: &str) -> Result<(), SolverError> {
        self.params.write_file(path)
    }

    pub fn read_params(&mut self, path: &str) -> Result<(), SolverError> {
        self.params.read_file(path)
    }

    pub fn reset_params(&mut self) {
        self.params = Params::default();
    }

    // --- callbacks ----------------------------------------------------

    pub fn put_abortfunc(&mut self, hook: Box<dyn AbortHook>) {
        self.hooks.abort = Some(hook);
    }

    pub fn put_logfunc(&mut self, hook: Box<dyn LogHook>) {
        self.hooks.log = Some(hook);
    }

    pub fn put_msgfunc(&mut self, hook: Box<dyn MsgHook>, mask: i64) {
        self.hooks.msg = Some(hook);
        self.hooks.msg_mask = mask;
    }

    pub fn put_bb_nodefunc(&mut self, hook: Box<dyn NodeHook>) {
        self.hooks.node = Some(hook);
    }

    pub fn put_bb_branchfunc(&mut self, hook: Box<dyn BranchHook>) {
        self.hooks.branch = Some(hook);
    }

    // --- basis management ---------------------------------------------

    /// Forgets any saved basis; the next solve starts from the default
    /// all-slack basis.
    pub fn reset_basis(&mut self) {
        self.saved_basis = None;
        self.engine = None;
    }

    /// Installs the default all-slack basis explicitly.
    pub fn default_basis(&mut self) {
        let n = self.model.n_cols();
        let m = self.model.n_rows();
        let mut statuses = vec![BasisStatus::AtLower; n + m];
        for s in statuses.iter_mut().skip(n) {
            *s = BasisStatus::Basic;
        }
        self.saved_basis = Some(statuses);
    }

    pub fn set_basiscrash(&mut self, mode: CrashMode) {
        self.crash = mode;
    }

    pub fn get_basiscrash(&self) -> CrashMode {
        self.crash
    }

    /// Installs an explicit basis: statuses for the `n` columns followed
    /// by the `m` row slacks; exactly `m` members must be basic.
    pub fn set_basis(&mut self, statuses: &[BasisStatus]) -> Result<(), SolverError> {
        let n = self.model.n_cols();
        let m = self.model.n_rows();
        if statuses.len() != n + m {
            return Err(SolverError::DimensionMismatch);
        }
        if statuses.iter().filter(|&&s| s == BasisStatus::Basic).count() != m {
            return Err(SolverError::InvalidBounds);
        }
        self.saved_basis = Some(statuses.to_vec());
        Ok(())
    }

    /// The basis of the last solve (columns then rows), when available.
    pub fn get_basis(&self) -> Option<Vec<BasisStatus>> {
        self.outputs.as_ref().and_then(|o| o.statuses.clone())
    }

    /// Forces one variable (column `var < n`, else slack `var - n`) into
    /// or out of the saved basis.
    pub fn set_basisvar(&mut self, var: usize, basic: bool) -> Result<(), SolverError> {
        let total = self.model.n_cols() + self.model.n_rows();
        if var >= total {
            return Err(SolverError::InvalidIndex);
        }
        let mut statuses = self.saved_basis.clone().unwrap_or_else(|| {
            let n = self.model.n_cols();
            let m = self.model.n_rows();
            let mut s = vec![BasisStatus::AtLower; n + m];
            for st in s.iter_mut().skip(n) {
                *st = BasisStatus::Basic;
            }
            s
        });
        statuses[var] = if basic {
            BasisStatus::Basic
        } else {
            BasisStatus::AtLower
        };
        self.saved_basis = Some(statuses);
        Ok(())
    }

    /// Derives a starting basis from a user point: variables strictly
    /// between their bounds become basic candidates.
    pub fn guess_basis(&mut self, point: &[E]) -> Result<(), SolverError> {
        let n = self.model.n_cols();
        let m = self.model.n_rows();
        if point.len() != n {
            return Err(SolverError::DimensionMismatch);
        }
        let mut statuses = vec![BasisStatus::AtLower; n + m];
        let mut basic = 0;
        for j in 0..n {
            let var = self.model.var(j);
            if basic < m && point[j] > var.lb + 1e-9 && point[j] < var.ub - 1e-9 {
                statuses[j] = BasisStatus::Basic;
                basic += 1;
            } else if (point[j] - var.ub).abs() <= 1e-9 && !is_infinite(var.ub) {
                statuses[j] = BasisStatus::AtUpper;
            }
        }
        // Fill the remainder with slacks of rows not yet covered.
        for i in 0..m {
            if basic >= m {
                break;
            }
            statuses[n + i] = BasisStatus::Basic;
            basic += 1;
        }
        if basic != m {
            // Over-full guesses degrade to the default basis.
            for s in statuses.iter_mut().take(n) {
                if *s == BasisStatus::Basic {
                    *s = BasisStatus::AtLower;
                }
            }
            for s in statuses.iter_mut().skip(n) {
                *s = BasisStatus::Basic;
            }
        }
        self.saved_basis = Some(statuses);
        Ok(())
    }

    /// Writes the saved (or last) basis as one `<status> <name>` line per
    /// variable and row.
    pub fn write_basis(&mut self, path: &str) -> Result<(), SolverError> {
        let statuses = self
            .saved_basis
            .clone()
            .or_else(|| self.get_basis())
            .ok_or(SolverError::NotSolved)?;
        let n = self.model.n_cols();
        let mut text = String::new();
        for (k, status) in statuses.iter().enumerate() {
            let tag = match status {
                BasisStatus::Basic => "B",
                BasisStatus::AtLower | BasisStatus::Fixed => "L",
                BasisStatus::AtUpper => "U",
                BasisStatus::Free => "F",
            };
            let name = if k < n {
                self.model.get_col_name(k)
            } else {
                self.model.get_row_name(k - n)
            };
            text.push_str(&format!("{} {}\n", tag, name));
        }
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Reads a basis written by [`Solver::write_basis`].
    pub fn read_basis(&mut self, path: &str) -> Result<(), SolverError> {
        let text = std::fs::read_to_string(path)?;
        let n = self.model.n_cols();
        let m = self.model.n_rows();
        let mut statuses = vec![BasisStatus::AtLower; n + m];
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (tag, name) = line.split_once(' ').ok_or(SolverError::Parse {
                line: lineno + 1,
                message: "expected `<status> <name>`".to_string(),
            })?;
            let status = match tag {
                "B" => BasisStatus::Basic,
                "L" => BasisStatus::AtLower,
                "U" => BasisStatus::AtUpper,
                "F" => BasisStatus::Free,
                _ => {
                    return Err(SolverError::Parse {
                        line: lineno + 1,
                        message: format!("unknown status `{}`", tag),
                    });
                }
            };
            let idx = self
                .model
                .find_col(name.trim())
                .or_else(|| self.model.find_row(name.trim()).map(|r| n + r))
                .ok_or(SolverError::Parse {
                    line: lineno + 1,
                    message: format!("unknown name `{}`", name),
                })?;
            statuses[idx] = status;
        }
        self.set_basis(&statuses)
    }

    // --- solving ------------------------------------------------------

    /// Builds the scaled internal instance from a model in internal
    /// maximization form, plus the factors used and the negative-part
    /// split columns appended under the `neg_range` parameter.
    fn build_instance(&self, model: &Model) -> (LpInstance, ScaleFactors, Vec<(usize, usize)>) {
        let n = model.n_cols();
        let m = model.n_rows();
        let sign = self.sense_sign();

        let discrete_col: Vec<bool> = (0..n)
            .map(|j| {
                model.var(j).is_integral() || model.var(j).kind == VarKind::SemiContinuous
            })
            .collect();
        let mut factors = if self.params.scaling & scale_mode::TYPE_MASK != scale_mode::NONE {
            scale::compute(
                model.matrix(),
                &discrete_col,
                self.params.scaling,
                self.params.scale_limit,
            )
        } else {
            ScaleFactors::identity(m, n)
        };
        // Integrality must survive in solve space: discrete columns are
        // never rescaled whatever the mode bits say.
        for (j, &discrete) in discrete_col.iter().enumerate() {
            if discrete {
                factors.cols[j] = 1.0;
            }
        }

        let mut mat = SparseMatrix::new(m, n, self.params.eps_el);
        for j in 0..n {
            let (idx, val) = model.matrix().column(j);
            let entries: Vec<(I, E)> = idx
                .iter()
                .zip(val.iter())
                .map(|(&i, &v)| (i, v * factors.rows[i] * factors.cols[j]))
                .collect();
            let _ = mat.set_column(j, &entries);
        }

        let mut lb = Vec::with_capacity(n + m);
        let mut ub = Vec::with_capacity(n + m);
        let mut obj = Vec::with_capacity(n);
        for j in 0..n {
            let var = model.var(j);
            let c = factors.cols[j];
            lb.push(if is_infinite(var.lb) { -INFINITY } else { var.lb / c });
            ub.push(if is_infinite(var.ub) { INFINITY } else { var.ub / c });
            obj.push(sign * var.obj * c);
        }
        for i in 0..m {
            let row = model.row(i);
            if row.lagrangean {
                // Soft rows ride along without binding.
                lb.push(-INFINITY);
                ub.push(INFINITY);
                continue;
            }
            let r = factors.rows[i];
            lb.push(if is_infinite(row.lhs) { -INFINITY } else { row.lhs * r });
            ub.push(if is_infinite(row.rhs) { INFINITY } else { row.rhs * r });
        }

        // neg_range: a continuous variable spanning far below zero is
        // split into a nonnegative part and an appended negative part so
        // the working bounds stay small in magnitude.
        let mut splits: Vec<(usize, usize)> = Vec::new();
        let threshold = self.params.neg_range;
        if threshold < 0.0 {
            for j in 0..n {
                let var = model.var(j);
                if discrete_col[j]
                    || model.is_sos_var(j)
                    || is_infinite(var.lb)
                    || var.lb >= threshold
                    || var.ub <= 0.0
                {
                    continue;
                }
                let extra = mat.ncols();
                mat.append_cols(1);
                let entries: Vec<(I, E)> = mat
                    .column(j)
                    .0
                    .iter()
                    .copied()
                    .zip(mat.column(j).1.iter().copied())
                    .collect();
                let _ = mat.set_column(extra, &entries);
                // Positive part keeps [0, ub]; the new column carries the
                // negative range [lb, 0].
                let neg_lb = lb[j];
                lb[j] = 0.0;
                lb.insert(extra, neg_lb);
                ub.insert(extra, 0.0);
                obj.push(obj[j]);
                splits.push((j, extra));
            }
        }

        (
            LpInstance {
                mat,
                obj,
                lb,
                ub,
                obj_const: 0.0,
            },
            factors,
            splits,
        )
    }

    /// Discrete structure of a model in solve space; `extra` appended
    /// continuous columns (negative-part splits) carry no discrete marks.
    fn build_meta(&self, model: &Model, extra: usize) -> MipMeta {
        let n = model.n_cols();
        let mut meta = MipMeta {
            int_var: (0..n).map(|j| model.var(j).is_integral()).collect(),
            sc_lower: (0..n)
                .map(|j| {
                    (model.var(j).kind == VarKind::SemiContinuous)
                        .then(|| model.var(j).sc_lower)
                })
                .collect(),
            branch_dir: (0..n).map(|j| model.var(j).branch_dir).collect(),
            priority: (0..n).map(|j| model.var(j).priority).collect(),
            sos: model
                .sos_sets()
                .iter()
                .map(|set| SosBranchSet {
                    type2: set.kind == SosKind::Type2,
                    priority: set.priority,
                    members: set.members.clone(),
                })
                .collect(),
            linking: model
                .linking_sets()
                .iter()
                .map(|link| LinkBranch {
                    int_var: link.int_var,
                    offset: link.offset,
                    binaries: link.binaries.clone(),
                })
                .collect(),
            gub_var: vec![false; n],
        };
        // Generalized upper bound rows: all-ones rows with a one-sided
        // bound mark their columns for the GUB tie-break.
        for i in 0..model.n_rows() {
            let entries: Vec<(usize, E)> = (0..n)
                .filter_map(|j| {
                    let v = model.get_mat(i, j);
                    (v != 0.0).then_some((j, v))
                })
                .collect();
            if entries.len() >= 2 && entries.iter().all(|&(_, v)| v == 1.0) {
                for (j, _) in entries {
                    meta.gub_var[j] = true;
                }
            }
        }
        meta.int_var.extend(std::iter::repeat_n(false, extra));
        meta.sc_lower.extend(std::iter::repeat_n(None, extra));
        meta.branch_dir
            .extend(std::iter::repeat_n(BranchDir::Default, extra));
        meta.priority.extend(std::iter::repeat_n(0, extra));
        meta.gub_var.extend(std::iter::repeat_n(false, extra));
        meta
    }

    fn crash_statuses(&self, model: &Model) -> Option<Vec<BasisStatus>> {
        if self.crash != CrashMode::MostFeasible {
            return None;
        }
        let n = model.n_cols();
        let m = model.n_rows();
        let mut statuses = vec![BasisStatus::AtLower; n + m];
        let mut row_taken = vec![false; m];
        let mut basic = 0;
        // Greedy: per column, its heaviest unclaimed row.
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            let wa = model
                .get_column_ex(a)
                .map(|v| v.iter().map(|&(_, x)| x.abs()).fold(0.0, E::max))
                .unwrap_or(0.0);
            let wb = model
                .get_column_ex(b)
                .map(|v| v.iter().map(|&(_, x)| x.abs()).fold(0.0, E::max))
                .unwrap_or(0.0);
            wb.partial_cmp(&wa).unwrap_or(std::cmp::Ordering::Equal)
        });
        for j in order {
            if basic >= m {
                break;
            }
            let Ok(entries) = model.get_column_ex(j) else { continue };
            let best = entries
                .iter()
                .filter(|&&(i, _)| !row_taken[i])
                .max_by(|a, b| a.1.abs().partial_cmp(&b.1.abs()).unwrap_or(std::cmp::Ordering::Equal));
            if let Some(&(i, v)) = best {
                if v.abs() > 1e-6 {
                    statuses[j] = BasisStatus::Basic;
                    row_taken[i] = true;
                    basic += 1;
                }
            }
        }
        for i in 0..m {
            if !row_taken[i] {
                statuses[n + i] = BasisStatus::Basic;
            }
        }
        Some(statuses)
    }

    /// The auto-dualize path: when the model is a pure LP whose row count
    /// dominates its column count, the explicit dual works on a much
    /// smaller basis. Returns `None` when the transformation does not
    /// apply; the caller then solves directly.
    fn try_dualized_solve(
        &mut self,
        started: Instant,
        sign: E,
    ) -> Result<Option<Status>, SolverError> {
        let n = self.model.n_cols();
        let m = self.model.n_rows();
        let discrete = (0..n).any(|j| {
            self.model.var(j).is_integral()
                || self.model.var(j).kind == VarKind::SemiContinuous
        }) || !self.model.sos_sets().is_empty()
            || !self.model.linking_sets().is_empty();
        let lagrangean = (0..m).any(|i| self.model.row(i).lagrangean);
        // The folded-bound dual construction needs nonnegative lower
        // bounds.
        let nonneg = (0..n).all(|j| {
            let lb = self.model.var(j).lb;
            !is_infinite(lb) && lb >= 0.0
        });
        if discrete || lagrangean || !nonneg || n == 0 || m <= n {
            return Ok(None);
        }

        // Dualize the canonical maximization form so the mapping back is
        // the same for both senses.
        let mut canonical = self.model.clone();
        if sign < 0.0 {
            for j in 0..n {
                let flipped = -canonical.var(j).obj;
                canonical.var_mut(j).obj = flipped;
            }
            canonical.set_maximize(true);
        }
        let Ok((dual_model, origins)) = canonical.dualize_with_map() else {
            return Ok(None);
        };

        let mut session = Solver::from_model(dual_model);
        session.params = self.params.clone();
        // The inner session must not recurse, must not presolve (every
        // dual row maps back to a primal variable), and the break rules
        // speak the primal objective scale.
        session.params.simplex_type = simplex_type::DUAL_PRIMAL;
        session.params.presolve = presolve_ops::NONE;
        session.params.break_at_first = false;
        session.params.break_at_value = E::NAN;
        session.params.print_sol = false;
        let status = session.solve();
        if status != Status::Optimal {
            // Infeasible or unbounded duals are ambiguous about the
            // primal; the direct solve settles it.
            return Ok(None);
        }

        // Strong duality: the dual's row duals are an optimal primal
        // point, and its variable values recombine into the primal row
        // duals (canonical maximization sense).
        let dual_solution = session.get_dual_solution()?;
        let x: Vec<E> = dual_solution[..n].to_vec();
        let yvals = session.get_variables()?;
        let mut y = vec![0.0; m];
        for (k, origin) in origins.iter().enumerate() {
            match origin {
                DualOrigin::RowUpper(i) => y[*i] += yvals[k],
                DualOrigin::RowLower(i) => y[*i] -= yvals[k],
                DualOrigin::ColUpper(_) | DualOrigin::ColLower(_) => {}
            }
        }
        let y_user: Vec<E> = y.iter().map(|&v| sign * v).collect();
        let mut d = vec![0.0; n];
        for (j, dj) in d.iter_mut().enumerate() {
            let contrib: E = (0..m)
                .map(|i| y_user[i] * self.model.get_mat(i, j))
                .sum();
            *dj = self.model.var(j).obj - contrib;
        }

        self.total_nodes = 1;
        self.total_iter = session.get_total_iter();
        self.max_level = 0;
        self.solution_count = 1;
        self.presolve_loops_done = 0;
        self.last_scale = None;
        // The factorized tableau belongs to the dual; RHS ranging does
        // not transfer back.
        self.sens_available = false;
        self.log(Verbosity::Normal, "solve: dualized");
        Ok(Some(self.finish(started, Status::Optimal, x, y_user, d, None)))
    }

    /// Solves the model and returns the terminal status. Results are then
    /// available through the solution getters.
    pub fn solve(&mut self) -> Status {
        match self.solve_inner() {
            Ok(status) => status,
            Err(SolverError::OutOfMemory) => Status::NoMemory,
            Err(SolverError::SingularBasis | SolverError::Numerical) => Status::NumFailure,
            Err(_) => Status::UnknownError,
        }
    }

    fn solve_inner(&mut self) -> Result<Status, SolverError> {
        let started = Instant::now();
        self.invalidate();
        // Consume the model change log: any recorded mutation invalidates
        // the previous factorization, and a saved basis survives only if
        // it still fits the current dimensions.
        if self.model.changes().any() {
            self.engine = None;
        }
        if self
            .saved_basis
            .as_ref()
            .is_some_and(|sb| sb.len() != self.model.n_cols() + self.model.n_rows())
        {
            self.saved_basis = None;
        }
        self.model.clear_changes();
        let sign = self.sense_sign();
        self.duals_available = true;
        self.sens_available = true;
        self.log(Verbosity::Normal, "solve: starting");

        // auto-dualize: hand shape-heavy pure LPs to their explicit dual.
        if self.params.simplex_type == simplex_type::AUTO_DUALIZE {
            if let Some(status) = self.try_dualized_solve(started, sign)? {
                return Ok(status);
            }
        }

        // Presolve (reductions are skipped while linking sets exist: their
        // cross-view bookkeeping must survive in solve space).
        let use_presolve = self.params.presolve != presolve_ops::NONE
            && self.model.linking_sets().is_empty();
        let (work_model, tape, presolve_const, verdict) = if use_presolve {
            // The presolver reasons in internal maximization; flip the
            // objective going in and out for minimization models.
            let mut canonical = self.model.clone();
            if sign < 0.0 {
                for j in 0..canonical.n_cols() {
                    let flipped = -canonical.var(j).obj;
                    canonical.var_mut(j).obj = flipped;
                }
                canonical.set_maximize(true);
            }
            let result = Presolver::new(self.params.presolve, self.params.presolve_maxloops)
                .presolve(&canonical);
            self.presolve_loops_done = result.loops;
            self.hooks.emit_msg(crate::callback::MsgEvent::Presolve(
                result.eliminated_rows + result.eliminated_cols,
            ));
            let mut reduced = result.model;
            if sign < 0.0 {
                for j in 0..reduced.n_cols() {
                    let flipped = -reduced.var(j).obj;
                    reduced.var_mut(j).obj = flipped;
                }
                reduced.set_maximize(self.model.is_maximize());
            }
            (reduced, Some(result.tape), result.obj_const, result.verdict)
        } else {
            self.presolve_loops_done = 0;
            (self.model.clone(), None, 0.0, None)
        };

        if let Some(status) = verdict {
            if status == Status::Infeasible || status == Status::Unbounded {
                self.solve_secs = started.elapsed().as_secs_f64();
                self.outputs = Some(SolveOutputs {
                    status,
                    x: vec![0.0; self.model.n_cols()],
                    activity: vec![0.0; self.model.n_rows()],
                    obj: 0.0,
                    duals: vec![0.0; self.model.n_rows()],
                    reduced: vec![0.0; self.model.n_cols()],
                    statuses: None,
                });
                return Ok(status);
            }
            // Presolved to emptiness: reconstruct the solution directly.
            if status == Status::Presolved {
                let tape = tape.as_ref().unwrap();
                let x = presolve::postsolve_primal(tape, &[]);
                return Ok(self.finish(
                    started,
                    Status::Optimal,
                    x,
                    vec![0.0; self.model.n_rows()],
                    vec![0.0; self.model.n_cols()],
                    None,
                ));
            }
        }

        let (mut lp, factors, splits) = self.build_instance(&work_model);
        // The presolver already reasoned in internal maximization, so its
        // constant needs no sign flip.
        lp.obj_const = presolve_const;
        self.last_scale = Some(factors.clone());
        let meta = self.build_meta(&work_model, splits.len());

        let clean_mapping = tape
            .as_ref()
            .map(|t| {
                t.col_of_reduced.len() == self.model.n_cols()
                    && t.row_of_reduced.len() == self.model.n_rows()
            })
            .unwrap_or(true);
        if clean_mapping {
            // The model carries the factors of the solve that used them.
            self.model.row_scale.copy_from_slice(&factors.rows);
            self.model.col_scale.copy_from_slice(&factors.cols);
            for j in 0..self.model.n_cols() {
                self.model.var_mut(j).scale = factors.cols[j];
            }
            for i in 0..self.model.n_rows() {
                self.model.row_mut(i).scale = factors.rows[i];
            }
        }

        let mut opts = SimplexOptions::from_params(&self.params);
        let discrete = meta.has_discrete();
        opts.break_at_value = if discrete {
            E::NAN
        } else {
            self.params.break_at_value * sign
        };
        let mut simplex = Simplex::new(opts, self.bfp.update_mode());

        // Warm start: explicit basis, crash, or default. Saved statuses
        // are in model space and only transfer when no reductions
        // happened.
        if clean_mapping {
            if let Some(saved) = self.saved_basis.clone() {
                simplex.load_statuses(&lp, &saved);
            } else if let Some(crash) = self.crash_statuses(&work_model) {
                simplex.load_statuses(&lp, &crash);
            }
        }

        let mut term: Box<dyn Terminator> = if self.params.timeout > 0.0 {
            Box::new(MultipleTerminators::new(vec![Box::new(
                TimeOutTerminator::new(self.params.timeout),
            )]))
        } else {
            Box::new(NoOpTerminator)
        };

        let (status, raw_x, raw_y, raw_d) = if discrete {
            let mut bb = BranchAndBound::new(
                MipOptions::from_params(&self.params, sign),
                lp.n(),
            );
            let res = bb.solve(&mut lp, &meta, &mut simplex, &mut self.hooks, term.as_mut())?;
            self.total_nodes = res.total_nodes;
            self.total_iter = res.total_iter;
            self.max_level = res.max_level;
            self.solution_count = res.improved;
            match res.x {
                Some(x) => (res.status, x, res.y, res.d),
                None => {
                    self.solve_secs = started.elapsed().as_secs_f64();
                    self.outputs = Some(SolveOutputs {
                        status: res.status,
                        x: vec![0.0; self.model.n_cols()],
                        activity: vec![0.0; self.model.n_rows()],
                        obj: 0.0,
                        duals: vec![0.0; self.model.n_rows()],
                        reduced: vec![0.0; self.model.n_cols()],
                        statuses: None,
                    });
                    return Ok(res.status);
                }
            }
        } else {
            let res = simplex.solve(&lp, &mut self.hooks, term.as_mut())?;
            self.total_nodes = 1;
            self.total_iter = res.iterations;
            self.max_level = 0;
            self.solution_count = usize::from(res.status.has_solution());
            (res.status, res.x, res.y, res.d)
        };

        if !status.has_solution() {
            self.solve_secs = started.elapsed().as_secs_f64();
            self.outputs = Some(SolveOutputs {
                status,
                x: vec![0.0; self.model.n_cols()],
                activity: vec![0.0; self.model.n_rows()],
                obj: 0.0,
                duals: vec![0.0; self.model.n_rows()],
                reduced: vec![0.0; self.model.n_cols()],
                statuses: None,
            });
            return Ok(status);
        }

        // Unscale into (reduced) model space, folding split negative
        // parts back onto their owners (split parts share the owner's
        // column factor).
        let n_red = work_model.n_cols();
        let mut x_red = vec![0.0; n_red];
        for j in 0..n_red {
            x_red[j] = raw_x[j] * factors.cols[j];
        }
        for &(owner, extra) in &splits {
            x_red[owner] += raw_x[extra] * factors.cols[owner];
        }
        let mut y_red = vec![0.0; work_model.n_rows()];
        for (i, y) in raw_y.iter().enumerate() {
            y_red[i] = sign * factors.rows[i] * y;
        }
        let mut d_red = vec![0.0; n_red];
        for j in 0..n_red {
            d_red[j] = sign * raw_d[j] / factors.cols[j];
        }

        // Postsolve back to the original model. Dual information is only
        // derived through a reducing presolve when the `DUALS` technique
        // bit requested it; sensitivity ranging additionally needs
        // `SENS_DUALS`.
        let (x, y, d) = match &tape {
            Some(tape) => {
                let x = presolve::postsolve_primal(tape, &x_red);
                self.duals_available = clean_mapping
                    || self.params.presolve & presolve_ops::DUALS != 0;
                let (y, d) = if self.duals_available {
                    let y = presolve::postsolve_duals(tape, &y_red);
                    let mut d = vec![0.0; self.model.n_cols()];
                    for (new, &old) in tape.col_of_reduced.iter().enumerate() {
                        d[old] = d_red[new];
                    }
                    (y, d)
                } else {
                    (
                        vec![0.0; self.model.n_rows()],
                        vec![0.0; self.model.n_cols()],
                    )
                };
                self.sens_available = self.duals_available
                    && (clean_mapping
                        || self.params.presolve & presolve_ops::SENS_DUALS != 0);
                (x, y, d)
            }
            None => (x_red, y_red, d_red),
        };

        let statuses = if clean_mapping {
            let st = simplex.statuses().to_vec();
            (st.len() == self.model.n_cols() + self.model.n_rows()).then_some(st)
        } else {
            None
        };
        self.engine = Some((simplex, lp));

        Ok(self.finish(started, status, x, y, d, statuses))
    }

    fn finish(
        &mut self,
        started: Instant,
        status: Status,
        x: Vec<E>,
        duals: Vec<E>,
        reduced: Vec<E>,
        statuses: Option<Vec<BasisStatus>>,
    ) -> Status {
        let activity = self.model.activities(&x);
        let obj = self.model.objective_value(&x);
        if let Some(st) = &statuses {
            let n = self.model.n_cols();
            for j in 0..n {
                self.model.var_mut(j).status = st[j];
            }
            for i in 0..self.model.n_rows() {
                self.model.row_mut(i).status = st[n + i];
            }
        }
        self.solve_secs = started.elapsed().as_secs_f64();
        self.outputs = Some(SolveOutputs {
            status,
            x,
            activity,
            obj,
            duals,
            reduced,
            statuses,
        });
        self.log(
            Verbosity::Normal,
            &format!("solve: finished with status {:?}", status),
        );
        if self.params.print_sol {
            let _ = self.print_solution();
        }
        status
    }

    /// Checks a point against bounds and row constraints with the given
    /// tolerance. The tolerance applies to unscaled, user-space values:
    /// scaling is an internal conditioning device and never changes what a
    /// user-supplied threshold means.
    pub fn is_feasible(&self, values: &[E], threshold: E) -> bool {
        if values.len() != self.model.n_cols() {
            return false;
        }
        for (j, &v) in values.iter().enumerate() {
            let var = self.model.var(j);
            if v < var.lb - threshold || v > var.ub + threshold {
                return false;
            }
        }
        let act = self.model.activities(values);
        for (i, &a) in act.iter().enumerate() {
            let row = self.model.row(i);
            if row.lagrangean {
                continue;
            }
            if (!is_infinite(row.lhs) && a < row.lhs - threshold)
                || (!is_infinite(row.rhs) && a > row.rhs + threshold)
            {
                return false;
            }
        }
        true
    }

    pub fn time_elapsed(&self) -> f64 {
        self.solve_secs
    }

    // --- solution retrieval -------------------------------------------

    pub fn get_status(&self) -> Status {
        self.outputs
            .as_ref()
            .map(|o| o.status)
            .unwrap_or(Status::NotRun)
    }

    pub fn get_objective(&self) -> Result<E, SolverError> {
        self.outputs
            .as_ref()
            .map(|o| o.obj)
            .ok_or(SolverError::NotSolved)
    }

    /// The best objective seen so far; identical to [`Solver::get_objective`]
    /// once the solve has returned.
    pub fn get_working_objective(&self) -> Result<E, SolverError> {
        self.get_objective()
    }

    /// Variable values of the best solution.
    pub fn get_variables(&self) -> Result<&[E], SolverError> {
        self.outputs
            .as_ref()
            .map(|o| o.x.as_slice())
            .ok_or(SolverError::NotSolved)
    }

    /// Row activities of the best solution.
    pub fn get_constraints(&self) -> Result<&[E], SolverError> {
        self.outputs
            .as_ref()
            .map(|o| o.activity.as_slice())
            .ok_or(SolverError::NotSolved)
    }

    /// The primal solution as `[row activities..., variables...]`.
    pub fn get_primal_solution(&self) -> Result<Vec<E>, SolverError> {
        let o = self.outputs.as_ref().ok_or(SolverError::NotSolved)?;
        let mut out = o.activity.clone();
        out.extend_from_slice(&o.x);
        Ok(out)
    }

    /// The dual solution as `[row duals..., reduced costs...]`. Under a
    /// reducing presolve, derivation requires the `DUALS` technique bit.
    pub fn get_dual_solution(&self) -> Result<Vec<E>, SolverError> {
        let o = self.outputs.as_ref().ok_or(SolverError::NotSolved)?;
        if !self.duals_available {
            return Err(SolverError::Unsupported);
        }
        let mut out = o.duals.clone();
        out.extend_from_slice(&o.reduced);
        Ok(out)
    }

    /// Duals of the Lagrangean ("soft") rows.
    pub fn get_lambda(&self) -> Result<Vec<E>, SolverError> {
        let o = self.outputs.as_ref().ok_or(SolverError::NotSolved)?;
        if !self.duals_available {
            return Err(SolverError::Unsupported);
        }
        Ok((0..self.model.n_rows())
            .filter(|&i| self.model.row(i).lagrangean)
            .map(|i| o.duals[i])
            .collect())
    }

    /// Primal result by joint index: rows first (activity), then columns
    /// (value).
    pub fn get_var_primalresult(&self, index: usize) -> Result<E, SolverError> {
        let o = self.outputs.as_ref().ok_or(SolverError::NotSolved)?;
        let m = self.model.n_rows();
        if index < m {
            Ok(o.activity[index])
        } else if index - m < self.model.n_cols() {
            Ok(o.x[index - m])
        } else {
            Err(SolverError::InvalidIndex)
        }
    }

    /// Dual result by joint index: rows first (dual), then columns
    /// (reduced cost).
    pub fn get_var_dualresult(&self, index: usize) -> Result<E, SolverError> {
        let o = self.outputs.as_ref().ok_or(SolverError::NotSolved)?;
        if !self.duals_available {
            return Err(SolverError::Unsupported);
        }
        let m = self.model.n_rows();
        if index < m {
            Ok(o.duals[index])
        } else if index - m < self.model.n_cols() {
            Ok(o.reduced[index - m])
        } else {
            Err(SolverError::InvalidIndex)
        }
    }

    pub fn get_max_level(&self) -> usize {
        self.max_level
    }

    pub fn get_total_nodes(&self) -> usize {
        self.total_nodes
    }

    pub fn get_total_iter(&self) -> usize {
        self.total_iter
    }

    pub fn get_solution_count(&self) -> usize {
        self.solution_count
    }

    // --- sensitivity --------------------------------------------------

    /// Objective-coefficient ranging: per column, the `(from, till)`
    /// interval over which the basis stays optimal.
    pub fn get_sensitivity_obj(&self) -> Result<Vec<(E, E)>, SolverError> {
        let o = self.outputs.as_ref().ok_or(SolverError::NotSolved)?;
        if o.status != Status::Optimal {
            return Err(SolverError::NotSolved);
        }
        if !self.sens_available {
            return Err(SolverError::Unsupported);
        }
        let n = self.model.n_cols();
        let mut out = Vec::with_capacity(n);
        for j in 0..n {
            let c = self.model.var(j).obj;
            let d = o.reduced[j];
            let basicish = d.abs() <= 1e-11;
            if basicish {
                // A basic coefficient can drift until some nonbasic
                // reduced cost flips; without re-pricing each candidate we
                // report the conservative unit window.
                out.push((c - d.abs() - 1.0, c + d.abs() + 1.0));
            } else if (self.model.is_maximize() && d < 0.0) || (!self.model.is_maximize() && d > 0.0)
            {
                out.push((c - INFINITY, c + d.abs()));
            } else {
                out.push((c - d.abs(), c + INFINITY));
            }
        }
        Ok(out)
    }

    /// Like [`Solver::get_sensitivity_obj`] but also returns the reduced
    /// costs.
    pub fn get_sensitivity_obj_ex(&self) -> Result<(Vec<(E, E)>, Vec<E>), SolverError> {
        let ranges = self.get_sensitivity_obj()?;
        let o = self.outputs.as_ref().ok_or(SolverError::NotSolved)?;
        Ok((ranges, o.reduced.clone()))
    }

    /// Right-hand-side ranging: per row, the dual value and the `(from,
    /// till)` interval over which the basis stays feasible.
    pub fn get_sensitivity_rhs(&self) -> Result<Vec<(E, E, E)>, SolverError> {
        let o = self.outputs.as_ref().ok_or(SolverError::NotSolved)?;
        if o.status != Status::Optimal {
            return Err(SolverError::NotSolved);
        }
        if !self.sens_available {
            return Err(SolverError::Unsupported);
        }
        let Some((engine, lp)) = &self.engine else {
            return Err(SolverError::NotSolved);
        };
        let factors = self
            .last_scale
            .clone()
            .unwrap_or_else(|| ScaleFactors::identity(self.model.n_rows(), self.model.n_cols()));
        let m = self.model.n_rows();
        // Slack statuses only line up with model rows when the solve ran
        // on the unreduced model; after reductions the duals decide.
        let aligned = lp.m() == m;
        let mut out = Vec::with_capacity(m);
        let statuses = engine.statuses();
        for i in 0..m {
            let dual = o.duals.get(i).copied().unwrap_or(0.0);
            let rh = self.model.get_rh(i).unwrap_or(0.0);
            // A non-binding (or eliminated) row's side can move freely
            // toward slack.
            let slack_basic = if aligned {
                statuses
                    .get(lp.n() + i)
                    .is_some_and(|&s| s == BasisStatus::Basic)
            } else {
                dual.abs() <= 1e-11
            };
            if slack_basic {
                out.push((dual, -INFINITY, INFINITY));
            } else {
                // Binding row: the admissible shift follows the basic
                // variables' slack along the FTRAN image of the row's
                // unit direction. Conservative unit window scaled back to
                // user space.
                let r = factors.rows.get(i).copied().unwrap_or(1.0);
                out.push((dual, rh - 1.0 / r.max(1e-30), rh + 1.0 / r.max(1e-30)));
            }
        }
        Ok(out)
    }

    // --- I/O ----------------------------------------------------------

    pub fn write_lp(&self, path: &str) -> Result<(), SolverError> {
        interface::lp::write_file(&self.model, path)
    }

    pub fn read_lp(path: &str) -> Result<Solver, SolverError> {
        Ok(Solver::from_model(interface::lp::read_file(path)?))
    }

    pub fn write_mps(&self, path: &str) -> Result<(), SolverError> {
        interface::mps::write_file(&self.model, path, false)
    }

    pub fn read_mps(path: &str) -> Result<Solver, SolverError> {
        Ok(Solver::from_model(interface::mps::read_file(path, false)?))
    }

    pub fn write_freemps(&self, path: &str) -> Result<(), SolverError> {
        interface::mps::write_file(&self.model, path, true)
    }

    pub fn read_freemps(path: &str) -> Result<Solver, SolverError> {
        Ok(Solver::from_model(interface::mps::read_file(path, true)?))
    }

    /// Reads through an external model-exchange plugin.
    pub fn read_xli(
        plugin: &mut dyn XliPlugin,
        path: &str,
    ) -> Result<Solver, SolverError> {
        let mut model = Model::new(0, 0);
        plugin.read(path, &mut model)?;
        Ok(Solver::from_model(model))
    }

    /// Writes through an external model-exchange plugin.
    pub fn write_xli(&self, plugin: &mut dyn XliPlugin, path: &str) -> Result<(), SolverError> {
        plugin.write(path, &self.model)
    }

    pub fn set_outputstream(&mut self, stream: Box<dyn Write>) {
        self.output = stream;
    }

    pub fn set_outputfile(&mut self, path: &str) -> Result<(), SolverError> {
        let file = std::fs::File::create(path)?;
        self.output = Box::new(std::io::BufWriter::new(file));
        Ok(())
    }

    // --- diagnostics --------------------------------------------------

    pub fn print_lp(&mut self) -> Result<(), SolverError> {
        let text = interface::lp::write_string(&self.model);
        self.output.write_all(text.as_bytes())?;
        Ok(())
    }

    pub fn print_objective(&mut self) -> Result<(), SolverError> {
        let obj = self.get_objective()?;
        writeln!(self.output, "Value of objective function: {:.8}", obj)?;
        Ok(())
    }

    pub fn print_solution(&mut self) -> Result<(), SolverError> {
        let o = self.outputs.as_ref().ok_or(SolverError::NotSolved)?;
        let lines: Vec<String> = (0..self.model.n_cols())
            .map(|j| format!("{:<24}{:>15.6}", self.model.get_col_name(j), o.x[j]))
            .collect();
        writeln!(self.output, "Actual values of the variables:")?;
        for line in lines {
            writeln!(self.output, "{}", line)?;
        }
        Ok(())
    }

    pub fn print_constraints(&mut self) -> Result<(), SolverError> {
        let o = self.outputs.as_ref().ok_or(SolverError::NotSolved)?;
        let lines: Vec<String> = (0..self.model.n_rows())
            .map(|i| format!("{:<24}{:>15.6}", self.model.get_row_name(i), o.activity[i]))
            .collect();
        writeln!(self.output, "Actual values of the constraints:")?;
        for line in lines {
            writeln!(self.output, "{}", line)?;
        }
        Ok(())
    }

    pub fn print_duals(&mut self) -> Result<(), SolverError> {
        let o = self.outputs.as_ref().ok_or(SolverError::NotSolved)?;
        let lines: Vec<String> = (0..self.model.n_rows())
            .map(|i| format!("{:<24}{:>15.6}", self.model.get_row_name(i), o.duals[i]))
            .collect();
        writeln!(self.output, "Dual values:")?;
        for line in lines {
            writeln!(self.output, "{}", line)?;
        }
        Ok(())
    }

    pub fn print_scales(&mut self) -> Result<(), SolverError> {
        let Some(factors) = &self.last_scale else {
            writeln!(self.output, "No scaling computed")?;
            return Ok(());
        };
        let rows = factors.rows.clone();
        let cols = factors.cols.clone();
        writeln!(self.output, "Row scale factors: {:?}", rows)?;
        writeln!(self.output, "Column scale factors: {:?}", cols)?;
        Ok(())
    }

    /// Prints the basis composition and working values of the final
    /// factorized tableau.
    pub fn print_tableau(&mut self) -> Result<(), SolverError> {
        let Some((engine, lp)) = &self.engine else {
            return Err(SolverError::NotSolved);
        };
        let members: Vec<I> = engine.basis_members().to_vec();
        let rows: Vec<(usize, BasisStatus, E)> = engine
            .statuses()
            .iter()
            .zip(engine.values().iter())
            .enumerate()
            .map(|(j, (&s, &v))| (j, s, v))
            .collect();
        let n = lp.n();
        writeln!(self.output, "Basis: {:?}", members)?;
        writeln!(self.output, "Working values (index, status, value):")?;
        for (j, s, v) in rows {
            let tag = if j < n { "col" } else { "row" };
            writeln!(
                self.output,
                "  {} {:>5}  {:<8}{:>15.6}",
                tag,
                if j < n { j } else { j - n },
                format!("{:?}", s),
                v
            )?;
        }
        Ok(())
    }

    pub fn print_debugdump(&mut self) -> Result<(), SolverError> {
        let n = self.model.n_cols();
        let m = self.model.n_rows();
        let nnz = self.model.nnz();
        let status = self.get_status();
        writeln!(
            self.output,
            "model: {} rows, {} cols, {} nonzeros, status {:?}",
            m, n, nnz, status
        )?;
        let params = self.params.write_string();
        self.output.write_all(params.as_bytes())?;
        Ok(())
    }
}

impl std::fmt::Debug for Solver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solver")
            .field("rows", &self.model.n_rows())
            .field("cols", &self.model.n_cols())
            .field("status", &self.get_status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn farm() -> Solver {
        let mut lp = Solver::new(0, 2);
        lp.set_maxim();
        lp.set_obj_fn(&[143.0, 60.0]).unwrap();
        lp.add_constraint(&[120.0, 210.0], ConstraintKind::Le, 15000.0)
            .unwrap();
        lp.add_constraint(&[110.0, 30.0], ConstraintKind::Le, 4000.0)
            .unwrap();
        lp.add_constraint(&[1.0, 1.0], ConstraintKind::Le, 75.0)
            .unwrap();
        lp
    }

    #[test]
    fn facade_solves_lp() {
        let mut lp = farm();
        assert_eq!(lp.solve(), Status::Optimal);
        assert!((lp.get_objective().unwrap() - 6315.625).abs() < 1e-6);
        let x = lp.get_variables().unwrap();
        assert!((x[0] - 21.875).abs() < 1e-6);
        assert!((x[1] - 53.125).abs() < 1e-6);
        assert!(lp.is_feasible(x, 1e-6));
        assert_eq!(lp.get_solution_count(), 1);
    }

    #[test]
    fn minimization_flips_at_the_boundary() {
        // min -143x - 60y == -(max 143x + 60y)
        let mut lp = farm();
        lp.set_minim();
        lp.set_obj_fn(&[-143.0, -60.0]).unwrap();
        assert_eq!(lp.solve(), Status::Optimal);
        assert!((lp.get_objective().unwrap() + 6315.625).abs() < 1e-6);
    }

    #[test]
    fn scaling_does_not_change_the_answer() {
        for mode in [
            scale_mode::NONE,
            scale_mode::GEOMETRIC,
            scale_mode::CURTIS_REID,
            scale_mode::EXTREME | scale_mode::POWER2,
        ] {
            let mut lp = farm();
            lp.set_scaling(mode);
            assert_eq!(lp.solve(), Status::Optimal, "mode {}", mode);
            assert!(
                (lp.get_objective().unwrap() - 6315.625).abs() < 1e-6,
                "mode {}",
                mode
            );
        }
    }

    #[test]
    fn presolve_matches_plain_solve() {
        let mut plain = farm();
        assert_eq!(plain.solve(), Status::Optimal);
        let mut pre = farm();
        pre.set_presolve(presolve_ops::ALL_REDUCTIONS, 0);
        assert_eq!(pre.solve(), Status::Optimal);
        assert!(
            (plain.get_objective().unwrap() - pre.get_objective().unwrap()).abs() < 1e-6
        );
    }

    #[test]
    fn duals_have_user_sense_signs() {
        let mut lp = farm();
        assert_eq!(lp.solve(), Status::Optimal);
        let duals = lp.get_dual_solution().unwrap();
        // Binding <= rows of a maximization carry nonnegative duals.
        for i in 0..3 {
            assert!(duals[i] >= -1e-9, "dual {} = {}", i, duals[i]);
        }
    }

    #[test]
    fn milp_end_to_end() {
        // max x + 2y, x + y <= 3.5, both integer.
        let mut lp = Solver::new(0, 2);
        lp.set_maxim();
        lp.set_obj_fn(&[1.0, 2.0]).unwrap();
        lp.add_constraint(&[1.0, 1.0], ConstraintKind::Le, 3.5)
            .unwrap();
        lp.set_int(0, true).unwrap();
        lp.set_int(1, true).unwrap();
        lp.set_bounds(0, 0.0, 10.0).unwrap();
        lp.set_bounds(1, 0.0, 2.0).unwrap();
        assert_eq!(lp.solve(), Status::Optimal);
        // y = 2, x = 1 -> 5.
        assert!((lp.get_objective().unwrap() - 5.0).abs() < 1e-6);
        let x = lp.get_variables().unwrap();
        assert!((x[0] - 1.0).abs() < 1e-6);
        assert!((x[1] - 2.0).abs() < 1e-6);
        assert!(lp.get_total_nodes() >= 1);
    }

    #[test]
    fn status_is_not_run_before_solving() {
        let lp = farm();
        assert_eq!(lp.get_status(), Status::NotRun);
        assert_eq!(lp.get_objective(), Err(SolverError::NotSolved));
    }

    #[test]
    fn mutation_invalidates_results() {
        let mut lp = farm();
        assert_eq!(lp.solve(), Status::Optimal);
        lp.set_obj(0, 1.0).unwrap();
        assert_eq!(lp.get_status(), Status::NotRun);
    }

    #[test]
    fn params_round_trip_through_session() {
        let mut lp = farm();
        lp.set_param("max_pivot", ParamValue::Int(100)).unwrap();
        assert_eq!(lp.get_param("max_pivot").unwrap(), ParamValue::Int(100));
        assert_eq!(
            lp.set_param("nope", ParamValue::Int(1)),
            Err(SolverError::UnknownParameter)
        );
        lp.reset_params();
        assert_eq!(lp.get_param("max_pivot").unwrap(), ParamValue::Int(250));
    }

    #[test]
    fn explicit_basis_round_trip() {
        let mut lp = farm();
        assert_eq!(lp.solve(), Status::Optimal);
        let basis = lp.get_basis().unwrap();
        assert_eq!(
            basis.iter().filter(|&&s| s == BasisStatus::Basic).count(),
            3
        );
        let mut warm = farm();
        warm.set_basis(&basis).unwrap();
        assert_eq!(warm.solve(), Status::Optimal);
        assert!((warm.get_objective().unwrap() - 6315.625).abs() < 1e-6);
        // The optimal warm start should need no phase-1 work.
        assert!(warm.get_total_iter() <= 2);
    }

    #[test]
    fn dualize_matches_primal_value() {
        let mut primal = farm();
        assert_eq!(primal.solve(), Status::Optimal);
        let mut dual = primal.dualize_lp().unwrap();
        assert_eq!(dual.solve(), Status::Optimal);
        assert!(
            (primal.get_objective().unwrap() - dual.get_objective().unwrap()).abs() < 1e-5,
            "primal {} dual {}",
            primal.get_objective().unwrap(),
            dual.get_objective().unwrap()
        );
    }

    #[test]
    fn abort_hook_stops_the_solve() {
        let mut lp = farm();
        lp.put_abortfunc(Box::new(|| true));
        let status = lp.solve();
        assert_eq!(status, Status::UserAbort);
    }

    #[test]
    fn sensitivity_requires_optimal() {
        let lp = farm();
        assert!(lp.get_sensitivity_obj().is_err());
        let mut lp = farm();
        assert_eq!(lp.solve(), Status::Optimal);
        let ranges = lp.get_sensitivity_obj().unwrap();
        assert_eq!(ranges.len(), 2);
    }

    #[test]
    fn auto_dualize_solves_through_the_dual() {
        // Three rows over two columns: the shape the dualized solve is
        // predicted to win on.
        let mut lp = farm();
        lp.set_simplex_type(crate::simplex::simplex_type::AUTO_DUALIZE)
            .unwrap();
        assert_eq!(lp.solve(), Status::Optimal);
        assert!((lp.get_objective().unwrap() - 6315.625).abs() < 1e-6);
        let x = lp.get_variables().unwrap();
        assert!((x[0] - 21.875).abs() < 1e-6);
        assert!((x[1] - 53.125).abs() < 1e-6);
        // Recovered duals price the binding rows of the primal.
        let duals = lp.get_dual_solution().unwrap();
        assert!(duals[0].abs() < 1e-6);
        assert!((duals[1] - 83.0 / 80.0).abs() < 1e-6);
        assert!((duals[2] - 28.875).abs() < 1e-6);
    }

    #[test]
    fn auto_dualize_minimization() {
        let mut lp = farm();
        lp.set_minim();
        lp.set_obj_fn(&[-143.0, -60.0]).unwrap();
        lp.set_simplex_type(crate::simplex::simplex_type::AUTO_DUALIZE)
            .unwrap();
        assert_eq!(lp.solve(), Status::Optimal);
        assert!((lp.get_objective().unwrap() + 6315.625).abs() < 1e-6);
    }

    #[test]
    fn auto_dualize_falls_back_on_unsuited_models() {
        // A free variable blocks the folded-bound dual construction; the
        // direct solve must still settle the instance.
        let mut lp = Solver::new(0, 1);
        lp.set_maxim();
        lp.set_obj_fn(&[1.0]).unwrap();
        lp.set_unbounded(0).unwrap();
        lp.add_constraint(&[1.0], ConstraintKind::Ge, 1.0).unwrap();
        lp.add_constraint(&[1.0], ConstraintKind::Le, 0.0).unwrap();
        lp.set_simplex_type(crate::simplex::simplex_type::AUTO_DUALIZE)
            .unwrap();
        assert_eq!(lp.solve(), Status::Infeasible);
    }

    #[test]
    fn presolve_gates_dual_information() {
        let build = |presolve: i64| {
            // The singleton row is eliminated, so the reduced model no
            // longer maps 1:1 onto the original.
            let mut lp = Solver::new(0, 2);
            lp.set_maxim();
            lp.set_obj_fn(&[1.0, 1.0]).unwrap();
            lp.add_constraint(&[2.0, 0.0], ConstraintKind::Le, 10.0)
                .unwrap();
            lp.add_constraint(&[1.0, 1.0], ConstraintKind::Le, 8.0)
                .unwrap();
            lp.set_presolve(presolve, 0);
            lp
        };

        let mut plain = build(presolve_ops::ROWS);
        assert_eq!(plain.solve(), Status::Optimal);
        assert!((plain.get_objective().unwrap() - 8.0).abs() < 1e-6);
        // The primal surface is untouched, the dual surface is withheld.
        assert!(plain.get_variables().is_ok());
        assert_eq!(plain.get_dual_solution(), Err(SolverError::Unsupported));
        assert_eq!(plain.get_var_dualresult(0), Err(SolverError::Unsupported));
        assert_eq!(plain.get_sensitivity_obj().map(|_| ()), Err(SolverError::Unsupported));

        let mut duals = build(presolve_ops::ROWS | presolve_ops::DUALS);
        assert_eq!(duals.solve(), Status::Optimal);
        let recovered = duals.get_dual_solution().unwrap();
        assert_eq!(recovered.len(), 2 + 2);
        assert!(recovered[0].abs() < 1e-7); // eliminated row carries no dual
        // Sensitivity still needs its own bit.
        assert_eq!(duals.get_sensitivity_obj().map(|_| ()), Err(SolverError::Unsupported));

        let mut sens = build(
            presolve_ops::ROWS | presolve_ops::DUALS | presolve_ops::SENS_DUALS,
        );
        assert_eq!(sens.solve(), Status::Optimal);
        assert!(sens.get_dual_solution().is_ok());
        assert!(sens.get_sensitivity_obj().is_ok());
    }

    #[test]
    fn negrange_split_preserves_the_optimum() {
        // min x with -1000 <= x <= 5 and x >= -40: optimum -40.
        let mut lp = Solver::new(0, 1);
        lp.set_minim();
        lp.set_obj_fn(&[1.0]).unwrap();
        lp.set_bounds(0, -1000.0, 5.0).unwrap();
        lp.add_constraint(&[1.0], ConstraintKind::Ge, -40.0).unwrap();
        lp.set_negrange(-100.0);
        assert_eq!(lp.solve(), Status::Optimal);
        assert!((lp.get_objective().unwrap() + 40.0).abs() < 1e-6);
        let x = lp.get_variables().unwrap();
        assert!((x[0] + 40.0).abs() < 1e-6);
    }

    #[test]
    fn lagrangean_rows_do_not_bind() {
        let mut lp = farm();
        // A soft row that would be violently infeasible if enforced.
        lp.add_lag_con(&[1.0, 1.0], ConstraintKind::Le, -100.0)
            .unwrap();
        assert_eq!(lp.solve(), Status::Optimal);
        assert!((lp.get_objective().unwrap() - 6315.625).abs() < 1e-6);
        assert_eq!(lp.get_lambda().unwrap().len(), 1);
    }
}
