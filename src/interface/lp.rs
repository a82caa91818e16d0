//! The LP text format: a human-readable, section-based model description.
//!
//! ```text
//! /* objective */
//! max: 143 x + 60 y;
//!
//! capacity: 120 x + 210 y <= 15000;
//! labor: 110 x + 30 y <= 4000;
//! acreage: x + y <= 75;
//!
//! x <= 100;
//!
//! int x;
//! ```
//!
//! Statements end with `;`. A *named* single-variable relation is a
//! constraint row; an *unnamed* one with unit coefficient declares a
//! bound. Declaration sections `int`, `bin`, `sec`, and `free` list
//! variables; `sos1` / `sos2` open special-ordered-set sections whose
//! entries read `name: var:weight, var:weight <= priority;`.

use std::collections::HashMap;

use crate::interface::{default_bounds, fmt_num};
use crate::model::{ConstraintKind, Model, RowType, SosKind, VarKind};
use crate::{E, INFINITY, SolverError, is_infinite};

// --- writing ----------------------------------------------------------

fn write_expr(model: &Model, coefs: &[(usize, E)]) -> String {
    let mut out = String::new();
    for (k, &(j, v)) in coefs.iter().enumerate() {
        let name = model.get_col_name(j);
        if k == 0 {
            if v == 1.0 {
                out.push_str(&name);
            } else if v == -1.0 {
                out.push_str(&format!("-{}", name));
            } else {
                out.push_str(&format!("{} {}", fmt_num(v), name));
            }
        } else if v >= 0.0 {
            if v == 1.0 {
                out.push_str(&format!(" + {}", name));
            } else {
                out.push_str(&format!(" + {} {}", fmt_num(v), name));
            }
        } else if v == -1.0 {
            out.push_str(&format!(" - {}", name));
        } else {
            out.push_str(&format!(" - {} {}", fmt_num(-v), name));
        }
    }
    if out.is_empty() {
        out.push('0');
    }
    out
}

/// Serializes a model in LP format.
pub fn write_string(model: &Model) -> String {
    let mut out = String::from("/* Objective function */\n");
    let obj: Vec<(usize, E)> = (0..model.n_cols())
        .filter_map(|j| {
            let c = model.var(j).obj;
            (c != 0.0).then_some((j, c))
        })
        .collect();
    out.push_str(&format!(
        "{}: {};\n\n",
        if model.is_maximize() { "max" } else { "min" },
        write_expr(model, &obj)
    ));

    out.push_str("/* Constraints */\n");
    for i in 0..model.n_rows() {
        let row = model.row(i);
        let coefs: Vec<(usize, E)> = (0..model.n_cols())
            .filter_map(|j| {
                let v = model.get_mat(i, j);
                (v != 0.0).then_some((j, v))
            })
            .collect();
        let expr = write_expr(model, &coefs);
        let name = model.get_row_name(i);
        let line = match row.row_type() {
            RowType::Le | RowType::Of => format!("{}: {} <= {};", name, expr, fmt_num(row.rhs)),
            RowType::Ge => format!("{}: {} >= {};", name, expr, fmt_num(row.lhs)),
            RowType::Eq => format!("{}: {} = {};", name, expr, fmt_num(row.rhs)),
            RowType::Range => format!(
                "{}: {} <= {} <= {};",
                name,
                fmt_num(row.lhs),
                expr,
                fmt_num(row.rhs)
            ),
            RowType::Free => format!("{}: {} >= -1e30;", name, expr),
        };
        out.push_str(&line);
        out.push('\n');
    }

    // Bounds: unnamed unit-coefficient relations.
    let mut bounds = String::new();
    for j in 0..model.n_cols() {
        let var = model.var(j);
        if var.kind == VarKind::Binary || default_bounds(var.lb, var.ub) {
            continue;
        }
        let name = model.get_col_name(j);
        if is_infinite(var.lb) && is_infinite(var.ub) {
            continue; // declared through the free section
        }
        if var.lb == var.ub {
            bounds.push_str(&format!("{} = {};\n", name, fmt_num(var.lb)));
            continue;
        }
        if !is_infinite(var.lb) && var.lb != 0.0 {
            bounds.push_str(&format!("{} >= {};\n", name, fmt_num(var.lb)));
        }
        if !is_infinite(var.ub) {
            bounds.push_str(&format!("{} <= {};\n", name, fmt_num(var.ub)));
        }
    }
    if !bounds.is_empty() {
        out.push_str("\n/* Bounds */\n");
        out.push_str(&bounds);
    }

    let mut decls: Vec<(&str, Vec<String>)> = vec![
        ("int", Vec::new()),
        ("bin", Vec::new()),
        ("sec", Vec::new()),
        ("free", Vec::new()),
    ];
    for j in 0..model.n_cols() {
        let var = model.var(j);
        let name = model.get_col_name(j);
        match var.kind {
            VarKind::Integer => decls[0].1.push(name),
            VarKind::Binary => decls[1].1.push(name),
            VarKind::SemiContinuous => decls[2].1.push(name),
            VarKind::Continuous => {
                if is_infinite(var.lb) && is_infinite(var.ub) {
                    decls[3].1.push(name);
                }
            }
        }
    }
    for (kw, names) in &decls {
        if !names.is_empty() {
            out.push_str(&format!("\n{} {};\n", kw, names.join(",")));
        }
    }

    for kind in [SosKind::Type1, SosKind::Type2] {
        let sets: Vec<_> = model.sos_sets().iter().filter(|s| s.kind == kind).collect();
        if sets.is_empty() {
            continue;
        }
        out.push_str(if kind == SosKind::Type1 {
            "\nsos1\n"
        } else {
            "\nsos2\n"
        });
        for set in sets {
            let members = set
                .members
                .iter()
                .map(|&(j, w)| format!("{}:{}", model.get_col_name(j), fmt_num(w)))
                .collect::<Vec<_>>()
                .join(",");
            out.push_str(&format!("{}: {} <= {};\n", set.name, members, set.priority));
        }
    }

    out
}

pub fn write_file(model: &Model, path: &str) -> Result<(), SolverError> {
    std::fs::write(path, write_string(model))?;
    Ok(())
}

// --- reading ----------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(E),
    Ident(String),
    Plus,
    Minus,
    Colon,
    Comma,
    Le,
    Ge,
    Eq,
}

fn tokenize(text: &str, lineno: usize) -> Result<Vec<Token>, SolverError> {
    let mut tokens = Vec::new();
    let bytes: Vec<char> = text.chars().collect();
    let mut k = 0;
    while k < bytes.len() {
        let c = bytes[k];
        match c {
            ' ' | '\t' | '\n' | '\r' => k += 1,
            '+' => {
                tokens.push(Token::Plus);
                k += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                k += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                k += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                k += 1;
            }
            '*' => k += 1, // explicit multiplication is cosmetic
            '<' | '=' | '>' => {
                let two = k + 1 < bytes.len() && bytes[k + 1] == '=';
                tokens.push(match c {
                    '<' => Token::Le,
                    '>' => Token::Ge,
                    _ => Token::Eq,
                });
                k += if two && c != '=' { 2 } else { 1 };
            }
            '0'..='9' | '.' => {
                let start = k;
                while k < bytes.len()
                    && (bytes[k].is_ascii_digit()
                        || bytes[k] == '.'
                        || bytes[k] == 'e'
                        || bytes[k] == 'E'
                        || ((bytes[k] == '+' || bytes[k] == '-')
                            && k > start
                            && (bytes[k - 1] == 'e' || bytes[k - 1] == 'E')))
                {
                    k += 1;
                }
                let lit: String = bytes[start..k].iter().collect();
                let v = lit.parse::<E>().map_err(|_| SolverError::Parse {
                    line: lineno,
                    message: format!("bad number `{}`", lit),
                })?;
                tokens.push(Token::Num(v));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = k;
                while k < bytes.len()
                    && (bytes[k].is_alphanumeric()
                        || bytes[k] == '_'
                        || bytes[k] == '['
                        || bytes[k] == ']'
                        || bytes[k] == '#')
                {
                    k += 1;
                }
                tokens.push(Token::Ident(bytes[start..k].iter().collect()));
            }
            _ => {
                return Err(SolverError::Parse {
                    line: lineno,
                    message: format!("unexpected character `{}`", c),
                });
            }
        }
    }
    Ok(tokens)
}

/// A parsed linear expression: terms plus a free constant.
#[derive(Debug, Default)]
struct Expr {
    terms: Vec<(String, E)>,
    constant: E,
}

/// Parses tokens `[start..]` as a linear expression, stopping at a
/// relational operator; returns the expression and the stop position.
fn parse_expr(tokens: &[Token], start: usize, lineno: usize) -> Result<(Expr, usize), SolverError> {
    let mut expr = Expr::default();
    let mut k = start;
    let mut sign = 1.0;
    let mut pending: Option<E> = None;
    while k < tokens.len() {
        match &tokens[k] {
            Token::Plus => {
                if let Some(c) = pending.take() {
                    expr.constant += sign * c;
                }
                sign = 1.0;
                k += 1;
            }
            Token::Minus => {
                if let Some(c) = pending.take() {
                    expr.constant += sign * c;
                }
                sign = -1.0;
                k += 1;
            }
            Token::Num(v) => {
                if let Some(c) = pending.take() {
                    // Two numbers in a row: fold the first as a constant.
                    expr.constant += sign * c;
                }
                pending = Some(*v);
                k += 1;
            }
            Token::Ident(name) => {
                let coef = sign * pending.take().unwrap_or(1.0);
                expr.terms.push((name.clone(), coef));
                sign = 1.0;
                k += 1;
            }
            Token::Le | Token::Ge | Token::Eq => break,
            other => {
                return Err(SolverError::Parse {
                    line: lineno,
                    message: format!("unexpected token {:?} in expression", other),
                });
            }
        }
    }
    if let Some(c) = pending.take() {
        expr.constant += sign * c;
    }
    Ok((expr, k))
}

struct Builder {
    obj: Vec<(String, E)>,
    maximize: bool,
    rows: Vec<(Option<String>, Vec<(String, E)>, E, E)>, // name, terms, lhs, rhs
    bounds: Vec<(String, Option<E>, Option<E>)>,
    decls: Vec<(String, VarKind)>,
    frees: Vec<String>,
    sos: Vec<(String, SosKind, i32, Vec<(String, E)>)>,
}

impl Builder {
    fn build(self) -> Result<Model, SolverError> {
        // Collect variables in first-appearance order.
        let mut order: Vec<String> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut note = |name: &str, order: &mut Vec<String>, seen: &mut HashMap<String, usize>| {
            if !seen.contains_key(name) {
                seen.insert(name.to_string(), order.len());
                order.push(name.to_string());
            }
        };
        for (name, _) in &self.obj {
            note(name, &mut order, &mut seen);
        }
        for (_, terms, _, _) in &self.rows {
            for (name, _) in terms {
                note(name, &mut order, &mut seen);
            }
        }
        for (name, _, _) in &self.bounds {
            note(name, &mut order, &mut seen);
        }
        for (name, _) in &self.decls {
            note(name, &mut order, &mut seen);
        }
        for name in &self.frees {
            note(name, &mut order, &mut seen);
        }
        for (_, _, _, members) in &self.sos {
            for (name, _) in members {
                note(name, &mut order, &mut seen);
            }
        }

        let mut model = Model::new(0, order.len());
        model.set_maximize(self.maximize);
        for (j, name) in order.iter().enumerate() {
            model.set_col_name(j, name)?;
        }
        for (name, coef) in &self.obj {
            let j = seen[name];
            let cur = model.var(j).obj;
            model.set_obj(j, cur + coef)?;
        }
        for (name, terms, lhs, rhs) in &self.rows {
            let entries: Vec<(usize, E)> = terms.iter().map(|(n, v)| (seen[n], *v)).collect();
            let r = model.add_constraint_ex(&entries, ConstraintKind::Free, 0.0)?;
            model.row_mut(r).lhs = *lhs;
            model.row_mut(r).rhs = *rhs;
            if let Some(name) = name {
                model.set_row_name(r, name)?;
            }
        }
        for (name, lb, ub) in &self.bounds {
            let j = seen[name];
            if let Some(lb) = lb {
                model.var_mut(j).lb = *lb;
            }
            if let Some(ub) = ub {
                model.var_mut(j).ub = *ub;
            }
            if model.var(j).lb > model.var(j).ub {
                return Err(SolverError::InvalidBounds);
            }
        }
        for (name, kind) in &self.decls {
            let j = seen[name];
            match kind {
                VarKind::Integer => model.set_int(j, true)?,
                VarKind::Binary => model.set_binary(j, true)?,
                VarKind::SemiContinuous => model.set_semicont(j, true)?,
                VarKind::Continuous => {}
            }
        }
        for name in &self.frees {
            model.set_unbounded(seen[name])?;
        }
        for (name, kind, priority, members) in &self.sos {
            let entries: Vec<(usize, E)> = members.iter().map(|(n, w)| (seen[n], *w)).collect();
            model.add_sos(name, *kind, *priority, &entries)?;
        }
        Ok(model)
    }
}

/// Parses LP text into a model.
pub fn read_string(text: &str) -> Result<Model, SolverError> {
    // Strip comments, keep rough line tracking for messages.
    let mut clean = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            let mut prev = ' ';
            for c in chars.by_ref() {
                if prev == '*' && c == '/' {
                    break;
                }
                prev = c;
            }
        } else if c == '/' && chars.peek() == Some(&'/') {
            for c in chars.by_ref() {
                if c == '\n' {
                    clean.push('\n');
                    break;
                }
            }
        } else {
            clean.push(c);
        }
    }

    let mut builder = Builder {
        obj: Vec::new(),
        maximize: false,
        rows: Vec::new(),
        bounds: Vec::new(),
        decls: Vec::new(),
        frees: Vec::new(),
        sos: Vec::new(),
    };
    let mut have_objective = false;
    let mut sos_mode: Option<SosKind> = None;

    for (stmt_no, raw) in clean.split(';').enumerate() {
        let stmt = raw.trim();
        if stmt.is_empty() {
            continue;
        }
        let lineno = stmt_no + 1;

        // Section markers and declarations.
        let lower = stmt.to_ascii_lowercase();
        if lower == "sos1" {
            sos_mode = Some(SosKind::Type1);
            continue;
        }
        if lower == "sos2" {
            sos_mode = Some(SosKind::Type2);
            continue;
        }
        // A section marker may be glued to its first entry.
        let mut stmt = stmt;
        if let Some(rest) = lower.strip_prefix("sos1\n") {
            sos_mode = Some(SosKind::Type1);
            let _ = rest;
            stmt = stmt[4..].trim();
        } else if let Some(rest) = lower.strip_prefix("sos2\n") {
            sos_mode = Some(SosKind::Type2);
            let _ = rest;
            stmt = stmt[4..].trim();
        }
        for (kw, kind) in [
            ("int", Some(VarKind::Integer)),
            ("bin", Some(VarKind::Binary)),
            ("sec", Some(VarKind::SemiContinuous)),
            ("free", None),
        ] {
            if let Some(rest) = stmt.strip_prefix(kw) {
                if rest.starts_with(|c: char| c.is_whitespace()) {
                    for name in rest.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                        match kind {
                            Some(k) => builder.decls.push((name.to_string(), k)),
                            None => builder.frees.push(name.to_string()),
                        }
                    }
                    stmt = "";
                    break;
                }
            }
        }
        if stmt.is_empty() {
            sos_mode = None;
            continue;
        }

        if let Some(kind) = sos_mode {
            // name: var:weight, var:weight <= priority
            let (name, rest) = stmt.split_once(':').ok_or(SolverError::Parse {
                line: lineno,
                message: "SOS entry needs a name".to_string(),
            })?;
            let (members_text, priority) = match rest.split_once("<=") {
                Some((m, p)) => (
                    m,
                    p.trim().parse::<i32>().map_err(|_| SolverError::Parse {
                        line: lineno,
                        message: "bad SOS priority".to_string(),
                    })?,
                ),
                None => (rest, 1),
            };
            let mut members = Vec::new();
            for part in members_text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let (var, weight) = part.split_once(':').ok_or(SolverError::Parse {
                    line: lineno,
                    message: "SOS member needs `var:weight`".to_string(),
                })?;
                let weight = weight.trim().parse::<E>().map_err(|_| SolverError::Parse {
                    line: lineno,
                    message: "bad SOS weight".to_string(),
                })?;
                members.push((var.trim().to_string(), weight));
            }
            builder
                .sos
                .push((name.trim().to_string(), kind, priority, members));
            continue;
        }

        // Objective?
        if !have_objective {
            let head = lower.split(':').next().unwrap_or("").trim();
            if head == "max" || head == "min" || head == "maximize" || head == "minimize"
                || head == "maximise" || head == "minimise"
            {
                builder.maximize = head.starts_with("max");
                let body = stmt.split_once(':').map(|(_, b)| b).unwrap_or("");
                let tokens = tokenize(body, lineno)?;
                let (expr, stop) = parse_expr(&tokens, 0, lineno)?;
                if stop != tokens.len() {
                    return Err(SolverError::Parse {
                        line: lineno,
                        message: "relational operator in objective".to_string(),
                    });
                }
                builder.obj = expr.terms;
                have_objective = true;
                continue;
            }
        }

        // Constraint or bound. Optional `name:` prefix.
        let tokens = tokenize(stmt, lineno)?;
        let (name, body_start) = match (tokens.first(), tokens.get(1)) {
            (Some(Token::Ident(n)), Some(Token::Colon)) => (Some(n.clone()), 2),
            _ => (None, 0),
        };
        let (first, after_first) = parse_expr(&tokens, body_start, lineno)?;
        if after_first >= tokens.len() {
            return Err(SolverError::Parse {
                line: lineno,
                message: "statement without relational operator".to_string(),
            });
        }
        let op1 = tokens[after_first].clone();
        let (second, after_second) = parse_expr(&tokens, after_first + 1, lineno)?;

        if after_second < tokens.len() {
            // Range form: constant op expr op constant.
            let op2 = tokens[after_second].clone();
            let (third, end) = parse_expr(&tokens, after_second + 1, lineno)?;
            if end != tokens.len()
                || !first.terms.is_empty()
                || !third.terms.is_empty()
                || op1 != Token::Le
                || op2 != Token::Le
            {
                return Err(SolverError::Parse {
                    line: lineno,
                    message: "malformed range constraint".to_string(),
                });
            }
            builder.rows.push((
                name,
                second.terms,
                first.constant - second.constant,
                third.constant - second.constant,
            ));
            continue;
        }

        // expr op constant (or constant op expr).
        let (terms, lhs_const, rhs_const, op) = if first.terms.is_empty() {
            // constant op expr: flip the operator.
            let flipped = match op1 {
                Token::Le => Token::Ge,
                Token::Ge => Token::Le,
                other => other,
            };
            (second.terms, second.constant, first.constant, flipped)
        } else {
            (first.terms, first.constant, second.constant, op1)
        };
        let rhs = rhs_const - lhs_const;
        let unnamed_unit_bound =
            name.is_none() && terms.len() == 1 && (terms[0].1 == 1.0 || terms[0].1 == -1.0);
        if unnamed_unit_bound {
            let (var, coef) = (&terms[0].0, terms[0].1);
            let value = rhs / coef;
            let (lb, ub) = match (&op, coef > 0.0) {
                (Token::Le, true) | (Token::Ge, false) => (None, Some(value)),
                (Token::Ge, true) | (Token::Le, false) => (Some(value), None),
                (Token::Eq, _) => (Some(value), Some(value)),
                _ => (None, None),
            };
            builder.bounds.push((var.clone(), lb, ub));
            continue;
        }
        let (lhs, rhs) = match op {
            Token::Le => (-INFINITY, rhs),
            Token::Ge => (rhs, INFINITY),
            Token::Eq => (rhs, rhs),
            other => {
                return Err(SolverError::Parse {
                    line: lineno,
                    message: format!("unexpected operator {:?}", other),
                });
            }
        };
        builder.rows.push((name, terms, lhs, rhs));
    }

    builder.build()
}

pub fn read_file(path: &str) -> Result<Model, SolverError> {
    let text = std::fs::read_to_string(path)?;
    read_string(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FARM: &str = "\
/* test model */
max: 143 x + 60 y;

capacity: 120 x + 210 y <= 15000;
labor: 110 x + 30 y <= 4000;
acreage: x + y <= 75;
";

    #[test]
    fn parses_objective_and_rows() {
        let model = read_string(FARM).unwrap();
        assert!(model.is_maximize());
        assert_eq!(model.n_cols(), 2);
        assert_eq!(model.n_rows(), 3);
        assert_eq!(model.get_mat(0, 1), 210.0);
        assert_eq!(model.row(1).rhs, 4000.0);
        assert_eq!(model.find_row("acreage"), Some(2));
        assert_eq!(model.var(0).obj, 143.0);
    }

    #[test]
    fn bounds_and_declarations() {
        let text = "\
min: 2a - 3b + c;
r1: a + b + c >= 10;
a <= 8;
b >= -2;
c = 5;
int a;
free b;
";
        let model = read_string(text).unwrap();
        assert!(!model.is_maximize());
        assert_eq!(model.var(0).ub, 8.0);
        assert_eq!(model.var(0).kind, VarKind::Integer);
        // free wins over the earlier numeric bound for b
        assert!(is_infinite(model.var(1).lb));
        assert_eq!(model.var(2).lb, 5.0);
        assert_eq!(model.var(2).ub, 5.0);
        assert_eq!(model.n_rows(), 1);
    }

    #[test]
    fn range_rows() {
        let model = read_string("max: x;\nr: 1 <= x + 0 y <= 2;\n").unwrap();
        assert_eq!(model.row(0).lhs, 1.0);
        assert_eq!(model.row(0).rhs, 2.0);
    }

    #[test]
    fn named_single_variable_relation_is_a_row() {
        let model = read_string("max: x;\nlimit: x <= 5;\n").unwrap();
        assert_eq!(model.n_rows(), 1);
        assert!(is_infinite(model.var(0).ub));
    }

    #[test]
    fn sos_sections() {
        let text = "\
max: x + y + z;
cap: x + y + z <= 10;
sos1
s1: x:1, y:2, z:3 <= 2;
";
        let model = read_string(text).unwrap();
        assert_eq!(model.sos_sets().len(), 1);
        assert_eq!(model.sos_sets()[0].kind, SosKind::Type1);
        assert_eq!(model.sos_sets()[0].priority, 2);
        assert_eq!(model.sos_sets()[0].members.len(), 3);
    }

    #[test]
    fn round_trip_preserves_structure() {
        let model = read_string(FARM).unwrap();
        let text = write_string(&model);
        let again = read_string(&text).unwrap();
        assert_eq!(again.n_cols(), model.n_cols());
        assert_eq!(again.n_rows(), model.n_rows());
        assert_eq!(again.is_maximize(), model.is_maximize());
        for i in 0..model.n_rows() {
            for j in 0..model.n_cols() {
                assert_eq!(again.get_mat(i, j), model.get_mat(i, j));
            }
            assert_eq!(again.row(i).rhs, model.row(i).rhs);
        }
    }

    #[test]
    fn parse_errors_carry_statement_numbers() {
        let err = read_string("max: x;\nr1: x ! 5;\n").unwrap_err();
        assert!(matches!(err, SolverError::Parse { .. }));
    }

    #[test]
    fn comments_are_stripped() {
        let model =
            read_string("/* multi\nline */ max: x; // trailing\nr: x <= 3;\n").unwrap();
        assert_eq!(model.n_rows(), 1);
    }
}
