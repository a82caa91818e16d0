//! The MPS model format, fixed-column and free-format.
//!
//! Sections handled: `NAME`, `ROWS` (`N`/`L`/`G`/`E`), `COLUMNS` (with
//! `INTORG`/`INTEND` markers), `RHS`, `RANGES`, `BOUNDS` (`UP`, `LO`,
//! `FX`, `FR`, `MI`, `PL`, `BV`, `SC`), `SOS`, and `ENDATA`. The reader
//! splits fields on whitespace, which accepts both layouts; the fixed
//! writer aligns the classic columns while the free writer separates
//! fields with single spaces.

use std::collections::HashMap;

use crate::interface::{default_bounds, fmt_num};
use crate::model::{Model, RowType, SosKind, VarKind};
use crate::{E, INFINITY, SolverError, is_infinite};

// --- writing ----------------------------------------------------------

fn field(text: &str, width: usize, free: bool) -> String {
    if free {
        format!("{} ", text)
    } else {
        format!("{:<width$}", text, width = width)
    }
}

/// Serializes a model in MPS format.
pub fn write_string(model: &Model, free: bool) -> String {
    let mut out = String::new();
    out.push_str("NAME                MODEL\n");

    out.push_str("ROWS\n");
    out.push_str(" N  COST\n");
    for i in 0..model.n_rows() {
        let tag = match model.row(i).row_type() {
            RowType::Le | RowType::Range => "L",
            RowType::Ge => "G",
            RowType::Eq => "E",
            RowType::Free | RowType::Of => "N",
        };
        out.push_str(&format!(" {}  {}\n", tag, model.get_row_name(i)));
    }

    out.push_str("COLUMNS\n");
    let mut in_int = false;
    let mut marker = 0usize;
    for j in 0..model.n_cols() {
        let var = model.var(j);
        let is_int = var.is_integral();
        if is_int != in_int {
            let kind = if is_int { "'INTORG'" } else { "'INTEND'" };
            out.push_str(&format!(
                "    MARKER{:<10}{}{}\n",
                marker,
                field("'MARKER'", 25, free),
                kind
            ));
            marker += 1;
            in_int = is_int;
        }
        let name = model.get_col_name(j);
        let mut pairs: Vec<(String, E)> = Vec::new();
        if var.obj != 0.0 {
            pairs.push(("COST".to_string(), var.obj));
        }
        for (i, v) in model.get_column_ex(j).unwrap_or_default() {
            pairs.push((model.get_row_name(i), v));
        }
        for chunk in pairs.chunks(2) {
            out.push_str("    ");
            out.push_str(&field(&name, 10, free));
            for (row, v) in chunk {
                out.push_str(&field(row, 10, free));
                out.push_str(&field(&fmt_num(*v), 15, free));
            }
            while out.ends_with(' ') {
                out.pop();
            }
            out.push('\n');
        }
    }
    if in_int {
        out.push_str(&format!(
            "    MARKER{:<10}{}'INTEND'\n",
            marker,
            field("'MARKER'", 25, free)
        ));
    }

    out.push_str("RHS\n");
    for i in 0..model.n_rows() {
        let row = model.row(i);
        let rh = match row.row_type() {
            RowType::Ge => row.lhs,
            RowType::Free => continue,
            _ => row.rhs,
        };
        if rh != 0.0 {
            out.push_str("    ");
            out.push_str(&field("RHS", 10, free));
            out.push_str(&field(&model.get_row_name(i), 10, free));
            out.push_str(&field(&fmt_num(rh), 15, free));
            while out.ends_with(' ') {
                out.pop();
            }
            out.push('\n');
        }
    }

    let ranges: Vec<usize> = (0..model.n_rows())
        .filter(|&i| model.row(i).row_type() == RowType::Range)
        .collect();
    if !ranges.is_empty() {
        out.push_str("RANGES\n");
        for i in ranges {
            let row = model.row(i);
            out.push_str("    ");
            out.push_str(&field("RNG", 10, free));
            out.push_str(&field(&model.get_row_name(i), 10, free));
            out.push_str(&field(&fmt_num(row.rhs - row.lhs), 15, free));
            while out.ends_with(' ') {
                out.pop();
            }
            out.push('\n');
        }
    }

    let mut bounds = String::new();
    for j in 0..model.n_cols() {
        let var = model.var(j);
        let name = model.get_col_name(j);
        let mut push = |tag: &str, value: Option<E>| {
            bounds.push_str(&format!(" {:<3}", tag));
            bounds.push_str(&field("BND", 10, free));
            bounds.push_str(&field(&name, 10, free));
            if let Some(v) = value {
                bounds.push_str(&field(&fmt_num(v), 15, free));
            }
            while bounds.ends_with(' ') {
                bounds.pop();
            }
            bounds.push('\n');
        };
        match var.kind {
            VarKind::Binary => {
                push("BV", None);
                continue;
            }
            VarKind::SemiContinuous => {
                // The band edge travels as LO, the SC value is the upper
                // bound.
                if var.sc_lower != 0.0 {
                    push("LO", Some(var.sc_lower));
                }
                push("SC", Some(var.ub));
                continue;
            }
            _ => {}
        }
        if default_bounds(var.lb, var.ub) {
            continue;
        }
        if var.lb == var.ub {
            push("FX", Some(var.lb));
            continue;
        }
        if is_infinite(var.lb) && is_infinite(var.ub) {
            push("FR", None);
            continue;
        }
        if is_infinite(var.lb) {
            push("MI", None);
        } else if var.lb != 0.0 {
            push("LO", Some(var.lb));
        }
        if !is_infinite(var.ub) {
            push("UP", Some(var.ub));
        }
    }
    if !bounds.is_empty() {
        out.push_str("BOUNDS\n");
        out.push_str(&bounds);
    }

    if !model.sos_sets().is_empty() {
        out.push_str("SOS\n");
        for set in model.sos_sets() {
            let tag = if set.kind == SosKind::Type1 { "S1" } else { "S2" };
            out.push_str(&format!(
                " {} {} {}\n",
                tag, set.name, set.priority
            ));
            for &(j, w) in &set.members {
                out.push_str("    ");
                out.push_str(&field(&model.get_col_name(j), 10, free));
                out.push_str(&field(&fmt_num(w), 15, free));
                while out.ends_with(' ') {
                    out.pop();
                }
                out.push('\n');
            }
        }
    }

    out.push_str("ENDATA\n");
    out
}

pub fn write_file(model: &Model, path: &str, free: bool) -> Result<(), SolverError> {
    std::fs::write(path, write_string(model, free))?;
    Ok(())
}

// --- reading ----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Rows,
    Columns,
    Rhs,
    Ranges,
    Bounds,
    Sos,
}

fn parse_num(text: &str, line: usize) -> Result<E, SolverError> {
    text.parse::<E>().map_err(|_| SolverError::Parse {
        line,
        message: format!("bad number `{}`", text),
    })
}

/// Parses MPS text into a model. The `free` flag is advisory: both
/// layouts are accepted.
pub fn read_string(text: &str, free: bool) -> Result<Model, SolverError> {
    let _ = free;
    let mut section = Section::None;
    let mut objective_row: Option<String> = None;
    // name -> (type tag) for constraint rows, in order
    let mut row_order: Vec<(String, char)> = Vec::new();
    let mut row_index: HashMap<String, usize> = HashMap::new();
    let mut col_order: Vec<String> = Vec::new();
    let mut col_index: HashMap<String, usize> = HashMap::new();
    let mut col_entries: Vec<Vec<(usize, E)>> = Vec::new();
    let mut col_obj: Vec<E> = Vec::new();
    let mut col_int: Vec<bool> = Vec::new();
    let mut in_int = false;
    let mut rhs: HashMap<usize, E> = HashMap::new();
    let mut range: HashMap<usize, E> = HashMap::new();
    #[allow(clippy::type_complexity)]
    let mut bounds: Vec<(String, String, Option<E>)> = Vec::new();
    let mut sos_sets: Vec<(String, SosKind, i32, Vec<(String, E)>)> = Vec::new();

    for (lineno, raw) in text.lines().enumerate() {
        let line = lineno + 1;
        if raw.trim().is_empty() || raw.starts_with('*') {
            continue;
        }
        let head = !raw.starts_with(' ') && !raw.starts_with('\t');
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if head {
            section = match fields[0].to_ascii_uppercase().as_str() {
                "NAME" => Section::None,
                "ROWS" => Section::Rows,
                "COLUMNS" => Section::Columns,
                "RHS" => Section::Rhs,
                "RANGES" => Section::Ranges,
                "BOUNDS" => Section::Bounds,
                "SOS" => Section::Sos,
                "OBJSENSE" => Section::None,
                "ENDATA" => break,
                other => {
                    return Err(SolverError::Parse {
                        line,
                        message: format!("unknown section `{}`", other),
                    });
                }
            };
            continue;
        }
        match section {
            Section::None => {}
            Section::Rows => {
                if fields.len() < 2 {
                    return Err(SolverError::Parse {
                        line,
                        message: "ROWS entry needs a type and a name".to_string(),
                    });
                }
                let tag = fields[0].to_ascii_uppercase().chars().next().unwrap_or('N');
                let name = fields[1].to_string();
                if tag == 'N' {
                    if objective_row.is_none() {
                        objective_row = Some(name);
                    } else {
                        // Extra free rows become unbounded constraints.
                        row_index.insert(name.clone(), row_order.len());
                        row_order.push((name, 'F'));
                    }
                } else {
                    row_index.insert(name.clone(), row_order.len());
                    row_order.push((name, tag));
                }
            }
            Section::Columns => {
                if fields.len() >= 3 && fields[1] == "'MARKER'" {
                    match fields[2] {
                        "'INTORG'" => in_int = true,
                        "'INTEND'" => in_int = false,
                        _ => {}
                    }
                    continue;
                }
                if fields.len() < 3 || fields.len() % 2 == 0 {
                    return Err(SolverError::Parse {
                        line,
                        message: "COLUMNS entry needs name and row/value pairs".to_string(),
                    });
                }
                let col = fields[0].to_string();
                let j = *col_index.entry(col.clone()).or_insert_with(|| {
                    col_order.push(col.clone());
                    col_entries.push(Vec::new());
                    col_obj.push(0.0);
                    col_int.push(in_int);
                    col_order.len() - 1
                });
                for pair in fields[1..].chunks(2) {
                    let value = parse_num(pair[1], line)?;
                    if Some(pair[0]) == objective_row.as_deref() {
                        col_obj[j] += value;
                    } else {
                        let Some(&r) = row_index.get(pair[0]) else {
                            return Err(SolverError::Parse {
                                line,
                                message: format!("unknown row `{}`", pair[0]),
                            });
                        };
                        col_entries[j].push((r, value));
                    }
                }
            }
            Section::Rhs => {
                if fields.len() < 3 || fields.len() % 2 == 0 {
                    return Err(SolverError::Parse {
                        line,
                        message: "RHS entry needs a set name and row/value pairs".to_string(),
                    });
                }
                for pair in fields[1..].chunks(2) {
                    if Some(pair[0]) == objective_row.as_deref() {
                        continue; // objective constant, not carried
                    }
                    let Some(&r) = row_index.get(pair[0]) else {
                        return Err(SolverError::Parse {
                            line,
                            message: format!("unknown row `{}`", pair[0]),
                        });
                    };
                    rhs.insert(r, parse_num(pair[1], line)?);
                }
            }
            Section::Ranges => {
                if fields.len() < 3 || fields.len() % 2 == 0 {
                    return Err(SolverError::Parse {
                        line,
                        message: "RANGES entry needs a set name and row/value pairs".to_string(),
                    });
                }
                for pair in fields[1..].chunks(2) {
                    let Some(&r) = row_index.get(pair[0]) else {
                        return Err(SolverError::Parse {
                            line,
                            message: format!("unknown row `{}`", pair[0]),
                        });
                    };
                    range.insert(r, parse_num(pair[1], line)?);
                }
            }
            Section::Bounds => {
                if fields.len() < 3 {
                    return Err(SolverError::Parse {
                        line,
                        message: "BOUNDS entry needs type, set, and column".to_string(),
                    });
                }
                let tag = fields[0].to_ascii_uppercase();
                let col = fields[2].to_string();
                let value = if fields.len() >= 4 {
                    Some(parse_num(fields[3], line)?)
                } else {
                    None
                };
                bounds.push((tag, col, value));
            }
            Section::Sos => {
                if fields[0].eq_ignore_ascii_case("S1") || fields[0].eq_ignore_ascii_case("S2") {
                    let kind = if fields[0].eq_ignore_ascii_case("S1") {
                        SosKind::Type1
                    } else {
                        SosKind::Type2
                    };
                    let name = fields.get(1).unwrap_or(&"SOS").to_string();
                    let priority = fields
                        .get(2)
                        .and_then(|p| p.parse::<i32>().ok())
                        .unwrap_or(1);
                    sos_sets.push((name, kind, priority, Vec::new()));
                } else {
                    let Some(set) = sos_sets.last_mut() else {
                        return Err(SolverError::Parse {
                            line,
                            message: "SOS member before set header".to_string(),
                        });
                    };
                    if fields.len() < 2 {
                        return Err(SolverError::Parse {
                            line,
                            message: "SOS member needs column and weight".to_string(),
                        });
                    }
                    set.3
                        .push((fields[0].to_string(), parse_num(fields[1], line)?));
                }
            }
        }
    }

    // Assemble the model.
    let m = row_order.len();
    let n = col_order.len();
    let mut model = Model::new(m, n);
    for (i, (name, tag)) in row_order.iter().enumerate() {
        model.set_row_name(i, name)?;
        let rh = rhs.get(&i).copied().unwrap_or(0.0);
        let row = model.row_mut(i);
        match tag {
            'L' => row.rhs = rh,
            'G' => row.lhs = rh,
            'E' => {
                row.lhs = rh;
                row.rhs = rh;
            }
            _ => {}
        }
        if let Some(&rng) = range.get(&i) {
            let row = model.row_mut(i);
            match tag {
                'L' => row.lhs = row.rhs - rng.abs(),
                'G' => row.rhs = row.lhs + rng.abs(),
                'E' => {
                    if rng >= 0.0 {
                        row.rhs = row.lhs + rng;
                    } else {
                        row.lhs = row.rhs + rng;
                    }
                }
                _ => {}
            }
        }
    }
    for (j, name) in col_order.iter().enumerate() {
        model.set_col_name(j, name)?;
        model.var_mut(j).obj = col_obj[j];
        if col_int[j] {
            model.set_int(j, true)?;
        }
        for &(r, v) in &col_entries[j] {
            model.set_mat(r, j, v)?;
        }
    }
    for (tag, col, value) in bounds {
        let Some(&j) = col_index.get(&col) else {
            return Err(SolverError::Parse {
                line: 0,
                message: format!("bound for unknown column `{}`", col),
            });
        };
        let var = model.var_mut(j);
        match tag.as_str() {
            "UP" => {
                var.ub = value.unwrap_or(INFINITY);
                // Classic convention: a negative upper bound on a
                // default-lower column opens the lower bound.
                if var.ub < 0.0 && var.lb == 0.0 {
                    var.lb = -INFINITY;
                }
            }
            "LO" => var.lb = value.unwrap_or(0.0),
            "FX" => {
                let v = value.unwrap_or(0.0);
                var.lb = v;
                var.ub = v;
            }
            "FR" => {
                var.lb = -INFINITY;
                var.ub = INFINITY;
            }
            "MI" => var.lb = -INFINITY,
            "PL" => var.ub = INFINITY,
            "BV" => {
                model.set_binary(j, true)?;
            }
            "SC" => {
                let ub = value.unwrap_or(INFINITY);
                model.var_mut(j).ub = ub;
                model.set_semicont(j, true)?;
            }
            other => {
                return Err(SolverError::Parse {
                    line: 0,
                    message: format!("unknown bound type `{}`", other),
                });
            }
        }
    }
    for (name, kind, priority, members) in sos_sets {
        let entries: Result<Vec<(usize, E)>, SolverError> = members
            .iter()
            .map(|(col, w)| {
                col_index
                    .get(col)
                    .map(|&j| (j, *w))
                    .ok_or(SolverError::Parse {
                        line: 0,
                        message: format!("SOS member `{}` is not a column", col),
                    })
            })
            .collect();
        model.add_sos(&name, kind, priority, &entries?)?;
    }
    // MPS is a minimization format by convention.
    model.set_maximize(false);
    Ok(model)
}

pub fn read_file(path: &str, free: bool) -> Result<Model, SolverError> {
    let text = std::fs::read_to_string(path)?;
    read_string(&text, free)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConstraintKind;
    use rstest::rstest;

    fn farm_min() -> Model {
        // Minimization flavor of the farm model so the MPS sense matches.
        let mut m = Model::new(0, 2);
        m.set_obj_fn(&[-143.0, -60.0]).unwrap();
        m.add_constraint(&[120.0, 210.0], ConstraintKind::Le, 15000.0)
            .unwrap();
        m.add_constraint(&[110.0, 30.0], ConstraintKind::Le, 4000.0)
            .unwrap();
        m.add_constraint(&[1.0, 1.0], ConstraintKind::Le, 75.0)
            .unwrap();
        m.set_col_name(0, "x").unwrap();
        m.set_col_name(1, "y").unwrap();
        m.set_row_name(0, "capacity").unwrap();
        m.set_row_name(1, "labor").unwrap();
        m.set_row_name(2, "acreage").unwrap();
        m
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn round_trip(#[case] free: bool) {
        let model = farm_min();
        let text = write_string(&model, free);
        let again = read_string(&text, free).unwrap();
        assert_eq!(again.n_rows(), 3);
        assert_eq!(again.n_cols(), 2);
        assert_eq!(again.get_mat(0, 1), 210.0);
        assert_eq!(again.row(1).rhs, 4000.0);
        assert_eq!(again.var(0).obj, -143.0);
        assert_eq!(again.find_row("acreage"), Some(2));
    }

    #[test]
    fn integer_markers_round_trip() {
        let mut model = farm_min();
        model.set_int(1, true).unwrap();
        let text = write_string(&model, false);
        assert!(text.contains("'INTORG'"));
        let again = read_string(&text, false).unwrap();
        assert!(!again.var(0).is_integral());
        assert!(again.var(1).is_integral());
    }

    #[test]
    fn bounds_round_trip() {
        let mut model = farm_min();
        model.set_bounds(0, -2.0, 9.0).unwrap();
        let text = write_string(&model, false);
        let again = read_string(&text, false).unwrap();
        assert_eq!(again.var(0).lb, -2.0);
        assert_eq!(again.var(0).ub, 9.0);
    }

    #[test]
    fn ranges_reconstruct_two_sided_rows() {
        let mut model = farm_min();
        model.row_mut(0).lhs = 1000.0; // capacity becomes a range row
        let text = write_string(&model, false);
        assert!(text.contains("RANGES"));
        let again = read_string(&text, false).unwrap();
        assert_eq!(again.row(0).lhs, 1000.0);
        assert_eq!(again.row(0).rhs, 15000.0);
    }

    #[test]
    fn sos_round_trip() {
        let mut model = farm_min();
        model
            .add_sos("pick", SosKind::Type2, 3, &[(0, 1.0), (1, 2.0)])
            .unwrap();
        let text = write_string(&model, false);
        let again = read_string(&text, false).unwrap();
        assert_eq!(again.sos_sets().len(), 1);
        assert_eq!(again.sos_sets()[0].kind, SosKind::Type2);
        assert_eq!(again.sos_sets()[0].priority, 3);
    }

    #[test]
    fn unknown_row_rejected() {
        let text = "ROWS\n N  COST\nCOLUMNS\n    x  NOPE  1.0\nENDATA\n";
        assert!(matches!(
            read_string(text, false),
            Err(SolverError::Parse { .. })
        ));
    }

    #[test]
    fn semicontinuous_bound() {
        let mut model = farm_min();
        model.set_bounds(0, 2.0, 5.0).unwrap();
        model.set_semicont(0, true).unwrap();
        let text = write_string(&model, false);
        assert!(text.contains("SC"));
        let again = read_string(&text, false).unwrap();
        assert_eq!(again.var(0).kind, VarKind::SemiContinuous);
        assert_eq!(again.var(0).ub, 5.0);
    }
}
