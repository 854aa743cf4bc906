//! Karnaugh-map Gray-code layout construction and prime-implicant
//! verification (§4.3/§4.4).
//!
//! A K-map's cells are addressed by `(row, col)` in the rendered grid; the
//! [`Layout`] maps that grid back to a variable assignment so a saved
//! diagram's cell contents can be checked against a submitted SOP/POS
//! expression.

use crate::bits::Bit;
use crate::expr::{self, Token};
use indexmap::IndexMap;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Sop,
    Pos,
}

/// How a missing or blank cell resolves to a concrete value for equivalence
/// checking. See `SPEC_FULL.md` §C — the Open Question `autograder.py`
/// (defaults to `X`) vs `grade_fsm.py` (conceptually `0`) left unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultPolicy {
    DontCare,
    Zero,
}

/// Reflected-binary Gray code of `bits` bits. `gray_code(0) == [""]`.
pub fn gray_code(bits: usize) -> Vec<String> {
    if bits == 0 {
        return vec![String::new()];
    }
    let mut codes = vec!["0".to_string(), "1".to_string()];
    for _ in 1..bits {
        let reflected: Vec<String> = codes.iter().rev().cloned().collect();
        let mut next: Vec<String> = codes.iter().map(|c| format!("0{c}")).collect();
        next.extend(reflected.iter().map(|c| format!("1{c}")));
        codes = next;
    }
    codes
}

/// One quadrant of a map-variable submap grid.
#[derive(Debug, Clone)]
pub struct Submap {
    pub map_row: usize,
    pub map_col: usize,
    pub map_code: String,
    pub row_offset: usize,
    pub col_offset: usize,
}

/// Variable split and grid geometry for a K-map of any variable count.
/// Four "core" variables (or fewer) render as a single Gray-code grid; every
/// variable beyond four becomes a "map variable" that picks among up to four
/// submap quadrants, with any further map variables zero-padded into the
/// quadrant's address.
#[derive(Debug, Clone)]
pub struct Layout {
    pub map_var_count: usize,
    pub map_vars: Vec<String>,
    pub row_vars: Vec<String>,
    pub col_vars: Vec<String>,
    pub row_codes: Vec<String>,
    pub col_codes: Vec<String>,
    pub base_rows: usize,
    pub base_cols: usize,
    pub map_rows: usize,
    pub map_cols: usize,
    pub total_rows: usize,
    pub total_cols: usize,
    pub submaps: Vec<Submap>,
}

pub fn build_layout(variables: &[String], direction: Direction) -> Layout {
    let n = variables.len();
    let map_var_count = n.saturating_sub(4);
    let map_vars: Vec<String> = variables[..map_var_count].to_vec();
    let core: Vec<String> = variables[map_var_count..].to_vec();

    let more_sig_count = core.len().div_ceil(2);
    let mut more_sig: Vec<String> = core[..more_sig_count].to_vec();
    let mut less_sig: Vec<String> = core[more_sig_count..].to_vec();
    if less_sig.is_empty() && more_sig.len() > 1 {
        less_sig.push(more_sig.pop().unwrap());
    }

    let (mut row_vars, mut col_vars) = if direction == Direction::Vertical {
        (more_sig, less_sig)
    } else {
        (less_sig, more_sig)
    };
    if row_vars.is_empty() && !col_vars.is_empty() {
        row_vars.push(col_vars.remove(0));
    }

    let row_codes = gray_code(row_vars.len());
    let col_codes = gray_code(col_vars.len());
    let base_rows = row_codes.len();
    let base_cols = col_codes.len();

    let (map_rows, map_cols, map_row_codes, map_col_codes) = if map_var_count == 0 {
        (1, 1, vec![String::new()], vec![String::new()])
    } else if map_var_count == 1 {
        (1, 2, vec![String::new()], gray_code(1))
    } else {
        (2, 2, gray_code(1), gray_code(1))
    };

    let mut submaps = Vec::new();
    for mr in 0..map_rows {
        for mc in 0..map_cols {
            let map_code = format!(
                "{}{}",
                map_row_codes.get(mr).cloned().unwrap_or_default(),
                map_col_codes.get(mc).cloned().unwrap_or_default()
            );
            submaps.push(Submap {
                map_row: mr,
                map_col: mc,
                map_code,
                row_offset: mr * base_rows,
                col_offset: mc * base_cols,
            });
        }
    }

    Layout {
        map_var_count,
        map_vars,
        row_vars,
        col_vars,
        row_codes,
        col_codes,
        base_rows,
        base_cols,
        map_rows,
        map_cols,
        total_rows: base_rows * map_rows,
        total_cols: base_cols * map_cols,
        submaps,
    }
}

/// Build the per-cell truth table for a K-map: `(row, col) -> Bit`, resolved
/// against the `cells` map with `policy` applied to blank/missing cells.
/// Returns the table keyed by the concatenated bit-string assignment
/// (`map_vars ++ col_vars ++ row_vars`, in that order) alongside that
/// canonical variable order.
pub fn build_truth_table(
    variables: &[String],
    direction: Direction,
    cells: &HashMap<(usize, usize), Bit>,
    policy: DefaultPolicy,
) -> (IndexMap<String, Bit>, Vec<String>) {
    let layout = build_layout(variables, direction);
    let vars_order: Vec<String> = layout
        .map_vars
        .iter()
        .chain(layout.col_vars.iter())
        .chain(layout.row_vars.iter())
        .cloned()
        .collect();

    let mut table = IndexMap::new();
    for r in 0..layout.total_rows.max(1) {
        for c in 0..layout.total_cols.max(1) {
            let sub = layout.submaps.iter().find(|s| {
                r >= s.row_offset
                    && r < s.row_offset + layout.base_rows.max(1)
                    && c >= s.col_offset
                    && c < s.col_offset + layout.base_cols.max(1)
            });
            let mut map_bits = sub.map(|s| s.map_code.clone()).unwrap_or_default();
            while map_bits.len() < layout.map_var_count {
                map_bits.push('0');
            }
            let row_off = sub.map(|s| s.row_offset).unwrap_or(0);
            let col_off = sub.map(|s| s.col_offset).unwrap_or(0);
            let col_code = layout
                .col_codes
                .get(c.saturating_sub(col_off))
                .cloned()
                .unwrap_or_default();
            let row_code = layout
                .row_codes
                .get(r.saturating_sub(row_off))
                .cloned()
                .unwrap_or_default();
            let bits = format!("{map_bits}{col_code}{row_code}");
            let key: String = (0..vars_order.len())
                .map(|i| bits.chars().nth(i).unwrap_or('0'))
                .collect();

            let raw = cells.get(&(r, c)).copied().unwrap_or(Bit::Unspecified);
            let value = if raw.is_specified() {
                raw
            } else {
                match policy {
                    DefaultPolicy::DontCare => Bit::DontCare,
                    DefaultPolicy::Zero => Bit::Zero,
                }
            };
            table.insert(key, value);
        }
    }
    (table, vars_order)
}

/// Accumulated list of human-readable failure messages from [`verify`].
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub errors: Vec<String>,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Evaluate `rpn` over every assignment of `variables` (in that exact order,
/// MSB-first), returning the truth table keyed by bit-string, or `None` if
/// the expression is invalid for any assignment.
fn build_expression_truth_table(rpn: &[Token], variables: &[String]) -> Option<IndexMap<String, bool>> {
    let n = variables.len();
    let total = 1usize << n;
    let mut table = IndexMap::new();
    for i in 0..total {
        let mut assignment: HashMap<String, bool> = HashMap::new();
        let mut key = String::new();
        for (idx, v) in variables.iter().enumerate() {
            let bit = (i >> (n - idx - 1)) & 1 == 1;
            assignment.insert(v.clone(), bit);
            assignment.insert(expr::normalize_var_name(v), bit);
            key.push(if bit { '1' } else { '0' });
        }
        let get = |name: &str| assignment.get(name).copied();
        match expr::evaluate(rpn, &get) {
            Ok(v) => {
                table.insert(key, v);
            }
            Err(_) => return None,
        }
    }
    Some(table)
}

/// Is a product term (fixed literals + free variables) a valid implicant of
/// `table` relative to `target`/`forbidden`, and is it prime? Mirrors
/// `autograder.py::prime_implicant_coverage`.
fn prime_implicant_coverage(
    literals: &IndexMap<String, bool>,
    variables: &[String],
    table: &IndexMap<String, Bit>,
    target: Bit,
    forbidden: Bit,
) -> Result<(), String> {
    let normalized_vars: Vec<String> = variables.iter().map(|v| expr::normalize_var_name(v)).collect();

    let key_for = |fixed: &HashMap<&str, bool>, combo_bits: &[bool]| -> String {
        let mut idx = 0;
        normalized_vars
            .iter()
            .map(|n| {
                if let Some(&v) = fixed.get(n.as_str()) {
                    if v { '1' } else { '0' }
                } else {
                    let bit = combo_bits[idx];
                    idx += 1;
                    if bit { '1' } else { '0' }
                }
            })
            .collect()
    };

    let fixed: HashMap<&str, bool> = normalized_vars
        .iter()
        .filter_map(|n| literals.get(n).map(|v| (n.as_str(), *v)))
        .collect();
    let free_count = normalized_vars.len() - fixed.len();

    let mut coverage = Vec::new();
    for i in 0..(1usize << free_count) {
        let combo: Vec<bool> = (0..free_count).map(|b| (i >> (free_count - b - 1)) & 1 == 1).collect();
        let key = key_for(&fixed, &combo);
        let cell_val = table.get(&key).copied().unwrap_or(Bit::Zero);
        if cell_val == forbidden {
            return Err(format!("covers cell {key} which must be {forbidden:?}-excluded"));
        }
        coverage.push((key, cell_val));
    }

    let count = coverage.len();
    if count == 0 || (count & (count - 1)) != 0 {
        return Err("group size is not a power of two".to_string());
    }
    if !coverage.iter().any(|(_, v)| *v == target) {
        return Err("term does not cover any target cell".to_string());
    }

    for fixed_name in normalized_vars.iter().filter(|n| fixed.contains_key(n.as_str())) {
        let expanded: HashMap<&str, bool> = fixed
            .iter()
            .filter(|&(&k, _)| k != fixed_name.as_str())
            .map(|(&k, &v)| (k, v))
            .collect();
        let expanded_free = normalized_vars.len() - expanded.len();
        let mut hit_forbidden = false;
        for i in 0..(1usize << expanded_free) {
            let combo: Vec<bool> = (0..expanded_free)
                .map(|b| (i >> (expanded_free - b - 1)) & 1 == 1)
                .collect();
            let key = key_for(&expanded, &combo);
            if table.get(&key).copied().unwrap_or(Bit::Zero) == forbidden {
                hit_forbidden = true;
                break;
            }
        }
        if !hit_forbidden {
            return Err(format!(
                "not prime: dropping literal '{fixed_name}' still avoids every forbidden cell"
            ));
        }
    }
    Ok(())
}

/// Full §4.4 verification: equivalence of `expression` against the map's
/// cells, then per-term prime-implicant validity. `variables` must be given
/// most-significant-first, matching how the map was laid out.
pub fn verify(
    variables: &[String],
    direction: Direction,
    kind: Kind,
    cells: &HashMap<(usize, usize), Bit>,
    expression: &str,
    policy: DefaultPolicy,
) -> VerifyReport {
    let mut errors = Vec::new();

    if expression.trim().is_empty() {
        errors.push("Expression is invalid or empty".to_string());
        return VerifyReport { errors };
    }

    let (table, vars_order) = build_truth_table(variables, direction, cells, policy);

    let normalized = expr::normalize(expression);
    let with_and = expr::insert_implicit_and(&normalized);
    let rpn = expr::to_rpn(&with_and);

    match build_expression_truth_table(&rpn, &vars_order) {
        None => errors.push("Expression is invalid or empty".to_string()),
        Some(expr_table) => {
            let mismatch = table.iter().any(|(key, val)| {
                if *val == Bit::DontCare {
                    return false;
                }
                match expr_table.get(key) {
                    None => true,
                    Some(ev) => *ev != (*val == Bit::One),
                }
            });
            if mismatch {
                errors.push("Expression output does not match K-map values".to_string());
            }
        }
    }

    let (target, forbidden) = match kind {
        Kind::Sop => (Bit::One, Bit::Zero),
        Kind::Pos => (Bit::Zero, Bit::One),
    };
    let normalized_var_names: Vec<String> = vars_order.iter().map(|v| expr::normalize_var_name(v)).collect();
    let sections = expr::split_sections(&normalized);
    for (idx, section) in sections.iter().enumerate() {
        match expr::term_literals(section) {
            None => errors.push(format!("Expression term {} is contradictory or empty", idx + 1)),
            Some(literals) => {
                if let Some(bad) = literals.keys().find(|k| !normalized_var_names.contains(k)) {
                    errors.push(format!(
                        "Expression term {} references unknown variable '{bad}'",
                        idx + 1
                    ));
                } else if let Err(reason) =
                    prime_implicant_coverage(&literals, &vars_order, &table, target, forbidden)
                {
                    errors.push(format!(
                        "Expression term {} is not a valid prime implicant: {reason}",
                        idx + 1
                    ));
                }
            }
        }
    }

    VerifyReport { errors }
}
