//! Transition-table dictionary construction and gate/rubric comparison
//! against the diagram (§4.2 table-vs-diagram checks).

use crate::bits::{self, Bit};
use crate::diagram::{self, DiagramExpectations};
use crate::model::{Column, FsmType, Machine, TransitionTable};
use std::collections::{HashMap, HashSet};

fn col_is(col: &Column, prefix: &str) -> bool {
    col.base_key.starts_with(prefix)
}

/// Split `valueColumns` into the four groups by `baseKey` prefix, in
/// declaration order (used by gate mode, which reads row keys positionally).
pub fn categorize_unsorted(columns: &[Column]) -> (Vec<&Column>, Vec<&Column>, Vec<&Column>, Vec<&Column>) {
    let current: Vec<&Column> = columns.iter().filter(|c| col_is(c, "q_")).collect();
    let next: Vec<&Column> = columns.iter().filter(|c| col_is(c, "next_q_")).collect();
    let input: Vec<&Column> = columns.iter().filter(|c| col_is(c, "in_")).collect();
    let output: Vec<&Column> = columns.iter().filter(|c| col_is(c, "out_")).collect();
    (current, next, input, output)
}

/// Same split, but sorted the way `grade_fsm.py::categorize_columns` does:
/// state-bit groups descending by `baseKey` (MSB-first), input/output groups
/// ascending — used by rubric mode's dictionary keys.
pub fn categorize_sorted(columns: &[Column]) -> (Vec<&Column>, Vec<&Column>, Vec<&Column>, Vec<&Column>) {
    let (mut current, mut next, mut input, mut output) = categorize_unsorted(columns);
    current.sort_by(|a, b| b.base_key.cmp(&a.base_key));
    next.sort_by(|a, b| b.base_key.cmp(&a.base_key));
    input.sort_by(|a, b| a.base_key.cmp(&b.base_key));
    output.sort_by(|a, b| a.base_key.cmp(&b.base_key));
    (current, next, input, output)
}

fn read_bit(cells: &HashMap<String, Bit>, row_key: &str, col_key: &str) -> Bit {
    cells.get(&format!("{row_key}::{col_key}")).copied().unwrap_or(Bit::Unspecified)
}

struct RowValues {
    current: Vec<Bit>,
    input: Vec<Bit>,
    next: Vec<Bit>,
    output: Vec<Bit>,
}

fn read_row(
    table: &TransitionTable,
    row_key: &str,
    current: &[&Column],
    input: &[&Column],
    next: &[&Column],
    output: &[&Column],
) -> RowValues {
    RowValues {
        current: current.iter().map(|c| read_bit(&table.cells, row_key, &c.key)).collect(),
        input: input.iter().map(|c| read_bit(&table.cells, row_key, &c.key)).collect(),
        next: next.iter().map(|c| read_bit(&table.cells, row_key, &c.key)).collect(),
        output: output.iter().map(|c| read_bit(&table.cells, row_key, &c.key)).collect(),
    }
}

fn blank_to_zero(values: Vec<Bit>) -> Vec<Bit> {
    values
        .into_iter()
        .map(|b| if b.is_specified() { b } else { Bit::Zero })
        .collect()
}

/// Gate-mode check: does the transition table agree with the diagram
/// exactly? Mirrors `autograder.py::verify_transition_table`.
pub fn verify_gate(
    table: &TransitionTable,
    expectations: &DiagramExpectations,
    bit_count: usize,
    fsm_type: FsmType,
    input_count: usize,
    output_count: usize,
) -> Result<(), String> {
    let (current_cols, next_cols, input_cols, output_cols) = categorize_unsorted(&table.value_columns);

    let mut missing_headers = Vec::new();
    if current_cols.len() != bit_count {
        missing_headers.push("current state bits");
    }
    if next_cols.len() != bit_count {
        missing_headers.push("next state bits");
    }
    if input_cols.len() != input_count {
        missing_headers.push("input columns");
    }
    if output_cols.len() != output_count {
        missing_headers.push("output columns");
    }
    if !missing_headers.is_empty() {
        return Err(format!("Missing required column headers: {}", missing_headers.join(", ")));
    }

    let mut unchecked: HashSet<String> = expectations.expectations.keys().cloned().collect();
    let mut matches = !expectations.conflict;

    'rows: for row in &table.rows {
        if !matches {
            break;
        }
        let row_key = &row.key;
        let is_blank = current_cols
            .iter()
            .chain(input_cols.iter())
            .chain(next_cols.iter())
            .chain(output_cols.iter())
            .all(|c| !read_bit(&table.cells, row_key, &c.key).is_specified());
        if is_blank {
            continue 'rows;
        }

        let raw = read_row(table, row_key, &current_cols, &input_cols, &next_cols, &output_cols);
        let current = blank_to_zero(raw.current);
        let input = blank_to_zero(raw.input);
        let next = blank_to_zero(raw.next);
        let output = blank_to_zero(raw.output);

        let current_bits: String = current.iter().map(|b| b.to_char()).collect();
        if current_bits.is_empty() || current_bits.len() != bit_count {
            matches = false;
            break;
        }
        let input_bits: String = input.iter().map(|b| b.to_char()).collect();
        let suffix = if input_bits.is_empty() { "none".to_string() } else { input_bits };
        let key = format!("{current_bits}|{suffix}");

        let expected = match expectations.expectations.get(&key) {
            Some(e) => e,
            None => {
                matches = false;
                break;
            }
        };
        if !bits::arrays_compatible(&expected.next_state_bits, &next) {
            matches = false;
            break;
        }
        let outputs_ok = match fsm_type {
            FsmType::Mealy => bits::mealy_outputs_compatible(&expected.outputs, &output),
            FsmType::Moore => bits::arrays_compatible(&expected.outputs, &output),
        };
        if !outputs_ok {
            matches = false;
            break;
        }
        unchecked.remove(&key);
    }

    if matches && !unchecked.is_empty() {
        return Err("Transition table is missing transitions that exist in the diagram".to_string());
    }
    if matches {
        Ok(())
    } else {
        Err("Transition table and diagram do not match".to_string())
    }
}

fn bit_to_int(b: Bit) -> i32 {
    match b {
        Bit::Zero => 0,
        Bit::One => 1,
        Bit::DontCare => 2,
        Bit::Unspecified => -1,
    }
}

/// Mirrors `grade_fsm.py::build_transition_diagram_dictionary`: every
/// transition contributes `(next-state-bits ++ outputs)` at each input combo
/// it covers; unused states fill in an all-`X` placeholder so rubric scoring
/// can still compare dictionary sizes sanely.
pub fn build_diagram_dictionary(machine: &Machine) -> HashMap<String, Vec<i32>> {
    let bit_count = machine.bit_count();
    let mut dict: HashMap<String, Vec<i32>> = HashMap::new();

    for tr in &machine.transitions {
        let source = machine.state_by_id(tr.from);
        let source_bits = source.map(|s| machine.state_binary_code(s)).unwrap_or_default();
        let target = machine.state_by_id(tr.to);
        let next_bits_str = target.map(|s| machine.state_binary_code(s)).unwrap_or_default();
        let next_raw: Vec<String> = next_bits_str.chars().map(|c| c.to_string()).collect();
        let next_state_bits = bits::normalize_bit_array(&next_raw, bit_count);
        let outputs = diagram::expected_outputs(machine, tr, source);

        let value: Vec<i32> = next_state_bits.iter().chain(outputs.iter()).map(|&b| bit_to_int(b)).collect();
        for combo in bits::combinations_from(&tr.input_values) {
            let suffix = if combo.is_empty() { "none".to_string() } else { combo };
            dict.insert(format!("{source_bits}|{suffix}"), value.clone());
        }
    }

    let default_value: Vec<i32> = vec![2; bit_count + machine.outputs.len()];
    for st in &machine.states {
        if machine.state_is_used(st) {
            continue;
        }
        let state_bits = machine.state_binary_code(st);
        for combo in bits::generate_all_combos(machine.inputs.len()) {
            let suffix = if combo.is_empty() { "none".to_string() } else { combo };
            dict.insert(format!("{state_bits}|{suffix}"), default_value.clone());
        }
    }
    dict
}

/// Expand a row's raw input-column bits into dictionary keys: `X` expands to
/// `0`/`1`, a concrete bit stays itself, and a genuinely blank cell becomes a
/// literal `-` placeholder rather than expanding — an incomplete row should
/// never silently claim to cover every combo. Mirrors
/// `grade_fsm.py::expand_input_combos_for_dictionary`.
fn expand_table_input_combos(values: &[Bit]) -> Vec<String> {
    let mut combos = vec![String::new()];
    for &b in values {
        let options: Vec<char> = match b {
            Bit::DontCare => vec!['0', '1'],
            Bit::Zero | Bit::One => vec![b.to_char()],
            Bit::Unspecified => vec!['-'],
        };
        let mut next = Vec::with_capacity(combos.len() * options.len());
        for prefix in &combos {
            for opt in &options {
                next.push(format!("{prefix}{opt}"));
            }
        }
        combos = next;
    }
    combos
}

/// Mirrors `grade_fsm.py::build_transition_table_dictionary`.
pub fn build_table_dictionary(
    table: &TransitionTable,
    current_cols: &[&Column],
    input_cols: &[&Column],
    next_cols: &[&Column],
    output_cols: &[&Column],
) -> HashMap<String, Vec<i32>> {
    let mut dict = HashMap::new();
    for row in &table.rows {
        let raw = read_row(table, &row.key, current_cols, input_cols, next_cols, output_cols);
        let state_bits: String = raw
            .current
            .iter()
            .map(|b| if b.is_specified() { b.to_char() } else { '-' })
            .collect();
        let value: Vec<i32> = raw.next.iter().chain(raw.output.iter()).map(|&b| bit_to_int(b)).collect();
        for combo in expand_table_input_combos(&raw.input) {
            let suffix = if combo.is_empty() { "none".to_string() } else { combo };
            dict.insert(format!("{state_bits}|{suffix}"), value.clone());
        }
    }
    dict
}

/// Percentage of dictionary keys (union of both sides) where diagram and
/// table agree, rounded to the nearest integer.
pub fn dictionary_match_percent(diagram: &HashMap<String, Vec<i32>>, table: &HashMap<String, Vec<i32>>) -> u32 {
    let mut keys: HashSet<&String> = diagram.keys().collect();
    keys.extend(table.keys());
    let total = keys.len().max(1);
    let matches = keys
        .iter()
        .filter(|k| matches!((diagram.get(**k), table.get(**k)), (Some(e), Some(a)) if e == a))
        .count();
    ((matches as f64 / total as f64) * 100.0).round() as u32
}
