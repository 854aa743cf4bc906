//! JSON save-file deserialization and the normalized in-memory model every
//! other module (expr, kmap, qm, diagram, table, grading) operates on.

use crate::bits::{self, Bit};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Failure loading or shape-validating a save file.
#[derive(Debug, Clone)]
pub struct LoadError {
    pub message: String,
}

impl LoadError {
    fn new(message: impl Into<String>) -> Self {
        LoadError { message: message.into() }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        LoadError::new(format!("could not parse JSON: {err}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmType {
    Moore,
    Mealy,
}

impl FsmType {
    fn from_str(raw: &str) -> FsmType {
        if raw.eq_ignore_ascii_case("mealy") {
            FsmType::Mealy
        } else {
            FsmType::Moore
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawState {
    id: Option<i64>,
    #[serde(default)]
    placed: bool,
    #[serde(default)]
    binary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    outputs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawTransition {
    from: Option<i64>,
    to: Option<i64>,
    #[serde(default, rename = "inputValues")]
    input_values: Vec<String>,
    #[serde(default, rename = "outputValues")]
    output_values: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RawColumn {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default, rename = "baseKey")]
    pub base_key: Option<String>,
    #[serde(default, rename = "type")]
    pub col_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl RawColumn {
    /// `column_base_key` — `baseKey` if present, else `key` split on the
    /// first `"__"`.
    pub fn base_key(&self) -> String {
        if let Some(bk) = &self.base_key {
            if !bk.is_empty() {
                return bk.clone();
            }
        }
        let key = self.key.clone().unwrap_or_default();
        key.split("__").next().unwrap_or("").to_string()
    }

    pub fn key(&self) -> String {
        self.key.clone().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawTransitionTable {
    #[serde(default)]
    columns: Vec<RawColumn>,
    #[serde(default, rename = "valueColumns")]
    value_columns: Vec<RawColumn>,
    // `rows` is intentionally not deserialized: per spec §3/§6 a real save
    // file never persists it, and rows are always synthesized below.
    #[serde(default)]
    cells: IndexMap<String, serde_json::Value>,
    // Legacy compressed format (§E / SPEC_FULL):
    #[serde(default)]
    headers: Vec<String>,
    #[serde(default)]
    data: Vec<Vec<i64>>,
}

#[derive(Debug, Deserialize, Default)]
struct RawKmap {
    #[serde(default)]
    variables: Vec<String>,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    cells: IndexMap<String, String>,
    #[serde(default)]
    expression: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    id: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
struct RawMachine {
    #[serde(default)]
    inputs: Vec<String>,
    #[serde(default)]
    outputs: Vec<String>,
    #[serde(default, rename = "numStates")]
    num_states: Option<usize>,
    #[serde(default, rename = "type")]
    machine_type: Option<String>,
    #[serde(default)]
    states: Vec<RawState>,
    #[serde(default)]
    transitions: Vec<RawTransition>,
    #[serde(default, rename = "transitionTable")]
    transition_table: Option<RawTransitionTable>,
    #[serde(default)]
    kmaps: Vec<RawKmap>,
}

/// Normalized FSM state: a `FSMState` dataclass equivalent.
#[derive(Debug, Clone)]
pub struct State {
    pub id: i64,
    pub placed: bool,
    pub binary: String,
    pub description: String,
    pub label: String,
    pub outputs: Vec<Bit>,
}

/// Normalized transition between two states.
#[derive(Debug, Clone)]
pub struct Transition {
    pub from: i64,
    pub to: i64,
    pub input_values: Vec<Bit>,
    pub output_values: Vec<Bit>,
}

/// A decompressed transition-table column entry.
#[derive(Debug, Clone)]
pub struct Column {
    pub key: String,
    pub base_key: String,
    pub col_type: String,
}

/// A decompressed transition-table row identifier.
#[derive(Debug, Clone)]
pub struct Row {
    pub key: String,
}

/// The fully decompressed transition table: legacy `{headers, data}` save
/// files are expanded into this same shape at load time (§E).
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    pub columns: Vec<Column>,
    pub value_columns: Vec<Column>,
    pub rows: Vec<Row>,
    /// `"{row_key}::{col_key}"` -> cell bit.
    pub cells: HashMap<String, Bit>,
}

impl TransitionTable {
    /// Builds the default `q_*`/`next_q_*`/spacer/`in_*`/`out_*` column
    /// layout (spec §4.7), used whenever a save file lists no columns at
    /// all. Mirrors `autograder.py::build_transition_column_templates`'s
    /// ordering: current-state bits MSB-first, next-state bits MSB-first,
    /// a spacer if there's anything either side of it, then inputs and
    /// outputs in declaration order.
    fn default_column_layout(bit_count: usize, input_count: usize, output_count: usize) -> Vec<Column> {
        let mut cols = Vec::new();
        for i in (0..bit_count).rev() {
            cols.push(Column { key: format!("q_{i}"), base_key: format!("q_{i}"), col_type: "value".to_string() });
        }
        for i in (0..bit_count).rev() {
            cols.push(Column {
                key: format!("next_q_{i}"),
                base_key: format!("next_q_{i}"),
                col_type: "value".to_string(),
            });
        }
        if input_count > 0 || output_count > 0 {
            cols.push(Column { key: "spacer".to_string(), base_key: "spacer".to_string(), col_type: "spacer".to_string() });
        }
        for i in 0..input_count {
            cols.push(Column { key: format!("in_{i}"), base_key: format!("in_{i}"), col_type: "value".to_string() });
        }
        for i in 0..output_count {
            cols.push(Column { key: format!("out_{i}"), base_key: format!("out_{i}"), col_type: "value".to_string() });
        }
        cols
    }

    /// Derives value columns from the cell-key column suffixes when a save
    /// file carries `cells` but no `valueColumns`, the way
    /// `grade_fsm.py::decompress_transition_table` does.
    fn value_columns_from_cell_keys(cells: &IndexMap<String, serde_json::Value>) -> Vec<Column> {
        let mut col_keys: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
        for key in cells.keys() {
            if let Some((_, col_key)) = key.split_once("::") {
                col_keys.insert(col_key.to_string());
            }
        }
        col_keys
            .into_iter()
            .map(|key| Column {
                base_key: key.split("__").next().unwrap_or("").to_string(),
                key,
                col_type: "value".to_string(),
            })
            .collect()
    }

    fn from_raw(raw: RawTransitionTable, num_states: usize, input_count: usize, output_count: usize) -> TransitionTable {
        if !raw.headers.is_empty() || !raw.data.is_empty() {
            return TransitionTable::from_legacy(&raw.headers, &raw.data, num_states, input_count);
        }

        let columns: Vec<Column> = if !raw.columns.is_empty() {
            raw.columns
                .iter()
                .map(|c| Column {
                    key: c.key(),
                    base_key: c.base_key(),
                    col_type: c.col_type.clone().unwrap_or_default(),
                })
                .collect()
        } else {
            TransitionTable::default_column_layout(bits::state_bit_width(num_states), input_count, output_count)
        };

        // Real save files persist `{columns, cells}` only (spec §3/§6) —
        // `rows`/`valueColumns` are always derived, never trusted from the
        // file, per `autograder.py::ensure_transition_table_structure` and
        // `grade_fsm.py::decompress_transition_table`.
        let value_columns: Vec<Column> = if !raw.value_columns.is_empty() {
            raw.value_columns
                .iter()
                .map(|c| Column {
                    key: c.key(),
                    base_key: c.base_key(),
                    col_type: c.col_type.clone().unwrap_or_else(|| "value".to_string()),
                })
                .collect()
        } else {
            TransitionTable::value_columns_from_cell_keys(&raw.cells)
        };

        let combos = bits::generate_all_combos(input_count);
        let rows: Vec<Row> = (0..num_states)
            .flat_map(|state_idx| {
                combos.iter().map(move |combo| {
                    let suffix = if combo.is_empty() { "none".to_string() } else { combo.clone() };
                    Row { key: format!("{state_idx}|{suffix}") }
                })
            })
            .collect();

        let cells: HashMap<String, Bit> = raw
            .cells
            .iter()
            .map(|(k, v)| {
                let s = v.as_str().map(|s| s.to_string()).unwrap_or_default();
                (k.clone(), Bit::normalize(&s))
            })
            .collect();
        TransitionTable {
            columns,
            value_columns,
            rows,
            cells,
        }
    }

    /// Rehydrate `{headers, data}` compressed tables (grounded in
    /// `grade_fsm.py::decompress_transition_table`): `headers[col]` names a
    /// `baseKey__generated`-style column, `data[row][col]` is an integer code
    /// (`0/1/2/-1` -> `0/1/X/""`) and rows are synthesized in
    /// `state × input-combination` order.
    pub fn from_legacy(headers: &[String], data: &[Vec<i64>], num_states: usize, input_count: usize) -> TransitionTable {
        let combos = bits::generate_all_combos(input_count);
        let mut rows = Vec::new();
        for state_idx in 0..num_states {
            for combo in &combos {
                let suffix = if combo.is_empty() { "none".to_string() } else { combo.clone() };
                rows.push(Row {
                    key: format!("{state_idx}|{suffix}"),
                });
            }
        }
        let value_columns: Vec<Column> = headers
            .iter()
            .map(|h| Column {
                key: h.clone(),
                base_key: h.split("__").next().unwrap_or("").to_string(),
                col_type: "value".to_string(),
            })
            .collect();

        let inverse = |code: i64| -> &'static str {
            match code {
                0 => "0",
                1 => "1",
                2 => "X",
                _ => "",
            }
        };
        let mut cells = HashMap::new();
        for (row_idx, row) in rows.iter().enumerate() {
            let row_values = data.get(row_idx);
            for (col_idx, col) in value_columns.iter().enumerate() {
                let mapped = row_values
                    .and_then(|values| values.get(col_idx))
                    .map(|&code| inverse(code))
                    .unwrap_or("");
                cells.insert(format!("{}::{}", row.key, col.key), Bit::normalize(mapped));
            }
        }
        TransitionTable {
            columns: value_columns.clone(),
            value_columns,
            rows,
            cells,
        }
    }

    pub fn is_empty_shape(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty() && self.cells.is_empty()
    }
}

/// A single Karnaugh map panel attached to a save file.
#[derive(Debug, Clone)]
pub struct KMap {
    pub label: String,
    pub variables: Vec<String>,
    pub direction: crate::kmap::Direction,
    pub kind: crate::kmap::Kind,
    pub cells: HashMap<(usize, usize), Bit>,
    pub expression: String,
}

fn parse_cell_key(key: &str) -> Option<(usize, usize)> {
    let (r, c) = key.split_once('-')?;
    Some((r.parse().ok()?, c.parse().ok()?))
}

/// Fully normalized save-file contents.
#[derive(Debug, Clone)]
pub struct Machine {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub num_states: usize,
    pub fsm_type: FsmType,
    pub states: Vec<State>,
    pub transitions: Vec<Transition>,
    pub transition_table: TransitionTable,
    pub kmaps: Vec<KMap>,
}

impl Machine {
    pub fn from_json(raw: &str) -> Result<Machine, LoadError> {
        let parsed: RawMachine = serde_json::from_str(raw)?;
        let output_count = parsed.outputs.len();
        let input_count = parsed.inputs.len();
        let num_states = parsed.num_states.unwrap_or(parsed.states.len());
        let fsm_type = FsmType::from_str(parsed.machine_type.as_deref().unwrap_or("moore"));

        let states: Vec<State> = parsed
            .states
            .iter()
            .filter_map(|s| {
                let id = s.id?;
                Some(State {
                    id,
                    placed: s.placed,
                    binary: s.binary.clone().unwrap_or_default(),
                    description: s.description.clone().unwrap_or_default(),
                    label: s.label.clone().unwrap_or_default(),
                    outputs: bits::normalize_bit_array(&s.outputs, output_count),
                })
            })
            .collect();

        let transitions: Vec<Transition> = parsed
            .transitions
            .iter()
            .map(|t| Transition {
                from: t.from.unwrap_or(-1),
                to: t.to.unwrap_or(-1),
                input_values: bits::normalize_bit_array(&t.input_values, input_count),
                output_values: bits::normalize_bit_array(&t.output_values, output_count),
            })
            .collect();

        let transition_table = TransitionTable::from_raw(
            parsed.transition_table.unwrap_or_default(),
            num_states.max(states.len()),
            input_count,
            output_count,
        );

        let kmaps: Vec<KMap> = parsed
            .kmaps
            .iter()
            .map(|k| {
                let direction = if k.direction.as_deref() == Some("vertical") {
                    crate::kmap::Direction::Vertical
                } else {
                    crate::kmap::Direction::Horizontal
                };
                let kind = if k.kind.as_deref().unwrap_or("sop").eq_ignore_ascii_case("pos") {
                    crate::kmap::Kind::Pos
                } else {
                    crate::kmap::Kind::Sop
                };
                let cells: HashMap<(usize, usize), Bit> = k
                    .cells
                    .iter()
                    .filter_map(|(key, val)| parse_cell_key(key).map(|pos| (pos, Bit::normalize(val))))
                    .collect();
                let label = k
                    .label
                    .clone()
                    .or_else(|| k.id.as_ref().map(|v| v.to_string()))
                    .unwrap_or_else(|| "kmap".to_string());
                KMap {
                    label,
                    variables: k.variables.clone(),
                    direction,
                    kind,
                    cells,
                    expression: k.expression.clone().unwrap_or_default(),
                }
            })
            .collect();

        Ok(Machine {
            inputs: parsed.inputs,
            outputs: parsed.outputs,
            num_states,
            fsm_type,
            states,
            transitions,
            transition_table,
            kmaps,
        })
    }

    pub fn from_path(path: &Path) -> Result<Machine, LoadError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LoadError::new(format!("could not read {}: {e}", path.display())))?;
        Machine::from_json(&text)
    }

    pub fn bit_count(&self) -> usize {
        bits::state_bit_width(self.num_states)
    }

    pub fn state_binary_code(&self, state: &State) -> String {
        bits::state_binary_code(&state.binary, state.id, self.bit_count())
    }

    pub fn state_by_id(&self, id: i64) -> Option<&State> {
        self.states.iter().find(|s| s.id == id)
    }

    /// A state "participates" in the diagram if placed, or referenced by any
    /// transition as source or target.
    pub fn state_is_used(&self, state: &State) -> bool {
        state.placed
            || self
                .transitions
                .iter()
                .any(|t| t.from == state.id || t.to == state.id)
    }

    pub fn used_states(&self) -> Vec<&State> {
        self.states.iter().filter(|s| self.state_is_used(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "inputs": ["X"],
        "outputs": ["Z"],
        "numStates": 2,
        "type": "moore",
        "states": [
            {"id": 0, "placed": true, "binary": "0", "label": "S0", "outputs": ["0"]},
            {"id": 1, "placed": true, "binary": "1", "label": "S1", "outputs": ["1"]}
        ],
        "transitions": [
            {"from": 0, "to": 1, "inputValues": ["1"]},
            {"from": 1, "to": 0, "inputValues": ["0"]}
        ]
    }"#;

    #[test]
    fn test_load_basic_machine() {
        let machine = Machine::from_json(SAMPLE).unwrap();
        assert_eq!(machine.inputs, vec!["X".to_string()]);
        assert_eq!(machine.num_states, 2);
        assert_eq!(machine.fsm_type, FsmType::Moore);
        assert_eq!(machine.states.len(), 2);
        assert_eq!(machine.transitions.len(), 2);
    }

    #[test]
    fn test_used_states() {
        let machine = Machine::from_json(SAMPLE).unwrap();
        assert_eq!(machine.used_states().len(), 2);
    }

    #[test]
    fn test_bit_count_and_binary_code() {
        let machine = Machine::from_json(SAMPLE).unwrap();
        assert_eq!(machine.bit_count(), 1);
        let s1 = machine.state_by_id(1).unwrap();
        assert_eq!(machine.state_binary_code(s1), "1");
    }

    #[test]
    fn test_legacy_transition_table_decompresses() {
        let raw = r#"{
            "inputs": ["X"],
            "outputs": [],
            "numStates": 2,
            "states": [{"id": 0}, {"id": 1}],
            "transitions": [],
            "transitionTable": {
                "headers": ["q_0__generated", "next_q_0__generated", "in_0__generated"],
                "data": [[0, 1, 0], [1, 0, 1]]
            }
        }"#;
        let machine = Machine::from_json(raw).unwrap();
        assert_eq!(machine.transition_table.rows.len(), 4);
        assert_eq!(machine.transition_table.value_columns.len(), 3);
        assert_eq!(
            machine.transition_table.cells.get("0|0::q_0__generated"),
            Some(&Bit::Zero)
        );
    }

    #[test]
    fn test_canonical_columns_and_cells_synthesizes_rows_and_value_columns() {
        let raw = r#"{
            "inputs": ["X"],
            "outputs": [],
            "numStates": 2,
            "states": [{"id": 0}, {"id": 1}],
            "transitions": [],
            "transitionTable": {
                "columns": [
                    {"key": "q_0", "baseKey": "q_0", "type": "value"},
                    {"key": "next_q_0", "baseKey": "next_q_0", "type": "value"},
                    {"key": "in_0", "baseKey": "in_0", "type": "value"}
                ],
                "cells": {
                    "0|0::q_0": "0", "0|0::next_q_0": "0", "0|0::in_0": "0",
                    "0|1::q_0": "0", "0|1::next_q_0": "1", "0|1::in_0": "1",
                    "1|0::q_0": "1", "1|0::next_q_0": "0", "1|0::in_0": "0",
                    "1|1::q_0": "1", "1|1::next_q_0": "1", "1|1::in_0": "1"
                }
            }
        }"#;
        let machine = Machine::from_json(raw).unwrap();
        // No "rows"/"valueColumns" keys were present — both must be derived.
        assert_eq!(machine.transition_table.rows.len(), 4);
        assert_eq!(machine.transition_table.value_columns.len(), 3);
        assert_eq!(machine.transition_table.cells.get("0|1::next_q_0"), Some(&Bit::One));
    }

    #[test]
    fn test_empty_transition_table_synthesizes_default_column_layout() {
        let raw = r#"{
            "inputs": ["X"],
            "outputs": ["Z"],
            "numStates": 2,
            "states": [{"id": 0}, {"id": 1}],
            "transitions": []
        }"#;
        let machine = Machine::from_json(raw).unwrap();
        assert_eq!(machine.transition_table.columns.len(), 5); // q_0, next_q_0, spacer, in_0, out_0
        assert!(machine.transition_table.value_columns.is_empty());
        assert_eq!(machine.transition_table.rows.len(), 4);
    }

    #[test]
    fn test_malformed_json_is_load_error() {
        let err = Machine::from_json("not json").unwrap_err();
        assert!(err.message.contains("could not parse"));
    }
}
