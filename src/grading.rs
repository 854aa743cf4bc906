//! Gate (hard pass/fail) and rubric (weighted scoring) façades over the
//! shared consistency engine. Both modes load the same [`Machine`] and run
//! the same diagram/table/K-map checks — they differ only in how a check's
//! result is folded into a verdict.

use crate::diagram;
use crate::kmap::{self, DefaultPolicy};
use crate::model::{LoadError, Machine};
use crate::qm;
use crate::table;
use std::path::Path;

/// Rubric weight constants, carried over verbatim from `grade_fsm.py`'s
/// module-level constants (§C).
pub mod weights {
    pub const STATE_DESCRIPTION: f64 = 4.0;
    pub const STATE_LABEL: f64 = 4.0;
    pub const STATE_BINARY: f64 = 6.0;
    pub const INPUT_MINIMUM: f64 = 4.0;
    pub const OUTPUT_MINIMUM: f64 = 4.0;
    pub const PLACED_STATES: f64 = 10.0;
    pub const OUTPUT_VALUE: f64 = 8.0;
    pub const ARROW_COVERAGE: f64 = 14.0;
    pub const TABLE_STRUCTURE: f64 = 12.0;
    pub const TABLE_MATCH: f64 = 16.0;
    pub const KMAP_COMPLETENESS: f64 = 2.0;
    pub const KMAP_EXPRESSION: f64 = 2.0;
}

#[derive(Debug, Clone, Default)]
pub struct GatingOptions {
    pub min_states: usize,
    pub min_inputs: usize,
    pub min_outputs: usize,
}

impl GatingOptions {
    pub fn with_min_states(mut self, n: usize) -> Self {
        self.min_states = n;
        self
    }
    pub fn with_min_inputs(mut self, n: usize) -> Self {
        self.min_inputs = n;
        self
    }
    pub fn with_min_outputs(mut self, n: usize) -> Self {
        self.min_outputs = n;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RubricOptions {
    pub min_states: usize,
    pub min_inputs: usize,
    pub min_outputs: usize,
    pub verbose: bool,
}

impl Default for RubricOptions {
    fn default() -> Self {
        RubricOptions {
            min_states: 2,
            min_inputs: 0,
            min_outputs: 0,
            verbose: false,
        }
    }
}

impl RubricOptions {
    pub fn with_min_states(mut self, n: usize) -> Self {
        self.min_states = n;
        self
    }
    pub fn with_min_inputs(mut self, n: usize) -> Self {
        self.min_inputs = n;
        self
    }
    pub fn with_min_outputs(mut self, n: usize) -> Self {
        self.min_outputs = n;
        self
    }
    pub fn with_verbose(mut self, v: bool) -> Self {
        self.verbose = v;
        self
    }
}

/// Outcome of gate-mode grading for a single file: pass iff `issues` is
/// empty. Mirrors `autograder.py::GradeResult`.
#[derive(Debug, Clone)]
pub struct GateResult {
    pub file: String,
    pub issues: Vec<String>,
}

impl GateResult {
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Run every gate-mode check against an already-loaded machine.
pub fn verdict(machine: &Machine, opts: &GatingOptions) -> Vec<String> {
    let mut issues = Vec::new();

    if machine.inputs.len() < opts.min_inputs {
        issues.push(format!(
            "Requires at least {} inputs; found {}",
            opts.min_inputs,
            machine.inputs.len()
        ));
    }
    if machine.outputs.len() < opts.min_outputs {
        issues.push(format!(
            "Requires at least {} outputs; found {}",
            opts.min_outputs,
            machine.outputs.len()
        ));
    }

    let used_states = machine.used_states();
    if used_states.len() < opts.min_states {
        issues.push(format!(
            "Requires at least {} used states in the diagram; found {}",
            opts.min_states,
            used_states.len()
        ));
    }

    for st in &used_states {
        if let Err(reason) = diagram::check_transition_coverage(machine, st.id) {
            issues.push(reason);
        }
    }

    let expectations = diagram::build_expectations(machine);
    if let Err(reason) = table::verify_gate(
        &machine.transition_table,
        &expectations,
        machine.bit_count(),
        machine.fsm_type,
        machine.inputs.len(),
        machine.outputs.len(),
    ) {
        issues.push(reason);
    }

    for km in &machine.kmaps {
        let report = kmap::verify(
            &km.variables,
            km.direction,
            km.kind,
            &km.cells,
            &km.expression,
            DefaultPolicy::DontCare,
        );
        for err in report.errors {
            issues.push(format!("K-map {}: {err}", km.label));
        }
    }

    issues
}

/// Load and gate-grade a single file. A malformed file never aborts a batch
/// — it becomes a failed result with a single issue describing why, exactly
/// as `autograder.py::grade_file`'s `except Exception` clause does.
pub fn grade_file_gate(path: &Path, opts: &GatingOptions) -> GateResult {
    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    match Machine::from_path(path) {
        Ok(machine) => GateResult {
            file: name,
            issues: verdict(&machine, opts),
        },
        Err(LoadError { message }) => GateResult {
            file: name,
            issues: vec![format!("Could not read JSON: {message}")],
        },
    }
}

/// One rubric section's score out of its weight, with narrative notes.
#[derive(Debug, Clone)]
pub struct SectionResult {
    pub score: f64,
    pub weight: f64,
    pub notes: Vec<String>,
}

impl SectionResult {
    pub fn percent(&self) -> f64 {
        if self.weight == 0.0 {
            0.0
        } else {
            self.score / self.weight * 100.0
        }
    }

    pub fn as_line(&self, label: &str) -> String {
        let note_text = if self.notes.is_empty() {
            "OK".to_string()
        } else {
            self.notes.join("; ")
        };
        format!(
            "- {label}: {:.2}/{:.2} ({:.1}%) — {note_text}",
            self.score,
            self.weight,
            self.percent()
        )
    }
}

/// Full rubric result for one file: three named sections, the way
/// `grade_fsm.py::GradeResult` reports them.
#[derive(Debug, Clone)]
pub struct RubricResult {
    pub file: String,
    pub sections: Vec<(String, SectionResult)>,
}

impl RubricResult {
    pub fn total_score(&self) -> f64 {
        self.sections.iter().map(|(_, s)| s.score).sum()
    }
    pub fn total_weight(&self) -> f64 {
        self.sections.iter().map(|(_, s)| s.weight).sum()
    }
    pub fn render(&self) -> String {
        let mut lines = vec![format!("File: {}", self.file)];
        let total_weight = self.total_weight();
        let pct = if total_weight == 0.0 {
            0.0
        } else {
            self.total_score() / total_weight * 100.0
        };
        lines.push(format!("Total: {:.2}/{:.2} ({pct:.1}%)", self.total_score(), total_weight));
        for (label, section) in &self.sections {
            lines.push(section.as_line(label));
        }
        lines.join("\n")
    }
}

fn check_state_definitions(machine: &Machine, opts: &RubricOptions) -> SectionResult {
    let mut used_states: Vec<_> = machine.used_states();
    if used_states.is_empty() {
        used_states = machine.states.iter().collect();
    }
    let mut notes = Vec::new();
    let total_weight =
        weights::STATE_DESCRIPTION + weights::STATE_LABEL + weights::STATE_BINARY + weights::INPUT_MINIMUM + weights::OUTPUT_MINIMUM;
    let mut score = 0.0;

    let state_count = used_states.len().max(1) as f64;
    let desc_complete = used_states.iter().filter(|s| !s.description.trim().is_empty()).count() as f64 / state_count;
    let label_complete = used_states.iter().filter(|s| !s.label.trim().is_empty()).count() as f64 / state_count;
    let binaries: Vec<String> = used_states.iter().map(|s| machine.state_binary_code(s)).collect();
    let non_empty: Vec<&String> = binaries.iter().filter(|b| !b.is_empty()).collect();
    let unique_count = {
        let set: std::collections::HashSet<&String> = non_empty.iter().copied().collect();
        set.len()
    };
    let unique_binaries = unique_count == non_empty.len();
    let binary_complete = non_empty.len() as f64 / state_count;

    score += weights::STATE_DESCRIPTION * desc_complete;
    score += weights::STATE_LABEL * label_complete;
    score += weights::STATE_BINARY * (if unique_binaries { binary_complete } else { binary_complete * 0.5 });

    if desc_complete < 1.0 {
        notes.push("Missing descriptions".to_string());
    }
    if label_complete < 1.0 {
        notes.push("Missing labels".to_string());
    }
    if !unique_binaries {
        notes.push("Duplicate state encodings".to_string());
    }

    let input_ratio = machine.inputs.len() as f64 / (opts.min_inputs.max(1) as f64);
    let output_ratio = machine.outputs.len() as f64 / (opts.min_outputs.max(1) as f64);
    score += weights::INPUT_MINIMUM * input_ratio.min(1.0);
    score += weights::OUTPUT_MINIMUM * output_ratio.min(1.0);

    if machine.inputs.len() < opts.min_inputs {
        notes.push(format!("Only {} input(s); minimum is {}", machine.inputs.len(), opts.min_inputs));
    }
    if machine.outputs.len() < opts.min_outputs {
        notes.push(format!("Only {} output(s); minimum is {}", machine.outputs.len(), opts.min_outputs));
    }

    SectionResult {
        score,
        weight: total_weight,
        notes,
    }
}

fn check_transition_diagram(machine: &Machine, opts: &RubricOptions) -> SectionResult {
    let mut notes = Vec::new();
    let placed_states: Vec<_> = machine.states.iter().filter(|s| s.placed).collect();
    let placed_count = placed_states.len();
    let expected_inputs = machine.inputs.len().max(opts.min_inputs);
    let expected_states = placed_count.max(opts.min_states);
    let expected_combos_per_state = 1usize << expected_inputs;

    let placed_ratio = if expected_states > 0 {
        placed_count as f64 / expected_states as f64
    } else {
        1.0
    };
    let placed_score = weights::PLACED_STATES * placed_ratio.min(1.0);
    if placed_ratio < 1.0 {
        notes.push(format!("Only {placed_count} placed states (min {})", opts.min_states));
    }

    let mut outputs_defined_ratio = 1.0;
    if !machine.outputs.is_empty() {
        outputs_defined_ratio = match machine.fsm_type {
            crate::model::FsmType::Moore => {
                let filled = placed_states
                    .iter()
                    .filter(|s| s.outputs.iter().filter(|b| b.is_specified()).count() == machine.outputs.len())
                    .count();
                filled as f64 / (placed_count.max(1) as f64)
            }
            crate::model::FsmType::Mealy => {
                let filled = machine
                    .transitions
                    .iter()
                    .filter(|t| t.output_values.iter().filter(|b| b.is_specified()).count() == machine.outputs.len())
                    .count();
                filled as f64 / (machine.transitions.len().max(1) as f64)
            }
        };
        if outputs_defined_ratio < 1.0 {
            notes.push("Some outputs are undefined".to_string());
        }
    }
    let output_score = weights::OUTPUT_VALUE * outputs_defined_ratio;

    let mut issues = 0usize;
    let missing_states = opts.min_states.saturating_sub(placed_count);
    issues += missing_states * expected_combos_per_state;

    for st in &placed_states {
        let mut combo_counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for tr in &machine.transitions {
            if tr.from != st.id {
                continue;
            }
            let padded = crate::bits::normalize_bit_array(
                &tr.input_values.iter().map(|b| b.to_string()).collect::<Vec<_>>(),
                expected_inputs,
            );
            for combo in crate::bits::combinations_from(&padded) {
                *combo_counts.entry(combo).or_insert(0) += 1;
            }
        }
        let unique = combo_counts.len();
        let duplicates: usize = combo_counts.values().filter(|&&c| c > 1).map(|&c| c - 1).sum();
        let missing = expected_combos_per_state.saturating_sub(unique);
        issues += missing + duplicates;
    }

    let expected_total = (expected_states.max(placed_count) * expected_combos_per_state).max(1);
    let coverage_ratio = (1.0 - issues as f64 / expected_total as f64).max(0.0);
    let coverage_score = weights::ARROW_COVERAGE * coverage_ratio;
    if coverage_ratio < 1.0 {
        notes.push(format!("Arrow coverage issues: {issues} gap(s)/duplicate(s) out of {expected_total} expected"));
    }

    SectionResult {
        score: placed_score + output_score + coverage_score,
        weight: weights::PLACED_STATES + weights::OUTPUT_VALUE + weights::ARROW_COVERAGE,
        notes,
    }
}

/// Real K-map scoring (§D): `grade_fsm.py`'s placeholder always awarded zero
/// for both sub-checks. We run the actual verifier and a QM-vs-submitted
/// cost comparison instead.
fn check_kmaps(machine: &Machine) -> (f64, f64, Vec<String>) {
    if machine.kmaps.is_empty() {
        return (weights::KMAP_COMPLETENESS, weights::KMAP_EXPRESSION, Vec::new());
    }
    let mut notes = Vec::new();
    let total = machine.kmaps.len() as f64;

    let mut complete = 0usize;
    let mut valid_and_minimal = 0usize;
    for km in &machine.kmaps {
        let filled_ratio = {
            let total_cells = km.cells.len().max(1);
            let filled = km.cells.values().filter(|b| b.is_specified()).count();
            filled as f64 / total_cells as f64
        };
        if filled_ratio >= 1.0 && !km.cells.is_empty() {
            complete += 1;
        } else {
            notes.push(format!("K-map {} has incomplete cells", km.label));
        }

        let report = kmap::verify(
            &km.variables,
            km.direction,
            km.kind,
            &km.cells,
            &km.expression,
            DefaultPolicy::DontCare,
        );
        if !report.passed() {
            notes.push(format!("K-map {} expression is invalid or not minimal: {:?}", km.label, report.errors));
            continue;
        }

        let n = km.variables.len();
        let (ones, dont_cares): (Vec<u32>, Vec<u32>) = {
            let (table, vars_order) = kmap::build_truth_table(&km.variables, km.direction, &km.cells, DefaultPolicy::DontCare);
            let target = match km.kind {
                crate::kmap::Kind::Sop => crate::bits::Bit::One,
                crate::kmap::Kind::Pos => crate::bits::Bit::Zero,
            };
            let mut ones = Vec::new();
            let mut dont_cares = Vec::new();
            for (key, val) in table.iter() {
                let minterm = u32::from_str_radix(key, 2).unwrap_or(0);
                if *val == target {
                    ones.push(minterm);
                } else if *val == crate::bits::Bit::DontCare {
                    dont_cares.push(minterm);
                }
            }
            let _ = vars_order;
            (ones, dont_cares)
        };
        let minimal = qm::minimize(&ones, &dont_cares, n);

        let normalized = crate::expr::normalize(&km.expression);
        let submitted_cost = crate::expr::cost(&normalized);
        if submitted_cost == (minimal.literal_count, minimal.term_count) {
            valid_and_minimal += 1;
        } else {
            notes.push(format!(
                "K-map {} expression is valid but not minimal (submitted {:?}, minimum {:?})",
                km.label,
                submitted_cost,
                (minimal.literal_count, minimal.term_count)
            ));
        }
    }

    (
        weights::KMAP_COMPLETENESS * (complete as f64 / total),
        weights::KMAP_EXPRESSION * (valid_and_minimal as f64 / total),
        notes,
    )
}

fn check_transition_table(machine: &Machine, opts: &RubricOptions) -> SectionResult {
    let (current_cols, next_cols, input_cols, output_cols) = table::categorize_sorted(&machine.transition_table.value_columns);

    let expected_bit_cols = crate::bits::state_bit_width(machine.num_states.max(opts.min_states));
    let expected_inputs = machine.inputs.len().max(opts.min_inputs);
    let expected_outputs = machine.outputs.len().max(opts.min_outputs);
    let expected_total_cols = (expected_bit_cols * 2 + expected_inputs + expected_outputs).max(1);

    let present_total_cols = current_cols.len().min(expected_bit_cols)
        + next_cols.len().min(expected_bit_cols)
        + input_cols.len().min(expected_inputs)
        + output_cols.len().min(expected_outputs);
    let structure_ratio = present_total_cols as f64 / expected_total_cols as f64;
    let structure_score = weights::TABLE_STRUCTURE * structure_ratio;

    let mut notes = Vec::new();
    if structure_ratio < 1.0 {
        notes.push(format!(
            "Transition table missing columns (have {present_total_cols}/{expected_total_cols} across state/input/output groups)"
        ));
    }

    let diagram_dict = table::build_diagram_dictionary(machine);
    let table_dict = table::build_table_dictionary(&machine.transition_table, &current_cols, &input_cols, &next_cols, &output_cols);
    let match_percent = table::dictionary_match_percent(&diagram_dict, &table_dict);
    let match_score = weights::TABLE_MATCH * (match_percent as f64 / 100.0);
    if match_percent < 100 {
        notes.push(format!("Table/diagram mismatch: {match_percent}% match"));
    }

    let (kmap_completeness_score, kmap_expression_score, kmap_notes) = check_kmaps(machine);
    notes.extend(kmap_notes);

    SectionResult {
        score: structure_score + match_score + kmap_completeness_score + kmap_expression_score,
        weight: weights::TABLE_STRUCTURE + weights::TABLE_MATCH + weights::KMAP_COMPLETENESS + weights::KMAP_EXPRESSION,
        notes,
    }
}

/// Run all three rubric sections against an already-loaded machine.
pub fn score(machine: &Machine, opts: &RubricOptions) -> Vec<(String, SectionResult)> {
    vec![
        ("State definitions".to_string(), check_state_definitions(machine, opts)),
        ("Transition diagram".to_string(), check_transition_diagram(machine, opts)),
        ("Transition table vs diagram".to_string(), check_transition_table(machine, opts)),
    ]
}

/// Load and rubric-grade a single file. A failure to parse produces an
/// all-zero placeholder result (matching `grade_fsm.py::main`'s per-file
/// `except` clause) rather than aborting the batch.
pub fn grade_file_rubric(path: &Path, opts: &RubricOptions) -> RubricResult {
    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    match Machine::from_path(path) {
        Ok(machine) => RubricResult {
            file: name,
            sections: score(&machine, opts),
        },
        Err(LoadError { message }) => RubricResult {
            file: name,
            sections: vec![
                (
                    "State definitions".to_string(),
                    SectionResult {
                        score: 0.0,
                        weight: weights::STATE_DESCRIPTION + weights::STATE_LABEL + weights::STATE_BINARY + weights::INPUT_MINIMUM + weights::OUTPUT_MINIMUM,
                        notes: vec![format!("Failed to grade: {message}")],
                    },
                ),
                (
                    "Transition diagram".to_string(),
                    SectionResult {
                        score: 0.0,
                        weight: weights::PLACED_STATES + weights::OUTPUT_VALUE + weights::ARROW_COVERAGE,
                        notes: vec!["Skipped due to earlier failure".to_string()],
                    },
                ),
                (
                    "Transition table vs diagram".to_string(),
                    SectionResult {
                        score: 0.0,
                        weight: weights::TABLE_STRUCTURE + weights::TABLE_MATCH + weights::KMAP_COMPLETENESS + weights::KMAP_EXPRESSION,
                        notes: vec!["Skipped due to earlier failure".to_string()],
                    },
                ),
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSING_MACHINE: &str = r#"{
        "inputs": ["X"],
        "outputs": ["Z"],
        "numStates": 2,
        "type": "moore",
        "states": [
            {"id": 0, "placed": true, "binary": "0", "label": "S0", "description": "start", "outputs": ["0"]},
            {"id": 1, "placed": true, "binary": "1", "label": "S1", "description": "second", "outputs": ["1"]}
        ],
        "transitions": [
            {"from": 0, "to": 1, "inputValues": ["1"]},
            {"from": 0, "to": 0, "inputValues": ["0"]},
            {"from": 1, "to": 0, "inputValues": ["0"]},
            {"from": 1, "to": 1, "inputValues": ["1"]}
        ],
        "transitionTable": {
            "valueColumns": [
                {"key": "q_0__g", "baseKey": "q_0", "type": "value"},
                {"key": "next_q_0__g", "baseKey": "next_q_0", "type": "value"},
                {"key": "in_0__g", "baseKey": "in_0", "type": "value"},
                {"key": "out_0__g", "baseKey": "out_0", "type": "value"}
            ],
            "rows": [
                {"key": "0|0"}, {"key": "0|1"}, {"key": "1|0"}, {"key": "1|1"}
            ],
            "cells": {
                "0|0::q_0__g": "0", "0|0::in_0__g": "0", "0|0::next_q_0__g": "0", "0|0::out_0__g": "0",
                "0|1::q_0__g": "0", "0|1::in_0__g": "1", "0|1::next_q_0__g": "1", "0|1::out_0__g": "0",
                "1|0::q_0__g": "1", "1|0::in_0__g": "0", "1|0::next_q_0__g": "0", "1|0::out_0__g": "1",
                "1|1::q_0__g": "1", "1|1::in_0__g": "1", "1|1::next_q_0__g": "1", "1|1::out_0__g": "1"
            }
        }
    }"#;

    #[test]
    fn test_gate_verdict_passes_consistent_machine() {
        let machine = Machine::from_json(PASSING_MACHINE).unwrap();
        let issues = verdict(&machine, &GatingOptions::default());
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn test_gate_verdict_requires_min_states() {
        let machine = Machine::from_json(PASSING_MACHINE).unwrap();
        let issues = verdict(&machine, &GatingOptions::default().with_min_states(5));
        assert!(issues.iter().any(|i| i.contains("Requires at least 5")));
    }

    #[test]
    fn test_rubric_score_full_marks() {
        let machine = Machine::from_json(PASSING_MACHINE).unwrap();
        let sections = score(&machine, &RubricOptions::default());
        let total: f64 = sections.iter().map(|(_, s)| s.score).sum();
        let weight: f64 = sections.iter().map(|(_, s)| s.weight).sum();
        assert!((total - weight).abs() < 1e-6, "total={total} weight={weight}");
    }

    #[test]
    fn test_rubric_empty_kmaps_earn_full_kmap_credit() {
        let machine = Machine::from_json(PASSING_MACHINE).unwrap();
        let (completeness, expression, notes) = check_kmaps(&machine);
        assert_eq!(completeness, weights::KMAP_COMPLETENESS);
        assert_eq!(expression, weights::KMAP_EXPRESSION);
        assert!(notes.is_empty());
    }

    #[test]
    fn test_malformed_file_becomes_failed_result_not_panic() {
        let tmp = std::env::temp_dir().join("fsmgrade_test_malformed.json");
        std::fs::write(&tmp, "not json").unwrap();
        let result = grade_file_gate(&tmp, &GatingOptions::default());
        assert!(!result.passed());
        std::fs::remove_file(&tmp).ok();
    }
}
