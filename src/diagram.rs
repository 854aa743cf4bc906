//! Transition-diagram dictionary construction and arrow-coverage checking
//! (§4.2/§4.6 gate-mode "diagram is self-consistent" checks).

use crate::bits::{self, Bit};
use crate::model::{FsmType, Machine, State, Transition};
use std::collections::HashMap;

/// What the diagram expects to find at `"{source_bits}|{input_combo}"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    pub next_state_bits: Vec<Bit>,
    pub outputs: Vec<Bit>,
}

/// The diagram-derived dictionary plus a `conflict` flag raised whenever two
/// transitions disagree about the same `(source, input)` pair, or a
/// transition references a state with no usable binary encoding.
#[derive(Debug, Clone, Default)]
pub struct DiagramExpectations {
    pub expectations: HashMap<String, Expectation>,
    pub conflict: bool,
}

pub(crate) fn expected_outputs(machine: &Machine, tr: &Transition, source: Option<&State>) -> Vec<Bit> {
    match machine.fsm_type {
        FsmType::Moore => source
            .map(|s| s.outputs.clone())
            .unwrap_or_else(|| vec![Bit::Unspecified; machine.outputs.len()]),
        FsmType::Mealy => tr.output_values.clone(),
    }
}

pub fn build_expectations(machine: &Machine) -> DiagramExpectations {
    let bit_count = machine.bit_count();
    let mut expectations: HashMap<String, Expectation> = HashMap::new();
    let mut conflict = false;

    for tr in &machine.transitions {
        let source = machine.state_by_id(tr.from);
        let source_bits = source.map(|s| machine.state_binary_code(s)).unwrap_or_default();
        if source_bits.len() != bit_count {
            conflict = true;
            continue;
        }

        let target = machine.state_by_id(tr.to);
        let next_bits_str = target.map(|s| machine.state_binary_code(s)).unwrap_or_default();
        if next_bits_str.is_empty() {
            conflict = true;
            continue;
        }
        let next_state_bits: Vec<Bit> = next_bits_str.chars().map(Bit::from_char).collect();
        let outputs = expected_outputs(machine, tr, source);
        if next_state_bits.iter().any(|b| !b.is_specified()) || outputs.iter().any(|b| !b.is_specified()) {
            conflict = true;
            continue;
        }

        for combo in bits::combinations_from(&tr.input_values) {
            let suffix = if combo.is_empty() { "none".to_string() } else { combo };
            let key = format!("{source_bits}|{suffix}");
            match expectations.get(&key) {
                None => {
                    expectations.insert(
                        key,
                        Expectation {
                            next_state_bits: next_state_bits.clone(),
                            outputs: outputs.clone(),
                        },
                    );
                }
                Some(existing) => {
                    if existing.next_state_bits != next_state_bits || existing.outputs != outputs {
                        conflict = true;
                    }
                }
            }
        }
    }

    DiagramExpectations { expectations, conflict }
}

/// Gate-mode check: every input combination out of `state_id` must appear
/// exactly once among its outgoing transitions.
pub fn check_transition_coverage(machine: &Machine, state_id: i64) -> Result<(), String> {
    let input_count = machine.inputs.len();
    let mut combo_counts: HashMap<String, usize> = HashMap::new();
    for tr in &machine.transitions {
        if tr.from != state_id {
            continue;
        }
        for combo in bits::combinations_from(&tr.input_values) {
            *combo_counts.entry(combo).or_insert(0) += 1;
        }
    }

    let expected = 1usize << input_count;
    let unique = combo_counts.len();
    let has_duplicates = combo_counts.values().any(|&c| c > 1);

    let missing: Vec<String> = bits::generate_all_combos(input_count)
        .into_iter()
        .filter(|c| !combo_counts.contains_key(c))
        .collect();
    if !missing.is_empty() {
        return Err(format!(
            "State {state_id} is missing input combinations: {}",
            missing.join(", ")
        ));
    }
    if has_duplicates || unique > expected {
        return Err(format!("State {state_id} has overlapping or extra input combinations"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Machine;

    const MACHINE: &str = r#"{
        "inputs": ["X"],
        "outputs": ["Z"],
        "numStates": 2,
        "type": "moore",
        "states": [
            {"id": 0, "placed": true, "binary": "0", "outputs": ["0"]},
            {"id": 1, "placed": true, "binary": "1", "outputs": ["1"]}
        ],
        "transitions": [
            {"from": 0, "to": 1, "inputValues": ["1"]},
            {"from": 1, "to": 0, "inputValues": ["0"]},
            {"from": 0, "to": 0, "inputValues": ["0"]},
            {"from": 1, "to": 1, "inputValues": ["1"]}
        ]
    }"#;

    #[test]
    fn test_build_expectations_full_coverage_no_conflict() {
        let machine = Machine::from_json(MACHINE).unwrap();
        let expectations = build_expectations(&machine);
        assert!(!expectations.conflict);
        assert_eq!(expectations.expectations.len(), 4);
    }

    #[test]
    fn test_check_transition_coverage_ok() {
        let machine = Machine::from_json(MACHINE).unwrap();
        assert!(check_transition_coverage(&machine, 0).is_ok());
        assert!(check_transition_coverage(&machine, 1).is_ok());
    }

    #[test]
    fn test_check_transition_coverage_missing() {
        let raw = r#"{
            "inputs": ["X"],
            "outputs": [],
            "numStates": 1,
            "states": [{"id": 0, "placed": true, "binary": "0"}],
            "transitions": []
        }"#;
        let machine = Machine::from_json(raw).unwrap();
        let err = check_transition_coverage(&machine, 0).unwrap_err();
        assert!(err.contains("missing input combinations"));
    }

    #[test]
    fn test_check_transition_coverage_duplicate() {
        let raw = r#"{
            "inputs": [],
            "outputs": [],
            "numStates": 1,
            "states": [{"id": 0, "placed": true, "binary": "0"}],
            "transitions": [
                {"from": 0, "to": 0, "inputValues": []},
                {"from": 0, "to": 0, "inputValues": []}
            ]
        }"#;
        let machine = Machine::from_json(raw).unwrap();
        let err = check_transition_coverage(&machine, 0).unwrap_err();
        assert!(err.contains("overlapping"));
    }

    #[test]
    fn test_build_expectations_conflict_on_disagreement() {
        let raw = r#"{
            "inputs": ["X"],
            "outputs": [],
            "numStates": 2,
            "type": "moore",
            "states": [
                {"id": 0, "placed": true, "binary": "0"},
                {"id": 1, "placed": true, "binary": "1"}
            ],
            "transitions": [
                {"from": 0, "to": 1, "inputValues": ["0"]},
                {"from": 0, "to": 0, "inputValues": ["0"]}
            ]
        }"#;
        let machine = Machine::from_json(raw).unwrap();
        let expectations = build_expectations(&machine);
        assert!(expectations.conflict);
    }

    /// Build a Moore machine JSON with exactly one transition per
    /// `(state, input combo)` pair — full coverage by construction.
    fn fully_covered_machine(num_states: usize, num_inputs: usize) -> String {
        let states: Vec<String> = (0..num_states)
            .map(|id| format!(r#"{{"id": {id}, "placed": true, "binary": "{id:0width$b}", "outputs": ["0"]}}"#, width = num_inputs.max(1)))
            .collect();
        let combos = crate::bits::generate_all_combos(num_inputs);
        let mut transitions = Vec::new();
        for (from, _) in states.iter().enumerate() {
            for (i, combo) in combos.iter().enumerate() {
                let to = (from + i + 1) % num_states;
                let input_values: Vec<String> = combo.chars().map(|c| format!("\"{c}\"")).collect();
                transitions.push(format!(
                    r#"{{"from": {from}, "to": {to}, "inputValues": [{}]}}"#,
                    input_values.join(", ")
                ));
            }
        }
        format!(
            r#"{{"inputs": {:?}, "outputs": ["Z"], "numStates": {num_states}, "type": "moore",
                "states": [{}], "transitions": [{}]}}"#,
            (0..num_inputs).map(|i| format!("I{i}")).collect::<Vec<_>>(),
            states.join(", "),
            transitions.join(", "),
        )
    }

    proptest::proptest! {
        /// Full-coverage law: a machine built with exactly one transition per
        /// `(state, input combo)` pair never reports missing/overlapping
        /// coverage and never conflicts when its dictionary is built.
        #[test]
        fn prop_full_coverage_law(num_states in 1usize..5, num_inputs in 0usize..3) {
            let raw = fully_covered_machine(num_states, num_inputs);
            let machine = Machine::from_json(&raw).unwrap();
            for state in &machine.states {
                proptest::prop_assert!(check_transition_coverage(&machine, state.id).is_ok());
            }
            let expectations = build_expectations(&machine);
            proptest::prop_assert!(!expectations.conflict);
            proptest::prop_assert_eq!(expectations.expectations.len(), num_states * (1usize << num_inputs));
        }
    }
}
