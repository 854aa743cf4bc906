//! # fsmgrade
//!
//! Offline consistency and rubric grading for saved finite-state-machine
//! design artifacts.
//!
//! A save file describes states, transitions, a transition table, and any
//! number of Karnaugh-map panels. This crate checks that those pieces agree
//! with each other — hard "does this diagram even make sense" gating, and a
//! weighted rubric score for partial credit.
//!
//! ## Module organization
//!
//! - [`bits`] - tri-valued bit primitives and input-combination expansion
//! - [`expr`] - Boolean SOP/POS expression lexer, parser, and evaluator
//! - [`qm`] - Quine–McCluskey prime-implicant generation and minimal cover
//! - [`kmap`] - Karnaugh-map Gray-code layout and prime-implicant verification
//! - [`model`] - JSON save-file deserialization into the normalized machine model
//! - [`diagram`] - transition-diagram dictionary construction and coverage checks
//! - [`table`] - transition-table dictionary construction and diagram comparison
//! - [`grading`] - gate-mode verdicts and rubric-mode scoring built on the above
//!
//! ## Quick start
//!
//! ```
//! use fsmgrade::model::Machine;
//! use fsmgrade::grading::{self, GatingOptions};
//!
//! let raw = r#"{
//!     "inputs": ["X"], "outputs": ["Z"], "numStates": 1, "type": "moore",
//!     "states": [{"id": 0, "placed": true, "binary": "0", "outputs": ["0"]}],
//!     "transitions": [{"from": 0, "to": 0, "inputValues": ["0"]}, {"from": 0, "to": 0, "inputValues": ["1"]}]
//! }"#;
//! let machine = Machine::from_json(raw).unwrap();
//! let issues = grading::verdict(&machine, &GatingOptions::default());
//! // No `transitionTable` was saved, so gate mode flags the missing columns
//! // even though the diagram itself is internally consistent.
//! assert!(issues.iter().any(|issue| issue.contains("Missing required column headers")));
//! ```

/// Tri-valued bit primitives and input-combination expansion.
pub mod bits;

/// Boolean SOP/POS expression lexer, parser, and evaluator.
pub mod expr;

/// Quine–McCluskey prime-implicant generation and minimal cover selection.
pub mod qm;

/// Karnaugh-map Gray-code layout construction and prime-implicant verification.
pub mod kmap;

/// JSON save-file deserialization into the normalized machine model.
pub mod model;

/// Transition-diagram dictionary construction and arrow-coverage checking.
pub mod diagram;

/// Transition-table dictionary construction and gate/rubric comparison.
pub mod table;

/// Gate-mode verdicts and rubric-mode scoring.
pub mod grading;

pub use grading::{GateResult, GatingOptions, RubricOptions, RubricResult};
pub use model::{LoadError, Machine};
