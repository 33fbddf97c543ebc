//! Boundary with the external simulation and conversation oracles.
//!
//! Both oracles are opaque collaborators: their answers are integrated as
//! they come, never verified. The built-in adapters are [`LocalSimulator`]
//! and [`LocalTutor`]; [`CommandSimulator`] and [`CommandTutor`] talk JSON to
//! an external process.

pub mod command;
pub mod local;
pub mod tutor;

use std::rc::Rc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chat::Message;
use crate::circuit::Circuit;
use crate::error::Result;

pub use command::{CommandSimulator, CommandTutor};
pub use local::LocalSimulator;
pub use tutor::LocalTutor;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Amplitude {
    pub real: f64,
    pub imag: f64,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Probability {
    pub state: String,
    pub probability: f64,
}

/// Outcome of simulating one circuit snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub state_vector: Vec<Amplitude>,
    pub probabilities: Vec<Probability>,
    #[serde(alias = "pythonCode")]
    pub generated_code: String,
    /// Short duration string. Doubles as the identity of the result when
    /// deciding whether it has already been explained.
    #[serde(rename = "executionTime")]
    pub execution_time_label: String,
    pub fidelity: f64,
}

pub const DEGRADED_CODE: &str = "# Error connecting to the simulation oracle.";

/// Label and identity token of every degraded result.
pub const DEGRADED_LABEL: &str = "ERR";

impl SimulationResult {
    /// Stand-in for a failed simulation: no data, zero fidelity and the
    /// `ERR` label.
    pub fn degraded(reason: &str) -> Self {
        Self {
            state_vector: Vec::new(),
            probabilities: Vec::new(),
            generated_code: format!("{DEGRADED_CODE}\n# {reason}"),
            execution_time_label: DEGRADED_LABEL.to_string(),
            fidelity: 0.0,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.generated_code.starts_with(DEGRADED_CODE)
    }

    /// Identity token, absent when the label is empty.
    pub fn token(&self) -> Option<&str> {
        Some(self.execution_time_label.as_str()).filter(|t| !t.is_empty())
    }

    /// Outcomes with non-negligible probability, most likely first.
    pub fn likely_outcomes(&self) -> Vec<&Probability> {
        let mut outcomes: Vec<&Probability> = self
            .probabilities
            .iter()
            .filter(|p| p.probability > 1e-6)
            .collect();
        outcomes.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        outcomes
    }
}

#[async_trait(?Send)]
pub trait SimulationOracle {
    fn name(&self) -> &str;

    /// Computes the result for `circuit`. Called once per run with a
    /// snapshot taken when the run started.
    async fn simulate(&self, circuit: &Circuit) -> Result<SimulationResult>;
}

/// Which kind of turn a conversation request belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Turn {
    /// Unsolicited explanation of a fresh result
    Explain,
    /// Reply to something the user typed
    Reply,
}

/// Everything a conversation oracle gets to see for one turn.
#[derive(Clone, Debug)]
pub struct ConversationRequest {
    pub turn: Turn,
    pub persona: &'static str,
    pub history: Vec<Message>,
    pub context: String,
    pub instruction: String,
    pub circuit: Circuit,
    pub result: Option<Rc<SimulationResult>>,
}

impl ConversationRequest {
    /// Persona, history, context block and instruction, in that order.
    pub fn prompt(&self) -> String {
        let mut out = String::new();
        out.push_str(self.persona.trim());
        out.push_str("\n\n[CONVERSATION]\n");
        for msg in &self.history {
            out.push_str(&format!("{}: {}\n", msg.role, msg.text));
        }
        out.push('\n');
        out.push_str(&self.context);
        out.push_str("\n\n[INSTRUCTION]\n");
        out.push_str(&self.instruction);
        out
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationReply {
    pub text: String,
    /// Reference URIs in the order the oracle cited them.
    pub sources: Vec<String>,
}

#[async_trait(?Send)]
pub trait ConversationOracle {
    fn name(&self) -> &str;

    async fn converse(&self, request: &ConversationRequest) -> Result<ConversationReply>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_oracle_payload() {
        let json = r#"{
            "stateVector": [{"real": 0.7071, "imag": 0.0, "label": "|0>"},
                            {"real": 0.7071, "imag": 0.0, "label": "|1>"}],
            "probabilities": [{"state": "|0>", "probability": 0.5},
                              {"state": "|1>", "probability": 0.5}],
            "pythonCode": "circuit.h(0)",
            "executionTime": "0.0042s",
            "fidelity": 1.0
        }"#;
        let result: SimulationResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.generated_code, "circuit.h(0)");
        assert_eq!(result.token(), Some("0.0042s"));
        assert_eq!(result.state_vector.len(), 2);
        assert!(!result.is_degraded());
    }

    #[test]
    fn degraded_result_is_marked_err() {
        let result = SimulationResult::degraded("connection refused");
        assert!(result.is_degraded());
        assert_eq!(result.token(), Some(DEGRADED_LABEL));
        assert!(result.state_vector.is_empty() && result.probabilities.is_empty());
        assert_eq!(result.fidelity, 0.0);
        assert!(result.generated_code.contains("connection refused"));
    }

    #[test]
    fn likely_outcomes_are_sorted() {
        let result = SimulationResult {
            state_vector: Vec::new(),
            probabilities: vec![
                Probability { state: "|0⟩".into(), probability: 0.25 },
                Probability { state: "|1⟩".into(), probability: 0.0 },
                Probability { state: "|2⟩".into(), probability: 0.75 },
            ],
            generated_code: String::new(),
            execution_time_label: "1s".into(),
            fidelity: 1.0,
        };
        let states: Vec<&str> = result.likely_outcomes().iter().map(|p| p.state.as_str()).collect();
        assert_eq!(states, vec!["|2⟩", "|0⟩"]);
    }
}
