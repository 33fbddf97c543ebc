use async_trait::async_trait;

use super::{ConversationOracle, ConversationReply, ConversationRequest, SimulationResult, Turn};
use crate::circuit::{Circuit, GateKind};
use crate::error::Result;

/// Offline tutor that explains results and gates from the request snapshot.
#[derive(Clone, Debug, Default)]
pub struct LocalTutor;

#[async_trait(?Send)]
impl ConversationOracle for LocalTutor {
    fn name(&self) -> &str {
        "local-tutor"
    }

    async fn converse(&self, request: &ConversationRequest) -> Result<ConversationReply> {
        let reply = match request.turn {
            Turn::Explain => explain(&request.circuit, request.result.as_deref()),
            Turn::Reply => answer(&request.instruction, &request.circuit, request.result.as_deref()),
        };
        Ok(reply)
    }
}

fn reference(kind: GateKind) -> &'static str {
    match kind {
        GateKind::H => "https://en.wikipedia.org/wiki/Hadamard_transform",
        GateKind::X | GateKind::Y | GateKind::Z => "https://en.wikipedia.org/wiki/Pauli_matrices",
        GateKind::CX => "https://en.wikipedia.org/wiki/Controlled_NOT_gate",
        GateKind::Measure => "https://en.wikipedia.org/wiki/Measurement_in_quantum_mechanics",
    }
}

fn kinds_in(circuit: &Circuit) -> Vec<GateKind> {
    GateKind::ALL
        .into_iter()
        .filter(|k| circuit.ordered_gates().iter().any(|g| g.kind == *k))
        .collect()
}

fn sources_for(kinds: &[GateKind]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for &kind in kinds {
        let uri = reference(kind).to_string();
        if !sources.contains(&uri) {
            sources.push(uri);
        }
    }
    sources
}

fn outcome_list(result: &SimulationResult) -> String {
    result
        .likely_outcomes()
        .iter()
        .map(|p| format!("{} {:.1}%", p.state, p.probability * 100.0))
        .collect::<Vec<_>>()
        .join(", ")
}

fn explain(circuit: &Circuit, result: Option<&SimulationResult>) -> ConversationReply {
    let Some(result) = result.filter(|r| !r.likely_outcomes().is_empty()) else {
        return ConversationReply {
            text: "I couldn't read any probabilities from that run. Check the simulator and run it again."
                .to_string(),
            sources: Vec::new(),
        };
    };

    let outcomes = result.likely_outcomes();
    let kinds = kinds_in(circuit);
    let has = |k: GateKind| kinds.contains(&k);
    let entangling = circuit
        .ordered_gates()
        .iter()
        .any(|g| g.kind == GateKind::CX && g.control_qubit.is_some());

    let mut text = format!("**Results:** {}\n\n", outcome_list(result));

    if outcomes.len() == 1 {
        text.push_str(&format!(
            "The circuit is deterministic: every measurement reads {}.",
            outcomes[0].state
        ));
    } else if outcomes
        .iter()
        .all(|p| (p.probability - outcomes[0].probability).abs() < 1e-6)
    {
        text.push_str(&format!(
            "The probability is split evenly over {} states, a perfect superposition.",
            outcomes.len()
        ));
    } else {
        text.push_str(&format!(
            "{} is the most likely outcome, but {} states remain possible.",
            outcomes[0].state,
            outcomes.len()
        ));
    }
    text.push(' ');

    if has(GateKind::H) && entangling {
        text.push_str(
            "The **Hadamard** created a superposition and the **CNOT** copied it onto another qubit, \
             so those qubits are entangled and always agree.",
        );
    } else if has(GateKind::H) {
        text.push_str("Each **Hadamard** puts its qubit into an equal mix of 0 and 1.");
    } else if has(GateKind::X) || has(GateKind::Y) {
        text.push_str("The bit flips move the qubits between definite 0 and 1 states.");
    } else {
        text.push_str("Without a Hadamard nothing leaves the starting state |0…0⟩.");
    }
    if has(GateKind::Z) {
        text.push_str(" **Z** only changes the phase, which matters once a later gate makes paths interfere.");
    }

    text.push_str("\n\n**Try next:** ");
    text.push_str(if !entangling {
        "add a CNOT after a Hadamard to entangle two qubits."
    } else if !has(GateKind::Measure) {
        "add Measure gates to see where the state collapses."
    } else {
        "put an X before the Hadamard and see how the outcome shifts."
    });

    ConversationReply {
        text,
        sources: sources_for(&kinds),
    }
}

fn mentioned(question: &str) -> Vec<GateKind> {
    let q = question.to_lowercase();
    let words: Vec<&str> = q
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| !w.is_empty())
        .collect();
    let said = |w: &str| words.contains(&w);

    GateKind::ALL
        .into_iter()
        .filter(|kind| match kind {
            GateKind::H => said("h") || said("hadamard"),
            GateKind::X => said("x") || said("pauli-x") || said("not"),
            GateKind::Y => said("y") || said("pauli-y"),
            GateKind::Z => said("z") || said("pauli-z"),
            GateKind::CX => said("cx") || said("cnot") || q.contains("entangle"),
            GateKind::Measure => said("m") || q.contains("measure"),
        })
        .collect()
}

fn answer(question: &str, circuit: &Circuit, result: Option<&SimulationResult>) -> ConversationReply {
    let kinds = mentioned(question);
    if !kinds.is_empty() {
        let text = kinds
            .iter()
            .map(|k| format!("**{}** ({}): {}", k.name(), k.symbol(), k.description()))
            .collect::<Vec<_>>()
            .join("\n");
        return ConversationReply {
            text,
            sources: sources_for(&kinds),
        };
    }

    let q = question.to_lowercase();
    if q.contains("result") || q.contains("probab") {
        let text = match result {
            Some(r) if !r.likely_outcomes().is_empty() => {
                format!("Your last run gave {}.", outcome_list(r))
            }
            _ => "You haven't got a result yet. Press **r** to run the circuit.".to_string(),
        };
        return ConversationReply {
            text,
            sources: Vec::new(),
        };
    }

    let text = if circuit.is_empty() {
        "Your circuit is empty. Pick a gate and place it on a wire, or load a preset.".to_string()
    } else {
        format!(
            "Your circuit has {} gates on {} qubits:\n{}\nAsk me about any gate (H, X, Y, Z, CX, M).",
            circuit.len(),
            circuit.num_qubits(),
            circuit.summary().join("\n")
        )
    };
    ConversationReply {
        text,
        sources: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{LocalSimulator, SimulationOracle};
    use crate::presets;
    use std::rc::Rc;

    fn request(turn: Turn, instruction: &str, circuit: Circuit, result: Option<SimulationResult>) -> ConversationRequest {
        ConversationRequest {
            turn,
            persona: "tutor",
            history: Vec::new(),
            context: String::new(),
            instruction: instruction.to_string(),
            circuit,
            result: result.map(Rc::new),
        }
    }

    #[tokio::test]
    async fn explains_bell_state_entanglement() {
        let bell = presets::find("Bell State").unwrap().circuit();
        let result = LocalSimulator::new().simulate(&bell).await.unwrap();
        let reply = LocalTutor
            .converse(&request(Turn::Explain, "explain", bell, Some(result)))
            .await
            .unwrap();
        assert!(reply.text.contains("|00⟩ 50.0%"));
        assert!(reply.text.contains("entangled"));
        assert!(reply.sources.iter().any(|s| s.contains("Controlled_NOT")));
    }

    #[tokio::test]
    async fn degraded_result_gets_a_hint() {
        let reply = LocalTutor
            .converse(&request(
                Turn::Explain,
                "explain",
                Circuit::initial(),
                Some(SimulationResult::degraded("down")),
            ))
            .await
            .unwrap();
        assert!(reply.text.contains("couldn't read"));
        assert!(reply.sources.is_empty());
    }

    #[tokio::test]
    async fn answers_gate_questions() {
        let reply = LocalTutor
            .converse(&request(Turn::Reply, "What does the Hadamard do?", Circuit::initial(), None))
            .await
            .unwrap();
        assert!(reply.text.starts_with("**Hadamard** (H)"));
        assert_eq!(reply.sources, vec![reference(GateKind::H).to_string()]);
    }

    #[test]
    fn pauli_sources_are_deduplicated() {
        let sources = sources_for(&[GateKind::X, GateKind::Y, GateKind::Z]);
        assert_eq!(sources.len(), 1);
    }

    #[test]
    fn single_letters_are_words_not_substrings() {
        assert_eq!(mentioned("why is my state so hazy"), Vec::<GateKind>::new());
        assert_eq!(mentioned("what is cx?"), vec![GateKind::CX]);
    }
}
