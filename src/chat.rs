//! Conversation context assembly.
//!
//! Decides when a fresh result deserves an unsolicited explanation, builds
//! the request handed to the conversation oracle, and folds replies into the
//! append-only message log.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::{debug, warn};
use serde::Serialize;

use crate::circuit::Circuit;
use crate::oracle::{ConversationOracle, ConversationReply, ConversationRequest, SimulationResult, Turn};
use crate::run::ResultChanged;

pub const TUTOR_PERSONA: &str = "\
You are a friendly quantum computing tutor inside a small circuit editor.
Explain ideas simply and concretely, interpret probabilities in plain words
(a 50/50 split means a perfect superposition), refer to the gates the student
actually placed, and keep answers short.";

pub const GREETING: &str = "Hello! I'm your Quantum Tutor. I can explain what each gate does, \
help you design circuits, or interpret your results. Try loading the **Bell State** preset to see entanglement.";

pub const EXPLAIN_PROMPT: &str = "The student just ran the circuit. Briefly explain the probabilities \
and the state vector to a beginner, say why the state ended up this way given the gates used, \
and suggest one thing to try next.";

pub const APOLOGY: &str = "I'm having trouble connecting to the quantum realm right now. Please try again.";

pub const EMPTY_REPLY: &str = "I didn't catch that.";

pub const NOT_RUN_YET: &str = "Not run yet";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Why a user message was not sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendRefused {
    /// Nothing but whitespace was typed
    Empty,
    /// A reply is still pending
    Busy,
}

#[derive(Debug, Default)]
struct ChatState {
    messages: Vec<Message>,
    /// Identity token of the last result an explanation was requested for.
    last_explained: Option<String>,
    pending: usize,
}

pub struct ConversationAssembler {
    oracle: Rc<dyn ConversationOracle>,
    state: RefCell<ChatState>,
}

impl ConversationAssembler {
    pub fn new(oracle: Rc<dyn ConversationOracle>) -> Self {
        Self {
            oracle,
            state: RefCell::new(ChatState {
                messages: vec![Message::assistant(GREETING)],
                ..ChatState::default()
            }),
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.borrow().messages.clone()
    }

    /// Runs `f` over the message log without copying it.
    pub fn with_messages<R>(&self, f: impl FnOnce(&[Message]) -> R) -> R {
        f(&self.state.borrow().messages)
    }

    pub fn is_waiting(&self) -> bool {
        self.state.borrow().pending > 0
    }

    pub fn last_explained(&self) -> Option<String> {
        self.state.borrow().last_explained.clone()
    }

    /// Starts a proactive explanation for `changed` unless its result was
    /// already explained or carries no identity token.
    ///
    /// The remembered token is updated here, before the oracle answers, and
    /// stays updated even if the oracle later fails.
    pub fn begin_explanation(&self, changed: &ResultChanged) -> Option<ConversationRequest> {
        let token = changed.token()?;
        {
            let mut state = self.state.borrow_mut();
            if state.last_explained.as_deref() == Some(token) {
                debug!("result {token} already explained");
                return None;
            }
            state.last_explained = Some(token.to_string());
        }
        let request = self.build_request(
            Turn::Explain,
            EXPLAIN_PROMPT.to_string(),
            &changed.circuit,
            Some(Rc::clone(&changed.result)),
        );
        self.state.borrow_mut().pending += 1;
        Some(request)
    }

    /// Records the user's message and returns the request to send for it.
    pub fn begin_user_turn(
        &self,
        text: &str,
        circuit: &Circuit,
        result: Option<Rc<SimulationResult>>,
    ) -> Result<ConversationRequest, SendRefused> {
        if text.trim().is_empty() {
            return Err(SendRefused::Empty);
        }
        if self.is_waiting() {
            return Err(SendRefused::Busy);
        }
        let request = self.build_request(Turn::Reply, text.to_string(), circuit, result);
        let mut state = self.state.borrow_mut();
        state.messages.push(Message::user(text));
        state.pending += 1;
        Ok(request)
    }

    /// Sends a request obtained from one of the `begin_*` calls and appends
    /// the outcome. Oracle failures become an apology message.
    pub async fn complete(&self, request: ConversationRequest) {
        let reply = self.oracle.converse(&request).await;
        let message = match reply {
            Ok(reply) => Message::assistant(format_reply(reply)),
            Err(e) => {
                warn!("conversation oracle {} failed: {e}", self.oracle.name());
                Message::assistant(APOLOGY)
            }
        };
        let mut state = self.state.borrow_mut();
        state.pending = state.pending.saturating_sub(1);
        state.messages.push(message);
    }

    /// Explains `changed` if it has not been explained yet. Returns whether
    /// an explanation was requested.
    pub async fn on_result_changed(&self, changed: &ResultChanged) -> bool {
        match self.begin_explanation(changed) {
            Some(request) => {
                self.complete(request).await;
                true
            }
            None => false,
        }
    }

    pub async fn send_user_message(
        &self,
        text: &str,
        circuit: &Circuit,
        result: Option<Rc<SimulationResult>>,
    ) -> Result<(), SendRefused> {
        let request = self.begin_user_turn(text, circuit, result)?;
        self.complete(request).await;
        Ok(())
    }

    fn build_request(
        &self,
        turn: Turn,
        instruction: String,
        circuit: &Circuit,
        result: Option<Rc<SimulationResult>>,
    ) -> ConversationRequest {
        ConversationRequest {
            turn,
            persona: TUTOR_PERSONA,
            history: self.messages(),
            context: context_block(circuit, result.as_deref()),
            instruction,
            circuit: circuit.clone(),
            result,
        }
    }
}

/// Summary of the circuit and result the oracle should reason about.
pub fn context_block(circuit: &Circuit, result: Option<&SimulationResult>) -> String {
    let gates = circuit.summary();
    let gates = if gates.is_empty() {
        "(none)".to_string()
    } else {
        gates.join("; ")
    };
    let result = match result {
        Some(r) if r.is_degraded() => "failed (no probabilities)".to_string(),
        Some(r) => r
            .probabilities
            .iter()
            .map(|p| format!("{}: {:.4}", p.state, p.probability))
            .collect::<Vec<_>>()
            .join(", "),
        None => NOT_RUN_YET.to_string(),
    };
    format!(
        "[CURRENT APP STATE]\nCircuit ({} qubits, {} steps) Gates: {gates}\nSimulation Result: {result}",
        circuit.num_qubits(),
        circuit.steps()
    )
}

/// Reply text with the cited sources appended as a numbered list.
pub fn format_reply(reply: ConversationReply) -> String {
    let mut text = if reply.text.trim().is_empty() {
        EMPTY_REPLY.to_string()
    } else {
        reply.text
    };
    let sources: Vec<String> = reply
        .sources
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(i, s)| format!("[{}] {s}", i + 1))
        .collect();
    if !sources.is_empty() {
        text.push_str("\n\n**Sources:**\n");
        text.push_str(&sources.join("\n"));
    }
    text
}
