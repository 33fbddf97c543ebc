//! Oracles backed by an external process.
//!
//! The request is written to the child's stdin as one JSON document and the
//! answer is read from its stdout once the child exits.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{
    ConversationOracle, ConversationReply, ConversationRequest, SimulationOracle, SimulationResult,
    Turn,
};
use crate::chat::Message;
use crate::circuit::Circuit;
use crate::error::{OracleError, Result};

#[derive(Clone, Debug)]
struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    async fn exchange(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OracleError::Unavailable(format!("cannot start {}: {e}", self.program)))?;

        // Feed stdin while stdout and stderr are drained
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(input).await {
                    if e.kind() != io::ErrorKind::BrokenPipe {
                        return Err(e);
                    }
                    debug!("{} closed stdin before reading all input", self.program);
                }
            }
            Ok(())
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        fed?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OracleError::Unavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        debug!("{} answered with {} bytes", self.program, output.stdout.len());
        Ok(output.stdout)
    }
}

/// Simulation oracle that pipes the circuit to a command.
#[derive(Clone, Debug)]
pub struct CommandSimulator {
    command: CommandLine,
}

impl CommandSimulator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: CommandLine {
                program: program.into(),
                args,
            },
        }
    }

    /// Splits a command line on whitespace. `None` when it is blank.
    pub fn parse(command_line: &str) -> Option<Self> {
        CommandLine::parse(command_line).map(|command| Self { command })
    }
}

#[derive(Serialize)]
struct SimulationRequest<'a> {
    circuit: &'a Circuit,
}

#[async_trait(?Send)]
impl SimulationOracle for CommandSimulator {
    fn name(&self) -> &str {
        &self.command.program
    }

    async fn simulate(&self, circuit: &Circuit) -> Result<SimulationResult> {
        let input = serde_json::to_vec(&SimulationRequest { circuit })?;
        let output = self.command.exchange(&input).await?;
        serde_json::from_slice(&output).map_err(|e| OracleError::Malformed(e.to_string()))
    }
}

/// Conversation oracle that pipes the assembled request to a command.
///
/// The command may answer with `{"text": ..., "sources": [...]}`; any other
/// output is taken verbatim as the reply text.
#[derive(Clone, Debug)]
pub struct CommandTutor {
    command: CommandLine,
}

impl CommandTutor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: CommandLine {
                program: program.into(),
                args,
            },
        }
    }

    pub fn parse(command_line: &str) -> Option<Self> {
        CommandLine::parse(command_line).map(|command| Self { command })
    }
}

#[derive(Serialize)]
struct TutorRequest<'a> {
    turn: Turn,
    prompt: String,
    history: &'a [Message],
    instruction: &'a str,
}

#[derive(Deserialize)]
struct TutorResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    sources: Vec<Option<String>>,
}

#[async_trait(?Send)]
impl ConversationOracle for CommandTutor {
    fn name(&self) -> &str {
        &self.command.program
    }

    async fn converse(&self, request: &ConversationRequest) -> Result<ConversationReply> {
        let input = serde_json::to_vec(&TutorRequest {
            turn: request.turn,
            prompt: request.prompt(),
            history: &request.history,
            instruction: &request.instruction,
        })?;
        let output = self.command.exchange(&input).await?;
        let raw = String::from_utf8_lossy(&output).into_owned();

        Ok(match serde_json::from_str::<TutorResponse>(&raw) {
            Ok(parsed) => ConversationReply {
                text: parsed.text.unwrap_or_default(),
                sources: parsed.sources.into_iter().flatten().collect(),
            },
            Err(_) => ConversationReply {
                text: raw.trim().to_string(),
                sources: Vec::new(),
            },
        })
    }
}
