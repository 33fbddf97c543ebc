use std::rc::Rc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;

use crate::chat::{ConversationAssembler, SendRefused};
use crate::circuit::{Circuit, GateKind};
use crate::config::Config;
use crate::grid::{CellOutcome, GridController};
use crate::oracle::{
    CommandSimulator, CommandTutor, ConversationOracle, LocalSimulator, LocalTutor,
    SimulationOracle, SimulationResult,
};
use crate::presets::PRESETS;
use crate::run::{RunEvent, RunOrchestrator, RunState};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Focus {
    Circuit,
    Chat,
    Presets,
}

pub struct App {
    pub circuit: Circuit,
    pub grid: GridController,
    /// Last adopted result. Cleared whenever the circuit is replaced wholesale.
    pub result: Option<Rc<SimulationResult>>,
    pub orchestrator: Rc<RunOrchestrator>,
    pub conversation: Rc<ConversationAssembler>,
    run_events: mpsc::UnboundedReceiver<RunEvent>,
    pub focus: Focus,
    pub status_msg: String,

    // Chat input line
    pub chat_input: String,

    // Preset menu state
    pub preset_idx: usize,

    // Results panel view toggles
    pub show_statevector: bool,
    pub show_code: bool,
}

impl App {
    pub fn new(
        simulator: Rc<dyn SimulationOracle>,
        tutor: Rc<dyn ConversationOracle>,
        step_delay: Duration,
    ) -> Self {
        let (orchestrator, run_events) = RunOrchestrator::new(simulator, step_delay);
        App {
            circuit: Circuit::initial(),
            grid: GridController::default(),
            result: None,
            orchestrator: Rc::new(orchestrator),
            conversation: Rc::new(ConversationAssembler::new(tutor)),
            run_events,
            focus: Focus::Circuit,
            status_msg: String::new(),
            chat_input: String::new(),
            preset_idx: 0,
            show_statevector: false,
            show_code: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let simulator: Rc<dyn SimulationOracle> =
            match config.sim_command.as_deref().and_then(CommandSimulator::parse) {
                Some(cmd) => Rc::new(cmd),
                None => Rc::new(LocalSimulator::with_latency(config.simulator_latency)),
            };
        let tutor: Rc<dyn ConversationOracle> =
            match config.tutor_command.as_deref().and_then(CommandTutor::parse) {
                Some(cmd) => Rc::new(cmd),
                None => Rc::new(LocalTutor),
            };
        info!(
            "oracles: simulation={} conversation={}",
            simulator.name(),
            tutor.name()
        );
        Self::new(simulator, tutor, config.step_delay)
    }

    pub fn run_state(&self) -> RunState {
        self.orchestrator.state()
    }

    pub fn is_running(&self) -> bool {
        self.orchestrator.is_running()
    }

    /// Refuses edits while a run is in flight.
    fn editable(&mut self) -> bool {
        if self.is_running() {
            self.status_msg = "Circuit is read-only while it runs".to_string();
            return false;
        }
        true
    }

    pub fn select_tool(&mut self, kind: Option<GateKind>) {
        self.grid.selected = kind;
    }

    pub fn activate_cell(&mut self) -> CellOutcome {
        let (circuit, outcome) = self.grid.activate(&self.circuit, self.is_running());
        match outcome {
            CellOutcome::Locked => {
                self.status_msg = "Circuit is read-only while it runs".to_string();
            }
            CellOutcome::NoTool => {
                self.status_msg = "Select a gate first (1-6)".to_string();
            }
            _ => {}
        }
        if outcome.changed() {
            self.circuit = circuit;
        }
        outcome
    }

    pub fn load_preset(&mut self, idx: usize) -> bool {
        let Some(preset) = PRESETS.get(idx) else {
            return false;
        };
        if !self.editable() {
            return false;
        }
        info!("loading preset {:?}", preset.name);
        self.circuit = preset.circuit();
        self.result = None;
        self.grid.clamp_to(&self.circuit);
        self.status_msg = format!("Loaded {}", preset.name);
        true
    }

    pub fn clear_circuit(&mut self) {
        if self.editable() {
            self.circuit = self.circuit.clear_gates();
        }
    }

    pub fn resize(&mut self, d_qubits: isize, d_steps: isize) {
        if !self.editable() {
            return;
        }
        let qubits = self.circuit.num_qubits().saturating_add_signed(d_qubits);
        let steps = self.circuit.steps().saturating_add_signed(d_steps);
        self.circuit = self.circuit.resize(qubits, steps);
        self.grid.clamp_to(&self.circuit);
    }

    /// Starts a run of the current circuit on the local task set. The
    /// session is `Running` as soon as this returns.
    pub fn request_run(&mut self) -> bool {
        let Some(started) = self.orchestrator.begin(&self.circuit) else {
            self.status_msg = "A run is already in progress".to_string();
            return false;
        };
        let orchestrator = Rc::clone(&self.orchestrator);
        tokio::task::spawn_local(async move {
            orchestrator.finish(started).await;
        });
        true
    }

    pub fn submit_chat(&mut self) {
        let request = self.conversation.begin_user_turn(
            &self.chat_input,
            &self.circuit,
            self.result.clone(),
        );
        match request {
            Ok(request) => {
                self.chat_input.clear();
                let conversation = Rc::clone(&self.conversation);
                tokio::task::spawn_local(async move {
                    conversation.complete(request).await;
                });
            }
            Err(SendRefused::Busy) => {
                self.status_msg = "The tutor is still thinking".to_string();
            }
            Err(SendRefused::Empty) => {}
        }
    }

    /// Applies every run event received since the last call.
    pub fn pump(&mut self) {
        while let Ok(event) = self.run_events.try_recv() {
            match event {
                RunEvent::Stepped(_) => {}
                RunEvent::Finished(changed) => {
                    if changed.circuit != self.circuit {
                        debug!("dropping result of a circuit that is no longer current");
                        continue;
                    }
                    self.result = Some(Rc::clone(&changed.result));
                    if changed.result.is_degraded() {
                        self.status_msg = "Simulation failed, see log".to_string();
                    }
                    if let Some(request) = self.conversation.begin_explanation(&changed) {
                        let conversation = Rc::clone(&self.conversation);
                        tokio::task::spawn_local(async move {
                            conversation.complete(request).await;
                        });
                    }
                }
            }
        }
    }

    /// Rough cost shown before running: base overhead plus a per-gate share.
    pub fn estimated_time_label(&self) -> String {
        let seconds = 0.015 + self.circuit.len() as f64 * 0.0042;
        format!("{seconds:.4}s")
    }

    pub fn handle_char_input(&mut self, ch: char) {
        if !ch.is_control() {
            self.chat_input.push(ch);
        }
    }
}
