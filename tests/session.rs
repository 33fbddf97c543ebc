use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::LocalSet;

use q_tutor::app::App;
use q_tutor::chat::{APOLOGY, GREETING};
use q_tutor::circuit::{Circuit, GateKind};
use q_tutor::error::{OracleError, Result};
use q_tutor::grid::CellOutcome;
use q_tutor::oracle::{
    ConversationOracle, ConversationReply, ConversationRequest, LocalSimulator, LocalTutor,
    SimulationOracle, SimulationResult,
};
use q_tutor::presets;

/// Simulator whose every result carries the same execution time label.
struct FixedLabel;

#[async_trait(?Send)]
impl SimulationOracle for FixedLabel {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn simulate(&self, circuit: &Circuit) -> Result<SimulationResult> {
        let mut result = LocalSimulator::new().simulate(circuit).await?;
        result.execution_time_label = "0.0100s".to_string();
        Ok(result)
    }
}

struct Offline;

#[async_trait(?Send)]
impl ConversationOracle for Offline {
    fn name(&self) -> &str {
        "offline"
    }

    async fn converse(&self, _request: &ConversationRequest) -> Result<ConversationReply> {
        Err(OracleError::Unavailable("no network".to_string()))
    }
}

const STEP: Duration = Duration::from_millis(50);

async fn settle(app: &mut App) {
    loop {
        tokio::time::sleep(Duration::from_millis(10)).await;
        app.pump();
        if !app.is_running() && !app.conversation.is_waiting() {
            break;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn default_circuit_runs_to_an_entangled_result() {
    LocalSet::new()
        .run_until(async {
            let mut app = App::new(Rc::new(LocalSimulator::new()), Rc::new(LocalTutor), STEP);
            assert_eq!(app.circuit, Circuit::initial());
            assert!(app.request_run());
            settle(&mut app).await;

            let result = app.result.clone().unwrap();
            let likely: Vec<&str> = result
                .likely_outcomes()
                .iter()
                .map(|p| p.state.as_str())
                .collect();
            assert_eq!(likely.len(), 2);
            assert!(likely.contains(&"|000⟩"));
            assert!(likely.contains(&"|111⟩"));
            assert!(result.generated_code.starts_with("OPENQASM 2.0;"));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn loading_bell_state_replaces_circuit_and_clears_result() {
    LocalSet::new()
        .run_until(async {
            let mut app = App::new(Rc::new(LocalSimulator::new()), Rc::new(LocalTutor), STEP);
            app.request_run();
            settle(&mut app).await;
            assert!(app.result.is_some());

            let idx = presets::PRESETS
                .iter()
                .position(|p| p.name == "Bell State")
                .unwrap();
            assert!(app.load_preset(idx));
            assert!(app.result.is_none());
            assert_eq!(app.circuit.num_qubits(), 2);
            assert_eq!(app.circuit.steps(), 4);

            let gates: Vec<(GateKind, usize, Option<usize>, usize)> = app
                .circuit
                .ordered_gates()
                .iter()
                .map(|g| (g.kind, g.target_qubit, g.control_qubit, g.step))
                .collect();
            assert_eq!(
                gates,
                vec![
                    (GateKind::H, 0, None, 0),
                    (GateKind::CX, 1, Some(0), 1),
                    (GateKind::Measure, 0, None, 2),
                    (GateKind::Measure, 1, None, 2),
                ]
            );
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn grid_is_locked_only_while_running() {
    LocalSet::new()
        .run_until(async {
            let mut app = App::new(
                Rc::new(LocalSimulator::with_latency(Duration::from_millis(500))),
                Rc::new(LocalTutor),
                STEP,
            );
            app.grid.cursor_qubit = 0;
            app.grid.cursor_step = 0;
            app.request_run();
            tokio::time::sleep(STEP).await;
            assert!(app.is_running());
            assert_eq!(app.activate_cell(), CellOutcome::Locked);

            settle(&mut app).await;
            assert_eq!(app.activate_cell(), CellOutcome::Removed(GateKind::H));
            assert!(app.circuit.gate_at(0, 0).is_none());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn identical_result_is_explained_once() {
    LocalSet::new()
        .run_until(async {
            let mut app = App::new(Rc::new(FixedLabel), Rc::new(LocalTutor), STEP);
            app.request_run();
            settle(&mut app).await;
            assert_eq!(app.conversation.messages().len(), 2);

            app.request_run();
            settle(&mut app).await;
            assert_eq!(app.conversation.messages().len(), 2);
            assert_eq!(app.conversation.last_explained().as_deref(), Some("0.0100s"));

            // Asking still works after the duplicate was skipped
            app.chat_input = "what does the hadamard do?".to_string();
            app.submit_chat();
            settle(&mut app).await;
            let log = app.conversation.messages();
            assert_eq!(log.len(), 4);
            assert!(log[3].text.starts_with("**Hadamard**"));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn unreachable_tutor_apologises() {
    LocalSet::new()
        .run_until(async {
            let mut app = App::new(Rc::new(LocalSimulator::new()), Rc::new(Offline), STEP);
            app.request_run();
            settle(&mut app).await;

            let log = app.conversation.messages();
            assert_eq!(log[0].text, GREETING);
            assert_eq!(log.last().unwrap().text, APOLOGY);
            assert!(!app.conversation.is_waiting());
        })
        .await;
}
