//! Run orchestration.
//!
//! A run issues one simulation request for a snapshot of the circuit and,
//! alongside it, walks a scan cursor over the time steps at a fixed cadence.
//! The result is adopted once both have finished.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::circuit::Circuit;
use crate::oracle::{SimulationOracle, SimulationResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    /// Scan cursor position, in `0..steps`.
    Running(usize),
}

impl RunState {
    pub fn is_running(self) -> bool {
        matches!(self, RunState::Running(_))
    }
}

/// A newly adopted result together with the circuit it describes.
#[derive(Clone, Debug)]
pub struct ResultChanged {
    pub result: Rc<SimulationResult>,
    pub circuit: Circuit,
}

impl ResultChanged {
    pub fn token(&self) -> Option<&str> {
        self.result.token()
    }
}

#[derive(Clone, Debug)]
pub enum RunEvent {
    Stepped(usize),
    Finished(ResultChanged),
}

#[derive(Clone, Debug)]
pub enum RunOutcome {
    /// Another run was already in flight; nothing happened.
    Busy,
    Completed(ResultChanged),
}

/// A run that has entered `Running(0)` and still has to be driven.
#[derive(Debug)]
pub struct StartedRun {
    snapshot: Circuit,
}

pub struct RunOrchestrator {
    oracle: Rc<dyn SimulationOracle>,
    cadence: Duration,
    state: Cell<RunState>,
    events: mpsc::UnboundedSender<RunEvent>,
}

impl RunOrchestrator {
    /// Returns the orchestrator and the receiving end of its event stream.
    pub fn new(
        oracle: Rc<dyn SimulationOracle>,
        cadence: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            oracle,
            cadence,
            state: Cell::new(RunState::Idle),
            events,
        };
        (orchestrator, rx)
    }

    pub fn state(&self) -> RunState {
        self.state.get()
    }

    pub fn is_running(&self) -> bool {
        self.state.get().is_running()
    }

    fn enter(&self, state: RunState) {
        debug!("run state {:?} -> {state:?}", self.state.get());
        self.state.set(state);
        if let RunState::Running(step) = state {
            // The receiver going away only means nobody is watching
            let _ = self.events.send(RunEvent::Stepped(step));
        }
    }

    /// Enters `Running(0)` and snapshots `circuit`, or returns `None` while
    /// another run is in flight. Nothing is awaited, so callers observe the
    /// running state before their next edit.
    pub fn begin(&self, circuit: &Circuit) -> Option<StartedRun> {
        if self.is_running() {
            debug!("run requested while {:?}, ignored", self.state.get());
            return None;
        }

        let snapshot = circuit.clone();
        info!(
            "run started: {} gates over {} steps via {}",
            snapshot.len(),
            snapshot.steps(),
            self.oracle.name()
        );
        self.enter(RunState::Running(0));
        Some(StartedRun { snapshot })
    }

    /// Drives a run obtained from [`begin`](Self::begin) to completion.
    /// There is no way to abort a run.
    pub async fn finish(&self, run: StartedRun) -> ResultChanged {
        let snapshot = run.snapshot;
        let steps = snapshot.steps();

        let request = self.oracle.simulate(&snapshot);
        let animation = async {
            for step in 0..steps {
                if step > 0 {
                    self.enter(RunState::Running(step));
                }
                tokio::time::sleep(self.cadence).await;
            }
        };
        let (response, ()) = tokio::join!(request, animation);

        let result = match response {
            Ok(result) => {
                info!("run finished in {}", result.execution_time_label);
                result
            }
            Err(e) => {
                warn!("simulation via {} failed: {e}", self.oracle.name());
                SimulationResult::degraded(&e.to_string())
            }
        };

        let changed = ResultChanged {
            result: Rc::new(result),
            circuit: snapshot,
        };
        self.enter(RunState::Idle);
        let _ = self.events.send(RunEvent::Finished(changed.clone()));
        changed
    }

    /// Runs `circuit` to completion. A request made while a run is in
    /// flight is ignored.
    pub async fn run(&self, circuit: &Circuit) -> RunOutcome {
        match self.begin(circuit) {
            Some(run) => RunOutcome::Completed(self.finish(run).await),
            None => RunOutcome::Busy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::GateKind;
    use crate::error::{OracleError, Result};
    use async_trait::async_trait;
    use tokio::time::Instant;

    struct Scripted {
        delay: Duration,
        fail: bool,
        calls: Cell<usize>,
    }

    impl Scripted {
        fn new(delay: Duration, fail: bool) -> Rc<Self> {
            Rc::new(Self {
                delay,
                fail,
                calls: Cell::new(0),
            })
        }
    }

    #[async_trait(?Send)]
    impl SimulationOracle for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn simulate(&self, circuit: &Circuit) -> Result<SimulationResult> {
            self.calls.set(self.calls.get() + 1);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(OracleError::Unavailable("engine offline".to_string()));
            }
            Ok(SimulationResult {
                state_vector: Vec::new(),
                probabilities: Vec::new(),
                generated_code: format!("{} gates", circuit.len()),
                execution_time_label: "0.0042s".to_string(),
                fidelity: 1.0,
            })
        }
    }

    const CADENCE: Duration = Duration::from_millis(100);

    fn drain(rx: &mut mpsc::UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    fn steps_of(events: &[RunEvent]) -> Vec<usize> {
        events
            .iter()
            .filter_map(|e| match e {
                RunEvent::Stepped(i) => Some(*i),
                RunEvent::Finished(_) => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn run_steps_through_every_column_in_order() {
        let oracle = Scripted::new(Duration::ZERO, false);
        let (orch, mut rx) = RunOrchestrator::new(oracle.clone(), CADENCE);
        let circuit = Circuit::initial();
        assert_eq!(circuit.steps(), 6);

        let outcome = orch.run(&circuit).await;
        assert!(matches!(outcome, RunOutcome::Completed(_)));
        assert_eq!(orch.state(), RunState::Idle);

        let events = drain(&mut rx);
        assert_eq!(steps_of(&events), vec![0, 1, 2, 3, 4, 5]);
        assert!(matches!(events.last(), Some(RunEvent::Finished(_))));
        assert_eq!(events.len(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn fast_oracle_still_waits_for_the_scan() {
        let (orch, _rx) = RunOrchestrator::new(Scripted::new(Duration::ZERO, false), CADENCE);
        let started = Instant::now();
        orch.run(&Circuit::initial()).await;
        assert!(started.elapsed() >= CADENCE * 6);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_oracle_keeps_the_run_open() {
        let (orch, mut rx) = RunOrchestrator::new(Scripted::new(Duration::from_secs(5), false), CADENCE);
        let circuit = Circuit::initial();
        let started = Instant::now();

        let (outcome, ()) = tokio::join!(orch.run(&circuit), async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            assert_eq!(orch.state(), RunState::Running(5));
        });
        assert!(started.elapsed() >= Duration::from_secs(5));
        match outcome {
            RunOutcome::Completed(changed) => assert_eq!(changed.token(), Some("0.0042s")),
            RunOutcome::Busy => panic!("run was not started"),
        }
        assert_eq!(steps_of(&drain(&mut rx)).len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn second_request_while_running_is_ignored() {
        let oracle = Scripted::new(Duration::from_secs(1), false);
        let (orch, _rx) = RunOrchestrator::new(oracle.clone(), CADENCE);
        let circuit = Circuit::initial();

        let (_, ()) = tokio::join!(orch.run(&circuit), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let outcome = orch.run(&circuit).await;
            assert!(matches!(outcome, RunOutcome::Busy));
            assert_eq!(orch.state(), RunState::Running(0));
        });
        assert_eq!(oracle.calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_oracle_yields_degraded_result() {
        let (orch, mut rx) = RunOrchestrator::new(Scripted::new(Duration::ZERO, true), CADENCE);
        let outcome = orch.run(&Circuit::new(2, 2)).await;
        assert_eq!(orch.state(), RunState::Idle);
        let RunOutcome::Completed(changed) = outcome else {
            panic!("run was not started");
        };
        assert!(changed.result.is_degraded());
        assert_eq!(changed.token(), Some("ERR"));
        assert!(matches!(drain(&mut rx).last(), Some(RunEvent::Finished(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn result_describes_the_snapshot() {
        let (orch, _rx) = RunOrchestrator::new(Scripted::new(Duration::ZERO, false), CADENCE);
        let circuit = Circuit::new(2, 2).place_gate(0, 0, GateKind::H);
        let RunOutcome::Completed(changed) = orch.run(&circuit).await else {
            panic!("run was not started");
        };
        assert_eq!(changed.circuit, circuit);
        assert_eq!(changed.result.generated_code, "1 gates");
    }

    #[tokio::test(start_paused = true)]
    async fn orchestrator_can_run_again_after_finishing() {
        let oracle = Scripted::new(Duration::ZERO, false);
        let (orch, _rx) = RunOrchestrator::new(oracle.clone(), CADENCE);
        orch.run(&Circuit::new(1, 1)).await;
        orch.run(&Circuit::new(1, 1)).await;
        assert_eq!(oracle.calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn begin_enters_running_before_anything_is_awaited() {
        let oracle = Scripted::new(Duration::ZERO, false);
        let (orch, mut rx) = RunOrchestrator::new(oracle.clone(), CADENCE);
        let circuit = Circuit::initial();

        let started = orch.begin(&circuit).unwrap();
        assert_eq!(orch.state(), RunState::Running(0));
        assert!(orch.begin(&circuit).is_none());
        assert_eq!(oracle.calls.get(), 0);

        let changed = orch.finish(started).await;
        assert_eq!(changed.circuit, circuit);
        assert_eq!(orch.state(), RunState::Idle);
        assert_eq!(oracle.calls.get(), 1);
        assert_eq!(steps_of(&drain(&mut rx)), vec![0, 1, 2, 3, 4, 5]);
    }
}
