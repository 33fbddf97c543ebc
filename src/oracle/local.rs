use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::debug;

use super::{Amplitude, Probability, SimulationOracle, SimulationResult};
use crate::circuit::{Circuit, GateKind};
use crate::error::Result;
use crate::quantum::{simulate_circuit, StateVector};

/// In-process state-vector simulator.
#[derive(Clone, Debug, Default)]
pub struct LocalSimulator {
    latency: Duration,
}

impl LocalSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every answer by `latency`, to mimic a remote engine.
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait(?Send)]
impl SimulationOracle for LocalSimulator {
    fn name(&self) -> &str {
        "local"
    }

    async fn simulate(&self, circuit: &Circuit) -> Result<SimulationResult> {
        let started = Instant::now();
        let state = simulate_circuit(circuit);
        let elapsed = started.elapsed();
        debug!("local simulation of {} gates took {elapsed:?}", circuit.len());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(build_result(circuit, &state, elapsed))
    }
}

fn build_result(circuit: &Circuit, state: &StateVector, elapsed: Duration) -> SimulationResult {
    let state_vector = state
        .amplitudes
        .iter()
        .enumerate()
        .map(|(i, amp)| Amplitude {
            real: amp.re,
            imag: amp.im,
            label: state.label(i),
        })
        .collect();
    let probabilities = state
        .probabilities()
        .into_iter()
        .enumerate()
        .map(|(i, probability)| Probability {
            state: state.label(i),
            probability,
        })
        .collect();

    SimulationResult {
        state_vector,
        probabilities,
        generated_code: to_qasm(circuit),
        execution_time_label: format!("{:.6}s", elapsed.as_secs_f64()),
        fidelity: 1.0,
    }
}

pub fn to_qasm(circuit: &Circuit) -> String {
    let n = circuit.num_qubits();
    let mut sb = String::new();
    sb.push_str("OPENQASM 2.0;\n");
    sb.push_str("include \"qelib1.inc\";\n\n");
    sb.push_str(&format!("qreg q[{n}];\n"));
    sb.push_str(&format!("creg c[{n}];\n\n"));

    for gate in circuit.ordered_gates() {
        let t = gate.target_qubit;
        let line = match gate.kind {
            GateKind::H => format!("h q[{t}];"),
            GateKind::X => format!("x q[{t}];"),
            GateKind::Y => format!("y q[{t}];"),
            GateKind::Z => format!("z q[{t}];"),
            GateKind::CX => match gate.control_qubit {
                Some(c) => format!("cx q[{c}],q[{t}];"),
                None => format!("// cx on q[{t}] has no control qubit"),
            },
            GateKind::Measure => format!("measure q[{t}] -> c[{t}];"),
        };
        sb.push_str(&line);
        sb.push('\n');
    }

    sb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;

    #[tokio::test]
    async fn enumerates_every_basis_state() {
        let result = LocalSimulator::new()
            .simulate(&Circuit::initial())
            .await
            .unwrap();
        assert_eq!(result.state_vector.len(), 8);
        assert_eq!(result.probabilities.len(), 8);
        assert_eq!(result.probabilities[0].state, "|000⟩");
        assert_eq!(result.probabilities[7].state, "|111⟩");
        let total: f64 = result.probabilities.iter().map(|p| p.probability).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(result.fidelity, 1.0);
        assert!(result.execution_time_label.ends_with('s'));
        assert!(result.token().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_the_answer() {
        let sim = LocalSimulator::with_latency(Duration::from_secs(2));
        let before = tokio::time::Instant::now();
        sim.simulate(&Circuit::new(1, 1)).await.unwrap();
        assert!(before.elapsed() >= Duration::from_secs(2));
    }

    #[test]
    fn bell_state_qasm() {
        let qasm = to_qasm(&presets::find("Bell State").unwrap().circuit());
        assert!(qasm.starts_with("OPENQASM 2.0;"));
        assert!(qasm.contains("qreg q[2];"));
        assert!(qasm.contains("h q[0];\ncx q[0],q[1];\n"));
        assert!(qasm.contains("measure q[1] -> c[1];"));
    }

    #[test]
    fn dangling_cx_becomes_a_comment() {
        let qasm = to_qasm(&Circuit::new(1, 1).place_gate(0, 0, GateKind::CX));
        assert!(qasm.contains("// cx on q[0] has no control qubit"));
    }
}
