use crate::circuit::{Circuit, GateKind};
use num_complex::Complex;

pub type ComplexF64 = Complex<f64>;

#[derive(Clone, Debug)]
pub struct StateVector {
    pub amplitudes: Vec<ComplexF64>,
    pub num_qubits: usize,
}

impl StateVector {
    pub fn new(num_qubits: usize) -> Self {
        let n = 1 << num_qubits;
        let mut amplitudes = vec![ComplexF64::new(0.0, 0.0); n];
        amplitudes[0] = ComplexF64::new(1.0, 0.0);
        Self {
            amplitudes,
            num_qubits,
        }
    }

    pub fn apply_gate(&mut self, kind: GateKind, target: usize, control: Option<usize>) {
        match kind {
            GateKind::H => self.apply_h(target),
            GateKind::X => self.apply_x(target),
            GateKind::Y => self.apply_y(target),
            GateKind::Z => self.apply_z(target),
            GateKind::CX => {
                // A CNOT without a control acts as the identity
                if let Some(c) = control {
                    self.apply_cx(c, target);
                }
            }
            GateKind::Measure => {}
        }
    }

    fn apply_h(&mut self, q: usize) {
        let h_factor = ComplexF64::new(1.0 / std::f64::consts::SQRT_2, 0.0);
        let bit = 1 << q;
        for i in 0..self.amplitudes.len() {
            if (i & bit) == 0 {
                let j = i | bit;
                let (a, b) = (self.amplitudes[i], self.amplitudes[j]);
                self.amplitudes[i] = h_factor * (a + b);
                self.amplitudes[j] = h_factor * (a - b);
            }
        }
    }

    fn apply_x(&mut self, q: usize) {
        let bit = 1 << q;
        for i in 0..self.amplitudes.len() {
            if (i & bit) == 0 {
                self.amplitudes.swap(i, i | bit);
            }
        }
    }

    fn apply_y(&mut self, q: usize) {
        let bit = 1 << q;
        let i_comp = ComplexF64::new(0.0, 1.0);
        for i in 0..self.amplitudes.len() {
            if (i & bit) == 0 {
                let j = i | bit;
                let (amp_i, amp_j) = (self.amplitudes[i], self.amplitudes[j]);
                self.amplitudes[i] = -i_comp * amp_j;
                self.amplitudes[j] = i_comp * amp_i;
            }
        }
    }

    fn apply_z(&mut self, q: usize) {
        let bit = 1 << q;
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if (i & bit) != 0 {
                *amp = -*amp;
            }
        }
    }

    fn apply_cx(&mut self, control: usize, target: usize) {
        let c_bit = 1 << control;
        let t_bit = 1 << target;
        for i in 0..self.amplitudes.len() {
            if (i & c_bit) != 0 && (i & t_bit) == 0 {
                self.amplitudes.swap(i, i | t_bit);
            }
        }
    }

    pub fn probabilities(&self) -> Vec<f64> {
        self.amplitudes.iter().map(|a| a.norm_sqr()).collect()
    }

    pub fn label(&self, basis_state: usize) -> String {
        format_basis_state(basis_state, self.num_qubits)
    }
}

/// `|q_{n-1} … q_0⟩`: qubit 0 is the rightmost digit.
pub fn format_basis_state(state: usize, num_qubits: usize) -> String {
    let mut s = String::from("|");
    for i in (0..num_qubits).rev() {
        s.push(if state & (1 << i) != 0 { '1' } else { '0' });
    }
    s.push('⟩');
    s
}

/// Applies every gate in step order. Measurements leave the state untouched.
pub fn simulate_circuit(circuit: &Circuit) -> StateVector {
    let mut state = StateVector::new(circuit.num_qubits());
    for gate in circuit.ordered_gates() {
        state.apply_gate(gate.kind, gate.target_qubit, gate.control_qubit);
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;

    const EPS: f64 = 1e-9;

    #[test]
    fn bell_state_splits_evenly() {
        let bell = presets::find("Bell State").unwrap().circuit();
        let probs = simulate_circuit(&bell).probabilities();
        assert!((probs[0b00] - 0.5).abs() < EPS);
        assert!((probs[0b11] - 0.5).abs() < EPS);
        assert!(probs[0b01].abs() < EPS && probs[0b10].abs() < EPS);
    }

    #[test]
    fn initial_circuit_is_ghz() {
        let probs = simulate_circuit(&Circuit::initial()).probabilities();
        assert_eq!(probs.len(), 8);
        assert!((probs[0] - 0.5).abs() < EPS);
        assert!((probs[7] - 0.5).abs() < EPS);
    }

    #[test]
    fn interference_lands_on_one() {
        let c = presets::find("Interference").unwrap().circuit();
        let probs = simulate_circuit(&c).probabilities();
        assert!((probs[1] - 1.0).abs() < EPS);
    }

    #[test]
    fn y_flips_with_phase() {
        let c = Circuit::new(1, 1).place_gate(0, 0, GateKind::Y);
        let state = simulate_circuit(&c);
        assert!((state.amplitudes[1] - ComplexF64::new(0.0, 1.0)).norm() < EPS);
    }

    #[test]
    fn uncontrolled_cx_is_identity() {
        let c = Circuit::new(1, 1).place_gate(0, 0, GateKind::CX);
        let probs = simulate_circuit(&c).probabilities();
        assert!((probs[0] - 1.0).abs() < EPS);
    }

    #[test]
    fn labels_put_qubit_zero_last() {
        assert_eq!(format_basis_state(0b001, 3), "|001⟩");
        assert_eq!(format_basis_state(0b100, 3), "|100⟩");
    }
}
