use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

pub const MAX_QUBITS: usize = 5;
pub const MAX_STEPS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum GateKind {
    H,
    X,
    Y,
    Z,
    CX,
    #[serde(rename = "M")]
    Measure,
}

impl GateKind {
    pub const ALL: [GateKind; 6] = [
        GateKind::H,
        GateKind::X,
        GateKind::Y,
        GateKind::Z,
        GateKind::CX,
        GateKind::Measure,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            GateKind::H => "H",
            GateKind::X => "X",
            GateKind::Y => "Y",
            GateKind::Z => "Z",
            GateKind::CX => "CX",
            GateKind::Measure => "M",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GateKind::H => "Hadamard",
            GateKind::X => "Pauli-X (NOT)",
            GateKind::Y => "Pauli-Y",
            GateKind::Z => "Pauli-Z",
            GateKind::CX => "CNOT",
            GateKind::Measure => "Measure",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            GateKind::H => "Superposition: puts a definite 0 or 1 into a 50/50 mix of both.",
            GateKind::X => "Flips the bit. Turns 0 into 1, and 1 into 0.",
            GateKind::Y => "A bit flip combined with a phase rotation.",
            GateKind::Z => "Phase flip: leaves 0 alone but flips the phase of 1. Crucial for interference.",
            GateKind::CX => "Entangle: if the control qubit is 1, the target bit is flipped.",
            GateKind::Measure => "Observation: collapses the quantum state into a classical 0 or 1.",
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Identifier of a gate, unique within the circuit that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GateId(u64);

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Gate {
    pub id: GateId,
    #[serde(rename = "type")]
    pub kind: GateKind,
    pub target_qubit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_qubit: Option<usize>,
    pub step: usize,
}

impl Gate {
    /// Lowest and highest qubit touched by the gate.
    pub fn span(&self) -> (usize, usize) {
        match self.control_qubit {
            Some(c) => (self.target_qubit.min(c), self.target_qubit.max(c)),
            None => (self.target_qubit, self.target_qubit),
        }
    }
}

/// A bounded grid of qubits × time steps populated with gates.
///
/// Mutations never modify the receiver: they return the updated circuit.
#[derive(Clone, Debug)]
pub struct Circuit {
    num_qubits: usize,
    steps: usize,
    gates: BTreeMap<GateId, Gate>,
    next_id: u64,
}

impl PartialEq for Circuit {
    fn eq(&self, other: &Self) -> bool {
        self.num_qubits == other.num_qubits && self.steps == other.steps && self.gates == other.gates
    }
}

impl Serialize for Circuit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Circuit", 3)?;
        s.serialize_field("numQubits", &self.num_qubits)?;
        s.serialize_field("steps", &self.steps)?;
        s.serialize_field("gates", &self.ordered_gates())?;
        s.end()
    }
}

impl Default for Circuit {
    fn default() -> Self {
        Self::initial()
    }
}

impl Circuit {
    pub fn new(num_qubits: usize, steps: usize) -> Self {
        Self {
            num_qubits: num_qubits.clamp(1, MAX_QUBITS),
            steps: steps.clamp(1, MAX_STEPS),
            gates: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// The circuit a new session starts with: a 3-qubit GHZ preparation.
    pub fn initial() -> Self {
        let mut circuit = Circuit::new(3, 6);
        circuit.insert(GateKind::H, 0, None, 0);
        circuit.insert(GateKind::CX, 1, Some(0), 1);
        circuit.insert(GateKind::CX, 2, Some(0), 2);
        circuit
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Gates ordered by step, then by target qubit.
    pub fn ordered_gates(&self) -> Vec<&Gate> {
        let mut gates: Vec<&Gate> = self.gates.values().collect();
        gates.sort_by_key(|g| (g.step, g.target_qubit));
        gates
    }

    pub fn gate_at(&self, target_qubit: usize, step: usize) -> Option<&Gate> {
        self.gates
            .values()
            .find(|g| g.target_qubit == target_qubit && g.step == step)
    }

    /// The controlled gate whose control sits on `qubit` at `step`, if any.
    pub fn control_at(&self, qubit: usize, step: usize) -> Option<&Gate> {
        self.gates
            .values()
            .find(|g| g.step == step && g.control_qubit == Some(qubit))
    }

    pub fn place_gate(&self, target_qubit: usize, step: usize, kind: GateKind) -> Circuit {
        let control = match kind {
            GateKind::CX if target_qubit > 0 => Some(target_qubit - 1),
            GateKind::CX => Some(target_qubit + 1),
            _ => None,
        };
        let mut next = self.clone();
        next.insert(kind, target_qubit, control, step);
        next
    }

    pub fn remove_gate(&self, id: GateId) -> Circuit {
        let mut next = self.clone();
        if next.gates.remove(&id).is_none() {
            debug!("remove_gate: {id} not present");
        }
        next
    }

    pub fn clear_gates(&self) -> Circuit {
        let mut next = self.clone();
        next.gates.clear();
        next
    }

    /// Changes the grid dimensions, dropping whatever no longer fits.
    pub fn resize(&self, num_qubits: usize, steps: usize) -> Circuit {
        let mut next = Circuit::new(num_qubits, steps);
        next.next_id = self.next_id;
        for gate in self.gates.values() {
            if gate.target_qubit >= next.num_qubits || gate.step >= next.steps {
                continue;
            }
            let mut kept = gate.clone();
            kept.control_qubit = next.normalize_control(kept.kind, kept.target_qubit, kept.control_qubit);
            next.gates.insert(kept.id, kept);
        }
        next
    }

    /// Inserts a gate, evicting whatever already targets the same slot.
    ///
    /// Out-of-grid slots are ignored and a control that is not valid for
    /// the gate kind is dropped.
    pub(crate) fn insert(
        &mut self,
        kind: GateKind,
        target_qubit: usize,
        control_qubit: Option<usize>,
        step: usize,
    ) -> Option<GateId> {
        if target_qubit >= self.num_qubits || step >= self.steps {
            debug!("insert: q{target_qubit}@{step} outside {}x{} grid", self.num_qubits, self.steps);
            return None;
        }
        self.gates
            .retain(|_, g| !(g.target_qubit == target_qubit && g.step == step));

        let id = GateId(self.next_id);
        self.next_id += 1;
        let control_qubit = self.normalize_control(kind, target_qubit, control_qubit);
        self.gates.insert(
            id,
            Gate {
                id,
                kind,
                target_qubit,
                control_qubit,
                step,
            },
        );
        Some(id)
    }

    fn normalize_control(&self, kind: GateKind, target: usize, control: Option<usize>) -> Option<usize> {
        if kind != GateKind::CX {
            return None;
        }
        control.filter(|&c| c != target && c < self.num_qubits)
    }

    /// One line per gate, as handed to the conversation oracle.
    pub fn summary(&self) -> Vec<String> {
        self.ordered_gates()
            .iter()
            .map(|g| format!("{} on qubit {} at step {}", g.kind, g.target_qubit, g.step))
            .collect()
    }

    pub fn cell_info(&self, qubit: usize, step: usize) -> CellInfo {
        let mut info = CellInfo {
            gate: self.gate_at(qubit, step).cloned(),
            is_control: self.control_at(qubit, step).is_some(),
            ..CellInfo::default()
        };

        // Vertical connections between control and target
        for g in self.gates.values() {
            if g.step != step || g.control_qubit.is_none() {
                continue;
            }
            let (min_q, max_q) = g.span();
            if qubit >= min_q && qubit <= max_q {
                if qubit > min_q {
                    info.vert_above = true;
                }
                if qubit < max_q {
                    info.vert_below = true;
                }
                if qubit > min_q && qubit < max_q && info.gate.is_none() && !info.is_control {
                    info.pass_through = true;
                }
            }
        }

        info
    }
}

#[derive(Clone, Debug, Default)]
pub struct CellInfo {
    pub gate: Option<Gate>,
    pub is_control: bool,
    pub vert_above: bool,
    pub vert_below: bool,
    pub pass_through: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_at(c: &Circuit, q: usize, s: usize) -> usize {
        c.ordered_gates()
            .iter()
            .filter(|g| g.target_qubit == q && g.step == s)
            .count()
    }

    #[test]
    fn place_gate_keeps_slot_exclusive() {
        let c = Circuit::new(3, 4);
        let c = c.place_gate(1, 2, GateKind::H);
        assert_eq!(count_at(&c, 1, 2), 1);

        let c = c.place_gate(1, 2, GateKind::X);
        assert_eq!(count_at(&c, 1, 2), 1);
        assert_eq!(c.gate_at(1, 2).map(|g| g.kind), Some(GateKind::X));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn place_gate_does_not_touch_the_original() {
        let c = Circuit::new(2, 2);
        let placed = c.place_gate(0, 0, GateKind::H);
        assert!(c.is_empty());
        assert_eq!(placed.len(), 1);
    }

    #[test]
    fn ids_are_unique_within_a_circuit() {
        let c = Circuit::new(2, 2)
            .place_gate(0, 0, GateKind::H)
            .place_gate(0, 0, GateKind::X)
            .place_gate(1, 1, GateKind::Z);
        let ids: Vec<GateId> = c.ordered_gates().iter().map(|g| g.id).collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn remove_unknown_gate_is_a_noop() {
        let c = Circuit::initial();
        let bogus = GateId(999);
        assert_eq!(c.remove_gate(bogus), c);
    }

    #[test]
    fn remove_gate_by_id() {
        let c = Circuit::new(2, 2).place_gate(0, 1, GateKind::Y);
        let id = c.gate_at(0, 1).map(|g| g.id).unwrap();
        let c = c.remove_gate(id);
        assert!(c.gate_at(0, 1).is_none());
    }

    #[test]
    fn cx_control_is_derived_from_target() {
        let c = Circuit::new(3, 3).place_gate(0, 0, GateKind::CX);
        assert_eq!(c.gate_at(0, 0).unwrap().control_qubit, Some(1));

        let c = c.place_gate(2, 1, GateKind::CX);
        assert_eq!(c.gate_at(2, 1).unwrap().control_qubit, Some(1));
    }

    #[test]
    fn cx_on_single_qubit_circuit_has_no_control() {
        let c = Circuit::new(1, 2).place_gate(0, 0, GateKind::CX);
        let gate = c.gate_at(0, 0).unwrap();
        assert_eq!(gate.kind, GateKind::CX);
        assert_eq!(gate.control_qubit, None);
    }

    #[test]
    fn non_cx_gates_never_carry_a_control() {
        let mut c = Circuit::new(3, 3);
        c.insert(GateKind::H, 1, Some(0), 0);
        assert_eq!(c.gate_at(1, 0).unwrap().control_qubit, None);
    }

    #[test]
    fn clear_keeps_dimensions() {
        let c = Circuit::initial().clear_gates();
        assert!(c.is_empty());
        assert_eq!((c.num_qubits(), c.steps()), (3, 6));
    }

    #[test]
    fn resize_drops_gates_and_controls_out_of_bounds() {
        let c = Circuit::initial().resize(2, 6);
        assert_eq!(c.len(), 2);
        assert!(c.gate_at(2, 2).is_none());
        assert_eq!(c.gate_at(1, 1).unwrap().control_qubit, Some(0));

        let c = Circuit::initial().resize(3, 2);
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn summary_lists_gates_in_step_order() {
        let summary = Circuit::initial().summary();
        assert_eq!(
            summary,
            vec![
                "H on qubit 0 at step 0",
                "CX on qubit 1 at step 1",
                "CX on qubit 2 at step 2",
            ]
        );
    }

    #[test]
    fn serializes_for_external_oracles() {
        let json = serde_json::to_value(Circuit::initial()).unwrap();
        assert_eq!(json["numQubits"], 3);
        assert_eq!(json["steps"], 6);
        assert_eq!(json["gates"][0]["type"], "H");
        assert!(json["gates"][0].get("controlQubit").is_none());
        assert_eq!(json["gates"][1]["controlQubit"], 0);
        assert_eq!(json["gates"][1]["targetQubit"], 1);
    }

    #[test]
    fn cell_info_draws_control_lines() {
        let c = Circuit::initial();
        let ctrl = c.cell_info(0, 2);
        assert!(ctrl.is_control);
        assert!(ctrl.vert_below);
        let middle = c.cell_info(1, 2);
        assert!(middle.pass_through);
        let target = c.cell_info(2, 2);
        assert!(target.vert_above && !target.vert_below);
    }
}
