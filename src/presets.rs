use crate::circuit::{Circuit, GateKind};

/// One gate of a preset: kind, target, control, step.
type PresetGate = (GateKind, usize, Option<usize>, usize);

#[derive(Clone, Debug)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    num_qubits: usize,
    steps: usize,
    gates: &'static [PresetGate],
}

impl Preset {
    pub fn circuit(&self) -> Circuit {
        let mut circuit = Circuit::new(self.num_qubits, self.steps);
        for &(kind, target, control, step) in self.gates {
            circuit.insert(kind, target, control, step);
        }
        circuit
    }
}

pub static PRESETS: &[Preset] = &[
    Preset {
        name: "Bell State",
        description: "Two qubits entangled: measuring one instantly tells you the other.",
        num_qubits: 2,
        steps: 4,
        gates: &[
            (GateKind::H, 0, None, 0),
            (GateKind::CX, 1, Some(0), 1),
            (GateKind::Measure, 0, None, 2),
            (GateKind::Measure, 1, None, 2),
        ],
    },
    Preset {
        name: "GHZ State",
        description: "Three-way entanglement: all qubits agree, 000 or 111.",
        num_qubits: 3,
        steps: 5,
        gates: &[
            (GateKind::H, 0, None, 0),
            (GateKind::CX, 1, Some(0), 1),
            (GateKind::CX, 2, Some(1), 2),
            (GateKind::Measure, 0, None, 3),
            (GateKind::Measure, 1, None, 3),
            (GateKind::Measure, 2, None, 3),
        ],
    },
    Preset {
        name: "Uniform Superposition",
        description: "A Hadamard on every wire spreads probability evenly over all states.",
        num_qubits: 3,
        steps: 3,
        gates: &[
            (GateKind::H, 0, None, 0),
            (GateKind::H, 1, None, 0),
            (GateKind::H, 2, None, 0),
            (GateKind::Measure, 0, None, 1),
            (GateKind::Measure, 1, None, 1),
            (GateKind::Measure, 2, None, 1),
        ],
    },
    Preset {
        name: "Interference",
        description: "H-Z-H: two superpositions cancel out and the qubit always reads 1.",
        num_qubits: 1,
        steps: 4,
        gates: &[
            (GateKind::H, 0, None, 0),
            (GateKind::Z, 0, None, 1),
            (GateKind::H, 0, None, 2),
            (GateKind::Measure, 0, None, 3),
        ],
    },
    Preset {
        name: "Bit Flip",
        description: "The quantum NOT: X turns |0⟩ into |1⟩ with certainty.",
        num_qubits: 2,
        steps: 3,
        gates: &[
            (GateKind::X, 0, None, 0),
            (GateKind::Measure, 0, None, 1),
            (GateKind::Measure, 1, None, 1),
        ],
    },
];

pub fn find(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.name == name)
}
