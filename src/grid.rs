use log::debug;

use crate::circuit::{Circuit, GateKind};

/// What a cell activation did to the circuit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellOutcome {
    Placed(GateKind),
    Removed(GateKind),
    /// Empty slot and no gate tool selected.
    NoTool,
    /// The slot lies outside the grid.
    OutOfBounds,
    /// A run is in progress; the circuit is read-only.
    Locked,
}

impl CellOutcome {
    pub fn changed(self) -> bool {
        matches!(self, CellOutcome::Placed(_) | CellOutcome::Removed(_))
    }
}

/// Toggles the cell at `(target_qubit, step)`.
///
/// An occupied slot is always cleared, whatever tool is selected. An empty
/// slot receives a gate of the selected kind, or stays empty without one.
pub fn on_cell_activated(
    circuit: &Circuit,
    selected: Option<GateKind>,
    target_qubit: usize,
    step: usize,
) -> (Circuit, CellOutcome) {
    if target_qubit >= circuit.num_qubits() || step >= circuit.steps() {
        return (circuit.clone(), CellOutcome::OutOfBounds);
    }
    if let Some(existing) = circuit.gate_at(target_qubit, step) {
        let kind = existing.kind;
        return (circuit.remove_gate(existing.id), CellOutcome::Removed(kind));
    }
    match selected {
        Some(kind) => (
            circuit.place_gate(target_qubit, step, kind),
            CellOutcome::Placed(kind),
        ),
        None => (circuit.clone(), CellOutcome::NoTool),
    }
}

/// Cursor and gate tool of the circuit grid.
#[derive(Clone, Debug)]
pub struct GridController {
    pub cursor_qubit: usize,
    pub cursor_step: usize,
    pub selected: Option<GateKind>,
}

impl Default for GridController {
    fn default() -> Self {
        Self {
            cursor_qubit: 0,
            cursor_step: 0,
            selected: Some(GateKind::H),
        }
    }
}

impl GridController {
    /// Activates the cell under the cursor. `locked` is set while a run is
    /// in flight.
    pub fn activate(&self, circuit: &Circuit, locked: bool) -> (Circuit, CellOutcome) {
        if locked {
            debug!(
                "grid locked, ignoring q{}@{}",
                self.cursor_qubit, self.cursor_step
            );
            return (circuit.clone(), CellOutcome::Locked);
        }
        on_cell_activated(circuit, self.selected, self.cursor_qubit, self.cursor_step)
    }

    pub fn move_up(&mut self) {
        self.cursor_qubit = self.cursor_qubit.saturating_sub(1);
    }

    pub fn move_down(&mut self, circuit: &Circuit) {
        if self.cursor_qubit + 1 < circuit.num_qubits() {
            self.cursor_qubit += 1;
        }
    }

    pub fn move_left(&mut self) {
        self.cursor_step = self.cursor_step.saturating_sub(1);
    }

    pub fn move_right(&mut self, circuit: &Circuit) {
        if self.cursor_step + 1 < circuit.steps() {
            self.cursor_step += 1;
        }
    }

    /// Pulls the cursor back inside the grid after the circuit shrank.
    pub fn clamp_to(&mut self, circuit: &Circuit) {
        self.cursor_qubit = self.cursor_qubit.min(circuit.num_qubits() - 1);
        self.cursor_step = self.cursor_step.min(circuit.steps() - 1);
    }
}
