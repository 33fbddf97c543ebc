use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Focus};
use crate::chat::{Message, Role, NOT_RUN_YET};
use crate::circuit::{CellInfo, Circuit, Gate, GateKind};
use crate::markup::{self, Segment};
use crate::presets::PRESETS;
use crate::run::RunState;

// ── Colors ─────────────────────────────────────────────────────────────────

const BLUE: Color = Color::Rgb(122, 162, 247);
const PURPLE: Color = Color::Rgb(187, 154, 247);
const GREEN: Color = Color::Rgb(158, 206, 106);
const ORANGE: Color = Color::Rgb(255, 158, 100);
const CYAN: Color = Color::Rgb(115, 218, 202);
const YELLOW: Color = Color::Rgb(224, 175, 104);
const DIM: Color = Color::Rgb(86, 95, 137);
const RED: Color = Color::Rgb(247, 118, 142);
const DARK_BLUE: Color = Color::Rgb(192, 202, 245);

// ── Layout constants ────────────────────────────────────────────────────────

const CELL_W: usize = 9;
const LABEL_W: usize = 7; // "q0   ──"
const GATE_NAME_W: usize = 3;

// ── Main render entry point ─────────────────────────────────────────────────

pub fn render(f: &mut Frame, app: &App) {
    let size = f.area();

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(3)])
        .split(size);

    // Top row: [left_col, chat]
    let chat_w = ((size.width / 3) as usize).max(32).min(size.width.saturating_sub(20) as usize) as u16;
    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(chat_w)])
        .split(main_chunks[0]);

    // Left column: [palette, circuit, results]
    let circuit_h = (app.circuit.num_qubits() * 3 + 4) as u16;
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(circuit_h),
            Constraint::Min(6),
        ])
        .split(top_chunks[0]);

    render_palette(f, app, left_chunks[0]);
    render_circuit_panel(f, app, left_chunks[1]);
    render_results_panel(f, app, left_chunks[2]);
    render_chat_panel(f, app, top_chunks[1]);
    render_controls_panel(f, app, main_chunks[1]);

    if app.focus == Focus::Presets {
        render_presets_overlay(f, app);
    }
}

// ── Gate palette ───────────────────────────────────────────────────────────

fn render_palette(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BLUE))
        .title(Span::styled("Gates", Style::default().fg(ORANGE).add_modifier(Modifier::BOLD)));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut spans: Vec<Span> = Vec::new();
    for (i, kind) in GateKind::ALL.iter().enumerate() {
        let label = format!(" {} {} ", i + 1, kind.symbol());
        if app.grid.selected == Some(*kind) {
            spans.push(Span::styled(
                label,
                Style::default().fg(Color::Black).bg(ORANGE).add_modifier(Modifier::BOLD),
            ));
        } else {
            spans.push(Span::styled(label, Style::default().fg(CYAN)));
        }
        spans.push(Span::raw(" "));
    }
    match app.grid.selected {
        Some(kind) => spans.push(Span::styled(
            format!(" {}: {}", kind.name(), kind.description()),
            Style::default().fg(DIM),
        )),
        None => spans.push(Span::styled(" no gate selected", Style::default().fg(DIM))),
    }

    f.render_widget(Paragraph::new(Line::from(spans)), inner);
}

// ── Circuit Panel ─────────────────────────────────────────────────────────────

fn render_circuit_panel(f: &mut Frame, app: &App, area: Rect) {
    let border_color = if app.focus == Focus::Circuit { ORANGE } else { BLUE };
    let title = if app.is_running() {
        "Quantum Circuit [RUNNING]"
    } else {
        "Quantum Circuit"
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(Span::styled(title, Style::default().fg(ORANGE).add_modifier(Modifier::BOLD)));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let lines = build_circuit_lines(app, &app.circuit);
    f.render_widget(Paragraph::new(Text::from(lines)), inner);
}

fn build_circuit_lines(app: &App, circuit: &Circuit) -> Vec<Line<'static>> {
    let scan = match app.run_state() {
        RunState::Running(step) => Some(step),
        RunState::Idle => None,
    };
    let mut lines: Vec<Line> = Vec::new();

    // Step numbers header
    let mut header = vec![Span::raw(" ".repeat(LABEL_W))];
    for step in 0..circuit.steps() {
        let style = if scan == Some(step) {
            Style::default().fg(CYAN).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(DIM)
        };
        header.push(Span::styled(pad_center(&step.to_string(), CELL_W), style));
    }
    lines.push(Line::from(header));

    for qubit in 0..circuit.num_qubits() {
        let label_style = Style::default().fg(DARK_BLUE);
        let mut top = vec![Span::raw(" ".repeat(LABEL_W))];
        let mut mid = vec![Span::styled(format!("{:<5}──", format!("q{qubit}")), label_style)];
        let mut bot = vec![Span::raw(" ".repeat(LABEL_W))];

        for step in 0..circuit.steps() {
            let info = circuit.cell_info(qubit, step);
            let is_cursor = app.focus == Focus::Circuit
                && step == app.grid.cursor_step
                && qubit == app.grid.cursor_qubit;
            let (t, m, b) = render_cell(&info, is_cursor);

            let style = if is_cursor {
                Style::default().fg(ORANGE).add_modifier(Modifier::BOLD)
            } else if scan == Some(step) {
                Style::default().fg(CYAN).add_modifier(Modifier::BOLD)
            } else if info.gate.is_some() || info.is_control {
                Style::default().fg(PURPLE)
            } else {
                Style::default().fg(DARK_BLUE)
            };
            top.push(Span::styled(t, style));
            mid.push(Span::styled(m, style));
            bot.push(Span::styled(b, style));
        }

        lines.push(Line::from(top));
        lines.push(Line::from(mid));
        lines.push(Line::from(bot));
    }

    let mut status = format!(
        "  Position: Step {}, Qubit {}",
        app.grid.cursor_step, app.grid.cursor_qubit
    );
    if !app.status_msg.is_empty() {
        status.push_str(&format!("  │  {}", app.status_msg));
    }
    lines.push(Line::styled(status, Style::default().fg(DIM)));

    lines
}

fn render_cell(info: &CellInfo, is_cursor: bool) -> (String, String, String) {
    let empty = " ".repeat(CELL_W);
    let half = CELL_W / 2;
    let vert_row = " ".repeat(half) + "│" + &" ".repeat(CELL_W - half - 1);

    let dash_l = (CELL_W - 1) / 2;
    let dash_r = CELL_W - dash_l - 1;

    if is_cursor {
        let inner_w = CELL_W - 2;
        let dleft = (inner_w - 1) / 2;
        let dright = inner_w - dleft - 1;
        let top = format!("╔{}╗", "═".repeat(inner_w));
        let bot = format!("╚{}╝", "═".repeat(inner_w));

        let mid = if let (true, Some(gate)) = (info.is_control, &info.gate) {
            format!("║●┤{}├─║", pad_center(cell_symbol(gate), GATE_NAME_W))
        } else if info.is_control {
            format!("║{}●{}║", "─".repeat(dleft), "─".repeat(dright))
        } else if let Some(gate) = &info.gate {
            if gate.kind == GateKind::CX && gate.control_qubit.is_some() {
                format!("║{}⊕{}║", "─".repeat(dleft), "─".repeat(dright))
            } else {
                format!("║─{}─║", pad_center(gate.kind.symbol(), GATE_NAME_W + 2))
            }
        } else if info.pass_through {
            format!("║{}┼{}║", "─".repeat(dleft), "─".repeat(dright))
        } else {
            format!("║{}║", "─".repeat(inner_w))
        };
        return (top, mid, bot);
    }

    let top = if info.vert_above { vert_row.clone() } else { empty.clone() };
    let bot = if info.vert_below { vert_row.clone() } else { empty.clone() };

    // A control and a gate targeting the same qubit share the cell
    if let (true, Some(gate)) = (info.is_control, &info.gate) {
        let mid = format!("─●┤{}├──", pad_center(cell_symbol(gate), GATE_NAME_W));
        return (top, mid, bot);
    }

    if info.is_control {
        let mid = "─".repeat(dash_l) + "●" + &"─".repeat(dash_r);
        return (top, mid, bot);
    }

    if let Some(gate) = &info.gate {
        if gate.kind == GateKind::CX && gate.control_qubit.is_some() {
            let mid = "─".repeat(dash_l) + "⊕" + &"─".repeat(dash_r);
            return (top, mid, bot);
        }
        // Single-qubit gate box
        let margin = (CELL_W - GATE_NAME_W - 2) / 2;
        let rmargin = CELL_W - margin - GATE_NAME_W - 2;
        let name = pad_center(gate.kind.symbol(), GATE_NAME_W);
        let top = " ".repeat(margin) + "┌" + &"─".repeat(GATE_NAME_W) + "┐" + &" ".repeat(rmargin);
        let mid = "─".repeat(margin) + "┤" + &name + "├" + &"─".repeat(rmargin);
        let bot = " ".repeat(margin) + "└" + &"─".repeat(GATE_NAME_W) + "┘" + &" ".repeat(rmargin);
        return (top, mid, bot);
    }

    if info.pass_through {
        let mid = "─".repeat(dash_l) + "┼" + &"─".repeat(dash_r);
        return (top, mid, bot);
    }

    // Empty wire
    (top, "─".repeat(CELL_W), bot)
}

fn cell_symbol(gate: &Gate) -> &'static str {
    if gate.kind == GateKind::CX && gate.control_qubit.is_some() {
        "⊕"
    } else {
        gate.kind.symbol()
    }
}

fn pad_center(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.chars().take(width).collect();
    }
    let total = width - len;
    let left = total / 2;
    let right = total - left;
    " ".repeat(left) + s + &" ".repeat(right)
}

// ── Results Panel ─────────────────────────────────────────────────────────────

fn render_results_panel(f: &mut Frame, app: &App, area: Rect) {
    let title = if app.show_code {
        "Generated Code"
    } else if app.show_statevector {
        "State Vector"
    } else {
        "Probabilities"
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(RED))
        .title(Span::styled(title, Style::default().fg(ORANGE).add_modifier(Modifier::BOLD)));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut text_lines: Vec<Line> = Vec::new();

    if let RunState::Running(step) = app.run_state() {
        text_lines.push(Line::styled(
            format!(
                "Running… step {}/{}  (estimated {})",
                step + 1,
                app.circuit.steps(),
                app.estimated_time_label()
            ),
            Style::default().fg(CYAN),
        ));
        text_lines.push(Line::default());
    }

    let Some(result) = app.result.as_deref() else {
        text_lines.push(Line::styled(
            format!("{NOT_RUN_YET}. Press r to run (estimated {}).", app.estimated_time_label()),
            Style::default().fg(DIM),
        ));
        f.render_widget(Paragraph::new(Text::from(text_lines)), inner);
        return;
    };

    if result.is_degraded() {
        text_lines.push(Line::styled(
            "Simulation failed: no data for this run.",
            Style::default().fg(RED).add_modifier(Modifier::BOLD),
        ));
    }

    if app.show_code {
        for line in markup::sanitize(&result.generated_code).lines() {
            text_lines.push(Line::styled(line.to_string(), Style::default().fg(DARK_BLUE)));
        }
    } else if app.show_statevector {
        for amp in &result.state_vector {
            text_lines.push(Line::styled(
                format!(
                    "{}: {:+.4} {:+.4}i",
                    markup::sanitize(&amp.label),
                    amp.real,
                    amp.imag
                ),
                Style::default().fg(YELLOW),
            ));
        }
    } else {
        let bar_width = (inner.width as usize).saturating_sub(24).max(10);
        for p in &result.probabilities {
            let fill = ((p.probability * bar_width as f64).round() as usize).min(bar_width);
            let bar = "█".repeat(fill) + &"░".repeat(bar_width - fill);
            text_lines.push(Line::styled(
                format!("{}: P={:.2} [{}]", markup::sanitize(&p.state), p.probability, bar),
                Style::default().fg(YELLOW),
            ));
        }
    }

    // Footer
    text_lines.push(Line::default());
    let time = if result.execution_time_label.is_empty() {
        "-".to_string()
    } else {
        markup::sanitize(&result.execution_time_label)
    };
    text_lines.push(Line::styled(
        format!("Exec time: {time}  Fidelity: {:.2}", result.fidelity),
        Style::default().fg(DIM),
    ));

    let p = Paragraph::new(Text::from(text_lines)).wrap(Wrap { trim: false });
    f.render_widget(p, inner);
}

// ── Chat Panel ─────────────────────────────────────────────────────────────

fn render_chat_panel(f: &mut Frame, app: &App, area: Rect) {
    let active = app.focus == Focus::Chat;
    let border_color = if active { ORANGE } else { PURPLE };
    let title = if active { "Quantum Tutor [TYPING]" } else { "Quantum Tutor" };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(Span::styled(title, Style::default().fg(ORANGE).add_modifier(Modifier::BOLD)));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(2)])
        .split(inner);

    let mut lines = app.conversation.with_messages(message_lines);
    if app.conversation.is_waiting() {
        lines.push(Line::styled("tutor is thinking…", Style::default().fg(DIM)));
    }

    // Keep the newest messages in view
    let width = chunks[0].width.max(1) as usize;
    let rows: usize = lines
        .iter()
        .map(|l| l.width().div_ceil(width).max(1))
        .sum();
    let scroll = rows.saturating_sub(chunks[0].height as usize) as u16;
    let history = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(history, chunks[0]);

    let input = if active {
        Line::from(vec![
            Span::styled("> ", Style::default().fg(ORANGE)),
            Span::styled(app.chat_input.clone(), Style::default().fg(DARK_BLUE)),
            Span::styled("_", Style::default().fg(ORANGE)),
        ])
    } else {
        Line::styled("Tab to ask the tutor", Style::default().fg(DIM))
    };
    let input_box = Paragraph::new(input).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(DIM)),
    );
    f.render_widget(input_box, chunks[1]);
}

fn message_lines(messages: &[Message]) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    for message in messages {
        let (who, color) = match message.role {
            Role::User => ("you", CYAN),
            Role::Assistant => ("tutor", GREEN),
        };
        lines.push(Line::styled(
            format!("{who}:"),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
        for segments in markup::parse(&message.text) {
            let spans: Vec<Span> = segments
                .into_iter()
                .map(|segment| match segment {
                    Segment::Plain(s) => Span::styled(s, Style::default().fg(DARK_BLUE)),
                    Segment::Bold(s) => {
                        Span::styled(s, Style::default().fg(YELLOW).add_modifier(Modifier::BOLD))
                    }
                })
                .collect();
            lines.push(Line::from(spans));
        }
        lines.push(Line::default());
    }
    lines
}

// ── Controls Panel ─────────────────────────────────────────────────────────────

fn render_controls_panel(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(GREEN));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let help = match app.focus {
        Focus::Chat => "Chat:  Type a question  ⏎ Send  Esc/Tab Back to circuit",
        Focus::Presets => "Presets:  ↑↓ Select  ⏎ Load  Esc ✕",
        Focus::Circuit => {
            "Nav: ↑↓←→/hjkl  1-6 Gate  0 None  ⏎/Space Place  r Run  p Presets  x Clear  +/- Qubits  ]/[ Steps  v Vector  g Code  Tab Chat  q Quit"
        }
    };

    let p = Paragraph::new(Span::styled(help, Style::default().fg(YELLOW)));
    f.render_widget(p, inner);
}

// ── Presets Overlay ──────────────────────────────────────────────────────────

fn render_presets_overlay(f: &mut Frame, app: &App) {
    let area = overlay_rect(f.area(), 64, (PRESETS.len() * 2 + 4) as u16);
    f.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ORANGE))
        .title(Span::styled("Presets", Style::default().fg(ORANGE).add_modifier(Modifier::BOLD)));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();
    for (i, preset) in PRESETS.iter().enumerate() {
        if i == app.preset_idx {
            lines.push(Line::styled(
                format!(" ▸ {}", preset.name),
                Style::default().fg(ORANGE).add_modifier(Modifier::BOLD),
            ));
        } else {
            lines.push(Line::styled(format!("   {}", preset.name), Style::default().fg(DARK_BLUE)));
        }
        lines.push(Line::styled(format!("     {}", preset.description), Style::default().fg(DIM)));
    }
    lines.push(Line::default());
    lines.push(Line::styled("↑↓ Select  ⏎ Load  Esc ✕", Style::default().fg(DIM)));

    f.render_widget(Paragraph::new(Text::from(lines)), inner);
}

// ── Overlay rect helper ────────────────────────────────────────────────────────

fn overlay_rect(screen: Rect, min_w: u16, min_h: u16) -> Rect {
    let w = min_w.min(screen.width.saturating_sub(4));
    let h = min_h.min(screen.height.saturating_sub(4));
    Rect {
        x: 2,
        y: 2,
        width: w,
        height: h,
    }
}
