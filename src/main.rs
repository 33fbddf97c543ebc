use std::error::Error;
use std::fs::File;
use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use env_logger::{Env, Target};
use log::{error, info};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::task::LocalSet;

use q_tutor::app::{App, Focus};
use q_tutor::circuit::GateKind;
use q_tutor::config::Config;
use q_tutor::presets::PRESETS;
use q_tutor::render;

const FRAME: Duration = Duration::from_millis(30);

fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env()?;

    // The terminal belongs to the UI, so log lines go to a file
    let log_file = File::create(&config.log_file)?;
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(log_file)))
        .init();
    info!("starting with {config:?}");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = LocalSet::new();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = local.block_on(&runtime, run_app(&mut terminal, &config));

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        error!("terminal error: {e}");
        eprintln!("Error: {e}");
    }

    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    config: &Config,
) -> Result<(), io::Error> {
    let mut app = App::from_config(config);
    if config.run_on_start {
        app.request_run();
    }

    loop {
        app.pump();
        terminal.draw(|f| render::render(f, &app))?;

        // Yield to the run and conversation tasks between frames
        if !event::poll(Duration::ZERO)? {
            tokio::time::sleep(FRAME).await;
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        // Clear status message on any key
        app.status_msg.clear();

        let code = key.code;
        let mods = key.modifiers;

        // Global: Ctrl+C always quits
        if code == KeyCode::Char('c') && mods.contains(KeyModifiers::CONTROL) {
            return Ok(());
        }

        match app.focus {
            Focus::Circuit => {
                if handle_circuit_keys(&mut app, code) {
                    return Ok(());
                }
            }
            Focus::Chat => handle_chat_keys(&mut app, code),
            Focus::Presets => handle_preset_keys(&mut app, code),
        }
    }
}

// ── Focus::Circuit ─────────────────────────────────────────────────────────────

fn handle_circuit_keys(app: &mut App, code: KeyCode) -> bool {
    match code {
        KeyCode::Char('q') => return true,
        KeyCode::Tab => app.focus = Focus::Chat,
        KeyCode::Up | KeyCode::Char('k') => app.grid.move_up(),
        KeyCode::Down | KeyCode::Char('j') => app.grid.move_down(&app.circuit),
        KeyCode::Left | KeyCode::Char('h') => app.grid.move_left(),
        KeyCode::Right | KeyCode::Char('l') => app.grid.move_right(&app.circuit),
        KeyCode::Char(c @ '1'..='6') => {
            let idx = c as usize - '1' as usize;
            app.select_tool(Some(GateKind::ALL[idx]));
        }
        KeyCode::Char('0') => app.select_tool(None),
        KeyCode::Enter | KeyCode::Char(' ') => {
            app.activate_cell();
        }
        KeyCode::Char('r') => {
            app.request_run();
        }
        KeyCode::Char('p') => app.focus = Focus::Presets,
        KeyCode::Char('x') => app.clear_circuit(),
        KeyCode::Char('+') | KeyCode::Char('=') => app.resize(1, 0),
        KeyCode::Char('-') => app.resize(-1, 0),
        KeyCode::Char(']') => app.resize(0, 1),
        KeyCode::Char('[') => app.resize(0, -1),
        KeyCode::Char('v') => {
            app.show_statevector = !app.show_statevector;
            app.show_code = false;
        }
        KeyCode::Char('g') => app.show_code = !app.show_code,
        _ => {}
    }
    false
}

// ── Focus::Chat ────────────────────────────────────────────────────────────────

fn handle_chat_keys(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc | KeyCode::Tab => app.focus = Focus::Circuit,
        KeyCode::Enter => app.submit_chat(),
        KeyCode::Backspace => {
            app.chat_input.pop();
        }
        KeyCode::Char(c) => app.handle_char_input(c),
        _ => {}
    }
}

// ── Focus::Presets ─────────────────────────────────────────────────────────────

fn handle_preset_keys(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc => app.focus = Focus::Circuit,
        KeyCode::Up | KeyCode::Char('k') => {
            app.preset_idx = app.preset_idx.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if app.preset_idx + 1 < PRESETS.len() {
                app.preset_idx += 1;
            }
        }
        KeyCode::Enter => {
            app.load_preset(app.preset_idx);
            app.focus = Focus::Circuit;
        }
        _ => {}
    }
}
