use crate::view::OverlayModel;
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        self,
        Event,
        KeyCode,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;
use tokio::sync::mpsc;
use unicode_width::UnicodeWidthStr;

const HELP_TEXT: &str = "b/Enter buy | r refresh | q/Esc quit";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Buy,
    Refresh,
    Redraw,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum StatusLine {
    #[default]
    Ready,
    Info(String),
    Error(String),
}

#[derive(Default)]
pub struct UiState {
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
    model: Option<OverlayModel>,
    status: StatusLine,
    purchase_pending: bool,
}

impl UiState {
    pub fn set_model(&mut self, model: OverlayModel) {
        self.model = Some(model);
    }

    pub fn model(&self) -> Option<&OverlayModel> {
        self.model.as_ref()
    }

    pub fn set_status(&mut self, status: StatusLine) {
        self.status = status;
    }

    pub fn set_purchase_pending(&mut self, pending: bool) {
        self.purchase_pending = pending;
    }

    pub fn purchase_pending(&self) -> bool {
        self.purchase_pending
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        let result = term.draw(|f| ui(f, state)).map(|_| ());
        state.terminal = Some(term);
        result?;
    }
    Ok(())
}

pub type InputEventReceiver = mpsc::UnboundedReceiver<std::io::Result<Event>>;

/// Reads terminal events on a dedicated thread so the async loop never blocks
/// on `event::read`.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            let ev = event::read();
            let failed = ev.is_err();
            if tx.send(ev).is_err() || failed {
                break;
            }
        }
    });
    rx
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.recv().await {
        Some(ev) => Ok(ev?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn interpret_event(event: Event) -> Option<UserEvent> {
    match event {
        Event::Key(k) if k.kind == KeyEventKind::Press => match k.code {
            KeyCode::Char('c') if k.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(UserEvent::Quit)
            }
            KeyCode::Char('q') | KeyCode::Esc => Some(UserEvent::Quit),
            KeyCode::Char('b') | KeyCode::Enter => Some(UserEvent::Buy),
            KeyCode::Char('r') => Some(UserEvent::Refresh),
            _ => None,
        },
        Event::Resize(_, _) => Some(UserEvent::Redraw),
        _ => None,
    }
}

fn ui(f: &mut Frame, state: &UiState) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(3), Constraint::Length(3)])
        .split(f.area());

    match &state.model {
        Some(model) => draw_panel(f, chunks[0], model, state.purchase_pending),
        None => {
            let loading = Paragraph::new("Waiting for account status...")
                .block(Block::default().borders(Borders::ALL).title("Charges"));
            f.render_widget(loading, chunks[0]);
        }
    }
    draw_status(f, chunks[1], &state.status);
    let help = Paragraph::new(HELP_TEXT)
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, chunks[2]);
}

/// Info panel anchored to the top-left corner, sized to its text.
fn draw_panel(f: &mut Frame, area: Rect, model: &OverlayModel, purchase_pending: bool) {
    let mut lines: Vec<Line> = model
        .info_lines
        .iter()
        .map(|line| Line::from(line.clone()).style(Style::default().bold()))
        .collect();
    if model.stale {
        lines.push(Line::from("(stale, waiting for refresh)").style(Style::default().fg(Color::Yellow)));
    }
    if model.purchase.visible {
        lines.push(Line::from(""));
        lines.push(button_line(&model.purchase.label, model.purchase.enabled, purchase_pending));
    }

    let text_width = lines.iter().map(Line::width).max().unwrap_or(0);
    let title = format!("Charges | {} droplets", model.droplets);
    let width = (text_width.max(title.width()) as u16 + 4).min(area.width);
    let height = (lines.len() as u16 + 2).min(area.height);
    let panel = Rect {
        x: area.x,
        y: area.y,
        width,
        height,
    };

    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(Color::White).bg(Color::Black));
    f.render_widget(widget, panel);
}

fn button_line(label: &str, enabled: bool, pending: bool) -> Line<'static> {
    let text = if pending {
        "[ Buying... ]".to_string()
    } else {
        format!("[ {label} ]")
    };
    let style = if enabled && !pending {
        Style::default().fg(Color::Black).bg(Color::White).bold()
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Line::from(Span::styled(text, style))
}

fn draw_status(f: &mut Frame, area: Rect, status: &StatusLine) {
    let (text, title, color) = match status {
        StatusLine::Ready => ("Ready".to_string(), "Status", Color::Green),
        StatusLine::Info(msg) => (msg.clone(), "Status", Color::Green),
        StatusLine::Error(msg) => (msg.clone(), "Error", Color::Red),
    };
    let widget = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(color));
    f.render_widget(widget, area);
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        snapshot::AccountSnapshot,
        store::RefreshState,
    };
    use crossterm::event::{
        KeyEvent,
        KeyEventState,
    };
    use ratatui::backend::TestBackend;

    fn model(count: f64, max: u64, droplets: u64) -> OverlayModel {
        let refresh = RefreshState {
            snapshot: AccountSnapshot::new(count, max, 30_000, droplets),
            fetched_at_ms: 0,
        };
        OverlayModel::build(&refresh, 0, 30_000)
    }

    fn render(state: &UiState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 16)).unwrap();
        terminal.draw(|f| ui(f, state)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn press(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn draw__shows_full_text_and_enabled_button() {
        // given
        let mut state = UiState::default();
        state.set_model(model(5.0, 5, 1_000));

        // when
        let screen = render(&state);

        // then
        assert!(screen.contains("Currently full!"));
        assert!(screen.contains("Can buy +10 max charge upgrades (1000 droplets)"));
        assert!(screen.contains("[ Buy max charges ]"));
        assert!(screen.contains("1000 droplets"));
    }

    #[test]
    fn draw__shows_countdown_and_hides_unaffordable_button() {
        let mut state = UiState::default();
        state.set_model(model(4.0, 5, 10));

        let screen = render(&state);

        assert!(screen.contains("0:30 until full"));
        assert!(!screen.contains("Buy max charges"));
    }

    #[test]
    fn draw__shows_placeholder_and_error_status_before_first_model() {
        let mut state = UiState::default();
        state.set_status(StatusLine::Error("status fetch failed".to_string()));

        let screen = render(&state);

        assert!(screen.contains("Waiting for account status..."));
        assert!(screen.contains("status fetch failed"));
    }

    #[test]
    fn draw__without_terminal_is_a_noop() {
        // given
        let mut state = UiState::default();
        state.set_model(model(3.0, 5, 0));

        // when
        let result = draw(&mut state);

        // then
        assert!(result.is_ok());
        assert!(state.terminal.is_none());
    }

    #[test]
    fn interpret_event__maps_keys_to_user_events() {
        assert_eq!(
            interpret_event(press(KeyCode::Char('b'), KeyModifiers::NONE)),
            Some(UserEvent::Buy)
        );
        assert_eq!(
            interpret_event(press(KeyCode::Enter, KeyModifiers::NONE)),
            Some(UserEvent::Buy)
        );
        assert_eq!(
            interpret_event(press(KeyCode::Char('r'), KeyModifiers::NONE)),
            Some(UserEvent::Refresh)
        );
        assert_eq!(
            interpret_event(press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(UserEvent::Quit)
        );
        assert_eq!(
            interpret_event(press(KeyCode::Esc, KeyModifiers::NONE)),
            Some(UserEvent::Quit)
        );
        assert_eq!(interpret_event(press(KeyCode::Char('x'), KeyModifiers::NONE)), None);
        assert_eq!(interpret_event(Event::Resize(10, 10)), Some(UserEvent::Redraw));
    }
}
