use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Gauge, Paragraph};

use club_attendance::attendance::{AttendanceBoard, Group};
use club_attendance::config::{Config, open_store};
use club_attendance::model::RsvpState;
use club_attendance::provider::spawn_provider;
use club_attendance::roster::Position;
use club_attendance::state::{AppState, Delta, ProviderCommand, Screen, apply_delta};

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: mpsc::Sender<ProviderCommand>,
    config: Config,
    today: NaiveDate,
}

impl App {
    fn new(cmd_tx: mpsc::Sender<ProviderCommand>, config: Config) -> Self {
        Self {
            state: AppState::new(),
            should_quit: false,
            cmd_tx,
            config,
            today: Local::now().date_naive(),
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Char('r') => self.refresh(),
            _ => match self.state.screen {
                Screen::Summary => self.on_summary_key(key),
                Screen::Attendance => self.on_attendance_key(key),
            },
        }
    }

    fn on_summary_key(&mut self, key: KeyEvent) {
        if key.code != KeyCode::Enter {
            return;
        }
        if let Some(cmd) = self.state.open_selected() {
            let category = match &cmd {
                ProviderCommand::LoadBoard { category, .. } => Some(*category),
                _ => None,
            };
            self.send(cmd, "Attendance load");
            if let Some(category) = category
                && !self.state.scorers.contains_key(&category)
            {
                self.send(
                    ProviderCommand::FetchScorers {
                        category,
                        season: self.config.scorers_season.clone(),
                    },
                    "Scorers fetch",
                );
            }
        }
    }

    fn on_attendance_key(&mut self, key: KeyEvent) {
        let rsvp = match key.code {
            KeyCode::Char('b') | KeyCode::Esc => {
                self.state.close_board();
                return;
            }
            KeyCode::Char('x') => {
                if let Some(board) = self.state.board.as_mut() {
                    board.clear_save_error();
                }
                return;
            }
            KeyCode::Char('1') => RsvpState::Available,
            KeyCode::Char('2') => RsvpState::Tentative,
            KeyCode::Char('3') => RsvpState::Unavailable,
            _ => return,
        };
        if let Some(cmd) = self.state.request_rsvp(rsvp) {
            self.send(cmd, "Attendance save");
        }
    }

    fn refresh(&mut self) {
        match self.state.screen {
            Screen::Summary => self.request_summaries(),
            Screen::Attendance => {
                if let Some(cmd) = self.state.reload_board() {
                    self.send(cmd, "Attendance reload");
                }
            }
        }
    }

    fn request_summaries(&mut self) {
        self.today = Local::now().date_naive();
        let cmd = self
            .state
            .refresh_summaries(self.today, self.config.upcoming_limit);
        self.send(cmd, "Upcoming fetch");
    }

    fn send(&mut self, cmd: ProviderCommand, what: &str) {
        if self.cmd_tx.send(cmd).is_err() {
            self.state.push_log(format!("[WARN] {what} request failed"));
        }
    }
}

fn main() -> io::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(2);
        }
    };
    let store = match open_store(&config) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(2);
        }
    };

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    spawn_provider(store, tx, cmd_rx, config.fetch_parallelism);

    let mut app = App::new(cmd_tx, config);
    app.state
        .push_log(format!("[INFO] Backend: {}", app.config.backend_label()));
    app.request_summaries();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key);
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(4),
            Constraint::Length(2),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(app))
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match app.state.screen {
        Screen::Summary => render_summary(frame, chunks[1], &app.state),
        Screen::Attendance => render_attendance(frame, chunks[1], &app.state),
    }

    render_logs(frame, chunks[2], &app.state);

    let footer = Paragraph::new(footer_text(&app.state))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(app: &App) -> String {
    match app.state.screen {
        Screen::Summary => format!(
            "CLUB ATTENDANCE | Next matches | {}",
            app.today.format("%a %d %b %Y")
        ),
        Screen::Attendance => match app.state.board.as_ref() {
            Some(board) => format!(
                "CLUB ATTENDANCE | {} vs {} | {} {}",
                board.category().label(),
                board.fixture().opponent,
                board.fixture().date.format("%a %d %b"),
                board.fixture().kickoff_label()
            ),
            None => "CLUB ATTENDANCE | Loading...".to_string(),
        },
    }
}

fn footer_text(state: &AppState) -> String {
    match state.screen {
        Screen::Summary => "j/k/↑/↓ Move | Enter Attendance | r Refresh | ? Help | q Quit".to_string(),
        Screen::Attendance => {
            "1 Confirm | 2 Tentative | 3 Not playing | j/k Move | x Dismiss error | r Reload | b/Esc Back | q Quit"
                .to_string()
        }
    }
}

fn render_summary(frame: &mut Frame, area: Rect, state: &AppState) {
    if state.summaries.is_empty() {
        let msg = if state.summaries_loading {
            "Loading upcoming matches..."
        } else {
            "No categories loaded (r to refresh)"
        };
        let empty = Paragraph::new(msg).style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    }

    let mut lines = Vec::new();
    for (idx, summary) in state.summaries.iter().enumerate() {
        let selected = idx == state.selected;
        let style = if selected {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        } else {
            Style::default()
        };
        let detail = match (&summary.next_match, &summary.error) {
            (Some(m), _) => format!(
                "{} {}  vs {}  @ {}",
                m.date.format("%a %d %b"),
                m.kickoff_label(),
                m.opponent,
                m.venue.as_deref().unwrap_or("TBD")
            ),
            (None, Some(_)) => "fetch failed (see log)".to_string(),
            (None, None) => "no scheduled match".to_string(),
        };
        lines.push(Line::styled(
            format!("{:<24} {detail}", summary.category.label()),
            style,
        ));
    }
    frame.render_widget(Paragraph::new(lines), area);
}

fn render_attendance(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(board) = state.board.as_ref() else {
        let empty = Paragraph::new("Loading attendance...")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    };

    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
        ])
        .split(area);

    let metrics = board.metrics();
    let progress = Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan))
        .percent(metrics.responded_pct.min(100) as u16)
        .label(format!(
            "{}/{} answered ({}%)",
            metrics.responded, metrics.roster_size, metrics.responded_pct
        ));
    frame.render_widget(progress, sections[0]);

    let counts = format!(
        "Confirmed {} ({}%) | Tentative {} ({}%) | Not playing {} ({}%) | No answer {}",
        metrics.confirmed,
        metrics.confirmed_pct,
        metrics.tentative,
        metrics.tentative_pct,
        metrics.declined,
        metrics.declined_pct,
        metrics.unanswered
    );
    frame.render_widget(Paragraph::new(counts), sections[1]);

    let tally = Position::ALL
        .iter()
        .map(|&pos| {
            let t = metrics.position(pos);
            format!("{} {}/{}", pos.code(), t.confirmed, t.total)
        })
        .collect::<Vec<_>>()
        .join("  ");
    frame.render_widget(
        Paragraph::new(tally).style(Style::default().fg(Color::Gray)),
        sections[2],
    );

    let banner = board.load_error().or(board.save_error());
    if let Some(msg) = banner {
        frame.render_widget(
            Paragraph::new(msg.to_string()).style(Style::default().fg(Color::Red)),
            sections[3],
        );
    }

    render_board_list(frame, sections[4], state, board);
}

fn render_board_list(frame: &mut Frame, area: Rect, state: &AppState, board: &AttendanceBoard) {
    let rows = state.board_rows();
    if rows.is_empty() {
        let msg = if board.load_error().is_some() {
            "Roster unavailable"
        } else {
            "No players in this category"
        };
        let empty = Paragraph::new(msg).style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    }

    let links = state.board_scorer_links();
    let visible = area.height as usize;
    let (start, end) = visible_range(state.board_selected, rows.len(), visible);
    let mut lines = Vec::new();
    for (idx, (group, player)) in rows.iter().enumerate().take(end).skip(start) {
        let selected = idx == state.board_selected;
        let mut style = Style::default().fg(group_color(*group));
        if selected {
            style = style.bg(Color::DarkGray);
        }
        let pending = if board.is_pending(&player.id) { "…" } else { " " };
        let goals = match links.get(&player.id) {
            Some(link) if link.is_matched() => format!("{}G {}A", link.goals(), link.assists()),
            _ => String::new(),
        };
        lines.push(Line::styled(
            format!(
                "{pending}{:<12} {:>3} {:<4} {:<32} {goals}",
                group.label(),
                player.jersey_label(),
                player.effective_position().map_or("-", Position::code),
                player.display_name(),
            ),
            style,
        ));
    }
    frame.render_widget(Paragraph::new(lines), area);
}

fn group_color(group: Group) -> Color {
    match group {
        Group::Confirmed => Color::Green,
        Group::Tentative => Color::Yellow,
        Group::Declined => Color::Red,
        Group::Unanswered => Color::Gray,
    }
}

fn render_logs(frame: &mut Frame, area: Rect, state: &AppState) {
    let height = area.height.saturating_sub(1) as usize;
    let lines = state
        .logs
        .iter()
        .rev()
        .take(height)
        .rev()
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    let logs = Paragraph::new(lines)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::TOP).title("Log"));
    frame.render_widget(logs, area);
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Club Attendance - Help",
        "",
        "Global:",
        "  j/k or ↑/↓   Move",
        "  r            Refresh",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Next matches:",
        "  Enter        Open attendance",
        "",
        "Attendance:",
        "  1 / 2 / 3    Confirmed / Tentative / Not playing",
        "  x            Dismiss save error",
        "  b / Esc      Back",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
