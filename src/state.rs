use std::collections::{HashMap, VecDeque};

use chrono::NaiveDate;

use crate::attendance::{AttendanceBoard, Group, PendingUpdate, UpdateOutcome};
use crate::fixture::CategorySummary;
use crate::model::{Category, Match, RsvpState};
use crate::roster::Player;
use crate::scorers::{ScorerIndex, ScorerLine, ScorerLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Summary,
    Attendance,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub screen: Screen,
    pub summaries: Vec<CategorySummary>,
    pub summaries_loading: bool,
    pub selected: usize,
    pub board: Option<AttendanceBoard>,
    /// Match id of the board the worker is loading, if any.
    pub board_request: Option<String>,
    pub board_selected: usize,
    pub scorers: HashMap<Category, Vec<ScorerLine>>,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            screen: Screen::Summary,
            summaries: Vec::new(),
            summaries_loading: false,
            selected: 0,
            board: None,
            board_request: None,
            board_selected: 0,
            scorers: HashMap::new(),
            logs: VecDeque::new(),
            help_overlay: false,
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn selected_summary(&self) -> Option<&CategorySummary> {
        self.summaries.get(self.selected)
    }

    pub fn refresh_summaries(&mut self, today: NaiveDate, limit: usize) -> ProviderCommand {
        self.summaries_loading = true;
        ProviderCommand::FetchSummaries { today, limit }
    }

    /// Switches to the attendance screen for the selected category and
    /// returns the load to send, or `None` when it has no scheduled match.
    pub fn open_selected(&mut self) -> Option<ProviderCommand> {
        let summary = self.selected_summary()?.clone();
        let Some(fixture) = summary.next_match else {
            self.push_log(format!(
                "[INFO] {} has no scheduled match",
                summary.category.label()
            ));
            return None;
        };
        self.screen = Screen::Attendance;
        // The same match stays up until the reload lands so its pending
        // writes carry over.
        if self
            .board
            .as_ref()
            .is_some_and(|b| b.match_id() != fixture.id)
        {
            self.board = None;
        }
        self.board_selected = 0;
        self.board_request = Some(fixture.id.clone());
        Some(ProviderCommand::LoadBoard {
            category: summary.category,
            fixture,
        })
    }

    /// Reloads the current board from the store. Writes still in flight are
    /// carried onto the reloaded board when it arrives.
    pub fn reload_board(&mut self) -> Option<ProviderCommand> {
        let board = self.board.as_ref()?;
        let category = board.category();
        let fixture = board.fixture().clone();
        self.board_request = Some(fixture.id.clone());
        Some(ProviderCommand::LoadBoard { category, fixture })
    }

    pub fn close_board(&mut self) {
        self.screen = Screen::Summary;
        self.board_request = None;
    }

    /// Board rows in display order: group by group, each sorted by name.
    pub fn board_rows(&self) -> Vec<(Group, &Player)> {
        self.board
            .as_ref()
            .map(|board| board.groups().flatten())
            .unwrap_or_default()
    }

    pub fn selected_player_id(&self) -> Option<String> {
        self.board_rows()
            .get(self.board_selected)
            .map(|(_, p)| p.id.clone())
    }

    /// Scorer links for the board's roster, keyed by player id.
    pub fn board_scorer_links(&self) -> HashMap<String, ScorerLink> {
        let Some(board) = self.board.as_ref() else {
            return HashMap::new();
        };
        let Some(lines) = self.scorers.get(&board.category()) else {
            return HashMap::new();
        };
        let index = ScorerIndex::build(lines);
        board
            .roster()
            .iter()
            .map(|p| (p.id.clone(), index.link(p)))
            .collect()
    }

    /// Starts an optimistic RSVP for the selected player. Refused while that
    /// player's previous write is still in flight.
    pub fn request_rsvp(&mut self, rsvp: RsvpState) -> Option<ProviderCommand> {
        let player_id = self.selected_player_id()?;
        let board = self.board.as_mut()?;
        if board.is_pending(&player_id) {
            let name = board
                .player(&player_id)
                .map(Player::display_name)
                .unwrap_or_else(|| player_id.clone());
            self.push_log(format!("[INFO] Still saving {name}; try again shortly"));
            return None;
        }
        let update = board.begin_update(&player_id, rsvp);
        self.reselect_player(&player_id);
        Some(ProviderCommand::SaveAttendance(update))
    }

    fn reselect_player(&mut self, player_id: &str) {
        if let Some(idx) = self
            .board_rows()
            .iter()
            .position(|(_, p)| p.id == player_id)
        {
            self.board_selected = idx;
        }
        self.clamp_selection();
    }

    pub fn select_next(&mut self) {
        let total = self.list_len();
        let selected = self.selection_mut();
        if total == 0 {
            *selected = 0;
            return;
        }
        *selected = (*selected + 1) % total;
    }

    pub fn select_prev(&mut self) {
        let total = self.list_len();
        let selected = self.selection_mut();
        if total == 0 {
            *selected = 0;
            return;
        }
        if *selected == 0 {
            *selected = total - 1;
        } else {
            *selected -= 1;
        }
    }

    pub fn clamp_selection(&mut self) {
        let total = self.list_len();
        let selected = self.selection_mut();
        if total == 0 {
            *selected = 0;
        } else if *selected >= total {
            *selected = total - 1;
        }
    }

    fn list_len(&self) -> usize {
        match self.screen {
            Screen::Summary => self.summaries.len(),
            Screen::Attendance => self.board.as_ref().map_or(0, |b| b.roster().len()),
        }
    }

    fn selection_mut(&mut self) -> &mut usize {
        match self.screen {
            Screen::Summary => &mut self.selected,
            Screen::Attendance => &mut self.board_selected,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Delta {
    SetSummaries(Vec<CategorySummary>),
    SetBoard(AttendanceBoard),
    SetScorers {
        category: Category,
        lines: Vec<ScorerLine>,
    },
    AttendanceSaved(PendingUpdate),
    AttendanceFailed {
        update: PendingUpdate,
        error: String,
    },
    Log(String),
}

#[derive(Debug, Clone)]
pub enum ProviderCommand {
    FetchSummaries { today: NaiveDate, limit: usize },
    LoadBoard { category: Category, fixture: Match },
    SaveAttendance(PendingUpdate),
    FetchScorers { category: Category, season: String },
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::SetSummaries(summaries) => {
            for summary in &summaries {
                if let Some(err) = &summary.error {
                    state.push_log(format!(
                        "[WARN] Upcoming fetch failed for {}: {err}",
                        summary.category.label()
                    ));
                }
            }
            state.summaries = summaries;
            state.summaries_loading = false;
            if state.screen == Screen::Summary {
                state.clamp_selection();
            } else {
                state.selected = state.selected.min(state.summaries.len().saturating_sub(1));
            }
        }
        Delta::SetBoard(mut board) => {
            if state.board_request.as_deref() != Some(board.match_id()) {
                state.push_log(format!(
                    "[INFO] Dropped board for match {} (no longer open)",
                    board.match_id()
                ));
                return;
            }
            if let Some(err) = board.load_error() {
                state.push_log(format!("[WARN] Attendance load failed: {err}"));
            }
            if let Some(older) = state.board.as_ref() {
                board.carry_in_flight(older);
            }
            let keep = state.selected_player_id();
            state.board_request = None;
            state.board = Some(board);
            match keep {
                Some(id) => state.reselect_player(&id),
                None => state.clamp_selection(),
            }
        }
        Delta::SetScorers { category, lines } => {
            state.scorers.insert(category, lines);
        }
        Delta::AttendanceSaved(update) => resolve_update(state, &update, Ok(())),
        Delta::AttendanceFailed { update, error } => {
            resolve_update(state, &update, Err(error));
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}

fn resolve_update(state: &mut AppState, update: &PendingUpdate, result: Result<(), String>) {
    let keep = state.selected_player_id();
    let (outcome, who) = match state.board.as_mut() {
        Some(board) => {
            let outcome = board.resolve(update, result.clone());
            (outcome, board.display_name_of(&update.player_id))
        }
        None => (UpdateOutcome::Stale, update.player_id.clone()),
    };
    let msg = match (&outcome, result) {
        (UpdateOutcome::RolledBack { .. }, Err(cause)) => state
            .board
            .as_ref()
            .and_then(AttendanceBoard::save_error)
            .map(|e| format!("[WARN] {e}"))
            .unwrap_or_else(|| format!("[WARN] Could not save attendance for {who}: {cause}")),
        (UpdateOutcome::Superseded, Err(cause)) => format!(
            "[WARN] Could not save an older answer for {who}: {cause}; newer answer kept"
        ),
        (UpdateOutcome::Superseded, Ok(())) => {
            format!("[INFO] Newer answer for {who} already applied")
        }
        // No board for this write's match; the log is all that is left.
        (UpdateOutcome::Stale, Err(cause)) => format!(
            "[WARN] Could not save attendance for {who} (match {}): {cause}",
            update.match_id
        ),
        (_, _) => format!("[INFO] Saved {} for {who}", update.requested.label()),
    };
    state.push_log(msg);
    if let Some(id) = keep {
        state.reselect_player(&id);
    }
}
