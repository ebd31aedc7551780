use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};

use crate::model::{AttendanceRecord, Category, Match, RsvpState};
use crate::names::collation_key;
use crate::roster::{Player, Position};
use crate::store::ClubStore;

/// player id -> explicit RSVP. Missing key means unclassified.
pub type RsvpMap = HashMap<String, RsvpState>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Confirmed,
    Tentative,
    Declined,
    Unanswered,
}

impl Group {
    /// Display order of the sections.
    pub const ALL: [Group; 4] = [
        Group::Confirmed,
        Group::Tentative,
        Group::Declined,
        Group::Unanswered,
    ];

    pub fn of(state: Option<RsvpState>) -> Group {
        match state {
            Some(RsvpState::Available) => Group::Confirmed,
            Some(RsvpState::Tentative) => Group::Tentative,
            Some(RsvpState::Unavailable) => Group::Declined,
            None => Group::Unanswered,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Group::Confirmed => "Confirmed",
            Group::Tentative => "Tentative",
            Group::Declined => "Not coming",
            Group::Unanswered => "No answer yet",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceGroups<'a> {
    pub confirmed: Vec<&'a Player>,
    pub tentative: Vec<&'a Player>,
    pub declined: Vec<&'a Player>,
    pub unanswered: Vec<&'a Player>,
}

impl<'a> AttendanceGroups<'a> {
    pub fn get(&self, group: Group) -> &[&'a Player] {
        match group {
            Group::Confirmed => &self.confirmed,
            Group::Tentative => &self.tentative,
            Group::Declined => &self.declined,
            Group::Unanswered => &self.unanswered,
        }
    }

    pub fn len(&self) -> usize {
        self.confirmed.len() + self.tentative.len() + self.declined.len() + self.unanswered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Players in section order, each tagged with its group.
    pub fn flatten(&self) -> Vec<(Group, &'a Player)> {
        Group::ALL
            .iter()
            .flat_map(|&g| self.get(g).iter().map(move |p| (g, *p)))
            .collect()
    }
}

/// Partitions the roster into the four groups. The roster is sorted once by
/// "surname first-name" and the order carries into every group.
pub fn classify<'a>(roster: &'a [Player], states: &RsvpMap) -> AttendanceGroups<'a> {
    let mut sorted: Vec<&Player> = roster.iter().collect();
    sorted.sort_by_cached_key(|p| collation_key(&p.sort_name()));

    let mut groups = AttendanceGroups::default();
    for player in sorted {
        match Group::of(states.get(&player.id).copied()) {
            Group::Confirmed => groups.confirmed.push(player),
            Group::Tentative => groups.tentative.push(player),
            Group::Declined => groups.declined.push(player),
            Group::Unanswered => groups.unanswered.push(player),
        }
    }
    groups
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionTally {
    pub total: usize,
    pub confirmed: usize,
}

impl PositionTally {
    pub fn pending(&self) -> usize {
        self.total.saturating_sub(self.confirmed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttendanceMetrics {
    pub roster_size: usize,
    pub confirmed: usize,
    pub tentative: usize,
    pub declined: usize,
    pub responded: usize,
    pub unanswered: usize,
    pub confirmed_pct: u32,
    pub tentative_pct: u32,
    pub declined_pct: u32,
    pub responded_pct: u32,
    pub by_position: [PositionTally; 4],
}

impl AttendanceMetrics {
    /// State counts come from the whole map (stale ids included); the
    /// unanswered count is clamped so it never goes negative.
    pub fn compute(roster: &[Player], states: &RsvpMap) -> Self {
        let roster_size = roster.len();
        let count = |wanted: RsvpState| states.values().filter(|s| **s == wanted).count();
        let confirmed = count(RsvpState::Available);
        let tentative = count(RsvpState::Tentative);
        let declined = count(RsvpState::Unavailable);
        let responded = confirmed + tentative + declined;

        let mut by_position = [PositionTally::default(); 4];
        for player in roster {
            let Some(pos) = player.effective_position() else {
                continue;
            };
            let tally = &mut by_position[pos.index()];
            tally.total += 1;
            if states.get(&player.id) == Some(&RsvpState::Available) {
                tally.confirmed += 1;
            }
        }

        Self {
            roster_size,
            confirmed,
            tentative,
            declined,
            responded,
            unanswered: roster_size.saturating_sub(responded),
            confirmed_pct: percent(confirmed, roster_size),
            tentative_pct: percent(tentative, roster_size),
            declined_pct: percent(declined, roster_size),
            responded_pct: percent(responded, roster_size),
            by_position,
        }
    }

    pub fn position(&self, pos: Position) -> PositionTally {
        self.by_position[pos.index()]
    }
}

/// Rounded share in percent, half-up; an empty total yields 0.
pub fn percent(count: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u32
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UpdatePhase {
    #[default]
    Idle,
    Pending {
        previous: Option<RsvpState>,
    },
    Committed,
    RolledBack,
}

/// One optimistic write, handed to whoever performs the upsert and handed
/// back to [`AttendanceBoard::resolve`] with the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub ticket: u64,
    pub match_id: String,
    pub player_id: String,
    pub previous: Option<RsvpState>,
    pub requested: RsvpState,
}

impl PendingUpdate {
    pub fn record(&self) -> AttendanceRecord {
        AttendanceRecord {
            match_id: self.match_id.clone(),
            player_id: self.player_id.clone(),
            state: self.requested,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Committed,
    RolledBack { restored: Option<RsvpState> },
    /// A newer update for the same player owns the displayed value.
    Superseded,
    /// The update belongs to another match or was already resolved.
    Stale,
}

#[derive(Debug, Clone, Default)]
struct PlayerSlot {
    // Last value known to be persisted, and the ticket that wrote it
    // (0 = loaded from the store).
    baseline: Option<RsvpState>,
    baseline_ticket: u64,
    in_flight: BTreeMap<u64, RsvpState>,
    phase: UpdatePhase,
}

impl PlayerSlot {
    fn displayed(&self) -> Option<RsvpState> {
        match self.in_flight.iter().next_back() {
            Some((&ticket, &state)) if ticket > self.baseline_ticket => Some(state),
            _ => self.baseline,
        }
    }
}

/// Attendance for one match of one category: the roster, the RSVP map and
/// the bookkeeping for optimistic writes.
#[derive(Debug, Clone)]
pub struct AttendanceBoard {
    category: Category,
    fixture: Match,
    roster: Vec<Player>,
    states: RsvpMap,
    slots: HashMap<String, PlayerSlot>,
    next_ticket: u64,
    save_error: Option<String>,
    load_error: Option<String>,
}

impl AttendanceBoard {
    pub fn new(
        category: Category,
        fixture: Match,
        roster: Vec<Player>,
        records: Vec<AttendanceRecord>,
    ) -> Self {
        let states = records
            .into_iter()
            .filter(|r| r.match_id == fixture.id)
            .map(|r| (r.player_id, r.state))
            .collect();
        Self {
            category,
            fixture,
            roster,
            states,
            slots: HashMap::new(),
            next_ticket: 0,
            save_error: None,
            load_error: None,
        }
    }

    /// Board shown when the roster or the records could not be fetched.
    pub fn failed(category: Category, fixture: Match, error: impl Into<String>) -> Self {
        let mut board = Self::new(category, fixture, Vec::new(), Vec::new());
        board.load_error = Some(error.into());
        board
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn fixture(&self) -> &Match {
        &self.fixture
    }

    pub fn match_id(&self) -> &str {
        &self.fixture.id
    }

    pub fn roster(&self) -> &[Player] {
        &self.roster
    }

    pub fn states(&self) -> &RsvpMap {
        &self.states
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.roster.iter().find(|p| p.id == player_id)
    }

    pub fn state_of(&self, player_id: &str) -> Option<RsvpState> {
        self.states.get(player_id).copied()
    }

    pub fn is_pending(&self, player_id: &str) -> bool {
        self.slots
            .get(player_id)
            .is_some_and(|slot| !slot.in_flight.is_empty())
    }

    pub fn phase(&self, player_id: &str) -> UpdatePhase {
        self.slots
            .get(player_id)
            .map(|slot| slot.phase.clone())
            .unwrap_or_default()
    }

    pub fn save_error(&self) -> Option<&str> {
        self.save_error.as_deref()
    }

    pub fn clear_save_error(&mut self) {
        self.save_error = None;
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn groups(&self) -> AttendanceGroups<'_> {
        classify(&self.roster, &self.states)
    }

    pub fn metrics(&self) -> AttendanceMetrics {
        AttendanceMetrics::compute(&self.roster, &self.states)
    }

    /// Applies `state` to the map right away and returns the write to
    /// perform. The player id is not checked against the roster.
    pub fn begin_update(&mut self, player_id: &str, state: RsvpState) -> PendingUpdate {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let previous = self.states.get(player_id).copied();

        let slot = self
            .slots
            .entry(player_id.to_string())
            .or_insert_with(|| PlayerSlot {
                baseline: previous,
                ..PlayerSlot::default()
            });
        slot.in_flight.insert(ticket, state);
        slot.phase = UpdatePhase::Pending {
            previous: slot.baseline,
        };
        self.states.insert(player_id.to_string(), state);

        PendingUpdate {
            ticket,
            match_id: self.fixture.id.clone(),
            player_id: player_id.to_string(),
            previous,
            requested: state,
        }
    }

    /// Settles a write started by [`begin_update`](Self::begin_update).
    ///
    /// Success makes the value the player's baseline unless a newer ticket
    /// already did. Failure restores the newest value still standing: a
    /// newer in-flight write if any, else the baseline. With one write in
    /// flight that is exactly `update.previous`.
    pub fn resolve(&mut self, update: &PendingUpdate, result: Result<(), String>) -> UpdateOutcome {
        if update.match_id != self.fixture.id {
            return UpdateOutcome::Stale;
        }
        let Some(slot) = self.slots.get_mut(&update.player_id) else {
            return UpdateOutcome::Stale;
        };
        if slot.in_flight.remove(&update.ticket).is_none() {
            return UpdateOutcome::Stale;
        }

        if result.is_ok() && update.ticket > slot.baseline_ticket {
            slot.baseline = Some(update.requested);
            slot.baseline_ticket = update.ticket;
        }
        let superseded = slot.baseline_ticket > update.ticket
            || slot.in_flight.range(update.ticket + 1..).next().is_some();

        let displayed = slot.displayed();
        let outcome = if superseded {
            UpdateOutcome::Superseded
        } else if result.is_ok() {
            UpdateOutcome::Committed
        } else {
            UpdateOutcome::RolledBack {
                restored: displayed,
            }
        };

        if slot.in_flight.is_empty() {
            slot.phase = match outcome {
                UpdateOutcome::RolledBack { .. } => UpdatePhase::RolledBack,
                _ => UpdatePhase::Committed,
            };
        }

        match displayed {
            Some(state) => {
                self.states.insert(update.player_id.clone(), state);
            }
            None => {
                self.states.remove(&update.player_id);
            }
        }

        match result {
            Ok(()) => {
                if outcome == UpdateOutcome::Committed {
                    self.save_error = None;
                }
            }
            Err(cause) => {
                // A failed older write leaves the newer answer on screen.
                if matches!(outcome, UpdateOutcome::RolledBack { .. }) {
                    let who = self.display_name_of(&update.player_id);
                    self.save_error =
                        Some(format!("Could not save attendance for {who}: {cause}"));
                }
            }
        }
        outcome
    }

    /// Display name for a roster id, falling back to the id itself.
    pub fn display_name_of(&self, player_id: &str) -> String {
        self.player(player_id)
            .map(Player::display_name)
            .unwrap_or_else(|| player_id.to_string())
    }

    /// Takes over the writes still in flight on `older`, a previous board
    /// for the same match. This board's records become the baseline and the
    /// pending values are shown on top, so their resolutions still land here.
    pub fn carry_in_flight(&mut self, older: &AttendanceBoard) {
        if older.fixture.id != self.fixture.id {
            return;
        }
        self.next_ticket = self.next_ticket.max(older.next_ticket);
        for (player_id, old_slot) in &older.slots {
            if old_slot.in_flight.is_empty() {
                continue;
            }
            let baseline = self.states.get(player_id).copied();
            let slot = PlayerSlot {
                baseline,
                baseline_ticket: old_slot.baseline_ticket,
                in_flight: old_slot.in_flight.clone(),
                phase: UpdatePhase::Pending { previous: baseline },
            };
            match slot.displayed() {
                Some(state) => {
                    self.states.insert(player_id.clone(), state);
                }
                None => {
                    self.states.remove(player_id);
                }
            }
            self.slots.insert(player_id.clone(), slot);
        }
        if self.save_error.is_none() {
            self.save_error = older.save_error.clone();
        }
    }

    /// Optimistic update, blocking upsert and resolution in one call.
    pub fn set_attendance(
        &mut self,
        store: &dyn ClubStore,
        player_id: &str,
        state: RsvpState,
    ) -> UpdateOutcome {
        let update = self.begin_update(player_id, state);
        let result = store
            .upsert_attendance(&update.record())
            .map_err(|err| format!("{err:#}"));
        self.resolve(&update, result)
    }
}

/// Fetches roster and records for `fixture` in parallel and builds a board.
pub fn load_board(
    store: &dyn ClubStore,
    category: Category,
    fixture: &Match,
) -> Result<AttendanceBoard> {
    let (roster, records) = rayon::join(
        || store.roster(category),
        || store.attendance(&fixture.id),
    );
    let roster = roster.with_context(|| format!("load roster for {}", category.label()))?;
    let records = records.with_context(|| format!("load attendance for match {}", fixture.id))?;
    Ok(AttendanceBoard::new(category, fixture.clone(), roster, records))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::MatchStatus;

    fn fixture() -> Match {
        Match {
            id: "m1".to_string(),
            category: Category::Senior,
            opponent: "Palestino".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
            kickoff: None,
            venue: None,
            status: MatchStatus::Scheduled,
        }
    }

    fn roster(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| Player::new(format!("p{i}"), "Player", &format!("Surname{i:02}")))
            .collect()
    }

    fn board_with(states: &[(&str, RsvpState)]) -> AttendanceBoard {
        let records = states
            .iter()
            .map(|(id, s)| AttendanceRecord {
                match_id: "m1".to_string(),
                player_id: id.to_string(),
                state: *s,
            })
            .collect();
        AttendanceBoard::new(Category::Senior, fixture(), roster(4), records)
    }

    #[test]
    fn percent_rounds_half_up_and_guards_empty() {
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(5, 0), 0);
    }

    #[test]
    fn classify_keeps_name_order_inside_groups() {
        let players = vec![
            Player::new("z", "Ana", "Zúñiga"),
            Player::new("a", "Beto", "Álvarez"),
            Player::new("m", "Carla", "Muñoz"),
            Player::new("n", "Dani", "Núñez"),
        ];
        let states: RsvpMap = [
            ("z".to_string(), RsvpState::Available),
            ("a".to_string(), RsvpState::Available),
        ]
        .into_iter()
        .collect();
        let groups = classify(&players, &states);
        let confirmed: Vec<&str> = groups.confirmed.iter().map(|p| p.id.as_str()).collect();
        let unanswered: Vec<&str> = groups.unanswered.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(confirmed, vec!["a", "z"]);
        assert_eq!(unanswered, vec!["m", "n"]);
        assert_eq!(groups.len(), 4);
    }

    #[test]
    fn stale_map_entries_do_not_push_unanswered_below_zero() {
        let players = roster(2);
        let states: RsvpMap = (0..5)
            .map(|i| (format!("ghost{i}"), RsvpState::Unavailable))
            .collect();
        let m = AttendanceMetrics::compute(&players, &states);
        assert_eq!(m.declined, 5);
        assert_eq!(m.unanswered, 0);
        assert_eq!(classify(&players, &states).unanswered.len(), 2);
    }

    #[test]
    fn single_failed_write_restores_previous() {
        let mut board = board_with(&[("p0", RsvpState::Available)]);
        let update = board.begin_update("p0", RsvpState::Tentative);
        assert_eq!(board.state_of("p0"), Some(RsvpState::Tentative));
        assert!(board.is_pending("p0"));

        let outcome = board.resolve(&update, Err("boom".to_string()));
        assert_eq!(
            outcome,
            UpdateOutcome::RolledBack {
                restored: Some(RsvpState::Available)
            }
        );
        assert_eq!(board.state_of("p0"), Some(RsvpState::Available));
        assert_eq!(board.phase("p0"), UpdatePhase::RolledBack);
        assert!(board.save_error().unwrap().contains("boom"));
    }

    #[test]
    fn late_failure_does_not_clobber_newer_commit() {
        let mut board = board_with(&[]);
        let first = board.begin_update("p1", RsvpState::Available);
        let second = board.begin_update("p1", RsvpState::Unavailable);

        assert_eq!(board.resolve(&second, Ok(())), UpdateOutcome::Committed);
        assert_eq!(
            board.resolve(&first, Err("timeout".to_string())),
            UpdateOutcome::Superseded
        );
        assert_eq!(board.state_of("p1"), Some(RsvpState::Unavailable));
        assert_eq!(board.phase("p1"), UpdatePhase::Committed);
        // The newer answer is on screen, so no banner for the older one.
        assert_eq!(board.save_error(), None);
    }

    #[test]
    fn overlapping_update_reports_persisted_value_as_previous() {
        let mut board = board_with(&[("p1", RsvpState::Unavailable)]);
        board.begin_update("p1", RsvpState::Available);
        board.begin_update("p1", RsvpState::Tentative);
        assert_eq!(
            board.phase("p1"),
            UpdatePhase::Pending {
                previous: Some(RsvpState::Unavailable)
            }
        );
    }

    #[test]
    fn reloaded_board_keeps_in_flight_writes() {
        let mut old = board_with(&[]);
        let update = old.begin_update("p0", RsvpState::Available);

        let mut fresh = board_with(&[("p1", RsvpState::Tentative)]);
        fresh.carry_in_flight(&old);
        assert!(fresh.is_pending("p0"));
        assert_eq!(fresh.state_of("p0"), Some(RsvpState::Available));
        assert_eq!(fresh.state_of("p1"), Some(RsvpState::Tentative));

        let next = fresh.begin_update("p1", RsvpState::Available);
        assert!(next.ticket > update.ticket);

        assert_eq!(
            fresh.resolve(&update, Err("http 503".to_string())),
            UpdateOutcome::RolledBack { restored: None }
        );
        assert_eq!(fresh.state_of("p0"), None);
        assert!(fresh.save_error().unwrap().contains("http 503"));
    }

    #[test]
    fn newest_failure_falls_back_to_older_in_flight_write() {
        let mut board = board_with(&[]);
        let first = board.begin_update("p2", RsvpState::Available);
        let second = board.begin_update("p2", RsvpState::Tentative);

        assert_eq!(
            board.resolve(&second, Err("nope".to_string())),
            UpdateOutcome::RolledBack {
                restored: Some(RsvpState::Available)
            }
        );
        assert!(board.is_pending("p2"));
        assert_eq!(board.resolve(&first, Ok(())), UpdateOutcome::Committed);
        assert_eq!(board.state_of("p2"), Some(RsvpState::Available));
        assert_eq!(board.save_error(), None);
    }

    #[test]
    fn late_commit_of_older_ticket_is_superseded() {
        let mut board = board_with(&[]);
        let first = board.begin_update("p3", RsvpState::Available);
        let second = board.begin_update("p3", RsvpState::Tentative);
        assert_eq!(board.resolve(&second, Ok(())), UpdateOutcome::Committed);
        assert_eq!(board.resolve(&first, Ok(())), UpdateOutcome::Superseded);
        assert_eq!(board.state_of("p3"), Some(RsvpState::Tentative));
    }

    #[test]
    fn resolving_twice_or_for_other_match_is_stale() {
        let mut board = board_with(&[]);
        let update = board.begin_update("p0", RsvpState::Available);
        assert_eq!(board.resolve(&update, Ok(())), UpdateOutcome::Committed);
        assert_eq!(board.resolve(&update, Ok(())), UpdateOutcome::Stale);

        let mut foreign = board.begin_update("p1", RsvpState::Available);
        foreign.match_id = "other".to_string();
        assert_eq!(board.resolve(&foreign, Err("x".to_string())), UpdateOutcome::Stale);
        assert_eq!(board.state_of("p1"), Some(RsvpState::Available));
    }

    #[test]
    fn different_players_resolve_independently() {
        let mut board = board_with(&[("p1", RsvpState::Tentative)]);
        let a = board.begin_update("p0", RsvpState::Available);
        let b = board.begin_update("p1", RsvpState::Unavailable);
        board.resolve(&b, Err("down".to_string()));
        board.resolve(&a, Ok(()));
        assert_eq!(board.state_of("p0"), Some(RsvpState::Available));
        assert_eq!(board.state_of("p1"), Some(RsvpState::Tentative));
        // The banner is board-wide; any later commit clears it.
        assert!(board.save_error().is_none());
    }
}
