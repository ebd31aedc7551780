use std::cmp::Ordering;

use chrono::{Datelike, NaiveDate};

use crate::names::{collation_key, compare_collated, paternal_surname};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl Position {
    pub const ALL: [Position; 4] = [
        Position::Goalkeeper,
        Position::Defender,
        Position::Midfielder,
        Position::Forward,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Forward => "FWD",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Position::Goalkeeper => 0,
            Position::Defender => 1,
            Position::Midfielder => 2,
            Position::Forward => 3,
        }
    }

    /// Folds the club's raw position vocabulary into the four codes.
    pub fn normalize(raw: &str) -> Option<Position> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "POR" | "GK" => Some(Position::Goalkeeper),
            "DEF" => Some(Position::Defender),
            "MED" | "VOL" | "NED" | "MID" => Some(Position::Midfielder),
            "DEL" | "FWD" => Some(Position::Forward),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: String,
    pub first_name: String,
    pub nickname: Option<String>,
    pub last_name: String,
    pub jersey_number: Option<u32>,
    pub position: Option<Position>,
    pub secondary_position: Option<Position>,
    pub birth_date: Option<NaiveDate>,
}

impl Player {
    pub fn new(id: impl Into<String>, first_name: &str, last_name: &str) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.to_string(),
            nickname: None,
            last_name: last_name.to_string(),
            jersey_number: None,
            position: None,
            secondary_position: None,
            birth_date: None,
        }
    }

    /// Primary position when it is known, else the secondary one.
    pub fn effective_position(&self) -> Option<Position> {
        self.position.or(self.secondary_position)
    }

    /// "First [Nickname] Paternal", the way the roster cards print names.
    pub fn display_name(&self) -> String {
        let mut out = self.first_name.trim().to_string();
        if let Some(nick) = self.nickname.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            out.push_str(" \"");
            out.push_str(nick);
            out.push('"');
        }
        let paternal = paternal_surname(&self.last_name);
        if !paternal.is_empty() {
            out.push(' ');
            out.push_str(paternal);
        }
        out
    }

    pub fn sort_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }

    pub fn jersey_label(&self) -> String {
        self.jersey_number
            .map(|n| format!("#{n}"))
            .unwrap_or_else(|| "#-".to_string())
    }
}

/// Roster sorted by "surname first-name" with Spanish-style collation.
pub fn sort_by_name(players: &[Player]) -> Vec<&Player> {
    let mut out: Vec<&Player> = players.iter().collect();
    out.sort_by_cached_key(|p| collation_key(&p.sort_name()));
    out
}

/// Squad listing order: GK, DEF, MID, FWD, unknown last; surname within.
pub fn sort_by_position(players: &[Player]) -> Vec<&Player> {
    let mut out: Vec<&Player> = players.iter().collect();
    out.sort_by(|a, b| {
        let rank_a = a.effective_position().map(Position::index).unwrap_or(99);
        let rank_b = b.effective_position().map(Position::index).unwrap_or(99);
        rank_a
            .cmp(&rank_b)
            .then_with(|| compare_collated(&a.last_name, &b.last_name))
    });
    out
}

/// Head count per effective position, indexed by `Position::index`.
pub fn squad_by_position(players: &[Player]) -> [usize; 4] {
    let mut counts = [0usize; 4];
    for p in players {
        if let Some(pos) = p.effective_position() {
            counts[pos.index()] += 1;
        }
    }
    counts
}

pub fn age_on(birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    if birth > today {
        return None;
    }
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

#[derive(Debug, Clone)]
pub struct UpcomingBirthday<'a> {
    pub player: &'a Player,
    pub date: NaiveDate,
    pub days_until: i64,
}

pub fn birthday_in_year(birth: NaiveDate, year: i32) -> Option<NaiveDate> {
    // Feb 29 rolls over to Mar 1 in non-leap years.
    NaiveDate::from_ymd_opt(year, birth.month(), birth.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
}

pub fn next_birthday(players: &[Player], today: NaiveDate) -> Option<UpcomingBirthday<'_>> {
    let mut best: Option<UpcomingBirthday<'_>> = None;
    for player in players {
        let Some(birth) = player.birth_date else {
            continue;
        };
        let Some(mut date) = birthday_in_year(birth, today.year()) else {
            continue;
        };
        if date < today {
            let Some(next) = birthday_in_year(birth, today.year() + 1) else {
                continue;
            };
            date = next;
        }
        let days_until = (date - today).num_days();
        let closer = best
            .as_ref()
            .map(|b| days_until.cmp(&b.days_until) == Ordering::Less)
            .unwrap_or(true);
        if closer {
            best = Some(UpcomingBirthday {
                player,
                date,
                days_until,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn normalize_folds_aliases_into_midfield() {
        assert_eq!(Position::normalize(" vol "), Some(Position::Midfielder));
        assert_eq!(Position::normalize("NED"), Some(Position::Midfielder));
        assert_eq!(Position::normalize("por"), Some(Position::Goalkeeper));
        assert_eq!(Position::normalize("DEL"), Some(Position::Forward));
        assert_eq!(Position::normalize("XYZ"), None);
        assert_eq!(Position::normalize(""), None);
    }

    #[test]
    fn display_name_uses_nickname_and_paternal_surname() {
        let mut p = Player::new("1", "Rodrigo", "Garcés Rojas");
        assert_eq!(p.display_name(), "Rodrigo Garcés");
        p.nickname = Some("Toto".to_string());
        assert_eq!(p.display_name(), "Rodrigo \"Toto\" Garcés");
    }

    #[test]
    fn squad_order_puts_unknown_positions_last() {
        let mut a = Player::new("a", "A", "Zúñiga");
        a.position = Some(Position::Forward);
        let mut b = Player::new("b", "B", "Alvarez");
        b.secondary_position = Some(Position::Goalkeeper);
        let c = Player::new("c", "C", "Bravo");
        let players = vec![a, b, c];
        let ids: Vec<&str> = sort_by_position(&players)
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(squad_by_position(&players), [1, 0, 0, 1]);
    }

    #[test]
    fn age_counts_birthday_not_yet_reached() {
        assert_eq!(age_on(date(1980, 10, 17), date(2026, 10, 16)), Some(45));
        assert_eq!(age_on(date(1980, 10, 16), date(2026, 10, 16)), Some(46));
        assert_eq!(age_on(date(2030, 1, 1), date(2026, 10, 16)), None);
    }

    #[test]
    fn next_birthday_wraps_into_next_year() {
        let mut a = Player::new("a", "A", "Uno");
        a.birth_date = Some(date(1979, 1, 5));
        let mut b = Player::new("b", "B", "Dos");
        b.birth_date = Some(date(1985, 10, 1));
        let players = vec![a, b];
        let next = next_birthday(&players, date(2026, 10, 16)).unwrap();
        assert_eq!(next.player.id, "a");
        assert_eq!(next.date, date(2027, 1, 5));
        assert_eq!(next.days_until, 81);
    }

    #[test]
    fn leap_day_birthday_falls_on_march_first() {
        assert_eq!(birthday_in_year(date(1984, 2, 29), 2027), Some(date(2027, 3, 1)));
        assert_eq!(birthday_in_year(date(1984, 2, 29), 2028), Some(date(2028, 2, 29)));
    }
}
