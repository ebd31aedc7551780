use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Junior Fútbol")]
    Junior,
    #[serde(rename = "Senior Fútbol")]
    Senior,
    #[serde(rename = "Super Senior Futbolito")]
    SuperSeniorFutbolito,
    #[serde(rename = "Super Senior Fútbol")]
    SuperSeniorTuesday,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Junior,
        Category::Senior,
        Category::SuperSeniorFutbolito,
        Category::SuperSeniorTuesday,
    ];

    /// Value stored in the `categoria` column.
    pub fn db_value(self) -> &'static str {
        match self {
            Category::Junior => "Junior Fútbol",
            Category::Senior => "Senior Fútbol",
            Category::SuperSeniorFutbolito => "Super Senior Futbolito",
            Category::SuperSeniorTuesday => "Super Senior Fútbol",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Junior => "Maestros Junior",
            Category::Senior => "Maestros Senior",
            Category::SuperSeniorFutbolito => "Maestros SS futbolito",
            Category::SuperSeniorTuesday => "Maestros SS martes",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Category::Junior => "junior",
            Category::Senior => "senior",
            Category::SuperSeniorFutbolito => "ss-futbolito",
            Category::SuperSeniorTuesday => "ss-martes",
        }
    }

    pub fn from_slug(raw: &str) -> Option<Category> {
        let raw = raw.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.slug().eq_ignore_ascii_case(raw))
    }

    pub fn from_db_value(raw: &str) -> Option<Category> {
        let raw = raw.trim();
        Category::ALL.into_iter().find(|c| c.db_value() == raw)
    }
}

/// Three explicit RSVP answers. A player with no record is unclassified,
/// which is modeled as `Option::None` wherever a state is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RsvpState {
    #[serde(rename = "disponible")]
    Available,
    #[serde(rename = "en_duda")]
    Tentative,
    #[serde(rename = "no_disponible")]
    Unavailable,
}

impl RsvpState {
    pub const ALL: [RsvpState; 3] = [
        RsvpState::Available,
        RsvpState::Tentative,
        RsvpState::Unavailable,
    ];

    pub fn db_value(self) -> &'static str {
        match self {
            RsvpState::Available => "disponible",
            RsvpState::Tentative => "en_duda",
            RsvpState::Unavailable => "no_disponible",
        }
    }

    pub fn from_db_value(raw: &str) -> Option<RsvpState> {
        let raw = raw.trim();
        RsvpState::ALL.into_iter().find(|s| s.db_value() == raw)
    }

    /// Accepts the stored value or a short English alias.
    pub fn parse(raw: &str) -> Option<RsvpState> {
        if let Some(state) = RsvpState::from_db_value(raw) {
            return Some(state);
        }
        match raw.trim().to_ascii_lowercase().as_str() {
            "available" | "yes" | "in" => Some(RsvpState::Available),
            "tentative" | "maybe" => Some(RsvpState::Tentative),
            "unavailable" | "no" | "out" => Some(RsvpState::Unavailable),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RsvpState::Available => "Confirmed",
            RsvpState::Tentative => "Tentative",
            RsvpState::Unavailable => "Not playing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStatus {
    Scheduled,
    Played,
    Unknown(String),
}

impl MatchStatus {
    pub fn from_db_value(raw: &str) -> MatchStatus {
        match raw.trim() {
            "programado" => MatchStatus::Scheduled,
            "jugado" => MatchStatus::Played,
            other => MatchStatus::Unknown(other.to_string()),
        }
    }

    pub fn db_value(&self) -> &str {
        match self {
            MatchStatus::Scheduled => "programado",
            MatchStatus::Played => "jugado",
            MatchStatus::Unknown(raw) => raw.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub id: String,
    pub category: Category,
    pub opponent: String,
    pub date: NaiveDate,
    pub kickoff: Option<NaiveTime>,
    pub venue: Option<String>,
    pub status: MatchStatus,
}

impl Match {
    pub fn kickoff_label(&self) -> String {
        self.kickoff
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| "--:--".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(rename = "partido_id")]
    pub match_id: String,
    #[serde(rename = "jugador_id")]
    pub player_id: String,
    #[serde(rename = "estado_asistencia")]
    pub state: RsvpState,
}

/// Lenient "HH:MM" / "HH:MM:SS" parse for the free-form kickoff column.
pub fn parse_kickoff(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

/// Accepts "YYYY-MM-DD" with an optional time/zone suffix.
pub fn parse_match_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let head = raw.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_slug_and_db_value() {
        for category in Category::ALL {
            assert_eq!(Category::from_slug(category.slug()), Some(category));
            assert_eq!(Category::from_db_value(category.db_value()), Some(category));
        }
        assert_eq!(Category::from_slug("nope"), None);
    }

    #[test]
    fn rsvp_parse_accepts_aliases() {
        assert_eq!(RsvpState::parse("en_duda"), Some(RsvpState::Tentative));
        assert_eq!(RsvpState::parse("Maybe"), Some(RsvpState::Tentative));
        assert_eq!(RsvpState::parse("no"), Some(RsvpState::Unavailable));
        assert_eq!(RsvpState::parse("perhaps"), None);
    }

    #[test]
    fn kickoff_and_date_parse_leniently() {
        assert_eq!(parse_kickoff("20:30"), NaiveTime::from_hms_opt(20, 30, 0));
        assert_eq!(parse_kickoff("09:15:00"), NaiveTime::from_hms_opt(9, 15, 0));
        assert_eq!(parse_kickoff("tbd"), None);
        assert_eq!(
            parse_match_date("2026-10-17T00:00:00+00:00"),
            NaiveDate::from_ymd_opt(2026, 10, 17)
        );
        assert_eq!(parse_match_date("17/10"), None);
    }
}
