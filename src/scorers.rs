use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::names::{fold_key, paternal_surname};
use crate::roster::Player;

/// One row of the season's scorer table. Names are free text typed by
/// whoever keeps the sheet, so they only loosely match the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorerLine {
    pub name: String,
    pub goals: u32,
    pub assists: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKey {
    FullName,
    FirstAndPaternal,
    NicknameAndSurname,
    NicknameAndPaternal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScorerLink {
    Matched {
        key: LinkKey,
        goals: u32,
        assists: u32,
    },
    Unmatched,
}

impl ScorerLink {
    pub fn goals(&self) -> u32 {
        match self {
            ScorerLink::Matched { goals, .. } => *goals,
            ScorerLink::Unmatched => 0,
        }
    }

    pub fn assists(&self) -> u32 {
        match self {
            ScorerLink::Matched { assists, .. } => *assists,
            ScorerLink::Unmatched => 0,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, ScorerLink::Matched { .. })
    }
}

/// Best-effort name index over scorer lines.
#[derive(Debug, Default)]
pub struct ScorerIndex {
    by_key: HashMap<String, (u32, u32)>,
}

impl ScorerIndex {
    pub fn build(lines: &[ScorerLine]) -> Self {
        let mut index = Self::default();
        for line in lines {
            let key = fold_key(&line.name);
            if key.is_empty() {
                continue;
            }
            let stats = (line.goals, line.assists);
            let parts: Vec<&str> = key.split(' ').collect();
            index.by_key.entry(key.clone()).or_insert(stats);
            // "first paternal maternal" on the sheet also answers to
            // "first paternal".
            if parts.len() >= 3 {
                let head = parts[..parts.len() - 1].join(" ");
                index.by_key.entry(head).or_insert(stats);
            }
        }
        index
    }

    pub fn link(&self, player: &Player) -> ScorerLink {
        let paternal = paternal_surname(&player.last_name);
        let mut candidates = vec![
            (
                LinkKey::FullName,
                fold_key(&format!("{} {}", player.first_name, player.last_name)),
            ),
            (
                LinkKey::FirstAndPaternal,
                fold_key(&format!("{} {paternal}", player.first_name)),
            ),
        ];
        if let Some(nick) = player.nickname.as_deref().filter(|n| !n.trim().is_empty()) {
            candidates.push((
                LinkKey::NicknameAndSurname,
                fold_key(&format!("{nick} {}", player.last_name)),
            ));
            candidates.push((
                LinkKey::NicknameAndPaternal,
                fold_key(&format!("{nick} {paternal}")),
            ));
        }

        for (key, lookup) in candidates {
            if lookup.is_empty() {
                continue;
            }
            if let Some(&(goals, assists)) = self.by_key.get(&lookup) {
                return ScorerLink::Matched {
                    key,
                    goals,
                    assists,
                };
            }
        }
        ScorerLink::Unmatched
    }
}

pub fn link_roster<'a>(players: &'a [Player], lines: &[ScorerLine]) -> Vec<(&'a Player, ScorerLink)> {
    let index = ScorerIndex::build(lines);
    players.iter().map(|p| (p, index.link(p))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, goals: u32, assists: u32) -> ScorerLine {
        ScorerLine {
            name: name.to_string(),
            goals,
            assists,
        }
    }

    #[test]
    fn links_full_name_ignoring_accents() {
        let index = ScorerIndex::build(&[line("JOSE MUNOZ soto", 4, 1)]);
        let p = Player::new("1", "José", "Muñoz Soto");
        assert_eq!(
            index.link(&p),
            ScorerLink::Matched {
                key: LinkKey::FullName,
                goals: 4,
                assists: 1
            }
        );
    }

    #[test]
    fn falls_back_to_paternal_surname() {
        let index = ScorerIndex::build(&[line("Rodrigo Garcés", 7, 2)]);
        let p = Player::new("1", "Rodrigo", "Garces Rojas");
        let link = index.link(&p);
        assert_eq!(link.goals(), 7);
        assert!(matches!(
            link,
            ScorerLink::Matched {
                key: LinkKey::FirstAndPaternal,
                ..
            }
        ));
    }

    #[test]
    fn nickname_is_tried_last() {
        let index = ScorerIndex::build(&[line("Toto Garcés", 3, 0)]);
        let mut p = Player::new("1", "Rodrigo", "Garcés Rojas");
        p.nickname = Some("Toto".to_string());
        assert!(matches!(
            index.link(&p),
            ScorerLink::Matched {
                key: LinkKey::NicknameAndPaternal,
                goals: 3,
                ..
            }
        ));
    }

    #[test]
    fn unmatched_is_explicit_and_zero() {
        let index = ScorerIndex::build(&[line("Someone Else", 9, 9)]);
        let link = index.link(&Player::new("1", "Ana", "Pérez"));
        assert_eq!(link, ScorerLink::Unmatched);
        assert_eq!(link.goals(), 0);
        assert_eq!(link.assists(), 0);
    }

    #[test]
    fn sheet_maternal_surname_is_optional() {
        let index = ScorerIndex::build(&[line("Ana Pérez Lagos", 6, 3)]);
        let link = index.link(&Player::new("1", "Ana", "Pérez"));
        assert!(matches!(
            link,
            ScorerLink::Matched {
                key: LinkKey::FullName,
                goals: 6,
                assists: 3
            }
        ));
    }

    #[test]
    fn first_line_wins_on_duplicate_keys() {
        let index = ScorerIndex::build(&[line("Ana Pérez", 2, 0), line("ana perez", 5, 5)]);
        assert_eq!(index.link(&Player::new("1", "Ana", "Pérez")).goals(), 2);
    }
}
