use chrono::{Datelike, NaiveDate, Weekday};
use rayon::prelude::*;

use crate::model::{Category, Match, MatchStatus};
use crate::store::ClubStore;

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Picks the match a category should confirm attendance for.
///
/// `upcoming` is expected in ascending date order. The first weekend match
/// wins; otherwise the earliest one. Entries that are not scheduled or that
/// are already in the past are skipped.
pub fn select_next_match(today: NaiveDate, upcoming: &[Match]) -> Option<&Match> {
    let mut candidates = upcoming
        .iter()
        .filter(|m| m.status == MatchStatus::Scheduled && m.date >= today);
    let first = candidates.next()?;
    if is_weekend(first.date) {
        return Some(first);
    }
    candidates.find(|m| is_weekend(m.date)).or(Some(first))
}

#[derive(Debug, Clone)]
pub struct CategorySummary {
    pub category: Category,
    pub next_match: Option<Match>,
    pub error: Option<String>,
}

/// Next match for every category, fetched in parallel.
pub fn summarize_categories(
    store: &dyn ClubStore,
    today: NaiveDate,
    limit: usize,
) -> Vec<CategorySummary> {
    Category::ALL
        .par_iter()
        .map(|&category| match store.upcoming_matches(category, today, limit) {
            Ok(list) => CategorySummary {
                category,
                next_match: select_next_match(today, &list).cloned(),
                error: None,
            },
            Err(err) => CategorySummary {
                category,
                next_match: None,
                error: Some(format!("{err:#}")),
            },
        })
        .collect()
}
