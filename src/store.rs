use anyhow::Result;
use chrono::NaiveDate;

use crate::model::{AttendanceRecord, Category, Match};
use crate::roster::Player;
use crate::scorers::ScorerLine;

/// Row-store boundary shared by the Supabase and SQLite backends.
///
/// Implementations are handed around as `Arc<dyn ClubStore>`; they must be
/// safe to call from the provider pool concurrently.
pub trait ClubStore: Send + Sync {
    /// Players of a category ordered by surname.
    fn roster(&self, category: Category) -> Result<Vec<Player>>;

    /// Scheduled matches dated `from` or later, ascending, at most `limit`.
    fn upcoming_matches(
        &self,
        category: Category,
        from: NaiveDate,
        limit: usize,
    ) -> Result<Vec<Match>>;

    /// Every attendance record stored for a match.
    fn attendance(&self, match_id: &str) -> Result<Vec<AttendanceRecord>>;

    /// Insert-or-replace on `(match_id, player_id)`.
    fn upsert_attendance(&self, record: &AttendanceRecord) -> Result<()>;

    fn scorers(&self, category: Category, season: &str) -> Result<Vec<ScorerLine>>;
}
