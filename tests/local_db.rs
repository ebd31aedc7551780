use chrono::{NaiveDate, NaiveTime};

use club_attendance::local_db::LocalDb;
use club_attendance::model::{AttendanceRecord, Category, Match, MatchStatus, RsvpState};
use club_attendance::roster::{Player, Position};
use club_attendance::scorers::ScorerLine;
use club_attendance::store::ClubStore;

fn fixture(id: &str, category: Category, date: NaiveDate, status: MatchStatus) -> Match {
    Match {
        id: id.to_string(),
        category,
        opponent: format!("Rival {id}"),
        date,
        kickoff: NaiveTime::from_hms_opt(10, 30, 0),
        venue: None,
        status,
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

#[test]
fn upsert_is_idempotent_per_match_and_player() {
    let db = LocalDb::open_in_memory().unwrap();
    let rec = AttendanceRecord {
        match_id: "m1".to_string(),
        player_id: "p1".to_string(),
        state: RsvpState::Tentative,
    };
    db.upsert_attendance(&rec).unwrap();
    db.upsert_attendance(&rec).unwrap();
    assert_eq!(db.attendance_row_count("m1").unwrap(), 1);

    let changed = AttendanceRecord {
        state: RsvpState::Available,
        ..rec
    };
    db.upsert_attendance(&changed).unwrap();
    assert_eq!(db.attendance_row_count("m1").unwrap(), 1);
    assert_eq!(
        db.stored_state("m1", "p1").unwrap(),
        Some(RsvpState::Available)
    );
    assert_eq!(db.attendance("m1").unwrap(), vec![changed]);
}

#[test]
fn upcoming_filters_status_date_and_category() {
    let db = LocalDb::open_in_memory().unwrap();
    let rows = [
        fixture("past", Category::Senior, day(10), MatchStatus::Scheduled),
        fixture("played", Category::Senior, day(17), MatchStatus::Played),
        fixture("sat", Category::Senior, day(24), MatchStatus::Scheduled),
        fixture("tue", Category::Senior, day(20), MatchStatus::Scheduled),
        fixture("junior", Category::Junior, day(18), MatchStatus::Scheduled),
        fixture("today", Category::Senior, day(16), MatchStatus::Scheduled),
    ];
    for m in &rows {
        db.upsert_match(m).unwrap();
    }

    let upcoming = db.upcoming_matches(Category::Senior, day(16), 5).unwrap();
    let ids: Vec<&str> = upcoming.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["today", "tue", "sat"]);
    assert_eq!(upcoming[0].kickoff, NaiveTime::from_hms_opt(10, 30, 0));

    let limited = db.upcoming_matches(Category::Senior, day(16), 1).unwrap();
    assert_eq!(limited.len(), 1);
}

#[test]
fn roster_round_trips_positions_and_birth_dates() {
    let db = LocalDb::open_in_memory().unwrap();
    let mut p = Player::new("p1", "José", "Muñoz Soto");
    p.nickname = Some("Pepe".to_string());
    p.jersey_number = Some(9);
    p.position = Some(Position::Forward);
    p.birth_date = NaiveDate::from_ymd_opt(1984, 2, 29);
    db.upsert_player(Category::SuperSeniorTuesday, &p).unwrap();
    db.upsert_player(Category::Junior, &Player::new("p2", "Ana", "Lagos"))
        .unwrap();

    let roster = db.roster(Category::SuperSeniorTuesday).unwrap();
    assert_eq!(roster, vec![p]);
}

#[test]
fn scorers_are_scoped_by_category_and_season() {
    let db = LocalDb::open_in_memory().unwrap();
    let line = |name: &str, goals| ScorerLine {
        name: name.to_string(),
        goals,
        assists: 0,
    };
    db.insert_scorer(Category::Senior, "2026", &line("Ana Lagos", 3))
        .unwrap();
    db.insert_scorer(Category::Senior, "2026", &line("Eva Ríos", 8))
        .unwrap();
    db.insert_scorer(Category::Senior, "2025", &line("Old Timer", 20))
        .unwrap();
    db.insert_scorer(Category::Junior, "2026", &line("Kid", 1))
        .unwrap();

    let lines = db.scorers(Category::Senior, "2026").unwrap();
    let names: Vec<&str> = lines.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, ["Eva Ríos", "Ana Lagos"]);
}

#[test]
fn file_backed_db_persists_between_opens() {
    let dir = std::env::temp_dir().join(format!("club_attendance_test_{}", std::process::id()));
    let path = dir.join("club.sqlite");
    let _ = std::fs::remove_file(&path);

    {
        let db = LocalDb::open(&path).unwrap();
        db.upsert_attendance(&AttendanceRecord {
            match_id: "m1".to_string(),
            player_id: "p1".to_string(),
            state: RsvpState::Unavailable,
        })
        .unwrap();
    }
    let db = LocalDb::open(&path).unwrap();
    assert_eq!(
        db.stored_state("m1", "p1").unwrap(),
        Some(RsvpState::Unavailable)
    );
    let _ = std::fs::remove_dir_all(&dir);
}
