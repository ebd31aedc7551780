use anyhow::{Context, Result, anyhow};
use chrono::Local;

use club_attendance::attendance::{UpdateOutcome, load_board};
use club_attendance::config::{Config, open_store};
use club_attendance::fixture::select_next_match;
use club_attendance::model::{Category, RsvpState};

const USAGE: &str = "usage: rsvp_set <category-slug> <player-id> <disponible|en_duda|no_disponible>";

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let [slug, player_id, raw_state] = args.as_slice() else {
        return Err(anyhow!(USAGE));
    };
    let category =
        Category::from_slug(slug).ok_or_else(|| anyhow!("unknown category '{slug}'\n{USAGE}"))?;
    let rsvp =
        RsvpState::parse(raw_state).ok_or_else(|| anyhow!("unknown state '{raw_state}'\n{USAGE}"))?;

    let config = Config::from_env()?;
    let store = open_store(&config)?;
    let today = Local::now().date_naive();

    let upcoming = store
        .upcoming_matches(category, today, config.upcoming_limit)
        .with_context(|| format!("load upcoming matches for {}", category.label()))?;
    let fixture = select_next_match(today, &upcoming)
        .ok_or_else(|| anyhow!("{} has no scheduled match", category.label()))?;

    let mut board = load_board(store.as_ref(), category, fixture)?;
    let Some(player) = board.player(player_id) else {
        return Err(anyhow!(
            "player '{player_id}' is not on the {} roster",
            category.label()
        ));
    };
    let name = player.display_name();

    match board.set_attendance(store.as_ref(), player_id, rsvp) {
        UpdateOutcome::Committed => {
            let m = board.metrics();
            println!(
                "{name}: {} for {} vs {} ({}/{} confirmed)",
                rsvp.label(),
                fixture.date.format("%a %d %b"),
                fixture.opponent,
                m.confirmed,
                m.roster_size
            );
            Ok(())
        }
        UpdateOutcome::RolledBack { .. } => Err(anyhow!(
            "{}",
            board.save_error().unwrap_or("attendance not saved")
        )),
        other => Err(anyhow!("unexpected outcome {other:?}")),
    }
}
