use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDate};

use club_attendance::attendance::{AttendanceBoard, Group, load_board};
use club_attendance::config::{Config, open_store};
use club_attendance::fixture::summarize_categories;
use club_attendance::model::Category;
use club_attendance::roster::{Position, age_on, next_birthday, sort_by_position, squad_by_position};
use club_attendance::scorers::link_roster;
use club_attendance::store::ClubStore;

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
    let today = parse_date_arg(&args)?.unwrap_or_else(|| Local::now().date_naive());
    let show_roster = args.iter().any(|a| a == "--roster");
    let only = parse_category_args(&args)?;

    let config = Config::from_env()?;
    let store = open_store(&config)?;

    println!("Attendance report for {today} ({})", config.backend_label());

    let summaries = summarize_categories(store.as_ref(), today, config.upcoming_limit);
    for summary in summaries {
        if !only.is_empty() && !only.contains(&summary.category) {
            continue;
        }
        println!();
        println!("== {} ==", summary.category.label());

        let Some(fixture) = summary.next_match else {
            match summary.error {
                Some(err) => println!("upcoming fetch failed: {err}"),
                None => println!("no scheduled match"),
            }
            continue;
        };
        println!(
            "next: {} {} vs {} @ {}",
            fixture.date.format("%a %d %b %Y"),
            fixture.kickoff_label(),
            fixture.opponent,
            fixture.venue.as_deref().unwrap_or("TBD")
        );

        let board = match load_board(store.as_ref(), summary.category, &fixture) {
            Ok(board) => board,
            Err(err) => {
                println!("attendance unavailable: {err:#}");
                continue;
            }
        };

        let m = board.metrics();
        println!(
            "answered {}/{} ({}%) | confirmed {} ({}%) | tentative {} ({}%) | not playing {} ({}%) | no answer {}",
            m.responded,
            m.roster_size,
            m.responded_pct,
            m.confirmed,
            m.confirmed_pct,
            m.tentative,
            m.tentative_pct,
            m.declined,
            m.declined_pct,
            m.unanswered
        );
        let tally = Position::ALL
            .iter()
            .map(|&pos| {
                let t = m.position(pos);
                format!("{} {}/{} ({} pending)", pos.code(), t.confirmed, t.total, t.pending())
            })
            .collect::<Vec<_>>()
            .join(" | ");
        println!("by position: {tally}");

        let groups = board.groups();
        for group in Group::ALL {
            let players = groups.get(group);
            if players.is_empty() {
                continue;
            }
            let names = players
                .iter()
                .map(|p| p.display_name())
                .collect::<Vec<_>>()
                .join(", ");
            println!("{} ({}): {names}", group.label(), players.len());
        }

        if let Some(bday) = next_birthday(board.roster(), today) {
            let turning = bday
                .player
                .birth_date
                .and_then(|b| age_on(b, bday.date))
                .map(|age| format!(", turns {age}"))
                .unwrap_or_default();
            println!(
                "next birthday: {} on {} (in {} days{turning})",
                bday.player.display_name(),
                bday.date.format("%d %b"),
                bday.days_until
            );
        }

        if show_roster {
            print_roster(store.as_ref(), summary.category, &config.scorers_season, &board)?;
        }
    }

    Ok(())
}

fn print_roster(
    store: &dyn ClubStore,
    category: Category,
    season: &str,
    board: &AttendanceBoard,
) -> Result<()> {
    let counts = squad_by_position(board.roster());
    println!(
        "squad: GK {} | DEF {} | MID {} | FWD {}",
        counts[0], counts[1], counts[2], counts[3]
    );

    let lines = store
        .scorers(category, season)
        .with_context(|| format!("load scorers for {}", category.label()))?;
    let sorted = sort_by_position(board.roster())
        .into_iter()
        .cloned()
        .collect::<Vec<_>>();
    for (player, link) in link_roster(&sorted, &lines) {
        let stats = if link.is_matched() {
            format!("{}G {}A", link.goals(), link.assists())
        } else {
            "-".to_string()
        };
        let rsvp = board
            .state_of(&player.id)
            .map(|s| s.label())
            .unwrap_or("No answer yet");
        println!(
            "  {:>4} {:<4} {:<32} {:<12} {stats}",
            player.jersey_label(),
            player.effective_position().map_or("-", Position::code),
            player.display_name(),
            rsvp
        );
    }
    Ok(())
}

fn parse_date_arg(args: &[String]) -> Result<Option<NaiveDate>> {
    for arg in args {
        if let Some(raw) = arg.strip_prefix("--date=") {
            let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .with_context(|| format!("invalid --date '{raw}'"))?;
            return Ok(Some(date));
        }
    }
    Ok(None)
}

fn parse_category_args(args: &[String]) -> Result<Vec<Category>> {
    let mut out = Vec::new();
    for arg in args.iter().filter(|a| !a.starts_with("--")) {
        let category = Category::from_slug(arg).ok_or_else(|| {
            let known = Category::ALL.map(Category::slug).join(", ");
            anyhow!("unknown category '{arg}' (expected one of: {known})")
        })?;
        out.push(category);
    }
    Ok(out)
}
