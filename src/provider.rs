use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::attendance::{AttendanceBoard, load_board};
use crate::fixture::summarize_categories;
use crate::state::{Delta, ProviderCommand};
use crate::store::ClubStore;

/// Runs store I/O off the UI thread. Every command becomes a job on a small
/// rayon pool; results come back on `tx`. The worker exits once every
/// command sender is dropped.
pub fn spawn_provider(
    store: Arc<dyn ClubStore>,
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
    parallelism: usize,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let pool = build_fetch_pool(parallelism);
        if pool.is_none() {
            let _ = tx.send(Delta::Log(
                "[WARN] Fetch pool unavailable; running jobs on plain threads".to_string(),
            ));
        }

        for cmd in cmd_rx.iter() {
            let store = Arc::clone(&store);
            let tx = tx.clone();
            let job = move || run_command(store.as_ref(), &tx, cmd);
            if let Some(pool) = pool.as_ref() {
                pool.spawn(job);
            } else {
                thread::spawn(job);
            }
        }
    })
}

fn run_command(store: &dyn ClubStore, tx: &Sender<Delta>, cmd: ProviderCommand) {
    match cmd {
        ProviderCommand::FetchSummaries { today, limit } => {
            let summaries = summarize_categories(store, today, limit);
            let found = summaries.iter().filter(|s| s.next_match.is_some()).count();
            let _ = tx.send(Delta::SetSummaries(summaries));
            let _ = tx.send(Delta::Log(format!(
                "[INFO] Upcoming loaded ({found} categories with a match)"
            )));
        }
        ProviderCommand::LoadBoard { category, fixture } => {
            let board = match load_board(store, category, &fixture) {
                Ok(board) => {
                    let _ = tx.send(Delta::Log(format!(
                        "[INFO] Attendance loaded: {} vs {} ({} players)",
                        category.label(),
                        fixture.opponent,
                        board.roster().len()
                    )));
                    board
                }
                Err(err) => AttendanceBoard::failed(category, fixture, format!("{err:#}")),
            };
            let _ = tx.send(Delta::SetBoard(board));
        }
        ProviderCommand::SaveAttendance(update) => {
            let delta = match store.upsert_attendance(&update.record()) {
                Ok(()) => Delta::AttendanceSaved(update),
                Err(err) => Delta::AttendanceFailed {
                    update,
                    error: format!("{err:#}"),
                },
            };
            let _ = tx.send(delta);
        }
        ProviderCommand::FetchScorers { category, season } => {
            match store.scorers(category, &season) {
                Ok(lines) => {
                    let _ = tx.send(Delta::SetScorers { category, lines });
                }
                Err(err) => {
                    let _ = tx.send(Delta::Log(format!(
                        "[WARN] Scorers fetch failed for {}: {err:#}",
                        category.label()
                    )));
                }
            }
        }
    }
}

fn build_fetch_pool(threads: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .ok()
}
