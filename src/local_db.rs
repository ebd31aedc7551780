use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::model::{
    AttendanceRecord, Category, Match, MatchStatus, RsvpState, parse_kickoff, parse_match_date,
};
use crate::roster::{Player, Position};
use crate::scorers::ScorerLine;
use crate::store::ClubStore;

const CACHE_DIR: &str = "club_attendance";
const DB_FILE: &str = "club.sqlite";

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

/// SQLite mirror of the club tables. Same names and columns as the hosted
/// backend so either can sit behind [`ClubStore`].
pub struct LocalDb {
    conn: Mutex<Connection>,
}

impl LocalDb {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .context("enable sqlite wal")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn upsert_player(&self, category: Category, player: &Player) -> Result<()> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        conn.execute(
            r#"
            INSERT INTO jugadores (
                id, categoria, nombre, apodo, apellido, numero, posicion, posicion_2, fecha_nacimiento
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                categoria = excluded.categoria,
                nombre = excluded.nombre,
                apodo = excluded.apodo,
                apellido = excluded.apellido,
                numero = excluded.numero,
                posicion = excluded.posicion,
                posicion_2 = excluded.posicion_2,
                fecha_nacimiento = excluded.fecha_nacimiento
            "#,
            params![
                player.id,
                category.db_value(),
                player.first_name,
                player.nickname,
                player.last_name,
                player.jersey_number,
                player.position.map(Position::code),
                player.secondary_position.map(Position::code),
                player.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
            ],
        )
        .context("upsert player")?;
        Ok(())
    }

    pub fn upsert_match(&self, fixture: &Match) -> Result<()> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        conn.execute(
            r#"
            INSERT INTO fixture_partidos (id, categoria, rival, fecha_partido, hora, cancha, estado)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                categoria = excluded.categoria,
                rival = excluded.rival,
                fecha_partido = excluded.fecha_partido,
                hora = excluded.hora,
                cancha = excluded.cancha,
                estado = excluded.estado
            "#,
            params![
                fixture.id,
                fixture.category.db_value(),
                fixture.opponent,
                fixture.date.format("%Y-%m-%d").to_string(),
                fixture.kickoff.map(|t| t.format("%H:%M").to_string()),
                fixture.venue,
                fixture.status.db_value(),
            ],
        )
        .context("upsert match")?;
        Ok(())
    }

    pub fn insert_scorer(&self, category: Category, season: &str, line: &ScorerLine) -> Result<()> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        conn.execute(
            "INSERT INTO goleadores (categoria, temporada, nombre_jugador, goles, asistencias)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![category.db_value(), season, line.name, line.goals, line.assists],
        )
        .context("insert scorer")?;
        Ok(())
    }

    pub fn attendance_row_count(&self, match_id: &str) -> Result<usize> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        let n = conn
            .query_row(
                "SELECT COUNT(*) FROM asistencias_partido WHERE partido_id = ?1",
                params![match_id],
                |row| row.get::<_, i64>(0),
            )
            .context("count attendance rows")?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    pub fn stored_state(&self, match_id: &str, player_id: &str) -> Result<Option<RsvpState>> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        let raw = conn
            .query_row(
                "SELECT estado_asistencia FROM asistencias_partido
                 WHERE partido_id = ?1 AND jugador_id = ?2",
                params![match_id, player_id],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("query attendance state")?;
        Ok(raw.as_deref().and_then(RsvpState::from_db_value))
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS jugadores (
            id TEXT PRIMARY KEY,
            categoria TEXT NOT NULL,
            nombre TEXT NOT NULL,
            apodo TEXT NULL,
            apellido TEXT NOT NULL,
            numero INTEGER NULL,
            posicion TEXT NULL,
            posicion_2 TEXT NULL,
            fecha_nacimiento TEXT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_jugadores_categoria ON jugadores(categoria);

        CREATE TABLE IF NOT EXISTS fixture_partidos (
            id TEXT PRIMARY KEY,
            categoria TEXT NOT NULL,
            rival TEXT NOT NULL,
            fecha_partido TEXT NOT NULL,
            hora TEXT NULL,
            cancha TEXT NULL,
            estado TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_fixture_categoria_fecha
            ON fixture_partidos(categoria, fecha_partido);

        CREATE TABLE IF NOT EXISTS asistencias_partido (
            partido_id TEXT NOT NULL,
            jugador_id TEXT NOT NULL,
            estado_asistencia TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (partido_id, jugador_id)
        );

        CREATE TABLE IF NOT EXISTS goleadores (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            categoria TEXT NOT NULL,
            temporada TEXT NOT NULL,
            nombre_jugador TEXT NOT NULL,
            goles INTEGER NOT NULL DEFAULT 0,
            asistencias INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

impl ClubStore for LocalDb {
    fn roster(&self, category: Category) -> Result<Vec<Player>> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, nombre, apodo, apellido, numero, posicion, posicion_2, fecha_nacimiento
                FROM jugadores
                WHERE categoria = ?1
                ORDER BY apellido ASC, nombre ASC
                "#,
            )
            .context("prepare roster query")?;
        let rows = stmt
            .query_map(params![category.db_value()], |row| {
                Ok(Player {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    nickname: row.get(2)?,
                    last_name: row.get(3)?,
                    jersey_number: row.get(4)?,
                    position: row
                        .get::<_, Option<String>>(5)?
                        .as_deref()
                        .and_then(Position::normalize),
                    secondary_position: row
                        .get::<_, Option<String>>(6)?
                        .as_deref()
                        .and_then(Position::normalize),
                    birth_date: row
                        .get::<_, Option<String>>(7)?
                        .as_deref()
                        .and_then(parse_match_date),
                })
            })
            .context("query roster")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode player row")?);
        }
        Ok(out)
    }

    fn upcoming_matches(
        &self,
        category: Category,
        from: NaiveDate,
        limit: usize,
    ) -> Result<Vec<Match>> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, rival, fecha_partido, hora, cancha, estado
                FROM fixture_partidos
                WHERE categoria = ?1
                  AND estado = ?2
                  AND fecha_partido >= ?3
                ORDER BY fecha_partido ASC, id ASC
                LIMIT ?4
                "#,
            )
            .context("prepare upcoming query")?;
        let rows = stmt
            .query_map(
                params![
                    category.db_value(),
                    MatchStatus::Scheduled.db_value(),
                    from.format("%Y-%m-%d").to_string(),
                    limit as i64
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .context("query upcoming matches")?;

        let mut out = Vec::new();
        for row in rows {
            let (id, opponent, date, kickoff, venue, status) =
                row.context("decode match row")?;
            let Some(date) = parse_match_date(&date) else {
                continue;
            };
            out.push(Match {
                id,
                category,
                opponent,
                date,
                kickoff: kickoff.as_deref().and_then(parse_kickoff),
                venue,
                status: MatchStatus::from_db_value(&status),
            });
        }
        Ok(out)
    }

    fn attendance(&self, match_id: &str) -> Result<Vec<AttendanceRecord>> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT jugador_id, estado_asistencia FROM asistencias_partido WHERE partido_id = ?1",
            )
            .context("prepare attendance query")?;
        let rows = stmt
            .query_map(params![match_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .context("query attendance")?;

        let mut out = Vec::new();
        for row in rows {
            let (player_id, raw_state) = row.context("decode attendance row")?;
            let Some(state) = RsvpState::from_db_value(&raw_state) else {
                continue;
            };
            out.push(AttendanceRecord {
                match_id: match_id.to_string(),
                player_id,
                state,
            });
        }
        Ok(out)
    }

    fn upsert_attendance(&self, record: &AttendanceRecord) -> Result<()> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        conn.execute(
            r#"
            INSERT INTO asistencias_partido (partido_id, jugador_id, estado_asistencia, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(partido_id, jugador_id) DO UPDATE SET
                estado_asistencia = excluded.estado_asistencia,
                updated_at = excluded.updated_at
            "#,
            params![
                record.match_id,
                record.player_id,
                record.state.db_value(),
                Utc::now().to_rfc3339(),
            ],
        )
        .context("upsert attendance")?;
        Ok(())
    }

    fn scorers(&self, category: Category, season: &str) -> Result<Vec<ScorerLine>> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        let mut stmt = conn
            .prepare(
                r#"
                SELECT nombre_jugador, goles, asistencias
                FROM goleadores
                WHERE categoria = ?1 AND temporada = ?2
                ORDER BY goles DESC, id ASC
                "#,
            )
            .context("prepare scorers query")?;
        let rows = stmt
            .query_map(params![category.db_value(), season], |row| {
                Ok(ScorerLine {
                    name: row.get(0)?,
                    goals: row.get(1)?,
                    assists: row.get(2)?,
                })
            })
            .context("query scorers")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode scorer row")?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let db = LocalDb::open_in_memory().unwrap();
        let conn = db.conn.lock().unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn unknown_attendance_values_are_skipped() {
        let db = LocalDb::open_in_memory().unwrap();
        {
            let conn = db.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO asistencias_partido VALUES ('m', 'p', 'quizas', '2026-01-01')",
                [],
            )
            .unwrap();
        }
        assert!(db.attendance("m").unwrap().is_empty());
        assert_eq!(db.attendance_row_count("m").unwrap(), 1);
    }
}
