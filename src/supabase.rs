use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;

use crate::config::SupabaseConfig;
use crate::model::{
    AttendanceRecord, Category, Match, MatchStatus, RsvpState, parse_kickoff, parse_match_date,
};
use crate::roster::{Player, Position};
use crate::scorers::ScorerLine;
use crate::store::ClubStore;

const ROSTER_COLUMNS: &str =
    "id,nombre,apodo,apellido,numero,posicion,posicion_2,fecha_nacimiento";
const MATCH_COLUMNS: &str = "id,categoria,rival,fecha_partido,hora,cancha,estado";
const ATTENDANCE_COLUMNS: &str = "partido_id,jugador_id,estado_asistencia";
const SCORER_COLUMNS: &str = "nombre_jugador,goles,asistencias";

/// PostgREST client for the hosted club database. Built once from config
/// and shared through `Arc<dyn ClubStore>`.
pub struct SupabaseClient {
    base_url: String,
    anon_key: String,
    http: Client,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            http,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    fn get_rows(&self, table: &str, query: &[(&str, String)]) -> Result<String> {
        let req = self
            .authed(self.http.get(self.table_url(table)))
            .header("Accept", "application/json")
            .query(query);
        let resp = req.send().with_context(|| format!("request {table} failed"))?;
        let status = resp.status();
        let body = resp.text().context("read response body")?;
        if !status.is_success() {
            return Err(anyhow!("http {}: {}", status, body.trim()));
        }
        Ok(body)
    }
}

impl ClubStore for SupabaseClient {
    fn roster(&self, category: Category) -> Result<Vec<Player>> {
        let body = self.get_rows(
            "jugadores",
            &[
                ("select", ROSTER_COLUMNS.to_string()),
                ("categoria", format!("eq.{}", category.db_value())),
                ("order", "apellido.asc".to_string()),
            ],
        )?;
        parse_roster_json(&body)
    }

    fn upcoming_matches(
        &self,
        category: Category,
        from: NaiveDate,
        limit: usize,
    ) -> Result<Vec<Match>> {
        let body = self.get_rows(
            "fixture_partidos",
            &[
                ("select", MATCH_COLUMNS.to_string()),
                ("categoria", format!("eq.{}", category.db_value())),
                ("estado", format!("eq.{}", MatchStatus::Scheduled.db_value())),
                ("fecha_partido", format!("gte.{}", from.format("%Y-%m-%d"))),
                ("order", "fecha_partido.asc".to_string()),
                ("limit", limit.to_string()),
            ],
        )?;
        parse_matches_json(&body, category)
    }

    fn attendance(&self, match_id: &str) -> Result<Vec<AttendanceRecord>> {
        let body = self.get_rows(
            "asistencias_partido",
            &[
                ("select", ATTENDANCE_COLUMNS.to_string()),
                ("partido_id", format!("eq.{match_id}")),
            ],
        )?;
        parse_attendance_json(&body)
    }

    fn upsert_attendance(&self, record: &AttendanceRecord) -> Result<()> {
        let resp = self
            .authed(self.http.post(self.table_url("asistencias_partido")))
            .query(&[("on_conflict", "partido_id,jugador_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[record])
            .send()
            .context("upsert attendance failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(anyhow!("http {}: {}", status, body.trim()));
        }
        Ok(())
    }

    fn scorers(&self, category: Category, season: &str) -> Result<Vec<ScorerLine>> {
        let body = self.get_rows(
            "goleadores",
            &[
                ("select", SCORER_COLUMNS.to_string()),
                ("temporada", format!("eq.{season}")),
                ("categoria", format!("eq.{}", category.db_value())),
                ("order", "goles.desc".to_string()),
            ],
        )?;
        parse_scorers_json(&body)
    }
}

fn parse_rows(raw: &str, what: &str) -> Result<Vec<Value>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let root: Value =
        serde_json::from_str(trimmed).with_context(|| format!("invalid {what} json"))?;
    match root {
        Value::Array(rows) => Ok(rows),
        _ => Err(anyhow!("{what} json is not an array")),
    }
}

pub fn parse_roster_json(raw: &str) -> Result<Vec<Player>> {
    let rows = parse_rows(raw, "roster")?;
    Ok(rows.iter().filter_map(player_from_row).collect())
}

fn player_from_row(row: &Value) -> Option<Player> {
    let id = pick_id(row, "id")?;
    let first_name = pick_string(row, "nombre")?;
    let last_name = pick_string(row, "apellido").unwrap_or_default();
    Some(Player {
        id,
        first_name,
        nickname: pick_string(row, "apodo"),
        last_name,
        jersey_number: pick_u32(row, "numero"),
        position: pick_string(row, "posicion")
            .as_deref()
            .and_then(Position::normalize),
        secondary_position: pick_string(row, "posicion_2")
            .as_deref()
            .and_then(Position::normalize),
        birth_date: pick_string(row, "fecha_nacimiento")
            .as_deref()
            .and_then(parse_match_date),
    })
}

/// Rows whose `categoria` is missing or unknown take `category`, the filter
/// the request was made with.
pub fn parse_matches_json(raw: &str, category: Category) -> Result<Vec<Match>> {
    let rows = parse_rows(raw, "fixture")?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let id = pick_id(row, "id")?;
            let date = pick_string(row, "fecha_partido")
                .as_deref()
                .and_then(parse_match_date)?;
            Some(Match {
                id,
                category: pick_string(row, "categoria")
                    .as_deref()
                    .and_then(Category::from_db_value)
                    .unwrap_or(category),
                opponent: pick_string(row, "rival").unwrap_or_else(|| "TBD".to_string()),
                date,
                kickoff: pick_string(row, "hora").as_deref().and_then(parse_kickoff),
                venue: pick_string(row, "cancha"),
                status: pick_string(row, "estado")
                    .as_deref()
                    .map(MatchStatus::from_db_value)
                    .unwrap_or(MatchStatus::Scheduled),
            })
        })
        .collect())
}

pub fn parse_attendance_json(raw: &str) -> Result<Vec<AttendanceRecord>> {
    let rows = parse_rows(raw, "attendance")?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            Some(AttendanceRecord {
                match_id: pick_id(row, "partido_id")?,
                player_id: pick_id(row, "jugador_id")?,
                state: pick_string(row, "estado_asistencia")
                    .as_deref()
                    .and_then(RsvpState::from_db_value)?,
            })
        })
        .collect())
}

pub fn parse_scorers_json(raw: &str) -> Result<Vec<ScorerLine>> {
    let rows = parse_rows(raw, "scorers")?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            Some(ScorerLine {
                name: pick_string(row, "nombre_jugador")?,
                goals: pick_u32(row, "goles").unwrap_or(0),
                assists: pick_u32(row, "asistencias").unwrap_or(0),
            })
        })
        .collect())
}

fn pick_string(row: &Value, key: &str) -> Option<String> {
    let s = row.get(key)?.as_str()?.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

fn pick_id(row: &Value, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn pick_u32(row: &Value, key: &str) -> Option<u32> {
    match row.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_null_bodies_are_empty() {
        assert!(parse_roster_json("").unwrap().is_empty());
        assert!(parse_attendance_json(" null ").unwrap().is_empty());
    }

    #[test]
    fn object_body_is_an_error() {
        let err = parse_scorers_json(r#"{"message":"JWT expired"}"#).unwrap_err();
        assert!(err.to_string().contains("not an array"));
    }

    #[test]
    fn numeric_ids_are_stringified() {
        let rows = parse_attendance_json(
            r#"[{"partido_id": 12, "jugador_id": "p-1", "estado_asistencia": "en_duda"}]"#,
        )
        .unwrap();
        assert_eq!(rows[0].match_id, "12");
        assert_eq!(rows[0].state, RsvpState::Tentative);
    }
}
