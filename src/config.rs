use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::{Datelike, Local};

use crate::local_db::{self, LocalDb};
use crate::store::ClubStore;
use crate::supabase::SupabaseClient;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_UPCOMING_LIMIT: usize = 5;
const DEFAULT_PARALLELISM: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Supabase(SupabaseConfig),
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: Backend,
    pub upcoming_limit: usize,
    pub scorers_season: String,
    pub fetch_parallelism: usize,
}

impl Config {
    /// Reads the process environment. Call `dotenvy` first so `.env.local`
    /// and `.env` are visible here.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend_name = get("CLUB_BACKEND")
            .unwrap_or_else(|| "supabase".to_string())
            .to_lowercase();
        let backend = match backend_name.as_str() {
            "supabase" => {
                let url = get("SUPABASE_URL").or_else(|| get("NEXT_PUBLIC_SUPABASE_URL"));
                let anon_key =
                    get("SUPABASE_ANON_KEY").or_else(|| get("NEXT_PUBLIC_SUPABASE_ANON_KEY"));
                let (Some(url), Some(anon_key)) = (url, anon_key) else {
                    return Err(anyhow!(
                        "missing Supabase credentials: set SUPABASE_URL and SUPABASE_ANON_KEY \
                         (or CLUB_BACKEND=sqlite) in .env.local"
                    ));
                };
                let timeout_secs = get("HTTP_TIMEOUT_SECS")
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS)
                    .clamp(2, 60);
                Backend::Supabase(SupabaseConfig {
                    url: url.trim_end_matches('/').to_string(),
                    anon_key,
                    timeout: Duration::from_secs(timeout_secs),
                })
            }
            "sqlite" | "local" => {
                let path = get("CLUB_DB_PATH")
                    .map(PathBuf::from)
                    .or_else(local_db::default_db_path)
                    .ok_or_else(|| anyhow!("unable to resolve sqlite path; set CLUB_DB_PATH"))?;
                Backend::Sqlite { path }
            }
            other => return Err(anyhow!("unknown CLUB_BACKEND '{other}'")),
        };

        let upcoming_limit = get("UPCOMING_LIMIT")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_UPCOMING_LIMIT)
            .clamp(1, 20);
        let scorers_season = get("SCORERS_SEASON").unwrap_or_else(|| Local::now().year().to_string());
        let fetch_parallelism = get("FETCH_PARALLELISM")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_PARALLELISM)
            .clamp(2, 16);

        Ok(Self {
            backend,
            upcoming_limit,
            scorers_season,
            fetch_parallelism,
        })
    }

    pub fn backend_label(&self) -> String {
        match &self.backend {
            Backend::Supabase(cfg) => format!("supabase {}", cfg.url),
            Backend::Sqlite { path } => format!("sqlite {}", path.display()),
        }
    }
}

pub fn open_store(config: &Config) -> Result<Arc<dyn ClubStore>> {
    match &config.backend {
        Backend::Supabase(cfg) => Ok(Arc::new(SupabaseClient::new(cfg)?)),
        Backend::Sqlite { path } => Ok(Arc::new(LocalDb::open(path)?)),
    }
}
