use std::env;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Datelike;

const DATA_DIR: &str = "tm_wrapped";
const DB_FILE: &str = "trackmania_wrapped.sqlite";
const DEFAULT_USERS_FILE: &str = ".users.json";
const DEFAULT_FETCH_PARALLELISM: usize = 6;

/// Account credential for the identity provider, already in `Basic` form.
#[derive(Clone)]
pub struct Credentials {
    basic: String,
}

impl Credentials {
    pub fn from_basic(encoded: &str) -> Self {
        Self {
            basic: encoded.trim().to_string(),
        }
    }

    pub fn from_login(login: &str, password: &str) -> Self {
        Self {
            basic: BASE64.encode(format!("{}:{}", login.trim(), password)),
        }
    }

    pub fn basic(&self) -> &str {
        &self.basic
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credentials(..)")
    }
}

/// Everything one season run needs, resolved once from the environment.
#[derive(Debug, Clone)]
pub struct WrappedConfig {
    pub group_id: Option<String>,
    pub credentials: Option<Credentials>,
    pub season: i32,
    pub db_path: Option<PathBuf>,
    pub users_file: PathBuf,
    pub user_agent: String,
    pub fetch_parallelism: usize,
}

impl WrappedConfig {
    pub fn from_env() -> Result<Self> {
        let group_id = env_non_empty("TM_GROUP_ID");
        let credentials = match env_non_empty("TM_USERPW") {
            Some(encoded) => Some(Credentials::from_basic(&encoded)),
            None => match (env_non_empty("TM_LOGIN"), env::var("TM_PASSWORD").ok()) {
                (Some(login), Some(password)) => Some(Credentials::from_login(&login, &password)),
                _ => None,
            },
        };

        let season = match env_non_empty("TM_SEASON") {
            Some(raw) => raw
                .parse::<i32>()
                .map_err(|_| anyhow!("TM_SEASON must be a year, got {raw:?}"))?,
            None => chrono::Local::now().year(),
        };

        let users_file = env_non_empty("TM_USERS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_USERS_FILE));
        let user_agent = env_non_empty("TM_USER_AGENT")
            .unwrap_or_else(|| format!("tm_wrapped/{}", env!("CARGO_PKG_VERSION")));
        let fetch_parallelism = env::var("TM_FETCH_PARALLELISM")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(DEFAULT_FETCH_PARALLELISM)
            .clamp(2, 32);

        Ok(Self {
            group_id,
            credentials,
            season,
            db_path: env_non_empty("TM_DB_PATH").map(PathBuf::from),
            users_file,
            user_agent,
            fetch_parallelism,
        })
    }

    /// Explicit path, else the per-user data directory.
    pub fn resolve_db_path(&self) -> Option<PathBuf> {
        self.db_path.clone().or_else(default_db_path)
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(DB_FILE))
}

fn app_data_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_DATA_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(DATA_DIR));
        }
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".local").join("share").join(DATA_DIR))
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `--db <path>` or `--db=<path>` from the process arguments.
pub fn parse_db_path_arg() -> Option<PathBuf> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    db_path_from_args(&args)
}

fn db_path_from_args(args: &[String]) -> Option<PathBuf> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--db=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--db" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}
