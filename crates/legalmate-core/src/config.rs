use std::collections::HashMap;

use anyhow::Result;

use crate::db::Db;

/// Full service configuration.
/// Tunable fields are seeded to and loaded from the DB `config` table so
/// they can be adjusted at runtime without env edits. Bind address, port
/// and data dir come from env/.env only.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: String,
    pub web_bind: String,
    pub web_port: u16,

    // Sweeper tuning
    /// Fixed delay between sweep ticks, in seconds.
    pub sweep_interval_s: u64,
    /// Age after which a pending, unassigned review counts as stuck.
    pub stuck_after_s: i64,

    // Simulation tuning
    pub approve_probability: f64,
    /// Bounds of the uniform draw for estimated review time, in hours.
    pub estimate_min_hours: f64,
    pub estimate_max_hours: f64,
}

fn parse_dotenv() -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Ok(contents) = std::fs::read_to_string(".env") else {
        return map;
    };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    map
}

fn get(key: &str, dotenv: &HashMap<String, String>) -> Option<String> {
    std::env::var(key).ok().or_else(|| dotenv.get(key).cloned())
}

fn get_str(key: &str, dotenv: &HashMap<String, String>, default: &str) -> String {
    get(key, dotenv).unwrap_or_else(|| default.to_string())
}

fn get_i64(key: &str, dotenv: &HashMap<String, String>, default: i64) -> i64 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_u64(key: &str, dotenv: &HashMap<String, String>, default: u64) -> u64 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_u16(key: &str, dotenv: &HashMap<String, String>, default: u16) -> u16 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_f64(key: &str, dotenv: &HashMap<String, String>, default: f64) -> f64 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: "store".to_string(),
            web_bind: "127.0.0.1".to_string(),
            web_port: 3400,
            sweep_interval_s: 30,
            stuck_after_s: 300,
            approve_probability: 0.85,
            estimate_min_hours: 1.0,
            estimate_max_hours: 3.0,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let dotenv = parse_dotenv();
        Ok(Config {
            data_dir: get_str("DATA_DIR", &dotenv, "store"),
            web_bind: get_str("WEB_BIND", &dotenv, "127.0.0.1"),
            web_port: get_u16("WEB_PORT", &dotenv, 3400),
            sweep_interval_s: get_u64("SWEEP_INTERVAL_S", &dotenv, 30),
            stuck_after_s: get_i64("STUCK_AFTER_S", &dotenv, 300),
            approve_probability: get_f64("APPROVE_PROBABILITY", &dotenv, 0.85),
            estimate_min_hours: get_f64("ESTIMATE_MIN_HOURS", &dotenv, 1.0),
            estimate_max_hours: get_f64("ESTIMATE_MAX_HOURS", &dotenv, 3.0),
        })
    }

    /// Write tunable fields to DB if not already present (first-run seeding).
    pub fn seed_db(&self, db: &Db) -> Result<()> {
        let entries: &[(&str, String)] = &[
            ("sweep_interval_s", self.sweep_interval_s.to_string()),
            ("stuck_after_s", self.stuck_after_s.to_string()),
            ("approve_probability", self.approve_probability.to_string()),
            ("estimate_min_hours", self.estimate_min_hours.to_string()),
            ("estimate_max_hours", self.estimate_max_hours.to_string()),
        ];
        for (key, value) in entries {
            db.seed_config(key, value)?;
        }
        Ok(())
    }

    /// Return a new Config with tunable fields overridden from DB values.
    pub fn load_from_db(&self, db: &Db) -> Self {
        let mut c = self.clone();
        let get = |key: &str| db.get_config(key).ok().flatten();
        macro_rules! load {
            ($key:expr, $field:expr) => {
                if let Some(v) = get($key).and_then(|s| s.parse().ok()) {
                    $field = v;
                }
            };
        }
        load!("sweep_interval_s", c.sweep_interval_s);
        load!("stuck_after_s", c.stuck_after_s);
        load!("approve_probability", c.approve_probability);
        load!("estimate_min_hours", c.estimate_min_hours);
        load!("estimate_max_hours", c.estimate_max_hours);
        c
    }
}
