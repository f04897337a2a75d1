use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchMode {
    /// Fan dispatch out over the sharded task channels.
    Tasks,
    /// Run the start handler inline, one match at a time.
    Serial,
}

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Capacity of membership leagues created by the assignment path.
    pub league_capacity: usize,
    /// World size for the monthly bootstrap.
    pub league_count: usize,
    pub shard_count: usize,
    pub orch_mode: OrchMode,
    pub admin_secret: Option<String>,
    pub start_secret: Option<String>,
    pub results_secret: Option<String>,
    pub scheduler_secret: Option<String>,
    pub engine_url: Option<String>,
    pub engine_secret: Option<String>,
    pub engine_timeout: Duration,
    /// A fixture running longer than this is flagged by the watchdog.
    pub watchdog_running_secs: i64,
    pub finalize_watchdog_delay: Duration,
    pub finalize_max_retries: u32,
    /// Disable to keep the in-process daily trigger and watchdog loops off
    /// (tests, one-shot tools).
    pub scheduler_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 18000,
            league_capacity: 22,
            league_count: 25,
            shard_count: 1,
            orch_mode: OrchMode::Serial,
            admin_secret: None,
            start_secret: None,
            results_secret: None,
            scheduler_secret: None,
            engine_url: None,
            engine_secret: None,
            engine_timeout: Duration::from_secs(30),
            watchdog_running_secs: 20 * 60,
            finalize_watchdog_delay: Duration::from_secs(20 * 60),
            finalize_max_retries: 3,
            scheduler_enabled: true,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = ServerConfig::default();
        let orch_mode = match env::var("ORCH_MODE").as_deref() {
            Ok("TASKS") | Ok("tasks") => OrchMode::Tasks,
            _ => OrchMode::Serial,
        };
        ServerConfig {
            port: env_parse("PORT", defaults.port),
            league_capacity: env_parse("LEAGUE_CAPACITY", defaults.league_capacity),
            league_count: env_parse("LEAGUE_COUNT", defaults.league_count),
            shard_count: env_parse("TASKS_SHARDS", defaults.shard_count).max(1),
            orch_mode,
            admin_secret: env_opt("ADMIN_SECRET"),
            start_secret: env_opt("START_SECRET"),
            results_secret: env_opt("RESULTS_SECRET"),
            scheduler_secret: env_opt("SCHEDULER_SECRET"),
            engine_url: env_opt("ENGINE_URL"),
            engine_secret: env_opt("ENGINE_SECRET"),
            engine_timeout: Duration::from_secs(env_parse("ENGINE_TIMEOUT_SECS", 30)),
            watchdog_running_secs: env_parse("WATCHDOG_RUNNING_SECS", defaults.watchdog_running_secs),
            finalize_watchdog_delay: Duration::from_secs(env_parse(
                "FINALIZE_WATCHDOG_DELAY_SEC",
                20 * 60,
            )),
            finalize_max_retries: env_parse("FINALIZE_MAX_RETRIES", defaults.finalize_max_retries),
            scheduler_enabled: env_parse("SCHEDULER_ENABLED", true),
        }
    }
}
