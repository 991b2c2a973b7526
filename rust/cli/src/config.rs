use pokeroom_engine::room::RoomConfig;
use serde::{Deserialize, Serialize};
use std::fs;

pub const CONFIG_ENV: &str = "POKEROOM_CLI_CONFIG";
pub const SEED_ENV: &str = "POKEROOM_SEED";
pub const SEATS_ENV: &str = "POKEROOM_SEATS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub starting_stack: u32,
    pub small_blind: u32,
    pub big_blind: u32,
    pub seats: usize,
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            starting_stack: 1_000,
            small_blind: 5,
            big_blind: 10,
            seats: 2,
            seed: None,
        }
    }
}

impl Config {
    /// The table every offline command plays on: everyone buys in for `starting_stack`.
    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            small_blind: self.small_blind,
            big_blind: self.big_blind,
            max_seats: self.seats,
            min_buy_in: self.big_blind,
            max_buy_in: self.starting_stack.max(self.big_blind),
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Default,
    File,
    Env,
    Flag,
}

#[derive(Debug, Clone, Copy)]
pub struct ConfigSources {
    pub starting_stack: ValueSource,
    pub small_blind: ValueSource,
    pub big_blind: ValueSource,
    pub seats: ValueSource,
    pub seed: ValueSource,
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self {
            starting_stack: ValueSource::Default,
            small_blind: ValueSource::Default,
            big_blind: ValueSource::Default,
            seats: ValueSource::Default,
            seed: ValueSource::Default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigResolved {
    pub config: Config,
    pub sources: ConfigSources,
}

/// Per-command flags; they win over every other layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub seed: Option<u64>,
    pub seats: Option<usize>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}
impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read {CONFIG_ENV} file: {e}"),
            ConfigError::Parse(e) => write!(f, "cannot parse {CONFIG_ENV} file: {e}"),
            ConfigError::Invalid(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ConfigError {}

pub fn load_with_sources(overrides: Overrides) -> Result<ConfigResolved, ConfigError> {
    let mut cfg = Config::default();
    let mut sources = ConfigSources::default();

    if let Some(path) = non_empty_var(CONFIG_ENV) {
        let s = fs::read_to_string(path)?;
        let f: FileConfig = toml::from_str(&s)?;
        if let Some(v) = f.starting_stack {
            cfg.starting_stack = v;
            sources.starting_stack = ValueSource::File;
        }
        if let Some(v) = f.small_blind {
            cfg.small_blind = v;
            sources.small_blind = ValueSource::File;
        }
        if let Some(v) = f.big_blind {
            cfg.big_blind = v;
            sources.big_blind = ValueSource::File;
        }
        if let Some(v) = f.seats {
            cfg.seats = v;
            sources.seats = ValueSource::File;
        }
        if let Some(v) = f.seed {
            cfg.seed = Some(v);
            sources.seed = ValueSource::File;
        }
    }

    if let Some(seed) = non_empty_var(SEED_ENV) {
        cfg.seed = Some(
            seed.parse()
                .map_err(|_| ConfigError::Invalid(format!("Invalid {SEED_ENV}: {seed}")))?,
        );
        sources.seed = ValueSource::Env;
    }
    if let Some(seats) = non_empty_var(SEATS_ENV) {
        cfg.seats = seats
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("Invalid {SEATS_ENV}: {seats}")))?;
        sources.seats = ValueSource::Env;
    }

    if let Some(seed) = overrides.seed {
        cfg.seed = Some(seed);
        sources.seed = ValueSource::Flag;
    }
    if let Some(seats) = overrides.seats {
        cfg.seats = seats;
        sources.seats = ValueSource::Flag;
    }

    validate(&cfg)?;
    Ok(ConfigResolved {
        config: cfg,
        sources,
    })
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    starting_stack: Option<u32>,
    #[serde(default)]
    small_blind: Option<u32>,
    #[serde(default)]
    big_blind: Option<u32>,
    #[serde(default)]
    seats: Option<usize>,
    #[serde(default)]
    seed: Option<u64>,
}

fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.starting_stack < cfg.big_blind {
        return Err(ConfigError::Invalid(format!(
            "Invalid configuration: starting_stack ({}) is below big_blind ({})",
            cfg.starting_stack, cfg.big_blind
        )));
    }
    cfg.room_config()
        .validate()
        .map_err(|e| ConfigError::Invalid(format!("Invalid configuration: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write as _;

    fn clear_env() {
        unsafe {
            std::env::remove_var(CONFIG_ENV);
            std::env::remove_var(SEED_ENV);
            std::env::remove_var(SEATS_ENV);
        }
    }

    #[test]
    #[serial]
    fn defaults_when_nothing_is_set() {
        clear_env();
        let resolved = load_with_sources(Overrides::default()).unwrap();
        assert_eq!(resolved.config, Config::default());
        assert_eq!(resolved.sources.seats, ValueSource::Default);
        assert_eq!(resolved.sources.seed, ValueSource::Default);
    }

    #[test]
    #[serial]
    fn file_then_env_then_flags() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "starting_stack = 500\nseats = 4\nseed = 1").unwrap();
        unsafe {
            std::env::set_var(CONFIG_ENV, file.path());
            std::env::set_var(SEED_ENV, "2");
        }

        let resolved = load_with_sources(Overrides {
            seed: None,
            seats: Some(3),
        })
        .unwrap();
        clear_env();

        assert_eq!(resolved.config.starting_stack, 500);
        assert_eq!(resolved.sources.starting_stack, ValueSource::File);
        assert_eq!(resolved.config.seed, Some(2));
        assert_eq!(resolved.sources.seed, ValueSource::Env);
        assert_eq!(resolved.config.seats, 3);
        assert_eq!(resolved.sources.seats, ValueSource::Flag);
        assert_eq!(resolved.sources.big_blind, ValueSource::Default);
    }

    #[test]
    #[serial]
    fn bad_env_values_are_reported() {
        clear_env();
        unsafe { std::env::set_var(SEATS_ENV, "many") };
        let err = load_with_sources(Overrides::default()).unwrap_err();
        clear_env();
        assert!(err.to_string().contains(SEATS_ENV));
    }

    #[test]
    #[serial]
    fn invalid_table_is_rejected() {
        clear_env();
        let err = load_with_sources(Overrides {
            seed: None,
            seats: Some(11),
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("max_seats")));
    }

    #[test]
    #[serial]
    fn unknown_file_keys_fail_to_parse() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "level = 3").unwrap();
        unsafe { std::env::set_var(CONFIG_ENV, file.path()) };
        let err = load_with_sources(Overrides::default()).unwrap_err();
        clear_env();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
