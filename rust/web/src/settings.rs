//! Server settings.
//!
//! Values are layered: built-in defaults, then the TOML file named by `--config` or
//! `POKEROOM_CONFIG`, then `POKEROOM_*` environment variables, then command-line flags.
//! Every value remembers which layer set it.

use crate::room_actor::RoomOptions;
use crate::server::ServerConfig;
use pokeroom_engine::room::RoomConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_ENV: &str = "POKEROOM_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub small_blind: u32,
    pub big_blind: u32,
    pub max_seats: usize,
    pub min_buy_in: u32,
    pub max_buy_in: u32,
    /// Seconds a seat may take before the room checks or folds for it.
    pub action_timeout_secs: Option<u64>,
    /// Commands a room will queue before senders wait.
    pub inbox_capacity: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        let room = RoomConfig::default();
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            small_blind: room.small_blind,
            big_blind: room.big_blind,
            max_seats: room.max_seats,
            min_buy_in: room.min_buy_in,
            max_buy_in: room.max_buy_in,
            action_timeout_secs: None,
            inbox_capacity: RoomOptions::default().inbox_capacity,
        }
    }
}

impl AppSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.room_config()
            .validate()
            .map_err(|err| SettingsError::InvalidValue(err.to_string()))?;
        if self.host.trim().is_empty() {
            return Err(SettingsError::InvalidValue("host cannot be empty".to_string()));
        }
        if self.action_timeout_secs == Some(0) {
            return Err(SettingsError::InvalidValue(
                "action_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.inbox_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "inbox_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            small_blind: self.small_blind,
            big_blind: self.big_blind,
            max_seats: self.max_seats,
            min_buy_in: self.min_buy_in,
            max_buy_in: self.max_buy_in,
            seed: None,
        }
    }

    pub fn room_options(&self) -> RoomOptions {
        RoomOptions {
            config: self.room_config(),
            action_timeout: self.action_timeout_secs.map(Duration::from_secs),
            inbox_capacity: self.inbox_capacity,
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.host.clone(), self.port).with_room_defaults(self.room_options())
    }

    /// Resolves settings from the process environment.
    pub fn load(flags: &SettingsOverrides) -> Result<ResolvedSettings, SettingsError> {
        Self::resolve(flags, |key| std::env::var(key).ok())
    }

    /// Resolves settings with an explicit environment lookup.
    pub fn resolve<E>(flags: &SettingsOverrides, env: E) -> Result<ResolvedSettings, SettingsError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let mut settings = AppSettings::default();
        let mut sources = SettingsSources::default();

        let file = flags
            .config
            .clone()
            .or_else(|| env(CONFIG_ENV).filter(|v| !v.is_empty()).map(PathBuf::from));
        if let Some(path) = &file {
            let layer = FileSettings::read(path)?;
            layer.apply(&mut settings, &mut sources);
        }

        macro_rules! env_layer {
            ($var:literal, $field:ident, $wrap:expr) => {
                if let Some(raw) = env($var).filter(|v| !v.is_empty()) {
                    let parsed = parse_env($var, &raw)?;
                    settings.$field = $wrap(parsed);
                    sources.$field = ValueSource::Env;
                }
            };
        }
        env_layer!("POKEROOM_HOST", host, |v: String| v);
        env_layer!("POKEROOM_PORT", port, |v: u16| v);
        env_layer!("POKEROOM_SMALL_BLIND", small_blind, |v: u32| v);
        env_layer!("POKEROOM_BIG_BLIND", big_blind, |v: u32| v);
        env_layer!("POKEROOM_MAX_SEATS", max_seats, |v: usize| v);
        env_layer!("POKEROOM_ACTION_TIMEOUT_SECS", action_timeout_secs, |v: u64| Some(v));

        if let Some(host) = &flags.host {
            settings.host = host.clone();
            sources.host = ValueSource::Flag;
        }
        if let Some(port) = flags.port {
            settings.port = port;
            sources.port = ValueSource::Flag;
        }

        settings.validate()?;
        Ok(ResolvedSettings {
            settings,
            sources,
            file,
        })
    }
}

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Default,
    File,
    Env,
    Flag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SettingsSources {
    pub host: ValueSource,
    pub port: ValueSource,
    pub small_blind: ValueSource,
    pub big_blind: ValueSource,
    pub max_seats: ValueSource,
    pub min_buy_in: ValueSource,
    pub max_buy_in: ValueSource,
    pub action_timeout_secs: ValueSource,
    pub inbox_capacity: ValueSource,
}

impl Default for SettingsSources {
    fn default() -> Self {
        Self {
            host: ValueSource::Default,
            port: ValueSource::Default,
            small_blind: ValueSource::Default,
            big_blind: ValueSource::Default,
            max_seats: ValueSource::Default,
            min_buy_in: ValueSource::Default,
            max_buy_in: ValueSource::Default,
            action_timeout_secs: ValueSource::Default,
            inbox_capacity: ValueSource::Default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub settings: AppSettings,
    pub sources: SettingsSources,
    /// The file layer, when one was read.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    host: Option<String>,
    port: Option<u16>,
    small_blind: Option<u32>,
    big_blind: Option<u32>,
    max_seats: Option<usize>,
    min_buy_in: Option<u32>,
    max_buy_in: Option<u32>,
    action_timeout_secs: Option<u64>,
    inbox_capacity: Option<usize>,
}

impl FileSettings {
    fn read(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|err| SettingsError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    fn apply(self, settings: &mut AppSettings, sources: &mut SettingsSources) {
        macro_rules! file_layer {
            ($($field:ident => $wrap:expr),* $(,)?) => {
                $(
                    if let Some(v) = self.$field {
                        settings.$field = $wrap(v);
                        sources.$field = ValueSource::File;
                    }
                )*
            };
        }
        file_layer! {
            host => |v: String| v,
            port => |v: u16| v,
            small_blind => |v: u32| v,
            big_blind => |v: u32| v,
            max_seats => |v: usize| v,
            min_buy_in => |v: u32| v,
            max_buy_in => |v: u32| v,
            action_timeout_secs => |v: u64| Some(v),
            inbox_capacity => |v: usize| v,
        }
    }
}

fn parse_env<T: FromStr>(var: &'static str, raw: &str) -> Result<T, SettingsError> {
    raw.trim().parse().map_err(|_| SettingsError::InvalidEnv {
        var,
        value: raw.to_string(),
    })
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
    #[error("environment variable {var} has invalid value {value:?}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("failed to read settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        let resolved = AppSettings::resolve(&SettingsOverrides::default(), env_of(&[])).unwrap();
        assert_eq!(resolved.settings, AppSettings::default());
        assert_eq!(resolved.sources, SettingsSources::default());
        assert!(resolved.file.is_none());
    }

    #[test]
    fn layers_apply_in_order() {
        let file = toml_file("port = 9000\nsmall_blind = 10\nbig_blind = 20\nmin_buy_in = 200\n");
        let path = file.path().to_string_lossy().to_string();
        let env = env_of(&[
            (CONFIG_ENV, path.as_str()),
            ("POKEROOM_PORT", "9100"),
            ("POKEROOM_ACTION_TIMEOUT_SECS", "30"),
        ]);
        let flags = SettingsOverrides {
            port: Some(9200),
            ..SettingsOverrides::default()
        };

        let resolved = AppSettings::resolve(&flags, env).unwrap();
        let s = &resolved.settings;
        assert_eq!(s.port, 9200);
        assert_eq!(resolved.sources.port, ValueSource::Flag);
        assert_eq!((s.small_blind, s.big_blind), (10, 20));
        assert_eq!(resolved.sources.big_blind, ValueSource::File);
        assert_eq!(s.action_timeout_secs, Some(30));
        assert_eq!(resolved.sources.action_timeout_secs, ValueSource::Env);
        assert_eq!(resolved.sources.host, ValueSource::Default);
        assert_eq!(s.room_options().action_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn config_flag_wins_over_env_file() {
        let from_env = toml_file("port = 1111\n");
        let from_flag = toml_file("port = 2222\n");
        let env_path = from_env.path().to_string_lossy().to_string();
        let flags = SettingsOverrides {
            config: Some(from_flag.path().to_path_buf()),
            ..SettingsOverrides::default()
        };
        let resolved = AppSettings::resolve(&flags, env_of(&[(CONFIG_ENV, env_path.as_str())])).unwrap();
        assert_eq!(resolved.settings.port, 2222);
    }

    #[test]
    fn bad_env_value_is_reported() {
        let err = AppSettings::resolve(
            &SettingsOverrides::default(),
            env_of(&[("POKEROOM_MAX_SEATS", "many")]),
        )
        .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidEnv { var: "POKEROOM_MAX_SEATS", .. }));
    }

    #[test]
    fn validation_rejects_bad_tables() {
        let cases = [
            ("POKEROOM_SMALL_BLIND", "0"),
            ("POKEROOM_BIG_BLIND", "5"),
            ("POKEROOM_MAX_SEATS", "11"),
            ("POKEROOM_MAX_SEATS", "1"),
            ("POKEROOM_ACTION_TIMEOUT_SECS", "0"),
        ];
        for (var, value) in cases {
            let result = AppSettings::resolve(&SettingsOverrides::default(), env_of(&[(var, value)]));
            assert!(
                matches!(result, Err(SettingsError::InvalidValue(_))),
                "{var}={value} should be rejected"
            );
        }

        let file = toml_file("min_buy_in = 5000\nmax_buy_in = 1000\n");
        let flags = SettingsOverrides {
            config: Some(file.path().to_path_buf()),
            ..SettingsOverrides::default()
        };
        assert!(AppSettings::resolve(&flags, env_of(&[])).is_err());
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let file = toml_file("prot = 80\n");
        let flags = SettingsOverrides {
            config: Some(file.path().to_path_buf()),
            ..SettingsOverrides::default()
        };
        let err = AppSettings::resolve(&flags, env_of(&[])).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let flags = SettingsOverrides {
            config: Some(PathBuf::from("/definitely/not/here.toml")),
            ..SettingsOverrides::default()
        };
        let err = AppSettings::resolve(&flags, env_of(&[])).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }
}
