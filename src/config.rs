use crate::world::Rgb;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Program configuration read from a configuration file
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub(crate) struct Config {
    #[serde(default)]
    pub(crate) project: ProjectConfig,

    #[serde(default)]
    pub(crate) game: GameConfig,

    #[serde(default)]
    pub(crate) food: FoodConfig,

    #[serde(default)]
    pub(crate) settings: SettingsConfig,

    #[serde(default)]
    pub(crate) provider: ProviderConfig,

    #[serde(default)]
    pub(crate) archive: ArchiveConfig,
}

impl Config {
    /// Name of the configuration file looked for in the current directory
    pub(crate) const LOCAL_FILE: &'static str = "snakemind.toml";

    /// Return the per-user configuration file path
    pub(crate) fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_local_dir()
            .map(|p| p.join("snakemind").join("config.toml"))
            .ok_or(ConfigError::NoPath)
    }

    /// Load the configuration from `path` if given; otherwise try
    /// [`Config::LOCAL_FILE`] and then the per-user file, falling back to the
    /// defaults if neither exists.
    pub(crate) fn locate(path: Option<&Path>) -> Result<Config, ConfigError> {
        if let Some(p) = path {
            return Config::load(p, false);
        }
        let local = Path::new(Config::LOCAL_FILE);
        if local.exists() {
            return Config::load(local, false);
        }
        match Config::default_path() {
            Ok(p) => Config::load(&p, true),
            Err(ConfigError::NoPath) => Ok(Config::default()),
            Err(e) => Err(e),
        }
    }

    /// Read configuration from a file on disk.  If the file does not exist and
    /// `allow_missing` is true, a default `Config` value is returned.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the file could not be read, if the file's contents
    /// could not be deserialized, or if the settings are inconsistent.
    pub(crate) fn load(path: &Path, allow_missing: bool) -> Result<Config, ConfigError> {
        let content = match fs_err::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
                return Ok(Config::default())
            }
            Err(e) => return Err(ConfigError::Read(e)),
        };
        let config = toml::from_str::<Config>(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.game.width == 0 || self.game.height == 0 {
            return Err(ConfigError::Invalid("game.width and game.height must be positive"));
        }
        if self.game.block_size == 0 {
            return Err(ConfigError::Invalid("game.block-size must be positive"));
        }
        if self.game.snakes.is_empty() {
            return Err(ConfigError::Invalid("game.snakes must list at least one color"));
        }
        if self.game.start_min > self.game.start_max {
            return Err(ConfigError::Invalid("game.start-min must not exceed game.start-max"));
        }
        if self.food.spawn_min > self.food.spawn_max {
            return Err(ConfigError::Invalid("food.spawn-min must not exceed food.spawn-max"));
        }
        Ok(())
    }
}

/// Details shown in the banner printed when the program exits
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub(crate) struct ProjectConfig {
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) author: String,
}

impl Default for ProjectConfig {
    fn default() -> ProjectConfig {
        ProjectConfig {
            name: String::from("snakemind"),
            version: String::from(env!("CARGO_PKG_VERSION")),
            author: String::from("unknown"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub(crate) struct GameConfig {
    pub(crate) title: String,

    /// Board width in blocks
    pub(crate) width: u16,

    /// Board height in blocks
    pub(crate) height: u16,

    /// Number of terminal columns used to draw one block
    pub(crate) block_size: u16,

    /// One entry per snake; the roster is created in this order
    pub(crate) snakes: Vec<Rgb>,

    pub(crate) background_color: Rgb,
    pub(crate) grid_color: Rgb,

    /// Lower bound of each coordinate of a snake's starting position
    pub(crate) start_min: i32,

    /// Upper bound (inclusive) of each coordinate of a snake's starting
    /// position
    pub(crate) start_max: i32,
}

impl GameConfig {
    pub(crate) fn start_range(&self) -> RangeInclusive<i32> {
        self.start_min..=self.start_max
    }
}

impl Default for GameConfig {
    fn default() -> GameConfig {
        GameConfig {
            title: String::from("Snake Arena"),
            width: 30,
            height: 20,
            block_size: 2,
            snakes: vec![Rgb::new(0, 200, 0), Rgb::new(220, 50, 50)],
            background_color: Rgb::new(0, 0, 0),
            grid_color: Rgb::new(60, 60, 60),
            start_min: 5,
            start_max: 15,
        }
    }
}

/// How much food to scatter at the start of a session
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub(crate) struct FoodConfig {
    pub(crate) spawn_min: usize,
    pub(crate) spawn_max: usize,
    pub(crate) per_snake: usize,
    pub(crate) set_count: usize,
}

impl FoodConfig {
    /// `min(spawn_max, snakes * per_snake + set_count)`, raised to at least
    /// `spawn_min`
    pub(crate) fn count(&self, snakes: usize) -> usize {
        snakes
            .saturating_mul(self.per_snake)
            .saturating_add(self.set_count)
            .min(self.spawn_max)
            .max(self.spawn_min)
    }
}

impl Default for FoodConfig {
    fn default() -> FoodConfig {
        FoodConfig {
            spawn_min: 3,
            spawn_max: 10,
            per_snake: 2,
            set_count: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub(crate) struct SettingsConfig {
    /// Pause after every move, in milliseconds
    pub(crate) move_delay_ms: u64,
    pub(crate) show_header: bool,
    pub(crate) debug_mode: bool,
}

impl SettingsConfig {
    pub(crate) fn move_delay(&self) -> Duration {
        Duration::from_millis(self.move_delay_ms)
    }
}

impl Default for SettingsConfig {
    fn default() -> SettingsConfig {
        SettingsConfig {
            move_delay_ms: 200,
            show_header: true,
            debug_mode: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ProviderKind {
    /// Ask a Gemini-compatible text-generation endpoint
    #[default]
    Gemini,
    /// Pick moves locally without any network access
    Greedy,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub(crate) struct ProviderConfig {
    pub(crate) kind: ProviderKind,
    pub(crate) endpoint: String,
    pub(crate) model: String,

    /// Name of the environment variable holding the API key
    pub(crate) api_key_env: String,

    /// File whose contents replace the built-in system instruction
    pub(crate) system_prompt_file: Option<PathBuf>,

    pub(crate) temperature: f32,
    pub(crate) top_p: f32,
    pub(crate) top_k: u32,
    pub(crate) max_output_tokens: u32,

    /// Timeout for a single HTTP request
    pub(crate) timeout_secs: u64,

    /// Wait between re-requests when the provider gives back nothing
    pub(crate) poll_interval_ms: u64,

    /// Give up after this many empty replies in a row.  Unset means keep
    /// asking forever.
    pub(crate) max_polls: Option<NonZeroU32>,
}

impl ProviderConfig {
    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ProviderConfig {
    fn default() -> ProviderConfig {
        ProviderConfig {
            kind: ProviderKind::Gemini,
            endpoint: String::from("https://generativelanguage.googleapis.com/v1beta"),
            model: String::from("gemini-2.0-flash"),
            api_key_env: String::from("API_KEY"),
            system_prompt_file: None,
            temperature: 1.0,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 8192,
            timeout_secs: 60,
            poll_interval_ms: 100,
            max_polls: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub(crate) struct ArchiveConfig {
    /// Directory under which each session gets a subdirectory named after
    /// its ID
    pub(crate) log_root: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> ArchiveConfig {
        ArchiveConfig {
            log_root: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to determine path to local configuration directory")]
    NoPath,
    #[error("failed to read configuration file")]
    Read(#[from] std::io::Error),
    #[error("failed to parse configuration file")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let config = toml::from_str::<Config>("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_file() {
        let src = r#"
[project]
name = "Snake Arena"
version = "1.2"
author = "Somebody"

[game]
title = "Arena"
width = 20
height = 20
block-size = 1
snakes = [[255, 0, 0], [0, 0, 255], [0, 255, 0]]
background-color = [10, 10, 10]
grid-color = [50, 50, 50]

[food]
spawn-min = 2
spawn-max = 6
per-snake = 1
set-count = 0

[settings]
move-delay-ms = 0
show-header = false
debug-mode = true

[provider]
kind = "greedy"
model = "gemini-1.5-pro"
max-polls = 5
poll-interval-ms = 10

[archive]
log-root = "/tmp/arena"
"#;
        let config = toml::from_str::<Config>(src).unwrap();
        assert_eq!(config.project.author, "Somebody");
        assert_eq!(config.game.width, 20);
        assert_eq!(config.game.block_size, 1);
        assert_eq!(
            config.game.snakes,
            [Rgb::new(255, 0, 0), Rgb::new(0, 0, 255), Rgb::new(0, 255, 0)]
        );
        assert_eq!(config.game.start_range(), 5..=15);
        assert_eq!(
            config.food,
            FoodConfig {
                spawn_min: 2,
                spawn_max: 6,
                per_snake: 1,
                set_count: 0,
            }
        );
        assert_eq!(config.settings.move_delay(), Duration::ZERO);
        assert!(!config.settings.show_header);
        assert!(config.settings.debug_mode);
        assert_eq!(config.provider.kind, ProviderKind::Greedy);
        assert_eq!(config.provider.model, "gemini-1.5-pro");
        assert_eq!(config.provider.api_key_env, "API_KEY");
        assert_eq!(config.provider.max_polls, NonZeroU32::new(5));
        assert_eq!(config.provider.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.archive.log_root, PathBuf::from("/tmp/arena"));
    }

    #[rstest]
    #[case("[game]\nwidth = 0")]
    #[case("[game]\nblock-size = 0")]
    #[case("[game]\nsnakes = []")]
    #[case("[game]\nstart-min = 9\nstart-max = 3")]
    #[case("[food]\nspawn-min = 9\nspawn-max = 3")]
    fn invalid_settings(#[case] src: &str) {
        let config = toml::from_str::<Config>(src).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn bad_color_is_a_parse_error() {
        assert!(toml::from_str::<Config>("[game]\nsnakes = [[1, 2]]").is_err());
        assert!(toml::from_str::<Config>("[game]\nsnakes = [[1, 2, 300]]").is_err());
    }

    #[rstest]
    #[case(2, FoodConfig { spawn_min: 3, spawn_max: 10, per_snake: 2, set_count: 1 }, 5)]
    #[case(8, FoodConfig { spawn_min: 3, spawn_max: 10, per_snake: 2, set_count: 1 }, 10)]
    #[case(1, FoodConfig { spawn_min: 4, spawn_max: 10, per_snake: 1, set_count: 0 }, 4)]
    #[case(0, FoodConfig { spawn_min: 0, spawn_max: 0, per_snake: 5, set_count: 5 }, 0)]
    fn food_count(#[case] snakes: usize, #[case] food: FoodConfig, #[case] expected: usize) {
        assert_eq!(food.count(snakes), expected);
    }

    #[test]
    fn sample_config() {
        let config =
            toml::from_str::<Config>(include_str!("../demos/snakemind.toml")).unwrap();
        assert!(config.validate().is_ok());
        let mut expected = Config::default();
        expected.project.version = String::from("0.1.0");
        expected.game.snakes.push(Rgb::new(60, 120, 255));
        assert_eq!(config, expected);
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert_eq!(Config::load(&path, true).unwrap(), Config::default());
        assert!(matches!(Config::load(&path, false), Err(ConfigError::Read(_))));
    }

    #[test]
    fn load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[settings]\nmove-delay-ms = 5").unwrap();
        let config = Config::load(file.path(), false).unwrap();
        assert_eq!(config.settings.move_delay_ms, 5);
        assert_eq!(config.game, GameConfig::default());
    }

    #[test]
    fn load_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[game]\nheight = 0").unwrap();
        assert!(matches!(
            Config::load(file.path(), false),
            Err(ConfigError::Invalid(_))
        ));
    }
}
