use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::engine::difficulty::{Difficulty, DifficultyTable};
use crate::items::CATEGORIES;

pub const MIN_REPETITIONS: u32 = 1;
pub const MAX_REPETITIONS: u32 = 10;
const MAX_STARTING_LIVES: u32 = 10;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_category")]
    pub default_category: String,
    #[serde(default = "default_difficulty")]
    pub default_difficulty: Difficulty,
    #[serde(default = "default_repetitions")]
    pub default_repetitions: u32,
    #[serde(default = "default_game_mode")]
    pub game_mode: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub difficulties: DifficultyTable,
}

fn default_category() -> String {
    "hiragana".to_string()
}
fn default_difficulty() -> Difficulty {
    Difficulty::Normal
}
fn default_repetitions() -> u32 {
    2
}
fn default_game_mode() -> String {
    "typing".to_string()
}
fn default_data_dir() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kanadr")
        .to_string_lossy()
        .to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_category: default_category(),
            default_difficulty: default_difficulty(),
            default_repetitions: default_repetitions(),
            game_mode: default_game_mode(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            difficulties: DifficultyTable::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let mut config: Config = toml::from_str(&content)?;
            config.validate();
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kanadr")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    /// Clamp out-of-range values from hand-edited or stale config files.
    pub fn validate(&mut self) {
        self.default_repetitions = self
            .default_repetitions
            .clamp(MIN_REPETITIONS, MAX_REPETITIONS);
        for difficulty in Difficulty::ALL {
            let rule = self.difficulties.rule_mut(difficulty);
            rule.starting_lives = rule.starting_lives.clamp(1, MAX_STARTING_LIVES);
        }
        if !CATEGORIES.contains(&self.default_category.as_str()) {
            self.default_category = default_category();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serde_defaults_from_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.default_category, "hiragana");
        assert_eq!(config.default_difficulty, Difficulty::Normal);
        assert_eq!(config.default_repetitions, 2);
        assert_eq!(config.difficulties, DifficultyTable::default());
        assert!(config.data_dir.contains("kanadr"));
    }

    #[test]
    fn test_config_partial_difficulty_override() {
        let toml_str = r#"
default_difficulty = "hard"

[difficulties.hard]
starting_lives = 4
regenerates = true
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_difficulty, Difficulty::Hard);
        let hard = config.difficulties.rule(Difficulty::Hard);
        assert_eq!(hard.starting_lives, 4);
        assert!(hard.regenerates);
        // Untouched levels keep their defaults
        assert_eq!(
            config.difficulties.rule(Difficulty::Easy),
            DifficultyTable::default().rule(Difficulty::Easy)
        );
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config.default_category, deserialized.default_category);
        assert_eq!(config.default_repetitions, deserialized.default_repetitions);
        assert_eq!(config.difficulties, deserialized.difficulties);
    }

    #[test]
    fn test_validate_clamps_values() {
        let mut config = Config::default();
        config.default_repetitions = 0;
        config.difficulties.rule_mut(Difficulty::Expert).starting_lives = 0;
        config.difficulties.rule_mut(Difficulty::Easy).starting_lives = 99;
        config.default_category = "cyrillic".to_string();
        config.validate();

        assert_eq!(config.default_repetitions, 1);
        assert_eq!(config.difficulties.rule(Difficulty::Expert).starting_lives, 1);
        assert_eq!(config.difficulties.rule(Difficulty::Easy).starting_lives, 10);
        assert_eq!(config.default_category, "hiragana");
    }

    #[test]
    fn test_validate_keeps_known_category() {
        let mut config = Config::default();
        config.default_category = "kanji".to_string();
        config.validate();
        assert_eq!(config.default_category, "kanji");
    }
}
