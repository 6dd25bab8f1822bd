use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DrillError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Normal,
        Difficulty::Hard,
        Difficulty::Expert,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = DrillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DrillError::InvalidConfig(format!("unknown difficulty: {s}")))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyRule {
    pub starting_lives: u32,
    pub regenerates: bool,
}

/// Starting lives and regeneration policy for each difficulty level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyTable {
    #[serde(default = "default_easy")]
    pub easy: DifficultyRule,
    #[serde(default = "default_normal")]
    pub normal: DifficultyRule,
    #[serde(default = "default_hard")]
    pub hard: DifficultyRule,
    #[serde(default = "default_expert")]
    pub expert: DifficultyRule,
}

fn default_easy() -> DifficultyRule {
    DifficultyRule {
        starting_lives: 5,
        regenerates: true,
    }
}
fn default_normal() -> DifficultyRule {
    DifficultyRule {
        starting_lives: 3,
        regenerates: true,
    }
}
fn default_hard() -> DifficultyRule {
    DifficultyRule {
        starting_lives: 3,
        regenerates: false,
    }
}
fn default_expert() -> DifficultyRule {
    DifficultyRule {
        starting_lives: 1,
        regenerates: false,
    }
}

impl Default for DifficultyTable {
    fn default() -> Self {
        Self {
            easy: default_easy(),
            normal: default_normal(),
            hard: default_hard(),
            expert: default_expert(),
        }
    }
}

impl DifficultyTable {
    pub fn rule(&self, difficulty: Difficulty) -> DifficultyRule {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Normal => self.normal,
            Difficulty::Hard => self.hard,
            Difficulty::Expert => self.expert,
        }
    }

    pub fn rule_mut(&mut self, difficulty: Difficulty) -> &mut DifficultyRule {
        match difficulty {
            Difficulty::Easy => &mut self.easy,
            Difficulty::Normal => &mut self.normal,
            Difficulty::Hard => &mut self.hard,
            Difficulty::Expert => &mut self.expert,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_difficulty() {
        assert_eq!("hard".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert_eq!(" Normal ".parse::<Difficulty>(), Ok(Difficulty::Normal));
        assert!("nightmare".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_default_table_lives_never_zero() {
        let table = DifficultyTable::default();
        for d in Difficulty::ALL {
            assert!(table.rule(d).starting_lives >= 1, "{d}");
        }
        assert!(table.rule(Difficulty::Easy).regenerates);
        assert!(!table.rule(Difficulty::Expert).regenerates);
    }

    #[test]
    fn test_rule_mut_overrides() {
        let mut table = DifficultyTable::default();
        table.rule_mut(Difficulty::Hard).starting_lives = 7;
        assert_eq!(table.rule(Difficulty::Hard).starting_lives, 7);
    }
}
