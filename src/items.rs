use std::fs;

use anyhow::{Result, bail};
use rust_embed::Embed;
use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(Embed)]
#[folder = "assets/packs/"]
struct PackAssets;

pub const CATEGORIES: &[&str] = &["hiragana", "katakana", "kanji", "vocabulary"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackItem {
    pub character: String,
    pub reading: String,
    #[serde(default)]
    pub meaning: Option<String>,
    pub group: String,
}

impl PackItem {
    /// Identity used for per-item tallies.
    pub fn key(&self) -> String {
        self.character.clone()
    }

    /// Trimmed, case-insensitive match against the reading or the meaning.
    pub fn accepts(&self, answer: &str) -> bool {
        let answer = answer.trim();
        if answer.is_empty() {
            return false;
        }
        answer.eq_ignore_ascii_case(&self.reading)
            || self
                .meaning
                .as_deref()
                .is_some_and(|m| answer.eq_ignore_ascii_case(m))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemPack {
    pub category: String,
    pub items: Vec<PackItem>,
}

impl ItemPack {
    pub fn load(name: &str) -> Result<Self> {
        // User packs override bundled ones
        let user_pack_path = Config::config_dir()
            .join("packs")
            .join(format!("{name}.json"));
        if let Ok(content) = fs::read_to_string(&user_pack_path) {
            return Self::from_json(&content);
        }

        let filename = format!("{name}.json");
        match PackAssets::get(&filename) {
            Some(file) => Self::from_json(std::str::from_utf8(file.data.as_ref())?),
            None => bail!("Unknown item pack: {name}"),
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let pack: ItemPack = serde_json::from_str(content)?;
        if pack.items.is_empty() {
            bail!("Item pack '{}' has no items", pack.category);
        }
        Ok(pack)
    }

    /// Group labels in first-seen order.
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for item in &self.items {
            if !groups.contains(&item.group.as_str()) {
                groups.push(&item.group);
            }
        }
        groups
    }

    /// Items in the given groups, or every item when `groups` is empty.
    pub fn select(&self, groups: &[String]) -> Vec<PackItem> {
        self.items
            .iter()
            .filter(|item| groups.is_empty() || groups.contains(&item.group))
            .cloned()
            .collect()
    }
}
