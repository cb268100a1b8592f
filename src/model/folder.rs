use crate::model::{Share, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_COLOR: &str = "#3B82F6";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Folder {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Nesting is not used; always null for folders created here.
    #[serde(default)]
    pub parent: Option<Uuid>,
    pub owner: i64,
    #[serde(default)]
    pub owner_details: Option<User>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shares: Vec<Share>,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

#[derive(Serialize, Clone, Debug)]
pub struct NewFolder {
    pub name: String,
    pub color: String,
    pub tags: Vec<String>,
}

impl NewFolder {
    pub fn named(name: &str) -> NewFolder {
        NewFolder {
            name: name.to_string(),
            color: default_color(),
            tags: Vec::new(),
        }
    }
}

#[derive(Serialize, Default, Clone, Debug)]
pub struct FolderUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Split a comma separated tag field into trimmed, non-empty tags.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_defaults_when_missing() {
        let folder: Folder = serde_json::from_str(
            r#"{
                "id": "0d3c6a53-0f43-4c35-9d55-3d1d33c1b8aa",
                "name": "Taxes",
                "owner": 1,
                "created_at": "2024-07-01T10:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(folder.color, DEFAULT_COLOR);
        assert!(folder.parent.is_none());
        assert!(folder.tags.is_empty());
    }

    #[test]
    fn tags_are_trimmed_and_blank_ones_dropped() {
        assert_eq!(parse_tags(" a, b ,,c ,"), vec!["a", "b", "c"]);
        assert!(parse_tags("  ").is_empty());
    }
}
