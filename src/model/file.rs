use crate::model::{Permission, Share, User};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Backend computed access level of the current user on a file.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Owner,
    Editor,
    View,
}

impl Role {
    pub fn is_shared(&self) -> bool {
        matches!(self, Role::Editor | Role::View)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => write!(f, "OWNER"),
            Role::Editor => write!(f, "EDITOR"),
            Role::View => write!(f, "VIEW"),
        }
    }
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct FileMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct File {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Human readable, e.g. "2.40 MB".
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub folder: Option<Uuid>,
    pub owner: i64,
    #[serde(default)]
    pub owner_details: Option<User>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "metadata_or_default")]
    pub metadata: FileMetadata,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub locked_by: Option<i64>,
    #[serde(default)]
    pub locked_by_details: Option<User>,
    #[serde(default)]
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_notarized: bool,
    #[serde(default)]
    pub shares: Vec<Share>,
}

// the backend stores metadata as a free JSON field and may hand back null
fn metadata_or_default<'de, D>(deserializer: D) -> Result<FileMetadata, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<FileMetadata>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

impl File {
    /// The role of `user` on this file, preferring the one the backend sent.
    pub fn role_for(&self, user: Option<i64>) -> Option<Role> {
        if self.role.is_some() {
            return self.role;
        }
        let user = user?;
        if self.owner == user {
            return Some(Role::Owner);
        }
        self.shares
            .iter()
            .find(|s| s.shared_with == user)
            .map(|s| match s.permission {
                Permission::Edit => Role::Editor,
                Permission::View => Role::View,
            })
    }

    pub fn size_bytes(&self) -> Option<u64> {
        parse_size(&self.size)
    }

    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        let hit = |s: &str| s.to_lowercase().contains(&needle);
        let meta = &self.metadata;
        hit(&self.name)
            || hit(&self.description)
            || self.tags.iter().any(|t| hit(t))
            || [&meta.author, &meta.category, &meta.description]
                .iter()
                .filter_map(|v| v.as_deref())
                .any(hit)
    }
}

/// Parse sizes like "2.40 MB", "512 B" or "1.5GB" into bytes.
pub fn parse_size(size: &str) -> Option<u64> {
    let size = size.trim();
    let split = size
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or_else(|| size.len());
    let (num, unit) = size.split_at(split);
    let num: f64 = num.parse().ok()?;
    let factor = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1u64,
        "KB" => 1 << 10,
        "MB" => 1 << 20,
        "GB" => 1 << 30,
        _ => return None,
    };
    Some((num * factor as f64).round() as u64)
}

/// A local document to send to `POST /files/`.
#[derive(Clone, Debug, Default)]
pub struct Upload {
    pub file_name: String,
    pub content: Vec<u8>,
    pub folder: Option<Uuid>,
    pub description: String,
    pub tags: Vec<String>,
    pub author: Option<String>,
}

#[derive(Serialize, Default, Clone, Debug)]
pub struct FileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FileMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(json: &str) -> File {
        serde_json::from_str(json).unwrap()
    }

    const BASE: &str = r#"{
        "id": "6f1c2d1e-8a59-4a7e-9a43-1f7b3c2a9e10",
        "name": "Lease.docx",
        "type": "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "size": "0.02 MB",
        "folder": null,
        "owner": 1,
        "description": "",
        "tags": ["legal"],
        "metadata": {"author": "Jane Doe", "pages": 4},
        "created_at": "2024-07-01T10:00:00Z",
        "file_url": "http://localhost:8000/media/uploads/Lease.docx",
        "shares": [
            {"id": 1, "file": "6f1c2d1e-8a59-4a7e-9a43-1f7b3c2a9e10", "shared_with": 7,
             "permission": "EDIT", "expires_at": null, "created_at": "2024-07-02T10:00:00Z"}
        ]
    }"#;

    #[test]
    fn keeps_unknown_metadata_keys() {
        let f = file(BASE);
        assert_eq!(f.metadata.author.as_deref(), Some("Jane Doe"));
        assert_eq!(f.metadata.extra["pages"], 4);
        assert!(f.locked_by.is_none());
    }

    #[test]
    fn null_metadata_is_empty() {
        let f = file(&BASE.replace(
            r#""metadata": {"author": "Jane Doe", "pages": 4}"#,
            r#""metadata": null"#,
        ));
        assert_eq!(f.metadata, FileMetadata::default());
    }

    #[test]
    fn role_is_derived_from_owner_and_shares() {
        let f = file(BASE);
        assert_eq!(f.role_for(Some(1)), Some(Role::Owner));
        assert_eq!(f.role_for(Some(7)), Some(Role::Editor));
        assert_eq!(f.role_for(Some(8)), None);
        assert_eq!(f.role_for(None), None);
    }

    #[test]
    fn wire_role_wins() {
        let f = file(&BASE.replace(r#""owner": 1,"#, r#""owner": 1, "role": "VIEW","#));
        assert_eq!(f.role_for(Some(1)), Some(Role::View));
    }

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("2.00 MB"), Some(2 * 1024 * 1024));
        assert_eq!(parse_size("512 B"), Some(512));
        assert_eq!(parse_size("1.5KB"), Some(1536));
        assert_eq!(parse_size("0 MB"), Some(0));
        assert_eq!(parse_size("big"), None);
        assert_eq!(parse_size("3 parsecs"), None);
    }

    #[test]
    fn search_covers_tags_and_metadata() {
        let f = file(BASE);
        assert!(f.matches("lease"));
        assert!(f.matches("LEGAL"));
        assert!(f.matches("jane"));
        assert!(!f.matches("invoice"));
    }
}
