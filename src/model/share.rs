use crate::model::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    View,
    Edit,
}

impl Default for Permission {
    fn default() -> Self {
        Permission::View
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "VIEW" => Ok(Permission::View),
            "EDIT" => Ok(Permission::Edit),
            other => Err(format!("unknown permission `{}`", other)),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::View => write!(f, "VIEW"),
            Permission::Edit => write!(f, "EDIT"),
        }
    }
}

/// Which kind of item a share points at. Also the path segment under `/shares/`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShareKind {
    File,
    Folder,
}

impl ShareKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareKind::File => "file",
            ShareKind::Folder => "folder",
        }
    }
}

impl FromStr for ShareKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(ShareKind::File),
            "folder" => Ok(ShareKind::Folder),
            other => Err(format!("unknown share kind `{}`", other)),
        }
    }
}

/// A file share or a folder share; exactly one of `file` / `folder` is set.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Share {
    pub id: i64,
    #[serde(default)]
    pub file: Option<Uuid>,
    #[serde(default)]
    pub folder: Option<Uuid>,
    pub shared_with: i64,
    #[serde(default)]
    pub shared_with_details: Option<User>,
    #[serde(default)]
    pub permission: Permission,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Share {
    pub fn kind(&self) -> ShareKind {
        if self.folder.is_some() {
            ShareKind::Folder
        } else {
            ShareKind::File
        }
    }

    pub fn target(&self) -> Option<Uuid> {
        self.file.or(self.folder)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

#[derive(Clone, Debug)]
pub struct NewShare {
    pub kind: ShareKind,
    pub target: Uuid,
    pub email: String,
    pub permission: Permission,
    pub expires_at: Option<DateTime<Utc>>,
    pub message: String,
}

impl NewShare {
    pub fn payload(&self) -> Value {
        let mut payload = json!({
            "shared_with_email": self.email,
            "permission": self.permission,
            "expires_at": self.expires_at,
            "message": self.message,
        });
        payload[self.kind.as_str()] = json!(self.target);
        payload
    }
}
