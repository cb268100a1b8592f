use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationType {
    Expiry,
    Share,
    System,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.is_read).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_unread() {
        let list: Vec<Notification> = serde_json::from_str(
            r#"[
                {"id":1,"user":2,"title":"File Shared","message":"m","type":"SHARE","is_read":false,"created_at":"2024-07-08T09:00:00Z"},
                {"id":2,"user":2,"title":"Expiry","message":"m","type":"EXPIRY","is_read":true,"created_at":"2024-07-07T09:00:00Z"}
            ]"#,
        )
        .unwrap();
        assert_eq!(list[0].kind, NotificationType::Share);
        assert_eq!(unread_count(&list), 1);
    }
}
