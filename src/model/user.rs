use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Profile picture, either a URL or inline base64 data.
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

impl User {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.username.to_string()
        } else {
            name.to_string()
        }
    }
}

/// Profile fields accepted by `PATCH /auth/user/`. Unset fields are left alone.
#[derive(Serialize, Default, Clone, Debug)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

/// What the signup screen collects.
#[derive(Clone, Debug, Default)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub contact: Option<String>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
}

impl From<&SignupForm> for RegisterRequest {
    fn from(form: &SignupForm) -> Self {
        let mut words = form.name.split_whitespace();
        let first_name = words.next().unwrap_or("").to_string();
        let last_name = words.collect::<Vec<_>>().join(" ");
        RegisterRequest {
            // the email doubles as the username so it stays unique
            username: form.email.to_string(),
            email: form.email.to_string(),
            password: form.password.to_string(),
            first_name,
            last_name,
            phone_number: form.contact.clone().unwrap_or_default(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RefreshedToken {
    pub access: String,
    /// Present when the backend rotates refresh tokens.
    #[serde(default)]
    pub refresh: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_splits_full_name() {
        let form = SignupForm {
            name: "Ada  King Lovelace".to_string(),
            email: "ada@example.org".to_string(),
            password: "pw".to_string(),
            contact: None,
        };
        let req = RegisterRequest::from(&form);
        assert_eq!(req.username, "ada@example.org");
        assert_eq!(req.first_name, "Ada");
        assert_eq!(req.last_name, "King Lovelace");
        assert_eq!(req.phone_number, "");
    }

    #[test]
    fn register_request_with_single_name() {
        let form = SignupForm {
            name: "Plato".to_string(),
            email: "p@example.org".to_string(),
            password: "pw".to_string(),
            contact: Some("555-0100".to_string()),
        };
        let req = RegisterRequest::from(&form);
        assert_eq!(req.first_name, "Plato");
        assert_eq!(req.last_name, "");
        assert_eq!(req.phone_number, "555-0100");
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let mut user: User =
            serde_json::from_str(r#"{"id":3,"username":"ada@example.org"}"#).unwrap();
        assert_eq!(user.display_name(), "ada@example.org");
        user.first_name = "Ada".to_string();
        assert_eq!(user.display_name(), "Ada");
    }

    #[test]
    fn user_update_skips_unset_fields() {
        let update = UserUpdate {
            bio: Some("hi".to_string()),
            ..UserUpdate::default()
        };
        assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"bio":"hi"}"#);
    }
}
