use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::model::{RegisterRequest, SignupForm, User, UserUpdate};

/// The signed-in user, cached for as long as the session lives.
#[derive(Debug)]
pub struct Session {
    client: ApiClient,
    user: Option<User>,
}

impl Session {
    pub fn new(client: ApiClient) -> Session {
        Session { client, user: None }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Pick up a stored token from an earlier run. A token the backend no
    /// longer accepts is dropped and the session stays signed out.
    pub async fn restore(&mut self) -> Result<bool> {
        if self.client.tokens().access().is_none() {
            return Ok(false);
        }
        match self.client.get_user().await {
            Ok(user) => {
                tracing::info!("restored session for {}", user.username);
                self.user = Some(user);
                Ok(true)
            }
            Err(e) => {
                tracing::info!("stored token rejected: {}", e);
                self.client.tokens().clear()?;
                self.user = None;
                Ok(false)
            }
        }
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<&User> {
        let pair = self.client.login(email, password).await.map_err(|e| {
            tracing::error!("login failed: {}", e);
            e
        })?;
        self.client.tokens().set_pair(&pair.access, &pair.refresh)?;
        let user = self.client.get_user().await?;
        tracing::info!("logged in as {}", user.username);
        Ok(self.user.insert(user))
    }

    /// Register a new account, then sign in with the same credentials.
    pub async fn signup(&mut self, form: &SignupForm) -> Result<&User> {
        self.client
            .register(&RegisterRequest::from(form))
            .await
            .map_err(|e| {
                tracing::error!("signup failed: {}", e);
                e
            })?;
        self.login(&form.email, &form.password).await
    }

    pub fn logout(&mut self) -> Result<()> {
        self.user = None;
        self.client.tokens().clear()
    }

    pub async fn update_user(&mut self, update: &UserUpdate) -> Result<&User> {
        if self.user.is_none() {
            return Err(Error::NotAuthenticated);
        }
        let user = self.client.update_user(update).await.map_err(|e| {
            tracing::error!("profile update failed: {}", e);
            e
        })?;
        Ok(self.user.insert(user))
    }
}
