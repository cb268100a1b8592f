//! Advisory single-writer lock around document editing.
//!
//! The backend keeps a `locked_by` flag per file. A writer takes it before
//! editing and hands it back when done; the owner may break someone else's
//! lock. Nothing expires on its own.

use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::model::File;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    HeldByMe,
    HeldByOther(i64),
}

impl LockState {
    pub fn of(locked_by: Option<i64>, me: i64) -> LockState {
        match locked_by {
            None => LockState::Unlocked,
            Some(user) if user == me => LockState::HeldByMe,
            Some(user) => LockState::HeldByOther(user),
        }
    }
}

#[derive(Debug)]
pub struct EditSession {
    client: ApiClient,
    file: File,
    me: i64,
    read_only: bool,
    local_lock: bool,
    content: String,
}

impl EditSession {
    pub fn new(client: ApiClient, file: File, me: i64, read_only: bool) -> EditSession {
        EditSession {
            client,
            file,
            me,
            read_only,
            local_lock: false,
            content: String::new(),
        }
    }

    /// Start a session and pull the current document content.
    pub async fn open(
        client: ApiClient,
        file: File,
        me: i64,
        read_only: bool,
    ) -> Result<EditSession> {
        let mut session = EditSession::new(client, file, me, read_only);
        if let Some(url) = session.file.file_url.clone() {
            let bytes = session.client.download(&url).await.map_err(|e| {
                tracing::error!("loading {} failed: {}", session.file.name, e);
                e
            })?;
            session.content = String::from_utf8_lossy(&bytes).into_owned();
        }
        Ok(session)
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_owner(&self) -> bool {
        self.file.owner == self.me
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn lock_state(&self) -> LockState {
        if self.local_lock {
            return LockState::HeldByMe;
        }
        LockState::of(self.file.locked_by, self.me)
    }

    pub fn can_start_editing(&self) -> bool {
        !self.read_only && self.lock_state() == LockState::Unlocked
    }

    pub fn can_save(&self) -> bool {
        !self.read_only && self.lock_state() == LockState::HeldByMe
    }

    pub fn can_force_unlock(&self) -> bool {
        !self.read_only
            && self.is_owner()
            && matches!(self.lock_state(), LockState::HeldByOther(_))
    }

    pub async fn start_editing(&mut self) -> Result<()> {
        if self.read_only {
            return Err(Error::Forbidden("document is read only".to_string()));
        }
        if let LockState::HeldByOther(user) = self.lock_state() {
            return Err(Error::LockedByOther(user));
        }
        self.client.lock_file(self.file.id).await?;
        tracing::info!("locked {} for editing", self.file.name);
        self.local_lock = true;
        self.file.locked_by = Some(self.me);
        Ok(())
    }

    /// Hand the lock back.
    pub async fn finish(&mut self) -> Result<()> {
        if self.lock_state() != LockState::HeldByMe {
            return Err(Error::NotLocked);
        }
        self.release().await
    }

    /// Break another user's lock. Owner only.
    pub async fn force_unlock(&mut self) -> Result<()> {
        if !self.can_force_unlock() {
            return Err(Error::Forbidden(
                "only the owner can break another user's lock".to_string(),
            ));
        }
        self.release().await
    }

    async fn release(&mut self) -> Result<()> {
        self.client.unlock_file(self.file.id).await?;
        tracing::info!("unlocked {}", self.file.name);
        self.local_lock = false;
        self.file.locked_by = None;
        self.file.locked_by_details = None;
        Ok(())
    }

    pub async fn save(&mut self, content: &str) -> Result<()> {
        if !self.can_save() {
            return Err(Error::NotLocked);
        }
        self.client.save_content(self.file.id, content).await?;
        tracing::info!("saved {} ({} bytes)", self.file.name, content.len());
        self.content = content.to_string();
        Ok(())
    }
}
