//! Client library for a document-management REST backend: JWT sessions,
//! folder and file CRUD, sharing, notifications and an advisory edit lock.

pub mod client;
pub mod config;
pub mod dav;
pub mod editor;
pub mod error;
pub mod model;
pub mod session;
pub mod store;
pub mod token;

pub use crate::client::ApiClient;
pub use crate::config::Config;
pub use crate::editor::{EditSession, LockState};
pub use crate::error::{Error, Result};
pub use crate::session::Session;
pub use crate::store::FileStore;
pub use crate::token::{FileTokenStore, MemoryTokenStore, TokenStore};
