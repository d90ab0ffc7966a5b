//! Allow-list access control backed by a flat JSON file.
//!
//! Two partitions: admins and allowed users. Admins are implicitly allowed.
//! Persistence is best-effort; a write failure is logged and the in-memory
//! state stays authoritative for the process lifetime.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{Error, Result};

/// Capability checks the dispatch layer gates on.
pub trait AccessPolicy {
    fn is_admin(&self, user_id: i64) -> bool;
    fn is_allowed(&self, user_id: i64) -> bool;
}

/// On-disk shape of the user list.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredUsers {
    #[serde(default)]
    admins: Vec<i64>,
    #[serde(default)]
    allowed_users: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

/// JSON-file-backed user store.
#[derive(Debug)]
pub struct UserStore {
    path: PathBuf,
    admins: Vec<i64>,
    allowed_users: Vec<i64>,
}

impl UserStore {
    /// Load the store, creating an empty file when none exists. Unreadable
    /// or corrupt files degrade to empty lists (logged, not fatal).
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut store = Self {
            path,
            admins: Vec::new(),
            allowed_users: Vec::new(),
        };

        if store.path.exists() {
            match fs::read_to_string(&store.path)
                .map_err(Error::from)
                .and_then(|text| serde_json::from_str::<StoredUsers>(&text).map_err(Error::from))
            {
                Ok(stored) => {
                    store.admins = stored.admins;
                    store.allowed_users = stored.allowed_users;
                    info!(
                        admins = store.admins.len(),
                        allowed = store.allowed_users.len(),
                        "Loaded user store"
                    );
                }
                Err(err) => {
                    error!(path = %store.path.display(), error = %err, "Failed to load user store, starting empty");
                }
            }
        } else if let Err(err) = store.save() {
            error!(path = %store.path.display(), error = %err, "Failed to create user store");
        }

        store
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let stored = StoredUsers {
            admins: self.admins.clone(),
            allowed_users: self.allowed_users.clone(),
            updated_at: Some(Utc::now()),
        };

        fs::write(&self.path, serde_json::to_string_pretty(&stored)?)
            .map_err(|e| Error::Store(format!("{}: {}", self.path.display(), e)))
    }

    fn persist(&self) {
        if let Err(err) = self.save() {
            warn!(error = %err, "Could not persist user store");
        }
    }

    /// Add an admin. Returns false when already present.
    pub fn add_admin(&mut self, user_id: i64) -> bool {
        if self.admins.contains(&user_id) {
            return false;
        }
        self.admins.push(user_id);
        self.persist();
        info!(user_id, "Added admin");
        true
    }

    /// Remove an admin. Returns false when absent.
    pub fn remove_admin(&mut self, user_id: i64) -> bool {
        let before = self.admins.len();
        self.admins.retain(|id| *id != user_id);
        if self.admins.len() == before {
            return false;
        }
        self.persist();
        info!(user_id, "Removed admin");
        true
    }

    /// Add an allowed user. Returns false when already present.
    pub fn add_allowed_user(&mut self, user_id: i64) -> bool {
        if self.allowed_users.contains(&user_id) {
            return false;
        }
        self.allowed_users.push(user_id);
        self.persist();
        info!(user_id, "Added allowed user");
        true
    }

    /// Remove an allowed user. Returns false when absent.
    pub fn remove_allowed_user(&mut self, user_id: i64) -> bool {
        let before = self.allowed_users.len();
        self.allowed_users.retain(|id| *id != user_id);
        if self.allowed_users.len() == before {
            return false;
        }
        self.persist();
        info!(user_id, "Removed allowed user");
        true
    }

    pub fn admins(&self) -> &[i64] {
        &self.admins
    }

    pub fn allowed_users(&self) -> &[i64] {
        &self.allowed_users
    }
}

impl AccessPolicy for UserStore {
    fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }

    fn is_allowed(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id) || self.allowed_users.contains(&user_id)
    }
}
