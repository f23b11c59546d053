//! Encrypted-at-rest storage for the service API key
//!
//! The credential file holds a single Fernet token (no framing). The
//! Fernet key lives in a separate file and is generated on first use.
//! `set-key` runs as its own process, so a running store re-reads the file
//! whenever its modification time differs from the one last seen.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use std::time::SystemTime;

use fernet::Fernet;
use tracing::{debug, info, warn};

use crate::error::CorrectorError;

/// Read access to the current API key
pub trait CredentialSource {
    /// A copy of the configured key, `None` when none is set
    fn api_key(&self) -> Option<String>;
}

pub struct CredentialStore {
    credential_path: PathBuf,
    key_path: PathBuf,
    api_key: RwLock<Option<String>>,
    /// mtime of the credential file as of the last load or save
    seen_modified: Mutex<Option<SystemTime>>,
}

impl CredentialStore {
    pub fn new(credential_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            credential_path: credential_path.into(),
            key_path: key_path.into(),
            api_key: RwLock::new(None),
            seen_modified: Mutex::new(None),
        }
    }

    pub fn credential_path(&self) -> &Path {
        &self.credential_path
    }

    /// Load the stored key into memory
    ///
    /// A missing credential file is not an error. On failure the in-memory
    /// key is left as it was.
    pub fn load(&self) -> Result<(), CorrectorError> {
        if !self.credential_path.exists() {
            debug!(path = %self.credential_path.display(), "no stored credential");
            return Ok(());
        }

        let cipher = self.cipher().map_err(|e| CorrectorError::ConfigRead(e.to_string()))?;
        let token = fs::read(&self.credential_path)
            .map_err(|e| CorrectorError::ConfigRead(e.to_string()))?;
        let token = String::from_utf8(token)
            .map_err(|_| CorrectorError::ConfigRead("credential file is not a valid token".into()))?;
        let plain = cipher
            .decrypt(token.trim())
            .map_err(|_| CorrectorError::ConfigRead("credential could not be decrypted".into()))?;
        let key = String::from_utf8(plain)
            .map_err(|_| CorrectorError::ConfigRead("decrypted credential is not UTF-8".into()))?;

        self.set_in_memory(Some(key.trim().to_string()));
        self.set_seen_modified(self.file_modified());
        info!("stored credential loaded");
        Ok(())
    }

    /// Encrypt and persist a new key, then make it current
    pub fn save(&self, api_key: &str) -> Result<(), CorrectorError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(CorrectorError::EmptyCredential);
        }

        let cipher = self.cipher().map_err(|e| CorrectorError::ConfigWrite(e.to_string()))?;
        let token = cipher.encrypt(api_key.as_bytes());

        if let Some(parent) = self.credential_path.parent() {
            fs::create_dir_all(parent).map_err(|e| CorrectorError::ConfigWrite(e.to_string()))?;
        }
        fs::write(&self.credential_path, token.as_bytes())
            .map_err(|e| CorrectorError::ConfigWrite(e.to_string()))?;

        self.set_in_memory(Some(api_key.to_string()));
        self.set_seen_modified(self.file_modified());
        info!(path = %self.credential_path.display(), "credential saved");
        Ok(())
    }

    /// Remove the stored key from disk and memory
    pub fn clear(&self) -> Result<(), CorrectorError> {
        match fs::remove_file(&self.credential_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(CorrectorError::ConfigWrite(e.to_string())),
        }
        self.set_in_memory(None);
        self.set_seen_modified(None);
        Ok(())
    }

    /// Pick up a key written or removed by another process
    ///
    /// A failed reload keeps the in-memory key and is retried on the next read.
    fn refresh(&self) {
        let modified = self.file_modified();
        let seen = match self.seen_modified.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        if modified == seen {
            return;
        }

        if modified.is_none() {
            debug!("credential file removed, forgetting key");
            self.set_in_memory(None);
            self.set_seen_modified(None);
            return;
        }

        if let Err(e) = self.load() {
            warn!(error = %e, "failed to reload changed credential");
        }
    }

    fn file_modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.credential_path)
            .and_then(|meta| meta.modified())
            .ok()
    }

    fn set_seen_modified(&self, value: Option<SystemTime>) {
        match self.seen_modified.lock() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }

    fn set_in_memory(&self, value: Option<String>) {
        match self.api_key.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }

    /// Fernet cipher from the key file, generating the key if absent
    fn cipher(&self) -> io::Result<Fernet> {
        if !self.key_path.exists() {
            if let Some(parent) = self.key_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&self.key_path, Fernet::generate_key())?;
            warn!(path = %self.key_path.display(), "generated new encryption key");
        }

        let key = fs::read_to_string(&self.key_path)?;
        Fernet::new(key.trim())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "encryption key is malformed"))
    }
}

impl CredentialSource for CredentialStore {
    fn api_key(&self) -> Option<String> {
        self.refresh();
        let guard = match self.api_key.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clone().filter(|key| !key.is_empty())
    }
}

impl<T: CredentialSource + ?Sized> CredentialSource for std::sync::Arc<T> {
    fn api_key(&self) -> Option<String> {
        (**self).api_key()
    }
}
