//! Configuration loading and management

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::hotkey::HotkeyBinding;

const APP_DIR_NAME: &str = "text-corrector";
const CREDENTIAL_FILE_NAME: &str = ".text_corrector_config";
const KEY_FILE_NAME: &str = ".text_corrector_encryption";

pub const DEFAULT_PROMPT: &str =
    "Correct grammar, spelling, punctuation, and style errors. Provide only corrected text:\n{text}";

/// Fixed delays used around OS input and clipboard operations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timings {
    /// Wait between the chord and the start of a correction
    pub debounce_ms: u64,
    /// Wait after Ctrl+C before reading the clipboard
    pub copy_settle_ms: u64,
    /// Wait after the backspace that removes the selection
    pub backspace_settle_ms: u64,
    /// Pause between typed characters
    pub char_delay_ms: u64,
    pub probe_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            copy_settle_ms: 300,
            backspace_settle_ms: 50,
            char_delay_ms: 20,
            probe_timeout_ms: 3_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl Timings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn copy_settle(&self) -> Duration {
        Duration::from_millis(self.copy_settle_ms)
    }

    pub fn backspace_settle(&self) -> Duration {
        Duration::from_millis(self.backspace_settle_ms)
    }

    pub fn char_delay(&self) -> Duration {
        Duration::from_millis(self.char_delay_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chord in `Modifier+Key` form
    pub hotkey: String,

    /// Longest selection (in characters) sent for correction
    pub max_selection_chars: usize,

    /// Only the first N sentences are sent when set
    pub max_sentences: Option<usize>,

    /// Base URL of the OpenAI-compatible API
    pub api_base: String,

    /// URL hit by the connectivity probe
    pub probe_url: String,

    pub model: String,

    /// Instruction sent to the model; `{text}` is replaced by the selection
    pub prompt: String,

    pub timings: Timings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hotkey: HotkeyBinding::default().to_string(),
            max_selection_chars: 1000,
            max_sentences: None,
            api_base: "https://api.openai.com/v1".to_string(),
            probe_url: "https://api.openai.com".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            timings: Timings::default(),
        }
    }
}

impl Config {
    /// Directory holding the settings file, the credential and the log
    pub fn app_dir() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .or_else(dirs::home_dir)
            .context("could not determine a config directory")?;
        Ok(base.join(APP_DIR_NAME))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::app_dir()?.join("config.json"))
    }

    pub fn credential_path() -> Result<PathBuf> {
        Ok(Self::app_dir()?.join(CREDENTIAL_FILE_NAME))
    }

    /// The encryption key lives apart from the credential, in the home directory
    pub fn key_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("could not determine the home directory")?;
        Ok(home.join(KEY_FILE_NAME))
    }

    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::app_dir()?.join("text-corrector.log"))
    }

    /// Ensure the app directory exists
    pub fn ensure_dirs() -> Result<()> {
        let dir = Self::app_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(())
    }

    /// Load `config.json`, writing the defaults on first run
    pub fn load() -> Result<Self> {
        Self::ensure_dirs()?;
        Self::load_from(&Self::config_path()?)
    }

    /// Load from an explicit path; a missing file yields (and writes) the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Config::default();
            if let Err(e) = config.save_to(path) {
                warn!(?e, "failed to write default configuration");
            }
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Parsed chord; an unparseable value falls back to the default with a warning
    pub fn binding(&self) -> HotkeyBinding {
        match self.hotkey.parse() {
            Ok(binding) => binding,
            Err(e) => {
                let fallback = HotkeyBinding::default();
                warn!(hotkey = %self.hotkey, error = %e, %fallback, "invalid hotkey, using default");
                fallback
            }
        }
    }
}
