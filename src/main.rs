//! text-corrector: tray utility that fixes the selected text in place
//!
//! Runs in the Windows notification area and provides:
//! - A global modifier+letter hotkey (Alt+Q by default) via a low-level
//!   keyboard hook
//! - A clipboard-swap transaction that copies the selection, sends it to
//!   a language-model API and types the corrected text over it
//! - Encrypted storage for the API key
//!
//! Command line:
//! - `text-corrector`              run the tray utility
//! - `text-corrector set-key KEY`  store the API key
//! - `text-corrector clear-key`    forget the stored API key
//! - `text-corrector --version`    print the version

#![cfg_attr(all(windows, not(debug_assertions)), windows_subsystem = "windows")]
#![cfg_attr(not(windows), allow(dead_code))]

mod config;
mod credential;
mod desktop;
mod error;
mod events;
mod gate;
mod hotkey;
mod lifecycle;
mod service;
mod transaction;
mod tray;
mod worker;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::credential::CredentialStore;
use crate::error::CorrectorError;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run,
    SetKey(String),
    ClearKey,
    Version,
}

impl Command {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let command = match args.next().as_deref() {
            None => Command::Run,
            Some("set-key") => {
                let key = args.next().context("usage: text-corrector set-key <KEY>")?;
                Command::SetKey(key)
            }
            Some("clear-key") => Command::ClearKey,
            Some("--version") | Some("-V") => Command::Version,
            Some(other) => anyhow::bail!("unknown argument: {other}"),
        };

        if let Some(extra) = args.next() {
            anyhow::bail!("unexpected argument: {extra}");
        }
        Ok(command)
    }
}

/// Log to stderr, or to the log file when one is given and can be opened
fn init_logging(log_path: Option<PathBuf>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file = log_path.and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        None => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

fn credential_store() -> Result<CredentialStore> {
    Ok(CredentialStore::new(
        Config::credential_path()?,
        Config::key_path()?,
    ))
}

/// Result of a `set-key` or `clear-key` run, shown to the user
#[derive(Debug, PartialEq, Eq)]
struct Outcome {
    title: &'static str,
    body: String,
    success: bool,
}

impl Outcome {
    fn done(title: &'static str, body: &str) -> Self {
        Self {
            title,
            body: body.to_string(),
            success: true,
        }
    }

    fn failed(err: CorrectorError) -> Self {
        Self {
            title: err.title(),
            body: err.to_string(),
            success: false,
        }
    }

    /// Print to the console and, on Windows, also raise a toast
    fn report(&self) {
        if self.success {
            println!("{}: {}", self.title, self.body);
        } else {
            eprintln!("{}: {}", self.title, self.body);
        }
        #[cfg(windows)]
        tray::windows::show_toast(self.title, &self.body);
    }
}

fn run_key_command(command: &Command, store: &CredentialStore) -> Option<Outcome> {
    let outcome = match command {
        Command::SetKey(key) => match store.save(key) {
            Ok(()) => Outcome::done("Settings Saved", "API key stored successfully"),
            Err(e) => Outcome::failed(e),
        },
        Command::ClearKey => match store.clear() {
            Ok(()) => Outcome::done("Settings Saved", "API key removed"),
            Err(e) => Outcome::failed(e),
        },
        Command::Run | Command::Version => return None,
    };
    Some(outcome)
}

/// Reuse the launching terminal's console; release builds start without one
#[cfg(windows)]
fn attach_console() {
    use windows::Win32::System::Console::{AttachConsole, ATTACH_PARENT_PROCESS};

    // Fails when started from Explorer; the toast still reports the result
    let _ = unsafe { AttachConsole(ATTACH_PARENT_PROCESS) };
}

#[cfg(not(windows))]
fn attach_console() {}

#[tokio::main]
async fn main() -> Result<()> {
    let command = Command::parse(std::env::args().skip(1))?;

    match command {
        Command::Version => {
            attach_console();
            println!("text-corrector {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::SetKey(_) | Command::ClearKey => {
            attach_console();
            init_logging(None);
            if let Some(outcome) = run_key_command(&command, &credential_store()?) {
                outcome.report();
                if !outcome.success {
                    std::process::exit(1);
                }
            }
            Ok(())
        }
        Command::Run => {
            let log_path = Config::ensure_dirs().and_then(|()| Config::log_path()).ok();
            init_logging(log_path);

            info!(
                version = env!("CARGO_PKG_VERSION"),
                "text-corrector starting"
            );

            let result = app::run().await;
            if let Err(e) = &result {
                error!(?e, "text-corrector failed");
            }
            info!("text-corrector stopped");
            result
        }
    }
}

#[cfg(windows)]
mod app {
    //! Wiring of the hook, worker and tray threads

    use std::sync::Arc;
    use std::thread;

    use anyhow::{Context, Result};
    use tokio::runtime::Handle;
    use tokio::sync::mpsc;
    use tracing::{error, info, warn};

    use crate::config::Config;
    use crate::credential::{CredentialSource, CredentialStore};
    use crate::desktop::windows::{InputSimulator, SystemClipboard};
    use crate::error::{CorrectorError, HOOK_ERROR_TITLE};
    use crate::events::{Notifier, UiNotifier};
    use crate::hotkey::{HotkeyListener, KeyRouter};
    use crate::lifecycle::ShutdownSignal;
    use crate::service::OpenAiService;
    use crate::transaction::{CorrectionTransaction, Policy};
    use crate::tray;
    use crate::worker::{CorrectionWorker, Job};

    fn build_transaction(
        service: Arc<OpenAiService>,
        credentials: Arc<dyn CredentialSource + Send + Sync>,
        notifier: UiNotifier,
        policy: Policy,
    ) -> Result<impl Job> {
        let clipboard = SystemClipboard::new().context("clipboard unavailable")?;
        let keys = InputSimulator::new().context("keystroke simulation unavailable")?;
        Ok(CorrectionTransaction::new(
            clipboard,
            keys,
            service,
            credentials,
            notifier,
            policy,
        ))
    }

    pub async fn run() -> Result<()> {
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let notifier = UiNotifier::new(ui_tx);

        // Load configuration; a broken file is reported and the defaults used
        let config = match Config::load() {
            Ok(config) => config,
            Err(e) => {
                let err = CorrectorError::ConfigRead(format!("{e:#}"));
                warn!(error = %err, "using default configuration");
                notifier.notify(err.title(), &err.to_string());
                Config::default()
            }
        };
        let binding = config.binding();
        info!(hotkey = %binding, model = %config.model, "configuration loaded");

        let credential_path = Config::credential_path()?;
        let store = Arc::new(CredentialStore::new(
            credential_path.clone(),
            Config::key_path()?,
        ));
        if let Err(e) = store.load() {
            error!(error = %e, "failed to load stored API key");
            notifier.notify(e.title(), &e.to_string());
        }

        let shutdown = ShutdownSignal::new();

        // Correction worker
        let service = Arc::new(OpenAiService::new(&config).context("failed to build HTTP client")?);
        let policy = Policy::from_config(&config);
        let credentials: Arc<dyn CredentialSource + Send + Sync> = store.clone();
        let job_notifier = notifier.clone();
        let (mut worker, trigger) = CorrectionWorker::spawn(
            config.timings.debounce(),
            Handle::current(),
            notifier.clone(),
            move || build_transaction(service, credentials, job_notifier, policy),
        )
        .context("failed to spawn correction worker")?;

        // Hotkey listener
        let listener = HotkeyListener::new(KeyRouter::new(binding, trigger));
        match listener.start() {
            Ok(()) => info!(hotkey = %binding, "hotkey listener started"),
            Err(e) => {
                error!(?e, "failed to start hotkey listener");
                notifier.notify(HOOK_ERROR_TITLE, &e.to_string());
            }
        }

        // Tray
        notifier.notify(tray::APP_NAME, &tray::startup_message(&binding));
        let tray_shutdown = shutdown.clone();
        let tray_binding = binding;
        let tray_thread = thread::Builder::new()
            .name("tray".to_string())
            .spawn(move || {
                if let Err(e) = tray::windows::run(
                    ui_rx,
                    store,
                    tray_binding,
                    credential_path,
                    tray_shutdown.clone(),
                ) {
                    error!(?e, "tray failed");
                }
                // Without a tray there is no way to quit but Ctrl+C
                tray_shutdown.trigger();
            })
            .context("failed to spawn tray thread")?;

        info!("text-corrector initialized, waiting for shutdown");
        shutdown.wait().await;

        // Cleanup
        info!("shutting down...");
        listener.stop();
        // Both joins may wait on a running correction or the tray pump
        let joined = tokio::task::spawn_blocking(move || {
            worker.shutdown();
            tray_thread.join().is_ok()
        })
        .await;
        if !matches!(joined, Ok(true)) {
            warn!("background threads did not exit cleanly");
        }

        Ok(())
    }
}

#[cfg(not(windows))]
mod app {
    use anyhow::Result;

    pub async fn run() -> Result<()> {
        anyhow::bail!("the tray utility is only available on Windows")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(args(&[])).unwrap(), Command::Run);
        assert_eq!(
            Command::parse(args(&["set-key", "sk-1"])).unwrap(),
            Command::SetKey("sk-1".into())
        );
        assert_eq!(Command::parse(args(&["clear-key"])).unwrap(), Command::ClearKey);
        assert_eq!(Command::parse(args(&["--version"])).unwrap(), Command::Version);
    }

    #[test]
    fn test_key_commands_report_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("credential"), dir.path().join("key"));

        let outcome = run_key_command(&Command::SetKey("   ".into()), &store).unwrap();
        assert_eq!(outcome.title, "Error");
        assert_eq!(outcome.body, "API key cannot be empty");
        assert!(!outcome.success);

        let outcome = run_key_command(&Command::SetKey("sk-1".into()), &store).unwrap();
        assert_eq!(
            outcome,
            Outcome::done("Settings Saved", "API key stored successfully")
        );

        let outcome = run_key_command(&Command::ClearKey, &store).unwrap();
        assert!(outcome.success);
        assert!(!dir.path().join("credential").exists());

        assert!(run_key_command(&Command::Version, &store).is_none());
    }

    #[test]
    fn test_key_command_write_failure_is_save_error() {
        let dir = tempfile::tempdir().unwrap();
        // The credential path is a directory, so the write fails
        let store = CredentialStore::new(dir.path().to_path_buf(), dir.path().join("key"));
        let outcome = run_key_command(&Command::SetKey("sk-1".into()), &store).unwrap();
        assert_eq!(outcome.title, "Save Error");
        assert!(!outcome.success);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse(args(&["set-key"])).is_err());
        assert!(Command::parse(args(&["frobnicate"])).is_err());
        assert!(Command::parse(args(&["clear-key", "extra"])).is_err());
    }
}
