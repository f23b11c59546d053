//! Clipboard-swap correction transaction
//!
//! One run captures the current selection through the clipboard,
//! validates it, asks the correction service for a fixed version, types
//! the result over the selection and finally puts the user's clipboard
//! back. The clipboard is restored on every exit path.

mod text;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{Config, Timings};
use crate::credential::CredentialSource;
use crate::desktop::{Clipboard, KeySynth};
use crate::error::CorrectorError;
use crate::events::Notifier;
use crate::hotkey::Modifier;
use crate::service::CorrectionService;
use crate::worker::Job;

pub use text::limit_sentences;

/// Clipboard contents captured before the transaction touches it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardSnapshot(Option<String>);

/// What a successful run replaced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionResult {
    pub original: String,
    pub corrected: String,
}

/// Limits applied to each run
#[derive(Debug, Clone)]
pub struct Policy {
    pub max_selection_chars: usize,
    pub max_sentences: Option<usize>,
    pub modifier: Modifier,
    pub timings: Timings,
}

impl Policy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_selection_chars: config.max_selection_chars,
            max_sentences: config.max_sentences,
            modifier: config.binding().modifier,
            timings: config.timings.clone(),
        }
    }
}

pub struct CorrectionTransaction<B, K, S, N> {
    clipboard: B,
    keys: K,
    service: Arc<S>,
    credentials: Arc<dyn CredentialSource + Send + Sync>,
    notifier: N,
    policy: Policy,
}

impl<B, K, S, N> CorrectionTransaction<B, K, S, N>
where
    B: Clipboard,
    K: KeySynth,
    S: CorrectionService,
    N: Notifier,
{
    pub fn new(
        clipboard: B,
        keys: K,
        service: Arc<S>,
        credentials: Arc<dyn CredentialSource + Send + Sync>,
        notifier: N,
        policy: Policy,
    ) -> Self {
        Self {
            clipboard,
            keys,
            service,
            credentials,
            notifier,
            policy,
        }
    }

    /// Run one correction end to end; failures become notifications
    pub async fn run(&mut self) {
        let snapshot = match self.clipboard.get_text() {
            Ok(text) => ClipboardSnapshot(text),
            Err(e) => {
                let err = CorrectorError::from(e);
                warn!(error = %err, "could not snapshot clipboard, aborting");
                self.notifier.notify(err.title(), &err.to_string());
                return;
            }
        };

        let outcome = AssertUnwindSafe(self.replace_selection())
            .catch_unwind()
            .await;

        self.restore(snapshot);
        if let Err(e) = self.keys.release_modifier(self.policy.modifier) {
            warn!(error = %e, "failed to release modifier");
        }

        // Cleanup is done; the worker reports the panic
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(payload) => panic::resume_unwind(payload),
        };

        match outcome {
            Ok(Some(result)) => info!(
                original_chars = result.original.chars().count(),
                corrected_chars = result.corrected.chars().count(),
                "selection corrected"
            ),
            Ok(None) => info!("service returned no text, selection left as is"),
            Err(err) => {
                warn!(kind = err.title(), error = %err, "correction aborted");
                self.notifier.notify(err.title(), &err.to_string());
            }
        }
    }

    async fn replace_selection(&mut self) -> Result<Option<CorrectionResult>, CorrectorError> {
        let selection = self.capture_selection().await?;
        debug!(chars = selection.chars().count(), "selection captured");

        if selection.is_empty() {
            return Err(CorrectorError::SelectionEmpty);
        }

        let len = selection.chars().count();
        if len > self.policy.max_selection_chars {
            return Err(CorrectorError::SelectionTooLong {
                len,
                max: self.policy.max_selection_chars,
            });
        }

        let api_key = self
            .credentials
            .api_key()
            .ok_or(CorrectorError::MissingCredential)?;

        if !self.service.is_reachable().await {
            return Err(CorrectorError::NoConnectivity);
        }

        let request = match self.policy.max_sentences {
            Some(max) => limit_sentences(&selection, max),
            None => selection.clone(),
        };

        let corrected = self.service.correct(&request, &api_key).await?;
        if corrected.is_empty() {
            return Ok(None);
        }

        self.type_over_selection(&corrected).await?;

        Ok(Some(CorrectionResult {
            original: selection,
            corrected,
        }))
    }

    async fn capture_selection(&mut self) -> Result<String, CorrectorError> {
        // The chord's modifier may still be logically down; Ctrl+Alt+C is not a copy
        self.keys.release_modifier(self.policy.modifier)?;
        self.clipboard.clear()?;
        self.keys.copy_selection()?;
        sleep(self.policy.timings.copy_settle()).await;

        let text = self.clipboard.get_text()?.unwrap_or_default();
        Ok(text.trim().to_string())
    }

    async fn type_over_selection(&mut self, corrected: &str) -> Result<(), CorrectorError> {
        // Deleting a live selection collapses it to nothing
        self.keys.backspace()?;
        sleep(self.policy.timings.backspace_settle()).await;

        let delay = self.policy.timings.char_delay();
        for ch in corrected.chars() {
            self.keys.type_char(ch)?;
            sleep(delay).await;
        }
        Ok(())
    }

    fn restore(&mut self, snapshot: ClipboardSnapshot) {
        let restored = match snapshot.0 {
            Some(text) => self.clipboard.set_text(&text),
            None => self.clipboard.clear(),
        };
        if let Err(e) = restored {
            warn!(error = %e, "failed to restore clipboard");
        }
    }
}

impl<B, K, S, N> Job for CorrectionTransaction<B, K, S, N>
where
    B: Clipboard,
    K: KeySynth,
    S: CorrectionService,
    N: Notifier,
{
    fn execute(&mut self) -> impl std::future::Future<Output = ()> {
        self.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::desktop::DesktopError;
    use crate::service::ServiceError;

    /// Everything the fakes observe, in order
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Op {
        Copy,
        Backspace,
        Type(char),
        Release,
        ClipSet(String),
        ClipClear,
    }

    #[derive(Default)]
    struct Desk {
        clipboard: Option<String>,
        /// What the focused app puts on the clipboard when Ctrl+C arrives
        selection: Option<String>,
        ops: Vec<Op>,
        fail_typing: bool,
        panic_typing: bool,
    }

    type Shared = Arc<Mutex<Desk>>;

    struct FakeClipboard(Shared);
    struct FakeKeys(Shared);

    impl Clipboard for FakeClipboard {
        fn get_text(&mut self) -> Result<Option<String>, DesktopError> {
            Ok(self.0.lock().unwrap().clipboard.clone())
        }

        fn set_text(&mut self, text: &str) -> Result<(), DesktopError> {
            let mut desk = self.0.lock().unwrap();
            desk.clipboard = Some(text.to_string());
            desk.ops.push(Op::ClipSet(text.to_string()));
            Ok(())
        }

        fn clear(&mut self) -> Result<(), DesktopError> {
            let mut desk = self.0.lock().unwrap();
            desk.clipboard = None;
            desk.ops.push(Op::ClipClear);
            Ok(())
        }
    }

    impl KeySynth for FakeKeys {
        fn copy_selection(&mut self) -> Result<(), DesktopError> {
            let mut desk = self.0.lock().unwrap();
            desk.ops.push(Op::Copy);
            if let Some(selection) = desk.selection.clone() {
                desk.clipboard = Some(selection);
            }
            Ok(())
        }

        fn backspace(&mut self) -> Result<(), DesktopError> {
            self.0.lock().unwrap().ops.push(Op::Backspace);
            Ok(())
        }

        fn type_char(&mut self, ch: char) -> Result<(), DesktopError> {
            let mut desk = self.0.lock().unwrap();
            if desk.panic_typing {
                // Release the lock first so the mutex is not poisoned
                drop(desk);
                panic!("keyboard driver crashed");
            }
            if desk.fail_typing {
                return Err(DesktopError::Keyboard("input blocked".into()));
            }
            desk.ops.push(Op::Type(ch));
            Ok(())
        }

        fn release_modifier(&mut self, _modifier: Modifier) -> Result<(), DesktopError> {
            self.0.lock().unwrap().ops.push(Op::Release);
            Ok(())
        }
    }

    struct FakeService {
        reachable: bool,
        reply: Result<String, String>,
        requests: Mutex<Vec<(String, String)>>,
    }

    impl FakeService {
        fn replying(text: &str) -> Self {
            Self {
                reachable: true,
                reply: Ok(text.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl CorrectionService for FakeService {
        async fn is_reachable(&self) -> bool {
            self.reachable
        }

        async fn correct(&self, text: &str, api_key: &str) -> Result<String, ServiceError> {
            self.requests
                .lock()
                .unwrap()
                .push((text.to_string(), api_key.to_string()));
            self.reply
                .clone()
                .map_err(|body| ServiceError::Status { status: 500, body })
        }
    }

    struct FixedKey(Option<String>);

    impl CredentialSource for FixedKey {
        fn api_key(&self) -> Option<String> {
            self.0.clone()
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<(String, String)>>>);

    impl Notifier for Recorder {
        fn notify(&self, title: &str, body: &str) {
            self.0.lock().unwrap().push((title.to_string(), body.to_string()));
        }
    }

    impl Recorder {
        fn titles(&self) -> Vec<String> {
            self.0.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
        }
    }

    fn policy() -> Policy {
        Policy {
            max_selection_chars: 1000,
            max_sentences: None,
            modifier: Modifier::Alt,
            timings: Timings {
                debounce_ms: 0,
                copy_settle_ms: 0,
                backspace_settle_ms: 0,
                char_delay_ms: 0,
                ..Timings::default()
            },
        }
    }

    struct Harness {
        desk: Shared,
        service: Arc<FakeService>,
        notes: Recorder,
        txn: CorrectionTransaction<FakeClipboard, FakeKeys, FakeService, Recorder>,
    }

    fn harness(
        clipboard: Option<&str>,
        selection: Option<&str>,
        key: Option<&str>,
        service: FakeService,
        policy: Policy,
    ) -> Harness {
        let desk = Arc::new(Mutex::new(Desk {
            clipboard: clipboard.map(str::to_string),
            selection: selection.map(str::to_string),
            ..Desk::default()
        }));
        let service = Arc::new(service);
        let notes = Recorder::default();
        let txn = CorrectionTransaction::new(
            FakeClipboard(desk.clone()),
            FakeKeys(desk.clone()),
            service.clone(),
            Arc::new(FixedKey(key.map(str::to_string))),
            notes.clone(),
            policy,
        );
        Harness {
            desk,
            service,
            notes,
            txn,
        }
    }

    fn replay_ops(ops: &[Op]) -> Vec<Op> {
        ops.iter()
            .filter(|op| matches!(op, Op::Backspace | Op::Type(_)))
            .cloned()
            .collect()
    }

    #[tokio::test]
    async fn test_happy_path_replaces_selection() {
        let mut h = harness(
            Some("user clipboard"),
            Some("  i has a pen \n"),
            Some("sk-test"),
            FakeService::replying("I have a pen."),
            policy(),
        );

        h.txn.run().await;

        let desk = h.desk.lock().unwrap();
        let mut expected = vec![Op::Backspace];
        expected.extend("I have a pen.".chars().map(Op::Type));
        assert_eq!(replay_ops(&desk.ops), expected);
        assert_eq!(desk.clipboard.as_deref(), Some("user clipboard"));
        assert_eq!(desk.ops.last(), Some(&Op::Release));
        assert!(h.notes.titles().is_empty());

        let requests = h.service.requests.lock().unwrap();
        assert_eq!(
            requests.as_slice(),
            &[("i has a pen".to_string(), "sk-test".to_string())]
        );
    }

    #[tokio::test]
    async fn test_copy_happens_after_clear_and_release() {
        let mut h = harness(
            Some("x"),
            Some("text"),
            Some("sk"),
            FakeService::replying("Text."),
            policy(),
        );
        h.txn.run().await;

        let desk = h.desk.lock().unwrap();
        assert_eq!(&desk.ops[..3], &[Op::Release, Op::ClipClear, Op::Copy]);
    }

    #[tokio::test]
    async fn test_empty_selection() {
        let mut h = harness(
            Some("keep me"),
            Some("   \n\t"),
            Some("sk"),
            FakeService::replying("unused"),
            policy(),
        );
        h.txn.run().await;

        assert_eq!(h.notes.titles(), vec!["Nothing Selected"]);
        let desk = h.desk.lock().unwrap();
        assert_eq!(desk.clipboard.as_deref(), Some("keep me"));
        assert!(replay_ops(&desk.ops).is_empty());
        assert!(h.service.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nothing_copied_counts_as_empty() {
        let mut h = harness(
            Some("keep me"),
            None,
            Some("sk"),
            FakeService::replying("unused"),
            policy(),
        );
        h.txn.run().await;

        assert_eq!(h.notes.titles(), vec!["Nothing Selected"]);
        assert_eq!(h.desk.lock().unwrap().clipboard.as_deref(), Some("keep me"));
    }

    #[tokio::test]
    async fn test_selection_too_long() {
        let long = "a".repeat(1001);
        let mut h = harness(
            Some("keep me"),
            Some(&long),
            Some("sk"),
            FakeService::replying("unused"),
            policy(),
        );
        h.txn.run().await;

        assert_eq!(h.notes.titles(), vec!["Limit Exceeded"]);
        let desk = h.desk.lock().unwrap();
        assert_eq!(desk.clipboard.as_deref(), Some("keep me"));
        assert!(replay_ops(&desk.ops).is_empty());
    }

    #[tokio::test]
    async fn test_limit_counts_characters_not_bytes() {
        let text = "é".repeat(1000);
        let mut h = harness(
            None,
            Some(&text),
            Some("sk"),
            FakeService::replying("ok"),
            policy(),
        );
        h.txn.run().await;
        assert!(h.notes.titles().is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential() {
        let mut h = harness(
            Some("keep me"),
            Some("text"),
            None,
            FakeService::replying("unused"),
            policy(),
        );
        h.txn.run().await;

        assert_eq!(h.notes.titles(), vec!["API Key Error"]);
        assert_eq!(h.desk.lock().unwrap().clipboard.as_deref(), Some("keep me"));
    }

    #[tokio::test]
    async fn test_no_connectivity() {
        let service = FakeService {
            reachable: false,
            ..FakeService::replying("unused")
        };
        let mut h = harness(Some("keep me"), Some("text"), Some("sk"), service, policy());
        h.txn.run().await;

        assert_eq!(h.notes.titles(), vec!["No Internet"]);
        assert!(h.service.requests.lock().unwrap().is_empty());
        assert_eq!(h.desk.lock().unwrap().clipboard.as_deref(), Some("keep me"));
    }

    #[tokio::test]
    async fn test_service_error_skips_replacement() {
        let service = FakeService {
            reply: Err("model overloaded".to_string()),
            ..FakeService::replying("")
        };
        let mut h = harness(Some("keep me"), Some("text"), Some("sk"), service, policy());
        h.txn.run().await;

        let notes = h.notes.0.lock().unwrap().clone();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, "API Error");
        assert!(notes[0].1.contains("model overloaded"));

        let desk = h.desk.lock().unwrap();
        assert!(replay_ops(&desk.ops).is_empty());
        assert_eq!(desk.clipboard.as_deref(), Some("keep me"));
    }

    #[tokio::test]
    async fn test_empty_reply_leaves_selection() {
        let mut h = harness(
            Some("keep me"),
            Some("text"),
            Some("sk"),
            FakeService::replying(""),
            policy(),
        );
        h.txn.run().await;

        assert!(h.notes.titles().is_empty());
        let desk = h.desk.lock().unwrap();
        assert!(replay_ops(&desk.ops).is_empty());
        assert_eq!(desk.clipboard.as_deref(), Some("keep me"));
    }

    #[tokio::test]
    async fn test_typing_failure_still_restores() {
        let mut h = harness(
            Some("keep me"),
            Some("text"),
            Some("sk"),
            FakeService::replying("Text."),
            policy(),
        );
        h.desk.lock().unwrap().fail_typing = true;
        h.txn.run().await;

        assert_eq!(h.notes.titles(), vec!["Hotkey Error"]);
        let desk = h.desk.lock().unwrap();
        assert_eq!(desk.clipboard.as_deref(), Some("keep me"));
        assert_eq!(desk.ops.last(), Some(&Op::Release));
    }

    #[tokio::test]
    async fn test_empty_clipboard_snapshot_is_cleared_again() {
        let mut h = harness(
            None,
            Some("text"),
            Some("sk"),
            FakeService::replying("Text."),
            policy(),
        );
        h.txn.run().await;

        let desk = h.desk.lock().unwrap();
        assert_eq!(desk.clipboard, None);
    }

    #[tokio::test]
    async fn test_sentence_limit_applies_to_request() {
        let mut limited = policy();
        limited.max_sentences = Some(2);
        let mut h = harness(
            None,
            Some("One. Two. Three."),
            Some("sk"),
            FakeService::replying("One. Two."),
            limited,
        );
        h.txn.run().await;

        let requests = h.service.requests.lock().unwrap();
        assert_eq!(requests[0].0, "One. Two.");
    }

    #[test]
    fn test_policy_from_config() {
        let config = Config {
            hotkey: "Ctrl+E".to_string(),
            max_selection_chars: 50,
            ..Config::default()
        };
        let policy = Policy::from_config(&config);
        assert_eq!(policy.modifier, Modifier::Control);
        assert_eq!(policy.max_selection_chars, 50);
    }

    #[tokio::test]
    async fn test_panic_while_typing_still_restores() {
        let mut h = harness(
            Some("keep me"),
            Some("text"),
            Some("sk"),
            FakeService::replying("Text."),
            policy(),
        );
        h.desk.lock().unwrap().panic_typing = true;

        let result = AssertUnwindSafe(h.txn.run()).catch_unwind().await;
        assert!(result.is_err(), "panic should reach the worker");

        let desk = h.desk.lock().unwrap();
        assert_eq!(desk.clipboard.as_deref(), Some("keep me"));
        assert_eq!(desk.ops.last(), Some(&Op::Release));
        // Reporting is left to the worker
        assert!(h.notes.titles().is_empty());
    }
}
