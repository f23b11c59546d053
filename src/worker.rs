//! Single-worker scheduling of triggered corrections
//!
//! The keyboard hook must return immediately, so a trigger only flips an
//! in-flight flag and posts a message. A dedicated thread waits the
//! debounce delay and runs the job. Triggers that arrive while a job is
//! pending or running are dropped.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::error::HOOK_ERROR_TITLE;
use crate::events::Notifier;

/// Work executed once per accepted trigger
pub trait Job {
    fn execute(&mut self) -> impl Future<Output = ()>;
}

enum Command {
    Run,
    Stop,
}

/// Cheap handle the hook thread uses to request a correction
#[derive(Clone)]
pub struct TriggerHandle {
    tx: mpsc::Sender<Command>,
    in_flight: Arc<AtomicBool>,
}

impl TriggerHandle {
    /// Request a run; returns false when the trigger was dropped
    pub fn fire(&self) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("correction already in flight, dropping trigger");
            return false;
        }

        if self.tx.send(Command::Run).is_err() {
            self.in_flight.store(false, Ordering::Release);
            warn!("correction worker is gone, dropping trigger");
            return false;
        }

        true
    }
}

pub struct CorrectionWorker {
    tx: mpsc::Sender<Command>,
    thread: Option<thread::JoinHandle<()>>,
}

impl CorrectionWorker {
    /// Spawn the worker thread
    ///
    /// `build` runs on the worker thread so the job may own resources
    /// that must stay on one thread (clipboard, input simulator).
    pub fn spawn<J, F, N>(
        debounce: Duration,
        runtime: Handle,
        notifier: N,
        build: F,
    ) -> std::io::Result<(Self, TriggerHandle)>
    where
        J: Job,
        F: FnOnce() -> anyhow::Result<J> + Send + 'static,
        N: Notifier + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let in_flight = Arc::new(AtomicBool::new(false));
        let worker_in_flight = Arc::clone(&in_flight);

        let thread = thread::Builder::new()
            .name("correction-worker".to_string())
            .spawn(move || {
                info!("correction worker started");
                let mut job = match build() {
                    Ok(job) => Some(job),
                    Err(e) => {
                        error!(?e, "failed to set up correction worker");
                        notifier.notify(HOOK_ERROR_TITLE, &format!("{e:#}"));
                        None
                    }
                };

                while let Ok(Command::Run) = rx.recv() {
                    if let Some(job) = job.as_mut() {
                        thread::sleep(debounce);
                        let result =
                            panic::catch_unwind(AssertUnwindSafe(|| runtime.block_on(job.execute())));
                        if let Err(payload) = result {
                            let message = panic_message(payload.as_ref());
                            error!(%message, "correction panicked");
                            notifier.notify(HOOK_ERROR_TITLE, &message);
                        }
                    } else {
                        notifier.notify(HOOK_ERROR_TITLE, "Text correction is unavailable.");
                    }
                    worker_in_flight.store(false, Ordering::Release);
                }

                info!("correction worker stopped");
            })?;

        let trigger = TriggerHandle {
            tx: tx.clone(),
            in_flight,
        };

        Ok((
            Self {
                tx,
                thread: Some(thread),
            },
            trigger,
        ))
    }

    /// Stop the worker, letting a running correction finish first
    pub fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.tx.send(Command::Stop);
            if thread.join().is_err() {
                warn!("correction worker thread panicked");
            }
        }
    }
}

impl Drop for CorrectionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected failure".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Notifier for Recorder {
        fn notify(&self, title: &str, body: &str) {
            self.0.lock().unwrap().push(format!("{title}: {body}"));
        }
    }

    struct Counting {
        runs: Arc<AtomicUsize>,
        hold: Duration,
    }

    impl Job for Counting {
        async fn execute(&mut self) {
            tokio::time::sleep(self.hold).await;
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Exploding;

    impl Job for Exploding {
        async fn execute(&mut self) {
            panic!("clipboard vanished");
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not met in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_trigger_runs_job_once() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let job_runs = Arc::clone(&runs);

        let (mut worker, trigger) = CorrectionWorker::spawn(
            Duration::from_millis(1),
            rt.handle().clone(),
            Recorder::default(),
            move || {
                Ok(Counting {
                    runs: job_runs,
                    hold: Duration::ZERO,
                })
            },
        )
        .unwrap();

        assert!(trigger.fire());
        wait_until(|| runs.load(Ordering::SeqCst) == 1);
        wait_until(|| !trigger.in_flight.load(Ordering::SeqCst));

        assert!(trigger.fire());
        wait_until(|| runs.load(Ordering::SeqCst) == 2);

        worker.shutdown();
    }

    #[test]
    fn test_overlapping_triggers_are_dropped() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let job_runs = Arc::clone(&runs);

        let (mut worker, trigger) = CorrectionWorker::spawn(
            Duration::ZERO,
            rt.handle().clone(),
            Recorder::default(),
            move || {
                Ok(Counting {
                    runs: job_runs,
                    hold: Duration::from_millis(200),
                })
            },
        )
        .unwrap();

        assert!(trigger.fire());
        assert!(!trigger.fire());
        assert!(!trigger.clone().fire());

        wait_until(|| runs.load(Ordering::SeqCst) == 1);
        worker.shutdown();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panic_is_reported_and_worker_survives() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let notes = Recorder::default();

        let (mut worker, trigger) =
            CorrectionWorker::spawn(Duration::ZERO, rt.handle().clone(), notes.clone(), || {
                Ok(Exploding)
            })
            .unwrap();

        assert!(trigger.fire());
        wait_until(|| notes.0.lock().unwrap().len() == 1);
        wait_until(|| !trigger.in_flight.load(Ordering::SeqCst));

        assert!(trigger.fire());
        wait_until(|| notes.0.lock().unwrap().len() == 2);

        let notes = notes.0.lock().unwrap();
        assert!(notes[0].starts_with("Hotkey Error"));
        assert!(notes[0].contains("clipboard vanished"));
        worker.shutdown();
    }

    #[test]
    fn test_failed_setup_reports_and_keeps_listening() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let notes = Recorder::default();

        let (mut worker, trigger) = CorrectionWorker::spawn(
            Duration::ZERO,
            rt.handle().clone(),
            notes.clone(),
            || -> anyhow::Result<Exploding> { anyhow::bail!("no clipboard") },
        )
        .unwrap();

        wait_until(|| notes.0.lock().unwrap().len() == 1);
        assert!(trigger.fire());
        wait_until(|| notes.0.lock().unwrap().len() == 2);
        worker.shutdown();
    }

    #[test]
    fn test_shutdown_is_idempotent_and_drops_later_triggers() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (mut worker, trigger) = CorrectionWorker::spawn(
            Duration::ZERO,
            rt.handle().clone(),
            Recorder::default(),
            || {
                Ok(Counting {
                    runs: Arc::new(AtomicUsize::new(0)),
                    hold: Duration::ZERO,
                })
            },
        )
        .unwrap();

        worker.shutdown();
        worker.shutdown();
        assert!(!trigger.fire());
    }
}
