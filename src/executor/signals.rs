//! Signal-driven graceful shutdown (spec §4.3, §5). Cleanup callbacks run
//! in registration order on the first `interrupt`/`terminate`; a second
//! signal during the grace window hard-exits immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

pub type CleanupFn = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone, Default)]
pub struct CleanupRegistry {
    callbacks: Arc<Mutex<Vec<CleanupFn>>>,
    shutting_down: Arc<AtomicBool>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, callback: CleanupFn) {
        self.callbacks.lock().await.push(callback);
    }

    /// Runs all registered callbacks in registration order, then returns.
    /// Idempotent: a second call is a no-op.
    pub async fn run_once(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut callbacks = self.callbacks.lock().await;
        for callback in callbacks.drain(..) {
            callback();
        }
    }

    /// Installs OS signal listeners and returns immediately; spawns a task
    /// that waits for interrupt/terminate, runs cleanup in order, then
    /// exits with 0 (interrupt) or 1 (terminate). A second signal before
    /// cleanup completes hard-exits with 130 (SIGINT) semantics.
    pub fn install(self) {
        tokio::spawn(async move {
            let hard_exit = Arc::new(AtomicBool::new(false));
            let hard_exit_armed = hard_exit.clone();
            tokio::spawn(async move {
                wait_for_second_signal().await;
                if hard_exit_armed.load(Ordering::SeqCst) {
                    std::process::exit(130);
                }
            });

            let exit_code = wait_for_first_signal().await;
            hard_exit.store(true, Ordering::SeqCst);
            self.run_once().await;
            std::process::exit(exit_code);
        });
    }
}

#[cfg(unix)]
async fn wait_for_first_signal() -> i32 {
    use tokio::signal::unix::{signal, SignalKind};
    let mut interrupt = signal(SignalKind::interrupt()).expect("installing SIGINT handler");
    let mut terminate = signal(SignalKind::terminate()).expect("installing SIGTERM handler");
    tokio::select! {
        _ = interrupt.recv() => 0,
        _ = terminate.recv() => 1,
    }
}

#[cfg(not(unix))]
async fn wait_for_first_signal() -> i32 {
    tokio::signal::ctrl_c().await.ok();
    0
}

#[cfg(unix)]
async fn wait_for_second_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut interrupt = signal(SignalKind::interrupt()).expect("installing SIGINT handler");
    let mut terminate = signal(SignalKind::terminate()).expect("installing SIGTERM handler");
    tokio::select! {
        _ = interrupt.recv() => {},
        _ = terminate.recv() => {},
    }
}

#[cfg(not(unix))]
async fn wait_for_second_signal() {
    tokio::signal::ctrl_c().await.ok();
}
