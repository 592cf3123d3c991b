use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Exit status of a process ended by SIGINT
const SIGINT_EXIT: i32 = 130;

/// Session-wide Ctrl-C handling. While a turn is running an interrupt cancels
/// it; at any other time it ends the process as the default handler would.
#[derive(Clone, Default)]
pub struct Interrupts {
    in_turn: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Interrupts {
    /// Take over SIGINT for the rest of the process
    pub fn install() -> Self {
        let interrupts = Self::default();
        let listener = interrupts.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !listener.interrupt() {
                    std::process::exit(SIGINT_EXIT);
                }
            }
        });
        interrupts
    }

    /// Deliver one interrupt; false when no turn was running to absorb it
    pub fn interrupt(&self) -> bool {
        if !self.in_turn.load(Ordering::SeqCst) {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    /// Drive `turn` to completion unless interrupted first
    pub async fn during<F: Future>(&self, turn: F) -> Option<F::Output> {
        let cancelled = self.notify.notified();
        tokio::pin!(cancelled);
        // registered before the flag flips so no interrupt falls in between
        cancelled.as_mut().enable();
        self.in_turn.store(true, Ordering::SeqCst);

        let output = tokio::select! {
            output = turn => Some(output),
            _ = cancelled => None,
        };
        self.in_turn.store(false, Ordering::SeqCst);
        output
    }
}
