//! One-shot cleanup on interrupt.
//!
//! A [`CancellationContext`] holds a single cleanup callback. Two paths race
//! for it: the interrupt listener calls [`fire`](CancellationContext::fire)
//! and the normal exit path calls [`disarm`](CancellationContext::disarm).
//! Whichever takes the callback first wins; the callback runs under the
//! lock, so `disarm` returns only after an in-flight cleanup has finished.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info};

use super::error::LifecycleError;

type Cleanup = Box<dyn FnOnce() + Send + 'static>;

/// Process-wide registration of a single cleanup callback.
pub struct CancellationContext {
    cleanup: Mutex<Option<Cleanup>>,
}

impl CancellationContext {
    /// Arm the context with `cleanup`.
    pub fn new(cleanup: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cleanup: Mutex::new(Some(Box::new(cleanup))),
        }
    }

    /// Run the cleanup if still armed. Returns whether it ran.
    pub fn fire(&self) -> bool {
        let mut slot = self.lock();
        match slot.take() {
            Some(cleanup) => {
                cleanup();
                true
            }
            None => false,
        }
    }

    /// Drop the cleanup without running it. Returns whether it was armed.
    pub fn disarm(&self) -> bool {
        self.lock().take().is_some()
    }

    /// Whether the cleanup is still pending.
    pub fn is_armed(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Cleanup>> {
        // A panicking cleanup leaves the slot empty, which is still valid.
        self.cleanup.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Route SIGINT to `ctx.fire()` on a dedicated thread.
///
/// The signal is registered before this returns. From then on SIGINT no
/// longer terminates the process.
pub fn install_interrupt_handler(
    ctx: Arc<CancellationContext>,
) -> Result<JoinHandle<()>, LifecycleError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(LifecycleError::Runtime)?;

    let mut interrupts = {
        let _guard = runtime.enter();
        signal(SignalKind::interrupt()).map_err(LifecycleError::SignalRegistration)?
    };
    debug!("SIGINT handler registered");

    thread::Builder::new()
        .name("interrupt-listener".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                while interrupts.recv().await.is_some() {
                    info!("Interrupt received");
                    if !ctx.fire() {
                        debug!("Cleanup already ran or was disarmed");
                    }
                }
            });
        })
        .map_err(LifecycleError::Spawn)
}
