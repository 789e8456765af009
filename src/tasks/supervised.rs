//! Supervised background tasks.
//!
//! [`spawn_supervised`] is the only sanctioned way to start fire-and-forget
//! work. A panic inside the task is caught at the task boundary, logged with
//! the task name and the stack trace, and swallowed.
//!
//! Stack traces come from the process panic hook installed by
//! [`install_panic_hook`]: while a supervised future is being polled the
//! hook stashes a backtrace in a thread-local slot instead of printing it,
//! and the supervisor picks it up after `catch_unwind` returns. Panics
//! outside supervised scopes still reach the previous hook.

use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Once;
use tokio::task::JoinHandle;
use tracing::{debug, error};

thread_local! {
    static SUPERVISED_DEPTH: Cell<u32> = const { Cell::new(0) };
    static LAST_PANIC: RefCell<Option<CapturedPanic>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

struct CapturedPanic {
    location: String,
    backtrace: String,
}

/// Marks the current thread as polling a supervised task.
struct SupervisedScope;

impl SupervisedScope {
    fn enter() -> Self {
        SUPERVISED_DEPTH.with(|d| d.set(d.get() + 1));
        SupervisedScope
    }
}

impl Drop for SupervisedScope {
    fn drop(&mut self) {
        SUPERVISED_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// Install the process panic hook. Idempotent.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let supervised = SUPERVISED_DEPTH.with(|d| d.get() > 0);
            if supervised {
                let location = info
                    .location()
                    .map(|l| format!("{}:{}", l.file(), l.line()))
                    .unwrap_or_else(|| "unknown location".to_string());
                let backtrace = Backtrace::force_capture().to_string();
                LAST_PANIC.with(|slot| {
                    *slot.borrow_mut() = Some(CapturedPanic {
                        location,
                        backtrace,
                    })
                });
            } else {
                previous(info);
            }
        }));
    });
}

fn take_captured_panic() -> Option<CapturedPanic> {
    LAST_PANIC.with(|slot| slot.borrow_mut().take())
}

/// Extract a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn log_panic(name: &str, payload: &(dyn Any + Send)) {
    let message = panic_message(payload);
    match take_captured_panic() {
        Some(captured) => error!(
            task = name,
            "PANIC [{}]: {} at {}\n{}", name, message, captured.location, captured.backtrace
        ),
        None => error!(
            task = name,
            "PANIC [{}]: {} (no backtrace captured)", name, message
        ),
    }
}

/// Run `future` to completion, catching any panic it raises.
///
/// Returns `None` if the future panicked.
pub async fn run_supervised<F>(name: &str, future: F) -> Option<F::Output>
where
    F: Future,
{
    let mut future = Box::pin(future);
    let guarded = futures::future::poll_fn(move |cx| {
        let _scope = SupervisedScope::enter();
        future.as_mut().poll(cx)
    });

    match AssertUnwindSafe(guarded).catch_unwind().await {
        Ok(output) => Some(output),
        Err(payload) => {
            log_panic(name, payload.as_ref());
            None
        }
    }
}

/// Start `future` on its own task with panic isolation.
pub fn spawn_supervised<F>(name: impl Into<String>, future: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let name = name.into();
    tokio::spawn(async move {
        debug!("Starting supervised task {}", name);
        if run_supervised(&name, future).await.is_some() {
            debug!("Supervised task {} finished", name);
        }
    })
}

/// Blocking counterpart of [`spawn_supervised`], for filesystem-bound work.
pub fn spawn_blocking_supervised<F>(name: impl Into<String>, work: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    let name = name.into();
    tokio::task::spawn_blocking(move || {
        let result = {
            let _scope = SupervisedScope::enter();
            std::panic::catch_unwind(AssertUnwindSafe(work))
        };
        if let Err(payload) = result {
            log_panic(&name, payload.as_ref());
        }
    })
}
