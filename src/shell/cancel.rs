//! Run cancellation.
//!
//! A [`CancelFlag`] is shared between the caller and the scheduler. The
//! scheduler checks it before every dispatch; jobs already running are left
//! to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
    watch_interrupt: bool,
}

impl CancelFlag {
    /// A flag that is only set by [`CancelFlag::cancel`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag that is also set when the process receives SIGINT.
    ///
    /// Installs the handler on first use. On non-unix platforms this is the
    /// same as [`CancelFlag::new`].
    pub fn with_interrupt() -> Self {
        install_interrupt_handler();
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            watch_interrupt: cfg!(unix),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || (self.watch_interrupt && INTERRUPTED.load(Ordering::SeqCst))
    }
}

#[cfg(unix)]
extern "C" fn on_interrupt(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
fn install_interrupt_handler() {
    use std::sync::Once;
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let handler = on_interrupt as extern "C" fn(libc::c_int);
        // SAFETY: the handler only stores to an atomic, which is async-signal-safe
        unsafe {
            libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        }
    });
}

#[cfg(not(unix))]
fn install_interrupt_handler() {}
