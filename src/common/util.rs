use std::{
    fmt::Display,
    future::Future,
    pin::pin,
    str::FromStr,
    sync::Arc,
    task::{Context, Poll},
};

use crossbeam_utils::sync::{Parker, Unparker};
use futures_util::task::ArcWake;

// ===============================================================================================
// Environment
// ===============================================================================================
/// Reads and parses an environment variable. Unset variables yield `None`; values that do not
/// parse are logged and ignored.
pub(crate) fn env_var<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = std::env::var(name).ok()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!("ignoring {}={:?}: {}", name, raw, err);
            None
        }
    }
}

// ===============================================================================================
// Futures
// ===============================================================================================
/// Blocks the calling thread until a future resolves, without needing a runtime.
pub(crate) trait BlockOn: Future {
    fn block_on(self) -> <Self as Future>::Output;
}

struct ParkedThread(Unparker);

impl ArcWake for ParkedThread {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.unpark();
    }
}

impl<F: Future> BlockOn for F {
    fn block_on(self) -> <Self as Future>::Output {
        let parker = Parker::new();
        let waker = futures_util::task::waker(Arc::new(ParkedThread(parker.unparker().clone())));
        let mut cx = Context::from_waker(&waker);
        let mut future = pin!(self);

        loop {
            if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
                return output;
            }
            parker.park();
        }
    }
}
