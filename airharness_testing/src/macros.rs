//! Assertion macros shared by unit and integration tests.

/// Await a wait future and panic with contextual diagnostics on failure.
#[macro_export]
macro_rules! wait_expect {
    ($fut:expr) => {{
        $fut.await
            .expect(concat!("wait failed at ", file!(), ":", line!()))
    }};
    ($fut:expr, $msg:expr) => {{
        let m = ::std::format!("{msg} at {}:{}", file!(), line!(), msg = $msg);
        $fut.await.expect(&m)
    }};
}

/// Await a wait future that must end in a transition violation and return
/// the offending snapshot.
#[macro_export]
macro_rules! expect_violation {
    ($fut:expr) => {{
        match $fut.await {
            Err(::airharness::WaitError::TransitionViolation { observed, .. }) => *observed,
            other => panic!(
                "expected a transition violation at {}:{}, got {other:?}",
                file!(),
                line!()
            ),
        }
    }};
}

/// Await a wait future that must time out and return the last snapshot seen.
#[macro_export]
macro_rules! expect_timeout {
    ($fut:expr) => {{
        match $fut.await {
            Err(::airharness::WaitError::Timeout { last, .. }) => *last,
            other => panic!(
                "expected a timeout at {}:{}, got {other:?}",
                file!(),
                line!()
            ),
        }
    }};
}

pub use crate::{expect_timeout, expect_violation, wait_expect};
