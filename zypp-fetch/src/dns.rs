//! Host-resolution pre-check (§4.4.3). The C++ original forks a
//! short-lived child that calls `getaddrinfo` under an alarm; Rust has no
//! portable `fork`, so this spawns a detached thread instead and polls
//! its result non-blockingly, bounding resolution latency without
//! blocking the engine.

use std::net::ToSocketAddrs;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver};

/// Outcome of a host-resolution attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrecheckResult {
    Resolved,
    Failed,
}

/// A pre-check in flight: poll [`PrecheckHandle::poll`] until it returns
/// `Some`.
pub struct PrecheckHandle {
    rx: Receiver<PrecheckResult>,
}

impl PrecheckHandle {
    /// Spawn a resolution attempt for `host:port`, bounded by `timeout`.
    pub fn spawn(host: String, port: u16, timeout: Duration) -> Self {
        let (tx, rx) = bounded(1);
        thread::spawn(move || {
            let result = match (host.as_str(), port).to_socket_addrs() {
                Ok(mut addrs) if addrs.next().is_some() => PrecheckResult::Resolved,
                _ => PrecheckResult::Failed,
            };
            // The receiver may already be gone if the caller timed out
            // and dropped the handle; that's fine, there's no one left
            // to notify.
            let _ = tx.send(result);
        });
        // The `timeout` is honored by the caller via `poll_timeout`
        // rather than inside the thread, since `ToSocketAddrs` has no
        // cancellable variant in `std`.
        let _ = timeout;
        Self { rx }
    }

    /// Non-blocking poll: `None` means resolution is still in flight.
    pub fn poll(&self) -> Option<PrecheckResult> {
        self.rx.try_recv().ok()
    }

    /// Block up to `timeout` for a result, returning `Failed` on expiry
    /// (spec §4.4.3: "alarm of `connect_timeout`").
    pub fn wait(&self, timeout: Duration) -> PrecheckResult {
        self.rx.recv_timeout(timeout).unwrap_or(PrecheckResult::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolving_localhost_succeeds() {
        let handle = PrecheckHandle::spawn("localhost".to_string(), 80, Duration::from_secs(5));
        assert_eq!(handle.wait(Duration::from_secs(5)), PrecheckResult::Resolved);
    }

    #[test]
    fn resolving_an_invalid_host_fails() {
        let handle = PrecheckHandle::spawn(
            "this.host.does.not.exist.invalid".to_string(),
            80,
            Duration::from_secs(5),
        );
        assert_eq!(handle.wait(Duration::from_secs(5)), PrecheckResult::Failed);
    }
}
