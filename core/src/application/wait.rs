//! Bounded, cancellable polling of a daemon socket.

use std::path::Path;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::ports::SocketProbe;

/// Delay between two probes.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Waits until a listener accepts connections on `path`.
pub async fn wait_until_running<P: SocketProbe>(
    probe: &P,
    what: &str,
    path: &Path,
    limit: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    wait_for(probe, what, path, limit, cancel, true).await
}

/// Waits until nothing accepts connections on `path` any more.
pub async fn wait_until_vanishes<P: SocketProbe>(
    probe: &P,
    what: &str,
    path: &Path,
    limit: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    wait_for(probe, what, path, limit, cancel, false).await
}

async fn wait_for<P: SocketProbe>(
    probe: &P,
    what: &str,
    path: &Path,
    limit: Duration,
    cancel: &CancellationToken,
    running: bool,
) -> Result<()> {
    let deadline = Instant::now() + limit;
    loop {
        if probe.exists(path).await? == running {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout {
                what: what.to_string(),
                condition: if running { "start" } else { "vanish" },
                path: path.to_path_buf(),
                timeout: limit,
            });
        }
        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(Error::Cancelled(what.to_string()));
            }
            _ = sleep(POLL_INTERVAL) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Probe that reports a scripted sequence of answers, then repeats the last.
    struct ScriptedProbe {
        answers: Mutex<Vec<bool>>,
        calls: Arc<Mutex<usize>>,
    }

    impl ScriptedProbe {
        fn new(answers: Vec<bool>) -> Self {
            Self {
                answers: Mutex::new(answers),
                calls: Arc::new(Mutex::new(0)),
            }
        }
    }

    impl SocketProbe for ScriptedProbe {
        async fn exists(&self, _path: &Path) -> Result<bool> {
            *self.calls.lock() += 1;
            let mut answers = self.answers.lock();
            if answers.len() > 1 {
                Ok(answers.remove(0))
            } else {
                Ok(answers[0])
            }
        }

        async fn quit(&self, _path: &Path) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_running_polls() {
        let probe = ScriptedProbe::new(vec![false, false, true]);
        let cancel = CancellationToken::new();
        wait_until_running(&probe, "root daemon", Path::new("/s"), Duration::from_secs(1), &cancel)
            .await
            .unwrap();
        assert_eq!(*probe.calls.lock(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let probe = ScriptedProbe::new(vec![true]);
        let cancel = CancellationToken::new();
        let err = wait_until_vanishes(
            &probe,
            "root daemon",
            Path::new("/s"),
            Duration::from_millis(500),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "timeout while waiting for root daemon to vanish at /s"
        );
        // One probe at start, then one per poll interval.
        assert_eq!(*probe.calls.lock(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_is_cancellable() {
        let probe = ScriptedProbe::new(vec![false]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = wait_until_running(&probe, "root daemon", Path::new("/s"), Duration::from_secs(10), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));
    }
}
