//! POSIX signal wiring.
//!
//! | signal          | effect                        |
//! |-----------------|-------------------------------|
//! | SIGUSR1         | toggle backlight              |
//! | SIGUSR2         | toggle liked on current track |
//! | SIGIO           | show host/IP screen           |
//! | SIGALRM         | skip to next track            |
//! | SIGHUP/INT/TERM | blank display and exit        |

use crate::core::ControlEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[cfg(unix)]
pub fn spawn_handlers(
    events: mpsc::Sender<ControlEvent>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    use anyhow::Context;
    use tokio::signal::unix::{signal, SignalKind};
    use tracing::{debug, info};

    let controls = [
        (SignalKind::user_defined1(), "SIGUSR1", ControlEvent::ToggleBacklight),
        (SignalKind::user_defined2(), "SIGUSR2", ControlEvent::ToggleLiked),
        (SignalKind::io(), "SIGIO", ControlEvent::ShowSplash),
        (SignalKind::alarm(), "SIGALRM", ControlEvent::NextTrack),
    ];
    for (kind, name, event) in controls {
        let mut stream = signal(kind).with_context(|| format!("Failed to listen for {}", name))?;
        let events = events.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    received = stream.recv() => {
                        if received.is_none() {
                            break;
                        }
                        debug!("Received {}", name);
                        // Signals arriving while the queue is full are dropped.
                        if events.try_send(event).is_err() {
                            debug!("Dropped {}: event queue full", name);
                        }
                    }
                }
            }
        });
    }

    let terminators = [
        (SignalKind::hangup(), "SIGHUP"),
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ];
    for (kind, name) in terminators {
        let mut stream = signal(kind).with_context(|| format!("Failed to listen for {}", name))?;
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                Some(()) = stream.recv() => {
                    info!("Received {}, shutting down", name);
                    shutdown.cancel();
                }
            }
        });
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn spawn_handlers(
    _events: mpsc::Sender<ControlEvent>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        shutdown.cancel();
    });
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use std::time::Duration;

    // Signals reach the whole test process, so both paths share one test.
    #[tokio::test]
    async fn test_control_and_shutdown_signals() {
        let (tx, mut rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        spawn_handlers(tx, shutdown.clone()).unwrap();

        kill(Pid::this(), Signal::SIGUSR1).unwrap();
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(ControlEvent::ToggleBacklight));

        kill(Pid::this(), Signal::SIGALRM).unwrap();
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(ControlEvent::NextTrack));
        assert!(!shutdown.is_cancelled());

        kill(Pid::this(), Signal::SIGHUP).unwrap();
        tokio::time::timeout(Duration::from_secs(5), shutdown.cancelled())
            .await
            .expect("SIGHUP did not cancel the shutdown token");

        // Control listeners stop once shut down, closing the channel.
        let closed = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(closed, None);
    }
}
