//! Signal handling for the scheduler loop.
//!
//! A background thread owns the `signal-hook` iterator and turns each signal
//! into a [`SignalMessage`] on an mpsc channel. The scheduler sleeps between
//! ticks with `recv_timeout` on that channel, so a shutdown request is noticed
//! immediately instead of after the current tick interval.
//!
//! Stopping the process never touches the mount: whatever the mount is doing
//! when heliotrack exits, it keeps doing.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1},
    iterator::Signals,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

/// Messages delivered to the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalMessage {
    /// Stop the loop (SIGTERM, SIGINT, SIGHUP)
    Shutdown,
    /// Log the derived phase and mount status (SIGUSR1)
    StatusReport,
}

/// Signal handling state shared between threads
pub struct SignalState {
    /// Cleared when the loop should exit
    pub running: Arc<AtomicBool>,
    pub signal_receiver: Receiver<SignalMessage>,
    /// Kept so tests and embedders can inject messages
    pub signal_sender: Sender<SignalMessage>,
}

impl SignalState {
    /// A channel pair with no OS signal thread attached.
    pub fn detached() -> Self {
        let (signal_sender, signal_receiver) = channel();
        Self {
            running: Arc::new(AtomicBool::new(true)),
            signal_receiver,
            signal_sender,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Register the signal handler thread.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let state = SignalState::detached();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR1])
        .context("failed to register signal handlers")?;

    let running = state.running.clone();
    let sender = state.signal_sender.clone();

    thread::spawn(move || {
        for sig in signals.forever() {
            if debug_enabled {
                log_debug!("Signal handler received signal {sig}");
            }

            let message = match sig {
                SIGUSR1 => SignalMessage::StatusReport,
                SIGTERM | SIGINT | SIGHUP => {
                    log_pipe!();
                    log_info!("Received shutdown signal");
                    running.store(false, Ordering::SeqCst);
                    SignalMessage::Shutdown
                }
                _ => continue,
            };

            // Receiver gone means the loop already exited
            if sender.send(message).is_err() || message == SignalMessage::Shutdown {
                break;
            }
        }
    });

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_state_delivers_injected_messages() {
        let state = SignalState::detached();
        assert!(state.is_running());

        state
            .signal_sender
            .send(SignalMessage::StatusReport)
            .unwrap();
        assert_eq!(
            state.signal_receiver.try_recv().unwrap(),
            SignalMessage::StatusReport
        );

        state.request_shutdown();
        assert!(!state.is_running());
    }
}
