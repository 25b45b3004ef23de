//! Graceful shutdown signal: a single broadcast channel fed by ctrl-c (and
//! SIGTERM on unix), since this daemon has no RPC listener whose socket
//! needs an orderly close.

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    CtrlC,
    #[cfg(unix)]
    SigTerm,
}

#[derive(Clone)]
pub struct Terminator {
    tx: broadcast::Sender<Interrupted>,
}

impl Terminator {
    /// # Errors
    ///
    /// Returns an error if every receiver has already been dropped.
    pub fn terminate(&self, reason: Interrupted) -> Result<(), broadcast::error::SendError<Interrupted>> {
        self.tx.send(reason)?;
        Ok(())
    }
}

pub struct InterruptReceiver {
    rx: broadcast::Receiver<Interrupted>,
}

impl InterruptReceiver {
    /// # Errors
    ///
    /// Returns an error if the sender half has been dropped without ever
    /// sending (should not happen in practice since the signal task holds it).
    pub async fn wait(&mut self) -> Result<Interrupted, broadcast::error::RecvError> {
        self.rx.recv().await
    }
}

/// Spawn the signal-listening task and return the receiving half.
#[must_use]
pub fn create_termination() -> (Terminator, InterruptReceiver) {
    let (tx, rx) = broadcast::channel(2);
    let terminator = Terminator { tx };
    let background = terminator.clone();
    tokio::spawn(async move {
        listen(background).await;
    });
    (terminator, InterruptReceiver { rx })
}

#[cfg(unix)]
async fn listen(terminator: Terminator) {
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(s) => s,
        Err(err) => {
            log::warn!("could not install SIGTERM handler: {err}");
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            let _ = terminator.terminate(Interrupted::CtrlC);
        }
        _ = sigterm.recv() => {
            let _ = terminator.terminate(Interrupted::SigTerm);
        }
    }
}

#[cfg(not(unix))]
async fn listen(terminator: Terminator) {
    if tokio::signal::ctrl_c().await.is_ok() {
        let _ = terminator.terminate(Interrupted::CtrlC);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn terminate_wakes_a_waiting_receiver() {
        let (tx, rx) = broadcast::channel(1);
        let terminator = Terminator { tx };
        let mut receiver = InterruptReceiver { rx };
        terminator.terminate(Interrupted::CtrlC).unwrap();
        assert_eq!(receiver.wait().await, Ok(Interrupted::CtrlC));
    }
}
