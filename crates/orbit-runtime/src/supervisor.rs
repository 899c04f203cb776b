//! Supervised task spawning.
//!
//! The single chokepoint for concurrency in the runtime: every long-running
//! activity (loop feeders, timer callbacks, the HTTP server) is spawned
//! through here so panics are caught, logged with the task's name, and -
//! for long-lived tasks - the task is restarted until shutdown.

use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Sender half of the shutdown signal.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Fire the shutdown signal. Supervised tasks stop restarting and
    /// waiters wake.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiver half of the shutdown signal, cloned into every supervised task.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Whether shutdown has fired.
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the signal to fire.
    pub async fn wait(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Create a linked shutdown handle/signal pair.
pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Spawn a supervised task.
///
/// `factory` produces the task body; it runs on the tokio runtime inside
/// an inner spawn so a panic surfaces as a catchable `JoinError` instead of
/// tearing the runtime down. A panic is logged with the task's name; with
/// `restart`, the body is scheduled again until the shutdown signal fires.
pub fn spawn_supervised<F, Fut>(
    name: &'static str,
    mut shutdown: ShutdownSignal,
    restart: bool,
    mut factory: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            if shutdown.is_shutdown() {
                break;
            }

            let mut task = tokio::spawn(factory());
            tokio::select! {
                result = &mut task => match result {
                    Ok(()) => {
                        if !restart {
                            break;
                        }
                        // A long-lived body returning cleanly is rescheduled
                        // like a crashed one.
                    }
                    Err(e) => {
                        error!(task = name, panic = %panic_message(e), "supervised task panicked");
                        if !restart {
                            break;
                        }
                    }
                },
                _ = shutdown.wait() => {
                    task.abort();
                    break;
                }
            }
        }
        info!(task = name, "supervised task stopped");
    })
}

/// Spawn a one-off task: panics are caught and logged, never restarted.
pub fn spawn_one_off<Fut>(name: &'static str, shutdown: ShutdownSignal, task: Fut) -> JoinHandle<()>
where
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut task = Some(task);
    spawn_supervised(name, shutdown, false, move || {
        task.take().expect("one-off task runs once")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_panic_is_caught_and_restarted() {
        let (handle, signal) = shutdown_channel();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&runs);
        spawn_supervised("panicky", signal, true, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                panic!("boom");
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.shutdown();

        assert!(runs.load(Ordering::SeqCst) >= 2, "task was not restarted");
    }

    #[tokio::test]
    async fn test_one_off_runs_once() {
        let (_handle, signal) = shutdown_channel();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&runs);
        let join = spawn_one_off("once", signal, async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let _ = join.await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_restart_loop() {
        let (handle, signal) = shutdown_channel();
        let join = spawn_supervised("idle", signal, true, || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(1), join)
            .await
            .expect("supervisor did not stop on shutdown")
            .unwrap();
    }
}
