use crate::registry::Registry;
use flume::{RecvTimeoutError, Sender};
use log::{error, info};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Period used when a caller wants ticks as fast as the lanes allow.
pub const BUSY_PERIOD: Duration = Duration::ZERO;

/// Background thread that drives a registry's virtual clock: every
/// `tick_period` of real time it advances all lanes by `tick_delta`.
///
/// A tick that has to wait for a busy lane is late, never skipped. Stops on
/// [`Ticker::stop`] or when dropped.
pub struct Ticker {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<u64>>,
}

impl Ticker {
    pub fn spawn(registry: Arc<Registry>) -> std::io::Result<Self> {
        let period = registry.config().tick_period;
        let delta = registry.config().tick_delta;
        let (shutdown_tx, shutdown_rx) = flume::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("ticklane-ticker".to_string())
            .spawn(move || {
                info!("ticker started: {} unit(s) every {:?}", delta, period);
                let mut ticks = 0u64;
                let mut next = Instant::now() + period;
                loop {
                    let wait = next.saturating_duration_since(Instant::now());
                    match shutdown_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {
                            registry.tick(delta);
                            ticks += 1;
                            // keep the cadence even if a tick ran long
                            next += period;
                        }
                        // stop requested or ticker handle dropped
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("ticker stopped after {} ticks", ticks);
                ticks
            })?;
        Ok(Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Stop ticking and wait for the thread. Returns the number of ticks run.
    pub fn stop(mut self) -> u64 {
        self.shutdown_and_join()
    }

    fn shutdown_and_join(&mut self) -> u64 {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(ticks)) => ticks,
            Some(Err(_)) => {
                error!("ticker thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}
