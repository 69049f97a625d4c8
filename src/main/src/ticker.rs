use core::time::Duration;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};

use anyhow::Result;
use log::*;

/// Runs a task now and then every `interval` on its own thread.
///
/// Ticks never overlap. Once [`Ticker::cancel`] returns no further tick runs.
pub struct Ticker {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn every<F>(interval: Duration, mut task: F) -> Result<Ticker>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("control-tick".into())
            .spawn(move || loop {
                task();
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        debug!("Ticker started, interval {:?}", interval);
        Ok(Ticker {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender wakes the thread even mid-wait
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Tick thread panicked");
            }
            debug!("Ticker stopped");
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
