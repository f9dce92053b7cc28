use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const TICK_INTERVAL: Duration = Duration::from_millis(200);
const STEP: u8 = 10;
const CAP: u8 = 90;

/// Simulated upload progress.
///
/// Advances by 10% per tick on a helper thread and stops at 90% until
/// [`finish`](Self::finish) reports 100%.
pub struct ProgressTicker {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressTicker {
    pub fn start<F>(on_progress: F) -> Self
    where
        F: FnMut(u8) + Send + 'static,
    {
        Self::with_interval(TICK_INTERVAL, on_progress)
    }

    pub fn with_interval<F>(interval: Duration, mut on_progress: F) -> Self
    where
        F: FnMut(u8) + Send + 'static,
    {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let mut percent = 0u8;
            on_progress(percent);
            loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if percent < CAP {
                            percent = (percent + STEP).min(CAP);
                            on_progress(percent);
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            on_progress(100);
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop ticking and report completion. Blocks until the helper exits.
    pub fn finish(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<u8>>>, impl FnMut(u8) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |p| sink.lock().unwrap().push(p))
    }

    #[test]
    fn caps_at_ninety_until_finished() {
        let (seen, sink) = recorder();
        let ticker = ProgressTicker::with_interval(Duration::from_millis(2), sink);
        thread::sleep(Duration::from_millis(300));
        ticker.finish();

        let seen = seen.lock().unwrap();
        let (last, ticks) = seen.split_last().unwrap();
        assert_eq!(*last, 100);
        assert!(ticks.iter().all(|p| *p <= 90 && p % 10 == 0));
        assert!(ticks.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ticks.last(), Some(&90));
    }

    #[test]
    fn immediate_finish_jumps_to_hundred() {
        let (seen, sink) = recorder();
        let ticker = ProgressTicker::with_interval(Duration::from_secs(60), sink);
        ticker.finish();
        assert_eq!(*seen.lock().unwrap(), vec![0, 100]);
    }
}
