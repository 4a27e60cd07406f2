use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// One-shot signal from the receive path to a waiting requester.
#[derive(Debug, Default)]
pub struct Completion {
    done: Mutex<bool>,
    cond: Condvar,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the signal before a new request goes out.
    pub fn reinit(&self) {
        *self.done.lock().unwrap_or_else(|e| e.into_inner()) = false;
    }

    /// Raise the signal and wake the waiter.
    pub fn complete(&self) {
        *self.done.lock().unwrap_or_else(|e| e.into_inner()) = true;
        self.cond.notify_all();
    }

    pub fn is_complete(&self) -> bool {
        *self.done.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until completed or `timeout` elapses. Returns true if completed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let done = self.done.lock().unwrap_or_else(|e| e.into_inner());
        let (done, _) = self
            .cond
            .wait_timeout_while(done, timeout, |done| !*done)
            .unwrap_or_else(|e| e.into_inner());
        *done
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn completed_before_wait_returns_immediately() {
        let completion = Completion::new();
        completion.complete();
        assert!(completion.wait_timeout(Duration::from_secs(10)));
    }

    #[test]
    fn times_out_when_never_completed() {
        let completion = Completion::new();
        assert!(!completion.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn reinit_clears() {
        let completion = Completion::new();
        completion.complete();
        completion.reinit();
        assert!(!completion.is_complete());
    }

    #[test]
    fn wakes_waiter_from_other_thread() {
        let completion = Arc::new(Completion::new());
        let signal = Arc::clone(&completion);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            signal.complete();
        });
        assert!(completion.wait_timeout(Duration::from_secs(5)));
        handle.join().unwrap();
    }
}
