//! Request/response correlation for the VF side.
//!
//! A request holds the endpoint's request lock from send until its response
//! arrives or every attempt timed out. The transport's send mutex is only
//! held while the request itself is on the wire, so the receive path can
//! answer PF notifications while a request waits.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pfvf_codec::Message;
use pfvf_transport::{Clock, CsrTransport};
use tracing::{debug, warn};

use crate::completion::Completion;
use crate::error::{ProtoError, Result};

/// Strategy for waiting on a response.
pub trait Waiter {
    /// Wait up to `timeout` for `completion`. `poll` runs the receive path;
    /// waiters that cannot rely on interrupts call it themselves.
    fn wait(&self, completion: &Completion, timeout: Duration, poll: &dyn Fn()) -> bool;
}

/// Sleeps on the completion; the interrupt handler delivers the response.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompletionWaiter;

impl Waiter for CompletionWaiter {
    fn wait(&self, completion: &Completion, timeout: Duration, _poll: &dyn Fn()) -> bool {
        completion.wait_timeout(timeout)
    }
}

/// Busy-delays and runs the receive path itself. For use before interrupts
/// and timers are set up.
pub struct PollingWaiter {
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl PollingWaiter {
    pub fn new(clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self { clock, interval }
    }
}

impl Waiter for PollingWaiter {
    fn wait(&self, completion: &Completion, timeout: Duration, poll: &dyn Fn()) -> bool {
        let start = self.clock.now();
        loop {
            if completion.is_complete() {
                return true;
            }
            if self.clock.now().saturating_sub(start) >= timeout {
                return false;
            }
            self.clock.delay(self.interval);
            poll();
        }
    }
}

impl std::fmt::Debug for PollingWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingWaiter")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct Pending {
    waiting: bool,
    response: Option<Message>,
}

/// Pending-response slot and completion of one VF endpoint.
#[derive(Debug)]
pub struct Correlator {
    request_lock: Mutex<()>,
    pending: Mutex<Pending>,
    completion: Completion,
    timeout: Duration,
    retries: u32,
}

impl Correlator {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self {
            request_lock: Mutex::new(()),
            pending: Mutex::new(Pending::default()),
            completion: Completion::new(),
            timeout,
            retries: retries.max(1),
        }
    }

    /// Send `request` and wait for the response, resending on timeout.
    pub fn send_request(
        &self,
        transport: &CsrTransport,
        request: Message,
        waiter: &dyn Waiter,
        poll: &dyn Fn(),
    ) -> Result<Message> {
        let _guard = self.request_lock.lock().unwrap_or_else(|e| e.into_inner());

        for attempt in 1..=self.retries {
            self.arm();
            self.completion.reinit();

            if let Err(err) = transport.send(request) {
                self.disarm();
                return Err(err.into());
            }

            if waiter.wait(&self.completion, self.timeout, poll) {
                if let Some(response) = self.disarm() {
                    debug!(attempt, msg_type = response.msg_type, "response received");
                    return Ok(response);
                }
            }
            warn!(
                attempt,
                retries = self.retries,
                msg_type = request.msg_type,
                "response timed out"
            );
        }

        self.disarm();
        Err(ProtoError::Timeout {
            attempts: self.retries,
            timeout: self.timeout,
        })
    }

    /// Hand a response to the waiting requester.
    ///
    /// Returns false if no request is waiting; the response is dropped.
    pub fn deliver(&self, response: Message) -> bool {
        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            if !pending.waiting {
                return false;
            }
            pending.response = Some(response);
        }
        self.completion.complete();
        true
    }

    /// True while a request waits for its response.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .waiting
    }

    fn arm(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.waiting = true;
        pending.response = None;
    }

    fn disarm(&self) -> Option<Message> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.waiting = false;
        pending.response.take()
    }
}
