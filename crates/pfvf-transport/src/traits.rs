use std::sync::Arc;
use std::time::Duration;

/// Raw access to the mailbox CSRs.
///
/// Implemented by the bus layer of the driver. Offsets are in bytes from the
/// start of the BAR that holds the mailbox registers. Reads and writes must
/// be single 32-bit accesses; the protocol relies on a write replacing the
/// whole register atomically.
pub trait Csr: Send + Sync {
    /// Read a 32-bit register.
    fn read(&self, offset: u32) -> u32;

    /// Write a 32-bit register.
    fn write(&self, offset: u32, value: u32);
}

impl<T: Csr + ?Sized> Csr for Arc<T> {
    fn read(&self, offset: u32) -> u32 {
        (**self).read(offset)
    }

    fn write(&self, offset: u32, value: u32) {
        (**self).write(offset, value)
    }
}

/// Time source used by polling and backoff loops.
///
/// Abstracted so that retry bounds can be tested without real sleeps.
pub trait Clock: Send + Sync {
    /// Monotonic time since an arbitrary, fixed origin.
    fn now(&self) -> Duration;

    /// Sleep, yielding the CPU.
    fn sleep(&self, duration: Duration);

    /// Busy-wait without yielding, for contexts where the scheduler or
    /// timers are not usable yet.
    fn delay(&self, duration: Duration) {
        let start = self.now();
        while self.now().saturating_sub(start) < duration {
            std::hint::spin_loop();
        }
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }

    fn delay(&self, duration: Duration) {
        (**self).delay(duration)
    }
}
