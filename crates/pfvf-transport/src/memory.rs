use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::traits::Csr;

/// Callback run after every [`Csr::write`] on a [`MemoryCsr`].
///
/// Arguments are the register file, the offset, the previous value and the
/// new value. The register lock is not held while the hook runs, so the hook
/// may read and write the register file itself.
pub type WriteHook = Arc<dyn Fn(&MemoryCsr, u32, u32, u32) + Send + Sync>;

/// In-memory register file.
///
/// Stands in for the device BAR in tests and in the simulator. A write hook
/// can play the part of the interrupt controller.
#[derive(Default)]
pub struct MemoryCsr {
    regs: Mutex<HashMap<u32, u32>>,
    hook: RwLock<Option<WriteHook>>,
    writes: AtomicU64,
}

impl MemoryCsr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the write hook, replacing any previous one.
    pub fn set_write_hook(&self, hook: WriteHook) {
        *self.hook.write().unwrap_or_else(|e| e.into_inner()) = Some(hook);
    }

    /// Remove the write hook.
    pub fn clear_write_hook(&self) {
        *self.hook.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Read a register without going through the [`Csr`] trait.
    pub fn peek(&self, offset: u32) -> u32 {
        self.regs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&offset)
            .copied()
            .unwrap_or(0)
    }

    /// Set a register without counting the write or running the hook.
    pub fn poke(&self, offset: u32, value: u32) {
        self.regs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(offset, value);
    }

    /// Number of writes made through the [`Csr`] trait.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl Csr for MemoryCsr {
    fn read(&self, offset: u32) -> u32 {
        self.peek(offset)
    }

    fn write(&self, offset: u32, value: u32) {
        let old = self
            .regs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(offset, value)
            .unwrap_or(0);
        self.writes.fetch_add(1, Ordering::Relaxed);

        let hook = self
            .hook
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(hook) = hook {
            hook(self, offset, old, value);
        }
    }
}

impl std::fmt::Debug for MemoryCsr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCsr")
            .field("writes", &self.write_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;

    #[test]
    fn unset_registers_read_zero() {
        let csr = MemoryCsr::new();
        assert_eq!(csr.read(0x200), 0);
    }

    #[test]
    fn write_then_read() {
        let csr = MemoryCsr::new();
        csr.write(0x200, 0xDEAD_BEEF);
        assert_eq!(csr.read(0x200), 0xDEAD_BEEF);
        assert_eq!(csr.read(0x204), 0);
        assert_eq!(csr.write_count(), 1);
    }

    #[test]
    fn poke_bypasses_hook_and_counter() {
        let csr = MemoryCsr::new();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        csr.set_write_hook(Arc::new(move |_, _, _, _| {
            seen.fetch_add(1, Ordering::Relaxed);
        }));

        csr.poke(0x10, 7);
        assert_eq!(csr.peek(0x10), 7);
        assert_eq!(csr.write_count(), 0);
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn hook_sees_old_and_new_value_and_may_write_back() {
        let csr = MemoryCsr::new();
        csr.poke(0x10, 1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        csr.set_write_hook(Arc::new(move |regs, offset, old, new| {
            log.lock().unwrap().push((offset, old, new));
            if new & 0x8000_0000 != 0 {
                regs.write(offset, new & !0x8000_0000);
            }
        }));

        csr.write(0x10, 0x8000_0002);

        assert_eq!(csr.read(0x10), 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(0x10, 1, 0x8000_0002), (0x10, 0x8000_0002, 2)]
        );

        csr.clear_write_hook();
        csr.write(0x10, 0x8000_0000);
        assert_eq!(csr.read(0x10), 0x8000_0000);
    }
}
