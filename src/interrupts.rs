//! Interrupt holdoff for the storage manager.
//!
//! A worker may be asked at any moment, possibly from another thread, to close
//! every file it holds open. That request is only serviced at safe points
//! where no storage manager operation is in flight. Every public operation
//! holds interrupts for its whole body through a [HoldGuard], which restores
//! the previous holdoff level on every exit path, errors included.

use std::{
    cell::Cell,
    rc::Rc,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Cross thread handle used to request that a worker releases all of its
/// storage manager resources.
#[derive(Debug, Clone, Default)]
pub struct ReleaseSignal(Arc<AtomicBool>);

impl ReleaseSignal {
    /// Ask the owning worker to release every relation handle at its next
    /// safe point.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Return true if a release was requested and not yet serviced.
    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Per worker interrupt state.
#[derive(Debug, Default)]
pub struct Interrupts {
    holdoff: Cell<u32>,
    release: ReleaseSignal,
}

impl Interrupts {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Hold interrupts until the returned guard is dropped. Holds nest.
    pub fn hold(self: &Rc<Self>) -> HoldGuard {
        self.holdoff.set(self.holdoff.get() + 1);
        HoldGuard {
            interrupts: self.clone(),
        }
    }

    /// Return true when no hold is active.
    pub fn can_be_processed(&self) -> bool {
        self.holdoff.get() == 0
    }

    /// Current hold nesting level.
    pub fn holdoff_count(&self) -> u32 {
        self.holdoff.get()
    }

    /// Signal handle that other threads can use to request a release.
    pub fn release_signal(&self) -> ReleaseSignal {
        self.release.clone()
    }

    /// Consume a pending release request. Never reports a request while
    /// interrupts are held; it stays pending until the next safe point.
    pub(crate) fn take_pending_release(&self) -> bool {
        self.can_be_processed() && self.release.take()
    }
}

/// Scoped interrupt hold.
#[must_use = "interrupts are resumed as soon as the guard is dropped"]
pub struct HoldGuard {
    interrupts: Rc<Interrupts>,
}

impl Drop for HoldGuard {
    fn drop(&mut self) {
        let holdoff = self.interrupts.holdoff.get();
        debug_assert!(holdoff > 0, "interrupt holdoff underflow");
        self.interrupts.holdoff.set(holdoff.saturating_sub(1));
    }
}
