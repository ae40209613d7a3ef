//! Barrier-phase-guarded interior mutability.
//!
//! The traversal is SPMD: every worker runs the same round structure, and
//! barriers split each round into phases. Within a phase either (a) exactly
//! one designated thread (a leader) mutates a structure while everyone else
//! waits at the next barrier, or (b) all threads read it and mutate only
//! through atomics. `PhaseCell` is the cell for case (a): it does no
//! synchronization of its own, the barrier protocol *is* the discipline.
//!
//! Every `get_mut` call site must name, in its SAFETY comment, the phase
//! that guarantees exclusivity.

use core::cell::UnsafeCell;

/// A `Sync` cell whose aliasing discipline is an external barrier protocol.
pub struct PhaseCell<T>(UnsafeCell<T>);

// SAFETY: all access goes through `get`/`get_mut`, whose contracts push the
// data-race freedom obligation onto the barrier protocol at the call site.
unsafe impl<T: Send> Sync for PhaseCell<T> {}

impl<T> PhaseCell<T> {
    /// Wraps a value.
    pub fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// Returns a shared reference to the value.
    ///
    /// # Safety
    /// No thread may hold a mutable reference for the duration of the
    /// returned borrow; in engine code this means the current barrier phase
    /// is a read phase for this cell.
    pub unsafe fn get(&self) -> &T {
        &*self.0.get()
    }

    /// Returns a mutable reference to the value.
    ///
    /// # Safety
    /// The caller must be the only thread touching this cell until the next
    /// barrier; in engine code this means the caller is the leader of a
    /// leader-only phase for this cell.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self) -> &mut T {
        &mut *self.0.get()
    }

    /// Consumes the cell, returning the value. Safe: `self` is owned.
    pub fn into_inner(self) -> T {
        self.0.into_inner()
    }

    /// Returns a mutable reference through exclusive ownership. Safe.
    pub fn as_mut(&mut self) -> &mut T {
        self.0.get_mut()
    }
}
