//! Admission control for in-flight translation requests.
//!
//! A bounded counter with no wait queue. A request that cannot be admitted
//! right away is rejected.

use std::sync::{Arc, Mutex, MutexGuard};

/// Bounded counter of active requests.
#[derive(Debug)]
pub struct AdmissionController {
    active: Mutex<usize>,
    capacity: usize,
}

impl AdmissionController {
    /// Creates a controller admitting at most `capacity` concurrent requests.
    pub fn new(capacity: usize) -> Self {
        Self {
            active: Mutex::new(0),
            capacity,
        }
    }

    /// Admits one request if a slot is free.
    ///
    /// Check and increment happen under one lock; returns false without
    /// side effects when full.
    pub fn try_admit(&self) -> bool {
        let mut active = self.lock();
        if *active < self.capacity {
            *active += 1;
            true
        } else {
            false
        }
    }

    /// Releases one slot. Clamped at zero, so a double release is harmless.
    pub fn release(&self) {
        let mut active = self.lock();
        *active = active.saturating_sub(1);
    }

    /// Admits one request and returns a permit that releases on drop.
    pub fn acquire(self: &Arc<Self>) -> Option<AdmissionPermit> {
        self.try_admit().then(|| AdmissionPermit {
            controller: Arc::clone(self),
        })
    }

    /// Number of requests currently admitted.
    pub fn active(&self) -> usize {
        *self.lock()
    }

    /// Maximum number of concurrently admitted requests.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        // The counter stays consistent even if a holder panicked.
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Held for the lifetime of an admitted request.
#[derive(Debug)]
pub struct AdmissionPermit {
    controller: Arc<AdmissionController>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.controller.release();
    }
}
