//! Process-wide single-flight gate.
//!
//! At most one run holds a [`RunPermit`] at any moment; other callers block in
//! [`SingleFlight::acquire`] with no ordering guarantee.

use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct SingleFlight {
    lock: Mutex<()>,
}

/// Proof of exclusive access, released on drop.
#[derive(Debug)]
pub struct RunPermit<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl SingleFlight {
    pub const fn new() -> Self {
        Self { lock: Mutex::new(()) }
    }

    /// Block until no other run is active.
    ///
    /// A run that panicked while holding the gate poisons the mutex; the
    /// poison is cleared so later runs keep being served.
    pub fn acquire(&self) -> RunPermit<'_> {
        tracing::debug!("lock gate");
        let guard = self.lock.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            tracing::warn!("previous run panicked; recovering gate");
            self.lock.clear_poison();
            poisoned.into_inner()
        });
        RunPermit { _guard: guard }
    }

    /// Acquire without blocking; `None` if a run is active.
    pub fn try_acquire(&self) -> Option<RunPermit<'_>> {
        match self.lock.try_lock() {
            Ok(guard) => Some(RunPermit { _guard: guard }),
            Err(std::sync::TryLockError::Poisoned(poisoned)) => {
                self.lock.clear_poison();
                Some(RunPermit {
                    _guard: poisoned.into_inner(),
                })
            }
            Err(std::sync::TryLockError::WouldBlock) => None,
        }
    }
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        tracing::debug!("unlock gate");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn at_most_one_holder_at_a_time() {
        let gate = Arc::new(SingleFlight::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (gate, active, peak) = (gate.clone(), active.clone(), peak.clone());
                thread::spawn(move || {
                    let _permit = gate.acquire();
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn try_acquire_fails_while_held() {
        let gate = SingleFlight::new();
        let permit = gate.acquire();
        assert!(gate.try_acquire().is_none());
        drop(permit);
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn gate_recovers_after_panicking_holder() {
        let gate = Arc::new(SingleFlight::new());
        let g = gate.clone();
        let result = thread::spawn(move || {
            let _permit = g.acquire();
            panic!("run blew up");
        })
        .join();
        assert!(result.is_err());

        let _permit = gate.acquire();
        assert!(gate.try_acquire().is_none());
    }
}
