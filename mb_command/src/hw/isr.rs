//! Interrupt-shared scalar cells.
//!
//! State written by the step interrupt and read by the main loop (or the
//! other way round, for the P-Stop input) goes through an [`IsrCell`].
//! Every access copies the whole value inside a critical section, so a
//! multi-byte position can never be observed half-updated.

use core::cell::Cell;

use critical_section::Mutex;

/// Single-writer cell safe to share with interrupt context.
pub struct IsrCell<T: Copy> {
    inner: Mutex<Cell<T>>,
}

impl<T: Copy> IsrCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(Cell::new(value)),
        }
    }

    #[inline]
    pub fn load(&self) -> T {
        critical_section::with(|cs| self.inner.borrow(cs).get())
    }

    #[inline]
    pub fn store(&self, value: T) {
        critical_section::with(|cs| self.inner.borrow(cs).set(value));
    }

    /// Store `value` and return the previous contents in one critical section.
    #[inline]
    pub fn replace(&self, value: T) -> T {
        critical_section::with(|cs| self.inner.borrow(cs).replace(value))
    }
}

impl<T: Copy + Default> Default for IsrCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Copy + core::fmt::Debug> core::fmt::Debug for IsrCell<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("IsrCell").field(&self.load()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn load_store_replace() {
        let cell = IsrCell::new(3u32);
        assert_eq!(cell.load(), 3);
        cell.store(7);
        assert_eq!(cell.replace(9), 7);
        assert_eq!(cell.load(), 9);
    }

    #[test]
    fn shared_across_threads() {
        let cell = Arc::new(IsrCell::new([0i32; 5]));
        let writer = Arc::clone(&cell);
        let handle = std::thread::spawn(move || {
            for i in 0..1000 {
                writer.store([i; 5]);
            }
        });
        for _ in 0..1000 {
            let snapshot = cell.load();
            // never torn: all components written together
            assert!(snapshot.iter().all(|&v| v == snapshot[0]));
        }
        handle.join().unwrap();
    }
}
