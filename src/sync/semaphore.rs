//! Семафоры и набор охранников по столбцам

use parking_lot::{Condvar, Mutex};

use crate::error::{EngineError, Result};

/// Счетный семафор
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Берет разрешение, блокируясь пока оно не появится
    pub fn acquire(&self) -> SemaphoreGuard<'_> {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
        SemaphoreGuard { semaphore: self }
    }

    /// Берет разрешение без ожидания
    #[cfg(test)]
    pub(crate) fn try_acquire(&self) -> Option<SemaphoreGuard<'_>> {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return None;
        }
        *permits -= 1;
        Some(SemaphoreGuard { semaphore: self })
    }

    #[cfg(test)]
    pub(crate) fn available_permits(&self) -> usize {
        *self.permits.lock()
    }

    fn release(&self) {
        *self.permits.lock() += 1;
        self.available.notify_one();
    }
}

/// Разрешение семафора; возвращается в `Drop`, в том числе при панике
pub struct SemaphoreGuard<'a> {
    semaphore: &'a Semaphore,
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

/// Набор двоичных семафоров: охранник `col % len` защищает группу столбцов
///
/// Разные столбцы одной группы тоже выполняются по очереди, хотя
/// не конфликтуют. На корректность это не влияет.
pub struct GuardSet {
    guards: Vec<Semaphore>,
}

impl GuardSet {
    /// # Errors
    /// `GuardSetup` для пустого набора.
    pub fn new(count: usize) -> Result<Self> {
        if count == 0 {
            return Err(EngineError::GuardSetup(
                "guard set needs at least one semaphore".to_string(),
            ));
        }
        Ok(Self {
            guards: (0..count).map(|_| Semaphore::new(1)).collect(),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.guards.len()
    }

    /// Индекс охранника для столбца
    pub fn index_for(&self, col: usize) -> usize {
        col % self.guards.len()
    }

    /// Захватывает охранника группы, к которой относится столбец
    pub fn lock_column(&self, col: usize) -> SemaphoreGuard<'_> {
        self.guards[self.index_for(col)].acquire()
    }

    #[cfg(test)]
    fn guard(&self, index: usize) -> &Semaphore {
        &self.guards[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_try_acquire_exhausts_permits() {
        let sem = Semaphore::new(2);
        let g1 = sem.try_acquire();
        let g2 = sem.try_acquire();
        assert!(g1.is_some() && g2.is_some());
        assert!(sem.try_acquire().is_none());
        drop(g1);
        assert_eq!(sem.available_permits(), 1);
        drop(g2);
        assert_eq!(sem.available_permits(), 2);
    }

    #[test]
    fn test_binary_semaphore_mutual_exclusion() {
        let sem = Semaphore::new(1);
        let inside = AtomicUsize::new(0);
        let max_inside = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..200 {
                        let _guard = sem.acquire();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(sem.available_permits(), 1);
    }

    #[test]
    fn test_guard_released_on_panic() {
        let sem = Semaphore::new(1);
        let result = thread::scope(|s| {
            s.spawn(|| {
                let _guard = sem.acquire();
                panic!("worker failure");
            })
            .join()
        });
        assert!(result.is_err());
        assert!(sem.try_acquire().is_some());
    }

    #[test]
    fn test_guard_set_columns() {
        let set = GuardSet::new(3).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.index_for(0), 0);
        assert_eq!(set.index_for(4), 1);
        assert_eq!(set.index_for(5), 2);

        let _held = set.lock_column(4);
        assert!(set.guard(1).try_acquire().is_none());
        assert!(set.guard(0).try_acquire().is_some());
    }

    #[test]
    fn test_empty_guard_set_rejected() {
        assert!(matches!(GuardSet::new(0), Err(EngineError::GuardSetup(_))));
    }
}
