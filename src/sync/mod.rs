//! Примитивы синхронизации для потокового движка

pub mod semaphore;

pub use semaphore::{GuardSet, Semaphore, SemaphoreGuard};
