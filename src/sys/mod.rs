//! Низкоуровневые обертки над системными вызовами
//!
//! Общая память (mmap) и рабочие процессы (fork / waitpid)

pub mod process;
pub mod shared;

pub use process::{Pid, WorkerExit};
pub use shared::SharedRegion;
