//! Умножение квадратных матриц на CPU разными стратегиями параллелизма
//!
//! - последовательное ядро (эталон)
//! - процессы через fork с общей памятью (mmap)
//! - потоки с набором семафоров по столбцам
//! - строки на пуле rayon
//! - библиотечное умножение ndarray (эталон по времени)

#[cfg(not(unix))]
compile_error!("parallel_matmul требует unix (fork, mmap, waitpid)");

// Макросы объявлены до модулей, которые их используют
#[macro_use]
mod macros {
    /// Макрос для обработки системных вызовов (коды возврата -1)
    #[macro_export]
    macro_rules! sys_check {
        ($expr:expr) => {{
            let ret = unsafe { $expr };
            if ret == -1 {
                Err(std::io::Error::last_os_error())
            } else {
                Ok(ret)
            }
        }};
    }

    /// Макрос для системных вызовов, возвращающих указатель
    #[macro_export]
    macro_rules! sys_map {
        ($expr:expr) => {{
            let ptr = unsafe { $expr };
            if ptr == libc::MAP_FAILED || ptr.is_null() {
                Err(std::io::Error::last_os_error())
            } else {
                Ok(ptr)
            }
        }};
    }
}

pub mod config;
pub mod engine;
pub mod error;
pub mod matrix;
pub mod report;
pub mod sync;
pub mod sys;
pub mod utils;

// Реэкспорт основных типов для удобства
pub use config::{ElementKind, RunConfig};
pub use engine::{execute, ClaimStrategy, EngineKind, MatmulEngine, RowDispatch, WorkStats};
pub use error::{EngineError, Result};
pub use matrix::{Element, Matrix, MatrixStore, MatrixType};
