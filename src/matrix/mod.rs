//! Модуль для работы с матрицами
//!
//! Предоставляет:
//! - Типы элементов и способы заполнения
//! - Хранилище трех матриц (A, B, C)
//! - Последовательное ядро умножения и сравнение результатов

mod types;
mod store;
pub mod operations;

pub use types::{Element, MatrixType};
pub use store::{Matrix, MatrixStore};
pub use operations::{compare_results, cpu_matrix_multiply, initialize_matrix, Comparison};
