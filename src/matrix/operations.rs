//! Операции над матрицами

use log::{debug, warn};
use rand::Rng;

use super::store::Matrix;
use super::types::{Element, MatrixType};

/// Заполняет матрицу заданным способом
pub fn initialize_matrix<T: Element, R: Rng + ?Sized>(
    m: &mut Matrix<T>,
    matrix_type: MatrixType,
    rng: &mut R,
) {
    let size = m.size();
    match matrix_type {
        MatrixType::Zeros => m.fill(T::ZERO),
        MatrixType::Ones => m.fill(T::ONE),
        MatrixType::RowPlusColumn => {
            for (idx, value) in m.as_mut_slice().iter_mut().enumerate() {
                *value = T::from_index(idx / size + idx % size);
            }
        }
        MatrixType::Random => {
            for value in m.as_mut_slice().iter_mut() {
                *value = T::sample(rng);
            }
        }
    }
}

/// Одна ячейка результата: сумма a[i][k] * b[k][j] по k
///
/// Порядок накопления одинаков во всех движках, поэтому результаты
/// совпадают побитово и для вещественных типов.
#[inline]
pub fn multiply_cell<T: Element>(a: &[T], b: &[T], size: usize, row: usize, col: usize) -> T {
    let a_row = &a[row * size..(row + 1) * size];
    let mut sum = T::ZERO;
    for k in 0..size {
        sum = sum.mul_acc(a_row[k], b[k * size + col]);
    }
    sum
}

/// Целая строка результата в `out` (длина size)
#[inline]
pub fn multiply_row<T: Element>(a: &[T], b: &[T], size: usize, row: usize, out: &mut [T]) {
    for (col, cell) in out.iter_mut().enumerate().take(size) {
        *cell = multiply_cell(a, b, size, row, col);
    }
}

/// CPU реализация матричного умножения (эталон)
///
/// Порядок циклов: i, затем j, затем k.
pub fn cpu_matrix_multiply<T: Element>(a: &[T], b: &[T], c: &mut [T], size: usize) {
    for i in 0..size {
        for j in 0..size {
            c[i * size + j] = multiply_cell(a, b, size, i, j);
        }
    }
}

/// Результат сравнения двух матриц
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    /// Количество различающихся элементов
    pub mismatches: usize,
    /// Максимальная разница
    pub max_diff: f64,
}

impl Comparison {
    pub fn matches(&self) -> bool {
        self.mismatches == 0
    }
}

/// Сравнивает результат движка с эталоном
pub fn compare_results<T: Element>(
    result: &Matrix<T>,
    reference: &Matrix<T>,
    epsilon: f64,
) -> Comparison {
    let mut max_diff = 0.0f64;
    let mut mismatches = 0;

    for (&got, &expected) in result.as_slice().iter().zip(reference.as_slice()) {
        let diff = got.abs_diff(expected);
        if diff > epsilon || diff.is_nan() {
            mismatches += 1;
            max_diff = max_diff.max(diff);
        }
    }
    if result.size() != reference.size() {
        mismatches += result.as_slice().len().abs_diff(reference.as_slice().len());
    }

    if mismatches > 0 {
        warn!(
            "Обнаружены расхождения: {} элементов, максимальная разница {}",
            mismatches, max_diff
        );
    } else {
        debug!("Результаты полностью совпадают");
    }
    Comparison { mismatches, max_diff }
}
