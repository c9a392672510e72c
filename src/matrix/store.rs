//! Хранилище матриц: плотные квадратные буферы в порядке строк

use ndarray::{ArrayView2, ArrayViewMut2};
use rand::Rng;

use super::operations::initialize_matrix;
use super::types::{Element, MatrixType};
use crate::error::{EngineError, Result};

/// Квадратная матрица size x size, хранится построчно
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T: Element> {
    size: usize,
    data: Vec<T>,
}

impl<T: Element> Matrix<T> {
    /// Выделяет матрицу, заполненную нулями
    ///
    /// # Errors
    /// `InvalidSize` для size == 0, `Allocation` если память не выделена.
    pub fn zeroed(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(EngineError::InvalidSize(size));
        }
        let elements = size
            .checked_mul(size)
            .ok_or(EngineError::InvalidSize(size))?;
        let mut data = Vec::new();
        data.try_reserve_exact(elements)
            .map_err(|source| EngineError::Allocation { elements, source })?;
        data.resize(elements, T::ZERO);
        Ok(Self { size, data })
    }

    /// Создает матрицу из готового буфера
    pub fn from_vec(size: usize, data: Vec<T>) -> Result<Self> {
        if size == 0 {
            return Err(EngineError::InvalidSize(size));
        }
        if data.len() != size * size {
            return Err(EngineError::BufferLength {
                expected: size * size,
                got: data.len(),
            });
        }
        Ok(Self { size, data })
    }

    /// Создает матрицу из строк (удобно в тестах)
    pub fn from_rows(rows: &[&[T]]) -> Result<Self> {
        let size = rows.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != size) {
            return Err(EngineError::ShapeMismatch {
                expected: size,
                got: bad.len(),
            });
        }
        Self::from_vec(size, rows.concat())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    #[cfg(test)]
    fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.size + col]
    }

    #[cfg(test)]
    fn set(&mut self, row: usize, col: usize, value: T) {
        self.data[row * self.size + col] = value;
    }

    pub fn row(&self, row: usize) -> &[T] {
        &self.data[row * self.size..(row + 1) * self.size]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Представление в виде ndarray без копирования
    pub fn view(&self) -> ArrayView2<'_, T> {
        // длина данных всегда size * size
        ArrayView2::from_shape((self.size, self.size), &self.data)
            .unwrap_or_else(|_| unreachable!("matrix buffer is always size x size"))
    }

    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, T> {
        let shape = (self.size, self.size);
        ArrayViewMut2::from_shape(shape, &mut self.data)
            .unwrap_or_else(|_| unreachable!("matrix buffer is always size x size"))
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

/// Рабочий набор: два входа и выход одинакового размера
#[derive(Debug, Clone)]
pub struct MatrixStore<T: Element> {
    pub a: Matrix<T>,
    pub b: Matrix<T>,
    pub c: Matrix<T>,
}

impl<T: Element> MatrixStore<T> {
    /// Выделяет три матрицы size x size
    pub fn allocate(size: usize) -> Result<Self> {
        Ok(Self {
            a: Matrix::zeroed(size)?,
            b: Matrix::zeroed(size)?,
            c: Matrix::zeroed(size)?,
        })
    }

    /// Собирает набор из готовых входных матриц
    pub fn from_inputs(a: Matrix<T>, b: Matrix<T>) -> Result<Self> {
        if a.size() != b.size() {
            return Err(EngineError::ShapeMismatch {
                expected: a.size(),
                got: b.size(),
            });
        }
        let c = Matrix::zeroed(a.size())?;
        Ok(Self { a, b, c })
    }

    pub fn size(&self) -> usize {
        self.a.size()
    }

    /// Заполняет входные матрицы; выход обнуляется
    pub fn initialize<R: Rng + ?Sized>(
        &mut self,
        fill_a: MatrixType,
        fill_b: MatrixType,
        rng: &mut R,
    ) {
        initialize_matrix(&mut self.a, fill_a, rng);
        initialize_matrix(&mut self.b, fill_b, rng);
        self.reset_output();
    }

    pub fn reset_output(&mut self) {
        self.c.fill(T::ZERO);
    }

    /// Входы только для чтения и выход для записи одновременно
    pub fn split(&mut self) -> (&Matrix<T>, &Matrix<T>, &mut Matrix<T>) {
        (&self.a, &self.b, &mut self.c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed() {
        let m = Matrix::<f64>::zeroed(3).unwrap();
        assert_eq!(m.size(), 3);
        assert_eq!(m.as_slice(), &[0.0; 9]);
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(
            Matrix::<i32>::zeroed(0),
            Err(EngineError::InvalidSize(0))
        ));
    }

    #[test]
    fn test_from_vec_length_mismatch() {
        assert!(Matrix::from_vec(2, vec![1, 2, 3]).is_err());
    }

    #[test]
    fn test_from_rows_and_accessors() {
        let mut m = Matrix::<i32>::from_rows(&[&[1, 2], &[3, 4]]).unwrap();
        assert_eq!(m.get(1, 0), 3);
        assert_eq!(m.row(1), &[3, 4]);
        m.set(0, 1, 9);
        assert_eq!(m.as_slice(), &[1, 9, 3, 4]);
        assert_eq!(m.view()[[0, 1]], 9);
    }

    #[test]
    fn test_from_rows_ragged() {
        assert!(Matrix::<i32>::from_rows(&[&[1, 2], &[3]]).is_err());
    }

    #[test]
    fn test_store_from_inputs_size_mismatch() {
        let a = Matrix::<f32>::zeroed(2).unwrap();
        let b = Matrix::<f32>::zeroed(3).unwrap();
        assert!(MatrixStore::from_inputs(a, b).is_err());
    }

    #[test]
    fn test_store_reset_output() {
        let mut store = MatrixStore::<i64>::allocate(2).unwrap();
        store.c.fill(5);
        store.reset_output();
        assert_eq!(store.c.as_slice(), &[0; 4]);
    }
}
