//! Типы матриц и элементов

use std::fmt::{Debug, Display};

use ndarray::LinalgScalar;

use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Способ заполнения матрицы
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MatrixType {
    /// Все элементы равны 0
    Zeros,
    /// Все элементы равны 1
    Ones,
    /// m[i][j] = i + j
    RowPlusColumn,
    /// Случайно заполненная матрица
    Random,
}

/// Числовой тип элемента матрицы
///
/// Накопление в целых типах идет с переполнением по модулю (wrapping),
/// поэтому ядро не паникует ни в одном движке, в том числе в дочернем процессе.
pub trait Element: LinalgScalar + PartialEq + Debug + Display + Send + Sync {
    const ZERO: Self;
    const ONE: Self;

    /// Значение из индекса (для заполнения i + j)
    fn from_index(index: usize) -> Self;

    /// Случайное значение: [0, 1) для вещественных, [0, 10) для целых
    fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self;

    /// acc + a * b
    fn mul_acc(self, a: Self, b: Self) -> Self;

    /// Модуль разности в f64 (для сравнения результатов)
    fn abs_diff(self, other: Self) -> f64;
}

macro_rules! impl_float_element {
    ($($t:ty),*) => {$(
        impl Element for $t {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;

            fn from_index(index: usize) -> Self {
                index as $t
            }

            fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
                Uniform::new(0.0 as $t, 1.0 as $t).sample(rng)
            }

            #[inline]
            fn mul_acc(self, a: Self, b: Self) -> Self {
                self + a * b
            }

            fn abs_diff(self, other: Self) -> f64 {
                (self as f64 - other as f64).abs()
            }
        }
    )*};
}

macro_rules! impl_int_element {
    ($($t:ty),*) => {$(
        impl Element for $t {
            const ZERO: Self = 0;
            const ONE: Self = 1;

            fn from_index(index: usize) -> Self {
                index as $t
            }

            fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
                Uniform::new(0 as $t, 10 as $t).sample(rng)
            }

            #[inline]
            fn mul_acc(self, a: Self, b: Self) -> Self {
                self.wrapping_add(a.wrapping_mul(b))
            }

            fn abs_diff(self, other: Self) -> f64 {
                (self as f64 - other as f64).abs()
            }
        }
    )*};
}

impl_float_element!(f32, f64);
impl_int_element!(i32, i64);

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_int_mul_add_wraps() {
        let acc = i32::MAX.mul_acc(1, 1);
        assert_eq!(acc, i32::MIN);
    }

    #[test]
    fn test_float_mul_add() {
        assert_eq!(Element::mul_acc(1.5f64, 2.0, 3.0), 7.5);
    }

    #[test]
    fn test_sample_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let f = f32::sample(&mut rng);
            assert!((0.0..1.0).contains(&f));
            let i = i64::sample(&mut rng);
            assert!((0..10).contains(&i));
        }
    }

    #[test]
    fn test_matrix_type_serde_names() {
        let t: MatrixType = serde_json::from_str("\"row_plus_column\"").unwrap();
        assert_eq!(t, MatrixType::RowPlusColumn);
    }
}
