//! Библиотечный эталон по времени: умножение средствами ndarray

use log::debug;
use ndarray::linalg::general_mat_mul;

use super::{check_operands, MatmulEngine, WorkStats};
use crate::error::Result;
use crate::matrix::{Element, Matrix};

/// C = A * B через `general_mat_mul`
///
/// Порядок накопления задает библиотека, поэтому вещественный результат
/// совпадает с остальными движками только в пределах допуска.
#[derive(Debug, Clone, Copy, Default)]
pub struct NdarrayEngine;

impl<T: Element> MatmulEngine<T> for NdarrayEngine {
    fn name(&self) -> &'static str {
        "ndarray"
    }

    fn multiply(&self, a: &Matrix<T>, b: &Matrix<T>, c: &mut Matrix<T>) -> Result<WorkStats> {
        let size = check_operands(a, b, c)?;
        debug!("ndarray: {}x{}", size, size);
        general_mat_mul(T::ONE, &a.view(), &b.view(), T::ZERO, &mut c.view_mut());
        Ok(WorkStats {
            workers: 1,
            units: 1,
            visits: size * size,
        })
    }
}
