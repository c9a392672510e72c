//! Последовательное ядро: эталон для параллельных движков

use log::debug;

use super::{check_operands, MatmulEngine, WorkStats};
use crate::error::Result;
use crate::matrix::{cpu_matrix_multiply, Element, Matrix};

/// Однопоточное умножение тройным циклом (i, j, k)
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialEngine;

impl<T: Element> MatmulEngine<T> for SequentialEngine {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn multiply(&self, a: &Matrix<T>, b: &Matrix<T>, c: &mut Matrix<T>) -> Result<WorkStats> {
        let size = check_operands(a, b, c)?;
        debug!("sequential: {}x{}", size, size);
        cpu_matrix_multiply(a.as_slice(), b.as_slice(), c.as_mut_slice(), size);
        Ok(WorkStats {
            workers: 1,
            units: size,
            visits: size * size,
        })
    }
}
