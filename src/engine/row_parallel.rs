//! Построчный движок на пуле rayon: строки результата раздаются потокам
//! пула, балансировка за счет кражи работы.

use std::panic::{self, AssertUnwindSafe};

use log::{info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use super::{check_operands, Fault, MatmulEngine, WorkStats};
use crate::error::{EngineError, Result};
use crate::matrix::operations::multiply_row;
use crate::matrix::{Element, Matrix};

/// Умножение строками на отдельном пуле rayon
#[derive(Debug, Clone)]
pub struct RayonEngine {
    workers: usize,
    fault: Option<Fault>,
}

impl RayonEngine {
    /// `workers == 0` — размер пула по умолчанию (число ядер)
    pub fn new(workers: usize) -> Self {
        Self { workers, fault: None }
    }

    /// Для тестов отказов: строка `fault.row` паникует на середине
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }
}

impl<T: Element> MatmulEngine<T> for RayonEngine {
    fn name(&self) -> &'static str {
        "rayon"
    }

    fn multiply(&self, a: &Matrix<T>, b: &Matrix<T>, c: &mut Matrix<T>) -> Result<WorkStats> {
        let size = check_operands(a, b, c)?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("matmul-rayon-{i}"))
            .build()
            .map_err(EngineError::Pool)?;
        let threads = pool.current_num_threads();
        info!("rayon: {}x{}, {} threads", size, size, threads);

        let (a, b) = (a.as_slice(), b.as_slice());
        let fault = self.fault;
        let out = c.as_mut_slice();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            pool.install(|| {
                out.par_chunks_mut(size).enumerate().for_each(|(row, out)| {
                    if let Some(fault) = fault.filter(|f| f.row == row) {
                        multiply_row(a, b, size, row, &mut out[..size / 2]);
                        panic!("injected fault in row {} ({:?})", row, fault.kind);
                    }
                    multiply_row(a, b, size, row, out);
                })
            })
        }));

        if result.is_err() {
            // номер потока пула после паники неизвестен
            warn!("rayon: worker panicked");
            return Err(EngineError::ThreadPanicked { worker: 0 });
        }
        Ok(WorkStats {
            workers: threads,
            units: size,
            visits: size * size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FaultKind;
    use crate::matrix::{cpu_matrix_multiply, initialize_matrix, MatrixType};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_scenario_2x2() {
        let a = Matrix::<i32>::from_rows(&[&[1, 2], &[3, 4]]).unwrap();
        let b = Matrix::<i32>::from_rows(&[&[5, 6], &[7, 8]]).unwrap();
        let mut c = Matrix::zeroed(2).unwrap();
        let stats = RayonEngine::new(2).multiply(&a, &b, &mut c).unwrap();
        assert_eq!(c.as_slice(), &[19, 22, 43, 50]);
        assert_eq!(stats.workers, 2);
        assert_eq!(stats.units, 2);
    }

    #[test]
    fn test_matches_sequential_reference() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut a = Matrix::<f64>::zeroed(19).unwrap();
        let mut b = Matrix::<f64>::zeroed(19).unwrap();
        initialize_matrix(&mut a, MatrixType::Random, &mut rng);
        initialize_matrix(&mut b, MatrixType::Random, &mut rng);
        let mut expected = vec![0.0; 19 * 19];
        cpu_matrix_multiply(a.as_slice(), b.as_slice(), &mut expected, 19);

        let mut c = Matrix::zeroed(19).unwrap();
        RayonEngine::new(3).multiply(&a, &b, &mut c).unwrap();
        assert_eq!(c.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_default_pool_size() {
        let a = Matrix::from_vec(1, vec![2i64]).unwrap();
        let mut c = Matrix::zeroed(1).unwrap();
        let stats = RayonEngine::new(0).multiply(&a, &a, &mut c).unwrap();
        assert_eq!(c.as_slice(), &[4]);
        assert!(stats.workers >= 1);
    }

    #[test]
    fn test_row_panic_is_fatal() {
        let mut a = Matrix::<i32>::zeroed(4).unwrap();
        a.fill(1);
        let mut c = Matrix::zeroed(4).unwrap();
        let err = RayonEngine::new(2)
            .with_fault(Fault::new(2, FaultKind::Panic))
            .multiply(&a, &a, &mut c)
            .unwrap_err();
        assert!(matches!(err, EngineError::ThreadPanicked { .. }));
    }
}
