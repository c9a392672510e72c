//! Движки умножения матриц
//!
//! Все движки считают одну и ту же сумму `Σ_k a[i][k] * b[k][j]` в одном
//! порядке, поэтому их результаты совпадают с последовательным эталоном
//! побитово. Исключение: библиотечный `NdarrayEngine`, он нужен только как
//! эталон по времени.

pub mod ndarray_dot;
pub mod process;
pub mod row_parallel;
pub mod sequential;
pub mod thread;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::error::{EngineError, Result};
use crate::matrix::{Element, Matrix, MatrixStore};

pub use ndarray_dot::NdarrayEngine;
pub use process::ProcessEngine;
pub use row_parallel::RayonEngine;
pub use sequential::SequentialEngine;
pub use thread::ThreadEngine;

/// Стратегия умножения C = A * B
pub trait MatmulEngine<T: Element> {
    fn name(&self) -> &'static str;

    /// Заполняет `c` произведением `a` и `b`
    ///
    /// # Errors
    /// Любой отказ рабочего или ресурса делает весь запуск неуспешным;
    /// частично посчитанная матрица никогда не возвращается как результат.
    fn multiply(&self, a: &Matrix<T>, b: &Matrix<T>, c: &mut Matrix<T>) -> Result<WorkStats>;
}

/// Счетчики одного запуска
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkStats {
    /// Сколько рабочих (процессов или потоков) было запущено
    pub workers: usize,
    /// Посчитанные единицы разбиения: строки или ячейки
    pub units: usize,
    /// Посещения ячеек, включая пропущенные проверкой на ноль
    pub visits: usize,
}

/// Как процессный движок раздает строки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RowDispatch {
    /// Процесс на строку, одновременно живут не больше `workers`
    ForkPerRow,
    /// Пул из `workers` процессов берет строки из общей очереди
    #[default]
    SharedQueue,
}

/// Как потоковый движок распределяет ячейки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStrategy {
    /// Каждый поток обходит все ячейки и считает только нулевые
    Sentinel,
    /// Ячейки раздаются атомарным курсором, каждая считается один раз
    #[default]
    Cursor,
}

/// Что делает рабочий, получивший строку с внедренным отказом
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Выход с кодом (0 тоже отказ: строка не дописана)
    Exit(i32),
    /// SIGABRT
    Abort,
    /// Бесконечное ожидание
    Hang,
    /// Паника
    Panic,
}

/// Внедренный отказ: рабочий бросает строку `row` на середине
///
/// Потоковые движки (семафорный и rayon) любой вид отказа превращают в
/// панику потока.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub row: usize,
    pub kind: FaultKind,
}

impl Fault {
    pub fn new(row: usize, kind: FaultKind) -> Self {
        Self { row, kind }
    }

    /// Срабатывает внутри дочернего процесса, возвращает код выхода
    pub(crate) fn trigger(self) -> i32 {
        match self.kind {
            FaultKind::Exit(code) => code,
            FaultKind::Abort => unsafe { libc::abort() },
            FaultKind::Hang => loop {
                unsafe { libc::pause() };
            },
            FaultKind::Panic => panic!("injected fault in row {}", self.row),
        }
    }
}

/// Точки начала и конца вычисления (для замера времени)
pub trait ComputationHooks {
    fn started(&mut self, _engine: &str) {}
    fn finished(&mut self, _engine: &str) {}
}

/// Пустые хуки
impl ComputationHooks for () {}

/// Проверяет, что все три матрицы одного размера
pub(crate) fn check_operands<T: Element>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    c: &Matrix<T>,
) -> Result<usize> {
    let size = a.size();
    for got in [b.size(), c.size()] {
        if got != size {
            return Err(EngineError::ShapeMismatch { expected: size, got });
        }
    }
    Ok(size)
}

/// Запускает движок над хранилищем между хуками начала и конца
///
/// Выход обнуляется перед запуском и после неудачного запуска.
pub fn execute<T, E, H>(
    engine: &E,
    store: &mut MatrixStore<T>,
    hooks: &mut H,
) -> Result<WorkStats>
where
    T: Element,
    E: MatmulEngine<T> + ?Sized,
    H: ComputationHooks + ?Sized,
{
    store.reset_output();
    let (a, b, c) = store.split();

    hooks.started(engine.name());
    let result = engine.multiply(a, b, c);
    hooks.finished(engine.name());

    if result.is_err() {
        store.reset_output();
    }
    result
}

/// Выбор движка
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Sequential,
    Process,
    Thread,
    Rayon,
    /// Библиотечное умножение, в общее сравнение не входит
    Ndarray,
}

impl EngineKind {
    /// Движки, результаты которых совпадают с эталоном побитово
    pub const ALL: [EngineKind; 4] = [
        EngineKind::Sequential,
        EngineKind::Process,
        EngineKind::Thread,
        EngineKind::Rayon,
    ];

    /// Создает движок с параметрами из конфигурации
    pub fn build<T: Element>(self, config: &RunConfig) -> Box<dyn MatmulEngine<T>> {
        match self {
            EngineKind::Sequential => Box::new(SequentialEngine),
            EngineKind::Process => Box::new(
                ProcessEngine::new(config.worker_count())
                    .with_dispatch(config.dispatch)
                    .with_join_timeout(config.join_timeout_ms.map(Duration::from_millis)),
            ),
            EngineKind::Thread => {
                Box::new(ThreadEngine::new(config.worker_count()).with_claim(config.claim))
            }
            EngineKind::Rayon => Box::new(RayonEngine::new(config.workers)),
            EngineKind::Ndarray => Box::new(NdarrayEngine),
        }
    }
}
