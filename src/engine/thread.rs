//! Потоковый движок: пул из P потоков считает ячейки результата,
//! запись в ячейку (i, j) защищена семафором `j % P`.

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use log::{debug, info, warn};

use super::{check_operands, ClaimStrategy, Fault, MatmulEngine, WorkStats};
use crate::error::{EngineError, Result};
use crate::matrix::operations::multiply_cell;
use crate::matrix::{Element, Matrix};
use crate::sync::GuardSet;

/// Умножение пулом потоков с набором семафоров по столбцам
#[derive(Debug, Clone)]
pub struct ThreadEngine {
    workers: usize,
    claim: ClaimStrategy,
    fault: Option<Fault>,
}

impl ThreadEngine {
    /// `workers` — размер пула и число семафоров
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            claim: ClaimStrategy::default(),
            fault: None,
        }
    }

    pub fn with_claim(mut self, claim: ClaimStrategy) -> Self {
        self.claim = claim;
        self
    }

    /// Для тестов отказов: поток, дошедший до середины строки, паникует
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }
}

impl<T: Element> MatmulEngine<T> for ThreadEngine {
    fn name(&self) -> &'static str {
        "thread"
    }

    fn multiply(&self, a: &Matrix<T>, b: &Matrix<T>, c: &mut Matrix<T>) -> Result<WorkStats> {
        let size = check_operands(a, b, c)?;
        let guards = GuardSet::new(self.workers)?;

        // ноль означает "еще не посчитано"
        c.fill(T::ZERO);
        let cells = SharedCells::new(c.as_mut_slice());
        let cursor = AtomicUsize::new(0);

        info!(
            "thread: {}x{}, {} workers, {} guards, claim {:?}",
            size,
            size,
            self.workers,
            guards.len(),
            self.claim
        );

        let worker = CellWorker {
            a: a.as_slice(),
            b: b.as_slice(),
            size,
            cells: &cells,
            guards: &guards,
            cursor: &cursor,
            claim: self.claim,
            fault: self.fault,
        };

        let mut totals = WorkStats {
            workers: 0,
            units: 0,
            visits: 0,
        };
        let mut spawn_error = None;
        let mut panicked = None;

        thread::scope(|s| {
            let mut handles = Vec::with_capacity(self.workers);
            for id in 0..self.workers {
                let worker = &worker;
                match thread::Builder::new()
                    .name(format!("matmul-{id}"))
                    .spawn_scoped(s, move || worker.run())
                {
                    Ok(handle) => handles.push((id, handle)),
                    Err(source) => {
                        spawn_error = Some(EngineError::Spawn { worker: id, source });
                        break;
                    }
                }
            }
            totals.workers = handles.len();

            // Ждем всех, даже если кто-то уже упал
            for (id, handle) in handles {
                match handle.join() {
                    Ok(counters) => {
                        debug!(
                            "thread: worker {} visited {}, computed {}",
                            id, counters.visits, counters.computed
                        );
                        totals.units += counters.computed;
                        totals.visits += counters.visits;
                    }
                    Err(_) => {
                        warn!("thread: worker {} panicked", id);
                        panicked.get_or_insert(id);
                    }
                }
            }
        });

        if let Some(err) = spawn_error {
            return Err(err);
        }
        if let Some(worker) = panicked {
            return Err(EngineError::ThreadPanicked { worker });
        }
        Ok(totals)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    visits: usize,
    computed: usize,
}

/// Общее состояние, которое видят все потоки пула
struct CellWorker<'a, T: Element> {
    a: &'a [T],
    b: &'a [T],
    size: usize,
    cells: &'a SharedCells<'a, T>,
    guards: &'a GuardSet,
    cursor: &'a AtomicUsize,
    claim: ClaimStrategy,
    fault: Option<Fault>,
}

impl<T: Element> CellWorker<'_, T> {
    fn run(&self) -> Counters {
        let mut counters = Counters::default();
        match self.claim {
            // Каждый поток обходит все пространство индексов по строкам
            ClaimStrategy::Sentinel => {
                for row in 0..self.size {
                    for col in 0..self.size {
                        self.visit(row, col, true, &mut counters);
                    }
                }
            }
            ClaimStrategy::Cursor => {
                let total = self.size * self.size;
                loop {
                    let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
                    if idx >= total {
                        break;
                    }
                    self.visit(idx / self.size, idx % self.size, false, &mut counters);
                }
            }
        }
        counters
    }

    fn visit(&self, row: usize, col: usize, check_sentinel: bool, counters: &mut Counters) {
        counters.visits += 1;
        let idx = row * self.size + col;

        let _guard = self.guards.lock_column(col);
        // Safety: все обращения к ячейке idx идут под охранником col % P
        if check_sentinel && unsafe { self.cells.read(idx) } != T::ZERO {
            return;
        }
        if let Some(fault) = self.fault {
            if fault.row == row && col == self.size / 2 {
                panic!("injected fault in row {} ({:?})", row, fault.kind);
            }
        }
        let value = multiply_cell(self.a, self.b, self.size, row, col);
        unsafe { self.cells.write(idx, value) };
        counters.computed += 1;
    }
}

/// Выходной буфер, разделяемый потоками
///
/// Синхронизации внутри нет: чтение и запись ячейки допустимы только под
/// охранником ее столбца.
struct SharedCells<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

unsafe impl<T: Send> Sync for SharedCells<'_, T> {}

impl<'a, T: Copy> SharedCells<'a, T> {
    fn new(cells: &'a mut [T]) -> Self {
        Self {
            ptr: cells.as_mut_ptr(),
            len: cells.len(),
            _marker: PhantomData,
        }
    }

    unsafe fn read(&self, idx: usize) -> T {
        debug_assert!(idx < self.len);
        ptr::read(self.ptr.add(idx))
    }

    unsafe fn write(&self, idx: usize, value: T) {
        debug_assert!(idx < self.len);
        ptr::write(self.ptr.add(idx), value);
    }
}
