//! Процессный движок: строки результата считаются в дочерних процессах
//! и пишутся напрямую в общую с родителем память.
//!
//! Каждая строка принадлежит ровно одному процессу, поэтому блокировки между
//! рабочими не нужны. Родитель читает результат только после того, как
//! дождался всех детей, проверил их коды выхода и отметки о готовности строк.

use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::{check_operands, Fault, MatmulEngine, RowDispatch, WorkStats};
use crate::error::{EngineError, Result};
use crate::matrix::operations::multiply_row;
use crate::matrix::{Element, Matrix};
use crate::sys::process::{kill_worker, spawn_worker, try_wait_worker, wait_worker};
use crate::sys::{Pid, SharedRegion, WorkerExit};

/// Период опроса детей при заданном таймауте
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Умножение через fork и общую память (mmap)
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    workers: usize,
    dispatch: RowDispatch,
    join_timeout: Option<Duration>,
    fault: Option<Fault>,
}

impl ProcessEngine {
    /// `workers` ограничивает число одновременно живых процессов
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            dispatch: RowDispatch::default(),
            join_timeout: None,
            fault: None,
        }
    }

    pub fn with_dispatch(mut self, dispatch: RowDispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Сколько ждать детей; по истечении запуск считается неуспешным
    pub fn with_join_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Для тестов отказов
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Каждой строке свой процесс, не больше `workers` одновременно
    fn fork_per_row<T: Element>(
        &self,
        job: &RowJob<'_, T>,
        output: &mut SharedRegion<T>,
    ) -> Result<usize> {
        let size = job.size;
        let window = self.workers.min(size);
        let mut pool = WorkerSet::new(self.join_timeout);

        for row in 0..size {
            if pool.len() >= window {
                pool.join_oldest()?;
            }
            let out = &mut output.as_mut_slice()[row * size..(row + 1) * size];
            let pid = spawn_worker(|| match job.run_row(row, out) {
                Ok(()) => 0,
                Err(code) => code,
            })
            .map_err(|source| EngineError::Spawn { worker: row, source })?;
            debug!("process: row {} -> pid {}", row, pid);
            pool.push(pid, Some(row));
        }

        pool.join_all()?;
        Ok(pool.spawned)
    }

    /// Пул процессов, строки берутся из общего атомарного курсора
    fn shared_queue<T: Element>(
        &self,
        job: &RowJob<'_, T>,
        output: &mut SharedRegion<T>,
    ) -> Result<usize> {
        let size = job.size;
        let cursor = SharedRegion::new_with(1, |_| AtomicUsize::new(0)).map_err(|source| {
            EngineError::SharedRegion {
                bytes: mem::size_of::<AtomicUsize>(),
                source,
            }
        })?;
        let next_row = &cursor.as_slice()[0];
        let mut pool = WorkerSet::new(self.join_timeout);

        for worker in 0..self.workers.min(size) {
            let out = output.as_mut_slice();
            let pid = spawn_worker(|| loop {
                let row = next_row.fetch_add(1, Ordering::Relaxed);
                if row >= size {
                    return 0;
                }
                if let Err(code) = job.run_row(row, &mut out[row * size..(row + 1) * size]) {
                    return code;
                }
            })
            .map_err(|source| EngineError::Spawn { worker, source })?;
            debug!("process: worker {} -> pid {}", worker, pid);
            pool.push(pid, None);
        }

        pool.join_all()?;
        Ok(pool.spawned)
    }
}

impl<T: Element> MatmulEngine<T> for ProcessEngine {
    fn name(&self) -> &'static str {
        "process"
    }

    fn multiply(&self, a: &Matrix<T>, b: &Matrix<T>, c: &mut Matrix<T>) -> Result<WorkStats> {
        let size = check_operands(a, b, c)?;
        let elements = size * size;

        // Общие области создаются до первого fork и живут дольше всех детей
        let mut output =
            SharedRegion::new(elements, T::ZERO).map_err(|source| EngineError::SharedRegion {
                bytes: elements * mem::size_of::<T>(),
                source,
            })?;
        let done = SharedRegion::new_with(size, |_| AtomicBool::new(false)).map_err(|source| {
            EngineError::SharedRegion {
                bytes: size * mem::size_of::<AtomicBool>(),
                source,
            }
        })?;

        let job = RowJob {
            a: a.as_slice(),
            b: b.as_slice(),
            size,
            done: done.as_slice(),
            fault: self.fault,
        };

        info!(
            "process: {}x{}, {} workers, dispatch {:?}, shared region {} bytes",
            size,
            size,
            self.workers.min(size),
            self.dispatch,
            output.bytes()
        );

        let spawned = match self.dispatch {
            RowDispatch::ForkPerRow => self.fork_per_row(&job, &mut output)?,
            RowDispatch::SharedQueue => self.shared_queue(&job, &mut output)?,
        };

        // Нулевой код выхода еще не значит, что строка дописана
        let missing: Vec<usize> = (0..size)
            .filter(|&row| !job.done[row].load(Ordering::Acquire))
            .collect();
        if let Some(&first) = missing.first() {
            return Err(EngineError::IncompleteRows {
                missing: missing.len(),
                first,
            });
        }

        c.as_mut_slice().copy_from_slice(output.as_slice());
        Ok(WorkStats {
            workers: spawned,
            units: size,
            visits: elements,
        })
    }
}

/// Все, что нужно дочернему процессу для подсчета строки
struct RowJob<'a, T: Element> {
    a: &'a [T],
    b: &'a [T],
    size: usize,
    done: &'a [AtomicBool],
    fault: Option<Fault>,
}

impl<T: Element> RowJob<'_, T> {
    /// Выполняется в дочернем процессе: без аллокаций и логов
    ///
    /// `Err(code)` означает, что строка брошена и процесс должен выйти с `code`.
    fn run_row(&self, row: usize, out: &mut [T]) -> std::result::Result<(), i32> {
        if let Some(fault) = self.fault.filter(|f| f.row == row) {
            let half = self.size / 2;
            multiply_row(self.a, self.b, self.size, row, &mut out[..half]);
            return Err(fault.trigger());
        }
        multiply_row(self.a, self.b, self.size, row, out);
        self.done[row].store(true, Ordering::Release);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Worker {
    pid: Pid,
    row: Option<usize>,
}

/// Живые дочерние процессы
///
/// Ждем только своих детей по pid (никогда `waitpid(-1)`). Все, кто остался
/// в наборе при выходе (ошибка, таймаут), убиваются и собираются в `Drop`.
struct WorkerSet {
    live: VecDeque<Worker>,
    started: Instant,
    timeout: Option<Duration>,
    spawned: usize,
}

impl WorkerSet {
    fn new(timeout: Option<Duration>) -> Self {
        Self {
            live: VecDeque::new(),
            started: Instant::now(),
            timeout,
            spawned: 0,
        }
    }

    fn len(&self) -> usize {
        self.live.len()
    }

    fn push(&mut self, pid: Pid, row: Option<usize>) {
        self.live.push_back(Worker { pid, row });
        self.spawned += 1;
    }

    fn join_oldest(&mut self) -> Result<()> {
        let Some(worker) = self.live.front().copied() else {
            return Ok(());
        };
        let exit = self.wait(worker.pid)?;
        // процесс собран, убивать его больше нельзя
        self.live.pop_front();

        if exit.is_clean() {
            debug!("process: pid {} finished", worker.pid);
            Ok(())
        } else {
            warn!("process: pid {} (row {:?}) failed: {}", worker.pid, worker.row, exit);
            Err(EngineError::WorkerFailed {
                pid: worker.pid,
                row: worker.row,
                status: exit,
            })
        }
    }

    fn join_all(&mut self) -> Result<()> {
        while !self.live.is_empty() {
            self.join_oldest()?;
        }
        Ok(())
    }

    fn wait(&self, pid: Pid) -> Result<WorkerExit> {
        let Some(timeout) = self.timeout else {
            return wait_worker(pid).map_err(|source| EngineError::Wait { pid, source });
        };
        loop {
            let polled = try_wait_worker(pid).map_err(|source| EngineError::Wait { pid, source })?;
            if let Some(exit) = polled {
                return Ok(exit);
            }
            let elapsed = self.started.elapsed();
            if elapsed >= timeout {
                return Err(EngineError::Timeout {
                    elapsed,
                    pending: self.live.len(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Drop for WorkerSet {
    fn drop(&mut self) {
        for worker in self.live.drain(..) {
            warn!("process: killing pid {} (row {:?})", worker.pid, worker.row);
            let _ = kill_worker(worker.pid);
            let _ = wait_worker(worker.pid);
        }
    }
}
