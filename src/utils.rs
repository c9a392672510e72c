//! Замер времени вычислений

use std::mem::MaybeUninit;
use std::time::{Duration, Instant};

use crate::engine::ComputationHooks;

/// Процессорное время: свое плюс завершенных и собранных детей
///
/// Дети учитываются только после waitpid, поэтому время рабочих процессов
/// попадает в замер к моменту, когда движок вернул результат.
pub fn cpu_time() -> Duration {
    rusage(libc::RUSAGE_SELF) + rusage(libc::RUSAGE_CHILDREN)
}

fn rusage(who: libc::c_int) -> Duration {
    let mut usage = MaybeUninit::<libc::rusage>::zeroed();
    if sys_check!(libc::getrusage(who, usage.as_mut_ptr())).is_err() {
        return Duration::ZERO;
    }
    let usage = unsafe { usage.assume_init() };
    timeval(usage.ru_utime) + timeval(usage.ru_stime)
}

fn timeval(tv: libc::timeval) -> Duration {
    Duration::from_secs(tv.tv_sec as u64) + Duration::from_micros(tv.tv_usec as u64)
}

/// Отметка начала вычисления
#[derive(Debug, Clone, Copy)]
struct Mark {
    wall: Instant,
    cpu: Duration,
}

/// Результат замера
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub wall: Duration,
    pub cpu: Duration,
}

/// Секундомер по хукам начала и конца вычисления
#[derive(Debug, Default)]
pub struct Stopwatch {
    mark: Option<Mark>,
    last: Option<Timing>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.mark = Some(Mark {
            wall: Instant::now(),
            cpu: cpu_time(),
        });
        self.last = None;
    }

    /// Останавливает замер; `None`, если он не был начат
    pub fn stop(&mut self) -> Option<Timing> {
        let mark = self.mark.take()?;
        let timing = Timing {
            wall: mark.wall.elapsed(),
            cpu: cpu_time().saturating_sub(mark.cpu),
        };
        self.last = Some(timing);
        Some(timing)
    }

    /// Последний завершенный замер
    pub fn last(&self) -> Option<Timing> {
        self.last
    }
}

impl ComputationHooks for Stopwatch {
    fn started(&mut self, engine: &str) {
        log::debug!("Начало вычислений: {}", engine);
        self.start();
    }

    fn finished(&mut self, engine: &str) {
        if let Some(timing) = self.stop() {
            log::debug!("{} завершен за {:?} (CPU {:?})", engine, timing.wall, timing.cpu);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopwatch_hooks() {
        let mut sw = Stopwatch::new();
        assert!(sw.stop().is_none());

        sw.started("test");
        let mut x = 0u64;
        for i in 0..100_000u64 {
            x = x.wrapping_add(i * i);
        }
        std::hint::black_box(x);
        sw.finished("test");

        let timing = sw.last().unwrap();
        assert!(timing.wall > Duration::ZERO);
    }

    #[test]
    fn test_cpu_time_is_monotonic() {
        let before = cpu_time();
        let mut x = 1u64;
        for i in 0..1_000_000u64 {
            x = x.wrapping_mul(i | 1);
        }
        std::hint::black_box(x);
        assert!(cpu_time() >= before);
    }
}
