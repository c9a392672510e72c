//! Рабочие процессы: fork, ожидание и принудительное завершение

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};

/// Идентификатор процесса
pub type Pid = libc::pid_t;

/// Код выхода дочернего процесса, если его тело запаниковало
pub const PANIC_EXIT_CODE: i32 = 101;

/// Как завершился рабочий процесс
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Нормальный выход с кодом
    Exited(i32),
    /// Завершен сигналом
    Signaled(i32),
}

impl WorkerExit {
    fn from_status(status: libc::c_int) -> Self {
        if libc::WIFEXITED(status) {
            WorkerExit::Exited(libc::WEXITSTATUS(status))
        } else {
            // waitpid без WUNTRACED возвращает только выход или сигнал
            WorkerExit::Signaled(libc::WTERMSIG(status))
        }
    }

    /// Чистое завершение: код 0
    pub fn is_clean(&self) -> bool {
        matches!(self, WorkerExit::Exited(0))
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerExit::Exited(code) => write!(f, "exit code {}", code),
            WorkerExit::Signaled(sig) => write!(f, "killed by signal {}", sig),
        }
    }
}

/// Запускает `body` в дочернем процессе
///
/// Дочерний процесс завершается через `_exit` с кодом, который вернул `body`,
/// и никогда не возвращается в код вызывающего. Паника в `body` дает
/// `PANIC_EXIT_CODE`. После fork в многопоточной программе тело не должно
/// выделять память, брать блокировки или писать в лог.
pub fn spawn_worker<F>(body: F) -> io::Result<Pid>
where
    F: FnOnce() -> i32,
{
    let pid = sys_check!(libc::fork())?;
    if pid == 0 {
        let code = panic::catch_unwind(AssertUnwindSafe(body)).unwrap_or(PANIC_EXIT_CODE);
        unsafe { libc::_exit(code) }
    }
    Ok(pid)
}

fn wait_with_flags(pid: Pid, flags: libc::c_int) -> io::Result<Option<WorkerExit>> {
    let mut status: libc::c_int = 0;
    loop {
        match sys_check!(libc::waitpid(pid, &mut status, flags)) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(WorkerExit::from_status(status))),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Блокирующее ожидание конкретного процесса
pub fn wait_worker(pid: Pid) -> io::Result<WorkerExit> {
    wait_with_flags(pid, 0)?
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "waitpid returned no status"))
}

/// Неблокирующая проверка: `None`, если процесс еще работает
pub fn try_wait_worker(pid: Pid) -> io::Result<Option<WorkerExit>> {
    wait_with_flags(pid, libc::WNOHANG)
}

/// Принудительно завершает процесс (SIGKILL)
pub fn kill_worker(pid: Pid) -> io::Result<()> {
    sys_check!(libc::kill(pid, libc::SIGKILL)).map(|_| ())
}
