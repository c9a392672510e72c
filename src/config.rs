//! Параметры запуска

use std::fs;
use std::path::Path;
use std::thread;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::{ClaimStrategy, RowDispatch};
use crate::matrix::MatrixType;

/// Размер матриц по умолчанию
pub const MATRIX_SIZE: usize = 512;
/// Размер пула рабочих по умолчанию
pub const WORKER_COUNT: usize = 4;
/// Файл конфигурации, который читается, если существует
pub const CONFIG_PATH: &str = "matmul.json";

/// Тип элементов матриц для всего запуска
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    F32,
    #[default]
    F64,
    I32,
    I64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub size: usize,
    /// 0 — по числу доступных ядер
    pub workers: usize,
    pub element: ElementKind,
    pub fill_a: MatrixType,
    pub fill_b: MatrixType,
    /// Зерно генератора для случайного заполнения
    pub seed: Option<u64>,
    pub dispatch: RowDispatch,
    pub claim: ClaimStrategy,
    /// Таймаут ожидания дочерних процессов
    pub join_timeout_ms: Option<u64>,
    /// Допустимая разница с эталоном
    pub tolerance: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            size: MATRIX_SIZE,
            workers: WORKER_COUNT,
            element: ElementKind::default(),
            fill_a: MatrixType::Random,
            fill_b: MatrixType::Random,
            seed: None,
            dispatch: RowDispatch::default(),
            claim: ClaimStrategy::default(),
            join_timeout_ms: None,
            tolerance: 1e-10,
        }
    }
}

impl RunConfig {
    /// Загружает конфигурацию
    ///
    /// Явно указанный файл обязан существовать. Без него читается
    /// `CONFIG_PATH`, если он есть, иначе берутся значения по умолчанию.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_PATH).exists() => Self::from_file(Path::new(CONFIG_PATH))?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Не удалось прочитать конфигурацию {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("Некорректная конфигурация {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            bail!("Размер матрицы должен быть больше 0");
        }
        if !(self.tolerance >= 0.0) {
            bail!("Допуск должен быть неотрицательным, получено {}", self.tolerance);
        }
        Ok(())
    }

    /// Фактический размер пула
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        thread::available_parallelism().map(|n| n.get()).unwrap_or(WORKER_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.size, MATRIX_SIZE);
        assert_eq!(config.worker_count(), WORKER_COUNT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let text = r#"{
            "size": 64,
            "element": "i32",
            "fill_a": "ones",
            "dispatch": "fork_per_row",
            "claim": "sentinel"
        }"#;
        let config = RunConfig::from_json(text).unwrap();
        assert_eq!(config.size, 64);
        assert_eq!(config.element, ElementKind::I32);
        assert_eq!(config.fill_a, MatrixType::Ones);
        assert_eq!(config.fill_b, MatrixType::Random);
        assert_eq!(config.dispatch, RowDispatch::ForkPerRow);
        assert_eq!(config.claim, ClaimStrategy::Sentinel);
        assert_eq!(config.workers, WORKER_COUNT);
    }

    #[test]
    fn test_zero_workers_uses_available_parallelism() {
        let config = RunConfig {
            workers: 0,
            ..RunConfig::default()
        };
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_validation() {
        let zero = RunConfig {
            size: 0,
            ..RunConfig::default()
        };
        assert!(zero.validate().is_err());

        let negative = RunConfig {
            tolerance: -1.0,
            ..RunConfig::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let path = std::env::temp_dir().join(format!("matmul-config-{}.json", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        write!(file, r#"{{"size": 8, "seed": 5, "join_timeout_ms": 1000}}"#).unwrap();
        drop(file);

        let config = RunConfig::load(Some(&path)).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.size, 8);
        assert_eq!(config.seed, Some(5));
        assert_eq!(config.join_timeout_ms, Some(1000));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        assert!(RunConfig::load(Some(Path::new("/nonexistent/matmul.json"))).is_err());
    }
}
