//! Сравнение стратегий умножения матриц на CPU

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use parallel_matmul::config::{ElementKind, RunConfig};
use parallel_matmul::engine::{execute, ClaimStrategy, EngineKind, RowDispatch};
use parallel_matmul::matrix::{compare_results, Element, MatrixStore, MatrixType};
use parallel_matmul::report::{print_head_tail, print_summary, RunRecord};
use parallel_matmul::utils::Stopwatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EngineChoice {
    Sequential,
    Process,
    Thread,
    Rayon,
    /// Библиотечное умножение ndarray, только для сравнения времени
    Ndarray,
    /// Все движки по очереди со сверкой с эталоном
    All,
}

#[derive(Parser, Debug)]
#[command(about = "Умножение квадратных матриц: последовательно, процессами и потоками")]
#[command(long_about = None)]
struct Args {
    /// Какой движок запускать
    #[arg(long, value_enum, default_value_t = EngineChoice::All)]
    engine: EngineChoice,

    /// Файл конфигурации (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    size: Option<usize>,

    /// Размер пула (0 — по числу ядер)
    #[arg(long)]
    workers: Option<usize>,

    #[arg(long, value_enum)]
    element: Option<ElementKind>,

    #[arg(long, value_enum)]
    fill_a: Option<MatrixType>,

    #[arg(long, value_enum)]
    fill_b: Option<MatrixType>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_enum)]
    dispatch: Option<RowDispatch>,

    #[arg(long, value_enum)]
    claim: Option<ClaimStrategy>,

    /// Таймаут ожидания дочерних процессов, мс
    #[arg(long)]
    join_timeout_ms: Option<u64>,

    /// Печатать первую и последнюю строки матриц
    #[arg(long)]
    show: bool,

    /// Итог в формате JSON вместо таблицы
    #[arg(long)]
    json: bool,
}

impl Args {
    fn apply(&self, config: &mut RunConfig) {
        if let Some(size) = self.size {
            config.size = size;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(element) = self.element {
            config.element = element;
        }
        if let Some(fill) = self.fill_a {
            config.fill_a = fill;
        }
        if let Some(fill) = self.fill_b {
            config.fill_b = fill;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(dispatch) = self.dispatch {
            config.dispatch = dispatch;
        }
        if let Some(claim) = self.claim {
            config.claim = claim;
        }
        if self.join_timeout_ms.is_some() {
            config.join_timeout_ms = self.join_timeout_ms;
        }
    }

    fn engines(&self) -> Vec<EngineKind> {
        match self.engine {
            EngineChoice::Sequential => vec![EngineKind::Sequential],
            EngineChoice::Process => vec![EngineKind::Process],
            EngineChoice::Thread => vec![EngineKind::Thread],
            EngineChoice::Rayon => vec![EngineKind::Rayon],
            EngineChoice::Ndarray => vec![EngineKind::Ndarray],
            EngineChoice::All => EngineKind::ALL.to_vec(),
        }
    }
}

fn run<T: Element>(args: &Args, config: &RunConfig) -> Result<Vec<RunRecord>> {
    let size = config.size;
    info!(
        "Размер матриц: {}x{}, элементы {:?}, рабочих: {}",
        size,
        size,
        config.element,
        config.worker_count()
    );

    let mut store = MatrixStore::<T>::allocate(size).context("Не удалось выделить матрицы")?;
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    store.initialize(config.fill_a, config.fill_b, &mut rng);

    if args.show {
        print_head_tail("A", &store.a);
        print_head_tail("B", &store.b);
    }

    let engines = args.engines();
    let pb = ProgressBar::new(engines.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
            )?
            .progress_chars("#>-"),
    );

    let mut reference = None;
    let mut records = Vec::with_capacity(engines.len());
    let mut stopwatch = Stopwatch::new();

    for kind in engines {
        let engine = kind.build::<T>(config);
        pb.set_message(engine.name());

        let stats = match execute(engine.as_ref(), &mut store, &mut stopwatch) {
            Ok(stats) => stats,
            Err(e) => {
                pb.abandon();
                error!("Движок {} завершился с ошибкой: {}", engine.name(), e);
                return Err(e)
                    .with_context(|| format!("Движок {} не посчитал результат", engine.name()));
            }
        };
        let timing = stopwatch.last().context("Замер времени не был завершен")?;

        // Первым в списке идет последовательный движок, он и есть эталон
        let comparison = if let Some(expected) = &reference {
            Some(compare_results(&store.c, expected, config.tolerance))
        } else {
            if kind == EngineKind::Sequential {
                reference = Some(store.c.clone());
            }
            None
        };

        if args.show {
            print_head_tail(&format!("C ({})", engine.name()), &store.c);
        }
        records.push(RunRecord::new(engine.name(), size, timing, stats, comparison));
        pb.inc(1);
    }
    pb.finish_with_message("Вычисления завершены");

    Ok(records)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = RunConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let records = match config.element {
        ElementKind::F32 => run::<f32>(&args, &config)?,
        ElementKind::F64 => run::<f64>(&args, &config)?,
        ElementKind::I32 => run::<i32>(&args, &config)?,
        ElementKind::I64 => run::<i64>(&args, &config)?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print_summary(&records);
    }

    if records.iter().any(|r| r.matches_reference == Some(false)) {
        bail!("Результаты движков различаются");
    }
    Ok(())
}
