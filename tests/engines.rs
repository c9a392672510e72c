use std::time::Duration;

use approx::assert_relative_eq;
use parallel_matmul::engine::{
    execute, ClaimStrategy, Fault, FaultKind, MatmulEngine, NdarrayEngine, ProcessEngine,
    RayonEngine, RowDispatch, SequentialEngine, ThreadEngine,
};
use parallel_matmul::matrix::{compare_results, Element, Matrix, MatrixStore, MatrixType};
use parallel_matmul::utils::Stopwatch;
use parallel_matmul::{EngineError, EngineKind, RunConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Все движки во всех режимах
fn all_engines<T: Element>(workers: usize) -> Vec<Box<dyn MatmulEngine<T>>> {
    vec![
        Box::new(SequentialEngine),
        Box::new(ProcessEngine::new(workers).with_dispatch(RowDispatch::ForkPerRow)),
        Box::new(ProcessEngine::new(workers).with_dispatch(RowDispatch::SharedQueue)),
        Box::new(ThreadEngine::new(workers).with_claim(ClaimStrategy::Sentinel)),
        Box::new(ThreadEngine::new(workers).with_claim(ClaimStrategy::Cursor)),
        Box::new(RayonEngine::new(workers)),
    ]
}

fn multiply_all<T: Element>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    workers: usize,
) -> Vec<(&'static str, Matrix<T>)> {
    all_engines::<T>(workers)
        .into_iter()
        .map(|engine| {
            let mut c = Matrix::zeroed(a.size()).unwrap();
            engine.multiply(a, b, &mut c).unwrap();
            (engine.name(), c)
        })
        .collect()
}

fn random_store<T: Element>(size: usize, seed: u64) -> MatrixStore<T> {
    let mut store = MatrixStore::allocate(size).unwrap();
    store.initialize(MatrixType::Random, MatrixType::Random, &mut StdRng::seed_from_u64(seed));
    store
}

#[test]
fn scenario_2x2() {
    let a = Matrix::<i64>::from_rows(&[&[1, 2], &[3, 4]]).unwrap();
    let b = Matrix::<i64>::from_rows(&[&[5, 6], &[7, 8]]).unwrap();
    for (name, c) in multiply_all(&a, &b, 2) {
        assert_eq!(c.as_slice(), &[19, 22, 43, 50], "engine {name}");
    }
}

#[test]
fn scenario_3x3_ones() {
    let mut store = MatrixStore::<f64>::allocate(3).unwrap();
    store.initialize(MatrixType::Ones, MatrixType::Ones, &mut StdRng::seed_from_u64(0));
    for (name, c) in multiply_all(&store.a, &store.b, 3) {
        assert!(c.as_slice().iter().all(|&v| v == 3.0), "engine {name}");
    }
}

#[test]
fn scenario_1x1() {
    let a = Matrix::from_vec(1, vec![1.5f32]).unwrap();
    let b = Matrix::from_vec(1, vec![-4.0f32]).unwrap();
    for (name, c) in multiply_all(&a, &b, 4) {
        assert_relative_eq!(c.as_slice()[0], -6.0);
        assert_eq!(c.size(), 1, "engine {name}");
    }
}

#[test]
fn engines_bit_identical_for_floats() {
    let store = random_store::<f64>(24, 99);
    let results = multiply_all(&store.a, &store.b, 4);
    let (_, reference) = &results[0];
    for (name, c) in &results[1..] {
        assert_eq!(c.as_slice(), reference.as_slice(), "engine {name}");
    }
}

#[test]
fn engines_agree_for_every_element_type() {
    fn check<T: Element>(seed: u64) {
        let store = random_store::<T>(9, seed);
        let results = multiply_all(&store.a, &store.b, 3);
        let (_, reference) = &results[0];
        for (name, c) in &results[1..] {
            let cmp = compare_results(c, reference, 0.0);
            assert!(cmp.matches(), "engine {name}: {cmp:?}");
        }
    }
    check::<f32>(1);
    check::<f64>(2);
    check::<i32>(3);
    check::<i64>(4);
}

#[test]
fn row_plus_column_fill() {
    let mut store = MatrixStore::<i32>::allocate(4).unwrap();
    store.initialize(MatrixType::RowPlusColumn, MatrixType::Ones, &mut StdRng::seed_from_u64(0));
    // строка i матрицы A: i, i+1, i+2, i+3 -> сумма 4i + 6
    for (name, c) in multiply_all(&store.a, &store.b, 2) {
        for i in 0..4 {
            assert!(c.row(i).iter().all(|&v| v == 4 * i as i32 + 6), "engine {name}");
        }
    }
}

#[test]
fn ndarray_baseline_within_tolerance() {
    let mut store = random_store::<f64>(48, 17);
    let mut expected = Matrix::zeroed(48).unwrap();
    SequentialEngine.multiply(&store.a, &store.b, &mut expected).unwrap();

    execute(&NdarrayEngine, &mut store, &mut ()).unwrap();
    assert!(compare_results(&store.c, &expected, 1e-9).matches());
}

#[test]
fn execute_with_stopwatch_for_configured_engines() {
    let config = RunConfig {
        size: 16,
        workers: 3,
        seed: Some(5),
        join_timeout_ms: Some(30_000),
        ..RunConfig::default()
    };
    let mut store = random_store::<f64>(config.size, 5);
    let mut stopwatch = Stopwatch::new();

    let reference = {
        let engine = EngineKind::Sequential.build::<f64>(&config);
        execute(engine.as_ref(), &mut store, &mut stopwatch).unwrap();
        store.c.clone()
    };

    for kind in [EngineKind::Process, EngineKind::Thread, EngineKind::Rayon] {
        let engine = kind.build::<f64>(&config);
        let stats = execute(engine.as_ref(), &mut store, &mut stopwatch).unwrap();
        assert!(stopwatch.last().is_some());
        assert_eq!(store.c, reference, "engine {}", engine.name());
        assert!(stats.workers >= 1);
    }
}

#[test]
fn failed_worker_never_yields_result() {
    let mut store = random_store::<f64>(8, 7);
    let engine = ProcessEngine::new(2)
        .with_dispatch(RowDispatch::ForkPerRow)
        .with_fault(Fault::new(5, FaultKind::Exit(3)));
    let err = execute(&engine, &mut store, &mut ()).unwrap_err();
    assert!(matches!(err, EngineError::WorkerFailed { row: Some(5), .. }));
    assert!(store.c.as_slice().iter().all(|&v| v == 0.0));
}

#[test]
fn panicking_worker_fails_every_parallel_engine() {
    let engines: Vec<Box<dyn MatmulEngine<i32>>> = vec![
        Box::new(ProcessEngine::new(2).with_fault(Fault::new(3, FaultKind::Panic))),
        Box::new(ThreadEngine::new(2).with_fault(Fault::new(3, FaultKind::Panic))),
        Box::new(RayonEngine::new(2).with_fault(Fault::new(3, FaultKind::Panic))),
    ];
    for engine in engines {
        let mut store = random_store::<i32>(6, 9);
        assert!(execute(engine.as_ref(), &mut store, &mut ()).is_err(), "{}", engine.name());
        assert!(store.c.as_slice().iter().all(|&v| v == 0), "{}", engine.name());
    }
}

#[test]
fn hung_worker_in_pool_times_out() {
    let mut store = random_store::<i64>(6, 8);
    let engine = ProcessEngine::new(2)
        .with_join_timeout(Some(Duration::from_millis(150)))
        .with_fault(Fault::new(0, FaultKind::Hang));
    let err = execute(&engine, &mut store, &mut ()).unwrap_err();
    assert!(matches!(err, EngineError::Timeout { .. }));
}
