//! Вывод результатов в консоль

use prettytable::{row, Table};
use serde::Serialize;

use crate::engine::WorkStats;
use crate::matrix::{Comparison, Element, Matrix};
use crate::utils::Timing;

/// Итог запуска одного движка
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub engine: String,
    pub size: usize,
    pub wall_secs: f64,
    pub cpu_secs: f64,
    pub stats: WorkStats,
    /// `None` для самого эталона
    pub matches_reference: Option<bool>,
    pub max_diff: Option<f64>,
}

impl RunRecord {
    pub fn new(
        engine: &str,
        size: usize,
        timing: Timing,
        stats: WorkStats,
        comparison: Option<Comparison>,
    ) -> Self {
        Self {
            engine: engine.to_string(),
            size,
            wall_secs: timing.wall.as_secs_f64(),
            cpu_secs: timing.cpu.as_secs_f64(),
            stats,
            matches_reference: comparison.map(|c| c.matches()),
            max_diff: comparison.map(|c| c.max_diff),
        }
    }

    fn verdict(&self) -> &'static str {
        match self.matches_reference {
            None => "эталон",
            Some(true) => "совпадает",
            Some(false) => "различается",
        }
    }
}

/// Таблица сравнения движков
pub fn summary_table(records: &[RunRecord]) -> Table {
    let mut table = Table::new();
    table.add_row(row![
        "Движок",
        "Время, с",
        "CPU, с",
        "Рабочих",
        "Единиц",
        "Посещений",
        "Проверка"
    ]);
    for r in records {
        table.add_row(row![
            r.engine,
            format!("{:.4}", r.wall_secs),
            format!("{:.4}", r.cpu_secs),
            r.stats.workers,
            r.stats.units,
            r.stats.visits,
            r.verdict()
        ]);
    }
    table
}

pub fn print_summary(records: &[RunRecord]) {
    println!("\nИтоговая статистика:");
    summary_table(records).printstd();

    if let Some(reference) = records.iter().find(|r| r.matches_reference.is_none()) {
        for r in records.iter().filter(|r| r.matches_reference.is_some() && r.wall_secs > 0.0) {
            println!(
                "{} быстрее эталона в {:.2} раз",
                r.engine,
                reference.wall_secs / r.wall_secs
            );
        }
    }
}

/// Первые элементы первой и последней строк матрицы
pub fn head_tail<T: Element>(matrix: &Matrix<T>, width: usize) -> (String, String) {
    let view = matrix.view();
    let last = matrix.size() - 1;
    let fmt_row = |i: usize| {
        let row = view.row(i);
        let mut cells: Vec<String> = row.iter().take(width).map(|v| format!("{:.1}", v)).collect();
        if row.len() > width {
            cells.push("...".to_string());
        }
        cells.join(" ")
    };
    (fmt_row(0), fmt_row(last))
}

pub fn print_head_tail<T: Element>(name: &str, matrix: &Matrix<T>) {
    let (head, tail) = head_tail(matrix, 4);
    println!("\nМатрица {} ({}x{}):", name, matrix.size(), matrix.size());
    println!("{}", head);
    if matrix.size() > 1 {
        println!("...");
        println!("{}", tail);
    }
}
