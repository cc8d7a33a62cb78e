//! Run command implementation.
//!
//! Executes a plan file against a fresh in-memory database. The JSON report
//! is the only thing written to stdout; progress lines go to stderr.

use crate::core::plan_file;
use crate::core::Db;
use crate::models::config::Config;
use crate::models::message::UnitStats;
use crate::models::tree::Tree;
use crate::models::value::Params;
use crate::session::MemoryDatabase;
use crate::Result;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// What a run prints: the error (if any) and both trees.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub error: Option<String>,
    pub results: Tree<Value>,
    pub stats: Tree<UnitStats>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Run a plan file. Plan failures are part of the report, not an `Err`.
pub async fn run_plan(
    config: &Config,
    plan_file: &Path,
    transaction: bool,
    seed: Option<&Path>,
    output: Option<&Path>,
) -> Result<RunReport> {
    eprintln!("[INFO] Loading plan: {}", plan_file.display());
    let spec = plan_file::load_plan(plan_file)?;

    let db = Db::new(Arc::new(MemoryDatabase::new()), config);

    if let Some(seed) = seed {
        eprintln!("[INFO] Seeding from: {}", seed.display());
        let sql = std::fs::read_to_string(seed)?;
        db.command(db.context(), &sql, &Params::new(), None).await?;
    }

    let mode = if transaction { "transactional" } else { "non-transactional" };
    eprintln!("{}", format!("[EXEC] Running {} plan...", mode).bold().cyan());

    let outcome = if transaction {
        db.exec_trans_tasks(spec).await
    } else {
        db.exec_tasks(spec).await
    };
    db.close();

    let report = match outcome {
        Ok(out) => RunReport {
            error: None,
            results: out.results,
            stats: out.stats,
        },
        Err(failure) => RunReport {
            error: Some(failure.error.to_string()),
            results: failure.results,
            stats: failure.stats,
        },
    };

    let json = report.to_json()?;
    println!("{}", json);

    if let Some(path) = output {
        std::fs::write(path, &json)?;
        eprintln!("{} {}", "[OK] Report saved to:".bold().green(), path.display());
    }

    match &report.error {
        None => eprintln!("{}", "[OK] Plan completed".bold().green()),
        Some(error) => eprintln!("{} {}", "[FAIL]".bold().red(), error),
    }

    Ok(report)
}
