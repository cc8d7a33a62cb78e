//! Check command implementation.
//!
//! Loads a plan file and normalizes it without touching a database.

use crate::core::normalizer;
use crate::core::plan_file;
use crate::models::plan::{Plan, PlanShape};
use crate::Result;
use colored::Colorize;
use std::path::Path;

/// Validate a plan file and print its stages.
pub fn check_plan(plan_file: &Path) -> Result<Plan> {
    eprintln!("[INFO] Loading plan: {}", plan_file.display());
    let spec = plan_file::load_plan(plan_file)?;
    let plan = normalizer::normalize(spec)?;

    let shape = match plan.shape() {
        PlanShape::Unit => "single unit",
        PlanShape::Stage => "single stage",
        PlanShape::Staged => "staged",
    };
    println!("  {} {}", "Shape:".bold(), shape);
    println!("  {} {}", "Stages:".bold(), plan.stages().len());
    println!("  {} {}", "Units:".bold(), plan.unit_count());

    for (i, stage) in plan.stages().iter().enumerate() {
        let keys: Vec<String> = stage.units().iter().map(|(k, _)| k.to_string()).collect();
        println!("    [{}] {:?}: {}", i, stage.kind(), keys.join(", "));
    }

    println!();
    println!("{}", "[OK] Plan is valid".bold().green());
    Ok(plan)
}
