//! CLI Commands module
//!
//! Implements the single run command: load the pipeline definition,
//! resolve and execute the requested targets, and print the outcome in
//! the selected mode (run, dry run, touch or dag export).

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::application::use_cases::execute_run::{ExecuteRun, RunOptions, RunOutcome};
use crate::domain::entities::workflow::Workflow;
use crate::domain::repositories::action_runner::ActionRunner;
use crate::domain::value_objects::job_counter::JobCounter;
use crate::infrastructure::fs;
use crate::infrastructure::parsers::PipelineParser;
use crate::infrastructure::runners::{ClusterRunner, ShellRunner};
use crate::presentation::cli::Cli;
use crate::presentation::dto::RunReport;

/// Command that runs pipeline targets end to end
pub struct RunCommand;

impl RunCommand {
    pub fn execute(cli: &Cli) -> Result<()> {
        let mut workflow = Workflow::new();
        workflow.set_cores(cli.cores);

        if let Some(dir) = &cli.workdir {
            let dir = dir
                .to_str()
                .context("work directory path is not valid UTF-8")?;
            Self::enter_workdir(&mut workflow, dir)?;
        }

        // Spinner while the definition is parsed
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Loading pipeline definition...");
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));

        let file = cli
            .file
            .to_str()
            .context("pipeline file path is not valid UTF-8")?;
        let parser = PipelineParser::new();
        let summary = parser
            .include(&mut workflow, file, false)
            .context("Failed to load pipeline definition")?;
        spinner.finish_with_message(format!("✓ Loaded {} rules from {}", summary.added, file));

        if let Some(dir) = summary.workdir {
            Self::enter_workdir(&mut workflow, &dir)?;
        }

        let runner: Arc<dyn ActionRunner> = match &cli.cluster {
            Some(cmd) => Arc::new(ClusterRunner::new(cmd.as_str())),
            None => Arc::new(ShellRunner::new()),
        };
        let options = RunOptions {
            dryrun: cli.dryrun,
            touch: cli.touch,
            dag: cli.dag,
            forcethis: cli.forcethis,
            forceall: cli.forceall,
            reason: cli.reason,
            cluster: cli.cluster.clone(),
        };

        // Progress bar for executing modes only
        let executing = !cli.dryrun && !cli.dag;
        let bar = if executing {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓▒░ "),
            );
            Some(bar)
        } else {
            None
        };
        let bar_handle = bar.clone();
        let mut on_progress = move |counter: &JobCounter| {
            if let Some(bar) = &bar_handle {
                bar.set_length(counter.total() as u64);
                bar.set_position(counter.finished() as u64);
                bar.set_message(counter.to_string());
            }
        };
        let progress: Option<&mut dyn FnMut(&JobCounter)> = if executing {
            Some(&mut on_progress)
        } else {
            None
        };

        let outcome = ExecuteRun::execute(&mut workflow, &cli.targets, &options, runner, progress);
        if let Some(bar) = &bar {
            bar.finish_and_clear();
        }
        let outcome = outcome?;

        match outcome {
            RunOutcome::Dag(dot) => println!("{}", dot),
            RunOutcome::DryRun(lines) => {
                for line in &lines {
                    println!("{}", line);
                }
                println!("\n{} jobs to run", lines.len());
            }
            RunOutcome::Executed(stats) => {
                let report = RunReport::from_run(&stats, &workflow);
                if let Some(path) = &cli.stats {
                    Self::write_stats(&report, path)?;
                }
                Self::print_summary(&report);
            }
        }
        Ok(())
    }

    /// Creates and enters the work directory on first call; later calls
    /// are no-ops, so a CLI flag wins over the pipeline file
    fn enter_workdir(workflow: &mut Workflow, dir: &str) -> Result<()> {
        if workflow.set_workdir(Path::new(dir)) {
            fs::mkdir_p(dir).with_context(|| format!("Failed to create work directory {}", dir))?;
            std::env::set_current_dir(dir)
                .with_context(|| format!("Failed to enter work directory {}", dir))?;
            info!("entered work directory {}", dir);
        }
        Ok(())
    }

    fn write_stats(report: &RunReport, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create statistics file {:?}", path))?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write statistics file {:?}", path))?;
        info!("wrote runtime statistics to {:?}", path);
        Ok(())
    }

    /// Prints the end-of-run summary to the console
    fn print_summary(report: &RunReport) {
        println!("\n{}", "=".repeat(60));
        println!("📊 PIPELINE RUN SUMMARY");
        println!("{}", "=".repeat(60));
        println!("\n  • Total jobs:   {}", report.summary.total_jobs);
        println!("  • Executed:     {}", report.summary.executed_jobs);
        println!("  • Up to date:   {}", report.summary.skipped_jobs);

        if !report.rules.is_empty() {
            println!("\n⏱  Rule runtimes (seconds):");
            for rule in &report.rules {
                println!(
                    "  • {:<24} runs {:>3}   min {:>8.2}   max {:>8.2}   mean {:>8.2}",
                    rule.rule, rule.runs, rule.min_seconds, rule.max_seconds, rule.mean_seconds
                );
            }
        }
        println!("\n{}", "=".repeat(60));
    }
}
