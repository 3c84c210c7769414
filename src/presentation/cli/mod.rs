pub mod commands;

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pipeforge")]
#[command(author = "Pipeforge Team")]
#[command(version = "0.1.0")]
#[command(about = "Rule-based build engine for file-driven data pipelines", long_about = None)]
pub struct Cli {
    #[arg(value_name = "TARGET", help = "Rule names or file paths to build (default: the first rule)")]
    pub targets: Vec<String>,

    #[arg(short, long, value_name = "FILE", default_value = "pipeline.json", help = "Pipeline definition file")]
    pub file: PathBuf,

    #[arg(short, long, value_name = "N", default_value_t = 1, help = "Number of CPU cores available to jobs")]
    pub cores: usize,

    #[arg(long, help = "Resolve and print planned jobs without running anything", conflicts_with_all = ["touch", "dag"])]
    pub dryrun: bool,

    #[arg(long, help = "Update output timestamps instead of running actions", conflicts_with = "dag")]
    pub touch: bool,

    #[arg(long, help = "Print the job graph in dot format and exit")]
    pub dag: bool,

    #[arg(long, help = "Force the target rules to run even if up to date")]
    pub forcethis: bool,

    #[arg(long, help = "Force every job to run")]
    pub forceall: bool,

    #[arg(long, value_name = "CMD", help = "Submit each job through this cluster command")]
    pub cluster: Option<String>,

    #[arg(long, help = "Print the reason each job needs to run")]
    pub reason: bool,

    #[arg(long, value_name = "DIR", help = "Create and change into this directory before running")]
    pub workdir: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Write per-rule runtime statistics to this JSON file")]
    pub stats: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}
