//! Scheduler service module
//!
//! Runs the resolved job graph. A single coordinator thread owns all
//! mutable scheduling state (ready set, running set, pending-upstream
//! counts); workers are plain OS threads that execute one job's action
//! and post exactly one message on the completion channel. The
//! coordinator suspends only on that channel.

use std::collections::{BTreeSet, HashMap};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::application::services::{knapsack, resolver};
use crate::domain::entities::job::{JobArena, JobId};
use crate::domain::errors::PipelineError;
use crate::domain::repositories::action_runner::ActionRunner;
use crate::domain::value_objects::job_counter::JobCounter;
use crate::domain::value_objects::job_state::JobState;
use crate::infrastructure::fs;

/// Closed set of scheduling strategies
#[derive(Debug, Clone, Copy)]
pub enum SchedulerMode {
    /// Knapsack admission under a fixed core budget
    Local { cores: usize },
    /// Submit every ready job immediately; the thread budget is advisory
    Cluster,
}

/// What one scheduling pass did and how it ended
#[derive(Debug)]
pub struct ScheduleReport {
    /// Wall-clock seconds per executed job, keyed by rule name
    pub runtimes: Vec<(String, f64)>,
    /// First failure, if any; partial outputs were cleaned up already
    pub error: Option<PipelineError>,
}

impl ScheduleReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

struct Completion {
    job: JobId,
    threads: usize,
    result: Result<(), PipelineError>,
    seconds: f64,
}

/// Dispatches ready jobs and feeds completions back into the readiness
/// index until the graph is drained or a failure stops admission
pub struct Scheduler {
    mode: SchedulerMode,
    runner: Arc<dyn ActionRunner>,
}

impl Scheduler {
    pub fn new(mode: SchedulerMode, runner: Arc<dyn ActionRunner>) -> Self {
        Self { mode, runner }
    }

    /// Runs every job that needs to run, respecting the core budget
    ///
    /// Jobs that are up to date are marked done without dispatch. On the
    /// first failure no further jobs are admitted; running jobs drain
    /// naturally and partial outputs of unfinished jobs are removed.
    pub fn schedule(
        &self,
        arena: &mut JobArena,
        counter: &mut JobCounter,
        mut progress: Option<&mut dyn FnMut(&JobCounter)>,
    ) -> ScheduleReport {
        let run_start = Utc::now();

        for id in 0..arena.len() {
            if !arena.get(id).needs_run {
                arena.get_mut(id).state = JobState::Done;
                counter.done();
            }
        }

        let mut dependents: Vec<Vec<JobId>> = vec![Vec::new(); arena.len()];
        let mut pending: Vec<usize> = vec![0; arena.len()];
        for job in arena.iter() {
            for &up in &job.upstream {
                dependents[up].push(job.id);
            }
        }
        let mut ready: BTreeSet<JobId> = BTreeSet::new();
        for id in 0..arena.len() {
            if arena.get(id).state == JobState::Done {
                continue;
            }
            pending[id] = arena
                .get(id)
                .upstream
                .iter()
                .filter(|&&up| arena.get(up).state != JobState::Done)
                .count();
            if pending[id] == 0 {
                arena.get_mut(id).state = JobState::Ready;
                ready.insert(id);
            }
        }

        // Remaining consumers per temp file; the file is deleted when the
        // count drains to zero. Temp-ness comes from the producing job's
        // output declaration, consumers reference the plain path.
        let mut temp_consumers: HashMap<String, usize> = HashMap::new();
        for job in arena.iter() {
            for output in &job.outputs {
                if output.is_temp() {
                    temp_consumers.insert(output.path().to_string(), 0);
                }
            }
        }
        for job in arena.iter() {
            if job.state == JobState::Done {
                continue;
            }
            for input in &job.inputs {
                if let Some(count) = temp_consumers.get_mut(input.path()) {
                    *count += 1;
                }
            }
        }
        temp_consumers.retain(|_, count| *count > 0);

        let (tx, rx) = mpsc::channel::<Completion>();
        let mut running: usize = 0;
        let mut cores_in_use: usize = 0;
        let mut first_error: Option<PipelineError> = None;
        let mut runtimes: Vec<(String, f64)> = Vec::new();

        loop {
            if first_error.is_none() {
                self.dispatch(
                    arena,
                    &mut ready,
                    &mut running,
                    &mut cores_in_use,
                    &tx,
                    &mut first_error,
                );
            }
            if running == 0 {
                break;
            }
            // Sole suspension point: await the next completion.
            let Ok(message) = rx.recv() else {
                break;
            };
            self.complete(
                arena,
                message,
                &mut ready,
                &mut running,
                &mut cores_in_use,
                &dependents,
                &mut pending,
                &mut temp_consumers,
                counter,
                &mut runtimes,
                &mut first_error,
                &mut progress,
            );
        }

        if let Some(error) = first_error {
            cleanup_unfinished(arena, run_start);
            return ScheduleReport {
                runtimes,
                error: Some(error),
            };
        }
        ScheduleReport {
            runtimes,
            error: None,
        }
    }

    fn dispatch(
        &self,
        arena: &mut JobArena,
        ready: &mut BTreeSet<JobId>,
        running: &mut usize,
        cores_in_use: &mut usize,
        tx: &mpsc::Sender<Completion>,
        first_error: &mut Option<PipelineError>,
    ) {
        let picks: Vec<(JobId, usize)> = match self.mode {
            SchedulerMode::Local { cores } => {
                let available = cores.saturating_sub(*cores_in_use);
                let items: Vec<(JobId, usize)> = ready
                    .iter()
                    .map(|&id| (id, arena.get(id).threads.clamp(1, cores)))
                    .collect();
                let chosen = knapsack::select(&items, available);
                items
                    .into_iter()
                    .filter(|(id, _)| chosen.contains(id))
                    .collect()
            }
            SchedulerMode::Cluster => ready
                .iter()
                .map(|&id| (id, arena.get(id).threads))
                .collect(),
        };

        for (id, threads) in picks {
            ready.remove(&id);
            let job = arena.get(id);
            if let Some(blocked) = job
                .outputs
                .iter()
                .find(|o| o.is_protected() && fs::exists(o.path()))
            {
                let error = PipelineError::ProtectedOutput {
                    file: blocked.path().to_string(),
                };
                warn!("{}", error);
                arena.get_mut(id).state = JobState::Failed;
                *first_error = Some(error);
                return;
            }
            if let Err(io_error) = job
                .outputs
                .iter()
                .try_for_each(|o| fs::ensure_parent_dir(o.path()))
            {
                arena.get_mut(id).state = JobState::Failed;
                *first_error = Some(PipelineError::Io(io_error));
                return;
            }

            info!("{}", job.display_line());
            let rule = job.rule.clone();
            let command = job.command.clone();
            arena.get_mut(id).state = JobState::Running;
            *cores_in_use += threads;
            *running += 1;
            let tx = tx.clone();
            let runner = Arc::clone(&self.runner);
            std::thread::spawn(move || {
                let started = Instant::now();
                let result = match &command {
                    Some(cmd) => runner.run(&rule, cmd),
                    None => Ok(()),
                };
                let _ = tx.send(Completion {
                    job: id,
                    threads,
                    result,
                    seconds: started.elapsed().as_secs_f64(),
                });
            });
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn complete(
        &self,
        arena: &mut JobArena,
        message: Completion,
        ready: &mut BTreeSet<JobId>,
        running: &mut usize,
        cores_in_use: &mut usize,
        dependents: &[Vec<JobId>],
        pending: &mut [usize],
        temp_consumers: &mut HashMap<String, usize>,
        counter: &mut JobCounter,
        runtimes: &mut Vec<(String, f64)>,
        first_error: &mut Option<PipelineError>,
        progress: &mut Option<&mut dyn FnMut(&JobCounter)>,
    ) {
        let id = message.job;
        *running -= 1;
        *cores_in_use = cores_in_use.saturating_sub(message.threads);

        if let Err(error) = message.result {
            warn!("job {} failed: {}", arena.get(id).label(), error);
            arena.get_mut(id).state = JobState::Failed;
            if first_error.is_none() {
                *first_error = Some(error);
            }
            return;
        }

        let missing = missing_outputs(arena, id);
        if !missing.is_empty() {
            let error = PipelineError::MissingOutput {
                rule: arena.get(id).rule.clone(),
                files: missing,
            };
            warn!("{}", error);
            arena.get_mut(id).state = JobState::Failed;
            if first_error.is_none() {
                *first_error = Some(error);
            }
            return;
        }

        arena.get_mut(id).state = JobState::Done;
        counter.done();
        runtimes.push((arena.get(id).rule.clone(), message.seconds));
        info!("{}", counter);
        if let Some(callback) = progress {
            callback(counter);
        }

        let consumed: Vec<String> = arena
            .get(id)
            .inputs
            .iter()
            .map(|i| i.path().to_string())
            .collect();
        for path in consumed {
            if let Some(remaining) = temp_consumers.get_mut(&path) {
                *remaining -= 1;
                if *remaining == 0 {
                    debug!("removing temporary file {}", path);
                    if let Err(error) = fs::unlink(&path) {
                        warn!("could not remove temporary file {}: {}", path, error);
                    }
                }
            }
        }

        for &dependent in &dependents[id] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 && arena.get(dependent).state == JobState::Pending {
                arena.get_mut(dependent).state = JobState::Ready;
                ready.insert(dependent);
            }
        }
    }
}

/// Declared outputs still absent after a successful action
///
/// Dynamic outputs are satisfied by any file matching the pattern.
fn missing_outputs(arena: &JobArena, id: JobId) -> Vec<String> {
    arena
        .get(id)
        .outputs
        .iter()
        .filter(|o| {
            if o.is_dynamic() {
                fs::find_matching(o.path()).is_empty()
            } else {
                !fs::exists(o.path())
            }
        })
        .map(|o| o.path().to_string())
        .collect()
}

/// Removes outputs written during this run by jobs that never finished
///
/// Files present before the run and not rewritten are kept; protected
/// outputs are never deleted.
fn cleanup_unfinished(arena: &JobArena, run_start: DateTime<Utc>) {
    for job in arena.iter() {
        if !job.needs_run || job.state == JobState::Done {
            continue;
        }
        for output in &job.outputs {
            if output.is_protected() || output.is_dynamic() {
                continue;
            }
            let path = output.path();
            if !fs::exists(path) {
                continue;
            }
            let rewritten = fs::mtime(path).map(|t| t >= run_start).unwrap_or(false);
            if rewritten {
                info!("removing partial output {}", path);
                if let Err(error) = fs::unlink(path) {
                    warn!("could not remove partial output {}: {}", path, error);
                }
            }
        }
    }
}

/// Touch mode: set every to-run job's outputs to the current time
/// instead of executing actions
///
/// Failures are reported but nothing is cleaned up.
pub fn touch_all(arena: &mut JobArena, counter: &mut JobCounter) -> ScheduleReport {
    let order = match resolver::topological_order(arena) {
        Ok(order) => order,
        Err(error) => {
            return ScheduleReport {
                runtimes: Vec::new(),
                error: Some(error),
            }
        }
    };
    let mut first_error: Option<PipelineError> = None;
    for id in order {
        if !arena.get(id).needs_run {
            arena.get_mut(id).state = JobState::Done;
            counter.done();
            continue;
        }
        let outputs: Vec<String> = arena
            .get(id)
            .outputs
            .iter()
            .map(|o| o.path().to_string())
            .collect();
        let touched: Result<(), std::io::Error> = outputs.iter().try_for_each(|path| {
            fs::ensure_parent_dir(path)?;
            fs::touch(path)
        });
        match touched {
            Ok(()) => {
                debug!("touched outputs of {}", arena.get(id).label());
                arena.get_mut(id).state = JobState::Done;
                counter.done();
            }
            Err(io_error) => {
                warn!(
                    "could not touch outputs of {}: {}",
                    arena.get(id).label(),
                    io_error
                );
                arena.get_mut(id).state = JobState::Failed;
                if first_error.is_none() {
                    first_error = Some(PipelineError::Io(io_error));
                }
            }
        }
    }
    ScheduleReport {
        runtimes: Vec::new(),
        error: first_error,
    }
}
