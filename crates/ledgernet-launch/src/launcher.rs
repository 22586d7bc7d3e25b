//! Process launching
//!
//! The launcher releases a node's reserved ports, spawns its executable with
//! the composed environment and records what it started. It never stops a
//! process it started: cleanup is left to the operator.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::{DateTime, Utc};
use tokio::process::Command;

use ledgernet_core::{NetError, NetResult, NodeSpec};
use ledgernet_transport::ReservedPorts;

use crate::ProcessEnv;

/// Where a process's stdout/stderr go
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogDestination {
    /// Inherit the parent's terminal
    Terminal,
    /// Redirect to per-node files
    Files { stdout: PathBuf, stderr: PathBuf },
}

impl LogDestination {
    /// Per-node log files under `dir`
    pub fn files_for(dir: &Path, node: &NodeSpec) -> Self {
        LogDestination::Files {
            stdout: dir.join(format!("{}.stdout", node.id())),
            stderr: dir.join(format!("{}.stderr", node.id())),
        }
    }
}

/// Everything needed to start one process
#[derive(Clone, Debug)]
pub struct LaunchRequest {
    pub node: NodeSpec,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: ProcessEnv,
    pub logs: LogDestination,
}

/// A started process
#[derive(Clone, Debug)]
pub struct ProcessRecord {
    pub pid: u32,
    pub node_id: String,
    pub logs: LogDestination,
    pub started_at: DateTime<Utc>,
}

/// Starts OS processes
pub trait Spawner {
    /// Spawn the request and return its process id
    fn spawn(&mut self, request: &LaunchRequest) -> NetResult<u32>;
}

/// Spawns real executables through tokio
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandSpawner;

impl Spawner for CommandSpawner {
    fn spawn(&mut self, request: &LaunchRequest) -> NetResult<u32> {
        let launch_err = |reason: String| NetError::Launch {
            node: request.node.id().to_string(),
            reason,
        };

        let mut command = Command::new(&request.program);
        command
            .args(&request.args)
            .envs(request.env.iter())
            .stdin(Stdio::null());

        match &request.logs {
            LogDestination::Terminal => {
                command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            LogDestination::Files { stdout, stderr } => {
                let out = File::create(stdout)
                    .map_err(|e| launch_err(format!("cannot create {}: {}", stdout.display(), e)))?;
                let err = File::create(stderr)
                    .map_err(|e| launch_err(format!("cannot create {}: {}", stderr.display(), e)))?;
                command.stdout(out).stderr(err);
            }
        }

        let child = command
            .spawn()
            .map_err(|e| launch_err(format!("{}: {}", request.program.display(), e)))?;
        let pid = child
            .id()
            .ok_or_else(|| launch_err("process exited before its pid was read".to_string()))?;

        // Dropping the handle leaves the process running
        drop(child);
        Ok(pid)
    }
}

/// Launches nodes one at a time
pub struct ProcessLauncher<S: Spawner> {
    spawner: S,
    log_dir: PathBuf,
    debug: bool,
    launched: Vec<ProcessRecord>,
}

impl<S: Spawner> ProcessLauncher<S> {
    /// Create a launcher; `debug` leaves output on the terminal
    pub fn new(spawner: S, log_dir: impl Into<PathBuf>, debug: bool) -> Self {
        Self {
            spawner,
            log_dir: log_dir.into(),
            debug,
            launched: Vec::new(),
        }
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    /// Processes started so far, in launch order
    pub fn launched(&self) -> &[ProcessRecord] {
        &self.launched
    }

    fn log_destination(&self, node: &NodeSpec) -> NetResult<LogDestination> {
        if self.debug {
            return Ok(LogDestination::Terminal);
        }
        std::fs::create_dir_all(&self.log_dir).map_err(|e| NetError::Launch {
            node: node.id().to_string(),
            reason: format!("cannot create log dir {}: {}", self.log_dir.display(), e),
        })?;
        Ok(LogDestination::files_for(&self.log_dir, node))
    }

    /// Release `ports` and spawn the node.
    ///
    /// The ports are closed as the last step before the spawn so the process
    /// can bind them.
    pub fn launch(
        &mut self,
        node: &NodeSpec,
        program: &Path,
        args: &[String],
        env: ProcessEnv,
        ports: ReservedPorts,
    ) -> NetResult<ProcessRecord> {
        let logs = self.log_destination(node)?;
        let request = LaunchRequest {
            node: node.clone(),
            program: program.to_path_buf(),
            args: args.to_vec(),
            env,
            logs,
        };

        ports.release();
        let started_at = Utc::now();
        let pid = self.spawner.spawn(&request)?;

        tracing::info!(node = %node, pid, program = %program.display(), "launched process");

        let record = ProcessRecord {
            pid,
            node_id: node.id().to_string(),
            logs: request.logs,
            started_at,
        };
        self.launched.push(record.clone());
        Ok(record)
    }
}
