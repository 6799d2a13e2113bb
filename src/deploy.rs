//! Runs the deploy command in the background

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::config::DeployConfig;
use crate::error::{DeployError, Result};
use crate::job::{Deployment, DeploymentResult};

/// Hard limit for a single deployment. The whole process group of the
/// command is killed when it expires.
pub const DEPLOY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Executes a shell command line. The seam between the trigger and the OS.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, timeout: Duration) -> DeploymentResult;
}

/// Runs commands through `sh -c`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, timeout: Duration) -> DeploymentResult {
        match run_shell(command, timeout).await {
            Ok(result) => result,
            Err(e) => DeploymentResult::failed(e.to_string(), String::new(), String::new()),
        }
    }
}

async fn run_shell(command: &str, limit: Duration) -> Result<DeploymentResult> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group, so a timeout can take down everything `sh` started.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn()?;
    let group = child.id();
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();

    let outcome = tokio::time::timeout(limit, async {
        tokio::try_join!(child.wait(), read_pipe(stdout_pipe), read_pipe(stderr_pipe))
    })
    .await;

    let (status, stdout, stderr) = match outcome {
        Ok(collected) => collected?,
        Err(_) => {
            kill_process_group(group);
            if let Err(e) = child.kill().await {
                warn!("Failed to kill timed out deploy command: {}", e);
            }
            return Err(DeployError::DeploymentTimedOut(limit));
        }
    };

    if status.success() {
        Ok(DeploymentResult::succeeded(stdout, stderr))
    } else {
        let failure = DeployError::DeploymentFailed(format!("command exited with {}", status));
        Ok(DeploymentResult::failed(failure.to_string(), stdout, stderr))
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<String> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(unix)]
fn kill_process_group(group: Option<u32>) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(id) = group else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(id as i32), Signal::SIGKILL) {
        warn!("Failed to kill process group {}: {}", id, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_group: Option<u32>) {}

/// Fires deployments without blocking the caller and keeps track of the
/// ones still running so shutdown can wait for them.
pub struct DeployTrigger {
    config: Arc<DeployConfig>,
    runner: Arc<dyn CommandRunner>,
    tracker: TaskTracker,
    execution_lock: Arc<Mutex<()>>,
    timeout: Duration,
}

impl DeployTrigger {
    pub fn new(config: Arc<DeployConfig>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            runner,
            tracker: TaskTracker::new(),
            execution_lock: Arc::new(Mutex::new(())),
            timeout: DEPLOY_TIMEOUT,
        }
    }

    /// Overrides the deployment time limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The full command line handed to the runner.
    pub fn command(&self) -> String {
        format!(
            "cd {} && {}",
            self.config.project_path.display(),
            self.config.deploy_command
        )
    }

    /// Number of deployments still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Spawns the deployment and returns immediately.
    /// The outcome is only logged; there are no retries.
    pub fn trigger(&self, deployment: Deployment) -> JoinHandle<()> {
        let command = self.command();
        let runner = Arc::clone(&self.runner);
        let lock = Arc::clone(&self.execution_lock);
        let serialize = self.config.serialize_deployments;
        let verbose = self.config.verbose_logging;
        let timeout = self.timeout;

        info!(
            "Deployment {} queued for {} branch '{}' (pushed by {})",
            deployment.id,
            deployment.repository.as_deref().unwrap_or("(unknown repository)"),
            deployment.branch.as_deref().unwrap_or("(no ref)"),
            deployment.pusher.as_deref().unwrap_or("unknown")
        );

        self.tracker.spawn(async move {
            // Only one deployment at a time when serialization is on.
            let _guard = if serialize {
                Some(lock.lock().await)
            } else {
                None
            };

            info!("Deployment {} running: {}", deployment.id, command);
            let started = Instant::now();
            let result = runner.run(&command, timeout).await;
            report(&deployment, &result, started.elapsed(), verbose);
        })
    }

    /// Stops accepting deployments and waits up to `grace` for running ones.
    /// Returns false if some were still running when the grace period ended.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        if self.tracker.is_empty() {
            return true;
        }
        info!(
            "Waiting up to {}s for {} running deployment(s)",
            grace.as_secs(),
            self.tracker.len()
        );
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    "{} deployment(s) still running after the shutdown grace period",
                    self.tracker.len()
                );
                false
            }
        }
    }
}

fn report(deployment: &Deployment, result: &DeploymentResult, elapsed: Duration, verbose: bool) {
    if result.output_truncated {
        warn!("Deployment {} output exceeded the capture limit and was truncated", deployment.id);
    }
    if result.success {
        info!(
            "Deployment {} completed successfully in {:.1}s",
            deployment.id,
            elapsed.as_secs_f64()
        );
        if verbose {
            if !result.stdout.is_empty() {
                info!("Deployment {} stdout:\n{}", deployment.id, result.stdout);
            }
            if !result.stderr.is_empty() {
                info!("Deployment {} stderr:\n{}", deployment.id, result.stderr);
            }
        }
    } else {
        error!(
            "Deployment {} failed after {:.1}s: {}",
            deployment.id,
            elapsed.as_secs_f64(),
            result.error_message.as_deref().unwrap_or("unknown error")
        );
        if !result.stderr.is_empty() {
            error!("Deployment {} stderr:\n{}", deployment.id, result.stderr);
        }
        if verbose && !result.stdout.is_empty() {
            info!("Deployment {} stdout:\n{}", deployment.id, result.stdout);
        }
    }
}
