//! Batch execution across hosts.
//!
//! The [`BatchRunner`] drives one device session per target host, either
//! sequentially or with one task per host, and aggregates everything into
//! an [`ExecutionResult`]. Failures are contained at the host boundary:
//! one host timing out or refusing authentication never disturbs its
//! siblings, and per-host errors are data in the result tree rather than
//! errors of the run itself.

mod result;

pub use result::{CommandResult, ExecutionResult, HostResult};

use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use log::{debug, warn};
use tokio::sync::Mutex;

use crate::config::{ConfigMerge, HostConfig, OverrideSet};
use crate::error::{Error, Result};
use crate::session::{Connection, DeviceSession};

/// Executes a command batch across a set of hosts.
pub struct BatchRunner {
    template: HostConfig,
    hosts: Vec<String>,
    merge: Arc<dyn ConfigMerge>,
}

impl BatchRunner {
    /// Create a runner from a configuration template and target hosts.
    ///
    /// The template's `commands` and `parallel` fields drive the run; its
    /// host field is replaced per host.
    pub fn new(template: HostConfig, hosts: Vec<String>) -> Self {
        Self {
            template,
            hosts,
            merge: Arc::new(OverrideSet::default()),
        }
    }

    /// Use a configuration merge collaborator for per-host overrides.
    pub fn with_merge(mut self, merge: Arc<dyn ConfigMerge>) -> Self {
        self.merge = merge;
        self
    }

    /// Run the batch and aggregate per-host results.
    ///
    /// Only structural problems are errors here: no hosts, or no commands.
    /// Everything that goes wrong for an individual host (connect failure,
    /// timeout, rejected command) is recorded inside that host's
    /// [`HostResult`]; callers detect partial failure by inspecting
    /// [`ExecutionResult::failed`].
    pub async fn run(&self) -> Result<ExecutionResult> {
        self.run_with(Connection::from_config).await
    }

    /// Engine behind [`run`](Self::run), generic over the session factory
    /// so the orchestration is exercised with scripted sessions in tests.
    async fn run_with<S, F>(&self, factory: F) -> Result<ExecutionResult>
    where
        S: DeviceSession + 'static,
        F: Fn(HostConfig) -> S + Clone + Send + Sync + 'static,
    {
        if self.hosts.is_empty() {
            return Err(Error::NoHosts);
        }
        if self.template.commands.is_empty() {
            return Err(Error::NoCommands);
        }

        let started = Instant::now();
        debug!(
            "running {} commands on {} hosts ({})",
            self.template.commands.len(),
            self.hosts.len(),
            if self.template.parallel { "parallel" } else { "sequential" }
        );

        let hosts = if self.template.parallel {
            self.run_parallel(factory).await
        } else {
            self.run_sequential(factory).await
        };

        Ok(ExecutionResult::tally(
            hosts,
            started.elapsed(),
            self.template.parallel,
        ))
    }

    /// Hosts one at a time, in the given order.
    async fn run_sequential<S, F>(&self, factory: F) -> Vec<HostResult>
    where
        S: DeviceSession,
        F: Fn(HostConfig) -> S,
    {
        let mut results = Vec::with_capacity(self.hosts.len());
        for host in &self.hosts {
            results.push(
                run_host(
                    host.clone(),
                    self.template.clone(),
                    Arc::clone(&self.merge),
                    &factory,
                )
                .await,
            );
        }
        results
    }

    /// One task per host, no concurrency cap. Results land in a shared,
    /// lock-protected collection in completion order.
    async fn run_parallel<S, F>(&self, factory: F) -> Vec<HostResult>
    where
        S: DeviceSession + 'static,
        F: Fn(HostConfig) -> S + Clone + Send + Sync + 'static,
    {
        let results = Arc::new(Mutex::new(Vec::with_capacity(self.hosts.len())));
        let mut tasks = Vec::with_capacity(self.hosts.len());

        for host in self.hosts.clone() {
            let template = self.template.clone();
            let merge = Arc::clone(&self.merge);
            let factory = factory.clone();
            let results = Arc::clone(&results);

            tasks.push(tokio::spawn(async move {
                let host_result = run_host(host, template, merge, &factory).await;
                results.lock().await.push(host_result);
            }));
        }

        for outcome in join_all(tasks).await {
            if let Err(e) = outcome {
                warn!("host task aborted: {e}");
            }
        }

        let mut guard = results.lock().await;
        std::mem::take(&mut *guard)
    }
}

/// Execute the whole batch against one host. Never returns an error; every
/// failure becomes part of the [`HostResult`]. The session is closed on
/// every exit path.
async fn run_host<S, F>(
    host: String,
    template: HostConfig,
    merge: Arc<dyn ConfigMerge>,
    factory: &F,
) -> HostResult
where
    S: DeviceSession,
    F: Fn(HostConfig) -> S,
{
    let started = Instant::now();

    let mut config = match merge.resolve(&host, &template) {
        Ok(config) => config,
        Err(e) => return HostResult::failed(host, e.to_string(), started.elapsed()),
    };
    config.host = host.clone();
    let commands = config.commands.clone();

    let mut session = factory(config);
    if let Err(e) = session.connect().await {
        session.close().await;
        return HostResult::failed(host, e.to_string(), started.elapsed());
    }

    let mut results = Vec::with_capacity(commands.len());
    let mut success = true;
    for command in &commands {
        match session.execute(command).await {
            Ok(output) => results.push(CommandResult::ok(command, output.trim())),
            Err(e) => {
                // Remaining commands still run; the shell may simply have
                // been slow on this one.
                debug!("{host}: command {command:?} failed: {e}");
                success = false;
                results.push(CommandResult::failed(command, e.to_string()));
            }
        }
    }

    session.close().await;
    HostResult {
        host,
        results,
        success,
        duration: started.elapsed(),
        error: None,
    }
}
