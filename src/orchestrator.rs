use std::{future::Future, time::Duration};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    backend::Backend,
    config::FuzzConfig,
    convergence::{check, Verdict},
    error::{BackendError, GeneratorError, HarnessFault},
    planner::OperationPlanner,
    trace::{Trace, TraceEvent},
    utf16::get_utf16_len,
    BackendKind,
};


/// Upper bound for a single call into a backend
pub const CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Init,
    Running(usize),
    Quiescing,
    Verifying,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub verdict: Verdict,
    pub trace: Trace,
}

/// Drives one fuzz run over a daemon backend and an editor backend.
///
/// The orchestrator owns both backends for the whole run and shuts them down
/// whether the run ends with a verdict or with a fault.
pub struct FuzzOrchestrator<D, E> {
    daemon: D,
    editor: E,
    planner: OperationPlanner,
    config: FuzzConfig,
    rng: StdRng,
    trace: Trace,
    phase: Phase,
}

impl<D: Backend, E: Backend> FuzzOrchestrator<D, E> {
    pub fn new(daemon: D, editor: E, config: FuzzConfig) -> Result<Self, GeneratorError> {
        let planner = config.planner()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        Ok(Self {
            daemon,
            editor,
            planner,
            rng: StdRng::seed_from_u64(seed),
            trace: Trace::new(seed, &config.seed_content),
            config,
            phase: Phase::Init,
        })
    }

    pub fn seed(&self) -> u64 {
        self.trace.seed
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub async fn run(self) -> Result<RunReport, HarnessFault> {
        let (result, trace) = self.run_traced().await;
        result.map(|verdict| RunReport { verdict, trace })
    }

    /// Like [Self::run], but hands back the trace on faults too.
    pub async fn run_traced(mut self) -> (Result<Verdict, HarnessFault>, Trace) {
        tracing::info!(seed = self.seed(), rounds = self.config.rounds, "Starting fuzz run");
        let result = self.drive().await;
        self.teardown().await;
        match &result {
            Ok(Verdict::Converged) => tracing::info!("Backends converged"),
            Ok(verdict @ Verdict::Diverged { .. }) => tracing::warn!(
                first_difference = ?verdict.first_difference(),
                "Backends diverged"
            ),
            Err(fault) => tracing::error!(error = %fault, "Run aborted"),
        }

        (result, self.trace)
    }

    async fn drive(&mut self) -> Result<Verdict, HarnessFault> {
        self.init().await?;
        for round in 0..self.config.rounds {
            self.round(round).await?;
        }

        self.quiesce().await?;
        self.verify().await
    }

    async fn init(&mut self) -> Result<(), HarnessFault> {
        self.set_phase(Phase::Init);
        let page = self.config.page_name.clone();
        let content = self.config.seed_content.clone();
        guard(self.daemon.start())
            .await
            .map_err(|e| HarnessFault::new(Phase::Init, BackendKind::Daemon, e))?;
        guard(self.editor.start())
            .await
            .map_err(|e| HarnessFault::new(Phase::Init, BackendKind::Editor, e))?;
        tokio::time::sleep(self.config.warmup).await;
        guard(self.daemon.open(&page, &content))
            .await
            .map_err(|e| HarnessFault::new(Phase::Init, BackendKind::Daemon, e))?;
        guard(self.editor.open(&page, &content))
            .await
            .map_err(|e| HarnessFault::new(Phase::Init, BackendKind::Editor, e))?;
        Ok(())
    }

    async fn round(&mut self, round: usize) -> Result<(), HarnessFault> {
        let phase = Phase::Running(round);
        self.set_phase(phase);
        let kind = if self.rng.gen_bool(0.5) {
            BackendKind::Daemon
        } else {
            BackendKind::Editor
        };
        let backend: &mut dyn Backend = match kind {
            BackendKind::Daemon => &mut self.daemon,
            BackendKind::Editor => &mut self.editor,
        };

        let current = guard(backend.current_text())
            .await
            .map_err(|e| HarnessFault::new(phase, kind, e).at_round(round, None))?;
        let len_before = get_utf16_len(&current);
        let op = self.planner.plan(&mut self.rng, &current);
        debug_log::group!("round {round} on {kind} (len = {len_before}): {op:?}");
        let applied = match &op {
            Some(op) => guard(backend.apply(op)).await,
            None => Ok(()),
        };
        debug_log::group_end!();
        if let Err(e) = applied {
            return Err(HarnessFault::new(phase, kind, e).at_round(round, op));
        }

        self.trace.record(TraceEvent {
            round,
            backend: kind,
            len_before,
            op,
        });
        Ok(())
    }

    async fn quiesce(&mut self) -> Result<(), HarnessFault> {
        self.set_phase(Phase::Quiescing);
        tokio::time::sleep(self.config.settle).await;
        guard(self.daemon.settle())
            .await
            .map_err(|e| HarnessFault::new(Phase::Quiescing, BackendKind::Daemon, e))?;
        guard(self.editor.settle())
            .await
            .map_err(|e| HarnessFault::new(Phase::Quiescing, BackendKind::Editor, e))?;
        Ok(())
    }

    async fn verify(&mut self) -> Result<Verdict, HarnessFault> {
        self.set_phase(Phase::Verifying);
        let daemon_text = guard(self.daemon.current_text())
            .await
            .map_err(|e| HarnessFault::new(Phase::Verifying, BackendKind::Daemon, e))?;
        let editor_text = guard(self.editor.current_text())
            .await
            .map_err(|e| HarnessFault::new(Phase::Verifying, BackendKind::Editor, e))?;
        let verdict = check(&daemon_text, &editor_text);
        self.set_phase(Phase::Done);
        Ok(verdict)
    }

    async fn teardown(&mut self) {
        if let Err(e) = guard(self.daemon.shutdown()).await {
            tracing::warn!(error = %e, "Failed to shut down the daemon");
        }
        if let Err(e) = guard(self.editor.shutdown()).await {
            tracing::warn!(error = %e, "Failed to shut down the editor");
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if !matches!(phase, Phase::Running(_)) {
            tracing::debug!(?phase, "Entering phase");
        }
        self.phase = phase;
    }
}

async fn guard<T>(fut: impl Future<Output = Result<T, BackendError>>) -> Result<T, BackendError> {
    tokio::time::timeout(CALL_TIMEOUT, fut)
        .await
        .map_err(|_| BackendError::Timeout(CALL_TIMEOUT))?
}
