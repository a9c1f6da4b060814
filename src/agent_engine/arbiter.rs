//! Races the targeting model against the action model for one frame.
//!
//! Both models start together on their own tasks. The targeting result is
//! always looked at first: a located point wins outright and the action
//! model's work is aborted (or, if it already finished, drained briefly and
//! thrown away). Only when no point was found does the arbiter wait for the
//! action model and hand back its tool calls.
//!
//! Models never perform effects themselves, so discarding an action result
//! loses nothing that already happened.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::agent_engine::memory::MemoryContext;
use crate::errors::{SeeShotError, SeeShotResult};
use crate::llm::models::{ActionModel, TargetingModel};
use crate::llm::types::{ProviderMetadata, ToolInvocation};
use crate::perception::target::parse_point;
use crate::perception::types::{Frame, Point};

#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    /// How long to wait for an already-finished action task before discarding it.
    pub drain_grace: Duration,
    pub aiming_timeout: Option<Duration>,
    pub gameplay_timeout: Option<Duration>,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            drain_grace: Duration::from_millis(10),
            aiming_timeout: None,
            gameplay_timeout: None,
        }
    }
}

/// Outcome of one arbitration. `tool_invocations` is empty whenever `coords` is set.
#[derive(Debug, Clone, Default)]
pub struct ArbitrationResult {
    pub coords: Option<Point>,
    pub tool_invocations: Vec<ToolInvocation>,
    pub aiming_elapsed: Duration,
    /// Zero when the action result was not used.
    pub action_elapsed: Duration,
    pub aiming_metadata: Option<ProviderMetadata>,
    pub action_metadata: Option<ProviderMetadata>,
}

pub struct DualModelArbiter {
    targeting: Arc<dyn TargetingModel>,
    action: Arc<dyn ActionModel>,
    config: ArbiterConfig,
}

async fn with_deadline<T>(
    deadline: Option<Duration>,
    fut: impl Future<Output = SeeShotResult<T>>,
) -> SeeShotResult<T> {
    match deadline {
        Some(d) => tokio::time::timeout(d, fut)
            .await
            .map_err(|_| SeeShotError::Agent(format!("model call timed out after {d:?}")))?,
        None => fut.await,
    }
}

impl DualModelArbiter {
    pub fn new(
        targeting: Arc<dyn TargetingModel>,
        action: Arc<dyn ActionModel>,
        config: ArbiterConfig,
    ) -> Self {
        Self {
            targeting,
            action,
            config,
        }
    }

    pub async fn arbitrate(&self, context: MemoryContext, frame: Frame) -> ArbitrationResult {
        let targeting = self.targeting.clone();
        let aiming_frame = frame.clone();
        let aiming_timeout = self.config.aiming_timeout;
        let aiming_task = tokio::spawn(async move {
            let started = Instant::now();
            let out = with_deadline(aiming_timeout, targeting.locate(&aiming_frame)).await;
            (out, started.elapsed())
        });

        let action = self.action.clone();
        let gameplay_timeout = self.config.gameplay_timeout;
        let action_task = tokio::spawn(async move {
            let started = Instant::now();
            let out = with_deadline(gameplay_timeout, action.decide(&context, &frame)).await;
            (out, started.elapsed())
        });

        let mut result = ArbitrationResult::default();

        match aiming_task.await {
            Ok((Ok(out), elapsed)) => {
                result.aiming_elapsed = elapsed;
                result.coords = parse_point(out.content.as_deref());
                result.aiming_metadata = Some(out.metadata);
            }
            Ok((Err(e), elapsed)) => {
                result.aiming_elapsed = elapsed;
                tracing::warn!(error = %e, "aiming model failed, treating as no target");
            }
            Err(e) => {
                tracing::warn!(error = %e, "aiming task panicked, treating as no target");
            }
        }

        if let Some(point) = result.coords {
            tracing::debug!(%point, "target located, discarding gameplay branch");
            if !action_task.is_finished() {
                action_task.abort();
            } else {
                match tokio::time::timeout(self.config.drain_grace, action_task).await {
                    Ok(Ok((Ok(out), _))) if !out.tool_invocations.is_empty() => {
                        tracing::warn!(
                            dropped = out.tool_invocations.len(),
                            "discarding finished gameplay tool calls in favour of aiming"
                        );
                    }
                    _ => {}
                }
            }
            return result;
        }

        match action_task.await {
            Ok((Ok(out), elapsed)) => {
                result.action_elapsed = elapsed;
                result.tool_invocations = out.tool_invocations;
                result.action_metadata = Some(out.metadata);
            }
            Ok((Err(e), elapsed)) => {
                result.action_elapsed = elapsed;
                tracing::warn!(error = %e, "gameplay model failed, no action this iteration");
            }
            Err(e) => {
                tracing::warn!(error = %e, "gameplay task panicked, no action this iteration");
            }
        }
        result
    }
}
