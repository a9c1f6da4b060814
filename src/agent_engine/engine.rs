use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::agent_engine::arbiter::{ArbitrationResult, DualModelArbiter};
use crate::agent_engine::event_bus::EventBus;
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::memory::{ActionRecord, SharedMemory};
use crate::agent_engine::state::{
    IterationReport, LoopCommand, LoopConfig, LoopEvent, LoopState, StopReason,
};
use crate::config::{AgentConfig, CompressionConfig};
use crate::errors::{SeeShotError, SeeShotResult};
use crate::executor::aim;
use crate::executor::dispatcher::ActionExecutor;
use crate::perception::compressor;
use crate::perception::screenshot::FrameSource;
use crate::perception::types::{CompressedFrame, Frame};

/// Knobs the loop needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub limits: LoopConfig,
    pub aim_multiplier: f64,
    pub fire_clicks: u32,
    pub compression: CompressionConfig,
    pub wait_on_start: Duration,
}

impl LoopSettings {
    pub fn from_config(agent: &AgentConfig, compression: CompressionConfig) -> Self {
        Self {
            limits: LoopConfig {
                iterations: agent.iterations,
                max_duration_minutes: agent.max_duration_minutes,
                max_consecutive_failures: agent.max_consecutive_failures,
            },
            aim_multiplier: agent.aim_multiplier,
            fire_clicks: agent.fire_clicks,
            compression,
            wait_on_start: Duration::from_millis(agent.wait_on_start_ms),
        }
    }
}

/// Per-iteration working data, reset when an iteration starts.
struct IterationScratch {
    started: Instant,
    started_at: chrono::DateTime<chrono::Utc>,
    frame: Option<Frame>,
    arbitration: ArbitrationResult,
    action: ActionRecord,
    error: Option<String>,
}

impl IterationScratch {
    fn begin() -> Self {
        Self {
            started: Instant::now(),
            started_at: chrono::Utc::now(),
            frame: None,
            arbitration: ArbitrationResult::default(),
            action: ActionRecord::no_action(),
            error: None,
        }
    }
}

/// Perception → arbitration → action → memory, one iteration at a time.
pub struct ControlLoop {
    state: LoopState,
    loop_ctrl: LoopController,
    bus: EventBus,
    memory: SharedMemory,
    frame_source: Arc<dyn FrameSource>,
    arbiter: DualModelArbiter,
    executor: Arc<dyn ActionExecutor>,
    settings: LoopSettings,
    run_id: uuid::Uuid,

    scratch: IterationScratch,
    reports: Vec<IterationReport>,
    stop_requested: bool,
}

impl ControlLoop {
    pub fn new(
        frame_source: Arc<dyn FrameSource>,
        arbiter: DualModelArbiter,
        executor: Arc<dyn ActionExecutor>,
        memory: SharedMemory,
        settings: LoopSettings,
    ) -> Self {
        Self {
            state: LoopState::Idle,
            loop_ctrl: LoopController::new(settings.limits.clone()),
            bus: EventBus::new(),
            memory,
            frame_source,
            arbiter,
            executor,
            settings,
            run_id: uuid::Uuid::new_v4(),
            scratch: IterationScratch::begin(),
            reports: Vec::new(),
            stop_requested: false,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn memory(&self) -> SharedMemory {
        self.memory.clone()
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Drive the loop until a limit is hit or a stop is requested; returns every iteration's report.
    pub async fn run(&mut self) -> Vec<IterationReport> {
        tracing::info!(
            run_id = %self.run_id,
            iterations = self.settings.limits.iterations,
            "control loop starting"
        );
        if !self.settings.wait_on_start.is_zero() {
            tokio::time::sleep(self.settings.wait_on_start).await;
        }

        loop {
            self.publish(LoopEvent::StateChanged {
                state: self.state.clone(),
            });

            if let Some(LoopCommand::Stop) = self.bus.try_recv_command() {
                tracing::info!("stop requested, finishing after current iteration");
                self.stop_requested = true;
            }

            match self.state.clone() {
                // ── Idle: check limits, start the next iteration ──────────
                LoopState::Idle => {
                    let reason = if self.stop_requested {
                        Some(StopReason::StopRequested)
                    } else {
                        self.loop_ctrl.should_stop()
                    };
                    if let Some(reason) = reason {
                        self.state = LoopState::Done { reason };
                        continue;
                    }
                    let iteration = self.loop_ctrl.completed() + 1;
                    tracing::info!(iteration, "--- iteration start ---");
                    self.scratch = IterationScratch::begin();
                    self.state = LoopState::CapturingFrame { iteration };
                }

                LoopState::CapturingFrame { iteration } => {
                    let started = Instant::now();
                    match self.frame_source.capture().await {
                        Ok(frame) => {
                            tracing::info!(
                                iteration,
                                source = %frame.source_id,
                                bytes = frame.len(),
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "frame captured"
                            );
                            self.scratch.frame = Some(frame);
                            self.state = LoopState::Arbitrating { iteration };
                        }
                        Err(e) => {
                            tracing::warn!(iteration, error = %e, "frame capture failed, skipping iteration");
                            self.scratch.error = Some(e.to_string());
                            self.finish_iteration(iteration);
                            self.state = LoopState::Idle;
                        }
                    }
                }

                LoopState::Arbitrating { iteration } => {
                    let Some(frame) = self.scratch.frame.clone() else {
                        self.state = LoopState::Idle;
                        continue;
                    };
                    let context = self.memory.context().await;
                    let result = self.arbiter.arbitrate(context, frame).await;
                    tracing::info!(
                        iteration,
                        coords = ?result.coords,
                        tool_calls = result.tool_invocations.len(),
                        aiming_ms = result.aiming_elapsed.as_millis() as u64,
                        gameplay_ms = result.action_elapsed.as_millis() as u64,
                        "arbitration complete"
                    );
                    self.scratch.arbitration = result;
                    self.state = LoopState::Acting { iteration };
                }

                LoopState::Acting { iteration } => {
                    let (action, outcome) = self.act().await;
                    if let Err(e) = outcome {
                        tracing::warn!(iteration, action = %action, error = %e, "action execution failed");
                        self.scratch.error = Some(e.to_string());
                    }
                    tracing::info!(iteration, action = %action, "action taken");
                    self.scratch.action = action;
                    self.state = LoopState::UpdatingMemory { iteration };
                }

                LoopState::UpdatingMemory { iteration } => {
                    if let Some(frame) = self.scratch.frame.take() {
                        let compressed = self.compress(&frame).await;
                        self.memory
                            .append(self.scratch.action.clone(), compressed)
                            .await;
                    }
                    self.finish_iteration(iteration);
                    self.state = LoopState::Idle;
                }

                LoopState::Done { reason } => {
                    tracing::info!(
                        run_id = %self.run_id,
                        ?reason,
                        iterations = self.loop_ctrl.completed(),
                        elapsed_s = self.loop_ctrl.elapsed().as_secs_f64(),
                        "control loop finished"
                    );
                    self.publish(LoopEvent::Finished {
                        reason,
                        iterations: self.loop_ctrl.completed(),
                    });
                    break;
                }
            }
        }

        std::mem::take(&mut self.reports)
    }

    /// Turn the arbitration outcome into physical input. Returns the label
    /// of what was attempted plus the first execution error, if any.
    async fn act(&self) -> (ActionRecord, SeeShotResult<()>) {
        let result = &self.scratch.arbitration;

        if let Some(point) = result.coords {
            let Some(frame) = self.scratch.frame.as_ref() else {
                return (
                    ActionRecord::aim_and_shoot(),
                    Err(SeeShotError::Agent("no frame to aim against".into())),
                );
            };
            let screen = frame.meta.size();
            let planned = aim::plan(point, screen.center(), self.settings.aim_multiplier, screen);
            // Captures are physical pixels; absolute input is logical.
            let waypoints = aim::to_logical(&planned, frame.meta.scale_factor);
            tracing::info!(%point, ?waypoints, scale_factor = frame.meta.scale_factor, "aiming & shooting");
            let outcome = match self.executor.aim(&waypoints).await {
                Ok(()) => self.executor.fire(self.settings.fire_clicks).await,
                Err(e) => Err(e),
            };
            return (ActionRecord::aim_and_shoot(), outcome);
        }

        if !result.tool_invocations.is_empty() {
            let mut outcome = Ok(());
            for tool in &result.tool_invocations {
                if let Err(e) = self.executor.invoke(tool).await {
                    tracing::warn!(tool = %tool, error = %e, "tool call failed");
                    if outcome.is_ok() {
                        outcome = Err(e);
                    }
                }
            }
            return (ActionRecord::tool_calls(&result.tool_invocations), outcome);
        }

        tracing::info!("no coords and no tool calls");
        (ActionRecord::no_action(), Ok(()))
    }

    /// Compress off the async runtime; falls back to the raw frame bytes.
    async fn compress(&self, frame: &Frame) -> CompressedFrame {
        let owned = frame.clone();
        let cfg = self.settings.compression;
        let joined =
            tokio::task::spawn_blocking(move || compressor::compress_frame(&owned, &cfg)).await;

        match joined {
            Ok(Ok(compressed)) => {
                tracing::debug!(raw = frame.len(), compressed = compressed.len(), "frame compressed");
                compressed
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "compression failed, remembering raw frame");
                CompressedFrame::new(frame.image_bytes.to_vec())
            }
            Err(e) => {
                tracing::warn!(error = %e, "compression task failed, remembering raw frame");
                CompressedFrame::new(frame.image_bytes.to_vec())
            }
        }
    }

    fn finish_iteration(&mut self, iteration: u32) {
        let failed = self.scratch.error.is_some();
        self.loop_ctrl.record_iteration(failed);

        let arb = &self.scratch.arbitration;
        let report = IterationReport {
            iteration,
            action: self.scratch.action.clone(),
            coords: arb.coords,
            tool_calls: arb.tool_invocations.clone(),
            aiming_elapsed: arb.aiming_elapsed,
            action_elapsed: arb.action_elapsed,
            total_elapsed: self.scratch.started.elapsed(),
            started_at: self.scratch.started_at,
            error: self.scratch.error.clone(),
        };
        tracing::info!(
            iteration,
            total_ms = report.total_elapsed.as_millis() as u64,
            failed,
            "iteration complete"
        );
        self.publish(LoopEvent::IterationCompleted {
            report: report.clone(),
        });
        self.reports.push(report);
    }

    fn publish(&self, event: LoopEvent) {
        // No subscribers is normal.
        let _ = self.bus.send(event);
    }
}
