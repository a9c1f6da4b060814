use std::time::Duration;

use crate::agent_engine::memory::ActionRecord;
use crate::llm::types::ToolInvocation;
use crate::perception::types::Point;

/// Lifecycle states of the control loop.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    CapturingFrame { iteration: u32 },
    Arbitrating { iteration: u32 },
    Acting { iteration: u32 },
    UpdatingMemory { iteration: u32 },
    Done { reason: StopReason },
}

/// Why the loop reached `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    IterationsCompleted,
    TimeLimit,
    FailureLimit,
    StopRequested,
}

/// What one iteration did and how long each part took.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IterationReport {
    /// 1-based.
    pub iteration: u32,
    pub action: ActionRecord,
    pub coords: Option<Point>,
    pub tool_calls: Vec<ToolInvocation>,
    pub aiming_elapsed: Duration,
    pub action_elapsed: Duration,
    pub total_elapsed: Duration,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    StateChanged { state: LoopState },
    IterationCompleted { report: IterationReport },
    Finished { reason: StopReason, iterations: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LoopCommand {
    Stop,
}

/// Limits checked between iterations.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct LoopConfig {
    pub iterations: u32,
    pub max_duration_minutes: Option<u32>,
    pub max_consecutive_failures: Option<u32>,
}
