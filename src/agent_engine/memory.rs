use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::errors::{SeeShotError, SeeShotResult};
use crate::llm::types::{ContentPart, ToolInvocation};
use crate::perception::types::CompressedFrame;

/// Human-readable label of what one iteration did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord(String);

impl ActionRecord {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn aim_and_shoot() -> Self {
        Self::new("Aim & Shoot")
    }

    pub fn tool_calls(calls: &[ToolInvocation]) -> Self {
        let listed: Vec<String> = calls.iter().map(ToString::to_string).collect();
        Self(format!("Tool Calls: [{}]", listed.join(", ")))
    }

    pub fn no_action() -> Self {
        Self::new("No Action")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRecord {
    pub action: ActionRecord,
    pub frame: CompressedFrame,
}

/// Snapshot of memory handed to the action model.
#[derive(Debug, Clone, Default)]
pub struct MemoryContext {
    pub actions: Vec<String>,
    pub images: Vec<ContentPart>,
}

impl MemoryContext {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.images.is_empty()
    }
}

/// Fixed-capacity FIFO of the most recent iterations.
#[derive(Debug)]
pub struct BoundedAgentMemory {
    capacity: usize,
    records: VecDeque<MemoryRecord>,
}

impl BoundedAgentMemory {
    pub fn new(capacity: usize) -> SeeShotResult<Self> {
        if capacity == 0 {
            return Err(SeeShotError::Config("memory capacity must be at least 1".into()));
        }
        Ok(Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        })
    }

    /// Append a record, evicting the oldest one first when full.
    pub fn append(&mut self, action: ActionRecord, frame: CompressedFrame) {
        if self.records.len() == self.capacity {
            if let Some(evicted) = self.records.pop_front() {
                tracing::debug!(action = %evicted.action, "evicting oldest memory record");
            }
        }
        self.records.push_back(MemoryRecord { action, frame });
    }

    /// Action labels, oldest first.
    pub fn action_view(&self) -> Vec<String> {
        self.records.iter().map(|r| r.action.to_string()).collect()
    }

    /// Embeddable images of every retained frame, oldest first.
    pub fn image_view(&self) -> Vec<ContentPart> {
        self.records.iter().map(|r| r.frame.to_content_part()).collect()
    }

    pub fn context(&self) -> MemoryContext {
        MemoryContext {
            actions: self.action_view(),
            images: self.image_view(),
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &MemoryRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Memory shared between the loop and outside observers.
#[derive(Debug, Clone)]
pub struct SharedMemory(Arc<Mutex<BoundedAgentMemory>>);

impl SharedMemory {
    pub fn new(capacity: usize) -> SeeShotResult<Self> {
        Ok(Self(Arc::new(Mutex::new(BoundedAgentMemory::new(capacity)?))))
    }

    pub async fn append(&self, action: ActionRecord, frame: CompressedFrame) {
        self.0.lock().await.append(action, frame);
    }

    pub async fn context(&self) -> MemoryContext {
        self.0.lock().await.context()
    }

    pub async fn action_view(&self) -> Vec<String> {
        self.0.lock().await.action_view()
    }

    pub async fn len(&self) -> usize {
        self.0.lock().await.len()
    }
}
