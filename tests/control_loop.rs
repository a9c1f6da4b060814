use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde_json::json;

use seeshot_lib::agent_engine::arbiter::{ArbiterConfig, DualModelArbiter};
use seeshot_lib::agent_engine::engine::{ControlLoop, LoopSettings};
use seeshot_lib::agent_engine::memory::{MemoryContext, SharedMemory};
use seeshot_lib::agent_engine::state::{LoopCommand, LoopConfig, LoopEvent, LoopState, StopReason};
use seeshot_lib::config::CompressionConfig;
use seeshot_lib::errors::{SeeShotError, SeeShotResult};
use seeshot_lib::executor::aim::Waypoint;
use seeshot_lib::executor::dispatcher::ActionExecutor;
use seeshot_lib::llm::models::{ActionModel, ActionOutput, TargetingModel, TargetingOutput};
use seeshot_lib::llm::types::{ContentPart, ToolInvocation};
use seeshot_lib::perception::screenshot::FrameSource;
use seeshot_lib::perception::types::{Frame, Point, ScreenshotMeta};

fn jpeg_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_fn(256, 192, |x, y| {
        image::Rgb([(x * 7 ^ y * 13) as u8, (x * y) as u8, (x * 31 + y * 17) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}

fn meta(scale_factor: f64) -> ScreenshotMeta {
    ScreenshotMeta {
        monitor_index: 0,
        scale_factor,
        physical_width: 1920,
        physical_height: 1080,
    }
}

/// Serves frames; `None` entries fail the capture.
struct ScriptedFrames {
    frames: Mutex<VecDeque<Option<Vec<u8>>>>,
    scale_factor: f64,
}

impl ScriptedFrames {
    fn new(frames: Vec<Option<Vec<u8>>>) -> Arc<Self> {
        Self::scaled(frames, 1.0)
    }

    fn scaled(frames: Vec<Option<Vec<u8>>>, scale_factor: f64) -> Arc<Self> {
        Arc::new(Self { frames: Mutex::new(frames.into()), scale_factor })
    }
}

#[async_trait]
impl FrameSource for ScriptedFrames {
    async fn capture(&self) -> SeeShotResult<Frame> {
        match self.frames.lock().unwrap().pop_front().flatten() {
            Some(bytes) => Ok(Frame::new(bytes, meta(self.scale_factor), "scripted")),
            None => Err(SeeShotError::Perception("no display".into())),
        }
    }
}

struct ScriptedTargeting {
    replies: Mutex<VecDeque<Option<&'static str>>>,
}

#[async_trait]
impl TargetingModel for ScriptedTargeting {
    async fn locate(&self, _frame: &Frame) -> SeeShotResult<TargetingOutput> {
        let content = self.replies.lock().unwrap().pop_front().flatten();
        Ok(TargetingOutput {
            content: content.map(str::to_string),
            ..Default::default()
        })
    }
}

/// Replies are picked by how many records memory held, so an aborted call
/// does not shift the script.
struct ScriptedAction {
    replies: Vec<Vec<ToolInvocation>>,
    contexts: Mutex<Vec<MemoryContext>>,
}

#[async_trait]
impl ActionModel for ScriptedAction {
    async fn decide(&self, context: &MemoryContext, _frame: &Frame) -> SeeShotResult<ActionOutput> {
        self.contexts.lock().unwrap().push(context.clone());
        let tool_invocations = self.replies.get(context.actions.len()).cloned().unwrap_or_default();
        Ok(ActionOutput {
            tool_invocations,
            ..Default::default()
        })
    }
}

#[derive(Default)]
struct RecordingExecutor {
    log: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl ActionExecutor for RecordingExecutor {
    async fn aim(&self, waypoints: &[Waypoint]) -> SeeShotResult<()> {
        if self.fail {
            return Err(SeeShotError::Executor("input blocked".into()));
        }
        for wp in waypoints {
            self.log.lock().unwrap().push(format!("aim {},{}", wp.x, wp.y));
        }
        Ok(())
    }

    async fn fire(&self, clicks: u32) -> SeeShotResult<()> {
        self.log.lock().unwrap().push(format!("fire {clicks}"));
        Ok(())
    }

    async fn invoke(&self, tool: &ToolInvocation) -> SeeShotResult<()> {
        if self.fail {
            return Err(SeeShotError::Executor("input blocked".into()));
        }
        self.log.lock().unwrap().push(format!("invoke {}", tool.name));
        Ok(())
    }
}

const POINT: Option<&str> = Some("```json\n{\"point\": {\"x\": \"500\", \"y\": \"452\"}}\n```");

struct Harness {
    control: ControlLoop,
    executor: Arc<RecordingExecutor>,
    action: Arc<ScriptedAction>,
    memory: SharedMemory,
}

fn harness(
    frames: Vec<Option<Vec<u8>>>,
    targets: Vec<Option<&'static str>>,
    tools: Vec<Vec<ToolInvocation>>,
    executor: RecordingExecutor,
    capacity: usize,
    limits: LoopConfig,
) -> Harness {
    let action = Arc::new(ScriptedAction {
        replies: tools,
        contexts: Mutex::new(Vec::new()),
    });
    let arbiter = DualModelArbiter::new(
        Arc::new(ScriptedTargeting { replies: Mutex::new(targets.into()) }),
        action.clone(),
        ArbiterConfig::default(),
    );
    let executor = Arc::new(executor);
    let memory = SharedMemory::new(capacity).unwrap();
    let control = ControlLoop::new(
        ScriptedFrames::new(frames),
        arbiter,
        executor.clone(),
        memory.clone(),
        LoopSettings {
            limits,
            aim_multiplier: 1.3,
            fire_clicks: 3,
            compression: CompressionConfig::default(),
            wait_on_start: Duration::ZERO,
        },
    );
    Harness { control, executor, action, memory }
}

fn iterations(n: u32) -> LoopConfig {
    LoopConfig { iterations: n, ..Default::default() }
}

#[tokio::test]
async fn test_loop_aims_dispatches_and_remembers() {
    let frame = jpeg_bytes();
    let mut h = harness(
        vec![Some(frame.clone()), Some(frame.clone()), Some(frame)],
        vec![POINT, Some("None"), None],
        vec![vec![], vec![ToolInvocation::new("jump", json!({}))], vec![]],
        RecordingExecutor::default(),
        2,
        iterations(3),
    );

    let reports = h.control.run().await;

    assert_eq!(
        h.control.state(),
        &LoopState::Done { reason: StopReason::IterationsCompleted }
    );
    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].coords, Some(Point::new(500, 452)));
    assert!(reports[0].tool_calls.is_empty());
    assert_eq!(reports[0].action.as_str(), "Aim & Shoot");
    assert_eq!(reports[1].action.as_str(), "Tool Calls: [jump({})]");
    assert_eq!(reports[2].action.as_str(), "No Action");
    assert!(reports.iter().all(|r| r.error.is_none()));
    assert_eq!(reports.iter().map(|r| r.iteration).collect::<Vec<_>>(), vec![1, 2, 3]);

    assert_eq!(
        *h.executor.log.lock().unwrap(),
        vec!["aim 362,425", "fire 3", "invoke jump"]
    );

    // Capacity 2: only the last two iterations survive.
    assert_eq!(
        h.control.memory().action_view().await,
        vec!["Tool Calls: [jump({})]", "No Action"]
    );

    // The third decision saw the first two iterations.
    let contexts = h.action.contexts.lock().unwrap();
    let last = contexts.last().unwrap();
    assert_eq!(last.actions, vec!["Aim & Shoot", "Tool Calls: [jump({})]"]);
    assert_eq!(last.images.len(), 2);
}

#[tokio::test]
async fn test_remembered_frames_are_smaller() {
    let frame = jpeg_bytes();
    let raw_len = frame.len();
    let mut h = harness(
        vec![Some(frame)],
        vec![None],
        vec![],
        RecordingExecutor::default(),
        3,
        iterations(1),
    );
    h.control.run().await;

    let ctx = h.memory.context().await;
    let ContentPart::ImageUrl { image_url } = &ctx.images[0] else {
        panic!("memory image should be a data url");
    };
    let b64 = image_url.url.trim_start_matches("data:image/jpeg;base64,");
    let stored = base64::engine::general_purpose::STANDARD.decode(b64).unwrap();
    assert!(stored.len() < raw_len);
}

#[tokio::test]
async fn test_capture_failure_skips_iteration() {
    let frame = jpeg_bytes();
    let mut h = harness(
        vec![Some(frame.clone()), None, Some(frame)],
        vec![None, None],
        vec![],
        RecordingExecutor::default(),
        3,
        iterations(3),
    );
    let reports = h.control.run().await;

    assert_eq!(reports.len(), 3);
    assert!(reports[1].error.as_deref().unwrap().contains("no display"));
    assert_eq!(reports[1].action.as_str(), "No Action");
    assert_eq!(h.memory.len().await, 2);
}

#[tokio::test]
async fn test_undecodable_frame_is_remembered_raw() {
    let garbage = b"not an image".to_vec();
    let mut h = harness(
        vec![Some(garbage.clone())],
        vec![None],
        vec![],
        RecordingExecutor::default(),
        3,
        iterations(1),
    );
    h.control.run().await;

    let ctx = h.memory.context().await;
    let expected = format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&garbage)
    );
    assert!(matches!(&ctx.images[0], ContentPart::ImageUrl { image_url } if image_url.url == expected));
}

#[tokio::test]
async fn test_execution_failures_hit_failure_limit() {
    let frame = jpeg_bytes();
    let mut h = harness(
        vec![Some(frame.clone()), Some(frame.clone()), Some(frame.clone()), Some(frame)],
        vec![POINT, POINT, POINT, POINT],
        vec![],
        RecordingExecutor { fail: true, ..Default::default() },
        3,
        LoopConfig {
            iterations: 4,
            max_consecutive_failures: Some(2),
            ..Default::default()
        },
    );
    let mut events = h.control.bus().subscribe();
    let reports = h.control.run().await;

    assert_eq!(reports.len(), 2);
    // The intended action is still recorded.
    assert!(reports.iter().all(|r| r.action.as_str() == "Aim & Shoot" && r.error.is_some()));
    assert_eq!(h.memory.len().await, 2);

    let mut finished = None;
    while let Ok(event) = events.try_recv() {
        if let LoopEvent::Finished { reason, iterations } = event {
            finished = Some((reason, iterations));
        }
    }
    assert_eq!(finished, Some((StopReason::FailureLimit, 2)));
}

#[tokio::test]
async fn test_default_limits_run_every_iteration_despite_failures() {
    let cfg = seeshot_lib::config::parse_config(include_str!("../config.toml")).unwrap();
    let limits = LoopSettings::from_config(&cfg.agent, cfg.compression).limits;
    assert_eq!(limits.max_consecutive_failures, None);

    let frame = jpeg_bytes();
    let mut h = harness(
        vec![Some(frame); 6],
        vec![POINT; 6],
        vec![],
        RecordingExecutor { fail: true, ..Default::default() },
        3,
        LoopConfig { iterations: 6, ..limits },
    );
    let reports = h.control.run().await;

    assert_eq!(reports.len(), 6);
    assert!(reports.iter().all(|r| r.error.is_some()));
    assert_eq!(
        h.control.state(),
        &LoopState::Done { reason: StopReason::IterationsCompleted }
    );
}

#[tokio::test]
async fn test_stop_command_ends_loop_before_next_iteration() {
    let mut h = harness(
        vec![Some(jpeg_bytes())],
        vec![None],
        vec![],
        RecordingExecutor::default(),
        3,
        iterations(5),
    );
    h.control.bus().command_sender().send(LoopCommand::Stop).await.unwrap();
    let reports = h.control.run().await;
    assert!(reports.is_empty());
    assert!(h.executor.log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_aim_uses_logical_coordinates_on_scaled_display() {
    let action = Arc::new(ScriptedAction {
        replies: vec![],
        contexts: Mutex::new(Vec::new()),
    });
    let arbiter = DualModelArbiter::new(
        Arc::new(ScriptedTargeting { replies: Mutex::new(vec![POINT].into()) }),
        action,
        ArbiterConfig::default(),
    );
    let executor = Arc::new(RecordingExecutor::default());
    let mut control = ControlLoop::new(
        ScriptedFrames::scaled(vec![Some(jpeg_bytes())], 2.0),
        arbiter,
        executor.clone(),
        SharedMemory::new(1).unwrap(),
        LoopSettings {
            limits: iterations(1),
            aim_multiplier: 1.3,
            fire_clicks: 1,
            compression: CompressionConfig::default(),
            wait_on_start: Duration::ZERO,
        },
    );

    control.run().await;

    // (362, 425) in captured pixels is (181, 212) at 2x scaling.
    assert_eq!(*executor.log.lock().unwrap(), vec!["aim 181,212", "fire 1"]);
}
