// Action execution: aim, fire and gameplay tool dispatch.
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::SideProfile;
use crate::errors::{SeeShotError, SeeShotResult};
use crate::executor::aim::Waypoint;
use crate::executor::commands::{CommandScript, KeyDirection};
use crate::executor::input::DesktopConnector;
use crate::llm::types::ToolInvocation;

/// Longest key hold / wait a single tool call may request.
const MAX_TOOL_DURATION_MS: u64 = 5_000;

/// Performs the agent's physical effects.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Move the pointer through each waypoint in order.
    async fn aim(&self, waypoints: &[Waypoint]) -> SeeShotResult<()>;
    /// Press the fire button `clicks` times.
    async fn fire(&self, clicks: u32) -> SeeShotResult<()>;
    /// Perform the effect named by a gameplay tool call.
    async fn invoke(&self, tool: &ToolInvocation) -> SeeShotResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    Forward,
    Backward,
    Left,
    Right,
}

impl MoveDirection {
    fn key(self) -> char {
        match self {
            MoveDirection::Forward => 'w',
            MoveDirection::Backward => 's',
            MoveDirection::Left => 'a',
            MoveDirection::Right => 'd',
        }
    }
}

fn default_move_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize)]
struct MoveArgs {
    direction: MoveDirection,
    #[serde(default = "default_move_ms")]
    duration_ms: u64,
}

#[derive(Debug, Deserialize)]
struct TurnArgs {
    dx: i32,
    #[serde(default)]
    dy: i32,
}

#[derive(Debug, Deserialize)]
struct WaitArgs {
    milliseconds: u64,
}

/// Gameplay tools the model may call; see `prompts/tools/gameplay.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameplayTool {
    Move { direction: MoveDirection, duration_ms: u64 },
    Turn { dx: i32, dy: i32 },
    Jump,
    Reload,
    Wait { milliseconds: u64 },
}

impl GameplayTool {
    /// Returns `Ok(None)` for tool names this agent does not know.
    pub fn from_invocation(tool: &ToolInvocation) -> SeeShotResult<Option<Self>> {
        let args = tool.arguments.clone();
        let bad_args = |e: serde_json::Error| {
            SeeShotError::Executor(format!("invalid arguments for '{}': {e}", tool.name))
        };
        let parsed = match tool.name.as_str() {
            "move" => {
                let a: MoveArgs = serde_json::from_value(args).map_err(bad_args)?;
                GameplayTool::Move {
                    direction: a.direction,
                    duration_ms: a.duration_ms.min(MAX_TOOL_DURATION_MS),
                }
            }
            "turn" => {
                let a: TurnArgs = serde_json::from_value(args).map_err(bad_args)?;
                GameplayTool::Turn { dx: a.dx, dy: a.dy }
            }
            "jump" => GameplayTool::Jump,
            "reload" => GameplayTool::Reload,
            "wait" => {
                let a: WaitArgs = serde_json::from_value(args).map_err(bad_args)?;
                GameplayTool::Wait {
                    milliseconds: a.milliseconds.min(MAX_TOOL_DURATION_MS),
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(parsed))
    }

    pub fn script(&self) -> CommandScript {
        let mut script = CommandScript::new();
        match *self {
            GameplayTool::Move { direction, duration_ms } => {
                script.hold_key(direction.key(), duration_ms);
            }
            GameplayTool::Turn { dx, dy } => {
                script.move_mouse_by(dx, dy);
            }
            GameplayTool::Jump => {
                script.key(' ', KeyDirection::Click);
            }
            GameplayTool::Reload => {
                script.key('r', KeyDirection::Click);
            }
            GameplayTool::Wait { milliseconds } => {
                script.wait(milliseconds);
            }
        }
        script
    }
}

/// Builds the pointer script for an aim gesture.
pub fn aim_script(waypoints: &[Waypoint]) -> CommandScript {
    let mut script = CommandScript::new();
    for wp in waypoints {
        script.move_mouse(wp.x, wp.y);
    }
    script
}

/// Builds the click burst used to fire.
pub fn fire_script(clicks: u32, interval_ms: u64) -> CommandScript {
    let mut script = CommandScript::new();
    for i in 0..clicks {
        if i > 0 {
            script.wait(interval_ms);
        }
        script.left_click();
    }
    script
}

/// Menu keystrokes that pick the side's team, then its skin.
pub fn join_team_script(profile: &SideProfile) -> CommandScript {
    let mut script = CommandScript::new();
    script
        .type_text(profile.team_choice)
        .wait(1_000)
        .type_text(profile.skin_choice);
    script
}

/// Replays command scripts against a real desktop on a blocking thread.
pub struct DesktopExecutor {
    connector: Arc<dyn DesktopConnector>,
    click_interval_ms: u64,
}

impl DesktopExecutor {
    pub fn new(connector: Arc<dyn DesktopConnector>, click_interval_ms: u64) -> Self {
        Self {
            connector,
            click_interval_ms,
        }
    }

    pub async fn join_team(&self, profile: &SideProfile) -> SeeShotResult<()> {
        tracing::info!(side = ?profile.side, "joining team");
        self.run(join_team_script(profile)).await
    }

    async fn run(&self, script: CommandScript) -> SeeShotResult<()> {
        if script.is_empty() {
            return Ok(());
        }
        let connector = self.connector.clone();
        tokio::task::spawn_blocking(move || {
            let mut target = connector.connect()?;
            script.replay(target.as_mut())
        })
        .await
        .map_err(|e| SeeShotError::Executor(format!("input join: {e}")))?
    }
}

#[async_trait]
impl ActionExecutor for DesktopExecutor {
    async fn aim(&self, waypoints: &[Waypoint]) -> SeeShotResult<()> {
        tracing::debug!(?waypoints, "aiming");
        self.run(aim_script(waypoints)).await
    }

    async fn fire(&self, clicks: u32) -> SeeShotResult<()> {
        tracing::debug!(clicks, "firing");
        self.run(fire_script(clicks, self.click_interval_ms)).await
    }

    async fn invoke(&self, tool: &ToolInvocation) -> SeeShotResult<()> {
        match GameplayTool::from_invocation(tool)? {
            Some(parsed) => {
                tracing::info!(tool = %tool, "executing gameplay tool");
                self.run(parsed.script()).await
            }
            None => {
                tracing::warn!(tool = %tool.name, "model hallucinated a tool that is not defined, skipping");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::commands::{DesktopCommand, DesktopTarget, MouseButton};
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    struct SharedLogTarget(Arc<Mutex<Vec<String>>>);

    impl DesktopTarget for SharedLogTarget {
        fn move_mouse(&mut self, x: i32, y: i32) -> SeeShotResult<()> {
            self.0.lock().unwrap().push(format!("move {x},{y}"));
            Ok(())
        }
        fn move_mouse_by(&mut self, dx: i32, dy: i32) -> SeeShotResult<()> {
            self.0.lock().unwrap().push(format!("move_by {dx},{dy}"));
            Ok(())
        }
        fn click(&mut self, button: MouseButton) -> SeeShotResult<()> {
            self.0.lock().unwrap().push(format!("click {button:?}"));
            Ok(())
        }
        fn key(&mut self, key: char, direction: KeyDirection) -> SeeShotResult<()> {
            self.0.lock().unwrap().push(format!("key {key} {direction:?}"));
            Ok(())
        }
        fn type_text(&mut self, text: &str) -> SeeShotResult<()> {
            self.0.lock().unwrap().push(format!("type {text}"));
            Ok(())
        }
        fn wait(&mut self, duration: Duration) {
            self.0.lock().unwrap().push(format!("wait {}", duration.as_millis()));
        }
    }

    struct SharedLogConnector(Arc<Mutex<Vec<String>>>);

    impl DesktopConnector for SharedLogConnector {
        fn connect(&self) -> SeeShotResult<Box<dyn DesktopTarget>> {
            Ok(Box::new(SharedLogTarget(self.0.clone())))
        }
    }

    fn executor() -> (DesktopExecutor, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let exec = DesktopExecutor::new(Arc::new(SharedLogConnector(log.clone())), 200);
        (exec, log)
    }

    #[test]
    fn test_fire_script_spaces_clicks() {
        let script = fire_script(3, 200);
        assert_eq!(
            script.commands(),
            &[
                DesktopCommand::Click { button: MouseButton::Left },
                DesktopCommand::Wait { milliseconds: 200 },
                DesktopCommand::Click { button: MouseButton::Left },
                DesktopCommand::Wait { milliseconds: 200 },
                DesktopCommand::Click { button: MouseButton::Left },
            ]
        );
    }

    #[tokio::test]
    async fn test_join_team_types_menu_choices() {
        let (exec, log) = executor();
        exec.join_team(&crate::config::Side::Terrorist.profile()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["type 1", "wait 1000", "type 4"]);
    }

    #[test]
    fn test_parse_gameplay_tools() {
        let mv = ToolInvocation::new("move", json!({"direction": "left", "duration_ms": 60000}));
        assert_eq!(
            GameplayTool::from_invocation(&mv).unwrap(),
            Some(GameplayTool::Move { direction: MoveDirection::Left, duration_ms: MAX_TOOL_DURATION_MS })
        );
        let turn = ToolInvocation::new("turn", json!({"dx": -40}));
        assert_eq!(
            GameplayTool::from_invocation(&turn).unwrap(),
            Some(GameplayTool::Turn { dx: -40, dy: 0 })
        );
        let unknown = ToolInvocation::new("teleport", json!({}));
        assert_eq!(GameplayTool::from_invocation(&unknown).unwrap(), None);
    }

    #[test]
    fn test_bad_arguments_are_an_error() {
        let mv = ToolInvocation::new("move", json!({"direction": "up"}));
        assert!(matches!(GameplayTool::from_invocation(&mv), Err(SeeShotError::Executor(_))));
    }

    #[tokio::test]
    async fn test_executor_replays_aim_then_fire() {
        let (exec, log) = executor();
        exec.aim(&[Waypoint { x: 1920, y: 540 }, Waypoint { x: 1222, y: 540 }])
            .await
            .unwrap();
        exec.fire(2).await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["move 1920,540", "move 1222,540", "click Left", "wait 200", "click Left"]
        );
    }

    #[tokio::test]
    async fn test_executor_skips_unknown_tools() {
        let (exec, log) = executor();
        exec.invoke(&ToolInvocation::new("fly", json!({}))).await.unwrap();
        exec.invoke(&ToolInvocation::new("move", json!({"direction": "forward", "duration_ms": 300})))
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["key w Press", "wait 300", "key w Release"]);
    }
}
