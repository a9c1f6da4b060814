/// Recorded desktop input.
///
/// Every physical effect the agent has (aiming, firing, gameplay tools) is first
/// recorded as a [`CommandScript`] of plain [`DesktopCommand`] values and then
/// replayed against a [`DesktopTarget`]. Scripts are data: they can be logged,
/// compared in tests and replayed on a blocking thread.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::SeeShotResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyDirection {
    Press,
    Release,
    Click,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DesktopCommand {
    MoveMouse { x: i32, y: i32 },
    /// Relative move, used for turning the view.
    MoveMouseBy { dx: i32, dy: i32 },
    Click { button: MouseButton },
    Key { key: char, direction: KeyDirection },
    Type { text: String },
    Wait { milliseconds: u64 },
}

/// Something that can perform desktop input.
pub trait DesktopTarget {
    fn move_mouse(&mut self, x: i32, y: i32) -> SeeShotResult<()>;
    fn move_mouse_by(&mut self, dx: i32, dy: i32) -> SeeShotResult<()>;
    fn click(&mut self, button: MouseButton) -> SeeShotResult<()>;
    fn key(&mut self, key: char, direction: KeyDirection) -> SeeShotResult<()>;
    fn type_text(&mut self, text: &str) -> SeeShotResult<()>;

    fn wait(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl DesktopCommand {
    pub fn apply(&self, target: &mut dyn DesktopTarget) -> SeeShotResult<()> {
        match self {
            DesktopCommand::MoveMouse { x, y } => target.move_mouse(*x, *y),
            DesktopCommand::MoveMouseBy { dx, dy } => target.move_mouse_by(*dx, *dy),
            DesktopCommand::Click { button } => target.click(*button),
            DesktopCommand::Key { key, direction } => target.key(*key, *direction),
            DesktopCommand::Type { text } => target.type_text(text),
            DesktopCommand::Wait { milliseconds } => {
                target.wait(Duration::from_millis(*milliseconds));
                Ok(())
            }
        }
    }
}

/// Ordered list of commands, built with the recording methods and replayed later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandScript {
    commands: Vec<DesktopCommand>,
}

impl CommandScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: DesktopCommand) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn move_mouse(&mut self, x: i32, y: i32) -> &mut Self {
        self.push(DesktopCommand::MoveMouse { x, y })
    }

    pub fn move_mouse_by(&mut self, dx: i32, dy: i32) -> &mut Self {
        self.push(DesktopCommand::MoveMouseBy { dx, dy })
    }

    pub fn left_click(&mut self) -> &mut Self {
        self.push(DesktopCommand::Click { button: MouseButton::Left })
    }

    pub fn key(&mut self, key: char, direction: KeyDirection) -> &mut Self {
        self.push(DesktopCommand::Key { key, direction })
    }

    /// Hold `key` down for `milliseconds`, then release it.
    pub fn hold_key(&mut self, key: char, milliseconds: u64) -> &mut Self {
        self.key(key, KeyDirection::Press)
            .wait(milliseconds)
            .key(key, KeyDirection::Release)
    }

    pub fn type_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(DesktopCommand::Type { text: text.into() })
    }

    pub fn wait(&mut self, milliseconds: u64) -> &mut Self {
        self.push(DesktopCommand::Wait { milliseconds })
    }

    pub fn commands(&self) -> &[DesktopCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Apply every command in order, stopping at the first failure.
    pub fn replay(&self, target: &mut dyn DesktopTarget) -> SeeShotResult<()> {
        for command in &self.commands {
            command.apply(target)?;
        }
        Ok(())
    }
}
