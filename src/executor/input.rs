// Physical input simulation through enigo.
use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use crate::errors::{SeeShotError, SeeShotResult};
use crate::executor::commands::{DesktopTarget, KeyDirection, MouseButton};

/// Opens a fresh input session. Called on the blocking thread that replays a
/// script, so the session itself never crosses threads.
pub trait DesktopConnector: Send + Sync {
    fn connect(&self) -> SeeShotResult<Box<dyn DesktopTarget>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EnigoConnector;

impl DesktopConnector for EnigoConnector {
    fn connect(&self) -> SeeShotResult<Box<dyn DesktopTarget>> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| SeeShotError::Executor(format!("enigo connect: {e}")))?;
        Ok(Box::new(EnigoDesktop { enigo }))
    }
}

pub struct EnigoDesktop {
    enigo: Enigo,
}

fn input_err(what: &str, e: impl std::fmt::Display) -> SeeShotError {
    SeeShotError::Executor(format!("{what}: {e}"))
}

impl DesktopTarget for EnigoDesktop {
    fn move_mouse(&mut self, x: i32, y: i32) -> SeeShotResult<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| input_err("move mouse", e))
    }

    fn move_mouse_by(&mut self, dx: i32, dy: i32) -> SeeShotResult<()> {
        self.enigo
            .move_mouse(dx, dy, Coordinate::Rel)
            .map_err(|e| input_err("move mouse by", e))
    }

    fn click(&mut self, button: MouseButton) -> SeeShotResult<()> {
        let button = match button {
            MouseButton::Left => Button::Left,
        };
        self.enigo
            .button(button, Direction::Click)
            .map_err(|e| input_err("click", e))
    }

    fn key(&mut self, key: char, direction: KeyDirection) -> SeeShotResult<()> {
        let key = match key {
            ' ' => Key::Space,
            c => Key::Unicode(c),
        };
        let direction = match direction {
            KeyDirection::Press => Direction::Press,
            KeyDirection::Release => Direction::Release,
            KeyDirection::Click => Direction::Click,
        };
        self.enigo.key(key, direction).map_err(|e| input_err("key", e))
    }

    fn type_text(&mut self, text: &str) -> SeeShotResult<()> {
        self.enigo.text(text).map_err(|e| input_err("type text", e))
    }
}
