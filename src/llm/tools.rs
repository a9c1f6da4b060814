use crate::errors::{SeeShotError, SeeShotResult};
use crate::llm::types::ToolDef;

/// Loads gameplay tool definitions from the prompts/tools/gameplay.json file.
/// The JSON is embedded at compile time via include_str!.
pub fn load_gameplay_tools() -> SeeShotResult<Vec<ToolDef>> {
    let json = include_str!("../../prompts/tools/gameplay.json");
    serde_json::from_str(json).map_err(|e| SeeShotError::Config(format!("Failed to parse gameplay tools: {e}")))
}
