//! System prompts for the two decision roles.

/// Shape the aiming model is asked to answer with.
pub const EXAMPLE_AIM_RESPONSE: &str = r#"{"point": {"x": "500", "y": "452"}}"#;

pub const CT_AIMING_PROMPT: &str = r#"As an intelligent robot, your job is to locate the nearest person. Locate the middle of his body. Output JSON containing the point.
Important: Don't provide any reasoning, only JSON.
Important: If no standing person detected return None.
Example:

Q: <provided gameplay image>
A: {"point": {"x": "500", "y": "452"}}"#;

pub const T_AIMING_PROMPT: &str = r#"As an intelligent robot, your job is to locate the nearest person. Locate the middle of his body. Output JSON containing the point.
Important: Don't provide any reasoning, only JSON.
Important: If no standing person detected return None.
Example:

Q: <provided gameplay image>
A: {"point": {"x": "500", "y": "452"}}"#;

pub const GAMEPLAY_SYSTEM_PROMPT: &str = "Output only a function call, nothing else.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::target::parse_point;
    use crate::perception::types::Point;

    #[test]
    fn test_prompts_embed_parseable_example() {
        assert_eq!(parse_point(Some(EXAMPLE_AIM_RESPONSE)), Some(Point::new(500, 452)));
        for prompt in [CT_AIMING_PROMPT, T_AIMING_PROMPT] {
            assert!(prompt.contains(EXAMPLE_AIM_RESPONSE));
        }
    }
}
