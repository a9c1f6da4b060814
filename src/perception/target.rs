/// Parse the aiming model's reply into a target point.
///
/// Expected shape: `{"point": {"x": "500", "y": "452"}}`, optionally wrapped in a
/// markdown code fence. Coordinates may be strings or numbers. Anything else,
/// including an explicit "None", means no target.
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::perception::types::Point;

fn json_object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static regex"))
}

pub fn parse_point(reply: Option<&str>) -> Option<Point> {
    let text = reply.map(str::trim).unwrap_or_default();
    if text.is_empty() || is_none_literal(text) {
        tracing::debug!("aiming model reported no target");
        return None;
    }

    let Some(found) = json_object_re().find(text) else {
        tracing::warn!(reply = %text, "aiming reply holds no JSON object");
        return None;
    };

    let value: Value = match serde_json::from_str(found.as_str()) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, reply = %text, "aiming reply is not valid JSON");
            return None;
        }
    };

    let point = parse_point_value(&value);
    if point.is_none() {
        tracing::warn!(reply = %text, "model did not adhere to the aiming structure");
    }
    point
}

/// Extract `point.x` / `point.y` from an already-decoded reply.
pub fn parse_point_value(value: &Value) -> Option<Point> {
    let point = value.get("point")?;
    let x = coordinate(point.get("x")?)?;
    let y = coordinate(point.get("y")?)?;
    Some(Point::new(x, y))
}

fn coordinate(v: &Value) -> Option<i32> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n.is_finite() && n >= i32::MIN as f64 && n <= i32::MAX as f64 {
        Some(n.trunc() as i32)
    } else {
        None
    }
}

fn is_none_literal(text: &str) -> bool {
    let t = text.trim_matches(|c: char| c == '`' || c == '"' || c == '\'' || c.is_whitespace());
    t.eq_ignore_ascii_case("none") || t.eq_ignore_ascii_case("null")
}
