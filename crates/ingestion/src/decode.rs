//! 单行 JSON 解码

use contracts::Sample;
use serde::Deserialize;

use crate::error::{IngestionError, Result};

/// 线上格式：恰好四个字段
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireSample {
    timestamp: i64,
    x: f64,
    y: f64,
    z: f64,
}

/// Decode one line into a [`Sample`].
///
/// The line must be a JSON object with exactly `timestamp` (integer) and
/// `x`, `y`, `z` (numbers). Anything else is a decode error.
pub fn decode_line(line: &str) -> Result<Sample> {
    let wire: WireSample =
        serde_json::from_str(line).map_err(|e| IngestionError::decode(e.to_string(), line))?;
    Ok(Sample::new(wire.timestamp, wire.x, wire.y, wire.z))
}
