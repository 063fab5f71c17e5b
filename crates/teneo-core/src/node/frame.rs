//! JSON frames exchanged with the node service.

use serde::{Deserialize, Serialize};

/// Frames the client sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum OutboundFrame {
    /// Liveness signal: `{"type":"PING"}`.
    Ping,
}

impl OutboundFrame {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frames the server pushes. Only the points update has a known shape;
/// anything else is kept as raw JSON and ignored by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Points { total: u64, today: u64 },
    Unrecognized(serde_json::Value),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Wire {
    Points {
        #[serde(rename = "pointsTotal")]
        points_total: f64,
        #[serde(rename = "pointsToday")]
        points_today: f64,
    },
    Other(serde_json::Value),
}

impl InboundMessage {
    /// Decode a text frame. Fails only when the text is not JSON.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        Ok(match serde_json::from_str::<Wire>(text)? {
            Wire::Points {
                points_total,
                points_today,
            } if points_total >= 0.0 && points_today >= 0.0 => InboundMessage::Points {
                total: points_total as u64,
                today: points_today as u64,
            },
            Wire::Points {
                points_total,
                points_today,
            } => InboundMessage::Unrecognized(serde_json::json!({
                "pointsTotal": points_total,
                "pointsToday": points_today,
            })),
            Wire::Other(value) => InboundMessage::Unrecognized(value),
        })
    }
}
