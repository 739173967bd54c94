//! JSON messages exchanged with the real-time transport.

use serde::{Deserialize, Serialize};

use crate::{FrameAnalysis, LandmarkEntry, MotionError, Result};

/// Message received from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// One camera frame. `landmarks` is absent when the estimator found no
    /// body; `timestamp` is absent when the transport leaves timing to the
    /// engine's clock.
    Frame {
        #[serde(default)]
        timestamp: Option<f64>,
        #[serde(default)]
        landmarks: Option<Vec<LandmarkEntry>>,
    },
    /// Clears repetition and posture state for the session.
    Reset,
}

/// Message sent back to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Analysis(FrameAnalysis),
    ResetConfirmed,
}

/// Parses one client message. Anything that does not decode is reported as
/// [`MotionError::MalformedFrame`].
pub fn decode_client_message(raw: &str) -> Result<ClientMessage> {
    serde_json::from_str(raw).map_err(|err| MotionError::MalformedFrame(err.to_string()))
}

pub fn encode_server_message(message: &ServerMessage) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_frame_and_reset() {
        let frame = decode_client_message(
            r#"{"type":"frame","timestamp":1.5,"landmarks":[{"id":0,"x":0.1,"y":0.2,"z":0.0,"visibility":0.9}]}"#,
        )
        .unwrap();
        match frame {
            ClientMessage::Frame {
                timestamp,
                landmarks,
            } => {
                assert_eq!(timestamp, Some(1.5));
                assert_eq!(landmarks.unwrap().len(), 1);
            }
            other => panic!("unexpected message {other:?}"),
        }

        assert_eq!(
            decode_client_message(r#"{"type":"reset"}"#).unwrap(),
            ClientMessage::Reset
        );
        assert_eq!(
            decode_client_message(r#"{"type":"frame"}"#).unwrap(),
            ClientMessage::Frame {
                timestamp: None,
                landmarks: None,
            }
        );
    }

    #[test]
    fn malformed_input_is_reported() {
        for raw in ["not json", r#"{"type":"wave"}"#, r#"{"type":"frame","landmarks":5}"#] {
            let err = decode_client_message(raw).unwrap_err();
            assert!(matches!(err, MotionError::MalformedFrame(_)), "{raw}");
        }
    }

    #[test]
    fn encodes_tagged_server_messages() {
        let reset = encode_server_message(&ServerMessage::ResetConfirmed).unwrap();
        assert_eq!(reset, r#"{"type":"reset_confirmed"}"#);

        let analysis =
            encode_server_message(&ServerMessage::Analysis(FrameAnalysis::no_pose())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&analysis).unwrap();
        assert_eq!(value, serde_json::json!({ "type": "analysis", "pose_detected": false }));
    }
}
