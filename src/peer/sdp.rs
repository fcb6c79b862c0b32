use crate::error::{Result, SignalError};
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Текст из поля "Remote SDP" → description.
/// Формат совпадает с `JSON.stringify(pc.localDescription)` в браузере.
pub fn parse_description(text: &str, context: &'static str) -> Result<RTCSessionDescription> {
    serde_json::from_str::<RTCSessionDescription>(text.trim())
        .map_err(|e| SignalError::negotiation(context, format!("invalid description JSON: {e}")))
}

pub fn serialize_description(
    desc: &RTCSessionDescription,
    context: &'static str,
) -> Result<String> {
    serde_json::to_string(desc).map_err(|e| SignalError::negotiation(context, e))
}

/// Структурное сравнение (поле `parsed` внутри webrtc-rs не участвует)
pub fn same_description(a: &RTCSessionDescription, b: &RTCSessionDescription) -> bool {
    a.sdp_type == b.sdp_type && a.sdp == b.sdp
}
