use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Идентификатор участника: метка оператора + случайный суффикс
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        PeerId(s.to_owned())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        PeerId(s)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Конфигурация ICE сервера
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub id: String,
    pub r#type: String, // 'stun' or 'turn'
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

/// Удалённый поток, привязанный к "экрану" участника
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub stream_id: String,
    pub track_id: String,
    pub kind: MediaKind,
}

/// События от webrtc-rs, доставляемые в сессию через канал
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    RemoteTrack(RemoteStream),
    /// JSON-строка RTCIceCandidateInit
    LocalCandidate(String),
    /// null-кандидат: сбор окончен
    GatheringComplete,
    /// сырое имя состояния соединения ("connected", "failed", ...)
    ConnectionState(String),
}

pub type PeerEventSender = mpsc::UnboundedSender<PeerEvent>;
pub type PeerEventReceiver = mpsc::UnboundedReceiver<PeerEvent>;
