use crate::peer::types::PeerId;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Ошибки, которые видит оператор (и логи)
#[derive(Debug, Error)]
pub enum SignalError {
    /// Устройство захвата недоступно или доступ запрещён
    #[error("Could not get camera/microphone: {0}")]
    MediaAcquisition(String),

    #[error("Unknown peer {0}")]
    UnknownPeer(PeerId),

    /// Пустое текстовое поле, операция прервана до каких-либо изменений
    #[error("{0}")]
    MissingInput(&'static str),

    /// webrtc-rs отклонил создание или применение description
    #[error("{context}: {reason}")]
    Negotiation {
        context: &'static str,
        reason: String,
    },

    #[error("invalid candidate line {line:?}: {reason}")]
    CandidateParse { line: String, reason: String },

    #[error("invalid ICE server config: {0}")]
    InvalidConfig(String),

    #[error("failed to load config: {0}")]
    Config(String),
}

impl SignalError {
    pub(crate) fn negotiation(context: &'static str, err: impl std::fmt::Display) -> Self {
        SignalError::Negotiation {
            context,
            reason: err.to_string(),
        }
    }
}

// Tauri отдаёт ошибку команды во фронт как строку для alert()
impl Serialize for SignalError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SignalError>;
