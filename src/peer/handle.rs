use crate::error::Result;
use crate::media::LocalMedia;
use crate::peer::types::{PeerEventSender, PeerId, ServerConfig};
use async_trait::async_trait;
use std::sync::Arc;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Peer connection одной сессии
#[async_trait]
pub trait PeerHandle: Send + Sync {
    async fn create_offer(&self) -> Result<RTCSessionDescription>;
    async fn create_answer(&self) -> Result<RTCSessionDescription>;
    async fn set_local_description(&self, desc: RTCSessionDescription) -> Result<()>;
    async fn set_remote_description(&self, desc: RTCSessionDescription) -> Result<()>;
    /// Текущий local description (с уже собранными кандидатами, если есть)
    async fn local_description(&self) -> Option<RTCSessionDescription>;
    /// Пустой `candidate` означает конец кандидатов
    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

/// Создаёт peer connection и подписывает его наблюдателей на канал `events`
#[async_trait]
pub trait HandleFactory: Send + Sync {
    async fn open(
        &self,
        peer: &PeerId,
        ice_servers: &[ServerConfig],
        local_media: Option<LocalMedia>,
        events: PeerEventSender,
    ) -> Result<Arc<dyn PeerHandle>>;
}
