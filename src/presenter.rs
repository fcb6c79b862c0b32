use crate::media::MediaState;
use crate::peer::types::PeerId;
use crate::registry::{PeerView, Session};
use serde::Serialize;
use tracing::info;

/// Всё, что нужно UI для перерисовки блока участника
#[derive(Serialize, Debug, Clone)]
pub struct PeerSnapshot {
    pub id: PeerId,
    pub name: String,
    #[serde(flatten)]
    pub view: PeerView,
}

impl From<&Session> for PeerSnapshot {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id().clone(),
            name: session.name().to_owned(),
            view: session.view.clone(),
        }
    }
}

/// Выходная сторона UI: сюда координатор сообщает об изменениях
pub trait Presenter: Send + Sync {
    fn peer_added(&self, peer: &PeerSnapshot);
    fn peer_updated(&self, peer: &PeerSnapshot);
    fn peer_removed(&self, id: &PeerId);
    fn media_changed(&self, state: &MediaState);
    /// Блокирующее уведомление оператора (alert)
    fn notify(&self, peer: Option<&PeerId>, message: &str);
}

/// Без UI: только логи
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn peer_added(&self, peer: &PeerSnapshot) {
        info!(peer = %peer.id, "peer added");
    }

    fn peer_updated(&self, peer: &PeerSnapshot) {
        info!(peer = %peer.id, status = %peer.view.status, "peer updated");
    }

    fn peer_removed(&self, id: &PeerId) {
        info!(peer = %id, "peer removed");
    }

    fn media_changed(&self, state: &MediaState) {
        info!(active = state.active, "media state changed");
    }

    fn notify(&self, peer: Option<&PeerId>, message: &str) {
        info!(peer = ?peer.map(PeerId::as_str), "{message}");
    }
}
