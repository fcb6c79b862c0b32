use crate::media::MediaState;
use crate::peer::types::PeerId;
use crate::presenter::{PeerSnapshot, Presenter};
use serde::Serialize;
use tauri::{AppHandle, Emitter};
use tracing::{debug, warn};

pub const PEER_ADDED: &str = "mrtc-peer-added";
pub const PEER_UPDATED: &str = "mrtc-peer-updated";
pub const PEER_REMOVED: &str = "mrtc-peer-removed";
pub const MEDIA_STATE: &str = "mrtc-media-state";
pub const NOTICE: &str = "mrtc-notice";

#[derive(Serialize, Clone)]
struct Notice<'a> {
    peer: Option<&'a PeerId>,
    message: &'a str,
}

/// Отправляет изменения во webview событиями Tauri
pub struct TauriPresenter {
    app: AppHandle,
}

impl TauriPresenter {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }

    fn emit<S: Serialize + Clone>(&self, evt: &str, payload: S) {
        match self.app.emit(evt, payload) {
            Ok(_) => debug!("emitted event: {}", evt),
            Err(e) => warn!("Failed to emit event {}: {:?}", evt, e),
        }
    }
}

impl Presenter for TauriPresenter {
    fn peer_added(&self, peer: &PeerSnapshot) {
        self.emit(PEER_ADDED, peer);
    }

    fn peer_updated(&self, peer: &PeerSnapshot) {
        self.emit(PEER_UPDATED, peer);
    }

    fn peer_removed(&self, id: &PeerId) {
        self.emit(PEER_REMOVED, id);
    }

    fn media_changed(&self, state: &MediaState) {
        self.emit(MEDIA_STATE, state);
    }

    fn notify(&self, peer: Option<&PeerId>, message: &str) {
        self.emit(NOTICE, Notice { peer, message });
    }
}
