//! Офлайн-двойники для тестов и демо без сети.
//!
//! `LoopbackFactory` выдаёт peer connection, которые ведут себя как
//! webrtc-rs в упрощённом виде: после local description "собирают" два
//! host-кандидата и null-кандидат, а после remote description и хотя бы
//! одного удалённого кандидата переходят в `connected`.

use crate::error::{Result, SignalError};
use crate::media::{LocalMedia, MediaState};
use crate::peer::handle::{HandleFactory, PeerHandle};
use crate::peer::ice::serialize_candidate;
use crate::peer::types::{
    MediaKind, PeerEvent, PeerEventSender, PeerId, RemoteStream, ServerConfig,
};
use crate::presenter::{PeerSnapshot, Presenter};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

static SDP_VERSION: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
struct LoopbackState {
    local: Option<RTCSessionDescription>,
    remote: Option<RTCSessionDescription>,
    remote_candidates: Vec<RTCIceCandidateInit>,
    end_of_candidates: bool,
    gathered: bool,
    connected: bool,
    closed: bool,
}

pub struct LoopbackHandle {
    peer: PeerId,
    ice_servers: Vec<ServerConfig>,
    local_stream: Option<String>,
    fail_offers: bool,
    events: PeerEventSender,
    state: Mutex<LoopbackState>,
}

impl LoopbackHandle {
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn ice_servers(&self) -> &[ServerConfig] {
        &self.ice_servers
    }

    pub fn local_stream(&self) -> Option<&str> {
        self.local_stream.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    pub fn remote_candidates(&self) -> Vec<RTCIceCandidateInit> {
        lock(&self.state).remote_candidates.clone()
    }

    pub fn end_of_candidates(&self) -> bool {
        lock(&self.state).end_of_candidates
    }

    pub fn remote_description(&self) -> Option<RTCSessionDescription> {
        lock(&self.state).remote.clone()
    }

    /// Приёмник событий сессии уже отпущен (поток событий остановлен)
    pub fn events_closed(&self) -> bool {
        self.events.is_closed()
    }

    fn emit(&self, event: PeerEvent) {
        let _ = self.events.send(event);
    }

    fn describe(&self, sdp_type: RTCSdpType) -> RTCSessionDescription {
        let version = SDP_VERSION.fetch_add(1, Ordering::SeqCst);
        let mut sdp = format!(
            "v=0\r\no=- {version} 2 IN IP4 127.0.0.1\r\ns=loopback {}\r\nt=0 0\r\n",
            self.peer
        );
        if let Some(stream) = &self.local_stream {
            sdp.push_str(&format!("a=msid-semantic: WMS {stream}\r\n"));
        }

        let mut desc = RTCSessionDescription::default();
        desc.sdp_type = sdp_type;
        desc.sdp = sdp;
        desc
    }

    fn host_candidate(&self, n: u16) -> RTCIceCandidateInit {
        RTCIceCandidateInit {
            candidate: format!(
                "candidate:{n} 1 udp 2130706431 127.0.0.1 {} typ host",
                50000 + n
            ),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
            username_fragment: None,
        }
    }

    fn ensure_open(&self, context: &'static str) -> Result<()> {
        if lock(&self.state).closed {
            return Err(SignalError::negotiation(context, "peer connection is closed"));
        }
        Ok(())
    }

    /// Удалённые потоки из "SDP" собеседника
    fn remote_streams(remote: &RTCSessionDescription) -> Vec<String> {
        remote
            .sdp
            .lines()
            .filter_map(|l| l.strip_prefix("a=msid-semantic: WMS "))
            .map(|s| s.trim().to_owned())
            .collect()
    }
}

#[async_trait]
impl PeerHandle for LoopbackHandle {
    async fn create_offer(&self) -> Result<RTCSessionDescription> {
        self.ensure_open("Offer error")?;
        if self.fail_offers {
            return Err(SignalError::negotiation("Offer error", "offer rejected by loopback"));
        }
        Ok(self.describe(RTCSdpType::Offer))
    }

    async fn create_answer(&self) -> Result<RTCSessionDescription> {
        self.ensure_open("Answer error")?;
        let has_offer = matches!(
            lock(&self.state).remote.as_ref().map(|d| d.sdp_type),
            Some(RTCSdpType::Offer)
        );
        if !has_offer {
            return Err(SignalError::negotiation("Answer error", "no remote offer"));
        }
        Ok(self.describe(RTCSdpType::Answer))
    }

    async fn set_local_description(&self, desc: RTCSessionDescription) -> Result<()> {
        self.ensure_open("Error setting local description")?;
        let first_gathering = {
            let mut state = lock(&self.state);
            state.local = Some(desc);
            !std::mem::replace(&mut state.gathered, true)
        };

        if first_gathering {
            for n in 1..=2 {
                let line = serialize_candidate(&self.host_candidate(n))?;
                self.emit(PeerEvent::LocalCandidate(line));
            }
            self.emit(PeerEvent::GatheringComplete);
        }
        Ok(())
    }

    async fn set_remote_description(&self, desc: RTCSessionDescription) -> Result<()> {
        self.ensure_open("Error setting remote description")?;
        if !desc.sdp.starts_with("v=0") {
            return Err(SignalError::negotiation(
                "Error setting remote description",
                "SdpInvalidSyntax",
            ));
        }

        let mut state = lock(&self.state);
        let local_type = state.local.as_ref().map(|d| d.sdp_type);
        match (local_type, desc.sdp_type) {
            (Some(RTCSdpType::Offer), RTCSdpType::Answer) | (None, RTCSdpType::Offer) => {}
            (local, remote) => {
                return Err(SignalError::negotiation(
                    "Error setting remote description",
                    format!("invalid state change: local {local:?}, remote {remote}"),
                ));
            }
        }
        state.remote = Some(desc);
        Ok(())
    }

    async fn local_description(&self) -> Option<RTCSessionDescription> {
        lock(&self.state).local.clone()
    }

    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<()> {
        self.ensure_open("Error adding ICE candidate")?;
        let (connect, streams) = {
            let mut state = lock(&self.state);
            let Some(remote) = state.remote.clone() else {
                return Err(SignalError::negotiation(
                    "Error adding ICE candidate",
                    "remote description not set",
                ));
            };

            if candidate.candidate.trim().is_empty() {
                state.end_of_candidates = true;
                return Ok(());
            }

            state.remote_candidates.push(candidate);
            let connect = !state.connected && state.local.is_some();
            if connect {
                state.connected = true;
            }
            (connect, Self::remote_streams(&remote))
        };

        if connect {
            self.emit(PeerEvent::ConnectionState("connecting".into()));
            self.emit(PeerEvent::ConnectionState("connected".into()));
            for stream in streams {
                for kind in [MediaKind::Audio, MediaKind::Video] {
                    self.emit(PeerEvent::RemoteTrack(RemoteStream {
                        stream_id: stream.clone(),
                        track_id: format!("{stream}-{kind:?}").to_lowercase(),
                        kind,
                    }));
                }
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let was_open = !std::mem::replace(&mut lock(&self.state).closed, true);
        if was_open {
            self.emit(PeerEvent::ConnectionState("closed".into()));
        }
        Ok(())
    }
}

/// Фабрика loopback peer connection; запоминает всё, что открыла
#[derive(Default)]
pub struct LoopbackFactory {
    fail_offers: bool,
    handles: Mutex<Vec<Arc<LoopbackHandle>>>,
}

impl LoopbackFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Каждый create_offer завершается ошибкой
    pub fn failing_offers() -> Self {
        Self {
            fail_offers: true,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        lock(&self.handles).len()
    }

    pub fn handle(&self, peer: &PeerId) -> Option<Arc<LoopbackHandle>> {
        lock(&self.handles)
            .iter()
            .find(|h| &h.peer == peer)
            .cloned()
    }
}

#[async_trait]
impl HandleFactory for LoopbackFactory {
    async fn open(
        &self,
        peer: &PeerId,
        ice_servers: &[ServerConfig],
        local_media: Option<LocalMedia>,
        events: PeerEventSender,
    ) -> Result<Arc<dyn PeerHandle>> {
        // отдаём управление, как настоящий new_peer_connection
        tokio::task::yield_now().await;

        let handle = Arc::new(LoopbackHandle {
            peer: peer.clone(),
            ice_servers: ice_servers.to_vec(),
            local_stream: local_media.map(|m| m.stream_id().to_owned()),
            fail_offers: self.fail_offers,
            events,
            state: Mutex::new(LoopbackState::default()),
        });
        lock(&self.handles).push(Arc::clone(&handle));
        Ok(handle)
    }
}

#[derive(Debug, Clone)]
pub enum PresenterEvent {
    Added(PeerSnapshot),
    Updated(PeerSnapshot),
    Removed(PeerId),
    Media(MediaState),
    Notice(Option<PeerId>, String),
}

/// Presenter, который просто записывает вызовы
#[derive(Default)]
pub struct RecordingPresenter {
    events: Mutex<Vec<PresenterEvent>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PresenterEvent> {
        lock(&self.events).clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PresenterEvent::Notice(_, msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    pub fn removed(&self) -> Vec<PeerId> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PresenterEvent::Removed(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn last_media_state(&self) -> Option<MediaState> {
        self.events().into_iter().rev().find_map(|e| match e {
            PresenterEvent::Media(state) => Some(state),
            _ => None,
        })
    }

    fn push(&self, event: PresenterEvent) {
        lock(&self.events).push(event);
    }
}

impl Presenter for RecordingPresenter {
    fn peer_added(&self, peer: &PeerSnapshot) {
        self.push(PresenterEvent::Added(peer.clone()));
    }

    fn peer_updated(&self, peer: &PeerSnapshot) {
        self.push(PresenterEvent::Updated(peer.clone()));
    }

    fn peer_removed(&self, id: &PeerId) {
        self.push(PresenterEvent::Removed(id.clone()));
    }

    fn media_changed(&self, state: &MediaState) {
        self.push(PresenterEvent::Media(state.clone()));
    }

    fn notify(&self, peer: Option<&PeerId>, message: &str) {
        self.push(PresenterEvent::Notice(peer.cloned(), message.to_owned()));
    }
}

/// Ждёт, пока условие станет истинным (события приходят асинхронно)
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
