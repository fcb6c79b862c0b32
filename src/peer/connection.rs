use crate::error::{Result, SignalError};
use crate::logger::{dump_candidate, dump_selected_pair};
use crate::media::LocalMedia;
use crate::peer::handle::{HandleFactory, PeerHandle};
use crate::peer::ice::serialize_candidate;
use crate::peer::types::{
    MediaKind, PeerEvent, PeerEventSender, PeerId, RemoteStream, ServerConfig,
};
use crate::utils::add_ice_url_scheme;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_remote::TrackRemote;

/// Фабрика настоящих peer connection на webrtc-rs
#[derive(Default)]
pub struct WebRtcFactory;

impl WebRtcFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HandleFactory for WebRtcFactory {
    async fn open(
        &self,
        peer: &PeerId,
        ice_servers: &[ServerConfig],
        local_media: Option<LocalMedia>,
        events: PeerEventSender,
    ) -> Result<Arc<dyn PeerHandle>> {
        let pc = new_peer(peer, ice_servers, local_media, events).await?;
        Ok(Arc::new(WebRtcHandle {
            peer: peer.clone(),
            pc,
        }))
    }
}

fn build_api() -> Result<API> {
    let mut media_engine = MediaEngine::default();
    media_engine
        .register_default_codecs()
        .map_err(|e| SignalError::negotiation("Peer setup", e))?;
    let registry = register_default_interceptors(Registry::new(), &mut media_engine)
        .map_err(|e| SignalError::negotiation("Peer setup", e))?;

    Ok(APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build())
}

/// создаём Peer: локальные треки + наблюдатели, которые пишут в канал сессии
pub async fn new_peer(
    peer: &PeerId,
    ice_servers: &[ServerConfig],
    local_media: Option<LocalMedia>,
    events: PeerEventSender,
) -> Result<Arc<RTCPeerConnection>> {
    let api = build_api()?;
    let pc = Arc::new(
        api.new_peer_connection(rtc_config(ice_servers))
            .await
            .map_err(|e| SignalError::negotiation("Peer setup", e))?,
    );
    info!(%peer, servers = ice_servers.len(), "peer connection created");

    let attached = attach_media(&pc, local_media.as_ref()).await;
    close_on_error(peer, &pc, attached).await?;

    let track_events = events.clone();
    let track_peer = peer.clone();
    pc.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
        let remote = RemoteStream {
            stream_id: track.stream_id(),
            track_id: track.id(),
            kind: match track.kind() {
                RTPCodecType::Audio => MediaKind::Audio,
                _ => MediaKind::Video,
            },
        };
        debug!(peer = %track_peer, ?remote, "ontrack");
        let _ = track_events.send(PeerEvent::RemoteTrack(remote));

        // отдельная задача: обработчик on_track держит mutex, пока future не завершится
        let reader_peer = track_peer.clone();
        tokio::spawn(async move {
            let mut packets = 0u64;
            while track.read_rtp().await.is_ok() {
                packets += 1;
            }
            debug!(peer = %reader_peer, packets, "remote track ended");
        });
        Box::pin(async {})
    }));

    // Обработчик для сбора локальных кандидатов
    let ice_events = events.clone();
    let ice_peer = peer.clone();
    pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
        match cand {
            Some(c) => {
                dump_candidate(ice_peer.as_str(), &c);
                match c.to_json().map_err(|e| e.to_string()).and_then(|init| {
                    serialize_candidate(&init).map_err(|e| e.to_string())
                }) {
                    Ok(line) => {
                        let _ = ice_events.send(PeerEvent::LocalCandidate(line));
                    }
                    Err(e) => warn!(peer = %ice_peer, "failed to serialize local candidate: {e}"),
                }
            }
            None => {
                // cand == None означает конец сбора
                debug!(peer = %ice_peer, "ICE candidate gathering completed (null candidate received)");
                let _ = ice_events.send(PeerEvent::GatheringComplete);
            }
        }
        Box::pin(async {})
    }));

    let pc_stats = Arc::downgrade(&pc);
    let state_peer = peer.clone();
    pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
        info!(peer = %state_peer, "Peer connection state changed to: {st}");
        let _ = events.send(PeerEvent::ConnectionState(st.to_string()));

        if st == RTCPeerConnectionState::Failed {
            if let Some(pc) = pc_stats.upgrade() {
                let peer = state_peer.clone();
                tokio::spawn(async move {
                    dump_selected_pair(peer.as_str(), &pc, "BEFORE-FAIL").await;
                });
            }
        }
        Box::pin(async {})
    }));

    Ok(pc)
}

/// Локальные треки или recvonly-трансиверы, если захвата нет
async fn attach_media(
    pc: &Arc<RTCPeerConnection>,
    local_media: Option<&LocalMedia>,
) -> Result<()> {
    match local_media {
        Some(media) => {
            for track in media.tracks() {
                let sender = pc
                    .add_track(track.rtc_track())
                    .await
                    .map_err(|e| SignalError::negotiation("Peer setup", e))?;

                // RTCP нужно вычитывать, иначе interceptors не работают
                tokio::spawn(async move {
                    let mut rtcp_buf = vec![0u8; 1500];
                    while sender.read(&mut rtcp_buf).await.is_ok() {}
                });
            }
        }
        None => {
            // без локального захвата всё равно хотим принимать медиа
            for kind in [RTPCodecType::Audio, RTPCodecType::Video] {
                pc.add_transceiver_from_kind(
                    kind,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: vec![],
                    }),
                )
                .await
                .map_err(|e| SignalError::negotiation("Peer setup", e))?;
            }
        }
    }
    Ok(())
}

/// Недонастроенный peer connection закрываем сразу, а не бросаем
async fn close_on_error<T>(
    peer: &PeerId,
    pc: &RTCPeerConnection,
    result: Result<T>,
) -> Result<T> {
    if let Err(e) = &result {
        warn!(%peer, "peer setup failed, closing connection: {e}");
        if let Err(close_err) = pc.close().await {
            warn!(%peer, "failed to close peer connection: {close_err}");
        }
    }
    result
}

/// Создает конфигурацию для peer connection
pub fn rtc_config(servers: &[ServerConfig]) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: ice_servers(servers),
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

/// ServerConfig → RTCIceServer (схема добавляется, если её нет)
pub fn ice_servers(servers: &[ServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|config| RTCIceServer {
            urls: vec![add_ice_url_scheme(config)],
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
            ..Default::default()
        })
        .collect()
}

pub struct WebRtcHandle {
    peer: PeerId,
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl PeerHandle for WebRtcHandle {
    async fn create_offer(&self) -> Result<RTCSessionDescription> {
        self.pc
            .create_offer(None)
            .await
            .map_err(|e| SignalError::negotiation("Offer error", e))
    }

    async fn create_answer(&self) -> Result<RTCSessionDescription> {
        self.pc
            .create_answer(None)
            .await
            .map_err(|e| SignalError::negotiation("Answer error", e))
    }

    async fn set_local_description(&self, desc: RTCSessionDescription) -> Result<()> {
        self.pc
            .set_local_description(desc)
            .await
            .map_err(|e| SignalError::negotiation("Error setting local description", e))
    }

    async fn set_remote_description(&self, desc: RTCSessionDescription) -> Result<()> {
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| SignalError::negotiation("Error setting remote description", e))
    }

    async fn local_description(&self) -> Option<RTCSessionDescription> {
        self.pc.local_description().await
    }

    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<()> {
        self.pc
            .add_ice_candidate(candidate)
            .await
            .map_err(|e| SignalError::negotiation("Error adding ICE candidate", e))
    }

    async fn close(&self) -> Result<()> {
        debug!(peer = %self.peer, "closing peer connection");
        self.pc
            .close()
            .await
            .map_err(|e| SignalError::negotiation("Error closing peer connection", e))
    }
}
