//! Участники: id → сессия сигналинга.

use crate::error::{Result, SignalError};
use crate::peer::handle::PeerHandle;
use crate::peer::types::{PeerId, RemoteStream};
use crate::utils::make_peer_id;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Строка статуса, которую видит оператор
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerStatus {
    Idle,
    CreatingOffer,
    OfferCreated,
    RemoteOfferSet,
    AnswerCreated,
    RemoteAnswerSet,
    AddedRemoteCandidate,
    RemoteCandidatesComplete,
    LocalCandidateGathered,
    GatheringFinished,
    /// сырое состояние peer connection
    Connection(String),
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerStatus::Idle => f.write_str("idle"),
            PeerStatus::CreatingOffer => f.write_str("creating offer..."),
            PeerStatus::OfferCreated => f.write_str("offer created - share this JSON with remote"),
            PeerStatus::RemoteOfferSet => f.write_str("remote offer set - creating answer..."),
            PeerStatus::AnswerCreated => {
                f.write_str("answer created - send Local SDP (answer) back to initiator")
            }
            PeerStatus::RemoteAnswerSet => f.write_str("remote answer set - awaiting ICE"),
            PeerStatus::AddedRemoteCandidate => f.write_str("added remote ICE"),
            PeerStatus::RemoteCandidatesComplete => f.write_str("remote candidates complete"),
            PeerStatus::LocalCandidateGathered => f.write_str("local ICE candidate gathered"),
            PeerStatus::GatheringFinished => f.write_str("ICE gathering finished"),
            PeerStatus::Connection(state) => f.write_str(state),
        }
    }
}

impl Serialize for PeerStatus {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// Содержимое блока участника в UI
#[derive(Debug, Clone, Serialize)]
pub struct PeerView {
    pub status: PeerStatus,
    pub local_description: String,
    pub remote_description: String,
    /// локальные кандидаты; пишет только поток событий peer connection
    pub candidate_log: String,
    /// кандидаты собеседника, вставленные оператором
    pub remote_candidates: String,
    pub last_local_candidate: Option<String>,
    /// первый пришедший удалённый поток
    pub remote_stream: Option<RemoteStream>,
}

impl Default for PeerView {
    fn default() -> Self {
        Self {
            status: PeerStatus::Idle,
            local_description: String::new(),
            remote_description: String::new(),
            candidate_log: String::new(),
            remote_candidates: String::new(),
            last_local_candidate: None,
            remote_stream: None,
        }
    }
}

type HandleCell = Arc<OnceCell<Arc<dyn PeerHandle>>>;

pub struct Session {
    id: PeerId,
    name: String,
    seq: u64,
    handle: HandleCell,
    pub view: PeerView,
}

impl Session {
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Peer connection, если уже создан
    pub fn handle(&self) -> Option<Arc<dyn PeerHandle>> {
        self.handle.get().cloned()
    }

    pub(crate) fn handle_cell(&self) -> HandleCell {
        Arc::clone(&self.handle)
    }
}

#[derive(Default)]
pub struct PeerRegistry {
    sessions: HashMap<PeerId, Session>,
    next_seq: u64,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Новая сессия без peer connection
    pub fn create(&mut self, label: &str) -> PeerId {
        let mut id = make_peer_id(label);
        while self.sessions.contains_key(&id) {
            id = make_peer_id(label);
        }

        let name = match label.trim() {
            "" => crate::utils::DEFAULT_PEER_LABEL.to_owned(),
            l => l.to_owned(),
        };
        let session = Session {
            id: id.clone(),
            name,
            seq: self.next_seq,
            handle: Arc::new(OnceCell::new()),
            view: PeerView::default(),
        };
        self.next_seq += 1;
        self.sessions.insert(id.clone(), session);
        id
    }

    /// Удаляет сессию; peer connection не закрывает
    pub fn remove(&mut self, id: &PeerId) -> Option<Session> {
        self.sessions.remove(id)
    }

    pub fn get(&self, id: &PeerId) -> Result<&Session> {
        self.sessions
            .get(id)
            .ok_or_else(|| SignalError::UnknownPeer(id.clone()))
    }

    pub fn get_mut(&mut self, id: &PeerId) -> Result<&mut Session> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| SignalError::UnknownPeer(id.clone()))
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Сессии в порядке создания
    pub fn sessions(&self) -> Vec<&Session> {
        let mut all: Vec<&Session> = self.sessions.values().collect();
        all.sort_by_key(|s| s.seq);
        all
    }

    pub fn ids(&self) -> Vec<PeerId> {
        self.sessions().into_iter().map(|s| s.id.clone()).collect()
    }
}
