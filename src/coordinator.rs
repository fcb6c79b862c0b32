//! Ручной сигналинг: offer/answer и обмен кандидатами для каждой сессии.
//!
//! Реестр живёт под `std::sync::Mutex` и никогда не удерживается через `.await`:
//! каждая операция берёт нужное из сессии, отпускает lock, ждёт webrtc-rs и
//! затем снова находит сессию по id. Если сессию за это время удалили,
//! обновление не применяется.

use crate::config::{validate_servers, AppConfig};
use crate::error::{Result, SignalError};
use crate::media::{CaptureBackend, LocalMedia, MediaSourceManager, MediaState};
use crate::peer::handle::{HandleFactory, PeerHandle};
use crate::peer::ice::{
    analyze_candidates, append_line, candidate_lines, end_of_candidates_line,
    is_end_of_candidates, parse_candidate,
};
use crate::peer::sdp::{parse_description, serialize_description};
use crate::peer::types::{PeerEvent, PeerEventReceiver, PeerId, ServerConfig};
use crate::presenter::{PeerSnapshot, Presenter};
use crate::registry::{PeerRegistry, PeerStatus, PeerView};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Итог применения вставленных кандидатов
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct CandidateReport {
    pub applied: usize,
    /// строки, которые не разобрались как JSON кандидата
    pub malformed: usize,
    /// кандидаты, отклонённые peer connection
    pub rejected: usize,
    /// разобранные строки, которые некуда применить (peer connection ещё нет)
    pub without_handle: usize,
    pub end_of_candidates: bool,
}

fn lock_registry(registry: &Mutex<PeerRegistry>) -> MutexGuard<'_, PeerRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Применяет событие webrtc-rs к состоянию блока участника
pub fn apply_event(view: &mut PeerView, event: PeerEvent) {
    match event {
        PeerEvent::RemoteTrack(stream) => {
            // первый поток побеждает
            if view.remote_stream.is_none() {
                view.remote_stream = Some(stream);
            }
        }
        PeerEvent::LocalCandidate(line) => {
            append_line(&mut view.candidate_log, &line);
            view.last_local_candidate = Some(line);
            view.status = PeerStatus::LocalCandidateGathered;
        }
        PeerEvent::GatheringComplete => {
            append_line(&mut view.candidate_log, &end_of_candidates_line());
            view.status = PeerStatus::GatheringFinished;
        }
        PeerEvent::ConnectionState(state) => {
            view.status = PeerStatus::Connection(state);
        }
    }
}

/// Вычитывает события сессии, пока она существует
async fn pump_events(
    registry: Arc<Mutex<PeerRegistry>>,
    presenter: Arc<dyn Presenter>,
    peer: PeerId,
    mut events: PeerEventReceiver,
) {
    while let Some(event) = events.recv().await {
        let snapshot = {
            let mut registry = lock_registry(&registry);
            let Ok(session) = registry.get_mut(&peer) else {
                debug!(%peer, ?event, "event for removed peer dropped");
                break;
            };
            apply_event(&mut session.view, event);
            PeerSnapshot::from(&*session)
        };
        presenter.peer_updated(&snapshot);
    }
    debug!(%peer, "event pump stopped");
}

pub struct SignalingCoordinator {
    registry: Arc<Mutex<PeerRegistry>>,
    media: MediaSourceManager,
    factory: Arc<dyn HandleFactory>,
    presenter: Arc<dyn Presenter>,
    ice_servers: RwLock<Vec<ServerConfig>>,
}

impl SignalingCoordinator {
    pub fn new(
        config: &AppConfig,
        capture: Arc<dyn CaptureBackend>,
        factory: Arc<dyn HandleFactory>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self {
            registry: Arc::new(Mutex::new(PeerRegistry::new())),
            media: MediaSourceManager::new(capture),
            factory,
            presenter,
            ice_servers: RwLock::new(config.ice_servers.clone()),
        }
    }

    fn registry(&self) -> MutexGuard<'_, PeerRegistry> {
        lock_registry(&self.registry)
    }

    /// Меняет вид сессии и перерисовывает её
    fn update_view<R>(&self, id: &PeerId, f: impl FnOnce(&mut PeerView) -> R) -> Result<R> {
        let (out, snapshot) = {
            let mut registry = self.registry();
            let session = registry.get_mut(id)?;
            let out = f(&mut session.view);
            (out, PeerSnapshot::from(&*session))
        };
        self.presenter.peer_updated(&snapshot);
        Ok(out)
    }

    fn set_status(&self, id: &PeerId, status: PeerStatus) -> Result<()> {
        self.update_view(id, |view| view.status = status)
    }

    // ========== MEDIA ==========

    pub async fn start_media(&self) -> Result<MediaState> {
        self.media.start().await?;
        let state = self.media.state();
        self.presenter.media_changed(&state);
        Ok(state)
    }

    pub fn toggle_audio(&self) -> MediaState {
        if self.media.toggle_audio().is_some() {
            self.presenter.media_changed(&self.media.state());
        }
        self.media.state()
    }

    pub fn toggle_video(&self) -> MediaState {
        if self.media.toggle_video().is_some() {
            self.presenter.media_changed(&self.media.state());
        }
        self.media.state()
    }

    pub fn media_state(&self) -> MediaState {
        self.media.state()
    }

    pub fn local_media(&self) -> Option<LocalMedia> {
        self.media.current()
    }

    // ========== REGISTRY ==========

    pub fn add_peer(&self, label: &str) -> Result<PeerSnapshot> {
        let snapshot = {
            let mut registry = self.registry();
            let id = registry.create(label);
            info!(peer = %id, "peer added");
            registry.get(&id).map(PeerSnapshot::from)?
        };
        self.presenter.peer_added(&snapshot);
        Ok(snapshot)
    }

    pub fn snapshot(&self, id: &PeerId) -> Result<PeerSnapshot> {
        self.registry().get(id).map(PeerSnapshot::from)
    }

    pub fn peers(&self) -> Vec<PeerSnapshot> {
        self.registry()
            .sessions()
            .into_iter()
            .map(PeerSnapshot::from)
            .collect()
    }

    pub fn peer_count(&self) -> usize {
        self.registry().len()
    }

    /// Содержимое поля "Remote SDP" из UI
    pub fn set_remote_description_text(&self, id: &PeerId, text: &str) -> Result<()> {
        let mut registry = self.registry();
        registry.get_mut(id)?.view.remote_description = text.to_owned();
        Ok(())
    }

    /// Содержимое поля "Remote ICE" из UI; лог локальных кандидатов не трогает
    pub fn set_remote_candidate_text(&self, id: &PeerId, text: &str) -> Result<()> {
        let mut registry = self.registry();
        registry.get_mut(id)?.view.remote_candidates = text.to_owned();
        Ok(())
    }

    pub fn local_description_text(&self, id: &PeerId) -> Result<String> {
        let text = self.registry().get(id)?.view.local_description.clone();
        non_empty(text)
    }

    pub fn last_local_candidate(&self, id: &PeerId) -> Result<String> {
        let text = self
            .registry()
            .get(id)?
            .view
            .last_local_candidate
            .clone()
            .unwrap_or_default();
        non_empty(text)
    }

    // ========== ICE SERVERS ==========

    pub fn ice_servers(&self) -> Vec<ServerConfig> {
        self.ice_servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Новые серверы действуют для peer connection, созданных после вызова
    pub fn set_ice_servers(&self, servers: Vec<ServerConfig>) -> Result<()> {
        validate_servers(&servers)?;
        info!("Setting {} custom ICE servers", servers.len());
        *self
            .ice_servers
            .write()
            .unwrap_or_else(PoisonError::into_inner) = servers;
        Ok(())
    }

    // ========== SIGNALING ==========

    /// Peer connection сессии; создаётся ровно один раз
    pub async fn ensure_handle(&self, id: &PeerId) -> Result<Arc<dyn PeerHandle>> {
        let cell = self.registry().get(id)?.handle_cell();
        let handle = cell
            .get_or_try_init(|| self.open_handle(id))
            .await?
            .clone();

        let still_registered = self.registry().contains(id);
        if !still_registered {
            // сессию удалили, пока peer connection открывался
            if let Err(e) = handle.close().await {
                warn!(peer = %id, "failed to close orphaned peer connection: {e}");
            }
            return Err(SignalError::UnknownPeer(id.clone()));
        }
        Ok(handle)
    }

    async fn open_handle(&self, id: &PeerId) -> Result<Arc<dyn PeerHandle>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let servers = self.ice_servers();
        let handle = self
            .factory
            .open(id, &servers, self.media.current(), tx)
            .await?;

        tokio::spawn(pump_events(
            Arc::clone(&self.registry),
            Arc::clone(&self.presenter),
            id.clone(),
            rx,
        ));
        Ok(handle)
    }

    /// Инициатор: offer → поле "Local SDP"
    pub async fn create_offer(&self, id: &PeerId) -> Result<PeerSnapshot> {
        let handle = self.ensure_handle(id).await?;
        let previous = self.update_view(id, |view| {
            std::mem::replace(&mut view.status, PeerStatus::CreatingOffer)
        })?;

        match offer(handle.as_ref()).await {
            Ok(text) => {
                info!(peer = %id, "offer created");
                self.update_view(id, |view| {
                    view.local_description = text;
                    view.status = PeerStatus::OfferCreated;
                })?;
                self.snapshot(id)
            }
            Err(e) => {
                warn!(peer = %id, "{e}");
                // статус возвращается к последнему успешному значению
                let _ = self.update_view(id, |view| {
                    if view.status == PeerStatus::CreatingOffer {
                        view.status = previous;
                    }
                });
                Err(e)
            }
        }
    }

    /// Вторая сторона: remote offer → answer в поле "Local SDP"
    pub async fn accept_offer_and_answer(&self, id: &PeerId) -> Result<PeerSnapshot> {
        let text = self.remote_text(id)?;
        if text.is_empty() {
            return Err(SignalError::MissingInput(
                "Paste remote offer SDP (JSON) into the Remote SDP box then click this button.",
            ));
        }
        let remote = parse_description(&text, "Error handling remote offer")?;

        let handle = self.ensure_handle(id).await?;
        handle.set_remote_description(remote).await.inspect_err(|e| {
            warn!(peer = %id, "{e}");
        })?;
        self.set_status(id, PeerStatus::RemoteOfferSet)?;

        let answer_text = answer(handle.as_ref()).await.inspect_err(|e| {
            warn!(peer = %id, "{e}");
        })?;
        info!(peer = %id, "answer created");
        self.update_view(id, |view| {
            view.local_description = answer_text;
            view.status = PeerStatus::AnswerCreated;
        })?;
        self.snapshot(id)
    }

    /// Инициатор: remote answer
    pub async fn accept_answer(&self, id: &PeerId) -> Result<PeerSnapshot> {
        let text = self.remote_text(id)?;
        if text.is_empty() {
            return Err(SignalError::MissingInput(
                "Paste remote answer SDP (JSON) into the Remote SDP box.",
            ));
        }
        let remote = parse_description(&text, "Error handling remote answer")?;

        let handle = self.ensure_handle(id).await?;
        handle.set_remote_description(remote).await.inspect_err(|e| {
            warn!(peer = %id, "{e}");
        })?;
        info!(peer = %id, "remote answer set");
        self.set_status(id, PeerStatus::RemoteAnswerSet)?;
        self.snapshot(id)
    }

    /// Применяет вставленные кандидаты собеседника; битые строки пропускаются
    pub async fn apply_remote_candidates(&self, id: &PeerId) -> Result<CandidateReport> {
        let (text, handle) = {
            let registry = self.registry();
            let session = registry.get(id)?;
            (session.view.remote_candidates.clone(), session.handle())
        };

        let mut report = CandidateReport::default();
        if text.trim().is_empty() {
            self.presenter.notify(
                Some(id),
                "Paste candidate lines into the ICE candidates box first",
            );
            return Ok(report);
        }

        let mut applied = Vec::new();
        for line in candidate_lines(&text) {
            let candidate = match parse_candidate(line) {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!(peer = %id, "{e}");
                    report.malformed += 1;
                    continue;
                }
            };

            let Some(handle) = handle.as_ref() else {
                report.without_handle += 1;
                continue;
            };

            let end = is_end_of_candidates(&candidate);
            if let Err(e) = handle.add_ice_candidate(candidate.clone()).await {
                warn!(peer = %id, "candidate rejected: {e}");
                report.rejected += 1;
                continue;
            }

            let status = if end {
                report.end_of_candidates = true;
                PeerStatus::RemoteCandidatesComplete
            } else {
                report.applied += 1;
                applied.push(candidate);
                PeerStatus::AddedRemoteCandidate
            };
            if self.set_status(id, status).is_err() {
                debug!(peer = %id, "peer removed while applying candidates");
                break;
            }
        }

        analyze_candidates(id.as_str(), &applied);
        debug!(peer = %id, ?report, "remote candidates processed");
        Ok(report)
    }

    // ========== TEARDOWN ==========

    /// Закрывает peer connection и убирает блок участника; локальное медиа не трогает
    pub async fn teardown(&self, id: &PeerId) -> Result<()> {
        let session = self
            .registry()
            .remove(id)
            .ok_or_else(|| SignalError::UnknownPeer(id.clone()))?;
        self.close_session(id, session.handle()).await;
        Ok(())
    }

    /// Stop: все сессии, затем локальное медиа
    pub async fn teardown_all(&self) {
        let ids = self.registry().ids();
        for id in ids {
            // сессию могли удалить параллельно
            let _ = self.teardown(&id).await;
        }

        // сессии, добавленные во время остановки
        let drained = std::mem::take(&mut *self.registry());
        let leftovers: Vec<_> = drained
            .sessions()
            .into_iter()
            .map(|s| (s.id().clone(), s.handle()))
            .collect();
        for (id, handle) in leftovers {
            self.close_session(&id, handle).await;
        }

        self.media.stop_all();
        self.presenter.media_changed(&self.media.state());
        info!("all peers torn down");
    }

    async fn close_session(&self, id: &PeerId, handle: Option<Arc<dyn PeerHandle>>) {
        if let Some(handle) = handle {
            if let Err(e) = handle.close().await {
                warn!(peer = %id, "{e}");
            }
        }
        self.presenter.peer_removed(id);
        info!(peer = %id, "peer torn down");
    }

    fn remote_text(&self, id: &PeerId) -> Result<String> {
        Ok(self
            .registry()
            .get(id)?
            .view
            .remote_description
            .trim()
            .to_owned())
    }
}

fn non_empty(text: String) -> Result<String> {
    if text.trim().is_empty() {
        Err(SignalError::MissingInput("Nothing to copy"))
    } else {
        Ok(text)
    }
}

/// Текст для поля "Local SDP": то, что реально стоит в peer connection
async fn local_text(
    handle: &dyn PeerHandle,
    created: RTCSessionDescription,
    context: &'static str,
) -> Result<String> {
    let local = handle.local_description().await.unwrap_or(created);
    serialize_description(&local, context)
}

async fn offer(handle: &dyn PeerHandle) -> Result<String> {
    let offer = handle.create_offer().await?;
    handle.set_local_description(offer.clone()).await?;
    local_text(handle, offer, "Offer error").await
}

async fn answer(handle: &dyn PeerHandle) -> Result<String> {
    let answer = handle.create_answer().await?;
    handle.set_local_description(answer.clone()).await?;
    local_text(handle, answer, "Error handling remote offer").await
}
