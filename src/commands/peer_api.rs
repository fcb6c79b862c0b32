//! Кнопки блока участника. Команды, которым нужен текст поля, получают его
//! содержимое из webview и сначала записывают в сессию.

use crate::coordinator::{CandidateReport, SignalingCoordinator};
use crate::error::SignalError;
use crate::peer::types::PeerId;
use crate::presenter::PeerSnapshot;
use tauri::{command, State};
use tracing::info;

#[command]
pub fn add_peer(
    state: State<'_, SignalingCoordinator>,
    label: String,
) -> Result<PeerSnapshot, SignalError> {
    state.add_peer(&label)
}

#[command]
pub async fn remove_peer(
    state: State<'_, SignalingCoordinator>,
    id: PeerId,
) -> Result<(), SignalError> {
    info!(peer = %id, "remove_peer called");
    state.teardown(&id).await
}

#[command]
pub fn list_peers(state: State<'_, SignalingCoordinator>) -> Vec<PeerSnapshot> {
    state.peers()
}

/// A-сторона: создаём OFFER
#[command]
pub async fn create_offer(
    state: State<'_, SignalingCoordinator>,
    id: PeerId,
) -> Result<PeerSnapshot, SignalError> {
    info!(peer = %id, "create_offer called");
    state.create_offer(&id).await
}

/// B-сторона: получает OFFER, делает ANSWER
#[command]
pub async fn accept_offer(
    state: State<'_, SignalingCoordinator>,
    id: PeerId,
    remote_sdp: String,
) -> Result<PeerSnapshot, SignalError> {
    info!(peer = %id, "accept_offer called");
    state.set_remote_description_text(&id, &remote_sdp)?;
    state.accept_offer_and_answer(&id).await
}

/// A-сторона: получает ANSWER
#[command]
pub async fn accept_answer(
    state: State<'_, SignalingCoordinator>,
    id: PeerId,
    remote_sdp: String,
) -> Result<PeerSnapshot, SignalError> {
    info!(peer = %id, "accept_answer called");
    state.set_remote_description_text(&id, &remote_sdp)?;
    state.accept_answer(&id).await
}

#[command]
pub async fn apply_remote_candidates(
    state: State<'_, SignalingCoordinator>,
    id: PeerId,
    candidates: String,
) -> Result<CandidateReport, SignalError> {
    info!(peer = %id, "apply_remote_candidates called");
    state.set_remote_candidate_text(&id, &candidates)?;
    state.apply_remote_candidates(&id).await
}

/// Текст для буфера обмена; копирует сам webview
#[command]
pub fn copy_local_description(
    state: State<'_, SignalingCoordinator>,
    id: PeerId,
) -> Result<String, SignalError> {
    state.local_description_text(&id)
}

#[command]
pub fn copy_last_candidate(
    state: State<'_, SignalingCoordinator>,
    id: PeerId,
) -> Result<String, SignalError> {
    state.last_local_candidate(&id)
}
