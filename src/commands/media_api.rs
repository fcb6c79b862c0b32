use crate::coordinator::SignalingCoordinator;
use crate::error::SignalError;
use crate::media::MediaState;
use tauri::{command, State};
use tracing::info;

/// Захват камеры и микрофона
#[command]
pub async fn start_media(
    state: State<'_, SignalingCoordinator>,
) -> Result<MediaState, SignalError> {
    info!("start_media called");
    state.start_media().await
}

/// Закрыть все peer connection и остановить треки
#[command]
pub async fn stop_all(state: State<'_, SignalingCoordinator>) -> Result<MediaState, SignalError> {
    info!("stop_all called");
    state.teardown_all().await;
    Ok(state.media_state())
}

#[command]
pub fn toggle_audio(state: State<'_, SignalingCoordinator>) -> MediaState {
    state.toggle_audio()
}

#[command]
pub fn toggle_video(state: State<'_, SignalingCoordinator>) -> MediaState {
    state.toggle_video()
}

#[command]
pub fn media_state(state: State<'_, SignalingCoordinator>) -> MediaState {
    state.media_state()
}
