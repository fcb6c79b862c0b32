use crate::coordinator::SignalingCoordinator;
use crate::error::SignalError;
use crate::peer::types::ServerConfig;
use tauri::{command, State};

/// Текущие ICE серверы (дефолтный STUN, если не меняли)
#[command]
pub fn get_ice_servers(state: State<'_, SignalingCoordinator>) -> Vec<ServerConfig> {
    state.ice_servers()
}

/// Действуют для peer connection, созданных после вызова
#[command]
pub fn set_ice_servers(
    state: State<'_, SignalingCoordinator>,
    servers: Vec<ServerConfig>,
) -> Result<(), SignalError> {
    state.set_ice_servers(servers)
}
