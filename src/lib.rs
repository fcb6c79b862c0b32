pub mod config;
pub mod coordinator;
pub mod error;
pub mod logger;
pub mod media;
pub mod peer;
pub mod presenter;
pub mod registry;
pub mod utils;

// Офлайн-двойники peer connection и presenter
pub mod testing;

#[cfg(feature = "desktop")]
mod commands;

pub use config::AppConfig;
pub use coordinator::{CandidateReport, SignalingCoordinator};
pub use error::SignalError;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use crate::commands::{config_api, media_api, peer_api, TauriPresenter};
    use crate::media::SampleCapture;
    use crate::peer::WebRtcFactory;
    use std::sync::Arc;
    use tauri::Manager;

    let (config, load_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    logger::init(&config);
    if let Some(e) = load_error {
        tracing::warn!("{e}; falling back to defaults");
    }

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(move |app| {
            let presenter = Arc::new(TauriPresenter::new(app.handle().clone()));
            app.manage(SignalingCoordinator::new(
                &config,
                Arc::new(SampleCapture::new(config.media)),
                Arc::new(WebRtcFactory::new()),
                presenter,
            ));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Local media
            media_api::start_media,
            media_api::stop_all,
            media_api::toggle_audio,
            media_api::toggle_video,
            media_api::media_state,

            // Peers and manual signaling
            peer_api::add_peer,
            peer_api::remove_peer,
            peer_api::list_peers,
            peer_api::create_offer,
            peer_api::accept_offer,
            peer_api::accept_answer,
            peer_api::apply_remote_candidates,
            peer_api::copy_local_description,
            peer_api::copy_last_candidate,

            // ICE servers
            config_api::get_ice_servers,
            config_api::set_ice_servers,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
