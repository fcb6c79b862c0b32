pub mod config_api;
pub mod events;
pub mod media_api;
pub mod peer_api;

pub use events::TauriPresenter;
