pub mod connection;
pub mod handle;
pub mod ice;
pub mod sdp;
pub mod types;

pub use connection::WebRtcFactory;
pub use handle::{HandleFactory, PeerHandle};
pub use types::{MediaKind, PeerEvent, PeerId, RemoteStream, ServerConfig};
