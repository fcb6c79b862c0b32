use crate::config::AppConfig;
use tracing::{debug, info};
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};
use tracing_subscriber::EnvFilter;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::peer_connection::RTCPeerConnection;

pub const DEFAULT_FILTER: &str = "manual_rtc_lib=debug,webrtc=warn";

/// Временные метки в локальной зоне, как в старом `log()`
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Устанавливает глобальный subscriber; повторный вызов ничего не делает
pub fn init(config: &AppConfig) {
    if !config.logging {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(LocalTime)
        .with_target(false)
        .try_init()
        .is_ok();

    if installed {
        info!("logging initialised");
    }
}

/// Печать ICE-candidate при появлении (Trickle-ICE)
pub fn dump_candidate(peer: &str, cand: &RTCIceCandidate) {
    if let Ok(init) = cand.to_json() {
        debug!(
            peer,
            "Trickle LOCAL: candidate={} sdp_mid={:?} sdp_mline_index={:?} username_fragment={:?}",
            init.candidate,
            init.sdp_mid,
            init.sdp_mline_index,
            init.username_fragment
        );
    }
}

/// Быстрый снимок getStats → выбранная пара
pub async fn dump_selected_pair(peer: &str, pc: &RTCPeerConnection, moment: &str) {
    let stats = pc.get_stats().await;
    for (_, v) in stats.reports {
        if let webrtc::stats::StatsReportType::CandidatePair(pair) = v {
            if pair.nominated {
                info!(
                    peer,
                    "STATS {moment}: {}:{}  bytes={}/{} state={:?}",
                    pair.local_candidate_id,
                    pair.remote_candidate_id,
                    pair.bytes_sent,
                    pair.bytes_received,
                    pair.state
                );
            }
        }
    }
}
