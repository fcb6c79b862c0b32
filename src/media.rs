//! Локальный захват: один активный `LocalMedia` на процесс.

use crate::config::MediaConfig;
use crate::error::{Result, SignalError};
use crate::peer::types::MediaKind;
use crate::utils::random_suffix;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

/// Один локальный трек (микрофон или камера)
#[derive(Debug)]
pub struct LocalTrack {
    kind: MediaKind,
    enabled: AtomicBool,
    stopped: AtomicBool,
    rtc: Arc<TrackLocalStaticSample>,
}

impl LocalTrack {
    pub fn new(kind: MediaKind, rtc: Arc<TrackLocalStaticSample>) -> Self {
        Self {
            kind,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
            rtc,
        }
    }

    pub fn opus(stream_id: &str) -> Self {
        let codec = RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48000,
            channels: 2,
            sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
            rtcp_feedback: vec![],
        };
        let rtc = TrackLocalStaticSample::new(codec, "audio".to_owned(), stream_id.to_owned());
        Self::new(MediaKind::Audio, Arc::new(rtc))
    }

    pub fn vp8(stream_id: &str) -> Self {
        let codec = RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            clock_rate: 90000,
            channels: 0,
            sdp_fmtp_line: String::new(),
            rtcp_feedback: vec![],
        };
        let rtc = TrackLocalStaticSample::new(codec, "video".to_owned(), stream_id.to_owned());
        Self::new(MediaKind::Video, Arc::new(rtc))
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn rtc_track(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        Arc::clone(&self.rtc) as Arc<dyn TrackLocal + Send + Sync>
    }

    /// Пишет закодированный сэмпл во все peer connection с этим треком.
    /// Выключенный или остановленный трек молча отбрасывает сэмпл (`Ok(false)`).
    pub async fn write_sample(&self, sample: &Sample) -> webrtc::error::Result<bool> {
        if self.is_stopped() || !self.is_enabled() {
            return Ok(false);
        }
        self.rtc.write_sample(sample).await?;
        Ok(true)
    }
}

/// Активный захват: набор треков с общим stream id
#[derive(Clone, Debug)]
pub struct LocalMedia {
    stream_id: String,
    tracks: Arc<Vec<Arc<LocalTrack>>>,
}

impl LocalMedia {
    pub fn new(stream_id: String, tracks: Vec<LocalTrack>) -> Self {
        Self {
            stream_id,
            tracks: Arc::new(tracks.into_iter().map(Arc::new).collect()),
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn tracks(&self) -> &[Arc<LocalTrack>] {
        &self.tracks
    }

    pub fn first(&self, kind: MediaKind) -> Option<&Arc<LocalTrack>> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }

    fn stop(&self) {
        for track in self.tracks.iter() {
            track.stop();
        }
    }
}

/// Источник захвата (устройства платформы)
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    async fn acquire(&self) -> Result<LocalMedia>;
}

/// Opus + VP8 треки на `TrackLocalStaticSample`; сэмплы подаёт внешний кодер
pub struct SampleCapture {
    devices: MediaConfig,
}

impl SampleCapture {
    pub fn new(devices: MediaConfig) -> Self {
        Self { devices }
    }
}

#[async_trait]
impl CaptureBackend for SampleCapture {
    async fn acquire(&self) -> Result<LocalMedia> {
        if !self.devices.audio {
            return Err(SignalError::MediaAcquisition(
                "Requested device not found: microphone".into(),
            ));
        }
        if !self.devices.video {
            return Err(SignalError::MediaAcquisition(
                "Requested device not found: camera".into(),
            ));
        }

        let stream_id = format!("local-{}", random_suffix());
        let tracks = vec![LocalTrack::opus(&stream_id), LocalTrack::vp8(&stream_id)];
        Ok(LocalMedia::new(stream_id, tracks))
    }
}

/// Состояние для кнопок mute/camera
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MediaState {
    pub active: bool,
    pub stream_id: Option<String>,
    pub audio_enabled: Option<bool>,
    pub video_enabled: Option<bool>,
    pub audio_label: &'static str,
    pub video_label: &'static str,
}

pub struct MediaSourceManager {
    backend: Arc<dyn CaptureBackend>,
    active: Mutex<Option<LocalMedia>>,
}

impl MediaSourceManager {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            active: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<LocalMedia>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Захват аудио+видео. При ошибке состояние не меняется.
    pub async fn start(&self) -> Result<LocalMedia> {
        if self.lock().is_some() {
            return Err(SignalError::MediaAcquisition(
                "local media already active, stop it first".into(),
            ));
        }

        let media = self.backend.acquire().await?;

        let mut active = self.lock();
        if active.is_some() {
            // параллельный start успел раньше
            media.stop();
            return Err(SignalError::MediaAcquisition(
                "local media already active, stop it first".into(),
            ));
        }
        info!(stream = media.stream_id(), "local media started");
        *active = Some(media.clone());
        Ok(media)
    }

    pub fn current(&self) -> Option<LocalMedia> {
        self.lock().clone()
    }

    pub fn toggle_audio(&self) -> Option<bool> {
        self.toggle(MediaKind::Audio)
    }

    pub fn toggle_video(&self) -> Option<bool> {
        self.toggle(MediaKind::Video)
    }

    /// Новое значение enabled или None, если трека нет
    fn toggle(&self, kind: MediaKind) -> Option<bool> {
        let active = self.lock();
        let track = active.as_ref()?.first(kind)?;
        let enabled = !track.is_enabled();
        track.set_enabled(enabled);
        debug!(?kind, enabled, "local track toggled");
        Some(enabled)
    }

    /// Останавливает все треки; безопасно без активного захвата
    pub fn stop_all(&self) -> bool {
        match self.lock().take() {
            Some(media) => {
                media.stop();
                info!(stream = media.stream_id(), "local media stopped");
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> MediaState {
        let active = self.lock();
        let audio = active
            .as_ref()
            .and_then(|m| m.first(MediaKind::Audio))
            .map(|t| t.is_enabled());
        let video = active
            .as_ref()
            .and_then(|m| m.first(MediaKind::Video))
            .map(|t| t.is_enabled());

        MediaState {
            active: active.is_some(),
            stream_id: active.as_ref().map(|m| m.stream_id().to_owned()),
            audio_enabled: audio,
            video_enabled: video,
            audio_label: if audio == Some(false) {
                "Unmute Audio"
            } else {
                "Mute Audio"
            },
            video_label: if video == Some(false) {
                "Camera On"
            } else {
                "Camera Off"
            },
        }
    }
}
