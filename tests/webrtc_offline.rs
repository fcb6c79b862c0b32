//! Настоящий webrtc-rs без сети: только обмен SDP, без ожидания ICE.

use manual_rtc_lib::config::{AppConfig, MediaConfig};
use manual_rtc_lib::media::SampleCapture;
use manual_rtc_lib::peer::sdp::{parse_description, same_description, serialize_description};
use manual_rtc_lib::peer::WebRtcFactory;
use manual_rtc_lib::registry::PeerStatus;
use manual_rtc_lib::testing::RecordingPresenter;
use manual_rtc_lib::SignalingCoordinator;
use std::sync::Arc;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;

fn coordinator() -> SignalingCoordinator {
    // без STUN: кандидаты собираются только локально
    let config = AppConfig {
        ice_servers: vec![],
        ..AppConfig::default()
    };
    SignalingCoordinator::new(
        &config,
        Arc::new(SampleCapture::new(MediaConfig::default())),
        Arc::new(WebRtcFactory::new()),
        Arc::new(RecordingPresenter::new()),
    )
}

#[tokio::test]
async fn offer_answer_exchange_between_two_webrtc_peers() {
    let alice = coordinator();
    let bob = coordinator();
    alice.start_media().await.unwrap();

    let a = alice.add_peer("bob").unwrap().id;
    let b = bob.add_peer("alice").unwrap().id;

    let t1 = alice.create_offer(&a).await.unwrap().view.local_description;
    let offer = parse_description(&t1, "test").unwrap();
    assert_eq!(offer.sdp_type, RTCSdpType::Offer);
    assert!(offer.sdp.contains("m=audio"));
    assert!(offer.sdp.contains("m=video"));

    // текст переживает передачу без изменений
    let again = parse_description(&serialize_description(&offer, "test").unwrap(), "test").unwrap();
    assert!(same_description(&offer, &again));

    // у Боба нет захвата: принимает через recvonly
    bob.set_remote_description_text(&b, &t1).unwrap();
    let t2 = bob.accept_offer_and_answer(&b).await.unwrap().view.local_description;
    let answer = parse_description(&t2, "test").unwrap();
    assert_eq!(answer.sdp_type, RTCSdpType::Answer);

    alice.set_remote_description_text(&a, &t2).unwrap();
    let snapshot = alice.accept_answer(&a).await.unwrap();
    assert_eq!(snapshot.view.status, PeerStatus::RemoteAnswerSet);

    alice.teardown_all().await;
    bob.teardown_all().await;
    assert_eq!(alice.peer_count(), 0);
    assert_eq!(bob.peer_count(), 0);
}
