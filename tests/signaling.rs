use manual_rtc_lib::config::{AppConfig, MediaConfig};
use manual_rtc_lib::media::SampleCapture;
use manual_rtc_lib::peer::ice::{is_end_of_candidates, parse_candidate};
use manual_rtc_lib::peer::types::{PeerId, ServerConfig};
use manual_rtc_lib::presenter::PeerSnapshot;
use manual_rtc_lib::registry::PeerStatus;
use manual_rtc_lib::testing::{eventually, LoopbackFactory, PresenterEvent, RecordingPresenter};
use manual_rtc_lib::{SignalError, SignalingCoordinator};
use std::sync::Arc;

struct Side {
    rtc: SignalingCoordinator,
    factory: Arc<LoopbackFactory>,
    presenter: Arc<RecordingPresenter>,
}

fn side_with(factory: LoopbackFactory, media: MediaConfig) -> Side {
    let factory = Arc::new(factory);
    let presenter = Arc::new(RecordingPresenter::new());
    let rtc = SignalingCoordinator::new(
        &AppConfig::default(),
        Arc::new(SampleCapture::new(media)),
        factory.clone(),
        presenter.clone(),
    );
    Side {
        rtc,
        factory,
        presenter,
    }
}

fn side() -> Side {
    side_with(LoopbackFactory::new(), MediaConfig::default())
}

fn view(side: &Side, id: &PeerId) -> PeerSnapshot {
    side.rtc.snapshot(id).unwrap()
}

/// Лог кандидатов закончился маркером конца
fn gathering_done(side: &Side, id: &PeerId) -> bool {
    view(side, id)
        .view
        .candidate_log
        .lines()
        .last()
        .and_then(|l| parse_candidate(l).ok())
        .map(|c| is_end_of_candidates(&c))
        .unwrap_or(false)
}

#[tokio::test]
async fn two_party_handshake_connects_both_sides() {
    let alice = side();
    let bob = side();
    alice.rtc.start_media().await.unwrap();
    bob.rtc.start_media().await.unwrap();

    // у Алисы блок "bob", у Боба блок "alice"
    let a = alice.rtc.add_peer("bob").unwrap().id;
    let b = bob.rtc.add_peer("alice").unwrap().id;

    let offer = alice.rtc.create_offer(&a).await.unwrap();
    assert_eq!(offer.view.status, PeerStatus::OfferCreated);
    let t1 = offer.view.local_description;
    assert!(t1.contains(r#""type":"offer""#));

    bob.rtc.set_remote_description_text(&b, &t1).unwrap();
    let answer = bob.rtc.accept_offer_and_answer(&b).await.unwrap();
    assert_eq!(answer.view.status, PeerStatus::AnswerCreated);
    let t2 = answer.view.local_description;
    assert!(t2.contains(r#""type":"answer""#));

    alice.rtc.set_remote_description_text(&a, &t2).unwrap();
    let done = alice.rtc.accept_answer(&a).await.unwrap();
    assert_eq!(done.view.status.to_string(), "remote answer set - awaiting ICE");

    assert!(eventually(|| gathering_done(&alice, &a)).await);
    assert!(eventually(|| gathering_done(&bob, &b)).await);

    let alice_log = view(&alice, &a).view.candidate_log;
    let bob_log = view(&bob, &b).view.candidate_log;

    bob.rtc.set_remote_candidate_text(&b, &alice_log).unwrap();
    let report = bob.rtc.apply_remote_candidates(&b).await.unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(report.malformed, 0);
    assert!(report.end_of_candidates);

    alice.rtc.set_remote_candidate_text(&a, &bob_log).unwrap();
    let report = alice.rtc.apply_remote_candidates(&a).await.unwrap();
    assert_eq!(report.applied, 2);

    assert!(eventually(|| view(&alice, &a).view.status.to_string() == "connected").await);
    assert!(eventually(|| view(&bob, &b).view.status.to_string() == "connected").await);

    // удалённый "экран" получил поток собеседника
    let bob_stream = bob.rtc.local_media().unwrap().stream_id().to_owned();
    assert!(eventually(|| view(&alice, &a).view.remote_stream.is_some()).await);
    assert_eq!(
        view(&alice, &a).view.remote_stream.unwrap().stream_id,
        bob_stream
    );
    assert!(bob.factory.handle(&b).unwrap().end_of_candidates());
}

#[tokio::test]
async fn teardown_all_empties_registry_and_releases_media() {
    let s = side();
    s.rtc.start_media().await.unwrap();
    let first = s.rtc.add_peer("one").unwrap().id;
    let second = s.rtc.add_peer("two").unwrap().id;
    s.rtc.create_offer(&first).await.unwrap();

    s.rtc.teardown_all().await;

    assert_eq!(s.rtc.peer_count(), 0);
    assert!(s.factory.handle(&first).unwrap().is_closed());
    assert!(s.rtc.local_media().is_none());

    let removed = s.presenter.removed();
    assert!(removed.contains(&first) && removed.contains(&second));
    assert!(!s.presenter.last_media_state().unwrap().active);

    // toggle после остановки ничего не делает
    let state = s.rtc.toggle_audio();
    assert!(!state.active);
    assert_eq!(state.audio_enabled, None);
}

#[tokio::test]
async fn identical_labels_get_distinct_ids() {
    let s = side();
    let a = s.rtc.add_peer("same").unwrap().id;
    let b = s.rtc.add_peer("same").unwrap().id;
    assert_ne!(a, b);
    assert_eq!(s.rtc.peers().len(), 2);
}

#[tokio::test]
async fn ensure_handle_creates_exactly_one_handle() {
    let s = side();
    let id = s.rtc.add_peer("x").unwrap().id;

    let first = s.rtc.ensure_handle(&id).await.unwrap();
    let second = s.rtc.ensure_handle(&id).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let other = s.rtc.add_peer("y").unwrap().id;
    let (h1, h2) = tokio::join!(s.rtc.ensure_handle(&other), s.rtc.ensure_handle(&other));
    assert!(Arc::ptr_eq(&h1.unwrap(), &h2.unwrap()));

    assert_eq!(s.factory.opened(), 2);
}

#[tokio::test]
async fn handle_gets_active_media_and_configured_servers() {
    let s = side();
    let custom = vec![ServerConfig {
        id: "relay".into(),
        r#type: "turn".into(),
        url: "relay.example.org:3478".into(),
        username: Some("user".into()),
        credential: Some("secret".into()),
    }];
    s.rtc.set_ice_servers(custom.clone()).unwrap();
    let media = s.rtc.start_media().await.unwrap();

    let id = s.rtc.add_peer("x").unwrap().id;
    s.rtc.ensure_handle(&id).await.unwrap();

    let handle = s.factory.handle(&id).unwrap();
    assert_eq!(handle.ice_servers(), custom.as_slice());
    assert_eq!(handle.local_stream(), media.stream_id.as_deref());
}

#[tokio::test]
async fn turn_server_without_credentials_is_rejected() {
    let s = side();
    let bad = vec![ServerConfig {
        id: "relay".into(),
        r#type: "turn".into(),
        url: "turn:relay.example.org".into(),
        username: None,
        credential: None,
    }];
    assert!(matches!(
        s.rtc.set_ice_servers(bad),
        Err(SignalError::InvalidConfig(_))
    ));
    assert_eq!(s.rtc.ice_servers(), AppConfig::default().ice_servers);
}

#[tokio::test]
async fn accept_offer_without_remote_text_changes_nothing() {
    let s = side();
    let id = s.rtc.add_peer("x").unwrap().id;

    let err = s.rtc.accept_offer_and_answer(&id).await.unwrap_err();
    assert!(matches!(err, SignalError::MissingInput(_)));
    assert_eq!(s.factory.opened(), 0);

    let offer = s.rtc.create_offer(&id).await.unwrap().view.local_description;
    s.rtc.set_remote_description_text(&id, "   ").unwrap();
    assert!(matches!(
        s.rtc.accept_offer_and_answer(&id).await,
        Err(SignalError::MissingInput(_))
    ));
    assert_eq!(view(&s, &id).view.local_description, offer);
}

#[tokio::test]
async fn accept_answer_requires_text_and_valid_json() {
    let s = side();
    let id = s.rtc.add_peer("x").unwrap().id;
    assert!(matches!(
        s.rtc.accept_answer(&id).await,
        Err(SignalError::MissingInput(_))
    ));

    s.rtc.set_remote_description_text(&id, "{\"type\":").unwrap();
    let err = s.rtc.accept_answer(&id).await.unwrap_err();
    assert!(matches!(err, SignalError::Negotiation { .. }));
    assert_eq!(view(&s, &id).view.status, PeerStatus::Idle);
}

#[tokio::test]
async fn failed_offer_restores_previous_status() {
    let s = side_with(LoopbackFactory::failing_offers(), MediaConfig::default());
    let id = s.rtc.add_peer("x").unwrap().id;

    let err = s.rtc.create_offer(&id).await.unwrap_err();
    assert!(err.to_string().starts_with("Offer error"));
    let snapshot = view(&s, &id);
    assert_eq!(snapshot.view.status, PeerStatus::Idle);
    assert!(snapshot.view.local_description.is_empty());
}

#[tokio::test]
async fn malformed_candidate_line_is_skipped() {
    let offerer = side();
    let answerer = side();
    let o = offerer.rtc.add_peer("o").unwrap().id;
    let id = answerer.rtc.add_peer("a").unwrap().id;

    let t1 = offerer.rtc.create_offer(&o).await.unwrap().view.local_description;
    answerer.rtc.set_remote_description_text(&id, &t1).unwrap();
    answerer.rtc.accept_offer_and_answer(&id).await.unwrap();
    assert!(eventually(|| gathering_done(&answerer, &id)).await);

    let pasted = [
        r#"{"candidate":"candidate:1 1 udp 2130706431 10.0.0.1 50001 typ host","sdpMid":"0","sdpMLineIndex":0}"#,
        r#"{"candidate": "candidate:2 1 udp 2130706431 10.0.0.2 50002 typ host", "sdpMid": "#,
        r#"{"candidate":"candidate:3 1 udp 1694498815 203.0.113.7 50003 typ srflx","sdpMid":"0","sdpMLineIndex":0}"#,
    ]
    .join("\n");
    answerer.rtc.set_remote_candidate_text(&id, &pasted).unwrap();

    let report = answerer.rtc.apply_remote_candidates(&id).await.unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(report.malformed, 1);
    assert!(answerer.presenter.notices().is_empty());

    let applied = answerer.factory.handle(&id).unwrap().remote_candidates();
    assert_eq!(applied.len(), 2);
    assert!(applied[0].candidate.starts_with("candidate:1 "));
    assert!(applied[1].candidate.starts_with("candidate:3 "));
}

#[tokio::test]
async fn empty_candidate_box_prompts_instead_of_failing() {
    let s = side();
    let id = s.rtc.add_peer("x").unwrap().id;

    let report = s.rtc.apply_remote_candidates(&id).await.unwrap();
    assert_eq!(report.applied, 0);
    assert_eq!(
        s.presenter.notices(),
        vec!["Paste candidate lines into the ICE candidates box first".to_owned()]
    );
}

#[tokio::test]
async fn candidates_without_handle_are_not_applied() {
    let s = side();
    let id = s.rtc.add_peer("x").unwrap().id;
    s.rtc
        .set_remote_candidate_text(&id, "{\"candidate\":\"candidate:1 1 udp 1 10.0.0.1 1 typ host\"}\n")
        .unwrap();

    let report = s.rtc.apply_remote_candidates(&id).await.unwrap();
    assert_eq!(report.applied, 0);
    assert_eq!(report.without_handle, 1);
    assert_eq!(s.factory.opened(), 0);
}

#[tokio::test]
async fn candidates_before_remote_description_are_rejected_per_line() {
    let s = side();
    let id = s.rtc.add_peer("x").unwrap().id;
    s.rtc.ensure_handle(&id).await.unwrap();
    s.rtc
        .set_remote_candidate_text(
            &id,
            "{\"candidate\":\"candidate:1 1 udp 1 10.0.0.1 1 typ host\"}\n{\"candidate\":\"candidate:2 1 udp 1 10.0.0.2 2 typ host\"}",
        )
        .unwrap();

    let report = s.rtc.apply_remote_candidates(&id).await.unwrap();
    assert_eq!(report.rejected, 2);
    assert_eq!(report.applied, 0);
}

#[tokio::test]
async fn copy_actions_report_nothing_to_copy() {
    let s = side();
    let id = s.rtc.add_peer("x").unwrap().id;
    assert!(matches!(
        s.rtc.local_description_text(&id),
        Err(SignalError::MissingInput("Nothing to copy"))
    ));
    assert!(s.rtc.last_local_candidate(&id).is_err());

    let offer = s.rtc.create_offer(&id).await.unwrap().view.local_description;
    assert_eq!(s.rtc.local_description_text(&id).unwrap(), offer);

    assert!(eventually(|| gathering_done(&s, &id)).await);
    let last = s.rtc.last_local_candidate(&id).unwrap();
    assert!(parse_candidate(&last).unwrap().candidate.starts_with("candidate:2 "));
}

#[tokio::test]
async fn teardown_closes_handle_and_forgets_peer() {
    let s = side();
    s.rtc.start_media().await.unwrap();
    let id = s.rtc.add_peer("x").unwrap().id;
    s.rtc.create_offer(&id).await.unwrap();

    s.rtc.teardown(&id).await.unwrap();
    assert!(s.factory.handle(&id).unwrap().is_closed());
    assert_eq!(s.presenter.removed(), vec![id.clone()]);
    // локальное медиа остаётся
    assert!(s.rtc.local_media().is_some());

    assert!(matches!(
        s.rtc.create_offer(&id).await,
        Err(SignalError::UnknownPeer(_))
    ));
    assert!(matches!(
        s.rtc.teardown(&id).await,
        Err(SignalError::UnknownPeer(_))
    ));
}

#[tokio::test]
async fn teardown_during_first_action_is_safe() {
    let s = side();
    let id = s.rtc.add_peer("x").unwrap().id;

    let (offer, teardown) = tokio::join!(s.rtc.create_offer(&id), s.rtc.teardown(&id));
    assert!(teardown.is_ok());
    assert!(matches!(offer, Err(SignalError::UnknownPeer(_))));
    if let Some(handle) = s.factory.handle(&id) {
        assert!(handle.is_closed());
    }
    assert_eq!(s.rtc.peer_count(), 0);
}

#[tokio::test]
async fn media_failure_installs_nothing() {
    let s = side_with(
        LoopbackFactory::new(),
        MediaConfig {
            audio: false,
            video: true,
        },
    );
    assert!(matches!(
        s.rtc.start_media().await,
        Err(SignalError::MediaAcquisition(_))
    ));
    assert!(!s.rtc.media_state().active);
    assert!(s.presenter.last_media_state().is_none());
}

#[tokio::test]
async fn pasted_candidates_keep_local_log_intact() {
    let offerer = side();
    let s = side();
    let o = offerer.rtc.add_peer("o").unwrap().id;
    let id = s.rtc.add_peer("a").unwrap().id;

    let t1 = offerer.rtc.create_offer(&o).await.unwrap().view.local_description;
    s.rtc.set_remote_description_text(&id, &t1).unwrap();
    // то, что webview видел до прихода кандидатов
    let rendered = s.rtc.accept_offer_and_answer(&id).await.unwrap().view.candidate_log;
    assert!(rendered.is_empty());
    assert!(eventually(|| gathering_done(&s, &id)).await);

    let pasted = r#"{"candidate":"candidate:9 1 udp 2130706431 10.0.0.9 50009 typ host","sdpMid":"0","sdpMLineIndex":0}"#;
    s.rtc
        .set_remote_candidate_text(&id, &format!("{rendered}\n{pasted}"))
        .unwrap();
    let report = s.rtc.apply_remote_candidates(&id).await.unwrap();
    assert_eq!(report.applied, 1);
    assert!(!report.end_of_candidates);

    let after = view(&s, &id).view;
    assert!(after.candidate_log.contains("candidate:1 "));
    assert!(after.candidate_log.contains("candidate:2 "));
    assert!(gathering_done(&s, &id));
    assert!(after.remote_candidates.contains("candidate:9 "));

    // свои кандидаты к себе не применялись
    let applied = s.factory.handle(&id).unwrap().remote_candidates();
    assert_eq!(applied.len(), 1);
    assert!(applied[0].candidate.starts_with("candidate:9 "));
}

#[tokio::test]
async fn events_after_teardown_are_dropped() {
    let s = side();
    let id = s.rtc.add_peer("x").unwrap().id;

    // set_local_description ставит в очередь кандидаты и конец сбора,
    // поток событий ещё не успел их забрать
    s.rtc.create_offer(&id).await.unwrap();
    // close добавляет в очередь ConnectionState("closed")
    s.rtc.teardown(&id).await.unwrap();

    let handle = s.factory.handle(&id).unwrap();
    assert!(eventually(|| handle.events_closed()).await);
    tokio::task::yield_now().await;

    let events = s.presenter.events();
    let removed_at = events
        .iter()
        .position(|e| matches!(e, PresenterEvent::Removed(r) if r == &id))
        .unwrap();
    assert!(!events[removed_at..]
        .iter()
        .any(|e| matches!(e, PresenterEvent::Updated(p) if p.id == id)));
    // до удаления поток событий ничего не применил
    assert!(!events[..removed_at].iter().any(|e| matches!(
        e,
        PresenterEvent::Updated(p) if !p.view.candidate_log.is_empty()
    )));

    assert!(matches!(
        s.rtc.snapshot(&id),
        Err(SignalError::UnknownPeer(_))
    ));
}

#[tokio::test]
async fn rejected_remote_offer_leaves_status_unchanged() {
    let s = side();
    let id = s.rtc.add_peer("x").unwrap().id;

    // answer вместо offer: peer connection отклоняет его
    let answer = r#"{"type":"answer","sdp":"v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n"}"#;
    s.rtc.set_remote_description_text(&id, answer).unwrap();

    let err = s.rtc.accept_offer_and_answer(&id).await.unwrap_err();
    assert!(err.to_string().starts_with("Error setting remote description"));
    let snapshot = view(&s, &id);
    assert_eq!(snapshot.view.status, PeerStatus::Idle);
    assert!(snapshot.view.local_description.is_empty());
}
