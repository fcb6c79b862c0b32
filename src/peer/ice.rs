use crate::error::{Result, SignalError};
use tracing::{debug, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;

/// Непустые строки из вставленного блока кандидатов (`\n` или `\r\n`)
pub fn candidate_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// Одна строка JSON → RTCIceCandidateInit
pub fn parse_candidate(line: &str) -> Result<RTCIceCandidateInit> {
    serde_json::from_str::<RTCIceCandidateInit>(line).map_err(|e| SignalError::CandidateParse {
        line: line.to_owned(),
        reason: e.to_string(),
    })
}

pub fn serialize_candidate(candidate: &RTCIceCandidateInit) -> Result<String> {
    serde_json::to_string(candidate).map_err(|e| SignalError::CandidateParse {
        line: candidate.candidate.clone(),
        reason: e.to_string(),
    })
}

/// Маркер конца кандидатов; браузеры понимают его так же
pub const END_OF_CANDIDATES: &str = r#"{"candidate":""}"#;

pub fn end_of_candidates_line() -> String {
    END_OF_CANDIDATES.to_owned()
}

pub fn is_end_of_candidates(candidate: &RTCIceCandidateInit) -> bool {
    candidate.candidate.trim().is_empty()
}

/// Добавляет строку в лог кандидатов, как в текстовом поле UI
pub fn append_line(log: &mut String, line: &str) {
    let current = log.trim();
    *log = if current.is_empty() {
        line.to_owned()
    } else {
        format!("{current}\n{line}")
    };
}

pub fn analyze_candidates(peer: &str, candidates: &[RTCIceCandidateInit]) {
    let mut host_count = 0;
    let mut srflx_count = 0;
    let mut relay_count = 0;

    for candidate in candidates {
        if candidate.candidate.contains("typ host") {
            host_count += 1;
        } else if candidate.candidate.contains("typ srflx") {
            srflx_count += 1;
        } else if candidate.candidate.contains("typ relay") {
            relay_count += 1;
        }
    }

    debug!(
        peer,
        "Candidate analysis: {} host, {} srflx, {} relay", host_count, srflx_count, relay_count
    );

    if !candidates.is_empty() && host_count == 0 && srflx_count == 0 && relay_count == 0 {
        warn!(peer, "remote candidates carry no recognised candidate type");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_crlf_and_skips_blank_lines() {
        let text = "a\r\n\r\n  b  \n\n c\n";
        assert_eq!(candidate_lines(text).collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn parses_browser_candidate_json() {
        let init = RTCIceCandidateInit {
            candidate: "candidate:1 1 udp 2130706431 192.168.1.2 50000 typ host".into(),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
            username_fragment: None,
        };
        let line = serialize_candidate(&init).unwrap();
        let back = parse_candidate(&line).unwrap();
        assert_eq!(back.candidate, init.candidate);
        assert_eq!(back.sdp_mid.as_deref(), Some("0"));
        assert_eq!(back.sdp_mline_index, Some(0));
    }

    #[test]
    fn malformed_line_is_a_parse_error() {
        let err = parse_candidate(r#"{"candidate": "candidate:1 1 udp"#).unwrap_err();
        assert!(matches!(err, SignalError::CandidateParse { .. }));
        assert!(parse_candidate("not json").is_err());
    }

    #[test]
    fn end_marker_round_trips() {
        let line = end_of_candidates_line();
        assert_eq!(line, r#"{"candidate":""}"#);
        assert!(is_end_of_candidates(&parse_candidate(&line).unwrap()));
    }

    #[test]
    fn append_line_joins_with_newlines() {
        let mut log = String::new();
        append_line(&mut log, "one");
        append_line(&mut log, "two");
        assert_eq!(log, "one\ntwo");

        let mut padded = String::from("one\n\n  ");
        append_line(&mut padded, "two");
        assert_eq!(padded, "one\ntwo");
    }
}
