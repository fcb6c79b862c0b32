use crate::peer::types::{PeerId, ServerConfig};
use rand::Rng;

pub const DEFAULT_PEER_LABEL: &str = "peer";

/// Случайный hex-суффикс (5 байт = 10 символов)
pub fn random_suffix() -> String {
    hex::encode(rand::rng().random::<[u8; 5]>())
}

/// `alice` -> `alice-3f9a0c1b7e`; пустая метка превращается в `peer`
pub fn make_peer_id(label: &str) -> PeerId {
    let label = label.trim();
    let label = if label.is_empty() {
        DEFAULT_PEER_LABEL
    } else {
        label
    };
    PeerId::from(format!("{}-{}", label, random_suffix()))
}

// Функция для добавления схемы протокола к URL ICE сервера, если она отсутствует
pub fn add_ice_url_scheme(config: &ServerConfig) -> String {
    // Если url уже начинается с "turn:" или "stun:", возвращаем как есть
    if config.url.starts_with("turn:")
        || config.url.starts_with("turns:")
        || config.url.starts_with("stun:")
        || config.url.starts_with("stuns:")
    {
        config.url.clone()
    } else {
        // В зависимости от типа сервера добавляем нужную схему
        let scheme = if config.r#type == "turn" {
            "turn:"
        } else {
            "stun:"
        };
        format!("{}{}", scheme, config.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(kind: &str, url: &str) -> ServerConfig {
        ServerConfig {
            id: "s".into(),
            r#type: kind.into(),
            url: url.into(),
            username: None,
            credential: None,
        }
    }

    #[test]
    fn blank_label_falls_back_to_peer() {
        let id = make_peer_id("   ");
        assert!(id.as_str().starts_with("peer-"));
        assert_eq!(id.as_str().len(), "peer-".len() + 10);
    }

    #[test]
    fn label_is_trimmed() {
        assert!(make_peer_id(" bob ").as_str().starts_with("bob-"));
    }

    #[test]
    fn scheme_added_from_type() {
        assert_eq!(
            add_ice_url_scheme(&server("turn", "relay.example.org:3478")),
            "turn:relay.example.org:3478"
        );
        assert_eq!(
            add_ice_url_scheme(&server("stun", "stun.example.org:3478")),
            "stun:stun.example.org:3478"
        );
        assert_eq!(
            add_ice_url_scheme(&server("turn", "stun:stun.example.org")),
            "stun:stun.example.org"
        );
    }
}
