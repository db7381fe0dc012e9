//! Tunable game constants and local peer settings
//!
//! Both structs have sensible defaults and can be overridden from the
//! environment (a `.env` file is loaded by the binary before these are read).

use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_PHRASES: &[&str] = &[
    "The Eiffel Tower",
    "Harry Potter",
    "Star Wars",
    "Pizza Party",
    "Birthday Cake",
    "Beach Vacation",
    "Rainy Day",
    "Coffee Break",
    "Movie Night",
    "Road Trip",
    "Ice Cream Sundae",
    "Full Moon",
    "Snowman",
    "Pirate Ship",
    "Rock and Roll",
    "Haunted House",
    "Space Station",
    "Fire Truck",
    "Hot Dog",
    "Christmas Tree",
    "Love Letter",
    "Sleeping Beauty",
    "The Lion King",
    "Spider Man",
    "Time Flies",
    "Broken Heart",
    "Money Tree",
    "Rainbow Unicorn",
    "Piece of Cake",
    "Night Owl",
];

const DEFAULT_EMOJI_PALETTE: &[&str] = &[
    "😀", "😂", "😍", "😎", "😱", "😴", "🤔", "👻", "👑", "💔", "❤️", "🔥", "⭐", "🌙", "☀️",
    "🌧️", "🌈", "❄️", "⛄", "🌊", "🏖️", "🌳", "🎄", "🌹", "🍕", "🍔", "🌭", "🍦", "🎂", "☕",
    "🍰", "🐶", "🐱", "🦁", "🦄", "🦉", "🕷️", "🐍", "🚗", "🚒", "🚀", "✈️", "🚢", "🏴‍☠️", "🏠",
    "🗼", "🗽", "🏰", "🎬", "🎸", "🎤", "🎉", "🎁", "💰", "⏰", "✉️", "⚡", "🧙", "🦸", "🇫🇷",
    "🇺🇸", "🇬🇧", "🇯🇵", "➕", "➖", "❓",
];

/// Game rules shared by every node of a session
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub max_rounds: u32,
    pub min_players: usize,
    pub connection_timeout: Duration,
    pub round_delay: Duration,
    pub points_correct_guess: u32,
    pub points_describer: u32,
    pub phrases: Vec<String>,
    pub emoji_palette: Vec<String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            min_players: 2,
            connection_timeout: Duration::from_secs(10),
            round_delay: Duration::from_secs(3),
            points_correct_guess: 10,
            points_describer: 5,
            phrases: DEFAULT_PHRASES.iter().map(|p| p.to_string()).collect(),
            emoji_palette: DEFAULT_EMOJI_PALETTE.iter().map(|e| e.to_string()).collect(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_list(key: &str, separator: char) -> Option<Vec<String>> {
    let raw = std::env::var(key).ok()?;
    let items: Vec<String> = raw
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!items.is_empty()).then_some(items)
}

impl GameConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            max_rounds: env_parse("MAX_ROUNDS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_rounds),
            min_players: env_parse("MIN_PLAYERS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.min_players),
            connection_timeout: env_parse("CONNECTION_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.connection_timeout),
            round_delay: env_parse("ROUND_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.round_delay),
            points_correct_guess: env_parse("POINTS_CORRECT_GUESS")
                .unwrap_or(defaults.points_correct_guess),
            points_describer: env_parse("POINTS_DESCRIBER").unwrap_or(defaults.points_describer),
            phrases: env_list("PHRASES", '|').unwrap_or(defaults.phrases),
            emoji_palette: env_list("EMOJI_PALETTE", ' ').unwrap_or(defaults.emoji_palette),
        };

        tracing::info!(
            max_rounds = config.max_rounds,
            min_players = config.min_players,
            connection_timeout_ms = config.connection_timeout.as_millis() as u64,
            round_delay_ms = config.round_delay.as_millis() as u64,
            phrases = config.phrases.len(),
            "Game config loaded"
        );

        config
    }

    pub fn is_palette_emoji(&self, emoji: &str) -> bool {
        self.emoji_palette.iter().any(|e| e == emoji)
    }
}

/// Settings for the local peer process
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Address the transport listens on. Its resolved form becomes the peer id.
    pub bind: SocketAddr,
    /// Base URL the join link is built from
    pub base_url: String,
    pub player_name: String,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            base_url: "http://localhost:6573/".to_string(),
            player_name: generate_player_name(),
        }
    }
}

impl PeerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind = match std::env::var("PEER_BIND") {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
                tracing::warn!("Invalid PEER_BIND {:?}: {}, using {}", raw, e, defaults.bind);
                defaults.bind
            }),
            Err(_) => defaults.bind,
        };

        let base_url = std::env::var("PUBLIC_BASE_URL")
            .ok()
            .and_then(|url| {
                let trimmed = url.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or(defaults.base_url);

        let player_name = std::env::var("PLAYER_NAME")
            .ok()
            .and_then(|name| {
                let trimmed = name.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or(defaults.player_name);

        Self {
            bind,
            base_url,
            player_name,
        }
    }
}

/// Friendly fallback display name, e.g. "Brave Otter"
pub fn generate_player_name() -> String {
    petname::petname(2, " ")
        .map(|name| {
            name.split(' ')
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<String>>()
                .join(" ")
        })
        .unwrap_or_else(|| "Player".to_string())
}
