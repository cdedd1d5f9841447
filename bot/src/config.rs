/// Environment-backed configuration.
///
/// Everything is optional except the bot token. Numeric values fall back
/// to their defaults when missing or unparsable; a malformed allow-list
/// entry is a hard error.
use std::collections::HashSet;

use leech_shared::errors::{LeechError, LeechResult};

pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 2;
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot credential.
    pub bot_token: String,
    /// User ids allowed to start downloads. Empty means everyone.
    pub allowed_users: HashSet<u64>,
    /// Admission gate capacity.
    pub max_concurrent_downloads: usize,
    /// Largest artifact the bot will upload, in bytes.
    pub max_file_size_bytes: u64,
    /// Downloader executable.
    pub ytdlp_bin: String,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> LeechResult<Self> {
        let bot_token = std::env::var("BOT_TOKEN")
            .map_err(|_| LeechError::Config("BOT_TOKEN missing in environment".to_string()))?;

        let allowed_users =
            parse_allowed_users(&std::env::var("ALLOWED_USERS").unwrap_or_default())?;

        let max_concurrent_downloads = std::env::var("MAX_CONCURRENT_DOWNLOADS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_CONCURRENT_DOWNLOADS);

        let max_file_size_bytes = std::env::var("MAX_FILE_SIZE_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_FILE_SIZE_BYTES);

        let ytdlp_bin = std::env::var("YTDLP_BIN").unwrap_or_else(|_| "yt-dlp".to_string());

        Ok(Self {
            bot_token,
            allowed_users,
            max_concurrent_downloads,
            max_file_size_bytes,
            ytdlp_bin,
        })
    }

    /// Whether the sender may start downloads. An empty allow-list admits
    /// everyone; an absent sender identity is rejected once a list exists.
    pub fn is_authorized(&self, user_id: Option<u64>) -> bool {
        if self.allowed_users.is_empty() {
            return true;
        }
        match user_id {
            Some(id) => self.allowed_users.contains(&id),
            None => false,
        }
    }
}

/// Parse a comma-separated list of numeric user ids. Blank entries are
/// skipped; anything non-numeric is a configuration error.
fn parse_allowed_users(raw: &str) -> LeechResult<HashSet<u64>> {
    let mut users = HashSet::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let id = entry.parse::<u64>().map_err(|_| {
            LeechError::Config(format!("ALLOWED_USERS entry is not a user id: {:?}", entry))
        })?;
        users.insert(id);
    }
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_users(users: &[u64]) -> Config {
        Config {
            bot_token: "test-token".to_string(),
            allowed_users: users.iter().copied().collect(),
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            ytdlp_bin: "yt-dlp".to_string(),
        }
    }

    #[test]
    fn test_parse_allowed_users() {
        let users = parse_allowed_users("123, 456 ,789").unwrap();
        assert_eq!(users.len(), 3);
        assert!(users.contains(&456));
    }

    #[test]
    fn test_blank_entries_skipped() {
        let users = parse_allowed_users("123,, ,456,").unwrap();
        assert_eq!(users.len(), 2);
    }

    #[test]
    fn test_empty_list() {
        assert!(parse_allowed_users("").unwrap().is_empty());
    }

    #[test]
    fn test_non_numeric_entry() {
        assert!(parse_allowed_users("123,bob").is_err());
    }

    #[test]
    fn test_missing_token_is_fatal() {
        std::env::remove_var("BOT_TOKEN");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, LeechError::Config(_)));
    }

    #[test]
    fn test_empty_allow_list_admits_everyone() {
        let config = config_with_users(&[]);
        assert!(config.is_authorized(Some(42)));
        assert!(config.is_authorized(None));
    }

    #[test]
    fn test_allow_list_members_only() {
        let config = config_with_users(&[42]);
        assert!(config.is_authorized(Some(42)));
        assert!(!config.is_authorized(Some(43)));
        assert!(!config.is_authorized(None));
    }
}
