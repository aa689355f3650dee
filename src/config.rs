use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_LABEL_NAME: &str = "AUTO_REPLIED";
pub const DEFAULT_MAX_RESULTS: u32 = 5;
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_API_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_TEMPERATURE: f64 = 0.4;
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    Static,
    #[default]
    Generated,
}

impl std::str::FromStr for ReplyMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "static" => Ok(ReplyMode::Static),
            "generated" => Ok(ReplyMode::Generated),
            _ => anyhow::bail!("Invalid reply mode: {}. Use 'static' or 'generated'", s),
        }
    }
}

impl std::fmt::Display for ReplyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplyMode::Static => write!(f, "static"),
            ReplyMode::Generated => write!(f, "generated"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the label marking messages that already got a reply
    pub label_name: String,
    /// Senders eligible for a reply; accepts a single string or a list
    #[serde(deserialize_with = "string_or_list")]
    pub allowed_senders: Vec<String>,
    pub reply_mode: ReplyMode,
    pub max_results: u32,
    pub model: String,
    pub api_base_url: String,
    pub temperature: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            label_name: DEFAULT_LABEL_NAME.to_string(),
            allowed_senders: Vec::new(),
            reply_mode: ReplyMode::default(),
            max_results: DEFAULT_MAX_RESULTS,
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gmail-autoreply")
}

fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Google OAuth client secrets downloaded from the cloud console
pub fn credentials_path() -> PathBuf {
    config_dir().join("credentials.json")
}

pub fn token_path() -> PathBuf {
    config_dir().join("token.json")
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let dir = config_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_path(), content)?;
        Ok(())
    }

    /// Exact address match, ignoring ASCII case
    pub fn is_sender_allowed(&self, sender: &str) -> bool {
        self.allowed_senders
            .iter()
            .map(|allowed| allowed.trim())
            .any(|allowed| !allowed.is_empty() && allowed.eq_ignore_ascii_case(sender))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(cfg.label_name, "AUTO_REPLIED");
        assert_eq!(cfg.max_results, 5);
        assert_eq!(cfg.reply_mode, ReplyMode::Generated);
        assert!(cfg.allowed_senders.is_empty());
    }

    #[test]
    fn test_allowed_senders_accepts_single_string() {
        let cfg: Config = serde_json::from_str(r#"{"allowed_senders": "a@x.com"}"#).unwrap();
        assert_eq!(cfg.allowed_senders, vec!["a@x.com"]);
        assert_eq!(cfg.label_name, "AUTO_REPLIED");
    }

    #[test]
    fn test_allowed_senders_accepts_list() {
        let cfg: Config = serde_json::from_str(
            r#"{"allowed_senders": ["a@x.com", "b@y.org"], "reply_mode": "static", "max_results": 3}"#,
        )
        .unwrap();
        assert_eq!(cfg.allowed_senders.len(), 2);
        assert_eq!(cfg.reply_mode, ReplyMode::Static);
        assert_eq!(cfg.max_results, 3);
    }

    #[test]
    fn test_sender_match_is_case_insensitive() {
        let cfg = Config {
            allowed_senders: vec!["Someone@Gmail.com".to_string()],
            ..Config::default()
        };
        assert!(cfg.is_sender_allowed("someone@gmail.com"));
        assert!(!cfg.is_sender_allowed("someone@gmail.com.evil"));
        assert!(!cfg.is_sender_allowed(""));
    }

    #[test]
    fn test_sender_is_compared_untrimmed() {
        let cfg = Config {
            allowed_senders: vec!["  a@x.com ".to_string()],
            ..Config::default()
        };
        // configured entries are trimmed, the extracted sender is not
        assert!(cfg.is_sender_allowed("a@x.com"));
        assert!(!cfg.is_sender_allowed(" a@x.com"));
        assert!(!cfg.is_sender_allowed("a@x.com\n"));
    }

    #[test]
    fn test_reply_mode_parse() {
        assert_eq!("static".parse::<ReplyMode>().unwrap(), ReplyMode::Static);
        assert!("other".parse::<ReplyMode>().is_err());
    }
}
