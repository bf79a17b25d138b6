//! Configuration: environment files, env vars, and the OS keychain.
//!
//! Resolution order for every value:
//!   1. Process environment (after `.env.local` / `.env` are loaded)
//!   2. OS keychain (completion API key only)
//!   3. Built-in default
//!
//! Missing service credentials are not an error here. They surface as
//! a configuration failure on the first request that needs them.

use crate::capture::TargetLanguage;
use std::path::PathBuf;
use std::time::Duration;

const KEYRING_SERVICE: &str = "crackmate";
const KEYRING_USER: &str = "completion";

const DEFAULT_RETRY_DELAY_MS: u64 = 1200;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_MIC_DEBOUNCE_MS: u64 = 500;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Remote completion endpoint settings.
#[derive(Debug, Clone, Default)]
pub struct CompletionSettings {
    /// Base URL, e.g. `https://my-resource.openai.azure.com/`.
    pub api_url: Option<String>,
    pub deployment_id: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Document Intelligence settings for PDF/DOCX resumes.
#[derive(Debug, Clone, Default)]
pub struct ExtractionSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

/// Knobs for the retry policy and trigger handling.
#[derive(Debug, Clone)]
pub struct PolicySettings {
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub mic_debounce: Duration,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            mic_debounce: Duration::from_millis(DEFAULT_MIC_DEBOUNCE_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub completion: CompletionSettings,
    pub extraction: ExtractionSettings,
    pub policy: PolicySettings,
    pub default_language: TargetLanguage,
}

impl Settings {
    /// Build settings from the current process environment.
    pub fn from_env() -> Self {
        let completion = CompletionSettings {
            api_url: env_value("COMPLETION_API_URL").map(with_trailing_slash),
            deployment_id: env_value("COMPLETION_DEPLOYMENT_ID"),
            api_key: env_value("COMPLETION_API_KEY").or_else(keychain_api_key),
            timeout: Duration::from_secs(
                env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
        };

        let extraction = ExtractionSettings {
            endpoint: env_value("DOC_INTELLIGENCE_ENDPOINT").map(with_trailing_slash),
            api_key: env_value("DOC_INTELLIGENCE_KEY"),
        };

        let policy = PolicySettings {
            retry_delay: Duration::from_millis(
                env_parse("RETRY_DELAY_MS").unwrap_or(DEFAULT_RETRY_DELAY_MS),
            ),
            max_retries: env_parse("MAX_RETRIES").unwrap_or(DEFAULT_MAX_RETRIES),
            mic_debounce: Duration::from_millis(
                env_parse("MIC_DEBOUNCE_MS").unwrap_or(DEFAULT_MIC_DEBOUNCE_MS),
            ),
        };

        let default_language = match env_value("TARGET_LANGUAGE") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                log::warn!("[CONFIG] {}; falling back to Java", e);
                TargetLanguage::Java
            }),
            None => TargetLanguage::Java,
        };

        log::info!(
            "[CONFIG] completion configured: {}, extraction configured: {}",
            completion.api_url.is_some() && completion.deployment_id.is_some() && completion.api_key.is_some(),
            extraction.endpoint.is_some() && extraction.api_key.is_some()
        );

        Self {
            completion,
            extraction,
            policy,
            default_language,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            completion: CompletionSettings {
                timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
                ..Default::default()
            },
            extraction: ExtractionSettings::default(),
            policy: PolicySettings::default(),
            default_language: TargetLanguage::Java,
        }
    }
}

/// Load `.env.local` → `.env` from the working directory, then the
/// per-user `.env` under the config dir. The first project file found
/// wins; the per-user file only fills gaps.
///
/// Runs before the logger is initialised, so it reports via stderr.
pub fn load_env_files() {
    'env_load: for env_file in [".env.local", ".env"] {
        let path = PathBuf::from(env_file);
        if path.exists() {
            match dotenvy::from_path(&path) {
                Ok(_) => eprintln!("[STARTUP] Loaded {}", path.display()),
                Err(e) => eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e),
            }
            break 'env_load;
        }
    }

    if let Some(user_env) = user_env_path() {
        if user_env.exists() {
            if let Err(e) = dotenvy::from_path(&user_env) {
                eprintln!("[STARTUP] Failed to load {}: {}", user_env.display(), e);
            }
        }
    }
}

/// `~/.config/crackmate/.env` (platform equivalent).
pub fn user_env_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("crackmate").join(".env"))
}

/// Save the completion API key to the OS keychain.
pub fn save_api_key(api_key: &str) -> Result<(), String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)
        .map_err(|e| format!("Keyring error: {}", e))?;
    entry
        .set_password(api_key)
        .map_err(|e| format!("Failed to save key: {}", e))?;
    log::info!("[CONFIG] Completion API key saved to OS keychain");
    Ok(())
}

fn keychain_api_key() -> Option<String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER).ok()?;
    match entry.get_password() {
        Ok(key) if !key.is_empty() => {
            log::info!("[CONFIG] Loaded completion key from OS keychain");
            Some(key)
        }
        _ => None,
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_value(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("[CONFIG] Ignoring unparseable {}={}", key, raw);
            None
        }
    }
}

fn with_trailing_slash(url: String) -> String {
    if url.ends_with('/') {
        url
    } else {
        format!("{}/", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let policy = PolicySettings::default();
        assert_eq!(policy.retry_delay, Duration::from_millis(1200));
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.mic_debounce, Duration::from_millis(500));
        assert_eq!(Settings::default().completion.timeout, Duration::from_secs(30));
    }

    #[test]
    fn base_urls_get_trailing_slash() {
        assert_eq!(with_trailing_slash("https://x.test".into()), "https://x.test/");
        assert_eq!(with_trailing_slash("https://x.test/".into()), "https://x.test/");
    }

    #[test]
    fn env_parse_ignores_garbage() {
        std::env::set_var("CRACKMATE_TEST_PARSE", "not-a-number");
        assert_eq!(env_parse::<u64>("CRACKMATE_TEST_PARSE"), None);
        std::env::set_var("CRACKMATE_TEST_PARSE", " 42 ");
        assert_eq!(env_parse::<u64>("CRACKMATE_TEST_PARSE"), Some(42));
        std::env::remove_var("CRACKMATE_TEST_PARSE");
    }
}
