use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// API key used when GEMINI_API_KEY is not set
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,
}

fn default_system_instruction() -> String {
    "You are a helpful and friendly assistant. Keep your responses concise and informative."
        .to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        ChatConfig {
            system_instruction: default_system_instruction(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpeechConfig {
    /// Prebuilt voice for text-to-speech
    #[serde(default = "default_tts_voice")]
    pub tts_voice: String,
    /// Prebuilt voice for the live conversation model
    #[serde(default = "default_live_voice")]
    pub live_voice: String,
    #[serde(default = "default_live_instruction")]
    pub live_instruction: String,
}

fn default_tts_voice() -> String {
    "Kore".to_string()
}

fn default_live_voice() -> String {
    "Zephyr".to_string()
}

fn default_live_instruction() -> String {
    "You are a helpful assistant.".to_string()
}

impl Default for SpeechConfig {
    fn default() -> Self {
        SpeechConfig {
            tts_voice: default_tts_voice(),
            live_voice: default_live_voice(),
            live_instruction: default_live_instruction(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: String::new(),
            chat: ChatConfig::default(),
            speech: SpeechConfig::default(),
        }
    }
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".gemini-workbench"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("settings.yaml"))
    }

    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            let config: Config = serde_yaml::from_str(&contents)
                .context("Failed to parse config file")?;

            // Validate configuration after loading
            config.validate()?;

            Ok(config)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            println!("Created default config at: {}", config_path.display());
            Ok(config)
        }
    }

    /// Resolve the API key: environment variable wins over the config file
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }
        if !self.api_key.trim().is_empty() {
            return Ok(self.api_key.clone());
        }
        bail!(
            "No API key configured.\n\n\
             Set the GEMINI_API_KEY environment variable, or add it to {}:\n  \
             api_key: \"your-key-here\"",
            Self::config_path()?.display()
        )
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.chat.system_instruction.is_empty() {
            bail!("chat.system_instruction cannot be empty");
        }
        if self.speech.tts_voice.is_empty() {
            bail!("speech.tts_voice cannot be empty");
        }
        if self.speech.live_voice.is_empty() {
            bail!("speech.live_voice cannot be empty");
        }
        if self.speech.live_instruction.is_empty() {
            bail!("speech.live_instruction cannot be empty");
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir()?;
        fs::create_dir_all(&config_dir)
            .context("Failed to create config directory")?;

        let config_path = Self::config_path()?;
        let yaml = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs::write(&config_path, yaml)
            .context("Failed to write config file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_voice_rejected() {
        let mut config = Config::default();
        config.speech.tts_voice = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: Config = serde_yaml::from_str("api_key: abc\n").unwrap();
        assert_eq!(config.api_key, "abc");
        assert_eq!(config.speech.live_voice, "Zephyr");
        assert!(config.validate().is_ok());
    }
}
