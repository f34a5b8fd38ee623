use std::path::Path;

use crate::error::ParseError;
use crate::types::SagaConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Auto,
}

#[derive(Debug, Clone)]
pub struct ParsedConfig {
    pub config: SagaConfig,
    pub format: ConfigFormat,
}

pub fn parse_config_str(input: &str, format: ConfigFormat) -> Result<ParsedConfig, ParseError> {
    match format {
        ConfigFormat::Json => Ok(ParsedConfig {
            config: serde_json::from_str::<SagaConfig>(input)?,
            format,
        }),
        ConfigFormat::Yaml => Ok(ParsedConfig {
            config: serde_yaml::from_str::<SagaConfig>(input)?,
            format,
        }),
        ConfigFormat::Auto => parse_config_auto(input),
    }
}

pub fn load_config_file(path: &Path) -> Result<ParsedConfig, ParseError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content, ConfigFormat::Auto)
}

fn parse_config_auto(input: &str) -> Result<ParsedConfig, ParseError> {
    // JSON always starts with `{` or `[` after trimming.
    let trimmed = input.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return match serde_json::from_str::<SagaConfig>(input) {
            Ok(config) => Ok(ParsedConfig {
                config,
                format: ConfigFormat::Json,
            }),
            Err(e) => match serde_yaml::from_str::<SagaConfig>(input) {
                Ok(config) => Ok(ParsedConfig {
                    config,
                    format: ConfigFormat::Yaml,
                }),
                Err(_) => Err(ParseError::Json(e)),
            },
        };
    }

    match serde_yaml::from_str::<SagaConfig>(input) {
        Ok(config) => Ok(ParsedConfig {
            config,
            format: ConfigFormat::Yaml,
        }),
        Err(e) => {
            if let Ok(config) = serde_json::from_str::<SagaConfig>(input) {
                return Ok(ParsedConfig {
                    config,
                    format: ConfigFormat::Json,
                });
            }
            Err(ParseError::Yaml(e))
        }
    }
}
