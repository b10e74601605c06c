// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Project configuration.
//!
//! Configuration is loaded from `hudl.toml` at the project root; every
//! section is optional and falls back to defaults.
//!
//! # Example Configuration
//!
//! ```toml
//! [project]
//! name = "my-app"
//!
//! [dev]
//! host = "localhost"
//! port = 9999
//! templates_dir = "templates"
//!
//! [render]
//! deadline_ms = 5000
//! ```
//!
//! The `HUDL_DEV_ADDR` environment variable (`host:port`) overrides the
//! `[dev]` address, matching what host applications read in dev mode.

use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Main configuration structure loaded from `hudl.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Project metadata.
    #[serde(default)]
    pub project: ProjectConfig,
    /// Development server settings.
    #[serde(default)]
    pub dev: DevConfig,
    /// Render limits.
    #[serde(default)]
    pub render: RenderConfig,
}

/// Project metadata configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Project name (default: "unnamed").
    #[serde(default = "default_name")]
    pub name: String,
}

/// Development server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DevConfig {
    /// Server port (default: 9999).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Server host (default: "localhost").
    #[serde(default = "default_host")]
    pub host: String,
    /// Templates directory (default: "templates").
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
}

/// Render limits.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Per-render wall-clock deadline in milliseconds (default: 5000).
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
}

fn default_name() -> String {
    "unnamed".to_string()
}

fn default_port() -> u16 {
    9999
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_templates_dir() -> String {
    "templates".to_string()
}

fn default_deadline_ms() -> u64 {
    5000
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { name: default_name() }
    }
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            templates_dir: default_templates_dir(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { deadline_ms: default_deadline_ms() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            dev: DevConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from `hudl.toml` in the current directory,
    /// falling back to defaults when no file exists.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Path::new("hudl.toml");
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// The dev server address, with `HUDL_DEV_ADDR` taking precedence.
    pub fn dev_addr(&self) -> String {
        match std::env::var("HUDL_DEV_ADDR") {
            Ok(addr) if !addr.is_empty() => addr,
            _ => format!("{}:{}", self.dev.host, self.dev.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.dev.port, 9999);
        assert_eq!(config.dev.host, "localhost");
        assert_eq!(config.dev.templates_dir, "templates");
        assert_eq!(config.render.deadline_ms, 5000);
    }

    #[test]
    fn partial_sections_fill_in() {
        let config: Config = toml::from_str("[dev]\nport = 4000\n").unwrap();
        assert_eq!(config.dev.port, 4000);
        assert_eq!(config.dev.host, "localhost");
    }
}
