//! Configuration for the order dump tool.

use std::path::Path;

use serde::{Deserialize, Serialize};

use orderwire_core::protocol::EdgeRect;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    /// Channel endpoint settings.
    pub channel: ChannelConfig,
    /// The desktop geometry announced to the display side.
    pub display: DisplayConfig,
    /// Output settings.
    pub output: OutputConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Which display endpoint to connect to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Session number in the socket name.
    pub session_id: u32,
    /// Channel name in the socket name.
    pub name: String,
    /// Socket base directory. Empty = the platform default.
    pub base_dir: String,
    /// How long to wait for the endpoint to appear, in seconds.
    pub connect_timeout_secs: u64,
}

/// Capabilities announced on connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Desktop width in pixels.
    pub width: u32,
    /// Desktop height in pixels.
    pub height: u32,
    /// Color depth in bits per pixel.
    pub color_depth: u32,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Print each received order as a JSON line on stdout.
    pub json: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            display: DisplayConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            session_id: 0,
            name: "display".into(),
            base_dir: String::new(),
            connect_timeout_secs: 10,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            color_depth: 32,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { json: false }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl DumpConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// The refresh area covering the announced desktop, clamped to
    /// the edge coordinate range.
    pub fn full_screen_area(&self) -> EdgeRect {
        let right = self.display.width.saturating_sub(1).min(u16::MAX as u32) as u16;
        let bottom = self.display.height.saturating_sub(1).min(u16::MAX as u32) as u16;
        EdgeRect::new(0, 0, right, bottom)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = DumpConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("session_id"));
        assert!(text.contains("color_depth"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = DumpConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: DumpConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.channel.name, "display");
        assert_eq!(parsed.display.width, 1024);
    }

    #[test]
    fn full_screen_area_is_inclusive_and_clamped() {
        let cfg = DumpConfig::default();
        let area = cfg.full_screen_area();
        assert_eq!((area.right, area.bottom), (1023, 767));
        assert_eq!(area.width(), 1024);

        let mut huge = DumpConfig::default();
        huge.display.width = 1 << 20;
        assert_eq!(huge.full_screen_area().right, u16::MAX);
    }
}
