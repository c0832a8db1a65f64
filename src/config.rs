use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::gamma::DEFAULT_GAMMA;
use crate::geometry::Geometry;
use crate::mapper::CropPolicy;
use crate::opc::{BROADCAST_CHANNEL, DEFAULT_PORT};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub sink: SinkConfig,
    pub display: Geometry,
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    #[serde(default)]
    pub crop: CropPolicy,
    /// OPC channel the frames address (0 = every string)
    #[serde(default)]
    pub channel: u8,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// OPC receiver reached over TCP
    Tcp {
        host: String,
        #[serde(default = "default_port")]
        port: u16,
    },
    /// Append frames to a file (or a named pipe)
    File { path: String },
    /// Serial device receiving raw OPC frames
    Serial { port: String, baud_rate: u32 },
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Red, green, blue, black cycle
    #[default]
    TestPattern,
    /// Static PNG image, re-sent every frame
    Png { path: String },
}

fn default_gamma() -> f64 {
    DEFAULT_GAMMA
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_fps() -> u32 {
    30
}

impl Config {
    /// Config for a TCP receiver with every other option at its default
    pub fn new(host: &str, port: u16, width: usize, height: usize) -> Result<Self> {
        Ok(Config {
            sink: SinkConfig::Tcp {
                host: host.to_string(),
                port,
            },
            display: Geometry::new(width, height)?,
            gamma: DEFAULT_GAMMA,
            crop: CropPolicy::default(),
            channel: BROADCAST_CHANNEL,
            source: SourceConfig::default(),
            fps: default_fps(),
        })
    }

    /// Read and validate a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(data).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(Error::Config("fps must be greater than zero".into()));
        }
        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(Error::Config(format!("gamma must be positive, got {}", self.gamma)));
        }
        Ok(())
    }
}
