//! TOML configuration for one mesh endpoint (spec.md §4.8, §6.4). Grounded
//! on `game::core::config::GameConfig`'s `Default` + `serdeconv::from_toml_file`
//! idiom.

use meshwire_transport::FrameConfig;
use serde_derive::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub address: String,
    pub start_byte: u8,
    pub end_byte: u8,
    pub max_frame_len: u32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            address: "127.0.0.1:28992".to_string(),
            start_byte: 0xCB,
            end_byte: 0xCE,
            max_frame_len: 16 * 1024 * 1024,
        }
    }
}

impl EndpointConfig {
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            start_byte: self.start_byte,
            end_byte: self.end_byte,
            max_frame_len: self.max_frame_len,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    pub source_id: String,
    pub source_sub_id: String,
    pub connection_key: String,
    pub compress: bool,
    pub encrypt: bool,
    pub bridge_line: bool,
    pub auto_echo: bool,
    pub echo_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            source_id: "node".to_string(),
            source_sub_id: String::new(),
            connection_key: String::new(),
            compress: false,
            encrypt: false,
            bridge_line: false,
            auto_echo: true,
            echo_interval_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub workers_high: usize,
    pub workers_normal: usize,
    pub workers_low: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig { workers_high: 2, workers_normal: 2, workers_low: 1 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshConfig {
    pub endpoint: EndpointConfig,
    pub session: SessionSettings,
    pub pool: PoolConfig,
}

impl MeshConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> MeshConfig {
        serdeconv::from_toml_file(path).expect("Error loading mesh configuration file")
    }
}
