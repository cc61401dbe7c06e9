//! # IoT Core
//!
//! Crate compartilhada que define o protocolo binário de frames
//! (header fixo + payload + CRC-16/Modbus), o payload de leitura de
//! sensores e a configuração TOML do gateway e do simulador.
//!
//! ## Módulos
//! - [`protocol`] – Encode/decode de frames e CRC-16/Modbus
//! - [`sensor`] – Payload de 20 bytes com temperatura, umidade, luz e timestamp
//! - [`config`] – Configuração unificada via TOML

pub mod config;
pub mod protocol;
pub mod sensor;

// Re-exports convenientes
pub use config::{AppConfig, DeviceConfig, GatewayConfig};
pub use protocol::{Command, DecodeError, DecodedFrame, Frame, PROTOCOL_VERSION, decode, encode};
pub use sensor::SensorReport;
