//! Configuração unificada via TOML.
//!
//! Um único `config.toml` ao lado do executável serve gateway e simulador.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Dispositivo alvo padrão dos comandos de controle.
pub const DEFAULT_DEVICE_ID: u32 = 0x0102_0304;

/// Variável de ambiente que sobrescreve o caminho do config.
pub const CONFIG_ENV: &str = "IOT_CONFIG";

/// Erros ao ler ou gravar a configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro de serialização TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("TOML inválido: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Erro de I/O em {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Histórico das leituras em CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub enabled: bool,
    /// Caminho do arquivo CSV (relativo ao diretório de trabalho)
    pub csv_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            csv_path: "iot_data.csv".into(),
        }
    }
}

/// Configuração do Gateway (servidor WebSocket).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// IP para bind (0.0.0.0 = todas as interfaces)
    pub host: String,
    /// Porta TCP do WebSocket
    pub port: u16,
    /// Dispositivo alvo dos comandos de controle digitados no console
    pub control_device_id: u32,
    /// Capacidade do channel para o display
    pub display_capacity: usize,
    /// Histórico
    pub storage: StorageConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8765,
            control_device_id: DEFAULT_DEVICE_ID,
            display_capacity: 64,
            storage: StorageConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuração do simulador de dispositivo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// URL do gateway
    pub server_url: String,
    pub device_id: u32,
    /// Intervalo entre leituras em segundos
    pub interval_secs: f64,
    /// Envia heartbeat a cada N ciclos
    pub heartbeat_every: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8765".into(),
            device_id: DEFAULT_DEVICE_ID,
            interval_secs: 2.0,
            heartbeat_every: 5,
        }
    }
}

/// Configuração raiz do aplicativo (unifica gateway e dispositivo).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub device: DeviceConfig,
}

impl AppConfig {
    /// Lê e interpreta o arquivo. Seções ausentes (`[gateway]`, `[device]`)
    /// ficam com os valores padrão.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Carrega a configuração; qualquer falha cai nos valores padrão.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!(
                "{} não existe, usando padrões (gateway {}, dispositivo {:#x})",
                path.display(),
                GatewayConfig::default().bind_addr(),
                DEFAULT_DEVICE_ID
            );
            return AppConfig::default();
        }

        match Self::read(path) {
            Ok(config) => {
                info!(
                    "Configuração carregada de {}: gateway {}, dispositivo {:#x} -> {}",
                    path.display(),
                    config.gateway.bind_addr(),
                    config.device.device_id,
                    config.device.server_url
                );
                config
            }
            Err(e) => {
                warn!("Config inválida, [gateway] e [device] com valores padrão: {e}");
                AppConfig::default()
            }
        }
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Caminho do config: `IOT_CONFIG` se definido, senão `config.toml`
    /// ao lado do executável.
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("config.toml")))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Problemas encontrados, em texto legível. Vazio quando tudo é válido.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.gateway.port == 0 {
            errors.push("Porta do gateway não pode ser 0".into());
        }
        if self.gateway.display_capacity == 0 {
            errors.push("Capacidade do display não pode ser 0".into());
        }
        if self.gateway.storage.enabled && self.gateway.storage.csv_path.trim().is_empty() {
            errors.push("Histórico habilitado sem caminho de CSV".into());
        }
        if self.device.interval_secs < 0.1 || self.device.interval_secs > 60.0 {
            errors.push(format!(
                "Intervalo do dispositivo inválido: {} (0.1–60.0)",
                self.device.interval_secs
            ));
        }
        if self.device.heartbeat_every == 0 {
            errors.push("heartbeat_every deve ser maior que 0".into());
        }

        errors
    }
}
