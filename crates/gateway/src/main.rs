//! # IoT Gateway
//!
//! Servidor WebSocket que recebe telemetria de dispositivos (temperatura,
//! umidade, luz) em frames binários com CRC-16/Modbus, grava o histórico em
//! CSV e envia comandos liga/desliga do atuador para todos os dispositivos.
//!
//! ## Comandos do console
//! - `on [device_id]`: liga o atuador
//! - `off [device_id]`: desliga o atuador

mod broadcaster;
mod console;
mod dispatcher;
mod error;
mod registry;
mod server;
mod sinks;

use broadcaster::{CommandBroadcaster, ControlHandle, run_control_loop};
use dispatcher::Dispatcher;
use error::GatewayError;
use iot_core::config::AppConfig;
use registry::ConnectionRegistry;
use server::GatewayServer;
use sinks::{ChannelDisplay, CsvStore, NullStore, TelemetryStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }
    for problem in config.validate() {
        warn!("Config: {problem}");
    }

    let gw_cfg = &config.gateway;

    // ── Histórico ──
    let store: Arc<dyn TelemetryStore> = if gw_cfg.storage.enabled {
        Arc::new(CsvStore::open(Path::new(&gw_cfg.storage.csv_path))?)
    } else {
        info!("Histórico desabilitado");
        Arc::new(NullStore)
    };

    // ── Display ──
    let (display, display_feed) = ChannelDisplay::new(gw_cfg.display_capacity);
    console::spawn_monitor_thread(display_feed)?;

    // ── Controle ──
    let registry = Arc::new(ConnectionRegistry::new());
    let (control, control_rx) = ControlHandle::new();
    tokio::spawn(run_control_loop(
        control_rx,
        CommandBroadcaster::new(registry.clone()),
    ));
    console::spawn_operator_thread(control, gw_cfg.control_device_id)?;

    // ── Servidor ──
    let dispatcher = Arc::new(Dispatcher::new(store, Arc::new(display)));
    let server = GatewayServer::bind(&gw_cfg.bind_addr(), registry, dispatcher).await?;

    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⚡ IOT GATEWAY – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Endereço:  ws://{}", server.local_addr()?);
    println!("  Protocolo: v0x{:02X}", iot_core::PROTOCOL_VERSION);
    println!("  Controle:  on|off [device_id] (padrão {:#x})", gw_cfg.control_device_id);
    println!("══════════════════════════════════════════════");
    println!();

    server.run().await
}
