//! # IoT Device Simulator
//!
//! Simula um dispositivo de campo: conecta ao gateway via WebSocket, envia
//! leituras de temperatura/umidade/luz e heartbeats, e aplica os comandos
//! liga/desliga do atuador recebidos.
//!
//! ## Uso
//! ```bash
//! iot_device_sim                 # Usa config.toml ao lado do executável
//! ```

mod device;

use device::{SimulatedDevice, epoch_ms};
use futures_util::{SinkExt, StreamExt};
use iot_core::config::AppConfig;
use iot_core::protocol::{decode, to_hex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

/// Espera antes de tentar reconectar ao gateway.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
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

    let dev_cfg = &config.device;
    let interval = Duration::from_secs_f64(dev_cfg.interval_secs.clamp(0.1, 60.0));
    let mut device = SimulatedDevice::new(dev_cfg.device_id, dev_cfg.heartbeat_every);

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⚡ IOT DEVICE SIMULATOR – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Gateway:   {}", dev_cfg.server_url);
    println!("  Device ID: {:#x}", dev_cfg.device_id);
    println!("  Intervalo: {:.1}s", interval.as_secs_f64());
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal (reconecta sempre que a conexão cai) ──
    loop {
        match connect_async(dev_cfg.server_url.as_str()).await {
            Ok((ws, _)) => {
                info!(
                    "Conectado a {} (atuador {})",
                    dev_cfg.server_url,
                    if device.actuator_on() { "ligado" } else { "desligado" }
                );
                run_session(ws, &mut device, interval).await;
            }
            Err(e) => error!("Falha ao conectar em {}: {e}", dev_cfg.server_url),
        }
        warn!("Tentando novamente em {}s...", RECONNECT_DELAY.as_secs());
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

type DeviceSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Mantém uma conexão ativa até o gateway fechar ou ocorrer erro.
async fn run_session(ws: DeviceSocket, device: &mut SimulatedDevice, interval: Duration) {
    let (mut tx, mut rx) = ws.split();
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frames = device.next_frames(epoch_ms()).unwrap_or_else(|e| {
                    error!("Erro ao montar frame: {e}");
                    Vec::new()
                });
                for frame in frames {
                    let size = frame.len();
                    if let Err(e) = tx.send(Message::Binary(frame)).await {
                        error!("Erro ao enviar: {e}");
                        return;
                    }
                    info!("→ {size} bytes");
                }
            }
            incoming = rx.next() => match incoming {
                Some(Ok(Message::Binary(data))) => match decode(&data) {
                    Ok(decoded) => {
                        device.apply(&decoded.frame);
                    }
                    Err(e) => warn!("Frame inválido do gateway: {e} | Hex: {}", to_hex(&data)),
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!("Gateway encerrou a conexão");
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Erro na conexão: {e}");
                    return;
                }
            },
        }
    }
}
