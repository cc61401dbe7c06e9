//! Console do operador: mostra as leituras e aceita comandos do atuador.
//!
//! As duas threads vivem fora do runtime tokio. A de entrada só fala com o
//! gateway através do [`ControlHandle`].

use crate::broadcaster::ControlHandle;
use crate::sinks::{DisplayEvent, DisplayFeed, LinkStatus};
use std::io::BufRead;
use std::thread::JoinHandle;
use tracing::{info, warn};

/// Inicia a thread que drena os channels do display.
pub fn spawn_monitor_thread(feed: DisplayFeed) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("display-monitor".into())
        .spawn(move || {
            while let Some(event) = feed.recv() {
                println!("{}", render_event(&event));
            }
        })
}

/// Inicia a thread que lê comandos do stdin (`on [id]`, `off [id]`).
pub fn spawn_operator_thread(
    handle: ControlHandle,
    default_device_id: u32,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("operator-input".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }

                match parse_command(&line, default_device_id) {
                    Some((device_id, actuator_on)) => {
                        if let Err(e) = handle.submit(device_id, actuator_on) {
                            warn!("Comando não enviado: {e}");
                            break;
                        }
                    }
                    None => warn!("Comando inválido: '{}' (use: on|off [device_id hex])", line.trim()),
                }
            }
            info!("Entrada do operador encerrada");
        })
}

/// Interpreta `on`/`off` com id hexadecimal opcional (`0x01020304` ou `1020304`).
pub fn parse_command(line: &str, default_device_id: u32) -> Option<(u32, bool)> {
    let mut parts = line.split_whitespace();
    let actuator_on = match parts.next()?.to_ascii_lowercase().as_str() {
        "on" => true,
        "off" => false,
        _ => return None,
    };

    let device_id = match parts.next() {
        Some(raw) => {
            let digits = raw
                .strip_prefix("0x")
                .or_else(|| raw.strip_prefix("0X"))
                .unwrap_or(raw);
            u32::from_str_radix(digits, 16).ok()?
        }
        None => default_device_id,
    };

    if parts.next().is_some() {
        return None;
    }
    Some((device_id, actuator_on))
}

pub fn render_event(event: &DisplayEvent) -> String {
    match event {
        DisplayEvent::Reading(r) => format!(
            "🌡 {:.1}°C  💧 {:.1}%  💡 {}",
            r.temperature, r.humidity, r.light
        ),
        DisplayEvent::Status(LinkStatus::Listening(addr)) => {
            format!("● Escutando em ws://{addr}")
        }
        DisplayEvent::Status(LinkStatus::DeviceConnected { addr, active }) => {
            format!("● Conectado: {addr} ({active} ativos)")
        }
        DisplayEvent::Status(LinkStatus::DeviceDisconnected { addr, active }) => {
            format!("○ Desconectado: {addr} ({active} ativos)")
        }
    }
}
