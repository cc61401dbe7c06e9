//! Envio de comandos de atuador para todas as sessões conectadas.
//!
//! Pedidos vindos de outras threads (console, UI) entram pelo [`ControlHandle`],
//! que só enfileira; quem toca no registro e nos sockets é o
//! [`run_control_loop`], rodando dentro do runtime.

use crate::error::GatewayError;
use crate::registry::ConnectionRegistry;
use iot_core::protocol::build_control_frame;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Resultado de um broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct CommandBroadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl CommandBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Envia o mesmo frame de controle para cada sessão do snapshot atual.
    /// Falha em uma sessão não impede a entrega às demais.
    pub async fn broadcast(&self, device_id: u32, actuator_on: bool) -> BroadcastReport {
        let sessions = self.registry.snapshot().await;
        if sessions.is_empty() {
            warn!("Nenhum dispositivo conectado, comando descartado");
            return BroadcastReport::default();
        }

        let frame = build_control_frame(device_id, actuator_on);
        let action = if actuator_on { "ON" } else { "OFF" };
        let mut report = BroadcastReport::default();

        for session in &sessions {
            match session.send(frame.clone()) {
                Ok(()) => {
                    report.delivered += 1;
                    info!("[Controle] Atuador {action} -> {}", session.addr);
                }
                Err(e) => {
                    report.failed += 1;
                    error!("Falha no envio para {}: {e}", session.addr);
                }
            }
        }

        report
    }
}

// ──────────────────────────────────────────────
// Hand-off entre threads
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRequest {
    pub device_id: u32,
    pub actuator_on: bool,
}

/// Handle thread-safe para pedir comandos de controle.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<ControlRequest>,
}

impl ControlHandle {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ControlRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Não bloqueia; pode ser chamado de qualquer thread.
    pub fn submit(&self, device_id: u32, actuator_on: bool) -> Result<(), GatewayError> {
        self.tx
            .send(ControlRequest {
                device_id,
                actuator_on,
            })
            .map_err(|_| GatewayError::ControlClosed)
    }
}

/// Consome os pedidos em ordem de chegada até todos os handles serem descartados.
pub async fn run_control_loop(
    mut rx: mpsc::UnboundedReceiver<ControlRequest>,
    broadcaster: CommandBroadcaster,
) {
    while let Some(request) = rx.recv().await {
        let report = broadcaster
            .broadcast(request.device_id, request.actuator_on)
            .await;
        debug!(
            "Broadcast para {:#x}: {} entregues, {} falhas",
            request.device_id, report.delivered, report.failed
        );
    }
    info!("Loop de controle encerrado");
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
