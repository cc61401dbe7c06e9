//! Registro das sessões de dispositivos conectados.
//!
//! Cada conexão aceita vira uma [`Session`] com um handle de envio (fila do
//! writer da conexão). As tasks de conexão fazem `add`/`remove` de forma
//! concorrente; o broadcaster itera um `snapshot` estável.

use crate::error::GatewayError;
use chrono::{DateTime, Local};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc};

pub type SessionId = u64;

/// Uma conexão viva com um dispositivo.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub addr: SocketAddr,
    pub registered_at: DateTime<Local>,
    outbound: mpsc::Sender<Vec<u8>>,
}

impl Session {
    pub fn new(id: SessionId, addr: SocketAddr, outbound: mpsc::Sender<Vec<u8>>) -> Self {
        Self {
            id,
            addr,
            registered_at: Local::now(),
            outbound,
        }
    }

    /// Enfileira um frame binário para o writer da conexão. Nunca espera:
    /// uma fila cheia (dispositivo que parou de ler) conta como falha.
    pub fn send(&self, frame: Vec<u8>) -> Result<(), GatewayError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => GatewayError::SessionBacklogged(self.addr),
            TrySendError::Closed(_) => GatewayError::SessionClosed(self.addr),
        })
    }
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: RwLock<Vec<Session>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_session_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registra a sessão. Retorna o número de sessões ativas.
    pub async fn add(&self, session: Session) -> usize {
        let mut sessions = self.sessions.write().await;
        sessions.push(session);
        sessions.len()
    }

    /// Remove a sessão pelo id. Retorna a sessão removida, se existia.
    pub async fn remove(&self, id: SessionId) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let pos = sessions.iter().position(|s| s.id == id)?;
        Some(sessions.remove(pos))
    }

    /// Cópia estável das sessões, em ordem de registro.
    pub async fn snapshot(&self) -> Vec<Session> {
        self.sessions.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
