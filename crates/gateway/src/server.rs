//! Servidor WebSocket: uma task por dispositivo conectado.
//!
//! ```text
//! TcpListener ──► handshake WS ──► Session no registro
//!                                   ├── leitura: binário → decode → Dispatcher
//!                                   └── writer: fila da sessão → socket
//! ```

use crate::dispatcher::Dispatcher;
use crate::error::GatewayError;
use crate::registry::{ConnectionRegistry, Session};
use crate::sinks::LinkStatus;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use iot_core::protocol::{decode, to_hex};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};

/// Frames de saída enfileirados por sessão.
const OUTBOUND_CAPACITY: usize = 32;

pub struct GatewayServer {
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    dispatcher: Arc<Dispatcher>,
}

impl GatewayServer {
    pub async fn bind(
        addr: &str,
        registry: Arc<ConnectionRegistry>,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self, GatewayError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        Ok(Self {
            listener,
            registry,
            dispatcher,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, GatewayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Aceita conexões indefinidamente.
    pub async fn run(self) -> Result<(), GatewayError> {
        let addr = self.local_addr()?;
        info!("Gateway escutando em ws://{addr}");
        self.dispatcher
            .display()
            .show_status(LinkStatus::Listening(addr));

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_connection(
                        stream,
                        peer,
                        self.registry.clone(),
                        self.dispatcher.clone(),
                    ));
                }
                Err(e) => warn!("Erro no accept: {e}"),
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    dispatcher: Arc<Dispatcher>,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("Handshake WebSocket falhou com {peer}: {e}");
            return;
        }
    };
    let (ws_tx, ws_rx) = ws.split();
    serve_session(ws_tx, ws_rx, peer, &registry, &dispatcher).await;
}

/// Vida de uma sessão: registra, lê até fechar ou falhar, remove.
/// Termina também quando o writer falha ao escrever no socket.
async fn serve_session<W, R>(
    mut ws_tx: W,
    mut ws_rx: R,
    peer: SocketAddr,
    registry: &ConnectionRegistry,
    dispatcher: &Dispatcher,
) where
    W: Sink<Message, Error = WsError> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(OUTBOUND_CAPACITY);
    let session_id = registry.next_session_id();
    let active = registry.add(Session::new(session_id, peer, out_tx)).await;
    info!("Novo dispositivo conectado: {peer} ({active} ativos)");
    dispatcher
        .display()
        .show_status(LinkStatus::DeviceConnected { addr: peer, active });

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if let Err(e) = ws_tx.send(Message::Binary(frame)).await {
                error!("Erro ao escrever para {peer}: {e}");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    // Mensagens de uma mesma sessão são processadas em ordem de chegada
    loop {
        tokio::select! {
            message = ws_rx.next() => match message {
                Some(Ok(Message::Binary(data))) => handle_binary(dispatcher, peer, &data),
                Some(Ok(Message::Text(_))) => info!("Texto recebido de {peer} (ignorado)"),
                Some(Ok(Message::Close(_))) | None => {
                    info!("Dispositivo desconectado: {peer}");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Erro na conexão {peer}: {e}");
                    break;
                }
            },
            _ = &mut writer => {
                warn!("Escrita para {peer} falhou, encerrando sessão");
                break;
            }
        }
    }

    let removed = registry.remove(session_id).await;
    writer.abort();
    let active = registry.len().await;
    dispatcher
        .display()
        .show_status(LinkStatus::DeviceDisconnected { addr: peer, active });
    if let Some(session) = removed {
        debug!(
            "Sessão {session_id} encerrada, conectada desde {} ({active} ativos)",
            session.registered_at.format("%H:%M:%S")
        );
    }
}

fn handle_binary(dispatcher: &Dispatcher, peer: SocketAddr, data: &[u8]) {
    match decode(data) {
        Ok(decoded) => {
            debug!("Frame de {peer}: {}", decoded.raw_hex);
            dispatcher.dispatch(&decoded.frame);
        }
        Err(e) => warn!("Falha no decode: {e} | Hex: {}", to_hex(data)),
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
