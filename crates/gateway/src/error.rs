//! Erros do gateway.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Falha ao gravar uma leitura no histórico. Nunca interrompe a ingestão.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Erro de I/O em {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Falha ao bind em {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Erro de I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store indisponível: {0}")]
    Store(#[from] StoreError),

    #[error("Sessão {0} encerrada")]
    SessionClosed(SocketAddr),

    #[error("Fila de saída da sessão {0} cheia")]
    SessionBacklogged(SocketAddr),

    #[error("Loop de controle encerrado")]
    ControlClosed,
}
