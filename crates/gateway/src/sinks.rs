//! Interfaces estreitas para os colaboradores externos do gateway:
//! histórico das leituras ([`TelemetryStore`]) e display ([`DisplaySink`]).

use crate::error::StoreError;
use chrono::{DateTime, Local};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, select, unbounded};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ──────────────────────────────────────────────
// Histórico
// ──────────────────────────────────────────────

/// Uma leitura pronta para o histórico.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    /// Id em hex, ex.: `0x1020304`
    pub device_id: String,
    pub temperature: f32,
    pub humidity: f32,
    pub light: u32,
    pub timestamp: DateTime<Local>,
}

pub trait TelemetryStore: Send + Sync {
    fn persist(&self, record: &TelemetryRecord) -> Result<(), StoreError>;
}

/// Histórico desabilitado.
pub struct NullStore;

impl TelemetryStore for NullStore {
    fn persist(&self, _record: &TelemetryRecord) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Histórico append-only em CSV.
pub struct CsvStore {
    path: PathBuf,
    file: File,
}

const CSV_HEADER: &str = "device_id,temperature,humidity,light,timestamp\n";

impl CsvStore {
    /// Abre (ou cria, com cabeçalho) o arquivo de histórico.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        let is_new = !path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;

        if is_new {
            file.write_all(CSV_HEADER.as_bytes()).map_err(io_err)?;
            info!("Histórico criado em {}", path.display());
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }
}

impl TelemetryStore for CsvStore {
    fn persist(&self, record: &TelemetryRecord) -> Result<(), StoreError> {
        // Uma única escrita por linha: o arquivo é compartilhado entre sessões
        let line = format!(
            "{},{:.1},{:.1},{},{}\n",
            record.device_id,
            record.temperature,
            record.humidity,
            record.light,
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        );
        (&self.file)
            .write_all(line.as_bytes())
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

// ──────────────────────────────────────────────
// Display
// ──────────────────────────────────────────────

/// Valores mais recentes para o display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature: f32,
    pub humidity: f32,
    pub light: u32,
}

/// Sinal de conectividade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Listening(SocketAddr),
    DeviceConnected { addr: SocketAddr, active: usize },
    DeviceDisconnected { addr: SocketAddr, active: usize },
}

/// Fire-and-forget: nenhuma confirmação é esperada.
pub trait DisplaySink: Send + Sync {
    fn show_reading(&self, reading: Reading);
    fn show_status(&self, status: LinkStatus);
}

/// Mensagem enviada do loop de rede para o display.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    Reading(Reading),
    Status(LinkStatus),
}

/// Display via channels crossbeam.
///
/// Leituras vão por um channel bounded que guarda só as mais recentes: com o
/// consumidor lento, a leitura mais antiga é descartada. Sinais de
/// conectividade vão por um channel próprio e nunca são descartados.
pub struct ChannelDisplay {
    statuses: Sender<LinkStatus>,
    readings: Sender<Reading>,
    /// Clone do receptor, usado para descartar a leitura mais antiga.
    stale: Receiver<Reading>,
}

impl ChannelDisplay {
    pub fn new(capacity: usize) -> (Self, DisplayFeed) {
        let (status_tx, status_rx) = unbounded();
        let (reading_tx, reading_rx) = bounded(capacity.max(1));
        let display = Self {
            statuses: status_tx,
            readings: reading_tx,
            stale: reading_rx.clone(),
        };
        let feed = DisplayFeed {
            statuses: status_rx,
            readings: reading_rx,
        };
        (display, feed)
    }
}

impl DisplaySink for ChannelDisplay {
    fn show_reading(&self, reading: Reading) {
        let mut pending = reading;
        loop {
            match self.readings.try_send(pending) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    if self.stale.try_recv().is_ok() {
                        debug!("Channel do display cheio, descartando leitura antiga");
                    }
                    pending = back;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    fn show_status(&self, status: LinkStatus) {
        if self.statuses.send(status).is_err() {
            debug!("Display desconectado");
        }
    }
}

/// Lado consumidor do [`ChannelDisplay`].
pub struct DisplayFeed {
    statuses: Receiver<LinkStatus>,
    readings: Receiver<Reading>,
}

impl DisplayFeed {
    /// Bloqueia até o próximo evento. Status pendentes saem antes das leituras.
    /// `None` quando o display foi descartado e não resta nada para ler.
    pub fn recv(&self) -> Option<DisplayEvent> {
        if let Some(event) = self.try_recv() {
            return Some(event);
        }
        select! {
            recv(self.statuses) -> status => match status {
                Ok(status) => Some(DisplayEvent::Status(status)),
                Err(_) => self.readings.recv().ok().map(DisplayEvent::Reading),
            },
            recv(self.readings) -> reading => match reading {
                Ok(reading) => Some(DisplayEvent::Reading(reading)),
                Err(_) => self.statuses.recv().ok().map(DisplayEvent::Status),
            },
        }
    }

    pub fn try_recv(&self) -> Option<DisplayEvent> {
        if let Ok(status) = self.statuses.try_recv() {
            return Some(DisplayEvent::Status(status));
        }
        self.readings.try_recv().ok().map(DisplayEvent::Reading)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(device_id: &str) -> TelemetryRecord {
        TelemetryRecord {
            device_id: device_id.into(),
            temperature: 23.5,
            humidity: 55.0,
            light: 1234,
            timestamp: Local.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap(),
        }
    }

    #[test]
    fn csv_store_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");

        {
            let store = CsvStore::open(&path).unwrap();
            store.persist(&record("0x1020304")).unwrap();
        }
        {
            let store = CsvStore::open(&path).unwrap();
            store.persist(&record("0xdeadbeef")).unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "device_id,temperature,humidity,light,timestamp",
                "0x1020304,23.5,55.0,1234,2024-03-01 12:30:05",
                "0xdeadbeef,23.5,55.0,1234,2024-03-01 12:30:05",
            ]
        );
    }

    #[test]
    fn csv_store_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("history.csv");
        assert!(matches!(CsvStore::open(&path), Err(StoreError::Io { .. })));
    }

    #[test]
    fn channel_display_keeps_latest_readings() {
        let (display, feed) = ChannelDisplay::new(2);
        let reading = Reading {
            temperature: 20.0,
            humidity: 30.0,
            light: 1,
        };

        for light in 1..=5 {
            display.show_reading(Reading { light, ..reading });
        }

        assert_eq!(feed.try_recv(), Some(DisplayEvent::Reading(Reading { light: 4, ..reading })));
        assert_eq!(feed.try_recv(), Some(DisplayEvent::Reading(Reading { light: 5, ..reading })));
        assert_eq!(feed.try_recv(), None);
    }

    #[test]
    fn channel_display_never_drops_status() {
        let (display, feed) = ChannelDisplay::new(1);
        let addr: SocketAddr = "10.0.0.2:5000".parse().unwrap();
        let reading = Reading {
            temperature: 20.0,
            humidity: 30.0,
            light: 7,
        };

        display.show_reading(reading);
        display.show_status(LinkStatus::DeviceConnected { addr, active: 1 });
        display.show_reading(Reading { light: 8, ..reading });
        display.show_status(LinkStatus::DeviceDisconnected { addr, active: 0 });

        assert_eq!(
            feed.recv(),
            Some(DisplayEvent::Status(LinkStatus::DeviceConnected { addr, active: 1 }))
        );
        assert_eq!(
            feed.recv(),
            Some(DisplayEvent::Status(LinkStatus::DeviceDisconnected { addr, active: 0 }))
        );
        assert_eq!(feed.recv(), Some(DisplayEvent::Reading(Reading { light: 8, ..reading })));
    }

    #[test]
    fn display_feed_ends_after_display_is_dropped() {
        let (display, feed) = ChannelDisplay::new(4);
        display.show_status(LinkStatus::Listening("127.0.0.1:8765".parse().unwrap()));
        drop(display);

        assert!(matches!(feed.recv(), Some(DisplayEvent::Status(_))));
        assert_eq!(feed.recv(), None);
    }

    #[test]
    fn channel_display_survives_closed_receiver() {
        let (display, feed) = ChannelDisplay::new(4);
        drop(feed);
        display.show_reading(Reading {
            temperature: 1.0,
            humidity: 2.0,
            light: 3,
        });
        display.show_status(LinkStatus::Listening("127.0.0.1:8765".parse().unwrap()));
    }
}
