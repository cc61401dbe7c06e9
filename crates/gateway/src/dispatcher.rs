//! Roteamento de frames decodificados por comando.

use crate::sinks::{DisplaySink, Reading, TelemetryRecord, TelemetryStore};
use chrono::Local;
use iot_core::protocol::{Command, Frame};
use iot_core::sensor::SensorReport;
use std::sync::Arc;
use tracing::{error, info, warn};

/// O que aconteceu com um frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Heartbeat,
    Report(SensorReport),
    /// Payload de leitura com tamanho errado
    RejectedPayload(usize),
    Unhandled(u8),
}

/// Roteador sem estado. Falhas de histórico são logadas e não interrompem a ingestão.
pub struct Dispatcher {
    store: Arc<dyn TelemetryStore>,
    display: Arc<dyn DisplaySink>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn TelemetryStore>, display: Arc<dyn DisplaySink>) -> Self {
        Self { store, display }
    }

    pub fn display(&self) -> &Arc<dyn DisplaySink> {
        &self.display
    }

    pub fn dispatch(&self, frame: &Frame) -> DispatchOutcome {
        let dev_id = format!("{:#x}", frame.device_id);

        match frame.command {
            Command::Heartbeat => {
                info!("[Heartbeat] Dev:{dev_id}");
                DispatchOutcome::Heartbeat
            }
            Command::SensorReport => match SensorReport::decode(&frame.payload) {
                Some(report) => {
                    self.ingest(dev_id, &report);
                    DispatchOutcome::Report(report)
                }
                None => {
                    warn!(
                        "Payload de leitura inválido: Dev:{dev_id} tamanho={}",
                        frame.payload_len()
                    );
                    DispatchOutcome::RejectedPayload(frame.payload_len())
                }
            },
            other => {
                warn!("Comando não tratado 0x{:02X} de Dev:{dev_id}", other.code());
                DispatchOutcome::Unhandled(other.code())
            }
        }
    }

    fn ingest(&self, device_id: String, report: &SensorReport) {
        let timestamp = report.device_time().unwrap_or_else(|| {
            warn!(
                "Timestamp fora de faixa ({} ms), usando horário do servidor",
                report.device_timestamp_ms
            );
            Local::now()
        });

        let record = TelemetryRecord {
            device_id,
            temperature: report.temperature,
            humidity: report.humidity,
            light: report.light,
            timestamp,
        };

        if let Err(e) = self.store.persist(&record) {
            error!("Erro no histórico: {e}");
        }

        self.display.show_reading(Reading {
            temperature: report.temperature,
            humidity: report.humidity,
            light: report.light,
        });

        info!(
            "[Leitura] Dev:{} T:{}°C H:{}% L:{} Time:{}",
            record.device_id,
            report.temperature,
            report.humidity,
            report.light,
            timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::sinks::LinkStatus;
    use iot_core::protocol::decode;
    use std::sync::Mutex;

    /// Histórico em memória; opcionalmente sempre falha.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub records: Mutex<Vec<TelemetryRecord>>,
        pub fail: bool,
    }

    impl TelemetryStore for MemoryStore {
        fn persist(&self, record: &TelemetryRecord) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::Io {
                    path: "memory".into(),
                    source: std::io::Error::other("disco cheio"),
                });
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct MemoryDisplay {
        pub readings: Mutex<Vec<Reading>>,
        pub statuses: Mutex<Vec<LinkStatus>>,
    }

    impl DisplaySink for MemoryDisplay {
        fn show_reading(&self, reading: Reading) {
            self.readings.lock().unwrap().push(reading);
        }

        fn show_status(&self, status: LinkStatus) {
            self.statuses.lock().unwrap().push(status);
        }
    }

    fn frame(command: Command, payload: &[u8]) -> Frame {
        let bytes = iot_core::protocol::encode(0x0102_0304, command, 1, payload).unwrap();
        decode(&bytes).unwrap().frame
    }

    fn report_payload() -> [u8; 20] {
        SensorReport {
            temperature: 23.46,
            humidity: 55.04,
            light: 1234,
            device_timestamp_ms: 1_700_000_000_123,
        }
        .encode()
    }

    fn setup(fail: bool) -> (Dispatcher, Arc<MemoryStore>, Arc<MemoryDisplay>) {
        let store = Arc::new(MemoryStore {
            fail,
            ..Default::default()
        });
        let display = Arc::new(MemoryDisplay::default());
        (
            Dispatcher::new(store.clone(), display.clone()),
            store,
            display,
        )
    }

    #[test]
    fn heartbeat_has_no_side_effects() {
        let (dispatcher, store, display) = setup(false);
        assert_eq!(
            dispatcher.dispatch(&frame(Command::Heartbeat, &[])),
            DispatchOutcome::Heartbeat
        );
        assert!(store.records.lock().unwrap().is_empty());
        assert!(display.readings.lock().unwrap().is_empty());
    }

    #[test]
    fn sensor_report_is_persisted_and_displayed() {
        let (dispatcher, store, display) = setup(false);
        let outcome = dispatcher.dispatch(&frame(Command::SensorReport, &report_payload()));

        let DispatchOutcome::Report(report) = outcome else {
            panic!("esperava Report, veio {outcome:?}");
        };
        assert_eq!(report.temperature, 23.5);

        let records = store.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].device_id, "0x1020304");
        assert_eq!(records[0].humidity, 55.0);
        assert_eq!(records[0].light, 1234);
        assert_eq!(records[0].timestamp.timestamp_millis(), 1_700_000_000_123);

        assert_eq!(
            *display.readings.lock().unwrap(),
            vec![Reading {
                temperature: 23.5,
                humidity: 55.0,
                light: 1234
            }]
        );
    }

    #[test]
    fn store_failure_still_updates_display() {
        let (dispatcher, store, display) = setup(true);
        let outcome = dispatcher.dispatch(&frame(Command::SensorReport, &report_payload()));

        assert!(matches!(outcome, DispatchOutcome::Report(_)));
        assert!(store.records.lock().unwrap().is_empty());
        assert_eq!(display.readings.lock().unwrap().len(), 1);
    }

    #[test]
    fn wrong_payload_length_is_dropped() {
        let (dispatcher, store, display) = setup(false);
        assert_eq!(
            dispatcher.dispatch(&frame(Command::SensorReport, &[0u8; 16])),
            DispatchOutcome::RejectedPayload(16)
        );
        assert!(store.records.lock().unwrap().is_empty());
        assert!(display.readings.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_and_control_commands_are_unhandled() {
        let (dispatcher, _, _) = setup(false);
        assert_eq!(
            dispatcher.dispatch(&frame(Command::Unknown(0x42), &[1, 2])),
            DispatchOutcome::Unhandled(0x42)
        );
        assert_eq!(
            dispatcher.dispatch(&frame(Command::ActuatorControl, &[1])),
            DispatchOutcome::Unhandled(0x80)
        );
    }

    #[test]
    fn out_of_range_timestamp_uses_server_time() {
        let (dispatcher, store, _) = setup(false);
        let payload = SensorReport {
            device_timestamp_ms: u64::MAX,
            ..Default::default()
        }
        .encode();

        let before = Local::now();
        dispatcher.dispatch(&frame(Command::SensorReport, &payload));

        let records = store.records.lock().unwrap();
        assert!(records[0].timestamp >= before);
    }
}
