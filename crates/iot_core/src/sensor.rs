//! Payload de leitura de sensores (comando 0x10).
//!
//! Layout fixo de 20 bytes, little-endian:
//!
//! ```text
//! ┌────────────┬─────────────┬──────────┬────────────────────┐
//! │ Temp f32   │ Umid. f32   │ Luz u32  │ Timestamp u64 (ms) │
//! └────────────┴─────────────┴──────────┴────────────────────┘
//! ```

use chrono::{DateTime, Local};

/// Tamanho exato do payload de leitura.
pub const SENSOR_PAYLOAD_SIZE: usize = 20;

/// Leitura decodificada de um dispositivo.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorReport {
    /// Temperatura (°C), arredondada a 1 casa decimal
    pub temperature: f32,
    /// Umidade relativa (%), arredondada a 1 casa decimal
    pub humidity: f32,
    /// Luminosidade bruta do ADC
    pub light: u32,
    /// Relógio do dispositivo, epoch em milissegundos
    pub device_timestamp_ms: u64,
}

impl SensorReport {
    /// Decodifica o payload. Qualquer tamanho diferente de 20 bytes retorna `None`.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let bytes: &[u8; SENSOR_PAYLOAD_SIZE] = payload.try_into().ok()?;

        let temperature = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let humidity = f32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let light = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&bytes[12..20]);

        Some(Self {
            temperature: round_1dp(temperature),
            humidity: round_1dp(humidity),
            light,
            device_timestamp_ms: u64::from_le_bytes(ts),
        })
    }

    /// Codifica no layout de 20 bytes (usado pelo simulador de dispositivo).
    pub fn encode(&self) -> [u8; SENSOR_PAYLOAD_SIZE] {
        let mut out = [0u8; SENSOR_PAYLOAD_SIZE];
        out[0..4].copy_from_slice(&self.temperature.to_le_bytes());
        out[4..8].copy_from_slice(&self.humidity.to_le_bytes());
        out[8..12].copy_from_slice(&self.light.to_le_bytes());
        out[12..20].copy_from_slice(&self.device_timestamp_ms.to_le_bytes());
        out
    }

    /// Converte o timestamp do dispositivo para horário local.
    pub fn device_time(&self) -> Option<DateTime<Local>> {
        let ms = i64::try_from(self.device_timestamp_ms).ok()?;
        DateTime::from_timestamp_millis(ms).map(|utc| utc.with_timezone(&Local))
    }
}

fn round_1dp(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_payload(temp: f32, hum: f32, light: u32, ts: u64) -> Vec<u8> {
        let mut p = Vec::with_capacity(SENSOR_PAYLOAD_SIZE);
        p.extend_from_slice(&temp.to_le_bytes());
        p.extend_from_slice(&hum.to_le_bytes());
        p.extend_from_slice(&light.to_le_bytes());
        p.extend_from_slice(&ts.to_le_bytes());
        p
    }

    #[test]
    fn decodes_known_bytes() {
        // 23.46 °C, 55.04 %, luz 1234, ts 1700000000123
        let bytes = [
            0x14, 0xAE, 0xBB, 0x41, 0xF6, 0x28, 0x5C, 0x42, 0xD2, 0x04, 0x00, 0x00, 0x7B, 0x68,
            0xE5, 0xCF, 0x8B, 0x01, 0x00, 0x00,
        ];
        let report = SensorReport::decode(&bytes).unwrap();

        assert_eq!(report.temperature, 23.5);
        assert_eq!(report.humidity, 55.0);
        assert_eq!(report.light, 1234);
        assert_eq!(report.device_timestamp_ms, 1_700_000_000_123);
    }

    #[test]
    fn rounds_to_one_decimal() {
        let report = SensorReport::decode(&wire_payload(-4.26, 99.96, 0, 0)).unwrap();
        assert_eq!(report.temperature, -4.3);
        assert_eq!(report.humidity, 100.0);
    }

    #[test]
    fn rejects_other_lengths() {
        for len in [0usize, 1, 16, 19, 21, 64] {
            assert_eq!(SensorReport::decode(&vec![0u8; len]), None, "len {len}");
        }
        assert!(SensorReport::decode(&[0u8; SENSOR_PAYLOAD_SIZE]).is_some());
    }

    #[test]
    fn encode_matches_wire_layout() {
        let report = SensorReport {
            temperature: 21.5,
            humidity: 40.0,
            light: 4095,
            device_timestamp_ms: 1_700_000_000_000,
        };
        assert_eq!(
            report.encode().to_vec(),
            wire_payload(21.5, 40.0, 4095, 1_700_000_000_000)
        );
        assert_eq!(SensorReport::decode(&report.encode()), Some(report));
    }

    #[test]
    fn device_time_converts_epoch_ms() {
        let report = SensorReport {
            device_timestamp_ms: 1_700_000_000_123,
            ..Default::default()
        };
        let dt = report.device_time().unwrap();
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_123);

        let absurd = SensorReport {
            device_timestamp_ms: u64::MAX,
            ..Default::default()
        };
        assert!(absurd.device_time().is_none());
    }
}
