//! Dispositivo simulado – gera leituras sintéticas e aplica comandos do atuador.

use iot_core::protocol::{Command, EncodeError, Frame, encode};
use iot_core::sensor::SensorReport;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Estado local de um dispositivo simulado.
pub struct SimulatedDevice {
    device_id: u32,
    heartbeat_every: u32,
    sequence: u8,
    cycle: u64,
    actuator_on: bool,
}

impl SimulatedDevice {
    pub fn new(device_id: u32, heartbeat_every: u32) -> Self {
        Self {
            device_id,
            heartbeat_every: heartbeat_every.max(1),
            sequence: 0,
            cycle: 0,
            actuator_on: false,
        }
    }

    pub fn actuator_on(&self) -> bool {
        self.actuator_on
    }

    /// Frames do próximo ciclo: leitura e, a cada N ciclos, um heartbeat.
    pub fn next_frames(&mut self, now_ms: u64) -> Result<Vec<Vec<u8>>, EncodeError> {
        let mut frames = Vec::with_capacity(2);

        if self.cycle % u64::from(self.heartbeat_every) == 0 {
            frames.push(encode(self.device_id, Command::Heartbeat, self.next_seq(), &[])?);
        }

        let report = synthetic_reading(self.cycle, now_ms);
        frames.push(encode(
            self.device_id,
            Command::SensorReport,
            self.next_seq(),
            &report.encode(),
        )?);

        self.cycle += 1;
        Ok(frames)
    }

    /// Aplica um frame recebido do gateway. Retorna o novo estado do atuador
    /// quando o frame é um controle válido para este dispositivo.
    pub fn apply(&mut self, frame: &Frame) -> Option<bool> {
        if frame.command != Command::ActuatorControl {
            debug!("Ignorando comando 0x{:02X}", frame.command.code());
            return None;
        }
        if frame.device_id != self.device_id {
            debug!("Controle para {:#x}, não é para mim", frame.device_id);
            return None;
        }

        match frame.payload.as_slice() {
            [0] => self.actuator_on = false,
            [1] => self.actuator_on = true,
            other => {
                warn!("Payload de controle inválido: {other:?}");
                return None;
            }
        }

        info!(
            "Atuador {}",
            if self.actuator_on { "LIGADO" } else { "DESLIGADO" }
        );
        Some(self.actuator_on)
    }

    fn next_seq(&mut self) -> u8 {
        let seq = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        seq
    }
}

/// Leitura sintética: ondas lentas em torno de valores típicos de ambiente.
pub fn synthetic_reading(cycle: u64, now_ms: u64) -> SensorReport {
    let t = cycle as f32 / 10.0;
    SensorReport {
        temperature: 22.0 + 3.0 * t.sin(),
        humidity: 50.0 + 10.0 * (t * 0.7).cos(),
        light: (2048.0 + 1500.0 * (t * 0.3).sin()) as u32,
        device_timestamp_ms: now_ms,
    }
}

pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use iot_core::protocol::{build_control_frame, decode};

    #[test]
    fn first_cycle_sends_heartbeat_then_report() {
        let mut dev = SimulatedDevice::new(0x0102_0304, 3);
        let frames = dev.next_frames(1_700_000_000_000).unwrap();
        assert_eq!(frames.len(), 2);

        let hb = decode(&frames[0]).unwrap().frame;
        let report = decode(&frames[1]).unwrap().frame;
        assert_eq!(hb.command, Command::Heartbeat);
        assert_eq!(hb.sequence, 0);
        assert_eq!(report.command, Command::SensorReport);
        assert_eq!(report.sequence, 1);

        let reading = SensorReport::decode(&report.payload).unwrap();
        assert_eq!(reading.device_timestamp_ms, 1_700_000_000_000);
        assert_eq!(reading.temperature, 22.0);
    }

    #[test]
    fn heartbeat_every_n_cycles() {
        let mut dev = SimulatedDevice::new(1, 3);
        let counts: Vec<usize> = (0..6).map(|_| dev.next_frames(0).unwrap().len()).collect();
        assert_eq!(counts, vec![2, 1, 1, 2, 1, 1]);
    }

    #[test]
    fn sequence_wraps() {
        let mut dev = SimulatedDevice::new(1, 1000);
        let mut last = 0;
        for _ in 0..300 {
            for bytes in dev.next_frames(0).unwrap() {
                last = decode(&bytes).unwrap().frame.sequence;
            }
        }
        // 301 frames (1 heartbeat + 300 leituras): último seq = 300 mod 256
        assert_eq!(last, 44);
    }

    #[test]
    fn applies_control_for_own_id_only() {
        let mut dev = SimulatedDevice::new(0x0102_0304, 5);

        let on = decode(&build_control_frame(0x0102_0304, true)).unwrap().frame;
        assert_eq!(dev.apply(&on), Some(true));
        assert!(dev.actuator_on());

        let other = decode(&build_control_frame(0xAAAA, false)).unwrap().frame;
        assert_eq!(dev.apply(&other), None);
        assert!(dev.actuator_on());

        let off = decode(&build_control_frame(0x0102_0304, false)).unwrap().frame;
        assert_eq!(dev.apply(&off), Some(false));
        assert!(!dev.actuator_on());
    }

    #[test]
    fn ignores_malformed_control_payload() {
        let mut dev = SimulatedDevice::new(9, 5);
        let bytes = encode(9, Command::ActuatorControl, 1, &[2]).unwrap();
        assert_eq!(dev.apply(&decode(&bytes).unwrap().frame), None);
        assert!(!dev.actuator_on());
    }

    #[test]
    fn synthetic_values_stay_in_range() {
        for cycle in 0..1000 {
            let r = synthetic_reading(cycle, 0);
            assert!((19.0..=25.0).contains(&r.temperature));
            assert!((40.0..=60.0).contains(&r.humidity));
            assert!((548..=3548).contains(&r.light));
        }
    }
}
