//! Protocolo de comunicação binário entre dispositivos e gateway.
//!
//! Formato do frame (todos os campos multi-byte em little-endian):
//!
//! ```text
//! ┌───────────┬────────┬────────┬────────┬──────────────┬────────────┬─────────────┬──────────┐
//! │ Header(2) │ Ver(1) │ Cmd(1) │ Seq(1) │ DeviceId(4)  │ PayLen(2)  │ Payload(N)  │ CRC(2)   │
//! └───────────┴────────┴────────┴────────┴──────────────┴────────────┴─────────────┴──────────┘
//! ```
//!
//! - Header fixo `0xAA55` identifica o protocolo
//! - CRC-16/Modbus calculado sobre todos os bytes anteriores ao CRC

/// Constante de header do protocolo.
pub const PROTOCOL_HEADER: u16 = 0xAA55;

/// Versão atual do protocolo.
pub const PROTOCOL_VERSION: u8 = 0x12;

/// Tamanho do header fixo (header + ver + cmd + seq + device_id + len).
pub const HEADER_SIZE: usize = 11;

/// Tamanho do CRC no fim do frame.
pub const CRC_SIZE: usize = 2;

/// Menor frame válido: header fixo + payload vazio + CRC.
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + CRC_SIZE;

/// Número de sequência usado em todo frame de controle.
pub const CONTROL_SEQUENCE: u8 = 0x01;

// ──────────────────────────────────────────────
// Comandos
// ──────────────────────────────────────────────

/// Código de comando carregado no frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Keep-alive do dispositivo (0x01)
    Heartbeat,
    /// Leitura de temperatura/umidade/luz (0x10)
    SensorReport,
    /// Liga/desliga o atuador do dispositivo (0x80)
    ActuatorControl,
    /// Qualquer outro código, reservado
    Unknown(u8),
}

impl Command {
    pub const HEARTBEAT: u8 = 0x01;
    pub const SENSOR_REPORT: u8 = 0x10;
    pub const ACTUATOR_CONTROL: u8 = 0x80;

    pub fn code(self) -> u8 {
        match self {
            Command::Heartbeat => Self::HEARTBEAT,
            Command::SensorReport => Self::SENSOR_REPORT,
            Command::ActuatorControl => Self::ACTUATOR_CONTROL,
            Command::Unknown(code) => code,
        }
    }
}

impl From<u8> for Command {
    fn from(code: u8) -> Self {
        match code {
            Self::HEARTBEAT => Command::Heartbeat,
            Self::SENSOR_REPORT => Command::SensorReport,
            Self::ACTUATOR_CONTROL => Command::ActuatorControl,
            other => Command::Unknown(other),
        }
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> Self {
        cmd.code()
    }
}

// ──────────────────────────────────────────────
// Erros
// ──────────────────────────────────────────────

/// Erros de decodificação de frame. Nenhum deles é fatal para a sessão.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Frame muito curto ({0} bytes, mínimo {MIN_FRAME_SIZE})")]
    TooShort(usize),

    #[error("Header fixo malformado")]
    MalformedHeader,

    #[error("Header inválido: 0x{0:04X} (esperado 0x{PROTOCOL_HEADER:04X})")]
    HeaderMismatch(u16),

    #[error("Tamanho incompatível: real={actual}, esperado={expected}")]
    LengthMismatch { actual: usize, expected: usize },

    #[error("CRC inválido: recebido=0x{received:04X}, calculado=0x{computed:04X}")]
    CrcMismatch { received: u16, computed: u16 },
}

/// Erros de codificação de frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("Payload grande demais ({0} bytes, máximo {max})", max = u16::MAX)]
    PayloadTooLarge(usize),
}

// ──────────────────────────────────────────────
// Frame
// ──────────────────────────────────────────────

/// Um frame completo, do header ao CRC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: u16,
    pub version: u8,
    pub command: Command,
    pub sequence: u8,
    pub device_id: u32,
    pub payload: Vec<u8>,
    pub checksum: u16,
}

impl Frame {
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

/// Resultado de um decode bem-sucedido: frame + bytes brutos em hex para diagnóstico.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub frame: Frame,
    pub raw_hex: String,
}

// ──────────────────────────────────────────────
// CRC-16/Modbus
// ──────────────────────────────────────────────

/// CRC-16/Modbus: init 0xFFFF, polinômio refletido 0xA001, sem XOR final.
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Renderiza bytes como hex maiúsculo contínuo (ex.: `55AA12`).
pub fn to_hex(data: &[u8]) -> String {
    use std::fmt::Write;

    data.iter().fold(String::with_capacity(data.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02X}");
        out
    })
}

// ──────────────────────────────────────────────
// Encode / Decode
// ──────────────────────────────────────────────

/// Decodifica um frame recebido, validando header, tamanho e CRC.
pub fn decode(data: &[u8]) -> Result<DecodedFrame, DecodeError> {
    if data.len() < MIN_FRAME_SIZE {
        return Err(DecodeError::TooShort(data.len()));
    }

    let fixed: &[u8; HEADER_SIZE] = data
        .get(..HEADER_SIZE)
        .and_then(|s| s.try_into().ok())
        .ok_or(DecodeError::MalformedHeader)?;

    let header = u16::from_le_bytes([fixed[0], fixed[1]]);
    let version = fixed[2];
    let command = Command::from(fixed[3]);
    let sequence = fixed[4];
    let device_id = u32::from_le_bytes([fixed[5], fixed[6], fixed[7], fixed[8]]);
    let payload_len = u16::from_le_bytes([fixed[9], fixed[10]]) as usize;

    if header != PROTOCOL_HEADER {
        return Err(DecodeError::HeaderMismatch(header));
    }

    let expected = HEADER_SIZE + payload_len + CRC_SIZE;
    if data.len() != expected {
        return Err(DecodeError::LengthMismatch {
            actual: data.len(),
            expected,
        });
    }

    let crc_offset = HEADER_SIZE + payload_len;
    let payload = data[HEADER_SIZE..crc_offset].to_vec();
    let received = u16::from_le_bytes([data[crc_offset], data[crc_offset + 1]]);
    let computed = crc16_modbus(&data[..crc_offset]);

    if received != computed {
        return Err(DecodeError::CrcMismatch { received, computed });
    }

    Ok(DecodedFrame {
        frame: Frame {
            header,
            version,
            command,
            sequence,
            device_id,
            payload,
            checksum: received,
        },
        raw_hex: to_hex(data),
    })
}

/// Codifica um frame completo. Mesmas entradas sempre geram os mesmos bytes.
pub fn encode(
    device_id: u32,
    command: Command,
    sequence: u8,
    payload: &[u8],
) -> Result<Vec<u8>, EncodeError> {
    let payload_len =
        u16::try_from(payload.len()).map_err(|_| EncodeError::PayloadTooLarge(payload.len()))?;

    Ok(write_frame(device_id, command, sequence, payload_len, payload))
}

/// Monta o frame de controle do atuador (payload de 1 byte: 1 = liga, 0 = desliga).
pub fn build_control_frame(device_id: u32, actuator_on: bool) -> Vec<u8> {
    let payload = [u8::from(actuator_on)];
    write_frame(
        device_id,
        Command::ActuatorControl,
        CONTROL_SEQUENCE,
        payload.len() as u16,
        &payload,
    )
}

fn write_frame(
    device_id: u32,
    command: Command,
    sequence: u8,
    payload_len: u16,
    payload: &[u8],
) -> Vec<u8> {
    let mut frame = Vec::with_capacity(MIN_FRAME_SIZE + payload.len());
    frame.extend_from_slice(&PROTOCOL_HEADER.to_le_bytes());
    frame.push(PROTOCOL_VERSION);
    frame.push(command.code());
    frame.push(sequence);
    frame.extend_from_slice(&device_id.to_le_bytes());
    frame.extend_from_slice(&payload_len.to_le_bytes());
    frame.extend_from_slice(payload);

    let crc = crc16_modbus(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
