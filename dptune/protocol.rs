//! Kernel-module request/response protocol: a byte-oriented
//! codec for the pseudo-file interface used by the sibling in-kernel
//! deployment of this same control loop. This module implements encoding
//! and decoding only — it is not mounted to a real `/proc` file by this
//! user-space binary, which drives the control loop directly via
//! `hw::gateway`/`hw::pmu` instead.
//!
//! Every message begins with a fixed header `{ u32 type; u32 payload_size }`
//! in native byte order, matching the sibling kernel module's wire format.

use crate::error::{DpfError, Result};

/// Writes larger than this are rejected by the kernel-module's `/proc`
/// handler; mirrored here so the codec enforces the same cap.
pub const MAX_PAYLOAD_BYTES: usize = 4096;

pub const HEADER_BYTES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageType {
    Init = 0,
    CoreRange = 1,
    CoreWeight = 2,
    Tuning = 3,
    DdrBwSet = 4,
    PmuRead = 5,
    MsrRead = 6,
}

impl MessageType {
    fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(MessageType::Init),
            1 => Some(MessageType::CoreRange),
            2 => Some(MessageType::CoreWeight),
            3 => Some(MessageType::Tuning),
            4 => Some(MessageType::DdrBwSet),
            5 => Some(MessageType::PmuRead),
            6 => Some(MessageType::MsrRead),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub msg_type: MessageType,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(msg_type: MessageType, payload: Vec<u8>) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(DpfError::ConfigurationError(format!(
                "payload of {} bytes exceeds cap of {MAX_PAYLOAD_BYTES}",
                payload.len()
            )));
        }
        Ok(Self { msg_type, payload })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_BYTES + self.payload.len());
        buf.extend_from_slice(&(self.msg_type as u32).to_ne_bytes());
        buf.extend_from_slice(&(self.payload.len() as u32).to_ne_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_BYTES {
            return Err(DpfError::ConfigurationError(
                "message shorter than the 8-byte header".into(),
            ));
        }

        let mut type_bytes = [0u8; 4];
        type_bytes.copy_from_slice(&bytes[0..4]);
        let raw_type = u32::from_ne_bytes(type_bytes);
        let msg_type = MessageType::from_u32(raw_type)
            .ok_or_else(|| DpfError::ConfigurationError(format!("unknown message type {raw_type}")))?;

        let mut size_bytes = [0u8; 4];
        size_bytes.copy_from_slice(&bytes[4..8]);
        let payload_size = u32::from_ne_bytes(size_bytes) as usize;

        if payload_size > MAX_PAYLOAD_BYTES {
            return Err(DpfError::ConfigurationError(format!(
                "declared payload of {payload_size} bytes exceeds cap of {MAX_PAYLOAD_BYTES}"
            )));
        }
        if bytes.len() < HEADER_BYTES + payload_size {
            return Err(DpfError::ConfigurationError(
                "message shorter than its declared payload_size".into(),
            ));
        }

        let payload = bytes[HEADER_BYTES..HEADER_BYTES + payload_size].to_vec();
        Ok(Self { msg_type, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips() {
        let msg = Message::new(MessageType::CoreWeight, vec![10, 20, 30, 40]).unwrap();
        let bytes = msg.encode();
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn oversized_payload_rejected() {
        let payload = vec![0u8; MAX_PAYLOAD_BYTES + 1];
        assert!(Message::new(MessageType::Tuning, payload).is_err());
    }

    #[test]
    fn decode_rejects_truncated_header() {
        assert!(Message::decode(&[0, 1, 2]).is_err());
    }

    #[test]
    fn decode_rejects_unknown_type() {
        let mut bytes = vec![0u8; HEADER_BYTES];
        bytes[0..4].copy_from_slice(&99u32.to_ne_bytes());
        assert!(Message::decode(&bytes).is_err());
    }
}
