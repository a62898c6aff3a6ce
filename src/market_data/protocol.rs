//! Market-data wire protocol: little-endian, byte-exact framing.
//!
//! Every message starts with an 8-byte header. The gateway consumes
//! incremental updates and snapshots; order-entry message types share
//! the envelope but travel in-process in this engine.

use crate::core::types::{Price, Quantity, Side, SymbolId};
use std::fmt;

/// Header length in bytes.
pub const HEADER_LEN: usize = 8;
/// Fixed incremental payload length in bytes.
pub const INCREMENTAL_LEN: usize = 36;
/// Fixed part of the snapshot payload in bytes.
pub const SNAPSHOT_FIXED_LEN: usize = 16;
/// Length of one snapshot level entry in bytes.
pub const SNAPSHOT_LEVEL_LEN: usize = 24;

/// Wire message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    MarketDataIncremental = 1,
    MarketDataSnapshot = 2,
    NewOrder = 3,
    CancelOrder = 4,
    TradeReport = 5,
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            1 => Ok(MessageType::MarketDataIncremental),
            2 => Ok(MessageType::MarketDataSnapshot),
            3 => Ok(MessageType::NewOrder),
            4 => Ok(MessageType::CancelOrder),
            5 => Ok(MessageType::TradeReport),
            other => Err(other),
        }
    }
}

/// 8-byte message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub message_type: MessageType,
    pub version: u8,
    /// Total message size including the header
    pub length: u16,
    pub sequence_number: u32,
}

/// A decoded incremental book update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementalUpdate {
    pub symbol_id: SymbolId,
    pub price: Price,
    pub quantity: Quantity,
    pub side: Side,
    pub exchange_timestamp: u64,
}

/// One level of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotLevel {
    pub price: Price,
    pub quantity: Quantity,
    pub side: Side,
}

/// A decoded full-book snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotUpdate {
    pub symbol_id: SymbolId,
    pub exchange_timestamp: u64,
    pub levels: Vec<SnapshotLevel>,
}

/// Messages the gateway consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Incremental(MessageHeader, IncrementalUpdate),
    Snapshot(MessageHeader, SnapshotUpdate),
}

/// Malformed or unusable wire data. Counted and dropped by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Buffer shorter than the declared or minimum size
    Truncated { expected: usize, actual: usize },
    /// Unknown `message_type` discriminant
    UnknownMessageType(u8),
    /// Message type valid on the wire but not consumed by this gateway
    UnsupportedMessageType(MessageType),
    /// Side byte outside {0, 1}
    InvalidSide(u8),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Truncated { expected, actual } => {
                write!(f, "truncated message: expected {expected} bytes, got {actual}")
            }
            ParseError::UnknownMessageType(value) => {
                write!(f, "unknown message type: {value}")
            }
            ParseError::UnsupportedMessageType(message_type) => {
                write!(f, "unsupported message type: {message_type:?}")
            }
            ParseError::InvalidSide(value) => write!(f, "invalid side byte: {value}"),
        }
    }
}

impl std::error::Error for ParseError {}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

fn read_side(value: u8) -> Result<Side, ParseError> {
    match value {
        0 => Ok(Side::Buy),
        1 => Ok(Side::Sell),
        other => Err(ParseError::InvalidSide(other)),
    }
}

fn side_byte(side: Side) -> u8 {
    match side {
        Side::Buy => 0,
        Side::Sell => 1,
    }
}

/// Decode the 8-byte header.
pub fn decode_header(buf: &[u8]) -> Result<MessageHeader, ParseError> {
    if buf.len() < HEADER_LEN {
        return Err(ParseError::Truncated {
            expected: HEADER_LEN,
            actual: buf.len(),
        });
    }

    let message_type = MessageType::try_from(buf[0]).map_err(ParseError::UnknownMessageType)?;

    Ok(MessageHeader {
        message_type,
        version: buf[1],
        length: read_u16(buf, 2),
        sequence_number: read_u32(buf, 4),
    })
}

/// Decode a full message. Short payloads are [`ParseError::Truncated`].
pub fn decode_message(buf: &[u8]) -> Result<Message, ParseError> {
    let header = decode_header(buf)?;
    let payload = &buf[HEADER_LEN..];

    match header.message_type {
        MessageType::MarketDataIncremental => {
            if payload.len() < INCREMENTAL_LEN {
                return Err(ParseError::Truncated {
                    expected: HEADER_LEN + INCREMENTAL_LEN,
                    actual: buf.len(),
                });
            }

            let update = IncrementalUpdate {
                symbol_id: read_u32(payload, 0),
                price: read_u64(payload, 4),
                quantity: read_u64(payload, 12),
                side: read_side(payload[20])?,
                exchange_timestamp: read_u64(payload, 28),
            };
            Ok(Message::Incremental(header, update))
        }
        MessageType::MarketDataSnapshot => {
            if payload.len() < SNAPSHOT_FIXED_LEN {
                return Err(ParseError::Truncated {
                    expected: HEADER_LEN + SNAPSHOT_FIXED_LEN,
                    actual: buf.len(),
                });
            }

            let symbol_id = read_u32(payload, 0);
            let num_levels = read_u32(payload, 4) as usize;
            let exchange_timestamp = read_u64(payload, 8);

            let needed = SNAPSHOT_FIXED_LEN + num_levels * SNAPSHOT_LEVEL_LEN;
            if payload.len() < needed {
                return Err(ParseError::Truncated {
                    expected: HEADER_LEN + needed,
                    actual: buf.len(),
                });
            }

            let mut levels = Vec::with_capacity(num_levels);
            for i in 0..num_levels {
                let at = SNAPSHOT_FIXED_LEN + i * SNAPSHOT_LEVEL_LEN;
                levels.push(SnapshotLevel {
                    price: read_u64(payload, at),
                    quantity: read_u64(payload, at + 8),
                    side: read_side(payload[at + 16])?,
                });
            }

            Ok(Message::Snapshot(
                header,
                SnapshotUpdate {
                    symbol_id,
                    exchange_timestamp,
                    levels,
                },
            ))
        }
        other => Err(ParseError::UnsupportedMessageType(other)),
    }
}

fn push_header(buf: &mut Vec<u8>, message_type: MessageType, length: u16, sequence: u32) {
    buf.push(message_type as u8);
    buf.push(1); // protocol version
    buf.extend_from_slice(&length.to_le_bytes());
    buf.extend_from_slice(&sequence.to_le_bytes());
}

/// Encode an incremental update frame.
pub fn encode_incremental(sequence: u32, update: &IncrementalUpdate) -> Vec<u8> {
    let length = (HEADER_LEN + INCREMENTAL_LEN) as u16;
    let mut buf = Vec::with_capacity(length as usize);

    push_header(&mut buf, MessageType::MarketDataIncremental, length, sequence);
    buf.extend_from_slice(&update.symbol_id.to_le_bytes());
    buf.extend_from_slice(&update.price.to_le_bytes());
    buf.extend_from_slice(&update.quantity.to_le_bytes());
    buf.push(side_byte(update.side));
    buf.extend_from_slice(&[0u8; 7]);
    buf.extend_from_slice(&update.exchange_timestamp.to_le_bytes());

    debug_assert_eq!(buf.len(), length as usize);
    buf
}

/// Encode a snapshot frame.
pub fn encode_snapshot(sequence: u32, snapshot: &SnapshotUpdate) -> Vec<u8> {
    let length =
        (HEADER_LEN + SNAPSHOT_FIXED_LEN + snapshot.levels.len() * SNAPSHOT_LEVEL_LEN) as u16;
    let mut buf = Vec::with_capacity(length as usize);

    push_header(&mut buf, MessageType::MarketDataSnapshot, length, sequence);
    buf.extend_from_slice(&snapshot.symbol_id.to_le_bytes());
    buf.extend_from_slice(&(snapshot.levels.len() as u32).to_le_bytes());
    buf.extend_from_slice(&snapshot.exchange_timestamp.to_le_bytes());

    for level in &snapshot.levels {
        buf.extend_from_slice(&level.price.to_le_bytes());
        buf.extend_from_slice(&level.quantity.to_le_bytes());
        buf.push(side_byte(level.side));
        buf.extend_from_slice(&[0u8; 7]);
    }

    debug_assert_eq!(buf.len(), length as usize);
    buf
}
