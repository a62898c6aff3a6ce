#[cfg(test)]
mod tests {
    use crate::core::types::Side;
    use crate::market_data::protocol::*;

    fn create_update() -> IncrementalUpdate {
        IncrementalUpdate {
            symbol_id: 7,
            price: 101_25_000_000,
            quantity: 1_500,
            side: Side::Sell,
            exchange_timestamp: 987_654_321,
        }
    }

    #[test]
    fn test_incremental_round_trip() {
        let update = create_update();
        let frame = encode_incremental(42, &update);

        assert_eq!(frame.len(), HEADER_LEN + INCREMENTAL_LEN);

        let header = decode_header(&frame).unwrap();
        assert_eq!(header.message_type, MessageType::MarketDataIncremental);
        assert_eq!(header.length as usize, frame.len());
        assert_eq!(header.sequence_number, 42);

        match decode_message(&frame).unwrap() {
            Message::Incremental(_, decoded) => assert_eq!(decoded, update),
            other => panic!("expected incremental, got {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_round_trip() {
        let snapshot = SnapshotUpdate {
            symbol_id: 3,
            exchange_timestamp: 555,
            levels: vec![
                SnapshotLevel {
                    price: 100_00_000_000,
                    quantity: 10,
                    side: Side::Buy,
                },
                SnapshotLevel {
                    price: 100_50_000_000,
                    quantity: 20,
                    side: Side::Sell,
                },
            ],
        };

        let frame = encode_snapshot(9, &snapshot);
        assert_eq!(
            frame.len(),
            HEADER_LEN + SNAPSHOT_FIXED_LEN + 2 * SNAPSHOT_LEVEL_LEN
        );

        match decode_message(&frame).unwrap() {
            Message::Snapshot(header, decoded) => {
                assert_eq!(header.sequence_number, 9);
                assert_eq!(decoded, snapshot);
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn test_header_layout_is_byte_exact() {
        let frame = encode_incremental(0x0403_0201, &create_update());

        // u8 type, u8 version, u16 length, u32 sequence, little-endian.
        assert_eq!(frame[0], 1);
        assert_eq!(frame[1], 1);
        assert_eq!(
            u16::from_le_bytes([frame[2], frame[3]]) as usize,
            frame.len()
        );
        assert_eq!(&frame[4..8], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_truncated_header() {
        let err = decode_header(&[1, 0, 0]).unwrap_err();
        assert!(matches!(err, ParseError::Truncated { expected: 8, .. }));
    }

    #[test]
    fn test_truncated_payload() {
        let mut frame = encode_incremental(1, &create_update());
        frame.truncate(HEADER_LEN + 10);

        let err = decode_message(&frame).unwrap_err();
        assert!(matches!(err, ParseError::Truncated { .. }));
    }

    #[test]
    fn test_snapshot_truncated_levels() {
        let snapshot = SnapshotUpdate {
            symbol_id: 1,
            exchange_timestamp: 0,
            levels: vec![SnapshotLevel {
                price: 1,
                quantity: 1,
                side: Side::Buy,
            }],
        };

        let mut frame = encode_snapshot(1, &snapshot);
        // Keep the declared level count but cut its bytes off.
        frame.truncate(HEADER_LEN + SNAPSHOT_FIXED_LEN + 5);

        let err = decode_message(&frame).unwrap_err();
        assert!(matches!(err, ParseError::Truncated { .. }));
    }

    #[test]
    fn test_unknown_message_type() {
        let mut frame = encode_incremental(1, &create_update());
        frame[0] = 99;

        assert_eq!(
            decode_message(&frame).unwrap_err(),
            ParseError::UnknownMessageType(99)
        );
    }

    #[test]
    fn test_order_entry_types_are_not_market_data() {
        let mut frame = encode_incremental(1, &create_update());
        frame[0] = MessageType::NewOrder as u8;

        assert_eq!(
            decode_message(&frame).unwrap_err(),
            ParseError::UnsupportedMessageType(MessageType::NewOrder)
        );
    }

    #[test]
    fn test_invalid_side_byte() {
        let mut frame = encode_incremental(1, &create_update());
        frame[HEADER_LEN + 20] = 7;

        assert_eq!(
            decode_message(&frame).unwrap_err(),
            ParseError::InvalidSide(7)
        );
    }
}
