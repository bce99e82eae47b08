//! Property-based tests for framing, masking and handshake parsing.

use proptest::prelude::*;
use wspoll::protocol::frame::{LEN_MARKER_16, LEN_MARKER_64, length_encoding};
use wspoll::protocol::{Frame, HandshakeRequest, OpCode, apply_mask, apply_mask_fast};

fn data_opcode_strategy() -> impl Strategy<Value = OpCode> {
    prop_oneof![
        Just(OpCode::Text),
        Just(OpCode::Binary),
        Just(OpCode::Continuation),
    ]
}

fn any_opcode_strategy() -> impl Strategy<Value = OpCode> {
    prop_oneof![
        Just(OpCode::Continuation),
        Just(OpCode::Text),
        Just(OpCode::Binary),
        Just(OpCode::Close),
        Just(OpCode::Ping),
        Just(OpCode::Pong),
    ]
}

proptest! {
    #[test]
    fn test_masked_frame_parses_back(
        fin in any::<bool>(),
        opcode in data_opcode_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..500),
        mask in any::<[u8; 4]>()
    ) {
        let frame = Frame::new(fin, opcode, payload);
        let mut buf = vec![0u8; frame.wire_size(true)];
        let written = frame.write(&mut buf, Some(mask)).unwrap();

        let (parsed, consumed) = Frame::parse(&buf[..written]).unwrap();
        prop_assert_eq!(consumed, written);
        prop_assert_eq!(parsed, frame);
    }

    #[test]
    fn test_fast_mask_matches_bytewise(
        data in prop::collection::vec(any::<u8>(), 0..2000),
        mask in any::<[u8; 4]>()
    ) {
        let mut slow = data.clone();
        let mut fast = data.clone();
        apply_mask(&mut slow, mask);
        apply_mask_fast(&mut fast, mask);
        prop_assert_eq!(&slow, &fast);

        apply_mask_fast(&mut fast, mask);
        prop_assert_eq!(data, fast);
    }

    #[test]
    fn test_smallest_length_form_is_used(len in 0usize..70000) {
        let frame = Frame::binary(vec![0u8; len]);
        let bytes = frame.to_bytes();
        let len_field = bytes[1] & 0x7F;

        let (expected_field, extended) = length_encoding(len);
        prop_assert_eq!(len_field, expected_field);
        prop_assert_eq!(bytes.len(), 2 + extended + len);

        if len <= 125 {
            prop_assert_eq!(usize::from(len_field), len);
        } else if len <= 65535 {
            prop_assert_eq!(len_field, LEN_MARKER_16);
            prop_assert_eq!(usize::from(u16::from_be_bytes([bytes[2], bytes[3]])), len);
        } else {
            prop_assert_eq!(len_field, LEN_MARKER_64);
        }
    }

    #[test]
    fn test_server_frames_are_never_masked(
        opcode in any_opcode_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..300)
    ) {
        let bytes = Frame::new(true, opcode, payload).to_bytes();
        prop_assert_eq!(bytes[1] & 0x80, 0);
        prop_assert_eq!(bytes[0] & 0x80, 0x80);
    }

    #[test]
    fn test_wire_size_accuracy(
        fin in any::<bool>(),
        opcode in any_opcode_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..10000),
        masked in any::<bool>()
    ) {
        let frame = Frame::new(fin, opcode, payload);
        let expected_size = frame.wire_size(masked);

        let mask = if masked { Some([0x12, 0x34, 0x56, 0x78]) } else { None };
        let mut buf = vec![0u8; expected_size + 100];
        let written = frame.write(&mut buf, mask).unwrap();
        prop_assert_eq!(expected_size, written);
    }

    #[test]
    fn test_incomplete_frame_detection(
        payload in prop::collection::vec(any::<u8>(), 1..500),
        truncate_by in 1..50usize
    ) {
        let bytes = Frame::binary(payload).to_bytes();
        let truncated_len = bytes.len().saturating_sub(truncate_by).max(1);
        prop_assert!(Frame::parse(&bytes[..truncated_len]).is_err());
    }

    #[test]
    fn test_sequential_frame_parsing(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..100), 1..5)
    ) {
        let buf: Vec<u8> = payloads
            .iter()
            .flat_map(|p| Frame::binary(p.clone()).to_bytes())
            .collect();

        let mut offset = 0;
        for (i, original) in payloads.iter().enumerate() {
            let (parsed, consumed) = Frame::parse(&buf[offset..]).unwrap();
            prop_assert_eq!(parsed.payload(), original.as_slice(), "frame {} payload mismatch", i);
            offset += consumed;
        }
        prop_assert_eq!(offset, buf.len());
    }

    #[test]
    fn test_handshake_lines_never_panic(
        lines in prop::collection::vec("[ -~]{0,80}", 0..20)
    ) {
        if let Ok(request) = HandshakeRequest::from_lines(&lines) {
            let _ = request.validate();
        }
    }

    #[test]
    fn test_handshake_valid_variations(
        path in "[a-z]{1,20}",
        host in "[a-z]{3,10}\\.[a-z]{2,4}"
    ) {
        let request_line = format!("GET /{} HTTP/1.1", path);
        let host_line = format!("Host: {}", host);
        let lines = [
            request_line.as_str(),
            host_line.as_str(),
            "Upgrade: websocket",
            "Connection: Upgrade",
            "Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==",
            "Sec-WebSocket-Version: 13",
        ];

        let request = HandshakeRequest::from_lines(&lines).unwrap();
        prop_assert!(request.validate().is_ok());
        prop_assert_eq!(request.path, path);
    }
}

#[cfg(test)]
mod targeted_tests {
    use super::*;

    #[test]
    fn test_length_thresholds() {
        for (len, field, header) in [
            (0usize, 0u8, 2usize),
            (125, 125, 2),
            (126, LEN_MARKER_16, 4),
            (65535, LEN_MARKER_16, 4),
            (65536, LEN_MARKER_64, 10),
        ] {
            let bytes = Frame::binary(vec![0xAB; len]).to_bytes();
            assert_eq!(bytes[1], field, "len {len}");
            assert_eq!(bytes.len(), header + len, "len {len}");
        }
    }

    #[test]
    fn test_zero_mask() {
        let payload = b"test payload".to_vec();
        let frame = Frame::text(payload.clone());
        let mut buf = vec![0u8; frame.wire_size(true)];
        frame.write(&mut buf, Some([0, 0, 0, 0])).unwrap();

        let (parsed, _) = Frame::parse(&buf).unwrap();
        assert_eq!(parsed.payload(), payload.as_slice());
    }
}
