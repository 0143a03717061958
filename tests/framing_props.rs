// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

use proptest::prelude::*;

use bosch_mode2::constants::{MAX_FRAME_LEN, STATUS_DATA};
use bosch_mode2::notification;
use bosch_mode2::protocol::{decode_bitmask, encode_bitmask, Reply, Request};

#[test]
fn test_bitmask_msb_first() {
    assert_eq!(decode_bitmask(&[0b1010_0000]), vec![1, 3]);
    assert_eq!(decode_bitmask(&[0x00, 0x01]), vec![16]);
}

proptest! {
    #[test]
    fn prop_request_decodes_to_itself(
        opcode in any::<u8>(),
        format in proptest::option::of(any::<u8>()),
        payload in proptest::collection::vec(any::<u8>(), 0..200),
    ) {
        let request = Request { opcode, format, payload };
        let frame = request.encode().unwrap();
        prop_assert!(frame.len() <= MAX_FRAME_LEN);
        prop_assert_eq!(usize::from(frame[1]), frame.len() - 2);
        prop_assert_eq!(Request::decode(&frame, format.is_some()).unwrap(), request);
    }

    #[test]
    fn prop_oversized_request_rejected(extra in 0usize..64) {
        let request = Request {
            opcode: 0x38,
            format: None,
            payload: vec![0; MAX_FRAME_LEN - 2 + extra],
        };
        prop_assert!(request.encode().is_err());
    }

    #[test]
    fn prop_reply_with_wrong_length_rejected(
        data in proptest::collection::vec(any::<u8>(), 0..100),
        skew in 1u8..5,
    ) {
        let mut frame = Reply::encode(STATUS_DATA, &data);
        frame[1] = frame[1].wrapping_add(skew);
        prop_assert!(Reply::parse(&frame).is_err());
    }

    #[test]
    fn prop_bitmask_roundtrip(units in proptest::collection::btree_set(1u16..=256, 0..40)) {
        let units: Vec<u16> = units.into_iter().collect();
        let mask = encode_bitmask(&units, 32).unwrap();
        prop_assert_eq!(decode_bitmask(&mask), units);
    }

    #[test]
    fn prop_notification_decode_never_panics(body in proptest::collection::vec(any::<u8>(), 0..64)) {
        let mut frame = vec![0x02];
        frame.extend_from_slice(&(body.len() as u16).to_be_bytes());
        frame.extend_from_slice(&body);
        let _ = notification::decode(&frame);
    }
}
