//! Property tests for the BER-TLV codec

use emv_common::{decode, encode, Tlv, TlvError};
use proptest::prelude::*;

fn primitive_tag() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        // Application class, primitive, single byte (5F excluded: it continues)
        (0x40u8..=0x5E).prop_map(|b| vec![b]),
        // Context class, primitive, single byte (9F excluded)
        (0x80u8..=0x9E).prop_map(|b| vec![b]),
        (0x00u8..0x80).prop_map(|b| vec![0x9F, b]),
        (0x00u8..0x80).prop_map(|b| vec![0x5F, b]),
        (0x80u8..=0xFF, 0x00u8..0x80).prop_map(|(a, b)| vec![0xDF, a, b]),
    ]
}

fn constructed_tag() -> impl Strategy<Value = Vec<u8>> {
    prop::sample::select(vec![
        vec![0x61],
        vec![0x6F],
        vec![0x70],
        vec![0x77],
        vec![0xA5],
        vec![0xBF, 0x0C],
    ])
}

fn tlv_tree() -> impl Strategy<Value = Tlv> {
    let leaf = (primitive_tag(), prop::collection::vec(any::<u8>(), 0..300))
        .prop_map(|(tag, value)| Tlv::primitive(tag, value));

    leaf.prop_recursive(4, 48, 5, |inner| {
        (constructed_tag(), prop::collection::vec(inner, 0..5))
            .prop_map(|(tag, children)| Tlv::constructed(tag, children))
    })
}

proptest! {
    #[test]
    fn encoded_trees_decode_to_the_same_tree(nodes in prop::collection::vec(tlv_tree(), 1..4)) {
        let bytes = encode(&nodes);
        let decoded = decode(&bytes).unwrap();
        prop_assert_eq!(decoded, nodes);
    }

    #[test]
    fn dropping_the_last_byte_is_reported_as_truncation(nodes in prop::collection::vec(tlv_tree(), 1..4)) {
        let bytes = encode(&nodes);
        let result = decode(&bytes[..bytes.len() - 1]);
        prop_assert!(matches!(result, Err(TlvError::Truncated { .. })), "got {:?}", result);
    }
}

#[test]
fn length_beyond_buffer_is_truncated_not_a_panic() {
    // 5A declares 0x7F bytes but only three follow
    let result = decode(&[0x5A, 0x7F, 0x41, 0x11, 0x11]);
    assert_eq!(
        result,
        Err(TlvError::Truncated {
            needed: 0x7F,
            remaining: 3
        })
    );

    // Long form length announcing 2 bytes but carrying 1
    let result = decode(&[0x90, 0x82, 0x01]);
    assert!(matches!(result, Err(TlvError::Truncated { .. })));
}
