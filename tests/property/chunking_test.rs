// tests/property/chunking_test.rs

//! A stream of frames decodes to the same packets however the transport splits it.

use bytes::BytesMut;
use proptest::prelude::*;
use serverhub::core::protocol::{Packet, PacketCodec};
use tokio_util::codec::{Decoder, Encoder};

fn packet_strategy() -> impl Strategy<Value = Packet> {
    (any::<u8>(), prop::collection::vec(any::<u8>(), 0..300)).prop_map(|(tag, payload)| Packet {
        tag,
        payload: payload.into(),
    })
}

fn encode_all(packets: &[Packet]) -> Vec<u8> {
    let mut codec = PacketCodec::unbounded();
    let mut wire = BytesMut::new();
    for packet in packets {
        codec.encode(packet.clone(), &mut wire).unwrap();
    }
    wire.to_vec()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_decoding_is_chunking_invariant(
        packets in prop::collection::vec(packet_strategy(), 1..20),
        chunk_sizes in prop::collection::vec(1usize..64, 1..50),
    ) {
        let wire = encode_all(&packets);

        let mut codec = PacketCodec::unbounded();
        let mut buffer = BytesMut::new();
        let mut decoded = Vec::new();
        let mut offset = 0;
        let mut sizes = chunk_sizes.iter().cycle();

        while offset < wire.len() {
            let size = (*sizes.next().unwrap()).min(wire.len() - offset);
            buffer.extend_from_slice(&wire[offset..offset + size]);
            offset += size;
            while let Some(packet) = codec.decode(&mut buffer).unwrap() {
                decoded.push(packet);
            }
        }

        prop_assert!(buffer.is_empty());
        prop_assert_eq!(decoded, packets);
    }

    #[test]
    fn test_incomplete_frames_never_yield_a_packet(
        packet in packet_strategy(),
        cut in 0usize..1000,
    ) {
        let wire = encode_all(std::slice::from_ref(&packet));
        let cut = cut % wire.len();

        let mut codec = PacketCodec::unbounded();
        let mut buffer = BytesMut::from(&wire[..cut]);
        prop_assert_eq!(codec.decode(&mut buffer).unwrap(), None);

        buffer.extend_from_slice(&wire[cut..]);
        prop_assert_eq!(codec.decode(&mut buffer).unwrap(), Some(packet));
    }
}
