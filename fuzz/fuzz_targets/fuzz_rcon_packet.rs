#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use mc_remote::core::codec::RconCodec;
use mc_remote::core::rcon_packet::RconPacket;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Arbitrary server bytes must never panic, only decode or error
    let _ = RconPacket::try_read(data);

    let mut codec = RconCodec::default();
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
});
