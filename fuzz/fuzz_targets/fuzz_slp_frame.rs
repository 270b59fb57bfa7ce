#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use mc_remote::core::codec::SlpCodec;
use mc_remote::core::slp_packet::Handshake;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    let _ = Handshake::parse(data);

    let mut codec = SlpCodec::default();
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
});
