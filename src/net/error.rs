/// Failures raised while decoding one server message.
///
/// `Underflow`, `UnknownOpcode` and `NoInterestWindow` abort the rest of the
/// message. The creature variants are field-local: the bytes are consumed,
/// the mutation is dropped and decoding continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("message underflow at offset {offset}: needed {needed} bytes, {remaining} left")]
    Underflow {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("creature {0} referenced as known but never introduced")]
    UnresolvedCreatureReference(u32),
    #[error("creature id 0x{0:08x} is outside every known id range")]
    InvalidCreatureIdRange(u32),
    #[error("map update received before the first full map description")]
    NoInterestWindow,
}
