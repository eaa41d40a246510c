use dtls_utils::{U24, U48};
use zerocopy::byteorder::big_endian::U16;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// The 13-byte record header (spec.md §4.1). `Pod`-equivalent via
/// zerocopy, so it can be read from and written into a caller buffer
/// with no allocation, the same way `rustyguard_types::HandshakeInit`
/// is laid directly over the wire.
#[derive(Clone, Copy, FromBytes, FromZeroes, AsBytes, Debug)]
#[repr(C)]
pub struct RecordHeader {
    pub content_type: u8,
    pub version: U16,
    pub epoch: U16,
    pub sequence: U48,
    pub length: U16,
}

pub const RECORD_HEADER_LEN: usize = core::mem::size_of::<RecordHeader>();

impl RecordHeader {
    pub fn new(content_type: u8, version: u16, epoch: u16, sequence: u64, length: u16) -> Self {
        Self {
            content_type,
            version: U16::new(version),
            epoch: U16::new(epoch),
            sequence: U48::new(sequence),
            length: U16::new(length),
        }
    }
}

/// The 12-byte handshake header (spec.md §4.1). Fragmentation fields are
/// always `fragment_offset=0, fragment_length=length` on encode (this
/// core never emits fragments); decode must still accept them.
#[derive(Clone, Copy, FromBytes, FromZeroes, AsBytes, Debug)]
#[repr(C)]
pub struct HandshakeHeader {
    pub msg_type: u8,
    pub length: U24,
    pub message_seq: U16,
    pub fragment_offset: U24,
    pub fragment_length: U24,
}

pub const HANDSHAKE_HEADER_LEN: usize = core::mem::size_of::<HandshakeHeader>();

impl HandshakeHeader {
    pub fn whole_message(msg_type: u8, length: u32, message_seq: u16) -> Self {
        Self {
            msg_type,
            length: U24::new(length),
            message_seq: U16::new(message_seq),
            fragment_offset: U24::ZERO,
            fragment_length: U24::new(length),
        }
    }

    pub fn is_fragmented(&self) -> bool {
        self.fragment_length.get() < self.length.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::AsBytes;

    #[test]
    fn record_header_is_13_bytes() {
        assert_eq!(RECORD_HEADER_LEN, 13);
    }

    #[test]
    fn handshake_header_is_12_bytes() {
        assert_eq!(HANDSHAKE_HEADER_LEN, 12);
    }

    #[test]
    fn record_header_round_trips_bytes() {
        let h = RecordHeader::new(22, 0xfefd, 3, 0x0102_0304_0506, 42);
        let bytes = h.as_bytes();
        let parsed = RecordHeader::read_from(bytes).unwrap();
        assert_eq!(parsed.content_type, 22);
        assert_eq!(parsed.version.get(), 0xfefd);
        assert_eq!(parsed.epoch.get(), 3);
        assert_eq!(parsed.sequence.get(), 0x0102_0304_0506);
        assert_eq!(parsed.length.get(), 42);
    }

    #[test]
    fn handshake_header_fragmentation_flag() {
        let whole = HandshakeHeader::whole_message(1, 100, 0);
        assert!(!whole.is_fragmented());

        let mut frag = whole;
        frag.fragment_length = U24::new(50);
        assert!(frag.is_fragmented());
    }
}
