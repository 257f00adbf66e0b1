use bytes::{Buf, BufMut, Bytes, BytesMut};
use packed_struct::{PackedStructSlice, PackingError};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

use super::packets::Command;

pub const FRAME_START: u8 = 0xfc;
const FRAME_B2: u8 = 0x01;
const FRAME_B3: u8 = 0x30;

/// start, type, 0x01, 0x30, data length
pub const HEADER_LEN: usize = 5;

/// Every frame the unit sends or accepts carries at most 16 data bytes.
pub const MAX_DATA_LEN: usize = 0x10;

/// Checksum over every byte that precedes the checksum position.
///
/// `0xfc - sum(bytes)`, both modulo 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, byte| acc.wrapping_add(*byte));
    FRAME_START.wrapping_sub(sum)
}

/// Check the trailing checksum byte of a complete frame.
pub fn checksum_valid(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((received, body)) => checksum(body) == *received,
        None => false,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub packet_type: u8,
    pub data: Bytes,
}

impl Frame {
    pub fn new(packet_type: u8, data: impl Into<Bytes>) -> Self {
        Self {
            packet_type,
            data: data.into(),
        }
    }

    /// Pack a `Command` `PackedStruct` into a new `Frame`.
    pub fn pack<T>(cmd: &T) -> Result<Self, PackingError>
    where
        T: PackedStructSlice + Command,
    {
        Ok(Self {
            packet_type: T::ID,
            data: cmd.pack_to_vec()?.into(),
        })
    }

    /// Unpack the frame's data as a `Command` `PackedStruct`.
    pub fn unpack_as<T>(&self) -> Result<T, PackingError>
    where
        T: PackedStructSlice + Command,
    {
        T::unpack_from_slice(&self.data)
    }

    /// Length of the frame on the wire.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.data.len() + 1
    }

    pub fn header(&self) -> [u8; HEADER_LEN] {
        [FRAME_START, self.packet_type, FRAME_B2, FRAME_B3, self.data.len() as u8]
    }

    /// The complete wire encoding, checksum included.
    pub fn to_bytes(&self) -> BytesMut {
        let mut dst = BytesMut::with_capacity(self.encoded_len());
        write_frame(self, &mut dst);
        dst
    }
}

fn write_frame(frame: &Frame, dst: &mut BytesMut) {
    let start = dst.len();

    dst.reserve(frame.encoded_len());
    dst.put_slice(&frame.header());
    dst.put_slice(&frame.data);

    let checksum = checksum(&dst[start..]);
    dst.put_u8(checksum);
}

/// A received frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RxFrame {
    Valid(Frame),

    /// A complete frame whose checksum did not match. It has been consumed
    /// from the input and carries no usable data.
    Corrupted(Vec<u8>),
}

#[derive(Error, Debug)]
enum FramingError {
    #[error("input buffer too small")]
    BufferTooSmall,
    #[error("start of frame marker not found")]
    FrameStartNotFound,
    #[error("unrecognised frame header {0:02x?}")]
    HeaderMismatch([u8; HEADER_LEN]),
    #[error("invalid checksum (expected {expected:x}, actual: {actual:x})")]
    InvalidChecksum {
        expected: u8,
        actual: u8,
        frame: Vec<u8>,
    },
}

/// Frames the CN105 byte stream.
///
/// Junk before a frame start byte is skipped, as is any start byte that
/// isn't followed by a plausible header. A partial frame is left in the
/// buffer untouched until the rest of it arrives.
#[derive(Debug, Default)]
pub struct Cn105Codec {
    checksum_errors: usize,
    skipped_bytes: usize,
}

impl Cn105Codec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames discarded because of a checksum mismatch.
    pub fn checksum_errors(&self) -> usize {
        self.checksum_errors
    }

    /// Number of bytes discarded while looking for a frame start.
    pub fn skipped_bytes(&self) -> usize {
        self.skipped_bytes
    }
}

fn try_read_frame(src: &mut BytesMut) -> Result<Frame, FramingError> {
    if src.is_empty() {
        return Err(FramingError::BufferTooSmall);
    }

    if src[0] != FRAME_START {
        return Err(FramingError::FrameStartNotFound);
    }

    if src.len() < HEADER_LEN {
        return Err(FramingError::BufferTooSmall);
    }

    let header: [u8; HEADER_LEN] = [src[0], src[1], src[2], src[3], src[4]];
    let data_len = header[4] as usize;

    if header[2] != FRAME_B2 || header[3] != FRAME_B3 || data_len > MAX_DATA_LEN {
        return Err(FramingError::HeaderMismatch(header));
    }

    let size = HEADER_LEN + data_len + 1;
    if src.len() < size {
        return Err(FramingError::BufferTooSmall);
    }

    let raw = src.split_to(size);

    let expected = checksum(&raw[..size - 1]);
    let actual = raw[size - 1];
    if expected != actual {
        return Err(FramingError::InvalidChecksum {
            expected,
            actual,
            frame: raw.to_vec(),
        });
    }

    let mut raw = raw.freeze();
    raw.advance(HEADER_LEN);
    raw.truncate(data_len);

    Ok(Frame {
        packet_type: header[1],
        data: raw,
    })
}

impl Decoder for Cn105Codec {
    type Item = RxFrame;

    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match try_read_frame(src) {
                Ok(frame) => {
                    trace!("RX {:02x?}: {:02x?}", frame.packet_type, &frame.data[..]);
                    return Ok(Some(RxFrame::Valid(frame)));
                }

                // need more data to read a complete frame
                Err(FramingError::BufferTooSmall) => return Ok(None),

                Err(FramingError::FrameStartNotFound) => {
                    // skip everything up to the next start marker
                    let junk = src
                        .iter()
                        .position(|b| *b == FRAME_START)
                        .unwrap_or(src.len());
                    trace!("skipping {junk} bytes of junk");
                    self.skipped_bytes += junk;
                    src.advance(junk);
                }

                Err(err @ FramingError::HeaderMismatch(_)) => {
                    // the start marker was likely inside a frame we lost sync with
                    trace!("{err}");
                    self.skipped_bytes += 1;
                    src.advance(1);
                }

                Err(FramingError::InvalidChecksum { expected, actual, frame }) => {
                    warn!("discarding frame {frame:02x?}: invalid checksum (expected {expected:#04x}, actual {actual:#04x})");
                    self.checksum_errors += 1;
                    return Ok(Some(RxFrame::Corrupted(frame)));
                }
            }
        }
    }
}

impl Encoder<Frame> for Cn105Codec {
    type Error = std::io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if frame.data.len() > MAX_DATA_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("frame data too long ({} bytes)", frame.data.len()),
            ));
        }

        write_frame(&frame, dst);

        trace!("TX {:02x?}", &dst[..]);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use proptest::prelude::*;
    use rstest::rstest;
    use tokio_util::codec::FramedRead;

    use super::*;

    const CONNECT_ACK: [u8; 7] = [0xfc, 0x7a, 0x01, 0x30, 0x01, 0x00, 0x54];

    fn settings_info_request() -> Vec<u8> {
        let mut frame = vec![0xfc, 0x42, 0x01, 0x30, 0x10, 0x02];
        frame.extend_from_slice(&[0x00; 15]);
        frame.push(0x7b);
        frame
    }

    #[rstest]
    #[case(&[0xfc, 0x5a, 0x01, 0x30, 0x02, 0xca, 0x01], 0xa8)]
    #[case(&[0xfc, 0x7a, 0x01, 0x30, 0x01, 0x00], 0x54)]
    #[case(&[0xfc, 0x42, 0x01, 0x30, 0x10, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], 0x7b)]
    #[case(&[0xfc, 0x42, 0x01, 0x30, 0x10, 0x03, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], 0x7a)]
    fn checksum_vectors(#[case] body: &[u8], #[case] expected: u8) {
        assert_eq!(checksum(body), expected);
    }

    #[test]
    fn checksum_is_deterministic() {
        let body = &settings_info_request()[..21];
        assert_eq!(checksum(body), checksum(body));
    }

    proptest! {
        #[test]
        fn any_single_byte_flip_is_detected(index in 0usize..22, mask in 1u8..=255) {
            let mut frame = settings_info_request();
            prop_assert!(checksum_valid(&frame));

            frame[index] ^= mask;
            prop_assert!(!checksum_valid(&frame));
        }
    }

    #[test]
    fn decodes_a_frame() {
        let mut codec = Cn105Codec::new();
        let mut buf = BytesMut::from(&CONNECT_ACK[..]);

        let frame = codec.decode(&mut buf).unwrap();

        assert_eq!(frame, Some(RxFrame::Valid(Frame::new(0x7a, vec![0x00]))));
        assert!(buf.is_empty());
    }

    #[test]
    fn skips_junk_before_a_frame() {
        let mut codec = Cn105Codec::new();
        let mut buf = BytesMut::new();
        buf.put(&[0x42, 0x00, 0x13][..]);
        buf.put(&CONNECT_ACK[..]);

        let frame = codec.decode(&mut buf).unwrap();

        assert_eq!(frame, Some(RxFrame::Valid(Frame::new(0x7a, vec![0x00]))));
        assert_eq!(codec.skipped_bytes(), 3);
    }

    #[test]
    fn skips_a_start_byte_with_a_bad_header() {
        let mut codec = Cn105Codec::new();
        let mut buf = BytesMut::new();
        // a start marker followed by something that isn't a header
        buf.put(&[0xfc, 0x99, 0x02, 0x31, 0x01][..]);
        buf.put(&CONNECT_ACK[..]);

        let frame = codec.decode(&mut buf).unwrap();

        assert_eq!(frame, Some(RxFrame::Valid(Frame::new(0x7a, vec![0x00]))));
    }

    #[test]
    fn rejects_oversized_lengths() {
        let mut codec = Cn105Codec::new();
        let mut buf = BytesMut::from(&[0xfc, 0x62, 0x01, 0x30, 0x40, 0x00][..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn leaves_partial_frames_in_place() {
        let mut codec = Cn105Codec::new();
        let request = settings_info_request();
        let mut buf = BytesMut::from(&request[..10]);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], &request[..10]);

        buf.put(&request[10..]);
        let frame = codec.decode(&mut buf).unwrap();

        assert!(matches!(frame, Some(RxFrame::Valid(Frame { packet_type: 0x42, .. }))));
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_header_is_not_consumed() {
        let mut codec = Cn105Codec::new();
        let mut buf = BytesMut::from(&[0xfc, 0x62, 0x01][..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn reports_and_consumes_corrupted_frames() {
        let mut codec = Cn105Codec::new();
        let mut corrupted = CONNECT_ACK;
        corrupted[6] = 0x42;

        let mut buf = BytesMut::new();
        buf.put(&corrupted[..]);
        buf.put(&CONNECT_ACK[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(RxFrame::Corrupted(corrupted.to_vec())));
        assert_eq!(codec.checksum_errors(), 1);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(RxFrame::Valid(Frame::new(0x7a, vec![0x00]))));
    }

    #[test]
    fn encodes_with_checksum() {
        let mut codec = Cn105Codec::new();
        let mut buf = BytesMut::new();

        codec.encode(Frame::new(0x5a, vec![0xca, 0x01]), &mut buf).unwrap();

        assert_eq!(&buf[..], &[0xfc, 0x5a, 0x01, 0x30, 0x02, 0xca, 0x01, 0xa8]);
    }

    #[test]
    fn refuses_to_encode_oversized_frames() {
        let mut codec = Cn105Codec::new();
        let mut buf = BytesMut::new();

        assert!(codec.encode(Frame::new(0x41, vec![0x00; 17]), &mut buf).is_err());
    }

    #[tokio::test]
    async fn framed_read_yields_every_frame() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&[0x00, 0x01]);
        stream.extend_from_slice(&CONNECT_ACK);
        stream.extend_from_slice(&settings_info_request());

        let mut framed = FramedRead::new(&stream[..], Cn105Codec::new());

        let first = framed.next().await.unwrap().unwrap();
        let second = framed.next().await.unwrap().unwrap();

        assert!(matches!(first, RxFrame::Valid(Frame { packet_type: 0x7a, .. })));
        assert!(matches!(second, RxFrame::Valid(Frame { packet_type: 0x42, .. })));
        assert!(framed.next().await.is_none());
    }
}
