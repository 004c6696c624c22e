use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::Error;

/// Frames byte streams into lines.
///
/// Used for reading the control node helper's output one line at a
/// time, and for terminating outgoing command lines.
#[derive(Debug)]
pub(crate) struct LinesCodec {
    /// How far into the buffer we have already looked for a delimiter.
    cursor: usize,

    /// The delimiter splitting incoming bytes.
    /// Not included in the yielded frames.
    read_delimiter: u8,

    /// If provided, appended to each encoded frame.
    write_delimiter: Option<u8>,
}

impl LinesCodec {
    pub(crate) fn new(read_delimiter: u8, write_delimiter: Option<u8>) -> Self {
        Self {
            cursor: 0,
            read_delimiter,
            write_delimiter,
        }
    }
}

impl Default for LinesCodec {
    fn default() -> Self {
        Self::new(b'\n', Some(b'\n'))
    }
}

impl Decoder for LinesCodec {
    type Item = Vec<u8>;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let read_to = src.len();

        let look_at = &src[self.cursor..read_to];

        if let Some(position) = look_at.iter().position(|&byte| byte == self.read_delimiter) {
            // The position is relative to the cursor.
            let actual_position = self.cursor + position;

            self.cursor = 0;

            let line = src.split_to(actual_position);

            // Discard the delimiter itself.
            src.advance(1);

            Ok(Some(line[..].to_vec()))
        } else {
            // No full frame yet.
            // We get called again with the same buffer once more data
            // arrives, so remember how far we looked.
            self.cursor = read_to;

            Ok(None)
        }
    }
}

impl Encoder<Vec<u8>> for LinesCodec {
    type Error = Error;

    fn encode(&mut self, item: Vec<u8>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);

        if let Some(delimiter) = self.write_delimiter {
            dst.extend_from_slice(&[delimiter]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn lines_across_chunks() {
        let mut codec = LinesCodec::default();
        let mut buffer = BytesMut::new();

        buffer.extend_from_slice(b"start reset");
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);

        buffer.extend_from_slice(b" ack\nerror 1");
        assert_eq!(
            codec.decode(&mut buffer).unwrap(),
            Some(b"start reset ack".to_vec())
        );
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);

        buffer.extend_from_slice(b"\n");
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(b"error 1".to_vec()));
    }

    #[test]
    fn encode_appends_newline() {
        let mut codec = LinesCodec::default();
        let mut buffer = BytesMut::new();

        codec.encode(b"start dc".to_vec(), &mut buffer).unwrap();

        assert_eq!(&buffer[..], b"start dc\n");
    }
}
