//! Newline frame reader for incoming connections

use crate::types::Frame;
use crate::{LinelogError, Result};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Accumulates received bytes until the first newline or end of stream
#[derive(Debug, Clone)]
pub struct FrameReader {
    chunk_size: usize,
    max_frame_bytes: Option<usize>,
}

impl FrameReader {
    /// Create a reader that receives `chunk_size` bytes per call
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            max_frame_bytes: None,
        }
    }

    /// Reject frames longer than `limit` bytes; 0 disables the limit
    pub fn with_max_frame_bytes(mut self, limit: usize) -> Self {
        self.max_frame_bytes = (limit > 0).then_some(limit);
        self
    }

    /// Read one frame from `stream`.
    ///
    /// Stops at the first newline (kept in the frame) or when the peer closes.
    /// Bytes that arrive after the newline in the same receive are discarded.
    pub async fn read_frame<R>(&self, stream: &mut R) -> Result<Frame>
    where
        R: AsyncRead + Unpin,
    {
        let mut scratch = vec![0u8; self.chunk_size];
        let mut buffer: Vec<u8> = Vec::new();
        let mut receives = 0usize;

        loop {
            let n = stream.read(&mut scratch).await?;
            if n == 0 {
                debug!("Peer closed after {} bytes in {} receives", buffer.len(), receives);
                return Ok(Frame::new(Bytes::from(buffer), false));
            }
            receives += 1;

            let chunk = &scratch[..n];
            let newline = chunk.iter().position(|&b| b == b'\n');
            let take = newline.map_or(n, |pos| pos + 1);

            self.grow(&mut buffer, take)?;
            buffer.extend_from_slice(&chunk[..take]);

            if newline.is_some() {
                debug!("Frame of {} bytes in {} receives", buffer.len(), receives);
                return Ok(Frame::new(Bytes::from(buffer), true));
            }
        }
    }

    /// Make room for `additional` bytes, at least doubling on shortfall.
    fn grow(&self, buffer: &mut Vec<u8>, additional: usize) -> Result<()> {
        let needed = buffer.len() + additional;
        if let Some(limit) = self.max_frame_bytes {
            if needed > limit {
                return Err(LinelogError::FrameTooLarge { limit });
            }
        }
        if needed > buffer.capacity() {
            let target = needed.max(buffer.capacity() * 2);
            buffer.try_reserve_exact(target - buffer.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::io;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_single_receive_frame() {
        let mut stream = Builder::new().read(b"hello\n").build();
        let frame = FrameReader::new(100).read_frame(&mut stream).await.unwrap();
        assert_eq!(frame.as_bytes(), b"hello\n");
        assert!(frame.is_terminated());
    }

    #[tokio::test]
    async fn test_frame_spans_many_receives() {
        let mut stream = Builder::new()
            .read(b"he")
            .read(b"ll")
            .read(b"o wor")
            .read(b"ld\n")
            .build();
        let frame = FrameReader::new(100).read_frame(&mut stream).await.unwrap();
        assert_eq!(frame.as_bytes(), b"hello world\n");
    }

    #[tokio::test]
    async fn test_newline_on_chunk_boundary() {
        // chunk size 4: "abc\n" fills the first chunk exactly
        let mut stream = Builder::new().read(b"abc\n").build();
        let frame = FrameReader::new(4).read_frame(&mut stream).await.unwrap();
        assert_eq!(frame.as_bytes(), b"abc\n");

        // newline is the first byte of the second chunk
        let mut stream = Builder::new().read(b"abcd").read(b"\n").build();
        let frame = FrameReader::new(4).read_frame(&mut stream).await.unwrap();
        assert_eq!(frame.as_bytes(), b"abcd\n");
    }

    #[tokio::test]
    async fn test_small_chunks_split_large_frame() {
        let payload: Vec<u8> = (0..1000).map(|i| b'a' + (i % 26) as u8).collect();
        let mut input = payload.clone();
        input.push(b'\n');

        let mut stream = Builder::new().read(&input).build();
        let frame = FrameReader::new(7).read_frame(&mut stream).await.unwrap();
        assert_eq!(frame.as_bytes(), input.as_slice());
    }

    #[tokio::test]
    async fn test_random_split_points_never_drop_bytes() {
        let mut rng = StdRng::seed_from_u64(0x11e1_09);
        for _ in 0..50 {
            let len = rng.gen_range(1..400);
            let mut input: Vec<u8> = (0..len).map(|_| rng.gen_range(b' '..=b'~')).collect();
            input.push(b'\n');

            let mut builder = Builder::new();
            let mut rest = input.as_slice();
            while !rest.is_empty() {
                let cut = rng.gen_range(1..=rest.len());
                builder.read(&rest[..cut]);
                rest = &rest[cut..];
            }
            let mut stream = builder.build();

            let chunk = rng.gen_range(1..64);
            let frame = FrameReader::new(chunk).read_frame(&mut stream).await.unwrap();
            assert_eq!(frame.as_bytes(), input.as_slice());
        }
    }

    #[tokio::test]
    async fn test_peer_close_without_newline() {
        let mut stream = Builder::new().read(b"no newline").build();
        let frame = FrameReader::new(100).read_frame(&mut stream).await.unwrap();
        assert_eq!(frame.as_bytes(), b"no newline");
        assert!(!frame.is_terminated());
    }

    #[tokio::test]
    async fn test_immediate_close_is_empty_frame() {
        let mut stream = Builder::new().build();
        let frame = FrameReader::new(100).read_frame(&mut stream).await.unwrap();
        assert!(frame.is_empty());
        assert!(!frame.is_terminated());
    }

    #[tokio::test]
    async fn test_bytes_after_first_newline_are_discarded() {
        let mut stream = Builder::new().read(b"first\nsecond\n").build();
        let frame = FrameReader::new(100).read_frame(&mut stream).await.unwrap();
        assert_eq!(frame.as_bytes(), b"first\n");
    }

    #[tokio::test]
    async fn test_receive_error_aborts_frame() {
        let mut stream = Builder::new()
            .read(b"part")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let result = FrameReader::new(100).read_frame(&mut stream).await;
        assert!(matches!(result, Err(LinelogError::Io(_))));
    }

    #[tokio::test]
    async fn test_max_frame_bytes() {
        let mut stream = Builder::new().read(b"01234567").build();
        let reader = FrameReader::new(4).with_max_frame_bytes(6);
        let result = reader.read_frame(&mut stream).await;
        assert!(matches!(result, Err(LinelogError::FrameTooLarge { limit: 6 })));
    }

    #[test]
    fn test_growth_at_least_doubles() {
        let reader = FrameReader::new(100);
        let mut buffer = Vec::with_capacity(8);
        buffer.extend_from_slice(b"12345678");
        reader.grow(&mut buffer, 1).unwrap();
        assert!(buffer.capacity() >= 16);
        assert_eq!(buffer, b"12345678");
    }
}
