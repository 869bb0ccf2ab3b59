/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Streaming frame reconstruction over arbitrary chunk boundaries.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use super::codec::{decode, DecodeError};
use super::{OfMessage, OFP_HEADER_LEN};

/// A complete frame that failed to decode, with its raw bytes.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{error}")]
pub struct FrameError {
    #[source]
    pub error: DecodeError,
    pub raw: Bytes,
}

/// Buffers partial trailing bytes across chunks and yields whole frames.
#[derive(Debug, Default)]
pub struct FrameReconstructor {
    buffer: BytesMut,
}

impl FrameReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pops the next complete frame, if one is buffered.
    ///
    /// A header declaring a length shorter than itself makes every following
    /// byte unframeable; the whole buffer is discarded and reported.
    pub fn next_frame(&mut self) -> Option<Result<OfMessage, FrameError>> {
        if self.buffer.len() < OFP_HEADER_LEN {
            return None;
        }

        let declared = usize::from(u16::from_be_bytes([self.buffer[2], self.buffer[3]]));
        if declared < OFP_HEADER_LEN {
            let raw = self.buffer.split().freeze();
            return Some(Err(FrameError {
                error: DecodeError::InvalidLength(declared),
                raw,
            }));
        }
        if self.buffer.len() < declared {
            return None;
        }

        let raw = self.buffer.split_to(declared).freeze();
        Some(decode(raw.clone()).map_err(|error| FrameError { error, raw }))
    }

    /// Pushes `chunk` and drains every frame it completes, in order.
    pub fn reconstruct(&mut self, chunk: &[u8]) -> Vec<Result<OfMessage, FrameError>> {
        self.push(chunk);
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drops any partial frame.
    pub fn release(&mut self) {
        self.buffer = BytesMut::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{encode, MessageType, OfBody, OFP_VERSION};

    fn echo(xid: u32, payload: &'static [u8]) -> OfMessage {
        OfMessage::new(
            OFP_VERSION,
            xid,
            OfBody::EchoRequest(Bytes::from_static(payload)),
        )
    }

    #[test]
    fn frames_split_across_chunks_are_joined() {
        let first = encode(&echo(1, b"abc")).expect("encodes");
        let second = encode(&echo(2, b"")).expect("encodes");
        let mut stream = first.to_vec();
        stream.extend_from_slice(&second);

        let mut frames = FrameReconstructor::new();
        assert!(frames.reconstruct(&stream[..5]).is_empty());
        let decoded = frames.reconstruct(&stream[5..14]);
        assert_eq!(decoded, vec![Ok(echo(1, b"abc"))]);
        assert_eq!(frames.buffered_len(), 3);

        let decoded = frames.reconstruct(&stream[14..]);
        assert_eq!(decoded, vec![Ok(echo(2, b""))]);
        assert_eq!(frames.buffered_len(), 0);
    }

    #[test]
    fn undecodable_frame_reports_raw_bytes_and_keeps_going() {
        let bad = [OFP_VERSION, 0x63, 0, 8, 0, 0, 0, 9];
        let good = encode(&echo(3, b"x")).expect("encodes");
        let mut stream = bad.to_vec();
        stream.extend_from_slice(&good);

        let decoded = FrameReconstructor::new().reconstruct(&stream);
        assert_eq!(decoded.len(), 2);
        let failure = decoded[0].as_ref().expect_err("unknown type fails");
        assert_eq!(failure.error, DecodeError::UnknownType(0x63));
        assert_eq!(&failure.raw[..], &bad[..]);
        assert_eq!(
            decoded[1].as_ref().map(OfMessage::message_type),
            Ok(MessageType::EchoRequest)
        );
    }

    #[test]
    fn impossible_header_length_discards_buffer() {
        let mut frames = FrameReconstructor::new();
        let decoded = frames.reconstruct(&[OFP_VERSION, 0, 0, 4, 0, 0, 0, 1, 0xaa, 0xbb]);
        assert_eq!(decoded.len(), 1);
        assert!(matches!(
            decoded[0],
            Err(FrameError {
                error: DecodeError::InvalidLength(4),
                ..
            })
        ));
        assert_eq!(frames.buffered_len(), 0);
    }
}
