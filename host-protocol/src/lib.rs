// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Host to bootloader firmware update protocol.
//! The host drives a strictly linear dialogue over a point-to-point byte channel and
//! the bootloader acknowledges every structural unit with a single status byte.
//!
//! ```text
//! host                          bootloader
//!  'U'                     ->
//!                          <-   'O'
//!  'M'                     ->
//!                          <-   'O'
//!  signature (64 bytes)    ->
//!                          <-   'O'
//!  version (u16 LE)        ->
//!                          <-   'O'
//!  size (u16 LE)           ->
//!                          <-   'O'
//!  message_size (u16 LE)   ->
//!                          <-   'O'
//!  'C'                     ->
//!                          <-   'O'
//!  [len u16 LE][len bytes] ->   (repeated, 1..=256 bytes each)
//!                          <-   'O'
//!  [0x00 0x00]             ->
//!                          <-   'O'
//!                          <-   'O' once verified and committed to flash
//! ```
//!
//! Any failure is answered with `'E'` (or silence) and the whole session must be
//! restarted from `'U'`.

#![no_std]

pub mod package;

use consts::{AES_BLOCK_SIZE, MAX_FRAME_SIZE, SIGNATURE_SIZE};

/// Request bytes sent by the host.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    /// Start a firmware update session
    Update = b'U',
    /// Boot the installed firmware
    Boot = b'B',
    /// Metadata packet marker
    Meta = b'M',
    /// Firmware frame stream marker
    Chunk = b'C',
}

impl Command {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'U' => Some(Self::Update),
            b'B' => Some(Self::Boot),
            b'M' => Some(Self::Meta),
            b'C' => Some(Self::Chunk),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Status bytes sent by the bootloader.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Status {
    /// The previous unit was accepted, the host may proceed
    Ok = b'O',
    /// The session was aborted
    Error = b'E',
}

impl Status {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'O' => Some(Self::Ok),
            b'E' => Some(Self::Error),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Metadata announced by the host ahead of the firmware frames.
///
/// Only `version`, `size` and `message_size` are covered by the signature, in that
/// order and little-endian, followed by the ciphertext.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UpdateMetadata {
    pub signature: [u8; SIGNATURE_SIZE],
    pub version: u16,
    pub size: u16,
    pub message_size: u16,
}

impl UpdateMetadata {
    /// Size of the metadata on the wire.
    pub const SIZE: usize = SIGNATURE_SIZE + Self::SIGNED_FIELDS_SIZE;

    /// Size of the signed `{version, size, message_size}` prefix.
    pub const SIGNED_FIELDS_SIZE: usize = 6;

    /// Version 0 marks a debug image, exempt from rollback protection.
    pub fn is_debug(&self) -> bool {
        self.version == 0
    }

    /// The signed metadata fields as they enter the digest.
    pub fn signed_fields(&self) -> [u8; Self::SIGNED_FIELDS_SIZE] {
        let mut buf = [0u8; Self::SIGNED_FIELDS_SIZE];
        buf[0..2].copy_from_slice(&self.version.to_le_bytes());
        buf[2..4].copy_from_slice(&self.size.to_le_bytes());
        buf[4..6].copy_from_slice(&self.message_size.to_le_bytes());
        buf
    }

    /// Largest ciphertext length that can carry this image: firmware and release
    /// message rounded up to a whole number of AES blocks.
    pub fn max_payload_len(&self) -> usize {
        round_up(self.size as usize + self.message_size as usize, AES_BLOCK_SIZE)
    }

    /// Whether a ciphertext of `len` bytes is acceptable for this metadata.
    ///
    /// The ciphertext must hold at least the whole firmware, never more than
    /// firmware plus release message, and be made of whole AES blocks.
    pub fn accepts_payload_len(&self, len: usize) -> bool {
        len != 0
            && len % AES_BLOCK_SIZE == 0
            && len >= self.size as usize
            && len <= self.max_payload_len()
    }

    /// Serialize in wire order: `[signature][version][size][message_size]`.
    pub fn serialize(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[..SIGNATURE_SIZE].copy_from_slice(&self.signature);
        buf[SIGNATURE_SIZE..].copy_from_slice(&self.signed_fields());
        buf
    }

    /// Deserialize from wire order. Trailing bytes are ignored.
    pub fn deserialize(data: &[u8]) -> Result<Self, Error> {
        if data.len() < Self::SIZE {
            return Err(Error::MetadataTooShort { len: data.len() });
        }
        let mut signature = [0u8; SIGNATURE_SIZE];
        signature.copy_from_slice(&data[..SIGNATURE_SIZE]);
        let fields = &data[SIGNATURE_SIZE..Self::SIZE];
        Ok(Self {
            signature,
            version: u16::from_le_bytes([fields[0], fields[1]]),
            size: u16::from_le_bytes([fields[2], fields[3]]),
            message_size: u16::from_le_bytes([fields[4], fields[5]]),
        })
    }
}

/// Length prefix of a firmware frame. A zero length ends the stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameHeader(u16);

impl FrameHeader {
    /// Size of the header on the wire.
    pub const SIZE: usize = 2;

    /// End-of-stream sentinel.
    pub const END: Self = Self(0);

    pub fn new(len: usize) -> Result<Self, Error> {
        if len > MAX_FRAME_SIZE {
            return Err(Error::FrameTooLong { len });
        }
        Ok(Self(len as u16))
    }

    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Result<Self, Error> {
        Self::new(u16::from_le_bytes(bytes) as usize)
    }

    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        self.0.to_le_bytes()
    }

    pub fn len(self) -> usize {
        self.0 as usize
    }

    pub fn is_end(self) -> bool {
        self.0 == 0
    }
}

/// Splits a payload into frames of at most `frame_size` bytes.
///
/// The end-of-stream sentinel is not produced, senders append [`FrameHeader::END`].
#[derive(Clone, Debug)]
pub struct Frames<'a> {
    chunks: core::slice::Chunks<'a, u8>,
}

impl<'a> Frames<'a> {
    pub fn new(payload: &'a [u8], frame_size: usize) -> Result<Self, Error> {
        if frame_size == 0 || frame_size > MAX_FRAME_SIZE {
            return Err(Error::InvalidFrameSize { frame_size });
        }
        Ok(Self {
            chunks: payload.chunks(frame_size),
        })
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = (FrameHeader, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks
            .next()
            .map(|chunk| (FrameHeader(chunk.len() as u16), chunk))
    }
}

/// Round `len` up to the next multiple of `align`.
pub fn round_up(len: usize, align: usize) -> usize {
    len.div_ceil(align) * align
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    FrameTooLong { len: usize },
    InvalidFrameSize { frame_size: usize },
    MetadataTooShort { len: usize },
    PackageTooShort { len: usize },
    InvalidPayloadLength { len: usize, size: u16, message_size: u16 },
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::FrameTooLong { len } => {
                write!(f, "frame of {len} bytes exceeds the {MAX_FRAME_SIZE} byte limit")
            }
            Self::InvalidFrameSize { frame_size } => {
                write!(f, "frame size must be 1..={MAX_FRAME_SIZE}, got {frame_size}")
            }
            Self::MetadataTooShort { len } => write!(
                f,
                "metadata too short: {len} bytes, expected {}",
                UpdateMetadata::SIZE
            ),
            Self::PackageTooShort { len } => write!(f, "package too short: {len} bytes"),
            Self::InvalidPayloadLength {
                len,
                size,
                message_size,
            } => write!(
                f,
                "ciphertext of {len} bytes does not fit firmware size {size} \
                 with release message size {message_size}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::vec::Vec;

    #[test]
    fn metadata_wire_layout() {
        let metadata = UpdateMetadata {
            signature: [0xAB; SIGNATURE_SIZE],
            version: 3,
            size: 1024,
            message_size: 7,
        };
        let wire = metadata.serialize();
        assert_eq!(wire.len(), 70);
        assert!(wire[..64].iter().all(|&b| b == 0xAB));
        assert_eq!(wire[64..], [3, 0, 0, 4, 7, 0]);
        assert_eq!(metadata.signed_fields(), [3, 0, 0, 4, 7, 0]);
        assert_eq!(UpdateMetadata::deserialize(&wire).unwrap(), metadata);
    }

    #[test]
    fn metadata_too_short() {
        assert_eq!(
            UpdateMetadata::deserialize(&[0; 69]),
            Err(Error::MetadataTooShort { len: 69 })
        );
    }

    #[test]
    fn frame_header_limits() {
        assert_eq!(FrameHeader::from_bytes([0, 1]).unwrap().len(), 256);
        assert_eq!(
            FrameHeader::from_bytes([1, 1]),
            Err(Error::FrameTooLong { len: 257 })
        );
        assert!(FrameHeader::from_bytes([0, 0]).unwrap().is_end());
        assert_eq!(FrameHeader::new(0x34).unwrap().to_bytes(), [0x34, 0]);
    }

    #[test]
    fn payload_length_window() {
        let metadata = UpdateMetadata {
            signature: [0; SIGNATURE_SIZE],
            version: 1,
            size: 1000,
            message_size: 30,
        };
        // 1030 rounds up to 1040.
        assert_eq!(metadata.max_payload_len(), 1040);
        assert!(!metadata.accepts_payload_len(992));
        assert!(!metadata.accepts_payload_len(1000));
        assert!(metadata.accepts_payload_len(1008));
        assert!(metadata.accepts_payload_len(1040));
        assert!(!metadata.accepts_payload_len(1056));
    }

    #[test]
    fn frames_cover_payload() {
        let payload = [7u8; 600];
        let lens: Vec<usize> = Frames::new(&payload, 256)
            .unwrap()
            .map(|(header, chunk)| {
                assert_eq!(header.len(), chunk.len());
                header.len()
            })
            .collect();
        assert_eq!(lens, [256, 256, 88]);
        assert!(Frames::new(&payload, 257).is_err());
        assert!(Frames::new(&payload, 0).is_err());
    }
}
