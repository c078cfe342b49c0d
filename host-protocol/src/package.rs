// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Protected firmware package as produced by `fw-tools protect`.
//!
//! The package header is byte for byte the metadata packet sent after `'M'`, so the
//! update client can replay it without re-encoding:
//!
//! ```text
//! [signature: 64][version: u16 LE][size: u16 LE][message_size: u16 LE][ciphertext...]
//! ```

use crate::{Error, Frames, UpdateMetadata};

#[derive(Debug, Clone)]
pub struct Package<'a> {
    metadata: UpdateMetadata,
    payload: &'a [u8],
}

impl<'a> Package<'a> {
    /// Size of the package header in bytes.
    pub const HEADER_SIZE: usize = UpdateMetadata::SIZE;

    pub fn new(metadata: UpdateMetadata, payload: &'a [u8]) -> Result<Self, Error> {
        if !metadata.accepts_payload_len(payload.len()) {
            return Err(Error::InvalidPayloadLength {
                len: payload.len(),
                size: metadata.size,
                message_size: metadata.message_size,
            });
        }
        Ok(Self { metadata, payload })
    }

    /// Parse a package. The signature is not checked here, only the bootloader
    /// holds the authority to accept an image.
    pub fn parse(data: &'a [u8]) -> Result<Self, Error> {
        if data.len() <= Self::HEADER_SIZE {
            return Err(Error::PackageTooShort { len: data.len() });
        }
        let metadata = UpdateMetadata::deserialize(&data[..Self::HEADER_SIZE])?;
        Self::new(metadata, &data[Self::HEADER_SIZE..])
    }

    pub fn metadata(&self) -> &UpdateMetadata {
        &self.metadata
    }

    /// The encrypted firmware and release message.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    pub fn header(&self) -> [u8; UpdateMetadata::SIZE] {
        self.metadata.serialize()
    }

    pub fn frames(&self, frame_size: usize) -> Result<Frames<'a>, Error> {
        Frames::new(self.payload, frame_size)
    }
}
