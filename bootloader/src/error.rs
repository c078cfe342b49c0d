// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Session errors. Every error is fatal to the session it occurs in.

/// Coarse error class handed to [`Platform::fail_fast`](crate::Platform::fail_fast).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    Protocol,
    Validation,
    Crypto,
    Flash,
    Transport,
}

/// Malformed or out-of-order input from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// A marker byte other than the one the session is waiting for
    UnexpectedPacket { expected: u8, found: u8 },
    /// A frame header announcing more than 256 bytes
    FrameTooLong { len: usize },
    /// The ciphertext does not fit the announced firmware and message sizes
    PayloadLength { len: usize, size: u16, message_size: u16 },
}

/// Metadata rejected before any firmware byte is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValidationError {
    /// Non-debug version older than the installed one
    Rollback { version: u16, installed: u16 },
    FirmwareTooLarge { size: usize },
    MessageTooLarge { message_size: usize },
    EmptyFirmware,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CryptoError {
    /// The signature does not match the digest under the provisioned key
    SignatureRejected,
    /// Ciphertext chunk not made of whole AES blocks
    UnalignedCiphertext { len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// The storage geometry does not match the page/word layout of the image
    Geometry,
    Misaligned { address: u32 },
    Erase { address: u32 },
    Program { address: u32 },
    Read { address: u32 },
    /// Readback after programming differs from the intended bytes
    VerifyMismatch { address: u32 },
    /// The persistent metadata record has never been written
    Unprovisioned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    Protocol(ProtocolError),
    Validation(ValidationError),
    Crypto(CryptoError),
    Flash(FlashError),
    /// The byte channel failed or was closed
    Transport,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Crypto(_) => ErrorKind::Crypto,
            Error::Flash(_) => ErrorKind::Flash,
            Error::Transport => ErrorKind::Transport,
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<CryptoError> for Error {
    fn from(e: CryptoError) -> Self {
        Error::Crypto(e)
    }
}

impl From<FlashError> for Error {
    fn from(e: FlashError) -> Self {
        Error::Flash(e)
    }
}

impl core::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnexpectedPacket { expected, found } => write!(
                f,
                "expected packet {:?}, got byte {found:#04x}",
                *expected as char
            ),
            Self::FrameTooLong { len } => write!(f, "frame of {len} bytes is too long"),
            Self::PayloadLength {
                len,
                size,
                message_size,
            } => write!(
                f,
                "ciphertext of {len} bytes does not fit firmware size {size} \
                 and message size {message_size}"
            ),
        }
    }
}

impl core::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Rollback { version, installed } => write!(
                f,
                "version {version} is older than installed version {installed}"
            ),
            Self::FirmwareTooLarge { size } => write!(f, "firmware size {size} not supported"),
            Self::MessageTooLarge { message_size } => {
                write!(f, "release message size {message_size} not supported")
            }
            Self::EmptyFirmware => write!(f, "firmware size is zero"),
        }
    }
}

impl core::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::SignatureRejected => write!(f, "firmware signature rejected"),
            Self::UnalignedCiphertext { len } => {
                write!(f, "ciphertext chunk of {len} bytes is not block aligned")
            }
        }
    }
}

impl core::fmt::Display for FlashError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Geometry => write!(f, "flash geometry does not match the image layout"),
            Self::Misaligned { address } => write!(f, "misaligned flash access at {address:#x}"),
            Self::Erase { address } => write!(f, "failed to erase page at {address:#x}"),
            Self::Program { address } => write!(f, "failed to program flash at {address:#x}"),
            Self::Read { address } => write!(f, "failed to read flash at {address:#x}"),
            Self::VerifyMismatch { address } => {
                write!(f, "flash readback mismatch at {address:#x}")
            }
            Self::Unprovisioned => write!(f, "no firmware metadata in flash"),
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Protocol(e) => write!(f, "protocol error: {e}"),
            Error::Validation(e) => write!(f, "validation error: {e}"),
            Error::Crypto(e) => write!(f, "crypto error: {e}"),
            Error::Flash(e) => write!(f, "flash error: {e}"),
            Error::Transport => write!(f, "transport error"),
        }
    }
}
