// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Update and boot sessions driven over the host channel.

use consts::{SIGNATURE_SIZE, STAGING_SIZE};
use embedded_io::{Read, Write};
use embedded_storage::nor_flash::NorFlash;
use heapless::Vec;
use host_protocol::{Command, FrameHeader, Status, UpdateMetadata};

use crate::boot::boot;
use crate::config::{FlashLayout, KeyMaterial};
use crate::decrypt::PageDecryptor;
use crate::error::{Error, ProtocolError};
use crate::flash::FlashProgrammer;
use crate::install::install_image;
use crate::metadata::PersistentMetadata;
use crate::platform::Platform;
use crate::provision::provision_initial_image;
use crate::validate::validate;
use crate::verify::{verify_update, P256Verifier, SignatureVerifier, StreamingHasher};

/// Position in the session dialogue.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Idle,
    AwaitMeta,
    MetaReceived,
    AwaitChunkHeader,
    ReceivingFrames,
    EndOfStream,
    Verifying,
    Accepted,
    Rejected,
}

/// How a successful session ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// A new image was verified and committed, with the record now in flash
    Installed(PersistentMetadata),
    /// Control was handed to the firmware (only observable with test platforms)
    Booted,
}

/// The bootloader: owns the host channel, the flash and the staging buffer.
pub struct Bootloader<T, F, P, V = P256Verifier> {
    transport: T,
    programmer: FlashProgrammer<F>,
    platform: P,
    verifier: V,
    keys: KeyMaterial,
    layout: FlashLayout,
    staging: Vec<u8, STAGING_SIZE>,
    state: State,
}

impl<T, F, P> Bootloader<T, F, P>
where
    T: Read + Write,
    F: NorFlash,
    P: Platform,
{
    pub fn new(
        transport: T,
        flash: F,
        platform: P,
        keys: KeyMaterial,
        layout: FlashLayout,
    ) -> Result<Self, Error> {
        Self::with_verifier(transport, flash, platform, P256Verifier, keys, layout)
    }
}

impl<T, F, P, V> Bootloader<T, F, P, V>
where
    T: Read + Write,
    F: NorFlash,
    P: Platform,
    V: SignatureVerifier,
{
    pub fn with_verifier(
        transport: T,
        flash: F,
        platform: P,
        verifier: V,
        keys: KeyMaterial,
        layout: FlashLayout,
    ) -> Result<Self, Error> {
        Ok(Self {
            transport,
            programmer: FlashProgrammer::new(flash)?,
            platform,
            verifier,
            keys,
            layout,
            staging: Vec::new(),
            state: State::Idle,
        })
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The record of the installed image, `None` before provisioning.
    pub fn installed(&mut self) -> Result<Option<PersistentMetadata>, Error> {
        Ok(PersistentMetadata::load(
            &mut self.programmer,
            self.layout.metadata_base,
        )?)
    }

    /// Install the factory image if flash holds no record yet.
    pub fn provision(&mut self, image: &[u8], message: &[u8]) -> Result<bool, Error> {
        provision_initial_image(&mut self.programmer, &self.layout, image, message)
    }

    pub fn into_parts(self) -> (T, F, P) {
        (self.transport, self.programmer.into_inner(), self.platform)
    }

    /// Serve sessions until the host channel fails.
    ///
    /// A failed session is reported to [`Platform::fail_fast`], after which the
    /// loop waits for the next command from a clean `Idle` state.
    pub fn run(&mut self) -> Error {
        loop {
            match self.run_session() {
                Ok(Outcome::Installed(record)) => {
                    info!("installed version {} ({} bytes)", record.version, record.size)
                }
                Ok(Outcome::Booted) => {}
                Err(Error::Transport) => return Error::Transport,
                Err(e) => self.platform.fail_fast(e.kind()),
            }
        }
    }

    /// Wait for a command byte and run the session it selects.
    ///
    /// Bytes other than `'U'` and `'B'` are discarded while idle. On failure a
    /// single `'E'` is sent, unless the channel itself failed.
    pub fn run_session(&mut self) -> Result<Outcome, Error> {
        self.enter(State::Idle);
        let result = loop {
            let mut byte = [0u8; 1];
            recv(&mut self.transport, &mut byte)?;
            match Command::from_byte(byte[0]) {
                Some(Command::Update) => break self.update().map(Outcome::Installed),
                Some(Command::Boot) => {
                    break boot(&mut self.programmer, &mut self.platform, &self.layout)
                        .map(|()| Outcome::Booted)
                }
                _ => trace!("ignoring byte {} while idle", byte[0]),
            }
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err(Error::Transport) => {
                self.enter(State::Rejected);
                Err(Error::Transport)
            }
            Err(e) => {
                self.enter(State::Rejected);
                error!("session aborted: {:?}", e);
                send(&mut self.transport, Status::Error)?;
                Err(e)
            }
        }
    }

    fn update(&mut self) -> Result<PersistentMetadata, Error> {
        info!("update requested");
        self.ack()?;

        self.enter(State::AwaitMeta);
        self.expect(Command::Meta)?;
        self.ack()?;
        let metadata = self.receive_metadata()?;
        self.enter(State::MetaReceived);

        let installed =
            PersistentMetadata::load(&mut self.programmer, self.layout.metadata_base)?;
        let installed_version = installed.map_or(0, |record| record.version);
        validate(&metadata, installed_version)?;

        self.enter(State::AwaitChunkHeader);
        self.expect(Command::Chunk)?;
        self.ack()?;

        self.enter(State::ReceivingFrames);
        let digest = self.receive_frames(&metadata)?;

        let len = self.staging.len();
        if !metadata.accepts_payload_len(len) {
            return Err(payload_length(len, &metadata).into());
        }

        self.enter(State::Verifying);
        verify_update(&self.verifier, &digest, &metadata, &self.keys)?;
        info!("signature verified, writing {} bytes", len);

        let decryptor = PageDecryptor::new(&self.keys);
        install_image(
            &mut self.programmer,
            &decryptor,
            &mut self.staging,
            self.layout.firmware_base,
        )?;

        // Debug images leave the anti-rollback floor where it was.
        let record = PersistentMetadata {
            version: if metadata.is_debug() {
                installed_version
            } else {
                metadata.version
            },
            size: metadata.size,
        };
        record.store(&mut self.programmer, self.layout.metadata_base)?;

        self.enter(State::Accepted);
        self.ack()?;
        Ok(record)
    }

    fn receive_metadata(&mut self) -> Result<UpdateMetadata, Error> {
        let mut signature = [0u8; SIGNATURE_SIZE];
        recv(&mut self.transport, &mut signature)?;
        self.ack()?;
        let version = self.receive_u16()?;
        let size = self.receive_u16()?;
        let message_size = self.receive_u16()?;

        debug!(
            "metadata: version {}, size {}, message size {}",
            version, size, message_size
        );
        Ok(UpdateMetadata {
            signature,
            version,
            size,
            message_size,
        })
    }

    fn receive_u16(&mut self) -> Result<u16, Error> {
        let mut bytes = [0u8; 2];
        recv(&mut self.transport, &mut bytes)?;
        self.ack()?;
        Ok(u16::from_le_bytes(bytes))
    }

    /// Stage frames until the terminator, hashing them as they arrive.
    fn receive_frames(&mut self, metadata: &UpdateMetadata) -> Result<[u8; 32], Error> {
        let mut hasher = StreamingHasher::new(metadata);
        let limit = metadata.max_payload_len();
        self.staging.clear();

        loop {
            let mut raw = [0u8; FrameHeader::SIZE];
            recv(&mut self.transport, &mut raw)?;
            let header = FrameHeader::from_bytes(raw).map_err(|_| ProtocolError::FrameTooLong {
                len: u16::from_le_bytes(raw) as usize,
            })?;

            if header.is_end() {
                self.enter(State::EndOfStream);
                self.ack()?;
                return Ok(hasher.finalize());
            }

            let start = self.staging.len();
            let end = start + header.len();
            if end > limit {
                return Err(payload_length(end, metadata).into());
            }
            self.staging
                .resize(end, 0)
                .map_err(|()| payload_length(end, metadata))?;

            let frame = &mut self.staging[start..end];
            recv(&mut self.transport, frame)?;
            hasher.update(frame);
            trace!("frame of {} bytes, {} staged", header.len(), end);
            self.ack()?;
        }
    }

    fn expect(&mut self, command: Command) -> Result<(), Error> {
        let mut byte = [0u8; 1];
        recv(&mut self.transport, &mut byte)?;
        if byte[0] != command.to_byte() {
            return Err(ProtocolError::UnexpectedPacket {
                expected: command.to_byte(),
                found: byte[0],
            }
            .into());
        }
        Ok(())
    }

    fn ack(&mut self) -> Result<(), Error> {
        send(&mut self.transport, Status::Ok)
    }

    fn enter(&mut self, state: State) {
        if self.state != state {
            trace!("{:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}

fn payload_length(len: usize, metadata: &UpdateMetadata) -> ProtocolError {
    ProtocolError::PayloadLength {
        len,
        size: metadata.size,
        message_size: metadata.message_size,
    }
}

fn recv<T: Read>(transport: &mut T, buf: &mut [u8]) -> Result<(), Error> {
    transport.read_exact(buf).map_err(|_| {
        debug!("host channel closed");
        Error::Transport
    })
}

fn send<T: Write>(transport: &mut T, status: Status) -> Result<(), Error> {
    transport
        .write_all(&[status.to_byte()])
        .and_then(|()| transport.flush())
        .map_err(|_| Error::Transport)
}
