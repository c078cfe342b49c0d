// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Host side of the update session.
//!
//! Every byte group the bootloader consumes is answered with a single status
//! byte, so the client writes one step and waits for its `'O'` before sending
//! the next. The first `'E'` ends the session.

use {
    host_protocol::{package::Package, Command, FrameHeader, Status},
    std::io::{Read, Write},
    tracing::{debug, info},
};

/// One acknowledged step of the update session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Start,
    MetaMarker,
    Signature,
    Version,
    Size,
    MessageSize,
    ChunkMarker,
    Frame(usize),
    EndOfStream,
    Install,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Start => write!(f, "update command"),
            Step::MetaMarker => write!(f, "metadata marker"),
            Step::Signature => write!(f, "signature"),
            Step::Version => write!(f, "firmware version"),
            Step::Size => write!(f, "firmware size"),
            Step::MessageSize => write!(f, "release message size"),
            Step::ChunkMarker => write!(f, "chunk marker"),
            Step::Frame(index) => write!(f, "frame {index}"),
            Step::EndOfStream => write!(f, "end of stream"),
            Step::Install => write!(f, "install"),
        }
    }
}

pub struct Client<P> {
    port: P,
}

impl<P: Read + Write> Client<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }

    pub fn into_inner(self) -> P {
        self.port
    }

    /// Run a full update session, returning once the bootloader has
    /// committed the image.
    pub fn update(&mut self, package: &Package<'_>, frame_size: usize) -> Result<(), Error> {
        let metadata = package.metadata();
        let frames = package.frames(frame_size)?;

        self.step(Step::Start, &[Command::Update.to_byte()])?;
        self.step(Step::MetaMarker, &[Command::Meta.to_byte()])?;
        self.step(Step::Signature, &metadata.signature)?;
        self.step(Step::Version, &metadata.version.to_le_bytes())?;
        self.step(Step::Size, &metadata.size.to_le_bytes())?;
        self.step(Step::MessageSize, &metadata.message_size.to_le_bytes())?;
        self.step(Step::ChunkMarker, &[Command::Chunk.to_byte()])?;

        let count = frames.clone().count();
        for (index, (header, frame)) in frames.enumerate() {
            debug!(index, count, len = header.len(), "sending frame");
            self.port.write_all(&header.to_bytes())?;
            self.step(Step::Frame(index), frame)?;
        }
        self.step(Step::EndOfStream, &FrameHeader::END.to_bytes())?;

        info!("verifying and installing");
        self.expect_ok(Step::Install)?;
        info!(version = metadata.version, "update installed");
        Ok(())
    }

    /// Ask the bootloader to start the installed firmware. Nothing is
    /// acknowledged, the device prints the release message and jumps.
    pub fn boot(&mut self) -> Result<(), Error> {
        self.port.write_all(&[Command::Boot.to_byte()])?;
        self.port.flush()?;
        Ok(())
    }

    fn step(&mut self, step: Step, data: &[u8]) -> Result<(), Error> {
        self.port.write_all(data)?;
        self.port.flush()?;
        self.expect_ok(step)
    }

    fn expect_ok(&mut self, step: Step) -> Result<(), Error> {
        let mut reply = [0u8; 1];
        self.port.read_exact(&mut reply)?;
        match Status::from_byte(reply[0]) {
            Some(Status::Ok) => Ok(()),
            Some(Status::Error) => Err(Error::Rejected(step)),
            None => Err(Error::UnexpectedReply {
                step,
                byte: reply[0],
            }),
        }
    }
}

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Protocol(host_protocol::Error),
    Rejected(Step),
    UnexpectedReply { step: Step, byte: u8 },
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<host_protocol::Error> for Error {
    fn from(e: host_protocol::Error) -> Self {
        Error::Protocol(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "serial port error: {e}"),
            Error::Protocol(e) => write!(f, "{e}"),
            Error::Rejected(step) => write!(f, "bootloader rejected the {step}"),
            Error::UnexpectedReply { step, byte } => {
                write!(f, "unexpected reply 0x{byte:02x} to the {step}")
            }
        }
    }
}

impl std::error::Error for Error {}
