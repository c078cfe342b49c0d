// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use consts::{FIRMWARE_ENTRY_POINT, INITIAL_FIRMWARE_VERSION};

use super::bootloader;
use super::sim::{
    acks, key_material, protect, update_script_chunked, Channel, RecordingPlatform, SimFlash,
    WordReadFlash,
};
use crate::config::FlashLayout;
use crate::error::{Error, ErrorKind, FlashError};
use crate::metadata::PersistentMetadata;
use crate::session::{Bootloader, Outcome};

#[test]
fn boot_emits_message_and_jumps() {
    let mut bootloader = bootloader(vec![b'B']);
    assert_eq!(
        bootloader.provision(&[0x20; 300], b"factory image"),
        Ok(true)
    );
    assert_eq!(bootloader.run_session(), Ok(Outcome::Booted));

    let (channel, _, platform) = bootloader.into_parts();
    assert!(channel.output.is_empty());
    assert_eq!(platform.diagnostics, [b"factory image".to_vec()]);
    assert_eq!(platform.jumps, [FIRMWARE_ENTRY_POINT]);
}

#[test]
fn boot_without_record_fails() {
    let mut bootloader = bootloader(vec![b'B']);
    assert_eq!(
        bootloader.run_session(),
        Err(Error::Flash(FlashError::Unprovisioned))
    );
    let (channel, _, platform) = bootloader.into_parts();
    assert_eq!(channel.output, [b'E']);
    assert!(platform.jumps.is_empty());
}

#[test]
fn update_replaces_provisioned_image() {
    let image = protect(3, &[0x42; 700], b"v3");
    let mut script = update_script_chunked(&image.metadata, &image.ciphertext, 256);
    script.push(b'B');

    let mut bootloader = bootloader(script);
    assert_eq!(bootloader.provision(&[0x20; 300], b"factory"), Ok(true));
    assert_eq!(
        bootloader.installed(),
        Ok(Some(PersistentMetadata {
            version: INITIAL_FIRMWARE_VERSION,
            size: 300
        }))
    );

    assert!(matches!(
        bootloader.run_session(),
        Ok(Outcome::Installed(_))
    ));
    assert_eq!(bootloader.run_session(), Ok(Outcome::Booted));

    let (_, _, platform) = bootloader.into_parts();
    assert_eq!(platform.diagnostics, [b"v3".to_vec()]);
}

#[test]
fn message_after_odd_sized_image_on_word_flash() {
    let image = protect(5, &[0x33; 1001], b"odd tail");
    let mut script = update_script_chunked(&image.metadata, &image.ciphertext, 256);
    script.push(b'B');

    let mut bootloader = Bootloader::new(
        Channel::new(script),
        WordReadFlash(SimFlash::new()),
        RecordingPlatform::default(),
        key_material(),
        FlashLayout::DEFAULT,
    )
    .unwrap();
    assert!(matches!(
        bootloader.run_session(),
        Ok(Outcome::Installed(_))
    ));
    assert_eq!(bootloader.run_session(), Ok(Outcome::Booted));

    let (_, flash, platform) = bootloader.into_parts();
    assert!(platform.failures.is_empty());
    assert_eq!(platform.diagnostics, [b"odd tail".to_vec()]);
    assert_eq!(platform.jumps, [FIRMWARE_ENTRY_POINT]);
    assert_eq!(flash.0.memory[consts::FIRMWARE_BASE as usize + 1000], 0x33);
}

#[test]
fn supervisor_survives_failed_sessions() {
    let good = protect(4, &[0x11; 128], b"good");
    let mut stale = protect(1, &[0x22; 128], b"stale");
    stale.metadata.signature[0] ^= 0xFF;

    let mut script = update_script_chunked(&stale.metadata, &stale.ciphertext, 128);
    script.extend(update_script_chunked(&good.metadata, &good.ciphertext, 128));
    script.push(b'B');

    let mut bootloader = bootloader(script);
    assert_eq!(bootloader.run(), Error::Transport);

    let (channel, flash, platform) = bootloader.into_parts();
    assert_eq!(platform.failures, [ErrorKind::Crypto]);
    assert_eq!(platform.diagnostics, [b"good".to_vec()]);
    assert_eq!(platform.jumps, [FIRMWARE_ENTRY_POINT]);

    // 'U', 'M', four fields, 'C', two frames and the terminator per session.
    let mut expected = acks(10);
    expected.push(b'E');
    expected.extend(acks(11));
    assert_eq!(channel.output, expected);
    assert_eq!(flash.memory[consts::FIRMWARE_BASE as usize], 0x11);
}
