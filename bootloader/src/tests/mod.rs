// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later


mod boot;

use crate::config::FlashLayout;
use crate::session::Bootloader;
use sim::{key_material, Channel, RecordingPlatform, SimFlash};

type TestBootloader = Bootloader<Channel, SimFlash, RecordingPlatform>;

fn bootloader(script: Vec<u8>) -> TestBootloader {
    bootloader_with_flash(script, SimFlash::new())
}

fn bootloader_with_flash(script: Vec<u8>, flash: SimFlash) -> TestBootloader {
    Bootloader::new(
        Channel::new(script),
        flash,
        RecordingPlatform::default(),
        key_material(),
        FlashLayout::DEFAULT,
    )
    .unwrap()
}
