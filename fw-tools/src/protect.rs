// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Build update packages: encrypt per flash page, sign the digest with P-256.

use {
    aes::{Aes256, Block},
    cbc::cipher::{BlockEncryptMut, InnerIvInit, KeyInit},
    consts::{
        AES_BLOCK_SIZE, AES_KEY_SIZE, FLASH_PAGE_SIZE, MAX_FIRMWARE_SIZE, MAX_MESSAGE_SIZE,
        PUBLIC_KEY_SIZE, SIGNATURE_SIZE,
    },
    host_protocol::{package::Package, round_up, UpdateMetadata},
    p256::{
        ecdsa::{
            signature::hazmat::{PrehashSigner, PrehashVerifier},
            Signature, SigningKey, VerifyingKey,
        },
        elliptic_curve::sec1::ToEncodedPoint,
    },
    sha2::{Digest, Sha256},
    zeroize::Zeroizing,
};

/// Symmetric key material shared with the bootloader.
#[derive(Debug, Clone)]
pub struct CipherKey {
    pub aes_key: Zeroizing<[u8; AES_KEY_SIZE]>,
    pub iv: [u8; AES_BLOCK_SIZE],
}

/// Produce `[metadata][ciphertext]` for `firmware` and its release message.
pub fn protect(
    firmware: &[u8],
    message: &str,
    version: u16,
    cipher: &CipherKey,
    secret: &p256::SecretKey,
) -> Result<Vec<u8>, Error> {
    if firmware.is_empty() {
        return Err(Error::EmptyFirmware);
    }
    if firmware.len() > MAX_FIRMWARE_SIZE {
        return Err(Error::FirmwareTooLarge(firmware.len()));
    }
    if message.as_bytes().contains(&0) {
        return Err(Error::MessageContainsNul);
    }
    let message_size = message.len() + 1;
    if message_size > MAX_MESSAGE_SIZE {
        return Err(Error::MessageTooLarge(message_size));
    }

    let mut payload = Vec::with_capacity(round_up(firmware.len() + message_size, AES_BLOCK_SIZE));
    payload.extend_from_slice(firmware);
    payload.extend_from_slice(message.as_bytes());
    payload.push(0);
    payload.resize(round_up(payload.len(), AES_BLOCK_SIZE), 0);
    encrypt_pages(&mut payload, cipher);

    let mut metadata = UpdateMetadata {
        signature: [0; SIGNATURE_SIZE],
        version,
        size: firmware.len() as u16,
        message_size: message_size as u16,
    };
    let signer = SigningKey::from(secret);
    let signature: Signature = signer
        .sign_prehash(&digest(&metadata, &payload))
        .map_err(|_| Error::Sign)?;
    metadata.signature.copy_from_slice(&signature.to_bytes());

    tracing::debug!(
        version,
        size = metadata.size,
        message_size = metadata.message_size,
        ciphertext = payload.len(),
        "protected firmware"
    );

    let mut package = metadata.serialize().to_vec();
    package.extend_from_slice(&payload);
    Ok(package)
}

/// AES-256-CBC over each flash page, every page chained from the same IV.
pub fn encrypt_pages(data: &mut [u8], cipher: &CipherKey) {
    let aes = Aes256::new((&*cipher.aes_key).into());
    for page in data.chunks_mut(FLASH_PAGE_SIZE) {
        let mut chain = cbc::Encryptor::<Aes256>::inner_iv_init(aes.clone(), &cipher.iv.into());
        for block in page.chunks_exact_mut(AES_BLOCK_SIZE) {
            chain.encrypt_block_mut(Block::from_mut_slice(block));
        }
    }
}

/// SHA-256 over the signed metadata fields and the ciphertext.
pub fn digest(metadata: &UpdateMetadata, ciphertext: &[u8]) -> [u8; 32] {
    let mut sha = Sha256::new();
    sha.update(metadata.signed_fields());
    sha.update(ciphertext);
    sha.finalize().into()
}

/// Check a package signature before it leaves the host.
pub fn verify_package(package: &Package, pubkey: &[u8; PUBLIC_KEY_SIZE]) -> Result<(), Error> {
    let mut sec1 = [0u8; 1 + PUBLIC_KEY_SIZE];
    sec1[0] = 0x04;
    sec1[1..].copy_from_slice(pubkey);
    let key = VerifyingKey::from_sec1_bytes(&sec1).map_err(|_| Error::InvalidPubkey)?;
    let signature =
        Signature::from_slice(&package.metadata().signature).map_err(|_| Error::BadSignature)?;
    key.verify_prehash(&digest(package.metadata(), package.payload()), &signature)
        .map_err(|_| Error::BadSignature)
}

/// Uncompressed `x || y` public key, the form provisioned into the bootloader.
pub fn public_key_bytes(secret: &p256::SecretKey) -> [u8; PUBLIC_KEY_SIZE] {
    let point = secret.public_key().to_encoded_point(false);
    let mut out = [0u8; PUBLIC_KEY_SIZE];
    out.copy_from_slice(&point.as_bytes()[1..]);
    out
}

#[derive(Debug)]
pub enum Error {
    BadSignature,
    EmptyFirmware,
    FirmwareTooLarge(usize),
    InvalidPubkey,
    MessageContainsNul,
    MessageTooLarge(usize),
    Sign,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::BadSignature => write!(f, "package signature does not match the public key"),
            Error::EmptyFirmware => write!(f, "firmware file is empty"),
            Error::FirmwareTooLarge(size) => write!(
                f,
                "firmware is {size} bytes, the bootloader accepts at most {MAX_FIRMWARE_SIZE}"
            ),
            Error::InvalidPubkey => write!(f, "public key is not a P-256 point"),
            Error::MessageContainsNul => write!(f, "release message must not contain NUL"),
            Error::MessageTooLarge(size) => write!(
                f,
                "release message is {size} bytes with its terminator, at most \
                 {MAX_MESSAGE_SIZE} fit"
            ),
            Error::Sign => write!(f, "failed to sign firmware digest"),
        }
    }
}

impl std::error::Error for Error {}
