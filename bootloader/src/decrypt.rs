// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use aes::{Aes256, Block};
use cbc::cipher::{BlockDecryptMut, InnerIvInit, KeyInit};
use consts::AES_BLOCK_SIZE;

use crate::config::KeyMaterial;
use crate::error::CryptoError;

/// AES-256-CBC decryption of one flash page at a time.
///
/// Every page restarts the chain from the provisioned IV, the layout the packaging
/// tool produces. Identical plaintext pages therefore encrypt identically.
pub struct PageDecryptor {
    cipher: Aes256,
    iv: [u8; AES_BLOCK_SIZE],
}

impl PageDecryptor {
    pub fn new(keys: &KeyMaterial) -> Self {
        Self {
            cipher: Aes256::new(keys.aes_key().into()),
            iv: *keys.iv(),
        }
    }

    /// Decrypt `page` in place. The length must be a whole number of blocks.
    pub fn decrypt_page(&self, page: &mut [u8]) -> Result<(), CryptoError> {
        if page.len() % AES_BLOCK_SIZE != 0 {
            return Err(CryptoError::UnalignedCiphertext { len: page.len() });
        }

        let mut chain =
            cbc::Decryptor::<Aes256>::inner_iv_init(self.cipher.clone(), &self.iv.into());
        for block in page.chunks_exact_mut(AES_BLOCK_SIZE) {
            chain.decrypt_block_mut(Block::from_mut_slice(block));
        }
        Ok(())
    }
}
