// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Firmware authenticity: streaming digest and P-256 signature check.

use consts::{DIGEST_SIZE, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
use host_protocol::UpdateMetadata;
use p256::ecdsa::{signature::hazmat::PrehashVerifier, Signature, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::config::KeyMaterial;
use crate::error::CryptoError;

/// Outcome of a signature check.
///
/// The discriminants are far apart in Hamming distance so a single glitched
/// bit cannot turn one into the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum VerificationResult {
    Valid = 0xcafebabe,
    Invalid = 0xdeadbeef,
}

/// Signature check over a precomputed SHA-256 digest.
pub trait SignatureVerifier {
    /// `signature` is raw `r || s`, `public_key` is the uncompressed point `x || y`.
    fn verify_p256(
        &self,
        digest: &[u8; DIGEST_SIZE],
        signature: &[u8; SIGNATURE_SIZE],
        public_key: &[u8; PUBLIC_KEY_SIZE],
    ) -> VerificationResult;
}

/// Software verifier backed by the `p256` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct P256Verifier;

impl SignatureVerifier for P256Verifier {
    fn verify_p256(
        &self,
        digest: &[u8; DIGEST_SIZE],
        signature: &[u8; SIGNATURE_SIZE],
        public_key: &[u8; PUBLIC_KEY_SIZE],
    ) -> VerificationResult {
        let mut sec1 = [0u8; 1 + PUBLIC_KEY_SIZE];
        sec1[0] = 0x04;
        sec1[1..].copy_from_slice(public_key);

        let Ok(key) = VerifyingKey::from_sec1_bytes(&sec1) else {
            warn!("provisioned public key is not a curve point");
            return VerificationResult::Invalid;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            debug!("signature scalars out of range");
            return VerificationResult::Invalid;
        };

        match key.verify_prehash(digest, &signature) {
            Ok(()) => VerificationResult::Valid,
            Err(_) => VerificationResult::Invalid,
        }
    }
}

/// SHA-256 over the signed metadata fields followed by the ciphertext.
pub struct StreamingHasher {
    sha: Sha256,
}

impl StreamingHasher {
    pub fn new(metadata: &UpdateMetadata) -> Self {
        let mut sha = Sha256::new();
        sha.update(metadata.signed_fields());
        Self { sha }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.sha.update(data);
    }

    pub fn finalize(self) -> [u8; DIGEST_SIZE] {
        self.sha.finalize().into()
    }
}

/// Accept the image only if the signature in `metadata` matches `digest` under the
/// provisioned key. The result is checked twice through a control-flow counter.
pub fn verify_update<V: SignatureVerifier>(
    verifier: &V,
    digest: &[u8; DIGEST_SIZE],
    metadata: &UpdateMetadata,
    keys: &KeyMaterial,
) -> Result<(), CryptoError> {
    const CF1: u32 = 3;
    const CF2: u32 = 5;
    let mut control_flow_integrity_counter = 0;

    let result = verifier.verify_p256(digest, &metadata.signature, keys.public_key());
    if result == VerificationResult::Valid {
        control_flow_integrity_counter += CF1;
        if core::hint::black_box(result) == VerificationResult::Valid {
            control_flow_integrity_counter += CF2;
            let counter_ptr = &control_flow_integrity_counter as *const u32;
            // SAFETY: reads a live local through a pointer derived from a reference
            if unsafe { counter_ptr.read_volatile() } == CF1 + CF2 {
                return Ok(());
            }
        }
    }
    Err(CryptoError::SignatureRejected)
}
