// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use {
    crate::{
        args::{Config, ConfigError},
        protect::{public_key_bytes, CipherKey},
    },
    consts::{AES_BLOCK_SIZE, AES_KEY_SIZE},
    p256::elliptic_curve::sec1::ToEncodedPoint,
    rand_core::{OsRng, RngCore},
    sec1::der::{asn1::ObjectIdentifier, Encode},
    std::{
        io::Write,
        path::{Path, PathBuf},
    },
    zeroize::Zeroizing,
};

/// Named curve OID of NIST P-256 (prime256v1).
const P256_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");

pub const SECRET_FILE: &str = "secret.pem";
pub const PUBLIC_KEY_FILE: &str = "public_key.bin";
pub const CONFIG_FILE: &str = "fw-tools.toml";

#[derive(Debug)]
pub struct KeySet {
    pub secret: p256::SecretKey,
    pub cipher: CipherKey,
}

impl KeySet {
    pub fn generate() -> Self {
        let mut aes_key = Zeroizing::new([0u8; AES_KEY_SIZE]);
        OsRng.fill_bytes(&mut *aes_key);
        let mut iv = [0u8; AES_BLOCK_SIZE];
        OsRng.fill_bytes(&mut iv);
        Self {
            secret: p256::SecretKey::random(&mut OsRng),
            cipher: CipherKey { aes_key, iv },
        }
    }

    /// Write the secret key, the raw public key and a config referencing both
    /// into `out_dir`. Existing files are never overwritten, and the secret and
    /// the config (which holds the AES key) are readable by the owner only.
    pub fn write(&self, out_dir: &Path) -> Result<Config, Error> {
        std::fs::create_dir_all(out_dir).map_err(Error::CreateDir)?;
        let out_dir = out_dir.canonicalize().map_err(Error::CreateDir)?;

        let secret_path = out_dir.join(SECRET_FILE);
        write_new(&secret_path, self.secret_pem()?.as_bytes())?;
        write_new(
            &out_dir.join(PUBLIC_KEY_FILE),
            &public_key_bytes(&self.secret),
        )?;

        let config = Config {
            secret: Some(secret_path),
            aes_key: Some(hex::encode(*self.cipher.aes_key)),
            iv: Some(hex::encode(self.cipher.iv)),
            pubkey: Some(hex::encode(public_key_bytes(&self.secret))),
            ..Default::default()
        };
        write_new(&out_dir.join(CONFIG_FILE), config.to_toml()?.as_bytes())?;
        tracing::info!(dir = %out_dir.display(), "wrote key material");
        Ok(config)
    }

    /// SEC1 `EC PRIVATE KEY` PEM, readable by OpenSSL.
    fn secret_pem(&self) -> Result<Zeroizing<String>, Error> {
        let private_key = self.secret.to_bytes();
        let public_key = self.secret.public_key().to_encoded_point(false);
        let der = sec1::EcPrivateKey {
            private_key: &private_key,
            parameters: Some(sec1::EcParameters::NamedCurve(P256_OID)),
            public_key: Some(public_key.as_bytes()),
        }
        .to_der()
        .map_err(Error::EncodeDer)?;
        Ok(Zeroizing::new(pem::encode(&pem::Pem::new(
            "EC PRIVATE KEY",
            der,
        ))))
    }
}

fn write_new(path: &Path, contents: &[u8]) -> Result<(), Error> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
        .open(path)
        .and_then(|mut file| file.write_all(contents))
        .map_err(|e| Error::WriteKeyFile(path.to_owned(), e))
}

#[derive(Debug)]
pub enum Error {
    Config(ConfigError),
    CreateDir(std::io::Error),
    EncodeDer(sec1::der::Error),
    WriteKeyFile(PathBuf, std::io::Error),
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "{e}"),
            Error::CreateDir(e) => write!(f, "failed to create output directory: {e}"),
            Error::EncodeDer(e) => write!(f, "failed to encode secret key: {e}"),
            Error::WriteKeyFile(path, e) => {
                write!(f, "failed to write {}: {e}", path.display())
            }
        }
    }
}

impl std::error::Error for Error {}
