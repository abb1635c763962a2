// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! File-backed Ed25519 keystore.
//!
//! Used by the standalone identity keygen tool (and, optionally, by a node
//! operator signing their own descriptor out of band). The discovery core
//! itself never signs anything at runtime — it only carries signatures
//! through and, if a [`crate::core::security::verifier::Verifier`] is
//! attached, checks them with [`verify_pubkey_bytes`].
//!
//! ### Key encryption format
//! If `RENDEZVOUS_KEY_PASSPHRASE` is set, the key file is stored as:
//! `MAGIC(8) || SALT(16) || NONCE(12) || CIPHERTEXT+TAG(..)`
//! where the ciphertext is AES-256-GCM over the Ed25519 PKCS#8 bytes.
//! Without a passphrase the PKCS#8 bytes are written in the clear.

use ring::{
    aead,
    pbkdf2,
    rand::{SecureRandom, SystemRandom},
    signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519},
};
use std::{
    fs,
    io::Write,
    num::NonZeroU32,
    path::{Path, PathBuf},
};
use thiserror::Error;
use zeroize::Zeroize;

use crate::core::types::Signature;

const KEY_FILE_MAGIC: &[u8] = b"RDVKEY01";
const KEY_SALT_LEN: usize = 16;
const KEY_NONCE_LEN: usize = 12;
const PBKDF2_ITERS_DEFAULT: u32 = 100_000;

fn pbkdf2_iters() -> NonZeroU32 {
    let iters = std::env::var("RENDEZVOUS_PBKDF2_ITERS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(PBKDF2_ITERS_DEFAULT)
        .clamp(10_000, 10_000_000);
    NonZeroU32::new(iters).unwrap_or_else(|| NonZeroU32::new(PBKDF2_ITERS_DEFAULT).expect("nonzero"))
}

/// Keystore errors.
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// Filesystem operation failed.
    #[error("io")]
    Io,
    /// Key bytes on disk could not be parsed as an Ed25519 PKCS#8 document.
    #[error("invalid key encoding")]
    InvalidKey,
    /// The key file is encrypted but no passphrase was supplied.
    #[error("missing passphrase (set RENDEZVOUS_KEY_PASSPHRASE)")]
    MissingPassphrase,
    /// AEAD seal/open or key derivation failed.
    #[error("crypto")]
    Crypto,
}

/// Signer backend abstraction (keeps the door open for an HSM-backed implementation).
pub trait SignerBackend: Send + Sync {
    /// Return the raw 32-byte Ed25519 public key.
    fn public_key(&self) -> [u8; 32];
    /// Sign a message, returning the 64-byte detached signature.
    fn sign(&self, msg: &[u8]) -> Result<Signature, KeystoreError>;
}

/// A simple file-backed Ed25519 signer, generated on first use.
pub struct FileEd25519Backend {
    keypair: Ed25519KeyPair,
}

fn set_private_perms_best_effort(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
}

/// Atomic write to disk: write to a sibling temp file, fsync, then rename.
pub(crate) fn atomic_write_private(path: &Path, bytes: &[u8]) -> Result<(), KeystoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|_| KeystoreError::Io)?;
    }
    let mut tmp = path.to_path_buf();
    tmp.set_extension("tmp");
    {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)
            .map_err(|_| KeystoreError::Io)?;
        f.write_all(bytes).map_err(|_| KeystoreError::Io)?;
        let _ = f.sync_all();
    }
    set_private_perms_best_effort(&tmp);
    fs::rename(&tmp, path).map_err(|_| KeystoreError::Io)?;
    set_private_perms_best_effort(path);
    Ok(())
}

fn derive_aes256gcm_key(passphrase: &[u8], salt: &[u8; KEY_SALT_LEN]) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA256, pbkdf2_iters(), salt, passphrase, &mut out);
    out
}

fn encrypt_pkcs8(passphrase: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, KeystoreError> {
    let rng = SystemRandom::new();

    let mut salt = [0u8; KEY_SALT_LEN];
    rng.fill(&mut salt).map_err(|_| KeystoreError::Crypto)?;
    let mut nonce_bytes = [0u8; KEY_NONCE_LEN];
    rng.fill(&mut nonce_bytes).map_err(|_| KeystoreError::Crypto)?;
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut key = derive_aes256gcm_key(passphrase, &salt);
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, &key).map_err(|_| KeystoreError::Crypto)?;
    let less_safe = aead::LessSafeKey::new(unbound);

    let mut in_out = plaintext.to_vec();
    less_safe
        .seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
        .map_err(|_| KeystoreError::Crypto)?;
    key.zeroize();

    let mut out = Vec::with_capacity(KEY_FILE_MAGIC.len() + KEY_SALT_LEN + KEY_NONCE_LEN + in_out.len());
    out.extend_from_slice(KEY_FILE_MAGIC);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&in_out);
    Ok(out)
}

fn decrypt_pkcs8(passphrase: &[u8], bytes: &[u8]) -> Result<Vec<u8>, KeystoreError> {
    let header = KEY_FILE_MAGIC.len() + KEY_SALT_LEN + KEY_NONCE_LEN;
    if bytes.len() < header + 16 {
        return Err(KeystoreError::InvalidKey);
    }
    if &bytes[..KEY_FILE_MAGIC.len()] != KEY_FILE_MAGIC {
        // Not encrypted; caller treats as plaintext PKCS#8.
        return Ok(bytes.to_vec());
    }

    let mut salt = [0u8; KEY_SALT_LEN];
    salt.copy_from_slice(&bytes[KEY_FILE_MAGIC.len()..KEY_FILE_MAGIC.len() + KEY_SALT_LEN]);
    let mut nonce_bytes = [0u8; KEY_NONCE_LEN];
    nonce_bytes.copy_from_slice(&bytes[KEY_FILE_MAGIC.len() + KEY_SALT_LEN..header]);
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut key = derive_aes256gcm_key(passphrase, &salt);
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, &key).map_err(|_| KeystoreError::Crypto)?;
    let less_safe = aead::LessSafeKey::new(unbound);

    let mut in_out = bytes[header..].to_vec();
    let plain = less_safe
        .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
        .map_err(|_| KeystoreError::Crypto)?;
    key.zeroize();
    Ok(plain.to_vec())
}

impl FileEd25519Backend {
    /// Load the key at `path`, or generate and persist a new one if absent.
    ///
    /// If `RENDEZVOUS_KEY_PASSPHRASE` is set, the key is encrypted at rest.
    pub fn load_or_create(path: &Path) -> Result<Self, KeystoreError> {
        let pass = std::env::var("RENDEZVOUS_KEY_PASSPHRASE").ok().filter(|v| !v.trim().is_empty());

        if path.exists() {
            let bytes = fs::read(path).map_err(|_| KeystoreError::Io)?;
            let pkcs8 = if bytes.starts_with(KEY_FILE_MAGIC) {
                let p = pass.as_deref().ok_or(KeystoreError::MissingPassphrase)?;
                decrypt_pkcs8(p.as_bytes(), &bytes)?
            } else {
                bytes
            };
            let keypair = Ed25519KeyPair::from_pkcs8(&pkcs8).map_err(|_| KeystoreError::InvalidKey)?;
            return Ok(Self { keypair });
        }

        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| KeystoreError::InvalidKey)?;

        let mut plain = pkcs8.as_ref().to_vec();
        let on_disk = if let Some(p) = pass.as_deref() {
            let enc = encrypt_pkcs8(p.as_bytes(), &plain)?;
            plain.zeroize();
            enc
        } else {
            plain.clone()
        };
        atomic_write_private(path, &on_disk)?;
        plain.zeroize();

        let keypair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).map_err(|_| KeystoreError::InvalidKey)?;
        Ok(Self { keypair })
    }
}

impl SignerBackend for FileEd25519Backend {
    fn public_key(&self) -> [u8; 32] {
        let pk = self.keypair.public_key().as_ref();
        let mut out = [0u8; 32];
        out.copy_from_slice(pk);
        out
    }

    fn sign(&self, msg: &[u8]) -> Result<Signature, KeystoreError> {
        let sig = self.keypair.sign(msg);
        Ok(Signature(sig.as_ref().to_vec()))
    }
}

/// Verify a 64-byte Ed25519 signature over `msg` against a raw 32-byte public key.
pub fn verify_pubkey_bytes(pk_bytes: &[u8; 32], msg: &[u8], sig: &Signature) -> bool {
    if sig.0.len() != 64 {
        return false;
    }
    UnparsedPublicKey::new(&ED25519, pk_bytes).verify(msg, &sig.0).is_ok()
}
