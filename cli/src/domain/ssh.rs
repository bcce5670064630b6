//! Public key validation for the admin account's `authorized_keys`.

use anyhow::Result;

/// Key types accepted for the admin account's `authorized_keys`.
const ACCEPTED_KEY_TYPES: &[&str] = &[
    "ssh-ed25519",
    "ssh-rsa",
    "ecdsa-sha2-nistp256",
    "ecdsa-sha2-nistp384",
    "ecdsa-sha2-nistp521",
    "sk-ssh-ed25519@openssh.com",
];

/// Validates that `key` is a single OpenSSH public key line with key material.
///
/// Accepts `<type> <base64-material> [comment]`.
///
/// # Errors
///
/// Returns an error if the key type is not recognised, the key spans several
/// lines, or there is no key material after the type.
pub fn validate_public_key(key: &str) -> Result<()> {
    let key = key.trim();
    anyhow::ensure!(!key.contains('\n'), "public key file must contain a single key line");
    let mut parts = key.split_whitespace();
    let key_type = parts.next().unwrap_or_default();
    anyhow::ensure!(
        ACCEPTED_KEY_TYPES.contains(&key_type),
        "unsupported public key type (got: {key_type:?})"
    );
    let material = parts.next().unwrap_or_default();
    anyhow::ensure!(!material.is_empty(), "public key has no key material");
    anyhow::ensure!(
        material
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')),
        "public key material is not base64"
    );
    Ok(())
}
