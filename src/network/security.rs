//! TLS/DTLS socket security and credential provisioning.
//!
//! The modem performs the TLS and DTLS handshakes itself. Sockets refer to
//! credentials by *security tag*: an integer handle selecting a credential set
//! (CA chain, client certificate, pre-shared key and identity) stored in the
//! modem's secure storage. Credentials are written once, usually before the
//! modem goes online, through a [`CredentialStore`].

use base64ct::{Base64, Encoding};

/// A handle identifying a stored credential set in modem secure storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(transparent)]
pub struct SecTag(pub u32);

/// Whether the peer certificate must be verified during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub enum PeerVerify {
    /// No verification. Leaves the link open to man-in-the-middle attacks.
    None = 0,
    /// Verify, but continue the handshake if verification fails.
    Optional = 1,
    /// Abort the handshake unless the peer is verified.
    Required = 2,
}

/// TLS session resumption cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCache {
    /// Cache sessions so reconnects skip the full handshake.
    Enabled,
    /// Always perform a full handshake.
    Disabled,
}

/// Options applied to a socket before it is connected to make it a TLS or
/// DTLS 1.2 socket.
#[derive(Debug, Clone, Copy)]
pub struct SecureSocketOptions<'a> {
    /// Peer verification level.
    pub peer_verify: PeerVerify,
    /// Hostname checked against the server certificate (and sent as SNI).
    pub hostname: Option<&'a str>,
    /// Security tags whose credentials the handshake may use.
    pub sec_tags: &'a [SecTag],
    /// Session resumption.
    pub session_cache: SessionCache,
}

impl<'a> SecureSocketOptions<'a> {
    /// Options the sample applications use: verification required, hostname set,
    /// one security tag, no session cache.
    pub fn required(hostname: &'a str, sec_tags: &'a [SecTag]) -> Self {
        Self {
            peer_verify: PeerVerify::Required,
            hostname: Some(hostname),
            sec_tags,
            session_cache: SessionCache::Disabled,
        }
    }
}

/// The kind of credential stored under a security tag.
///
/// Discriminants follow the modem's key management numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialType {
    /// Root CA certificate chain, PEM.
    CaChain = 0,
    /// Client public certificate, PEM.
    PublicCert = 1,
    /// Client private key, PEM.
    PrivateCert = 2,
    /// Pre-shared key, hex encoded.
    Psk = 3,
    /// PSK identity.
    Identity = 4,
}

/// Errors raised while provisioning credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The credential store rejected the operation.
    Store,
    /// The certificate is not a well-formed PEM `CERTIFICATE` block.
    InvalidPem,
    /// The pre-shared key is empty or not hexadecimal.
    InvalidPsk,
    /// The PSK identity is empty.
    InvalidIdentity,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Store => f.write_str("credential store error"),
            Error::InvalidPem => f.write_str("invalid PEM certificate"),
            Error::InvalidPsk => f.write_str("invalid pre-shared key"),
            Error::InvalidIdentity => f.write_str("invalid PSK identity"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Store => defmt::write!(f, "Store"),
            Error::InvalidPem => defmt::write!(f, "InvalidPem"),
            Error::InvalidPsk => defmt::write!(f, "InvalidPsk"),
            Error::InvalidIdentity => defmt::write!(f, "InvalidIdentity"),
        }
    }
}

/// Access to the modem's secure credential storage.
pub trait CredentialStore {
    /// Whether a credential of `kind` exists under `tag`.
    fn exists(&mut self, tag: SecTag, kind: CredentialType) -> Result<bool, Error>;
    /// Whether the stored credential equals `data`.
    fn matches(&mut self, tag: SecTag, kind: CredentialType, data: &[u8]) -> Result<bool, Error>;
    /// Write (or overwrite) a credential.
    fn write(&mut self, tag: SecTag, kind: CredentialType, data: &[u8]) -> Result<(), Error>;
    /// Delete a credential.
    fn delete(&mut self, tag: SecTag, kind: CredentialType) -> Result<(), Error>;
}

/// Outcome of a provisioning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// An identical credential was already stored; nothing was written.
    AlreadyPresent,
    /// The credential was written.
    Written,
}

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";
const PEM_LINE_WIDTH: usize = 64;

/// Check that `pem` holds one or more well-formed `CERTIFICATE` blocks.
///
/// Every body line must be valid base64 of at most 64 characters. Returns the
/// total number of DER bytes across all blocks.
pub fn validate_pem(pem: &str) -> Result<usize, Error> {
    let mut in_block = false;
    let mut blocks = 0usize;
    let mut der_len = 0usize;
    let mut scratch = [0u8; PEM_LINE_WIDTH / 4 * 3];

    for line in pem.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match (in_block, line) {
            (false, PEM_BEGIN) => in_block = true,
            (true, PEM_END) => {
                in_block = false;
                blocks += 1;
            }
            (true, body) => {
                if body.len() > PEM_LINE_WIDTH {
                    return Err(Error::InvalidPem);
                }
                let decoded =
                    Base64::decode(body, &mut scratch).map_err(|_| Error::InvalidPem)?;
                der_len += decoded.len();
            }
            (false, _) => return Err(Error::InvalidPem),
        }
    }

    if in_block || blocks == 0 {
        return Err(Error::InvalidPem);
    }
    Ok(der_len)
}

/// Store a root CA certificate under `tag` unless an identical one is already
/// present.
pub fn provision_ca_certificate<S: CredentialStore>(
    store: &mut S,
    tag: SecTag,
    pem: &str,
) -> Result<Provisioned, Error> {
    validate_pem(pem)?;

    let exists = store.exists(tag, CredentialType::CaChain).inspect_err(|e| {
        log::error!("Failed to check for certificates err {}", e);
    })?;

    if exists {
        let matches = store.matches(tag, CredentialType::CaChain, pem.as_bytes())?;
        log::info!("{}", if matches { "match" } else { "mismatch" });
        if matches {
            return Ok(Provisioned::AlreadyPresent);
        }
    }

    log::info!("Provisioning certificates");
    store
        .write(tag, CredentialType::CaChain, pem.as_bytes())
        .inspect_err(|e| log::error!("Failed to provision CA certificate: {}", e))?;
    Ok(Provisioned::Written)
}

/// Store a PSK identity and hex-encoded pre-shared key under `tag`.
///
/// Both are written unconditionally, identity first.
pub fn provision_psk<S: CredentialStore>(
    store: &mut S,
    tag: SecTag,
    identity: &str,
    psk_hex: &str,
) -> Result<(), Error> {
    if identity.is_empty() {
        return Err(Error::InvalidIdentity);
    }
    if psk_hex.is_empty() || !psk_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidPsk);
    }

    store
        .write(tag, CredentialType::Identity, identity.as_bytes())
        .inspect_err(|e| log::error!("Failed to write identity: {}", e))?;
    store
        .write(tag, CredentialType::Psk, psk_hex.as_bytes())
        .inspect_err(|e| log::error!("Failed to write PSK: {}", e))?;
    Ok(())
}
