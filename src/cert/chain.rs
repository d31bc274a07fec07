//! Chain-of-trust walk from a caller-held anchor key down to a leaf.

use super::definition::{CertRole, CertificateDefinition, PublicKeySource};
use super::reconstruct::read_cert;
use super::verify::{gen_challenge, get_response, get_subject_public_key, verify_cert, verify_response};
use crate::device::Device;
use crate::error::{Error, ErrorKind};
use crate::types::{Digest, PublicKey, Signature};
use core::fmt;
use core::ptr;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

/// Where the bytes of a link's certificate come from.
#[derive(Debug)]
pub enum CertSource<'c> {
    /// Supplied by the caller, typically received from a peer.
    Provided(&'c [u8]),
    /// Rebuilt from the secure element into this scratch buffer.
    Device(&'c mut [u8]),
}

#[derive(Debug)]
pub struct ChainLink<'d, 'c> {
    pub definition: &'d CertificateDefinition<'d>,
    pub source: CertSource<'c>,
}

impl<'d, 'c> ChainLink<'d, 'c> {
    pub fn provided(definition: &'d CertificateDefinition<'d>, cert: &'c [u8]) -> Self {
        Self {
            definition,
            source: CertSource::Provided(cert),
        }
    }

    pub fn device(definition: &'d CertificateDefinition<'d>, scratch: &'c mut [u8]) -> Self {
        Self {
            definition,
            source: CertSource::Device(scratch),
        }
    }
}

/// The first link that did not verify.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChainError {
    /// Index into the links, anchor side first.
    pub link: usize,
    pub role: CertRole,
    pub error: Error,
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link {} ({:?}): {}", self.link, self.role, self.error)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ChainError {}

/// Verify `links`, ordered from the anchor side to the leaf, and return the
/// leaf's subject public key.
///
/// The first certificate is checked against `anchor_key` and its definition
/// must not name an issuer. Each later one is checked against the subject key
/// of the link before it, whose definition must be its `issuer`. The walk
/// stops at the first failure.
pub fn verify_chain<PHY, D>(
    device: &mut Device<PHY, D>,
    anchor_key: &PublicKey,
    links: &mut [ChainLink<'_, '_>],
) -> Result<PublicKey, ChainError>
where
    PHY: I2c,
    D: DelayNs,
{
    if links.is_empty() {
        return Err(ChainError {
            link: 0,
            role: CertRole::Root,
            error: ErrorKind::BadParam.into(),
        });
    }

    let mut issuer_key = *anchor_key;
    let mut previous: Option<&CertificateDefinition<'_>> = None;
    for (index, link) in links.iter_mut().enumerate() {
        let definition = link.definition;
        let failed = |error: Error| {
            warn!("chain link {} ({:?}) failed: {}", index, definition.role, error);
            ChainError {
                link: index,
                role: definition.role,
                error,
            }
        };

        let issued_by_previous = match (previous, definition.issuer) {
            (None, issuer) => issuer.is_none(),
            (Some(previous), Some(issuer)) => ptr::eq(issuer, previous),
            (Some(_), None) => false,
        };
        if !issued_by_previous {
            return Err(failed(ErrorKind::BadParam.into()));
        }

        let cert = match &mut link.source {
            CertSource::Provided(cert) => *cert,
            CertSource::Device(scratch) => {
                read_cert(device, definition, Some(&issuer_key), scratch)
                    .map_err(failed)?
                    .as_bytes()
            }
        };
        verify_cert(device, definition, cert, issuer_key.as_ref()).map_err(failed)?;
        issuer_key = get_subject_public_key(definition, cert).map_err(failed)?;
        info!("chain link {} ({:?}) verified", index, definition.role);

        previous = Some(definition);
    }
    Ok(issuer_key)
}

/// A leaf whose device proved possession of its private key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Authenticated {
    /// Subject key of the leaf certificate.
    pub public_key: PublicKey,
    /// The challenge drawn for this attempt.
    pub challenge: Digest,
    pub response: Signature,
}

/// Verify the chain, then challenge the leaf's private key.
///
/// The leaf definition's storage must name the slot of a generated key. A
/// new challenge is drawn from the device for every call, and the response
/// is checked against the leaf key the chain vouched for.
pub fn authenticate<PHY, D>(
    device: &mut Device<PHY, D>,
    anchor_key: &PublicKey,
    links: &mut [ChainLink<'_, '_>],
) -> Result<Authenticated, ChainError>
where
    PHY: I2c,
    D: DelayNs,
{
    let public_key = verify_chain(device, anchor_key, links)?;

    let link = links.len() - 1;
    let leaf = links[link].definition;
    let failed = |error: Error| {
        warn!("authentication of {:?} failed: {}", leaf.role, error);
        ChainError {
            link,
            role: leaf.role,
            error,
        }
    };

    let slot = match leaf.storage.map(|storage| storage.public_key) {
        Some(PublicKeySource::Generated(slot)) => slot,
        _ => return Err(failed(ErrorKind::BadParam.into())),
    };
    let challenge = gen_challenge(device).map_err(failed)?;
    let response = get_response(device, slot, &challenge).map_err(failed)?;
    verify_response(
        device,
        public_key.as_ref(),
        challenge.as_ref(),
        response.as_ref(),
    )
    .map_err(failed)?;
    info!("{:?} authenticated", leaf.role);

    Ok(Authenticated {
        public_key,
        challenge,
        response,
    })
}
