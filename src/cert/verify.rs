//! Certificate and challenge/response verification on the secure element.
//!
//! Signature math never runs on the host. The TBS region is hashed with
//! SHA-256 here and the digest, signature and issuer key are handed to the
//! device's verify command.

use super::definition::{CertificateDefinition, FieldId};
use crate::device::Device;
use crate::error::{Error, ErrorKind};
use crate::memory::Slot;
use crate::types::{Digest, PublicKey, Signature};
use core::convert::TryFrom;
use der::asn1::BitStringRef;
use der::{Decode, SliceReader};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use sha2::{Digest as _, Sha256};

/// Extract the signature from the BIT STRING at its declared offset.
fn extract_signature(
    definition: &CertificateDefinition<'_>,
    cert: &[u8],
) -> Result<Signature, Error> {
    let element = definition.require(FieldId::Signature)?;
    let encoded = cert.get(element.start()..).ok_or(ErrorKind::BadCert)?;
    let decoding = |_| Error::from(ErrorKind::DecodingError);

    let mut reader = SliceReader::new(encoded).map_err(decoding)?;
    let bit_string = BitStringRef::decode(&mut reader).map_err(decoding)?;
    let der = bit_string.as_bytes().ok_or(ErrorKind::DecodingError)?;
    let signature = p256::ecdsa::Signature::from_der(der).map_err(|_| ErrorKind::DecodingError)?;
    Ok(Signature::from(signature))
}

/// Verify `cert`, laid out by `definition`, against its issuer's public key.
///
/// The signed region is checked against the length of `cert` itself, so a
/// truncated certificate is a `BadCert` even when its template is sound.
pub fn verify_cert<PHY, D>(
    device: &mut Device<PHY, D>,
    definition: &CertificateDefinition<'_>,
    cert: &[u8],
    issuer_key: &[u8],
) -> Result<(), Error>
where
    PHY: I2c,
    D: DelayNs,
{
    if definition.is_empty() || cert.is_empty() || issuer_key.len() != PublicKey::LEN {
        return Err(ErrorKind::BadParam.into());
    }
    let issuer_key = PublicKey::try_from(issuer_key)?;

    let tbs = definition.tbs.slice(cert)?;
    let signature = extract_signature(definition, cert)?;

    let mut digest = Digest::default();
    digest.as_mut().copy_from_slice(&Sha256::digest(tbs));

    if device.verify_extern(&digest, &signature, &issuer_key)? {
        Ok(())
    } else {
        warn!("{:?} certificate signature does not match", definition.role);
        Err(ErrorKind::VerifyFailed.into())
    }
}

/// The subject public key of `cert`, read at its declared offset.
pub fn get_subject_public_key(
    definition: &CertificateDefinition<'_>,
    cert: &[u8],
) -> Result<PublicKey, Error> {
    let element = definition.require(FieldId::SubjectPublicKey)?;
    PublicKey::try_from(element.slice(cert)?)
}

/// A fresh challenge from the device's random number generator.
pub fn gen_challenge<PHY, D>(device: &mut Device<PHY, D>) -> Result<Digest, Error>
where
    PHY: I2c,
    D: DelayNs,
{
    let random = device.random()?;
    Digest::try_from(random.as_ref())
}

/// Answer a challenge by signing it with the private key in `slot`.
pub fn get_response<PHY, D>(
    device: &mut Device<PHY, D>,
    slot: Slot,
    challenge: &Digest,
) -> Result<Signature, Error>
where
    PHY: I2c,
    D: DelayNs,
{
    device.sign(slot, challenge)
}

/// Check a response to `challenge` against the prover's public key.
///
/// A key that is not a curve point is reported by the device as an
/// execution error, which is passed on unchanged.
pub fn verify_response<PHY, D>(
    device: &mut Device<PHY, D>,
    public_key: &[u8],
    challenge: &[u8],
    response: &[u8],
) -> Result<(), Error>
where
    PHY: I2c,
    D: DelayNs,
{
    if public_key.len() != PublicKey::LEN
        || challenge.len() != Digest::LEN
        || response.len() != Signature::LEN
    {
        return Err(ErrorKind::BadParam.into());
    }
    let public_key = PublicKey::try_from(public_key)?;
    let challenge = Digest::try_from(challenge)?;
    let response = Signature::try_from(response)?;

    if device.verify_extern(&challenge, &response, &public_key)? {
        Ok(())
    } else {
        Err(ErrorKind::VerifyFailed.into())
    }
}
