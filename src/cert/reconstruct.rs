//! Template merge.
//!
//! A certificate is rebuilt by copying its definition's template and
//! overwriting each dynamic field in place. Only the signature changes
//! length, so the outer SEQUENCE header is patched after it is written.

use super::compressed::{write_time, CompressedCertificate, EncodedDates, SerialInputs, SerialSource};
use super::definition::{CertificateDefinition, FieldId, PublicKeySource};
use crate::device::Device;
use crate::error::{Error, ErrorKind};
use crate::memory::Zone;
use crate::types::{PublicKey, Signature};
use core::convert::TryFrom;
use der::asn1::BitStringRef;
use der::Encode;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use heapless::{LinearMap, Vec};
use sha1::{Digest as _, Sha1};

/// Longest value a single dynamic field takes.
pub const MAX_VALUE_LEN: usize = 64;
/// Longest DER signature BIT STRING for P-256.
pub const MAX_SIGNATURE_LEN: usize = 75;
/// Length of a key identifier.
pub const KEY_ID_LEN: usize = 20;

/// SHA-1 over the uncompressed point `04 || X || Y`, the usual way key
/// identifier extensions are derived.
pub fn key_id(public_key: &PublicKey) -> [u8; KEY_ID_LEN] {
    let digest = Sha1::new()
        .chain_update([0x04])
        .chain_update(public_key.as_ref())
        .finalize();
    let mut id = [0u8; KEY_ID_LEN];
    id.copy_from_slice(&digest);
    id
}

fn insert_key_id(
    definition: &CertificateDefinition<'_>,
    id: FieldId,
    public_key: &PublicKey,
    values: &mut CertValues,
) -> Result<(), Error> {
    match definition.field(id) {
        Some(element) if element.count as usize != KEY_ID_LEN => Err(ErrorKind::BadCert.into()),
        Some(_) => values.insert(id, &key_id(public_key)),
        None => Ok(()),
    }
}

/// Dynamic field values keyed by field.
///
/// Dates are the text body of the time value. The signature is the raw
/// 64-byte R || S and is DER-encoded during reconstruction.
#[derive(Debug, Default)]
pub struct CertValues {
    values: LinearMap<FieldId, Vec<u8, MAX_VALUE_LEN>, 8>,
}

impl CertValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: FieldId, value: &[u8]) -> Result<(), Error> {
        let value = Vec::from_slice(value).map_err(|()| Error::from(ErrorKind::BadParam))?;
        self.values
            .insert(id, value)
            .map(drop)
            .map_err(|_| ErrorKind::BadParam.into())
    }

    pub fn get(&self, id: FieldId) -> Option<&[u8]> {
        self.values.get(&id).map(|value| value.as_slice())
    }
}

/// A certificate image in a caller buffer.
#[derive(Debug)]
pub struct ReconstructedCertificate<'b> {
    bytes: &'b [u8],
    subject_public_key: Option<super::CertElement>,
}

impl<'b> ReconstructedCertificate<'b> {
    pub fn as_bytes(&self) -> &'b [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn subject_public_key(&self) -> Result<PublicKey, Error> {
        let element = self.subject_public_key.ok_or(ErrorKind::BadParam)?;
        PublicKey::try_from(element.slice(self.bytes)?)
    }
}

/// Encode a raw R || S signature as the certificate's signature BIT STRING.
pub(crate) fn encode_signature<'o>(
    signature: &Signature,
    out: &'o mut [u8; MAX_SIGNATURE_LEN],
) -> Result<&'o [u8], Error> {
    let signature = p256::ecdsa::Signature::try_from(*signature)?;
    let der = signature.to_der();
    let bit_string =
        BitStringRef::from_bytes(der.as_bytes()).map_err(|_| Error::from(ErrorKind::DecodingError))?;
    bit_string
        .encode_to_slice(out)
        .map_err(|_| ErrorKind::DecodingError.into())
}

/// Rewrite the outer SEQUENCE length after the certificate became `length`
/// bytes long.
fn patch_outer_length(cert: &mut [u8], length: usize) -> Result<(), Error> {
    let too_long = |_| Error::from(ErrorKind::BadCert);
    match cert.get(..2) {
        Some([0x30, 0x82]) => {
            let content = u16::try_from(length.saturating_sub(4)).map_err(too_long)?;
            cert[2..4].copy_from_slice(&content.to_be_bytes());
        }
        Some([0x30, 0x81]) => {
            cert[2] = u8::try_from(length.saturating_sub(3)).map_err(too_long)?;
        }
        _ => return Err(ErrorKind::BadCert.into()),
    }
    Ok(())
}

/// Merge `values` into the template of `definition`, writing into `out`.
///
/// Fields without a value keep their template bytes.
pub fn reconstruct<'b>(
    definition: &CertificateDefinition<'_>,
    values: &CertValues,
    out: &'b mut [u8],
) -> Result<ReconstructedCertificate<'b>, Error> {
    if definition.is_empty() {
        return Err(ErrorKind::BadParam.into());
    }
    let template = definition.template;
    if out.len() < template.len() {
        return Err(ErrorKind::SmallBuffer.into());
    }
    if definition.tbs.end() > template.len() {
        return Err(ErrorKind::BadCert.into());
    }

    out[..template.len()].copy_from_slice(template);
    let mut length = template.len();

    for field in definition.fields {
        let element = field.element;
        if element.end() > template.len() {
            return Err(ErrorKind::BadCert.into());
        }
        let value = match values.get(field.id) {
            Some(value) => value,
            None => continue,
        };

        if field.id == FieldId::Signature {
            let signature = Signature::try_from(value)?;
            let mut encoded = [0u8; MAX_SIGNATURE_LEN];
            let encoded = encode_signature(&signature, &mut encoded)?;
            if encoded.len() > element.count as usize {
                return Err(ErrorKind::BadCert.into());
            }
            out[element.start()..element.start() + encoded.len()].copy_from_slice(encoded);
            if encoded.len() != element.count as usize {
                // Only a trailing signature may shrink the certificate.
                if element.end() != template.len() {
                    return Err(ErrorKind::BadCert.into());
                }
                length = element.start() + encoded.len();
                patch_outer_length(out, length)?;
            }
            continue;
        }

        if value.len() != element.count as usize {
            return Err(ErrorKind::BadParam.into());
        }
        out[element.start()..element.end()].copy_from_slice(value);
    }

    Ok(ReconstructedCertificate {
        bytes: &out[..length],
        subject_public_key: definition.field(FieldId::SubjectPublicKey),
    })
}

/// Signer ids appear either as raw bytes or as four upper-case hex digits
/// in a subject name.
fn write_signer_id(signer_id: u16, out: &mut [u8]) -> Result<(), Error> {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    match out.len() {
        2 => out.copy_from_slice(&signer_id.to_be_bytes()),
        4 => {
            for (i, digit) in out.iter_mut().enumerate() {
                *digit = HEX[((signer_id >> (12 - 4 * i)) & 0xF) as usize];
            }
        }
        _ => return Err(ErrorKind::BadCert.into()),
    }
    Ok(())
}

/// Values a compressed certificate and its public key supply.
pub(crate) fn compressed_values(
    definition: &CertificateDefinition<'_>,
    compressed: &CompressedCertificate,
    public_key: &PublicKey,
    values: &mut CertValues,
) -> Result<(), Error> {
    let mut scratch = [0u8; MAX_VALUE_LEN];
    let dates = compressed.dates();

    values.insert(FieldId::SubjectPublicKey, public_key.as_ref())?;
    values.insert(FieldId::Signature, compressed.signature().as_ref())?;
    insert_key_id(definition, FieldId::SubjectKeyId, public_key, values)?;

    if let Some(element) = definition.field(FieldId::IssueDate) {
        let text = scratch
            .get_mut(..element.count as usize)
            .ok_or(ErrorKind::BadCert)?;
        write_time(&dates.issue_date()?, text)?;
        values.insert(FieldId::IssueDate, text)?;
    }
    if let Some(element) = definition.field(FieldId::ExpireDate) {
        let text = scratch
            .get_mut(..element.count as usize)
            .ok_or(ErrorKind::BadCert)?;
        write_time(&dates.expire_date()?, text)?;
        values.insert(FieldId::ExpireDate, text)?;
    }
    if let Some(element) = definition.field(FieldId::SignerId) {
        let id = scratch
            .get_mut(..element.count as usize)
            .ok_or(ErrorKind::BadCert)?;
        write_signer_id(compressed.signer_id(), id)?;
        values.insert(FieldId::SignerId, id)?;
    }
    Ok(())
}

/// Rebuild a device-resident certificate from its compressed form and the
/// secure element's keys.
///
/// `issuer_key` is needed only when the template carries an authority key
/// identifier.
pub fn read_cert<'b, PHY, D>(
    device: &mut Device<PHY, D>,
    definition: &CertificateDefinition<'_>,
    issuer_key: Option<&PublicKey>,
    out: &'b mut [u8],
) -> Result<ReconstructedCertificate<'b>, Error>
where
    PHY: I2c,
    D: DelayNs,
{
    let storage = definition.storage.ok_or(ErrorKind::BadParam)?;
    if definition.field(FieldId::AuthorityKeyId).is_some() && issuer_key.is_none() {
        return Err(ErrorKind::BadParam.into());
    }

    let mut raw = [0u8; CompressedCertificate::SIZE];
    device.read_bytes_zone(Zone::Data, storage.compressed_slot, 0, &mut raw)?;
    let compressed = CompressedCertificate::try_from(raw.as_ref())?;

    let public_key = match storage.public_key {
        PublicKeySource::Stored(slot) => device.read_pubkey(slot)?,
        PublicKeySource::Generated(slot) => device.get_pubkey(slot)?,
    };

    let mut values = CertValues::new();
    compressed_values(definition, &compressed, &public_key, &mut values)?;
    if let Some(issuer_key) = issuer_key {
        insert_key_id(definition, FieldId::AuthorityKeyId, issuer_key, &mut values)?;
    }

    if let Some(element) = definition.field(FieldId::SerialNumber) {
        if storage.serial_source != SerialSource::Stored {
            let device_serial = match storage.serial_source {
                SerialSource::DeviceSerial | SerialSource::DeviceSerialHash => {
                    Some(device.read_serial_number()?)
                }
                _ => None,
            };
            let inputs = SerialInputs {
                device_serial: device_serial.as_ref(),
                public_key: Some(&public_key),
                signer_id: compressed.signer_id(),
                dates: compressed.dates(),
            };
            let mut serial = [0u8; MAX_VALUE_LEN];
            let serial = serial
                .get_mut(..element.count as usize)
                .ok_or(ErrorKind::BadCert)?;
            storage.serial_source.generate(&inputs, serial)?;
            values.insert(FieldId::SerialNumber, serial)?;
        }
    }

    debug!("rebuilt {:?} certificate", definition.role);
    reconstruct(definition, &values, out)
}

/// Pack the dates of an issued certificate into their compressed form.
pub fn encode_dates(
    issue_year: u16,
    month: u8,
    day: u8,
    hour: u8,
    expire_years: u8,
) -> Result<EncodedDates, Error> {
    let year = issue_year
        .checked_sub(EncodedDates::BASE_YEAR)
        .filter(|year| *year < 32)
        .ok_or(ErrorKind::BadParam)?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 23 || expire_years > 31 {
        return Err(ErrorKind::BadParam.into());
    }
    Ok(EncodedDates::new()
        .with_year(year as u8)
        .with_month(month)
        .with_day(day)
        .with_hour(hour)
        .with_expire_years(expire_years))
}
