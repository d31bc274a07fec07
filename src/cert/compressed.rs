//! Compressed certificate format
//!
//! Only the dynamic parts of a certificate are kept on the device, in one
//! 72-byte slot:
//! - Signature (64 bytes: R + S)
//! - Encoded dates (3 bytes)
//! - Signer ID (2 bytes)
//! - Template ID and chain ID (1 byte)
//! - Serial number source and format version (1 byte)
//! - Reserved (1 byte)

use crate::error::{Error, ErrorKind};
use crate::types::{PublicKey, Serial, Signature};
use bitfield_struct::bitfield;
use core::convert::TryFrom;
use sha2::{Digest as _, Sha256};

/// Issue date and validity packed into 24 bits, most significant first:
/// year-2000 (5), month (4), day (5), hour (5), expire years (5).
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct EncodedDates {
    #[bits(5)]
    pub expire_years: u8,
    #[bits(5)]
    pub hour: u8,
    #[bits(5)]
    pub day: u8,
    #[bits(4)]
    pub month: u8,
    #[bits(5)]
    pub year: u8,
    #[bits(8)]
    __: u8,
}

impl EncodedDates {
    pub const BASE_YEAR: u16 = 2000;
    /// Expiry used when `expire_years` is zero.
    pub const NO_EXPIRY: CertDate = CertDate {
        year: 9999,
        month: 12,
        day: 31,
        hour: 23,
        minutes: 59,
        seconds: 59,
    };

    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self::from(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }

    pub fn to_bytes(self) -> [u8; 3] {
        let raw = u32::from(self).to_be_bytes();
        [raw[1], raw[2], raw[3]]
    }

    pub fn issue_date(&self) -> Result<CertDate, Error> {
        let year = Self::BASE_YEAR + self.year() as u16;
        let (month, day, hour) = (self.month(), self.day(), self.hour());
        if !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) || hour > 23 {
            return Err(ErrorKind::DecodingError.into());
        }
        Ok(CertDate {
            year,
            month,
            day,
            hour,
            minutes: 0,
            seconds: 0,
        })
    }

    /// The issue date moved forward by `expire_years`. Month and day are
    /// carried over as they are, so a 29 February issue date may expire on
    /// 29 February of a common year.
    pub fn expire_date(&self) -> Result<CertDate, Error> {
        let issue = self.issue_date()?;
        if self.expire_years() == 0 {
            return Ok(Self::NO_EXPIRY);
        }
        Ok(CertDate {
            year: issue.year + self.expire_years() as u16,
            ..issue
        })
    }
}

/// Calendar fields of a certificate validity date, in UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CertDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minutes: u8,
    pub seconds: u8,
}

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        2 if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Length of a date written as UTCTime text, `YYMMDDHHMMSSZ`.
pub const UTC_TIME_LEN: usize = 13;
/// Length of a date written as GeneralizedTime text, `YYYYMMDDHHMMSSZ`.
pub const GENERALIZED_TIME_LEN: usize = 15;

/// Write `date` as the text body of a UTCTime or GeneralizedTime, picked by
/// the length of `out`.
pub fn write_time(date: &CertDate, out: &mut [u8]) -> Result<(), Error> {
    fn digits(out: &mut [u8], value: u16) {
        let mut value = value;
        for digit in out.iter_mut().rev() {
            *digit = b'0' + (value % 10) as u8;
            value /= 10;
        }
    }

    let (year, rest) = match out.len() {
        UTC_TIME_LEN => out.split_at_mut(2),
        GENERALIZED_TIME_LEN => out.split_at_mut(4),
        _ => return Err(ErrorKind::BadCert.into()),
    };
    digits(year, date.year);
    digits(&mut rest[0..2], date.month as u16);
    digits(&mut rest[2..4], date.day as u16);
    digits(&mut rest[4..6], date.hour as u16);
    digits(&mut rest[6..8], date.minutes as u16);
    digits(&mut rest[8..10], date.seconds as u16);
    rest[10] = b'Z';
    Ok(())
}

/// Source of certificate serial number
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SerialSource {
    /// Serial is part of the template or supplied by the caller
    Stored = 0x0,
    /// Serial is 0x40 | device_sn[0..9]
    DeviceSerial = 0x8,
    /// Serial is 0x40 | signer_id[0..2]
    SignerId = 0x9,
    /// Serial is SHA256(subject public key + encoded dates)
    PubKeyHash = 0xA,
    /// Serial is SHA256(device SN + encoded dates)
    DeviceSerialHash = 0xB,
}

impl TryFrom<u8> for SerialSource {
    type Error = Error;
    fn try_from(nibble: u8) -> Result<Self, Self::Error> {
        use SerialSource::*;
        match nibble {
            0x0 => Ok(Stored),
            0x8 => Ok(DeviceSerial),
            0x9 => Ok(SignerId),
            0xA => Ok(PubKeyHash),
            0xB => Ok(DeviceSerialHash),
            _ => Err(ErrorKind::DecodingError.into()),
        }
    }
}

/// Inputs a serial number may be derived from.
pub struct SerialInputs<'a> {
    pub device_serial: Option<&'a Serial>,
    pub public_key: Option<&'a PublicKey>,
    pub signer_id: u16,
    pub dates: EncodedDates,
}

impl SerialSource {
    /// Fill `out` with the serial number. The field length decides how much
    /// of a hash is kept; the fixed formats must match it exactly.
    pub fn generate(&self, inputs: &SerialInputs<'_>, out: &mut [u8]) -> Result<(), Error> {
        match self {
            SerialSource::Stored => Err(ErrorKind::BadParam.into()),
            SerialSource::DeviceSerial => {
                let serial = inputs.device_serial.ok_or(ErrorKind::BadParam)?;
                prefixed(out, serial.as_ref())
            }
            SerialSource::SignerId => prefixed(out, &inputs.signer_id.to_be_bytes()),
            SerialSource::PubKeyHash => {
                let public_key = inputs.public_key.ok_or(ErrorKind::BadParam)?;
                hashed(out, public_key.as_ref(), inputs.dates)
            }
            SerialSource::DeviceSerialHash => {
                let serial = inputs.device_serial.ok_or(ErrorKind::BadParam)?;
                hashed(out, serial.as_ref(), inputs.dates)
            }
        }
    }
}

fn prefixed(out: &mut [u8], value: &[u8]) -> Result<(), Error> {
    if out.len() != value.len() + 1 {
        return Err(ErrorKind::BadCert.into());
    }
    out[0] = 0x40;
    out[1..].copy_from_slice(value);
    Ok(())
}

// Positive, non-zero leading byte so the INTEGER keeps its length.
fn hashed(out: &mut [u8], value: &[u8], dates: EncodedDates) -> Result<(), Error> {
    let digest = Sha256::new()
        .chain_update(value)
        .chain_update(dates.to_bytes())
        .finalize();
    if out.is_empty() || out.len() > digest.len() {
        return Err(ErrorKind::BadCert.into());
    }
    out.copy_from_slice(&digest[..out.len()]);
    out[0] = (out[0] & 0x7F) | 0x40;
    Ok(())
}

/// 72-byte compressed certificate stored on device
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressedCertificate {
    data: [u8; Self::SIZE],
}

impl CompressedCertificate {
    /// Total size of compressed certificate in bytes
    pub const SIZE: usize = 72;

    const SIGNATURE_OFFSET: usize = 0;
    const DATES_OFFSET: usize = 64;
    const SIGNER_ID_OFFSET: usize = 67;
    const IDS_OFFSET: usize = 69;
    const SOURCE_OFFSET: usize = 70;

    pub fn new(
        signature: &Signature,
        dates: EncodedDates,
        signer_id: u16,
        serial_source: SerialSource,
    ) -> Self {
        let mut data = [0u8; Self::SIZE];
        data[Self::SIGNATURE_OFFSET..Self::DATES_OFFSET].copy_from_slice(signature.as_ref());
        data[Self::DATES_OFFSET..Self::SIGNER_ID_OFFSET].copy_from_slice(&dates.to_bytes());
        data[Self::SIGNER_ID_OFFSET..Self::IDS_OFFSET].copy_from_slice(&signer_id.to_be_bytes());
        data[Self::SOURCE_OFFSET] = (serial_source as u8) << 4;
        Self { data }
    }

    pub fn signature(&self) -> Signature {
        let mut signature = Signature::default();
        signature
            .as_mut()
            .copy_from_slice(&self.data[Self::SIGNATURE_OFFSET..Self::DATES_OFFSET]);
        signature
    }

    pub fn dates(&self) -> EncodedDates {
        let mut bytes = [0u8; 3];
        bytes.copy_from_slice(&self.data[Self::DATES_OFFSET..Self::SIGNER_ID_OFFSET]);
        EncodedDates::from_bytes(bytes)
    }

    pub fn signer_id(&self) -> u16 {
        u16::from_be_bytes([
            self.data[Self::SIGNER_ID_OFFSET],
            self.data[Self::SIGNER_ID_OFFSET + 1],
        ])
    }

    pub fn template_id(&self) -> u8 {
        self.data[Self::IDS_OFFSET] >> 4
    }

    pub fn chain_id(&self) -> u8 {
        self.data[Self::IDS_OFFSET] & 0x0F
    }

    pub fn with_ids(mut self, template_id: u8, chain_id: u8) -> Self {
        self.data[Self::IDS_OFFSET] = (template_id << 4) | (chain_id & 0x0F);
        self
    }

    pub fn serial_source(&self) -> Result<SerialSource, Error> {
        SerialSource::try_from(self.data[Self::SOURCE_OFFSET] >> 4)
    }

    pub fn format_version(&self) -> u8 {
        self.data[Self::SOURCE_OFFSET] & 0x0F
    }
}

impl AsRef<[u8]> for CompressedCertificate {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl TryFrom<&[u8]> for CompressedCertificate {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != Self::SIZE {
            return Err(ErrorKind::InvalidSize.into());
        }
        let mut data = [0u8; Self::SIZE];
        data.copy_from_slice(bytes);
        Ok(Self { data })
    }
}
