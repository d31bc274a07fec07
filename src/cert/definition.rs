//! Declarative certificate layouts.
//!
//! A definition never parses the certificate it describes. Every dynamic
//! field sits at an offset fixed when the template was authored.

use super::compressed::SerialSource;
use crate::error::{Error, ErrorKind};
use crate::memory::Slot;
use heapless::Vec;

/// Longest issuer chain `issuer_chain` follows.
pub const MAX_CHAIN_DEPTH: usize = 8;

/// Position of a certificate, used for narration only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CertRole {
    Root,
    Signer,
    Device,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldId {
    SerialNumber,
    IssueDate,
    ExpireDate,
    SignerId,
    /// Raw X || Y of the subject key, without the SEC1 point prefix.
    SubjectPublicKey,
    /// The outer signature BIT STRING, tag included.
    Signature,
    AuthorityKeyId,
    SubjectKeyId,
}

/// Location of a dynamic element in the DER template
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CertElement {
    /// Offset from start of template
    pub offset: u16,
    /// Number of bytes the element occupies
    pub count: u16,
}

impl CertElement {
    pub const fn new(offset: u16, count: u16) -> Self {
        Self { offset, count }
    }

    pub(crate) fn start(&self) -> usize {
        self.offset as usize
    }

    pub(crate) fn end(&self) -> usize {
        self.offset as usize + self.count as usize
    }

    /// The element's bytes, or `BadCert` when it runs past `cert`.
    pub(crate) fn slice<'c>(&self, cert: &'c [u8]) -> Result<&'c [u8], Error> {
        cert.get(self.start()..self.end())
            .ok_or_else(|| ErrorKind::BadCert.into())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DynamicField {
    pub id: FieldId,
    pub element: CertElement,
}

impl DynamicField {
    pub const fn new(id: FieldId, offset: u16, count: u16) -> Self {
        Self {
            id,
            element: CertElement::new(offset, count),
        }
    }
}

/// Where the subject public key of a device-resident certificate comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublicKeySource {
    /// A public key written to a data slot.
    Stored(Slot),
    /// Computed by the device from the private key in the slot.
    Generated(Slot),
}

/// How to fetch a certificate from the secure element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CertStorage {
    /// Slot holding the 72-byte compressed certificate.
    pub compressed_slot: Slot,
    pub public_key: PublicKeySource,
    pub serial_source: SerialSource,
}

#[derive(Debug)]
pub struct CertificateDefinition<'a> {
    pub role: CertRole,
    /// DER template with static content. Its length is the largest
    /// certificate this definition can produce.
    pub template: &'a [u8],
    /// The to-be-signed region.
    pub tbs: CertElement,
    pub fields: &'a [DynamicField],
    /// `None` marks a trust anchor.
    pub issuer: Option<&'a CertificateDefinition<'a>>,
    /// `None` when the certificate is only ever supplied by the caller.
    pub storage: Option<CertStorage>,
}

impl<'a> CertificateDefinition<'a> {
    /// A definition describing nothing. Every operation rejects it.
    pub const EMPTY: CertificateDefinition<'static> = CertificateDefinition {
        role: CertRole::Device,
        template: &[],
        tbs: CertElement::new(0, 0),
        fields: &[],
        issuer: None,
        storage: None,
    };

    pub fn is_empty(&self) -> bool {
        self.template.is_empty()
    }

    pub fn field(&self, id: FieldId) -> Option<CertElement> {
        self.fields
            .iter()
            .find(|field| field.id == id)
            .map(|field| field.element)
    }

    pub(crate) fn require(&self, id: FieldId) -> Result<CertElement, Error> {
        self.field(id).ok_or_else(|| ErrorKind::BadParam.into())
    }

    pub fn is_trust_anchor(&self) -> bool {
        self.issuer.is_none()
    }
}

/// Definitions from `leaf` up to its trust anchor, leaf first.
///
/// A chain longer than `MAX_CHAIN_DEPTH`, cyclic ones included, is
/// `BadParam`.
pub fn issuer_chain<'a>(
    leaf: &'a CertificateDefinition<'a>,
) -> Result<Vec<&'a CertificateDefinition<'a>, MAX_CHAIN_DEPTH>, Error> {
    let mut chain = Vec::new();
    let mut current = Some(leaf);
    while let Some(definition) = current {
        chain
            .push(definition)
            .map_err(|_| Error::from(ErrorKind::BadParam))?;
        current = definition.issuer;
    }
    Ok(chain)
}
