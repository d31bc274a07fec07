//! Test certificates: a root, a signer and a device certificate, each a
//! real DER document signed with a fixed key. The device certificate also
//! carries key identifier extensions.

use super::compressed::{CompressedCertificate, EncodedDates, SerialSource};
use super::definition::{
    CertElement, CertRole, CertStorage, CertificateDefinition, DynamicField, FieldId,
    PublicKeySource,
};
use super::reconstruct::MAX_SIGNATURE_LEN;
use crate::memory::Slot;
use crate::testing::{MockDevice, SERIAL};
use crate::types::{PublicKey, Signature};
use const_oid::db::{rfc4519, rfc5280, rfc5912};
use core::convert::TryFrom;
use hex_literal::hex;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::SigningKey;
use sha1::Sha1;
use sha2::{Digest as _, Sha256};
use std::vec::Vec;

pub(crate) const SIGNER_ID: u16 = 0x0AF3;

pub(crate) fn dates() -> EncodedDates {
    EncodedDates::new()
        .with_year(21)
        .with_month(3)
        .with_day(4)
        .with_hour(5)
        .with_expire_years(10)
}

pub(crate) fn root_key() -> SigningKey {
    SigningKey::from_slice(&[0x11; 32]).unwrap()
}

pub(crate) fn signer_key() -> SigningKey {
    SigningKey::from_slice(&[0x22; 32]).unwrap()
}

pub(crate) fn device_key() -> SigningKey {
    SigningKey::from_slice(&[0x33; 32]).unwrap()
}

pub(crate) fn public_key(key: &SigningKey) -> PublicKey {
    let point = key.verifying_key().to_encoded_point(false);
    PublicKey::try_from(&point.as_bytes()[1..]).unwrap()
}

pub(crate) fn device_storage() -> CertStorage {
    CertStorage {
        compressed_slot: Slot::Certificate0a,
        public_key: PublicKeySource::Generated(Slot::PrivateKey00),
        serial_source: SerialSource::DeviceSerial,
    }
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = std::vec![tag];
    match content.len() {
        len if len < 0x80 => out.push(len as u8),
        len if len < 0x100 => out.extend_from_slice(&[0x81, len as u8]),
        len => out.extend_from_slice(&[0x82, (len >> 8) as u8, len as u8]),
    }
    out.extend_from_slice(content);
    out
}

/// Accumulates TBS content and remembers where dynamic values land.
#[derive(Default)]
struct Tbs {
    content: Vec<u8>,
    fields: Vec<(FieldId, usize, usize)>,
}

impl Tbs {
    fn raw(&mut self, bytes: &[u8]) {
        self.content.extend_from_slice(bytes);
    }

    /// A primitive value whose content is a dynamic field.
    fn value(&mut self, id: FieldId, tag: u8, value: &[u8]) {
        let encoded = tlv(tag, value);
        let offset = self.content.len() + encoded.len() - value.len();
        self.fields.push((id, offset, value.len()));
        self.raw(&encoded);
    }

    /// `CN=<common_name>`. With `signer_id` the last four characters of the
    /// name are the signer id.
    fn name(&mut self, common_name: &str, signer_id: bool) {
        let attribute = [
            tlv(0x06, rfc4519::CN.as_bytes()),
            tlv(0x0C, common_name.as_bytes()),
        ]
        .concat();
        let name = tlv(0x30, &tlv(0x31, &tlv(0x30, &attribute)));
        if signer_id {
            let offset = self.content.len() + name.len() - 4;
            self.fields.push((FieldId::SignerId, offset, 4));
        }
        self.raw(&name);
    }
}

pub(crate) struct Issued {
    pub role: CertRole,
    pub cert: Vec<u8>,
    /// `cert` with dynamic fields zeroed and room for the longest signature.
    pub template: Vec<u8>,
    pub tbs: CertElement,
    pub fields: Vec<DynamicField>,
    pub signature: Signature,
    pub public_key: PublicKey,
}

impl Issued {
    pub(crate) fn definition(&self, storage: Option<CertStorage>) -> CertificateDefinition<'_> {
        CertificateDefinition {
            role: self.role,
            template: &self.template,
            tbs: self.tbs,
            fields: &self.fields,
            issuer: None,
            storage,
        }
    }

    pub(crate) fn field(&self, id: FieldId) -> CertElement {
        self.fields
            .iter()
            .find(|field| field.id == id)
            .map(|field| field.element)
            .unwrap()
    }

    pub(crate) fn compressed(&self, serial_source: SerialSource) -> CompressedCertificate {
        CompressedCertificate::new(&self.signature, dates(), SIGNER_ID, serial_source)
    }
}

struct Subject<'a> {
    role: CertRole,
    serial: &'a [u8],
    issuer: &'a str,
    issuer_has_id: bool,
    subject: &'a str,
    subject_has_id: bool,
    key: &'a SigningKey,
    /// Add authority and subject key identifier extensions.
    key_ids: bool,
}

fn issue(subject: Subject<'_>, issuer_key: &SigningKey) -> Issued {
    let algorithm = tlv(0x30, &tlv(0x06, rfc5912::ECDSA_WITH_SHA_256.as_bytes()));
    let public_key = public_key(subject.key);

    let mut tbs = Tbs::default();
    tbs.raw(&hex!("a0 03 02 01 02"));
    tbs.value(FieldId::SerialNumber, 0x02, subject.serial);
    tbs.raw(&algorithm);
    tbs.name(subject.issuer, subject.issuer_has_id);

    let validity = {
        let mut inner = Tbs::default();
        inner.value(FieldId::IssueDate, 0x17, b"210304050000Z");
        inner.value(FieldId::ExpireDate, 0x17, b"310304050000Z");
        inner
    };
    let validity_header = tlv(0x30, &validity.content).len() - validity.content.len();
    let base = tbs.content.len() + validity_header;
    tbs.fields.extend(
        validity
            .fields
            .iter()
            .map(|(id, offset, count)| (*id, base + offset, *count)),
    );
    tbs.raw(&tlv(0x30, &validity.content));

    tbs.name(subject.subject, subject.subject_has_id);

    let key_algorithm = [
        tlv(0x06, rfc5912::ID_EC_PUBLIC_KEY.as_bytes()),
        tlv(0x06, rfc5912::SECP_256_R_1.as_bytes()),
    ]
    .concat();
    let point = [&[0x00, 0x04][..], public_key.as_ref()].concat();
    let spki = [tlv(0x30, &key_algorithm), tlv(0x03, &point)].concat();
    let spki = tlv(0x30, &spki);
    let key_offset = tbs.content.len() + spki.len() - 64;
    tbs.fields.push((FieldId::SubjectPublicKey, key_offset, 64));
    tbs.raw(&spki);

    if subject.key_ids {
        let key_id = |key: &PublicKey| Sha1::new().chain_update([0x04]).chain_update(key).finalize();
        let authority = tlv(
            0x30,
            &[
                tlv(0x06, rfc5280::ID_CE_AUTHORITY_KEY_IDENTIFIER.as_bytes()),
                tlv(0x04, &tlv(0x30, &tlv(0x80, &key_id(&self::public_key(issuer_key))))),
            ]
            .concat(),
        );
        let subject_id = tlv(
            0x30,
            &[
                tlv(0x06, rfc5280::ID_CE_SUBJECT_KEY_IDENTIFIER.as_bytes()),
                tlv(0x04, &tlv(0x04, &key_id(&public_key))),
            ]
            .concat(),
        );
        let list = [authority.clone(), subject_id].concat();
        let extensions = tlv(0xA3, &tlv(0x30, &list));
        let base = tbs.content.len() + extensions.len() - list.len();
        tbs.fields
            .push((FieldId::AuthorityKeyId, base + authority.len() - 20, 20));
        tbs.fields
            .push((FieldId::SubjectKeyId, base + list.len() - 20, 20));
        tbs.raw(&extensions);
    }

    let tbs_der = tlv(0x30, &tbs.content);
    let tbs_header = tbs_der.len() - tbs.content.len();

    let digest = Sha256::digest(&tbs_der);
    let signature: p256::ecdsa::Signature = issuer_key.sign_prehash(&digest).unwrap();
    let signature_der = tlv(0x03, &[&[0x00][..], signature.to_der().as_bytes()].concat());

    let body = [tbs_der.clone(), algorithm.clone(), signature_der.clone()].concat();
    let cert = tlv(0x30, &body);
    assert_eq!(cert[1], 0x82);

    let mut fields: Vec<DynamicField> = tbs
        .fields
        .iter()
        .map(|(id, offset, count)| {
            DynamicField::new(*id, (4 + tbs_header + offset) as u16, *count as u16)
        })
        .collect();
    let signature_offset = 4 + tbs_der.len() + algorithm.len();
    fields.push(DynamicField::new(
        FieldId::Signature,
        signature_offset as u16,
        MAX_SIGNATURE_LEN as u16,
    ));

    let padded = [
        tbs_der.clone(),
        algorithm.clone(),
        std::vec![0u8; MAX_SIGNATURE_LEN],
    ]
    .concat();
    let mut template = tlv(0x30, &padded);
    for field in &fields {
        template[field.element.start()..field.element.end()].fill(0);
    }

    Issued {
        role: subject.role,
        cert,
        template,
        tbs: CertElement::new(4, tbs_der.len() as u16),
        fields,
        signature: Signature::from(signature),
        public_key,
    }
}

pub(crate) struct Chain {
    pub root: Issued,
    pub signer: Issued,
    pub device: Issued,
}

impl Chain {
    /// Put the device certificate and its key on a simulated device.
    pub(crate) fn provision(&self, mock: &mut MockDevice) {
        mock.set_key(0, device_key());
        let compressed = self.device.compressed(SerialSource::DeviceSerial);
        mock.set_slot(Slot::Certificate0a as usize, compressed.as_ref());
    }
}

pub(crate) fn chain() -> Chain {
    let root_key = root_key();
    let signer_key = signer_key();
    let device_key = device_key();
    let device_serial = [&[0x40][..], &SERIAL[..]].concat();

    Chain {
        root: issue(
            Subject {
                role: CertRole::Root,
                serial: &hex!("5f 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f"),
                issuer: "Example Root CA",
                issuer_has_id: false,
                subject: "Example Root CA",
                subject_has_id: false,
                key: &root_key,
                key_ids: false,
            },
            &root_key,
        ),
        signer: issue(
            Subject {
                role: CertRole::Signer,
                serial: &hex!("6a 11 12 13 14 15 16 17 18 19 1a 1b 1c 1d 1e 1f"),
                issuer: "Example Root CA",
                issuer_has_id: false,
                subject: "Example Signer 0AF3",
                subject_has_id: true,
                key: &signer_key,
                key_ids: false,
            },
            &root_key,
        ),
        device: issue(
            Subject {
                role: CertRole::Device,
                serial: &device_serial,
                issuer: "Example Signer 0AF3",
                issuer_has_id: true,
                subject: "Example Device",
                subject_has_id: false,
                key: &device_key,
                key_ids: true,
            },
            &signer_key,
        ),
    }
}
