//! Certificates backed by the secure element.
//!
//! A certificate is described by a [`CertificateDefinition`]: a DER template
//! plus the offsets of the values that change between certificates. With a
//! definition, a certificate can be rebuilt from its 72-byte compressed form
//! on the device, and verified with the device's own verify command.
//!
//! ## Modules
//!
//! - [`compressed`]: the compressed 72-byte format and its encoded dates
//! - [`definition`]: templates, dynamic fields and issuer references
//! - [`reconstruct`]: template merge and device reads
//! - [`verify`]: signature checks and challenge/response
//! - [`chain`]: walking a chain from the anchor key to a leaf, then
//!   challenging the leaf

pub mod chain;
pub mod compressed;
pub mod definition;
pub mod reconstruct;
pub mod verify;

#[cfg(test)]
mod fixtures;

pub use chain::{authenticate, verify_chain, Authenticated, CertSource, ChainError, ChainLink};
pub use compressed::{CompressedCertificate, EncodedDates, SerialSource};
pub use definition::{
    issuer_chain, CertElement, CertRole, CertStorage, CertificateDefinition, DynamicField,
    FieldId, PublicKeySource, MAX_CHAIN_DEPTH,
};
pub use reconstruct::{
    encode_dates, key_id, read_cert, reconstruct, CertValues, ReconstructedCertificate,
};
pub use verify::{gen_challenge, get_response, get_subject_public_key, verify_cert, verify_response};
