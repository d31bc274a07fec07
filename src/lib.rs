#![cfg_attr(not(test), no_std)]
#[cfg(all(feature = "std", not(test)))]
extern crate std;

mod fmt;

mod calib;
pub mod cert;
pub mod config;
mod datalink;
mod device;
pub mod error;
pub mod memory;
mod talib;
#[cfg(test)]
mod testing;
mod types;

pub use config::{DeviceType, Family, IfaceType, InterfaceConfig, Timing};
pub use device::{Device, DeviceRng, Operation, AES_BLOCK_SIZE};
pub use error::{Error, ErrorKind, Status};
pub use memory::{Size, Slot, Zone};
pub use signature;
pub use types::{Block, Digest, PublicKey, Serial, SharedSecret, Signature, Word};
