//! Static capability tables backing `Device::supports`.

use crate::config::{DeviceType, Family};

/// Logical operations routed by a `Device`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    Wake,
    Idle,
    Sleep,
    Info,
    Random,
    ReadZone,
    ReadBytesZone,
    WriteZone,
    ReadSerialNumber,
    ReadConfigZone,
    IsLocked,
    IsSlotLocked,
    LockConfigZone,
    LockDataZone,
    LockDataSlot,
    ReadPubKey,
    WritePubKey,
    GenKey,
    GetPubKey,
    Sign,
    VerifyExtern,
    VerifyStored,
    Nonce,
    CounterRead,
    CounterIncrement,
    DeriveKey,
    AesEncrypt,
    AesDecrypt,
    ShaStart,
    ShaUpdate,
    ShaEnd,
    Ecdh,
    SelfTest,
    PrivWrite,
}

use Operation::*;

/// Operations family B has no encoding for.
// TODO: counter read on family B is reported unsupported until the product
// owner confirms what the device returns for it.
const TA_UNSUPPORTED: &[Operation] = &[
    ReadZone,
    Nonce,
    CounterRead,
    CounterIncrement,
    DeriveKey,
    SelfTest,
    PrivWrite,
];

/// Operations that need the ECC-P256 engine.
const ECC_ONLY: &[Operation] = &[
    ReadPubKey,
    WritePubKey,
    GenKey,
    GetPubKey,
    Sign,
    VerifyExtern,
    VerifyStored,
    CounterRead,
    CounterIncrement,
    AesEncrypt,
    AesDecrypt,
    Ecdh,
    SelfTest,
    PrivWrite,
];

const ATECC108A_UNSUPPORTED: &[Operation] = &[
    Ecdh,
    CounterRead,
    CounterIncrement,
    AesEncrypt,
    AesDecrypt,
    SelfTest,
];

const ATECC508A_UNSUPPORTED: &[Operation] = &[AesEncrypt, AesDecrypt, SelfTest];

/// Whether `device_type` implements `operation`. `Unknown` supports nothing.
pub(crate) fn supports(device_type: DeviceType, operation: Operation) -> bool {
    match device_type.family() {
        None => false,
        Some(Family::Ta) => !TA_UNSUPPORTED.contains(&operation),
        Some(Family::Ca) => {
            let excluded: &[Operation] = match device_type {
                _ if !device_type.is_ecc() => ECC_ONLY,
                DeviceType::Atecc108a => ATECC108A_UNSUPPORTED,
                DeviceType::Atecc508a => ATECC508A_UNSUPPORTED,
                _ => &[],
            };
            !excluded.contains(&operation)
        }
    }
}
