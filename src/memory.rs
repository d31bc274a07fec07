use crate::config::DeviceType;
use crate::error::{Error, ErrorKind};
use core::convert::TryFrom;

/// Zone bit 7 set: Access 32 bytes, otherwise 4 bytes.
const ZONE_READWRITE_32: u8 = 0x80;

/// Size of the configuration zone in bytes.
pub const CONFIG_ZONE_SIZE: usize = 128;
/// Size of the one-time-programmable zone in bytes.
pub const OTP_ZONE_SIZE: usize = 64;

/// A unit of data exchange is either 4 or 32 bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Size {
    Word = 0x04,
    Block = 0x20,
}

impl Size {
    pub(crate) fn len(&self) -> usize {
        *self as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Zone {
    Config = 0x00,
    Otp = 0x01,
    Data = 0x02,
}

impl Zone {
    /// Word address of `offset` (in words) within `block` of this zone. `slot`
    /// is only meaningful for the data zone.
    pub(crate) fn get_addr(&self, slot: Slot, block: u8, offset: u8) -> Result<u16, Error> {
        if offset > 7 {
            return Err(ErrorKind::BadParam.into());
        }

        let offset = offset as u16;
        match self {
            Self::Config | Self::Otp if block < 0x20 => Ok((block as u16) << 3 | offset),
            Self::Data => Ok((slot as u16) << 3 | (block as u16) << 8 | offset),
            _ => Err(ErrorKind::BadParam.into()),
        }
    }

    pub(crate) fn encode(&self, size: Size) -> u8 {
        match size {
            Size::Word => *self as u8,
            Size::Block => *self as u8 | ZONE_READWRITE_32,
        }
    }

    /// Size in bytes of the zone, or of `slot` within the data zone.
    pub fn size(&self, device_type: DeviceType, slot: Slot) -> usize {
        match self {
            Self::Config => CONFIG_ZONE_SIZE,
            Self::Otp => OTP_ZONE_SIZE,
            Self::Data => slot.size(device_type),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Slot {
    /// PrivateKey0x contains 36 bytes, taking 2 block reads.
    PrivateKey00 = 0x00,
    PrivateKey01 = 0x01,
    PrivateKey02 = 0x02,
    PrivateKey03 = 0x03,
    PrivateKey04 = 0x04,
    PrivateKey05 = 0x05,
    PrivateKey06 = 0x06,
    PrivateKey07 = 0x07,
    /// Data08 contains 416 bytes, taking 13 block reads.
    Data08 = 0x08,
    /// Certificate0x contains 72 bytes, taking 3 block reads.
    Certificate09 = 0x09,
    Certificate0a = 0x0a,
    Certificate0b = 0x0b,
    Certificate0c = 0x0c,
    Certificate0d = 0x0d,
    Certificate0e = 0x0e,
    Certificate0f = 0x0f,
}

impl Slot {
    /// Check if a slot can contain private keys.
    pub fn is_private_key(&self) -> bool {
        *self <= Self::PrivateKey07
    }

    /// Check if a slot can contain certificates.
    pub fn is_certificate(&self) -> bool {
        Self::Certificate09 <= *self
    }

    /// Capacity of the slot in bytes. SHA devices have uniform 32-byte slots.
    pub fn size(&self, device_type: DeviceType) -> usize {
        match device_type {
            DeviceType::Atsha204a | DeviceType::Atsha206a => 32,
            _ if self.is_private_key() => 36,
            _ if self.is_certificate() => 72,
            _ => 416,
        }
    }
}

impl TryFrom<u8> for Slot {
    type Error = Error;
    fn try_from(index: u8) -> Result<Self, Self::Error> {
        use Slot::*;
        const SLOTS: [Slot; 16] = [
            PrivateKey00,
            PrivateKey01,
            PrivateKey02,
            PrivateKey03,
            PrivateKey04,
            PrivateKey05,
            PrivateKey06,
            PrivateKey07,
            Data08,
            Certificate09,
            Certificate0a,
            Certificate0b,
            Certificate0c,
            Certificate0d,
            Certificate0e,
            Certificate0f,
        ];
        SLOTS
            .get(index as usize)
            .copied()
            .ok_or_else(|| ErrorKind::BadParam.into())
    }
}
