// Family B command encoders. Objects are addressed by 16-bit handles rather
// than zone/slot word addresses.
use super::packet::{Packet, PacketBuilder};
use crate::error::Error;
use crate::memory::{Slot, Zone};
use crate::types::{Digest, PublicKey, Signature};

/// Handle bit marking a data element.
const HANDLE_DATA: u16 = 0x8000;

pub(crate) fn handle(slot: Slot) -> u16 {
    HANDLE_DATA | slot as u16
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum OpCode {
    Aes = 0x01,
    Ecdh = 0x02,
    Info = 0x03,
    KeyGen = 0x04,
    Lock = 0x05,
    Random = 0x06,
    Read = 0x07,
    Sha = 0x08,
    Sign = 0x09,
    Verify = 0x0A,
    Write = 0x0B,
}

pub(crate) struct Aes<'a>(PacketBuilder<'a>);
pub(crate) struct Ecdh<'a>(PacketBuilder<'a>);
pub(crate) struct Info<'a>(PacketBuilder<'a>);
pub(crate) struct KeyGen<'a>(PacketBuilder<'a>);
pub(crate) struct Lock<'a>(PacketBuilder<'a>);
pub(crate) struct Random<'a>(PacketBuilder<'a>);
pub(crate) struct Read<'a>(PacketBuilder<'a>);
pub(crate) struct Sha<'a>(PacketBuilder<'a>);
pub(crate) struct Sign<'a>(PacketBuilder<'a>);
pub(crate) struct Verify<'a>(PacketBuilder<'a>);
pub(crate) struct Write<'a>(PacketBuilder<'a>);

impl<'a> Aes<'a> {
    const MODE_ENCRYPT: u8 = 0x00;
    const MODE_DECRYPT: u8 = 0x01;

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn encrypt(&mut self, slot: Slot, plaintext: &[u8]) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::Aes)
            .mode(Self::MODE_ENCRYPT)
            .handle(handle(slot))
            .pdu_data(plaintext)?
            .build()
    }

    pub(crate) fn decrypt(&mut self, slot: Slot, ciphertext: &[u8]) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::Aes)
            .mode(Self::MODE_DECRYPT)
            .handle(handle(slot))
            .pdu_data(ciphertext)?
            .build()
    }
}

impl<'a> Ecdh<'a> {
    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn diffie_hellman(&mut self, slot: Slot, public_key: &PublicKey) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::Ecdh)
            .handle(handle(slot))
            .pdu_data(public_key)?
            .build()
    }
}

impl<'a> Info<'a> {
    const MODE_REVISION: u8 = 0x00;
    const MODE_ZONE_LOCK: u8 = 0x01;
    const MODE_SLOT_LOCK: u8 = 0x02;
    const MODE_SERIAL: u8 = 0x03;

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn revision(&mut self) -> Result<Packet, Error> {
        self.0.opcode(OpCode::Info).mode(Self::MODE_REVISION).build()
    }

    pub(crate) fn serial(&mut self) -> Result<Packet, Error> {
        self.0.opcode(OpCode::Info).mode(Self::MODE_SERIAL).build()
    }

    /// Response is a single byte, non-zero once locked.
    pub(crate) fn zone_lock(&mut self, zone: Zone) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::Info)
            .mode(Self::MODE_ZONE_LOCK)
            .handle(zone as u16)
            .build()
    }

    /// Response is a single byte, non-zero once locked.
    pub(crate) fn slot_lock(&mut self, slot: Slot) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::Info)
            .mode(Self::MODE_SLOT_LOCK)
            .handle(handle(slot))
            .build()
    }
}

impl<'a> KeyGen<'a> {
    const MODE_PRIVATE: u8 = 0x00;
    const MODE_PUBLIC: u8 = 0x01;

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn private_key(&mut self, slot: Slot) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::KeyGen)
            .mode(Self::MODE_PRIVATE)
            .handle(handle(slot))
            .build()
    }

    pub(crate) fn public_key(&mut self, slot: Slot) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::KeyGen)
            .mode(Self::MODE_PUBLIC)
            .handle(handle(slot))
            .build()
    }
}

impl<'a> Lock<'a> {
    const MODE_SLOT: u8 = 0x03;

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn zone(&mut self, zone: Zone) -> Result<Packet, Error> {
        self.0.opcode(OpCode::Lock).mode(zone as u8).build()
    }

    pub(crate) fn slot(&mut self, slot: Slot) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::Lock)
            .mode(Self::MODE_SLOT)
            .handle(handle(slot))
            .build()
    }
}

impl<'a> Random<'a> {
    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn random(&mut self) -> Result<Packet, Error> {
        self.0.opcode(OpCode::Random).build()
    }
}

impl<'a> Read<'a> {
    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    /// Byte range read. Data elements are addressed by handle, the config and
    /// OTP zones by mode alone.
    pub(crate) fn read(
        &mut self,
        zone: Zone,
        slot: Slot,
        offset: u16,
        length: u16,
    ) -> Result<Packet, Error> {
        let target = match zone {
            Zone::Data => handle(slot),
            Zone::Config | Zone::Otp => 0,
        };
        self.0
            .opcode(OpCode::Read)
            .mode(zone as u8)
            .handle(target)
            .pdu_data(offset.to_be_bytes())?
            .pdu_data(length.to_be_bytes())?
            .build()
    }
}

impl<'a> Sha<'a> {
    const MODE_START: u8 = 0x00;
    const MODE_UPDATE: u8 = 0x01;
    const MODE_END: u8 = 0x02;

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn start(&mut self) -> Result<Packet, Error> {
        self.0.opcode(OpCode::Sha).mode(Self::MODE_START).build()
    }

    pub(crate) fn update(&mut self, data: &[u8]) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::Sha)
            .mode(Self::MODE_UPDATE)
            .pdu_data(data)?
            .build()
    }

    pub(crate) fn end(&mut self, data: &[u8]) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::Sha)
            .mode(Self::MODE_END)
            .pdu_data(data)?
            .build()
    }
}

impl<'a> Sign<'a> {
    const MODE_EXTERNAL: u8 = 0x00;

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn external(&mut self, slot: Slot, digest: &Digest) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::Sign)
            .mode(Self::MODE_EXTERNAL)
            .handle(handle(slot))
            .pdu_data(digest)?
            .build()
    }
}

impl<'a> Verify<'a> {
    const MODE_EXTERNAL: u8 = 0x00;
    const MODE_STORED: u8 = 0x01;

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn external(
        &mut self,
        digest: &Digest,
        signature: &Signature,
        public_key: &PublicKey,
    ) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::Verify)
            .mode(Self::MODE_EXTERNAL)
            .pdu_data(digest)?
            .pdu_data(signature)?
            .pdu_data(public_key)?
            .build()
    }

    pub(crate) fn stored(
        &mut self,
        digest: &Digest,
        signature: &Signature,
        slot: Slot,
    ) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::Verify)
            .mode(Self::MODE_STORED)
            .handle(handle(slot))
            .pdu_data(digest)?
            .pdu_data(signature)?
            .build()
    }
}

impl<'a> Write<'a> {
    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn write(
        &mut self,
        zone: Zone,
        slot: Slot,
        offset: u16,
        data: &[u8],
    ) -> Result<Packet, Error> {
        let target = match zone {
            Zone::Data => handle(slot),
            Zone::Config | Zone::Otp => 0,
        };
        self.0
            .opcode(OpCode::Write)
            .mode(zone as u8)
            .handle(target)
            .pdu_data(offset.to_be_bytes())?
            .pdu_data(data)?
            .build()
    }
}
