use super::command::OpCode;
use crate::calib::CRC16;
use crate::datalink::Transaction;
use crate::error::{Error, ErrorKind, Status};
use core::mem::size_of;
use core::ops::RangeTo;

// Offset by word_address (1 byte)
const PACKET_OFFSET: usize = 1;
// PACKET_OFFSET + length (2 bytes), opcode (1 byte), mode (1 byte), handle (2 bytes)
const PDU_OFFSET: usize = 7;
// Length (2 bytes), opcode (1 byte), mode (1 byte), handle (2 bytes), crc (2 bytes)
const CMD_SIZE_MIN: usize = 8;
// Length (2 bytes), status (1 byte), crc (2 bytes)
const RSP_SIZE_MIN: usize = 5;

#[derive(Debug)]
pub(crate) struct PacketBuilder<'a> {
    buffer: &'a mut [u8],
    pdu_length: usize,
    opcode: Option<OpCode>,
    mode: u8,
    handle: u16,
}

impl<'a> PacketBuilder<'a> {
    pub(crate) fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            pdu_length: 0,
            opcode: None,
            mode: 0,
            handle: 0,
        }
    }

    pub(crate) fn opcode(&mut self, opcode: OpCode) -> &mut Self {
        self.opcode.replace(opcode);
        self
    }

    pub(crate) fn mode(&mut self, mode: u8) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Object handle the command acts on.
    pub(crate) fn handle(&mut self, handle: u16) -> &mut Self {
        self.handle = handle;
        self
    }

    /// Appends `data` to the PDU. Fails once the buffer cannot hold the
    /// command and its CRC.
    pub(crate) fn pdu_data(&mut self, data: impl AsRef<[u8]>) -> Result<&mut Self, Error> {
        let data = data.as_ref();
        let start = PDU_OFFSET + self.pdu_length;
        let end = start + data.len();
        if end + size_of::<u16>() > self.buffer.len() {
            return Err(ErrorKind::SmallBuffer.into());
        }
        self.buffer[start..end].copy_from_slice(data);
        self.pdu_length += data.len();
        Ok(self)
    }

    pub(crate) fn build(&mut self) -> Result<Packet, Error> {
        let packet_length = CMD_SIZE_MIN + self.pdu_length;
        let opcode = self.opcode.ok_or(Error::from(ErrorKind::BadOpcode))?;

        self.buffer[0] = Transaction::Command as u8;
        let packet = self.buffer[PACKET_OFFSET..].as_mut();
        packet[0..2].copy_from_slice((packet_length as u16).to_be_bytes().as_ref());
        packet[2] = opcode as u8;
        packet[3] = self.mode;
        packet[4..6].copy_from_slice(self.handle.to_be_bytes().as_ref());

        let crc_offset = packet_length - size_of::<u16>();
        let crc = CRC16.checksum(&packet[..crc_offset]);
        packet[crc_offset..packet_length].copy_from_slice(crc.to_be_bytes().as_ref());
        Ok(Packet {
            opcode,
            range: (..packet_length + PACKET_OFFSET),
        })
    }
}

/// Assuming buffer is alocated elsewhere, `Packet` designates subslice in use.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Packet {
    opcode: OpCode,
    range: RangeTo<usize>,
}

impl Packet {
    pub(crate) fn opcode(&self) -> &OpCode {
        &self.opcode
    }

    pub(crate) fn buffer(self, buffer: &[u8]) -> &[u8] {
        buffer[self.range].as_ref()
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Response<'a> {
    pdu: &'a [u8],
}

impl<'a> Response<'a> {
    /// Check the CRC and status byte of a family B response frame and
    /// extract its PDU.
    pub(crate) fn new(buffer: &'a [u8]) -> Result<Self, Error> {
        if buffer.len() < RSP_SIZE_MIN {
            return Err(ErrorKind::RxFail.into());
        }

        let (payload, crc_bytes) = buffer.split_at(buffer.len() - size_of::<u16>());
        let crc = u16::from_be_bytes([crc_bytes[0], crc_bytes[1]]);
        if crc != CRC16.checksum(payload) {
            return Err(ErrorKind::RxCrcError.into());
        }

        let (header, pdu) = payload.split_at(size_of::<u16>() + 1);
        if let Some(status) = Status::from_u8(header[2]) {
            return Err(status.into());
        }

        Ok(Self { pdu })
    }
}

impl<'a> AsRef<[u8]> for Response<'a> {
    fn as_ref(&self) -> &[u8] {
        self.pdu
    }
}
