use core::fmt;

/// An error type covering both secure element status bytes and conditions
/// detected on the host side.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Error {
    repr: Repr,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Repr {
    Device(Status),
    Simple(ErrorKind),
}

impl Error {
    /// Uniform status code. Device status bytes are folded into the matching
    /// kind so callers branch on a single enumeration.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            Repr::Simple(kind) => kind,
            Repr::Device(status) => status.kind(),
        }
    }

    /// Raw status reported by the device, if the error came from one.
    pub fn device_status(&self) -> Option<Status> {
        match self.repr {
            Repr::Device(status) => Some(status),
            Repr::Simple(_) => None,
        }
    }

    /// Numeric code, never zero.
    pub fn code(&self) -> u32 {
        self.kind() as u32
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            repr: Repr::Simple(kind),
        }
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Error {
        Error {
            repr: Repr::Device(status),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Device(status) => write!(fmt, "{}", status.as_str()),
            Repr::Simple(kind) => write!(fmt, "{}", kind.as_str()),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Non-zero status byte carried by a 4-byte response frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    /// response status byte indicates CheckMac failure (status byte = 0x01)
    CheckmacVerifyFailed = 0x01,
    /// chip was in a state where it could not execute the command, response
    /// status byte indicates command execution error (status byte = 0x0F)
    Execution = 0x0F,
    /// response status byte indicates parsing error (status byte = 0x03)
    Parse = 0x03,
    /// response status byte indicates Device did not receive data properly
    /// (status byte = 0xFF)
    Crc = 0xFF,
    /// response status byte is unknown
    Unknown = 0xD5,
    /// response status byte is Ecc fault (status byte = 0x05)
    Ecc = 0x05,
    /// response status byte is Self Test Error, chip in failure mode (status
    /// byte = 0x07)
    SelfTest = 0x07,
    /// random number generator health test error
    HealthTest = 0x08,
}

impl Status {
    /// `None` for the success byte.
    pub fn from_u8(status: u8) -> Option<Self> {
        use Status::*;
        match status {
            0x00 => None,
            x if x == CheckmacVerifyFailed as u8 => CheckmacVerifyFailed.into(),
            x if x == Execution as u8 => Execution.into(),
            x if x == Parse as u8 => Parse.into(),
            x if x == Crc as u8 => Crc.into(),
            x if x == Ecc as u8 => Ecc.into(),
            x if x == SelfTest as u8 => SelfTest.into(),
            x if x == HealthTest as u8 => HealthTest.into(),
            _ => Unknown.into(),
        }
    }

    fn kind(&self) -> ErrorKind {
        use Status::*;
        match self {
            CheckmacVerifyFailed => ErrorKind::VerifyFailed,
            Execution => ErrorKind::ExecutionError,
            Parse => ErrorKind::ParseError,
            Crc => ErrorKind::StatusCrc,
            Ecc => ErrorKind::StatusEcc,
            SelfTest => ErrorKind::StatusSelftestError,
            HealthTest => ErrorKind::HealthTestError,
            Unknown => ErrorKind::StatusUnknown,
        }
    }

    fn as_str(&self) -> &'static str {
        use Status::*;
        match self {
            CheckmacVerifyFailed => "checkmac or verify failed",
            Crc => "bad crc found (command not properly received by device) or other comm error",
            Ecc => "computation error during ECC processing causing invalid results",
            Execution => "chip can't execute the command",
            HealthTest => "random number generator health test error",
            Parse => "command received byte length, opcode or parameter was illegal",
            SelfTest => "chip is in self test failure mode",
            Unknown => "response contains unknown non-zero status byte",
        }
    }
}

/// A list of specific error causes. Each kind is converted into `Error` type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// Code failed run-time consistency check
    AssertFailure = 0xF6,
    /// Certificate is structurally inconsistent with its definition
    BadCert = 0x0B,
    /// opcode is not supported by the device
    BadOpcode = 0xF2,
    /// bad argument (out of range, missing, wrong length, etc.)
    BadParam = 0xE2,
    /// Communication with device failed. Same as in hardware dependent modules.
    CommFail = 0xF0,
    /// Signature or other encoded value could not be decoded
    DecodingError = 0x0C,
    /// chip was in a state where it could not execute the command, response
    /// status byte indicates command execution error (status byte = 0x0F)
    ExecutionError = 0xF4,
    /// Function could not execute due to incorrect condition / state.
    FuncFail = 0xE0,
    /// unspecified error
    GenFail = 0xE1,
    /// random number generator health test error
    HealthTestError = 0xFA,
    /// invalid device id, id not set
    InvalidId = 0xE3,
    /// Count value is out of range or greater than buffer size.
    InvalidSize = 0xE4,
    /// No session is open or the bound device type is unknown
    NotInitialized = 0xF3,
    /// required zone was not locked
    NotLocked = 0xF8,
    /// response status byte indicates parsing error (status byte = 0x03)
    ParseError = 0xD2,
    /// Crc error in data received from device
    RxCrcError = 0xE5,
    /// Timed out while waiting for response. Number of bytes received is > 0.
    RxFail = 0xE6,
    /// Supplied buffer is too small for data required
    SmallBuffer = 0xED,
    /// response status byte indicates Device did not receive data properly
    /// (status byte = 0xFF)
    StatusCrc = 0xD4,
    /// response status byte is Ecc fault (status byte = 0x05)
    StatusEcc = 0xD6,
    /// response status byte is Self Test Error, chip in failure mode (status
    /// byte = 0x07)
    StatusSelftestError = 0xD7,
    /// response status byte is unknown
    StatusUnknown = 0xD5,
    /// Timed out while waiting for response. Number of bytes received is 0.
    Timeout = 0xF1,
    /// Device did not respond too many times during a transmission. Could
    /// indicate no device present.
    TooManyCommRetries = 0xEC,
    /// Failed to write
    TxFail = 0xF7,
    /// The bound device family has no implementation of the operation
    Unimplemented = 0xF5,
    /// Signature does not match the message under the given key
    VerifyFailed = 0x0D,
    /// Device did not respond to wake call as expected
    WakeFailed = 0xD0,
}

impl ErrorKind {
    fn as_str(&self) -> &'static str {
        use ErrorKind::*;
        match self {
            AssertFailure => "failed run-time consistency check",
            BadCert => "certificate does not match its definition",
            BadOpcode => "opcode is not supported by the device",
            BadParam => "bad argument (out of range, missing, wrong length, etc.)",
            CommFail => "communication with device failed",
            DecodingError => "encoded value could not be decoded",
            ExecutionError => "chip can't execute the command",
            FuncFail => "function could not execute due to incorrect condition / state",
            GenFail => "unspecified error",
            HealthTestError => "random number generator health test error",
            InvalidId => "invalid device id, id not set",
            InvalidSize => "count value is out of range or greater than buffer size",
            NotInitialized => "no device is open",
            NotLocked => "required zone was not locked",
            ParseError => "command received byte length, opcode or parameter was illegal",
            RxCrcError => "crc error in data received from device",
            RxFail => "timed out while waiting for response. Number of bytes received is > 0",
            SmallBuffer => "supplied buffer is too small for data required",
            StatusCrc => "bad crc found (command not properly received by device)",
            StatusEcc => "computation error during ECC processing causing invalid results",
            StatusSelftestError => "chip is in self test failure mode",
            StatusUnknown => "response contains unknown non-zero status byte",
            Timeout => "timed out while waiting for response",
            TooManyCommRetries => {
                "device did not respond too many times, indicating no device present"
            }
            TxFail => "failed to write",
            Unimplemented => "operation is not implemented for the bound device",
            VerifyFailed => "signature verification failed",
            WakeFailed => "device did not respond to wake call as expected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_from_u8() {
        assert_eq!(Status::from_u8(0x00), None);
        assert_eq!(Status::from_u8(0x01), Some(Status::CheckmacVerifyFailed));
        assert_eq!(Status::from_u8(0x0F), Some(Status::Execution));
        assert_eq!(Status::from_u8(0x42), Some(Status::Unknown));
    }

    #[test]
    fn device_status_folds_into_kind() {
        let verify = Error::from(Status::CheckmacVerifyFailed);
        assert_eq!(verify.kind(), ErrorKind::VerifyFailed);
        assert_eq!(verify.device_status(), Some(Status::CheckmacVerifyFailed));

        let execution = Error::from(Status::Execution);
        assert_eq!(execution.kind(), ErrorKind::ExecutionError);
        assert_ne!(execution.kind(), verify.kind());
    }

    #[test]
    fn simple_kind_roundtrip() {
        let err = Error::from(ErrorKind::NotInitialized);
        assert_eq!(err.kind(), ErrorKind::NotInitialized);
        assert_eq!(err.device_status(), None);
        assert_eq!(err.code(), 0xF3);
    }
}
