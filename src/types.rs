//! Fixed-size values exchanged with the secure element.

use crate::error::{Error, ErrorKind};
use core::convert::TryFrom;
use generic_array::typenum::{U32, U4, U64, U9};
use generic_array::GenericArray;

macro_rules! value_type {
    ($(#[$meta:meta])* $name:ident, $size:ty) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
        pub struct $name {
            pub(crate) value: GenericArray<u8, $size>,
        }

        impl $name {
            pub const LEN: usize = <$size as generic_array::typenum::Unsigned>::USIZE;
        }

        impl TryFrom<&[u8]> for $name {
            type Error = Error;
            fn try_from(buffer: &[u8]) -> Result<Self, Self::Error> {
                if buffer.len() != Self::LEN {
                    return Err(ErrorKind::BadParam.into());
                }

                let mut value = Self::default();
                value.as_mut().copy_from_slice(buffer);
                Ok(value)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                self.value.as_ref()
            }
        }

        impl AsMut<[u8]> for $name {
            fn as_mut(&mut self) -> &mut [u8] {
                self.value.as_mut()
            }
        }
    };
}

value_type!(
    /// Raw 4 bytes. When it is a return value of `info`, it contains the
    /// device's revision number.
    Word,
    U4
);

value_type!(
    /// Raw 32 bytes. Random output and block reads come in this shape.
    Block,
    U32
);

value_type!(
    /// Serial number consisting of 9 bytes. Its uniqueness is guaranteed.
    Serial,
    U9
);

value_type!(
    /// Uncompressed P-256 point without the SEC1 tag, X || Y.
    PublicKey,
    U64
);

value_type!(
    /// ECDSA P-256 signature as R || S.
    Signature,
    U64
);

value_type!(
    /// Output of ECDH. Only produced when the device is configured to
    /// release it.
    SharedSecret,
    U32
);

value_type!(
    /// A digest yielded from SHA-256 or a 32-byte challenge.
    Digest,
    U32
);

impl Serial {
    /// Assemble from the first block of the configuration zone, where the
    /// serial is split across bytes 0..4 and 8..13.
    pub(crate) fn from_config_block(block: &[u8]) -> Result<Self, Error> {
        if block.len() < 13 {
            return Err(ErrorKind::BadParam.into());
        }

        let mut value = Self::default();
        value.as_mut()[0..4].copy_from_slice(&block[0..4]);
        value.as_mut()[4..9].copy_from_slice(&block[8..13]);
        Ok(value)
    }
}

impl PublicKey {
    pub fn x(&self) -> &[u8] {
        &self.value[..32]
    }

    pub fn y(&self) -> &[u8] {
        &self.value[32..]
    }
}

impl Signature {
    pub fn r(&self) -> &[u8] {
        &self.value[..32]
    }

    pub fn s(&self) -> &[u8] {
        &self.value[32..]
    }
}

impl From<p256::ecdsa::Signature> for Signature {
    fn from(signature: p256::ecdsa::Signature) -> Self {
        let mut value = Self::default();
        value.as_mut().copy_from_slice(signature.to_bytes().as_ref());
        value
    }
}

impl TryFrom<Signature> for p256::ecdsa::Signature {
    type Error = Error;
    fn try_from(signature: Signature) -> Result<Self, Self::Error> {
        p256::ecdsa::Signature::from_slice(signature.as_ref())
            .map_err(|_| ErrorKind::DecodingError.into())
    }
}
