// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Versioned binary framing shared by every object that crosses a process boundary.
//!
//! ```text
//! ┌───────────┬──────────────┬──────────────┬──────────────────┐
//! │ brand[4]  │ major u16 BE │ minor u16 BE │ body             │
//! └───────────┴──────────────┴──────────────┴──────────────────┘
//! ```
//!
//! Bodies are fixed width fields (points 33 bytes, scalars 32, signatures 65) and
//! `u32 BE length ‖ bytes` for nested objects. Trailing bytes are an error.

use tpre_crypto::{
    CryptoError, Point, PublicKey, Scalar, Signature, POINT_SIZE, SCALAR_SIZE, SIGNATURE_SIZE,
};

use crate::PreError;

pub const HEADER_SIZE: usize = 8;

/// An object with a stable, versioned binary encoding.
pub trait ProtocolObject: Sized {
    const BRAND: [u8; 4];
    const MAJOR: u16 = 1;
    const MINOR: u16 = 0;

    fn write_body(&self, out: &mut Vec<u8>);

    /// `minor` is the minor version found in the header, for bodies that grew fields.
    fn read_body(reader: &mut Reader<'_>, minor: u16) -> Result<Self, PreError>;

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + 128);
        out.extend_from_slice(&Self::BRAND);
        out.extend_from_slice(&Self::MAJOR.to_be_bytes());
        out.extend_from_slice(&Self::MINOR.to_be_bytes());
        self.write_body(&mut out);
        out
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, PreError> {
        let mut reader = Reader::new(bytes);
        let brand: [u8; 4] = reader.array()?;
        if brand != Self::BRAND {
            return Err(encoding("unexpected object brand"));
        }
        let major = reader.u16()?;
        let minor = reader.u16()?;
        if major != Self::MAJOR {
            return Err(PreError::UnsupportedVersion { major, minor });
        }
        let object = Self::read_body(&mut reader, minor)?;
        reader.finish()?;
        Ok(object)
    }
}

pub(crate) fn encoding(reason: &'static str) -> PreError {
    PreError::Crypto(CryptoError::InvalidEncoding(reason))
}

/// Cursor over a received byte string.
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], PreError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| encoding("unexpected end of input"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], PreError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u16(&mut self) -> Result<u16, PreError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, PreError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, PreError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    pub fn point(&mut self) -> Result<Point, PreError> {
        Ok(Point::from_bytes(self.take(POINT_SIZE)?)?)
    }

    pub fn scalar(&mut self) -> Result<Scalar, PreError> {
        Ok(Scalar::from_bytes(self.take(SCALAR_SIZE)?)?)
    }

    pub fn public_key(&mut self) -> Result<PublicKey, PreError> {
        Ok(PublicKey::from_bytes(self.take(POINT_SIZE)?)?)
    }

    pub fn signature(&mut self) -> Result<Signature, PreError> {
        Ok(Signature::from_bytes(self.take(SIGNATURE_SIZE)?)?)
    }

    pub fn var_bytes(&mut self) -> Result<&'a [u8], PreError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    pub fn object<T: ProtocolObject>(&mut self) -> Result<T, PreError> {
        T::from_bytes(self.var_bytes()?)
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn finish(&self) -> Result<(), PreError> {
        if self.pos != self.bytes.len() {
            return Err(encoding("trailing bytes"));
        }
        Ok(())
    }
}

pub(crate) fn put_var(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

pub(crate) fn put_object<T: ProtocolObject>(out: &mut Vec<u8>, object: &T) {
    put_var(out, &object.to_bytes());
}

/// Implements serde for a [`ProtocolObject`] by way of its wire bytes.
macro_rules! impl_serde_via_wire {
    ($ty:ty) => {
        impl serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_bytes(&$crate::ProtocolObject::to_bytes(self))
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let bytes: Vec<u8> = serde::Deserialize::deserialize(deserializer)?;
                <$ty as $crate::ProtocolObject>::from_bytes(&bytes)
                    .map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use impl_serde_via_wire;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Sample(u32);

    impl ProtocolObject for Sample {
        const BRAND: [u8; 4] = *b"TEST";
        const MINOR: u16 = 3;

        fn write_body(&self, out: &mut Vec<u8>) {
            out.extend_from_slice(&self.0.to_be_bytes());
        }

        fn read_body(reader: &mut Reader<'_>, _minor: u16) -> Result<Self, PreError> {
            Ok(Sample(reader.u32()?))
        }
    }

    #[test]
    fn header_layout() {
        let bytes = Sample(7).to_bytes();
        assert_eq!(&bytes[..4], b"TEST");
        assert_eq!(&bytes[4..8], &[0, 1, 0, 3]);
        assert_eq!(&bytes[8..], &[0, 0, 0, 7]);
        assert_eq!(Sample::from_bytes(&bytes).unwrap(), Sample(7));
    }

    #[test]
    fn rejects_wrong_brand_major_and_trailing_bytes() {
        let bytes = Sample(7).to_bytes();

        let mut wrong_brand = bytes.clone();
        wrong_brand[0] = b'X';
        assert!(matches!(
            Sample::from_bytes(&wrong_brand),
            Err(PreError::Crypto(CryptoError::InvalidEncoding(_)))
        ));

        let mut wrong_major = bytes.clone();
        wrong_major[5] = 2;
        assert_eq!(
            Sample::from_bytes(&wrong_major),
            Err(PreError::UnsupportedVersion { major: 2, minor: 3 })
        );

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(Sample::from_bytes(&trailing).is_err());

        assert!(Sample::from_bytes(&bytes[..10]).is_err());
    }

    #[test]
    fn newer_minor_is_accepted() {
        let mut bytes = Sample(9).to_bytes();
        bytes[7] = 9;
        assert_eq!(Sample::from_bytes(&bytes).unwrap(), Sample(9));
    }

    #[test]
    fn var_bytes_respects_length_prefix() {
        let mut out = Vec::new();
        put_var(&mut out, b"abc");
        out.extend_from_slice(b"z");
        let mut reader = Reader::new(&out);
        assert_eq!(reader.var_bytes().unwrap(), b"abc");
        assert!(reader.finish().is_err());
        assert_eq!(reader.take(1).unwrap(), b"z");
        assert!(reader.finish().is_ok());

        let mut overlong = Vec::new();
        overlong.extend_from_slice(&u32::MAX.to_be_bytes());
        assert!(Reader::new(&overlong).var_bytes().is_err());
    }
}
