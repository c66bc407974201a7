//! Canonical serialization and fingerprints.
//!
//! Every persistent object in this crate serializes to a *canonical stream*:
//! a sequence of fields, each prefixed by its bit length as a 64-bit
//! big-endian unsigned integer and followed by the field's minimal big-endian
//! bytes (zero-padded on the left to a whole number of bytes; the zero
//! integer is encoded as an empty field). Fingerprints are SHA-256 digests of
//! such streams, so the serialization format is part of the public interface:
//! fingerprints persist across files and are compared across operators, and
//! any change to the stream layout is a breaking change.

use sha2::{Digest, Sha256};

use num_bigint::BigUint;
use num_traits::Zero;

use std::{error, fmt};

/// Version tag prepended to every on-disk object produced by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// SHA-256 digest of the canonical serialization of an object.
///
/// Two objects are considered equal across operators and processes exactly
/// when their fingerprints are equal. The digest does not reveal secret
/// material as long as the serialized object is public.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Restores a fingerprint from raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("Fingerprint")
            .field(&hex::encode(self.0))
            .finish()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&hex::encode(self.0))
    }
}

/// Errors that can occur when parsing a canonical stream.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SerializationError {
    /// The stream ended before the expected field.
    UnexpectedEof,
    /// The stream carries a format version this build does not understand.
    UnsupportedVersion(u32),
    /// A field is present but malformed (wrong width, non-minimal encoding,
    /// or an out-of-range value). The payload names the offending field.
    InvalidField(&'static str),
}

impl fmt::Display for SerializationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => formatter.write_str("unexpected end of serialized data"),
            Self::UnsupportedVersion(version) => {
                write!(formatter, "unsupported serialization format version {version}")
            }
            Self::InvalidField(name) => write!(formatter, "malformed serialized field `{name}`"),
        }
    }
}

impl error::Error for SerializationError {}

/// Canonical stream writer. The written byte sequence doubles as the
/// fingerprint pre-image for the object being serialized.
#[derive(Debug, Default)]
pub(crate) struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a versioned stream.
    pub fn versioned() -> Self {
        let mut writer = Self::new();
        writer.write_u32(FORMAT_VERSION);
        writer
    }

    fn write_field(&mut self, bit_length: u64, bytes: &[u8]) {
        debug_assert_eq!(bytes.len() as u64, (bit_length + 7) / 8);
        self.bytes.extend_from_slice(&bit_length.to_be_bytes());
        self.bytes.extend_from_slice(bytes);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_field(32, &value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_field(64, &value.to_be_bytes());
    }

    /// Writes an unsigned big integer as its minimal big-endian encoding.
    /// Zero is encoded as an empty field.
    pub fn write_uint(&mut self, value: &BigUint) {
        if value.is_zero() {
            self.write_field(0, &[]);
        } else {
            self.write_field(value.bits(), &value.to_bytes_be());
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_field(bytes.len() as u64 * 8, bytes);
    }

    pub fn write_fingerprint(&mut self, fingerprint: &Fingerprint) {
        self.write_field(256, fingerprint.as_bytes());
    }

    /// Finishes the stream, returning the serialized bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Hashes the stream written so far into a [`Fingerprint`].
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        Fingerprint(hasher.finalize().into())
    }

    /// Reduces the stream hash modulo `modulus`; used for Fiat–Shamir
    /// challenges that must be group scalars.
    pub fn challenge_scalar(&self, modulus: &BigUint) -> BigUint {
        let digest = self.fingerprint();
        BigUint::from_bytes_be(digest.as_bytes()) % modulus
    }
}

/// Canonical stream reader, the mirror image of [`Writer`]. Rejects
/// non-minimal integer encodings so that parsing and re-serializing any
/// object reproduces the input byte-for-byte.
#[derive(Debug)]
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Starts reading a versioned stream, checking the version tag.
    pub fn versioned(bytes: &'a [u8]) -> Result<Self, SerializationError> {
        let mut reader = Self::new(bytes);
        let version = reader.read_u32("version")?;
        if version != FORMAT_VERSION {
            return Err(SerializationError::UnsupportedVersion(version));
        }
        Ok(reader)
    }

    fn read_field(&mut self, name: &'static str) -> Result<(u64, &'a [u8]), SerializationError> {
        if self.bytes.len() < 8 {
            return Err(SerializationError::UnexpectedEof);
        }
        let (len_bytes, rest) = self.bytes.split_at(8);
        let bit_length = u64::from_be_bytes(len_bytes.try_into().expect("split at 8"));
        let byte_length = bit_length
            .checked_add(7)
            .map(|bits| bits / 8)
            .and_then(|bytes| usize::try_from(bytes).ok())
            .ok_or(SerializationError::InvalidField(name))?;
        if rest.len() < byte_length {
            return Err(SerializationError::UnexpectedEof);
        }
        let (field, remaining) = rest.split_at(byte_length);
        self.bytes = remaining;
        Ok((bit_length, field))
    }

    pub fn read_u32(&mut self, name: &'static str) -> Result<u32, SerializationError> {
        let (bit_length, field) = self.read_field(name)?;
        if bit_length != 32 {
            return Err(SerializationError::InvalidField(name));
        }
        Ok(u32::from_be_bytes(field.try_into().expect("32-bit field")))
    }

    pub fn read_u64(&mut self, name: &'static str) -> Result<u64, SerializationError> {
        let (bit_length, field) = self.read_field(name)?;
        if bit_length != 64 {
            return Err(SerializationError::InvalidField(name));
        }
        Ok(u64::from_be_bytes(field.try_into().expect("64-bit field")))
    }

    pub fn read_uint(&mut self, name: &'static str) -> Result<BigUint, SerializationError> {
        let (bit_length, field) = self.read_field(name)?;
        let value = BigUint::from_bytes_be(field);
        if value.bits() != bit_length {
            // Non-minimal encoding would make fingerprints ambiguous.
            return Err(SerializationError::InvalidField(name));
        }
        Ok(value)
    }

    pub fn read_bytes(&mut self, name: &'static str) -> Result<Vec<u8>, SerializationError> {
        let (bit_length, field) = self.read_field(name)?;
        if bit_length % 8 != 0 {
            return Err(SerializationError::InvalidField(name));
        }
        Ok(field.to_vec())
    }

    pub fn read_fingerprint(
        &mut self,
        name: &'static str,
    ) -> Result<Fingerprint, SerializationError> {
        let (bit_length, field) = self.read_field(name)?;
        if bit_length != 256 {
            return Err(SerializationError::InvalidField(name));
        }
        Ok(Fingerprint(field.try_into().expect("256-bit field")))
    }

    /// Checks that the whole input has been consumed.
    pub fn finish(self) -> Result<(), SerializationError> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err(SerializationError::InvalidField("trailing data"))
        }
    }
}
