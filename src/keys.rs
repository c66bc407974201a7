//! Cryptographic keys for single-recipient ElGamal encryption.

use num_bigint::BigUint;
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use std::{error, fmt};

use crate::{
    encryption::{self, Ciphertext},
    group::Cryptosystem,
    serialization::{Fingerprint, Reader, SerializationError, Writer},
};

/// Errors produced by key operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The key and the ciphertext (or another key) belong to different
    /// cryptosystems.
    IncompatibleCryptosystem,
    /// A serialized public key does not represent an element of the
    /// order-`q` subgroup.
    InvalidPublicKey,
    /// A serialized secret key scalar is outside `[1, q - 1]`.
    InvalidSecretKey,
    /// The ciphertext is inconsistent: its bit-length header does not match
    /// its block count, or a decrypted block does not fit the block width.
    InvalidCiphertext,
    /// Malformed serialized data.
    Serialization(SerializationError),
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompatibleCryptosystem => {
                formatter.write_str("key and ciphertext belong to different cryptosystems")
            }
            Self::InvalidPublicKey => {
                formatter.write_str("public key is not an element of the order-q subgroup")
            }
            Self::InvalidSecretKey => {
                formatter.write_str("secret key scalar is out of range")
            }
            Self::InvalidCiphertext => formatter.write_str("ciphertext is inconsistent"),
            Self::Serialization(err) => write!(formatter, "cannot parse key: {err}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SerializationError> for Error {
    fn from(err: SerializationError) -> Self {
        Self::Serialization(err)
    }
}

/// Public key for ElGamal encryption: an element `h = g^x` of the order-`q`
/// subgroup, bound to its [`Cryptosystem`].
#[derive(Clone)]
pub struct PublicKey {
    cryptosystem: Cryptosystem,
    element: BigUint,
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("PublicKey")
            .field(&hex::encode(self.element.to_bytes_be()))
            .finish()
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.cryptosystem == other.cryptosystem && self.element == other.element
    }
}

impl PublicKey {
    pub(crate) fn from_element(cryptosystem: Cryptosystem, element: BigUint) -> Self {
        Self {
            cryptosystem,
            element,
        }
    }

    /// Returns the group element `h` of this key.
    pub fn element(&self) -> &BigUint {
        &self.element
    }

    /// Returns the cryptosystem this key is bound to.
    pub fn cryptosystem(&self) -> &Cryptosystem {
        &self.cryptosystem
    }

    /// Encrypts an arbitrary byte message as a sequence of ElGamal blocks.
    ///
    /// The message is split into blocks of `nbits - 1` bits; the ciphertext
    /// records the message bit length so decryption can discard the padding
    /// of the final block.
    pub fn encrypt_bytes<R: CryptoRng + RngCore>(&self, message: &[u8], rng: &mut R) -> Ciphertext {
        encryption::encrypt_with_element(&self.cryptosystem, &self.element, message, rng)
    }

    /// Encrypts a text message; see [`Self::encrypt_bytes()`].
    pub fn encrypt_text<R: CryptoRng + RngCore>(&self, message: &str, rng: &mut R) -> Ciphertext {
        self.encrypt_bytes(message.as_bytes(), rng)
    }

    /// Serializes this key as `(version, cryptosystem fingerprint, h)`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::versioned();
        writer.write_fingerprint(self.cryptosystem.fingerprint());
        writer.write_uint(&self.element);
        writer.into_bytes()
    }

    /// Parses a key serialized by [`Self::to_bytes()`].
    ///
    /// # Errors
    ///
    /// Fails with [`Error::IncompatibleCryptosystem`] if the embedded
    /// fingerprint does not match `cryptosystem`, and with
    /// [`Error::InvalidPublicKey`] if the element is not in the subgroup.
    pub fn from_bytes(cryptosystem: &Cryptosystem, bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::versioned(bytes)?;
        let fingerprint = reader.read_fingerprint("cryptosystem")?;
        let element = reader.read_uint("element")?;
        reader.finish()?;

        if fingerprint != *cryptosystem.fingerprint() {
            return Err(Error::IncompatibleCryptosystem);
        }
        if !cryptosystem.is_group_element(&element) {
            return Err(Error::InvalidPublicKey);
        }
        Ok(Self::from_element(cryptosystem.clone(), element))
    }
}

/// Secret key for ElGamal encryption: a scalar `x` in `[1, q - 1]`.
#[derive(Clone)]
pub struct SecretKey {
    cryptosystem: Cryptosystem,
    scalar: BigUint,
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SecretKey")
            .field("public", &PublicKey::from(self))
            .finish()
    }
}

impl SecretKey {
    pub(crate) fn new(cryptosystem: Cryptosystem, scalar: BigUint) -> Self {
        SecretKey {
            cryptosystem,
            scalar,
        }
    }

    pub(crate) fn scalar(&self) -> &BigUint {
        &self.scalar
    }

    /// Returns the cryptosystem this key is bound to.
    pub fn cryptosystem(&self) -> &Cryptosystem {
        &self.cryptosystem
    }

    /// Decrypts a ciphertext produced with the matching [`PublicKey`].
    ///
    /// # Errors
    ///
    /// Fails with [`Error::IncompatibleCryptosystem`] if the ciphertext was
    /// produced under a different cryptosystem, and with
    /// [`Error::InvalidCiphertext`] if the ciphertext structure is
    /// inconsistent with its bit-length header.
    pub fn decrypt_to_bytes(&self, ciphertext: &Ciphertext) -> Result<Vec<u8>, Error> {
        if ciphertext.cryptosystem_fingerprint() != self.cryptosystem.fingerprint() {
            return Err(Error::IncompatibleCryptosystem);
        }

        let values = ciphertext
            .blocks()
            .map(|block| {
                let mask = self.cryptosystem.pow(block.gamma(), &self.scalar);
                encryption::recover_block(&self.cryptosystem, block.delta(), &mask)
            })
            .collect::<Result<Vec<_>, _>>()?;
        encryption::assemble_plaintext(&self.cryptosystem, ciphertext.bit_length(), &values)
    }

    /// Decrypts a ciphertext of a text message.
    ///
    /// # Errors
    ///
    /// As [`Self::decrypt_to_bytes()`], plus [`Error::InvalidCiphertext`]
    /// if the plaintext is not valid UTF-8.
    pub fn decrypt_to_text(&self, ciphertext: &Ciphertext) -> Result<String, Error> {
        let bytes = self.decrypt_to_bytes(ciphertext)?;
        String::from_utf8(bytes).map_err(|_| Error::InvalidCiphertext)
    }

    /// Serializes this key as `(version, cryptosystem fingerprint, x)`.
    /// The returned buffer contains secret material; callers should zeroize
    /// it after use.
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut writer = Writer::versioned();
        writer.write_fingerprint(self.cryptosystem.fingerprint());
        writer.write_uint(&self.scalar);
        Zeroizing::new(writer.into_bytes())
    }

    /// Parses a key serialized by [`Self::to_bytes()`].
    ///
    /// # Errors
    ///
    /// Fails with [`Error::IncompatibleCryptosystem`] on a fingerprint
    /// mismatch and [`Error::InvalidSecretKey`] if the scalar is outside
    /// `[1, q - 1]`.
    pub fn from_bytes(cryptosystem: &Cryptosystem, bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::versioned(bytes)?;
        let fingerprint = reader.read_fingerprint("cryptosystem")?;
        let scalar = reader.read_uint("scalar")?;
        reader.finish()?;

        if fingerprint != *cryptosystem.fingerprint() {
            return Err(Error::IncompatibleCryptosystem);
        }
        if scalar == BigUint::from(0_u32) || scalar >= *cryptosystem.order() {
            return Err(Error::InvalidSecretKey);
        }
        Ok(Self::new(cryptosystem.clone(), scalar))
    }
}

impl From<&SecretKey> for PublicKey {
    fn from(secret_key: &SecretKey) -> Self {
        let element = secret_key.cryptosystem.pow_generator(&secret_key.scalar);
        Self::from_element(secret_key.cryptosystem.clone(), element)
    }
}

/// Keypair for ElGamal encryption, consisting of a [`SecretKey`] and the
/// matching [`PublicKey`]. Create one with [`Cryptosystem::keypair()`].
#[derive(Clone)]
pub struct Keypair {
    secret: SecretKey,
    public: PublicKey,
}

impl fmt::Debug for Keypair {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Keypair")
            .field("public", &self.public)
            .finish()
    }
}

impl Keypair {
    /// Returns the public part of this keypair.
    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    /// Returns the secret part of this keypair.
    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    /// Returns public and secret keys comprising this keypair.
    pub fn into_tuple(self) -> (PublicKey, SecretKey) {
        (self.public, self.secret)
    }
}

impl From<SecretKey> for Keypair {
    fn from(secret: SecretKey) -> Self {
        Self {
            public: PublicKey::from(&secret),
            secret,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    use crate::group::test_params::test_cryptosystem_256;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let mut rng = thread_rng();
        let cryptosystem = test_cryptosystem_256();
        let keypair = cryptosystem.keypair(&mut rng);

        for message in [
            &b""[..],
            b"a",
            b"short ballot",
            &[0_u8; 100],
            &[0xff_u8; 33],
        ] {
            let ciphertext = keypair.public().encrypt_bytes(message, &mut rng);
            let decrypted = keypair.secret().decrypt_to_bytes(&ciphertext).unwrap();
            assert_eq!(decrypted, message);
        }
    }

    #[test]
    fn text_round_trip() {
        let mut rng = thread_rng();
        let keypair = test_cryptosystem_256().keypair(&mut rng);

        let ciphertext = keypair.public().encrypt_text("Dummy vote #0", &mut rng);
        assert_eq!(
            keypair.secret().decrypt_to_text(&ciphertext).unwrap(),
            "Dummy vote #0"
        );
    }

    #[test]
    fn decryption_with_foreign_key_fails() {
        let mut rng = thread_rng();
        let cryptosystem = test_cryptosystem_256();
        let keypair = cryptosystem.keypair(&mut rng);
        let other = Cryptosystem::generate_with_min_bits(128, 128, &mut rng)
            .unwrap()
            .keypair(&mut rng);

        let ciphertext = keypair.public().encrypt_bytes(b"secret", &mut rng);
        assert_eq!(
            other.secret().decrypt_to_bytes(&ciphertext).unwrap_err(),
            Error::IncompatibleCryptosystem
        );
    }

    #[test]
    fn public_key_serialization_round_trip() {
        let mut rng = thread_rng();
        let cryptosystem = test_cryptosystem_256();
        let keypair = cryptosystem.keypair(&mut rng);

        let bytes = keypair.public().to_bytes();
        let restored = PublicKey::from_bytes(&cryptosystem, &bytes).unwrap();
        assert_eq!(restored, *keypair.public());
    }

    #[test]
    fn secret_key_serialization_round_trip() {
        let mut rng = thread_rng();
        let cryptosystem = test_cryptosystem_256();
        let keypair = cryptosystem.keypair(&mut rng);

        let bytes = keypair.secret().to_bytes();
        let restored = SecretKey::from_bytes(&cryptosystem, &bytes).unwrap();
        assert_eq!(restored.scalar(), keypair.secret().scalar());
    }

    #[test]
    fn loading_non_group_element_fails() {
        let cryptosystem = test_cryptosystem_256();

        // p - 1 is in Z*_p but has order 2, not q.
        let mut writer = crate::serialization::Writer::versioned();
        writer.write_fingerprint(cryptosystem.fingerprint());
        writer.write_uint(&(cryptosystem.prime() - 1_u32));
        let err = PublicKey::from_bytes(&cryptosystem, &writer.into_bytes()).unwrap_err();
        assert_eq!(err, Error::InvalidPublicKey);
    }
}
