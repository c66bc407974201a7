//! Block ciphertexts for ElGamal encryption of arbitrary byte messages.

use num_bigint::BigUint;
use rand_core::{CryptoRng, RngCore};

use std::slice;

use crate::{
    bitstream::BitStream,
    group::Cryptosystem,
    keys::Error,
    serialization::{Fingerprint, Reader, SerializationError, Writer},
};

/// One ElGamal block `(gamma, delta) = (g^r, h^r * (b + 1))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiphertextBlock {
    gamma: BigUint,
    delta: BigUint,
}

impl CiphertextBlock {
    pub(crate) fn new(gamma: BigUint, delta: BigUint) -> Self {
        Self { gamma, delta }
    }

    /// Returns the random element `gamma = g^r`.
    pub fn gamma(&self) -> &BigUint {
        &self.gamma
    }

    /// Returns the blinded element `delta = h^r * (b + 1)`.
    pub fn delta(&self) -> &BigUint {
        &self.delta
    }
}

/// Ciphertext of a byte message under a fixed cryptosystem: an ordered
/// sequence of ElGamal blocks plus the message bit length.
///
/// A message of `L` bits is split into `ceil(L / (nbits - 1))` blocks of
/// `nbits - 1` bits each; only the final block is padded (with zero bits on
/// the right), and the recorded bit length lets decryption discard the
/// padding. Ciphertexts are immutable once produced; voters compare the
/// [fingerprint](Self::fingerprint) against their receipts to confirm the
/// stored ballot is the one they cast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    cryptosystem_fingerprint: Fingerprint,
    bit_length: u64,
    blocks: Vec<CiphertextBlock>,
}

impl Ciphertext {
    pub(crate) fn new(cryptosystem_fingerprint: Fingerprint, bit_length: u64) -> Self {
        Self {
            cryptosystem_fingerprint,
            bit_length,
            blocks: Vec::new(),
        }
    }

    /// Appends a block. Used by encryption and by the re-encryption shuffle;
    /// ciphertexts never change once handed out.
    pub(crate) fn append(&mut self, gamma: BigUint, delta: BigUint) {
        self.blocks.push(CiphertextBlock::new(gamma, delta));
    }

    /// Returns the number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Checks whether the ciphertext has no blocks (encryption of the empty
    /// message).
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns the bit length of the encrypted message.
    pub fn bit_length(&self) -> u64 {
        self.bit_length
    }

    /// Returns the fingerprint of the cryptosystem this ciphertext was
    /// produced under.
    pub fn cryptosystem_fingerprint(&self) -> &Fingerprint {
        &self.cryptosystem_fingerprint
    }

    /// Iterates over the ElGamal blocks in order.
    pub fn blocks(&self) -> slice::Iter<'_, CiphertextBlock> {
        self.blocks.iter()
    }

    /// Computes the ciphertext fingerprint over
    /// `(cryptosystem fingerprint, bit length, blocks)`.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut writer = Writer::new();
        writer.write_fingerprint(&self.cryptosystem_fingerprint);
        writer.write_u64(self.bit_length);
        for block in &self.blocks {
            writer.write_uint(&block.gamma);
            writer.write_uint(&block.delta);
        }
        writer.fingerprint()
    }

    /// Serializes this ciphertext as
    /// `(version, cryptosystem fingerprint, L, m, blocks)`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::versioned();
        writer.write_fingerprint(&self.cryptosystem_fingerprint);
        writer.write_u64(self.bit_length);
        writer.write_u64(self.blocks.len() as u64);
        for block in &self.blocks {
            writer.write_uint(&block.gamma);
            writer.write_uint(&block.delta);
        }
        writer.into_bytes()
    }

    /// Parses a ciphertext serialized by [`Self::to_bytes()`]. The check is
    /// structural; group membership of the blocks is established by the
    /// decryption and proof layers that consume them.
    ///
    /// # Errors
    ///
    /// Fails with [`SerializationError`] on malformed input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        let mut reader = Reader::versioned(bytes)?;
        let cryptosystem_fingerprint = reader.read_fingerprint("cryptosystem")?;
        let bit_length = reader.read_u64("bit_length")?;
        let block_count = reader.read_u64("block_count")?;
        let block_count = usize::try_from(block_count)
            .map_err(|_| SerializationError::InvalidField("block_count"))?;

        let mut ciphertext = Self::new(cryptosystem_fingerprint, bit_length);
        for _ in 0..block_count {
            let gamma = reader.read_uint("gamma")?;
            let delta = reader.read_uint("delta")?;
            ciphertext.append(gamma, delta);
        }
        reader.finish()?;
        Ok(ciphertext)
    }
}

impl<'a> IntoIterator for &'a Ciphertext {
    type Item = &'a CiphertextBlock;
    type IntoIter = slice::Iter<'a, CiphertextBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks()
    }
}

/// Encrypts `message` under the public element `h` (a single-recipient key
/// or a threshold key).
///
/// Each block `b` of `nbits - 1` bits becomes `(g^r, h^r * (b + 1))` with a
/// fresh `r` uniform in `[1, q - 1]`; the `+ 1` injection keeps the blinded
/// factor nonzero for every block value.
pub(crate) fn encrypt_with_element<R: CryptoRng + RngCore>(
    cryptosystem: &Cryptosystem,
    h: &BigUint,
    message: &[u8],
    rng: &mut R,
) -> Ciphertext {
    let width = u64::from(cryptosystem.nbits() - 1);
    let mut stream = BitStream::new();
    stream.put_bytes(message);
    let bit_length = stream.len();
    stream.seek(0).expect("position 0 is always valid");

    let mut ciphertext = Ciphertext::new(*cryptosystem.fingerprint(), bit_length);
    let mut remaining = bit_length;
    while remaining > 0 {
        let take = remaining.min(width);
        let mut block = stream.get_uint(take).expect("stream holds `remaining` bits");
        if take < width {
            // Final block: zero-pad on the right up to the block width.
            block <<= width - take;
        }

        let r = cryptosystem.random_scalar(rng);
        let gamma = cryptosystem.pow_generator(&r);
        let delta = cryptosystem.mul(&cryptosystem.pow(h, &r), &(block + 1_u32));
        ciphertext.append(gamma, delta);
        remaining -= take;
    }
    ciphertext
}

/// Recovers a block value from `delta` and the unblinding mask
/// (`gamma^x` for direct decryption, or the Lagrange-combined `D` for
/// threshold decryption): `b = delta * mask^{-1} - 1 (mod p)`.
pub(crate) fn recover_block(
    cryptosystem: &Cryptosystem,
    delta: &BigUint,
    mask: &BigUint,
) -> Result<BigUint, Error> {
    let unblinded = cryptosystem.mul(delta, &cryptosystem.inv(mask));
    if unblinded == BigUint::from(0_u32) {
        // delta was 0, which no honest encryption produces.
        return Err(Error::InvalidCiphertext);
    }
    Ok(unblinded - 1_u32)
}

/// Reassembles the plaintext bytes from decrypted block values, truncating
/// the final block's padding according to the recorded bit length.
pub(crate) fn assemble_plaintext(
    cryptosystem: &Cryptosystem,
    bit_length: u64,
    values: &[BigUint],
) -> Result<Vec<u8>, Error> {
    let width = u64::from(cryptosystem.nbits() - 1);
    let expected_blocks = if bit_length == 0 {
        0
    } else {
        (bit_length - 1) / width + 1
    };
    if values.len() as u64 != expected_blocks || bit_length % 8 != 0 {
        return Err(Error::InvalidCiphertext);
    }

    let mut stream = BitStream::new();
    for value in values {
        stream
            .put_uint(value, width)
            .map_err(|_| Error::InvalidCiphertext)?;
    }
    stream.seek(0).expect("position 0 is always valid");
    let byte_length = usize::try_from(bit_length / 8).map_err(|_| Error::InvalidCiphertext)?;
    stream
        .get_bytes(byte_length)
        .map_err(|_| Error::InvalidCiphertext)
}
