//! Verifiable partial decryption and threshold combination.

use num_bigint::BigUint;
use num_traits::{One, Zero};

use std::{error, fmt};

use crate::{
    encryption::{self, Ciphertext},
    group::Cryptosystem,
    keys::Error as KeyError,
    proofs::LogEqualityProof,
    serialization::{Fingerprint, Reader, SerializationError, Writer},
    sharing::ThresholdPublicKey,
};

/// Errors that can occur while combining partial decryptions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The ciphertext belongs to a different cryptosystem than the
    /// threshold key.
    IncompatibleCiphertext,
    /// The partial decryption refers to a different threshold key,
    /// ciphertext, or trustee set than this combinator.
    MismatchedPartialDecryption,
    /// A partial decryption from this trustee was already accepted.
    DuplicateShare(usize),
    /// A per-block Chaum–Pedersen proof failed to verify; the partial
    /// decryption is forged or corrupted.
    InvalidPartialDecryptionProof,
    /// Fewer than `k` partial decryptions have been accepted.
    NotEnoughShares,
    /// The combined plaintext is inconsistent with the ciphertext's
    /// bit-length header.
    InvalidCiphertext,
    /// Malformed serialized partial decryption.
    Serialization(SerializationError),
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompatibleCiphertext => {
                formatter.write_str("ciphertext belongs to a different cryptosystem")
            }
            Self::MismatchedPartialDecryption => {
                formatter.write_str("partial decryption refers to a different key or ciphertext")
            }
            Self::DuplicateShare(index) => write!(
                formatter,
                "partial decryption of trustee {index} was already accepted"
            ),
            Self::InvalidPartialDecryptionProof => {
                formatter.write_str("partial decryption proof failed to verify")
            }
            Self::NotEnoughShares => {
                formatter.write_str("fewer partial decryptions than the threshold")
            }
            Self::InvalidCiphertext => formatter.write_str("combined plaintext is inconsistent"),
            Self::Serialization(err) => {
                write!(formatter, "cannot parse partial decryption: {err}")
            }
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

/// One trustee's contribution to decrypting a single ciphertext: per block,
/// the element `d = gamma^{s_i}` together with a Chaum–Pedersen proof of
/// `log_g(Y_i) = log_gamma(d)`.
///
/// Produced by [`ThresholdPrivateKey::partial_decryption()`] and consumed
/// by [`ThresholdDecryptionCombinator::add_partial_decryption()`], which
/// verifies every proof before accepting the contribution.
///
/// [`ThresholdPrivateKey::partial_decryption()`]:
/// crate::sharing::ThresholdPrivateKey::partial_decryption
#[derive(Debug, Clone, PartialEq)]
pub struct PartialDecryption {
    trustee_index: usize,
    cryptosystem_fingerprint: Fingerprint,
    public_key_fingerprint: Fingerprint,
    ciphertext_fingerprint: Fingerprint,
    blocks: Vec<PartialDecryptionBlock>,
}

/// Per-block payload of a [`PartialDecryption`].
#[derive(Debug, Clone, PartialEq)]
pub struct PartialDecryptionBlock {
    element: BigUint,
    proof: LogEqualityProof,
}

impl PartialDecryptionBlock {
    /// Returns the partial decryption element `d = gamma^{s_i}`.
    pub fn element(&self) -> &BigUint {
        &self.element
    }

    /// Returns the proof of correct partial decryption.
    pub fn proof(&self) -> &LogEqualityProof {
        &self.proof
    }
}

impl PartialDecryption {
    pub(crate) fn new(
        trustee_index: usize,
        cryptosystem_fingerprint: Fingerprint,
        public_key_fingerprint: Fingerprint,
        ciphertext_fingerprint: Fingerprint,
        blocks: Vec<(BigUint, LogEqualityProof)>,
    ) -> Self {
        Self {
            trustee_index,
            cryptosystem_fingerprint,
            public_key_fingerprint,
            ciphertext_fingerprint,
            blocks: blocks
                .into_iter()
                .map(|(element, proof)| PartialDecryptionBlock { element, proof })
                .collect(),
        }
    }

    /// Returns the 0-based index of the contributing trustee.
    pub fn trustee_index(&self) -> usize {
        self.trustee_index
    }

    /// Returns the fingerprint of the threshold public key this partial
    /// decryption was produced under.
    pub fn public_key_fingerprint(&self) -> &Fingerprint {
        &self.public_key_fingerprint
    }

    /// Returns the fingerprint of the target ciphertext.
    pub fn ciphertext_fingerprint(&self) -> &Fingerprint {
        &self.ciphertext_fingerprint
    }

    /// Returns the number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Checks whether the partial decryption has no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterates over the per-block payloads in order.
    pub fn blocks(&self) -> std::slice::Iter<'_, PartialDecryptionBlock> {
        self.blocks.iter()
    }

    /// Serializes this partial decryption as
    /// `(version, cryptosystem fp, key fp, ciphertext fp, i,
    /// [(d, t1, t2, u)])`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::versioned();
        writer.write_fingerprint(&self.cryptosystem_fingerprint);
        writer.write_fingerprint(&self.public_key_fingerprint);
        writer.write_fingerprint(&self.ciphertext_fingerprint);
        writer.write_u64(self.trustee_index as u64);
        writer.write_u64(self.blocks.len() as u64);
        for block in &self.blocks {
            writer.write_uint(&block.element);
            writer.write_uint(block.proof.commitment_generator());
            writer.write_uint(block.proof.commitment_base());
            writer.write_uint(block.proof.response());
        }
        writer.into_bytes()
    }

    /// Parses a partial decryption serialized by [`Self::to_bytes()`]. The
    /// check is structural; the proofs are verified when the value is added
    /// to a combinator.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Serialization`] on malformed input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::versioned(bytes)?;
        let cryptosystem_fingerprint = reader.read_fingerprint("cryptosystem")?;
        let public_key_fingerprint = reader.read_fingerprint("public_key")?;
        let ciphertext_fingerprint = reader.read_fingerprint("ciphertext")?;
        let trustee_index = reader.read_u64("trustee_index")?;
        let trustee_index = usize::try_from(trustee_index)
            .map_err(|_| SerializationError::InvalidField("trustee_index"))?;
        let block_count = reader.read_u64("block_count")?;
        let block_count = usize::try_from(block_count)
            .map_err(|_| SerializationError::InvalidField("block_count"))?;

        let mut blocks = Vec::with_capacity(block_count);
        for _ in 0..block_count {
            let element = reader.read_uint("element")?;
            let commitment_generator = reader.read_uint("commitment_generator")?;
            let commitment_base = reader.read_uint("commitment_base")?;
            let response = reader.read_uint("response")?;
            blocks.push((
                element,
                LogEqualityProof::from_parts(commitment_generator, commitment_base, response),
            ));
        }
        reader.finish()?;

        Ok(Self::new(
            trustee_index,
            cryptosystem_fingerprint,
            public_key_fingerprint,
            ciphertext_fingerprint,
            blocks,
        ))
    }
}

/// Computes the Lagrange coefficients
/// `lambda_i = prod_{j != i} (j+1) * ((j+1) - (i+1))^{-1} mod q` for the
/// 0-based trustee `indexes`, tracking the sign of the denominator product
/// separately since the arithmetic lives in the unsigned residue ring.
fn lagrange_coefficients(cryptosystem: &Cryptosystem, indexes: &[usize]) -> Vec<BigUint> {
    let order = cryptosystem.order();
    indexes
        .iter()
        .map(|&index| {
            let mut numerator = BigUint::one();
            let mut denominator = BigUint::one();
            let mut negative = false;
            for &other in indexes {
                if other == index {
                    continue;
                }
                numerator = numerator * BigUint::from(other as u64 + 1) % order;
                let difference = if other > index {
                    other - index
                } else {
                    negative = !negative;
                    index - other
                };
                denominator = denominator * BigUint::from(difference as u64) % order;
            }

            let mut coefficient =
                numerator * cryptosystem.inv_exponent(&denominator) % order;
            if negative && !coefficient.is_zero() {
                coefficient = order - coefficient;
            }
            coefficient
        })
        .collect()
}

/// Accumulator that verifies partial decryptions for one ciphertext and,
/// once `k` trustees have contributed, recovers the plaintext by Lagrange
/// interpolation in the exponent.
///
/// # Examples
///
/// See the [crate-level docs](crate#threshold-decryption) for the full
/// threshold flow; the combinator is its final step:
///
/// ```text
/// let mut combinator = ThresholdDecryptionCombinator::new(public, ciphertext)?;
/// for trustee in cooperating_trustees {
///     combinator.add_partial_decryption(trustee.partial_decryption(...)?)?;
/// }
/// let plaintext = combinator.decrypt_to_bytes()?;
/// ```
#[derive(Debug, Clone)]
pub struct ThresholdDecryptionCombinator {
    public_key: ThresholdPublicKey,
    ciphertext: Ciphertext,
    ciphertext_fingerprint: Fingerprint,
    shares: Vec<Option<PartialDecryption>>,
}

impl ThresholdDecryptionCombinator {
    /// Creates a combinator for the given ciphertext under the given
    /// threshold key.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::IncompatibleCiphertext`] if the ciphertext
    /// belongs to a different cryptosystem.
    pub fn new(
        public_key: ThresholdPublicKey,
        ciphertext: Ciphertext,
    ) -> Result<Self, Error> {
        if ciphertext.cryptosystem_fingerprint() != public_key.cryptosystem().fingerprint() {
            return Err(Error::IncompatibleCiphertext);
        }
        let trustees = public_key.params().trustees;
        let ciphertext_fingerprint = ciphertext.fingerprint();
        Ok(Self {
            public_key,
            ciphertext,
            ciphertext_fingerprint,
            shares: vec![None; trustees],
        })
    }

    /// Returns the number of accepted partial decryptions.
    pub fn share_count(&self) -> usize {
        self.shares.iter().filter(|share| share.is_some()).count()
    }

    /// Verifies and accepts one trustee's partial decryption. Every
    /// per-block proof is checked against the trustee's verification key
    /// `Y_i` and the block's `gamma` before the contribution is stored.
    ///
    /// # Errors
    ///
    /// - [`Error::MismatchedPartialDecryption`] if the contribution targets
    ///   a different key or ciphertext, has the wrong block count, or an
    ///   out-of-range trustee index.
    /// - [`Error::DuplicateShare`] if this trustee already contributed.
    /// - [`Error::InvalidPartialDecryptionProof`] if any proof fails; a
    ///   single failed proof indicates fraud or corruption and rejects the
    ///   whole contribution.
    pub fn add_partial_decryption(&mut self, share: PartialDecryption) -> Result<(), Error> {
        let trustee = share.trustee_index;
        if trustee >= self.public_key.params().trustees
            || share.public_key_fingerprint != self.public_key.fingerprint()
            || share.ciphertext_fingerprint != self.ciphertext_fingerprint
            || share.blocks.len() != self.ciphertext.len()
        {
            return Err(Error::MismatchedPartialDecryption);
        }
        if self.shares[trustee].is_some() {
            return Err(Error::DuplicateShare(trustee));
        }

        let cryptosystem = self.public_key.cryptosystem();
        let verification_key = self.public_key.verification_key(trustee);
        for (block, ciphertext_block) in share.blocks.iter().zip(self.ciphertext.blocks()) {
            let valid = block.proof.verify(
                cryptosystem,
                ciphertext_block.gamma(),
                verification_key,
                &block.element,
            );
            if !valid {
                return Err(Error::InvalidPartialDecryptionProof);
            }
        }

        self.shares[trustee] = Some(share);
        Ok(())
    }

    /// Recovers the plaintext from the accepted partial decryptions.
    ///
    /// The `k` smallest contributing trustee indices form the
    /// interpolation set; per block, the combined unblinding mask is
    /// `D = prod_i d_i^{lambda_i}` and the block value is
    /// `delta * D^{-1} - 1`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotEnoughShares`] if fewer than `k` trustees
    /// contributed and [`Error::InvalidCiphertext`] if the recovered
    /// blocks do not match the ciphertext's bit-length header.
    pub fn decrypt_to_bytes(&self) -> Result<Vec<u8>, Error> {
        let threshold = self.public_key.params().threshold;
        let indexes: Vec<usize> = self
            .shares
            .iter()
            .enumerate()
            .filter_map(|(index, share)| share.as_ref().map(|_| index))
            .take(threshold)
            .collect();
        if indexes.len() < threshold {
            return Err(Error::NotEnoughShares);
        }

        let cryptosystem = self.public_key.cryptosystem();
        let coefficients = lagrange_coefficients(cryptosystem, &indexes);

        let values = (0..self.ciphertext.len())
            .map(|block| {
                let mut mask = BigUint::one();
                for (&index, coefficient) in indexes.iter().zip(&coefficients) {
                    let share = self.shares[index].as_ref().expect("index was collected");
                    let element = &share.blocks[block].element;
                    mask = cryptosystem.mul(&mask, &cryptosystem.pow(element, coefficient));
                }
                let delta = self
                    .ciphertext
                    .blocks()
                    .nth(block)
                    .expect("block index in range")
                    .delta();
                encryption::recover_block(cryptosystem, delta, &mask)
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_key_error)?;

        encryption::assemble_plaintext(cryptosystem, self.ciphertext.bit_length(), &values)
            .map_err(map_key_error)
    }

    /// Recovers a text plaintext; see [`Self::decrypt_to_bytes()`].
    ///
    /// # Errors
    ///
    /// As [`Self::decrypt_to_bytes()`], plus [`Error::InvalidCiphertext`]
    /// if the plaintext is not valid UTF-8.
    pub fn decrypt_to_text(&self) -> Result<String, Error> {
        let bytes = self.decrypt_to_bytes()?;
        String::from_utf8(bytes).map_err(|_| Error::InvalidCiphertext)
    }
}

fn map_key_error(err: KeyError) -> Error {
    match err {
        KeyError::Serialization(err) => Error::Serialization(err),
        _ => Error::InvalidCiphertext,
    }
}
