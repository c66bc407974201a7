//! Re-encryption mixnet: ciphertext collections and the proof of shuffle.
//!
//! A [`CiphertextCollection`] is an append-only list of ciphertexts under a
//! common [`ThresholdPublicKey`]. [`CiphertextCollection::shuffle_with_proof()`]
//! produces a new collection holding the same plaintexts under a secret
//! permutation with fresh encryption randomness, together with a
//! [`ShufflingProof`] that the two collections decrypt to the same multiset
//! — without revealing the permutation or the re-randomizers. Chaining
//! shuffles by independent trustees yields a ciphertext-level anonymous
//! channel: ballots stay verifiable end to end while unlinking voters from
//! votes.
//!
//! The proof is a cut-and-choose argument (Sako–Kilian style) made
//! non-interactive by the Fiat–Shamir transform, with
//! [`CHALLENGE_BITS`] = 128 challenge bits for a soundness error of at most
//! `2^-128`.

use num_bigint::BigUint;
use rand::Rng;
use rand_core::{CryptoRng, RngCore};

use std::{error, fmt, slice};

use crate::{
    encryption::Ciphertext,
    serialization::{Fingerprint, Reader, SerializationError, Writer},
    sharing::ThresholdPublicKey,
};

/// Number of challenge bits in a [`ShufflingProof`]. Each bit corresponds
/// to an independent cut-and-choose round; a forged shuffle survives
/// verification with probability at most `2^-CHALLENGE_BITS`.
pub const CHALLENGE_BITS: usize = 128;

/// Errors produced by collection and shuffle operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The ciphertext belongs to a different cryptosystem than the
    /// collection's threshold key, or its block count differs from the
    /// collection's members.
    IncompatibleCiphertext,
    /// An empty collection cannot be shuffled.
    EmptyCollection,
    /// The shuffling proof failed to verify: wrong shapes, a fingerprint
    /// mismatch, or a failed cut-and-choose round.
    InvalidShuffleProof,
    /// Malformed serialized proof.
    Serialization(SerializationError),
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompatibleCiphertext => {
                formatter.write_str("ciphertext is not compatible with the collection")
            }
            Self::EmptyCollection => formatter.write_str("cannot shuffle an empty collection"),
            Self::InvalidShuffleProof => formatter.write_str("shuffling proof failed to verify"),
            Self::Serialization(err) => write!(formatter, "cannot parse shuffling proof: {err}"),
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

/// A permutation of `0..len` in one-line notation: element `i` of the
/// source moves to position `destination(i)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    forward: Vec<usize>,
}

impl Permutation {
    /// Samples a permutation uniformly at random using the Fisher–Yates
    /// shuffle.
    pub fn generate<R: CryptoRng + RngCore>(len: usize, rng: &mut R) -> Self {
        let mut forward: Vec<usize> = (0..len).collect();
        for i in (1..len).rev() {
            let j = rng.gen_range(0..=i);
            forward.swap(i, j);
        }
        Self { forward }
    }

    /// Builds a permutation from one-line notation; `None` if `forward` is
    /// not a permutation of `0..forward.len()`.
    pub fn from_vec(forward: Vec<usize>) -> Option<Self> {
        let mut seen = vec![false; forward.len()];
        for &destination in &forward {
            if destination >= forward.len() || seen[destination] {
                return None;
            }
            seen[destination] = true;
        }
        Some(Self { forward })
    }

    /// Returns the number of permuted elements.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Checks whether this is the empty permutation.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Returns the destination position of source element `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn destination(&self, index: usize) -> usize {
        self.forward[index]
    }

    /// Returns the one-line notation of this permutation.
    pub fn as_slice(&self) -> &[usize] {
        &self.forward
    }

    /// Returns the inverse permutation.
    pub fn inverse(&self) -> Self {
        let mut inverse = vec![0; self.forward.len()];
        for (source, &destination) in self.forward.iter().enumerate() {
            inverse[destination] = source;
        }
        Self { forward: inverse }
    }
}

/// Append-only ordered collection of ciphertexts under a common threshold
/// public key. All members must share a block count so the collection can
/// be shuffled as a unit.
#[derive(Debug, Clone)]
pub struct CiphertextCollection {
    public_key: ThresholdPublicKey,
    ciphertexts: Vec<Ciphertext>,
}

impl CiphertextCollection {
    /// Creates an empty collection under the given threshold key.
    pub fn new(public_key: ThresholdPublicKey) -> Self {
        Self {
            public_key,
            ciphertexts: Vec::new(),
        }
    }

    /// Returns the threshold public key of this collection.
    pub fn public_key(&self) -> &ThresholdPublicKey {
        &self.public_key
    }

    /// Returns the number of ciphertexts.
    pub fn len(&self) -> usize {
        self.ciphertexts.len()
    }

    /// Checks whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.ciphertexts.is_empty()
    }

    /// Returns the ciphertext at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Ciphertext> {
        self.ciphertexts.get(index)
    }

    /// Iterates over the ciphertexts in insertion order.
    pub fn iter(&self) -> slice::Iter<'_, Ciphertext> {
        self.ciphertexts.iter()
    }

    /// Appends a ciphertext. This is the only mutation a live collection
    /// supports.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::IncompatibleCiphertext`] if the ciphertext
    /// belongs to a different cryptosystem than the collection's key or its
    /// block count differs from the existing members.
    pub fn add_ciphertext(&mut self, ciphertext: Ciphertext) -> Result<(), Error> {
        let expected_fingerprint = self.public_key.cryptosystem().fingerprint();
        if ciphertext.cryptosystem_fingerprint() != expected_fingerprint {
            return Err(Error::IncompatibleCiphertext);
        }
        if let Some(first) = self.ciphertexts.first() {
            if ciphertext.len() != first.len() {
                return Err(Error::IncompatibleCiphertext);
            }
        }
        self.ciphertexts.push(ciphertext);
        Ok(())
    }

    /// Computes the collection fingerprint: the hash of the threshold key
    /// fingerprint followed by the member fingerprints in order.
    pub fn fingerprint(&self) -> Fingerprint {
        collection_fingerprint(&self.public_key.fingerprint(), &self.ciphertexts)
    }

    /// Shuffles this collection: re-encrypts every ciphertext with fresh
    /// randomness, permutes the result uniformly at random, and produces a
    /// [`ShufflingProof`] binding the input to the output.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::EmptyCollection`] if there is nothing to
    /// shuffle.
    pub fn shuffle_with_proof<R: CryptoRng + RngCore>(
        &self,
        rng: &mut R,
    ) -> Result<(Self, ShufflingProof), Error> {
        let count = self.ciphertexts.len();
        if count == 0 {
            return Err(Error::EmptyCollection);
        }
        let cryptosystem = self.public_key.cryptosystem();
        let order = cryptosystem.order();

        // The shuffle itself.
        let permutation = Permutation::generate(count, rng);
        let randomizers = self.sample_randomizers(rng);
        let output = Self {
            public_key: self.public_key.clone(),
            ciphertexts: self.apply(&permutation, &randomizers, reencrypt_block),
        };

        // Commit to the intermediate collections of every cut-and-choose
        // round before deriving the challenge.
        let mut rounds = Vec::with_capacity(CHALLENGE_BITS);
        let mut intermediate_fingerprints = Vec::with_capacity(CHALLENGE_BITS);
        for _ in 0..CHALLENGE_BITS {
            let round_permutation = Permutation::generate(count, rng);
            let round_randomizers = self.sample_randomizers(rng);
            let intermediate = self.apply(&round_permutation, &round_randomizers, reencrypt_block);
            intermediate_fingerprints
                .push(collection_fingerprint(&self.public_key.fingerprint(), &intermediate));
            rounds.push((round_permutation, round_randomizers));
        }

        let input_fingerprint = self.fingerprint();
        let output_fingerprint = output.fingerprint();
        let public_key_fingerprint = self.public_key.fingerprint();
        let challenge = challenge_bytes(
            &input_fingerprint,
            &output_fingerprint,
            &public_key_fingerprint,
            &intermediate_fingerprints,
        );

        let responses = rounds
            .into_iter()
            .enumerate()
            .map(|(round, (round_permutation, round_randomizers))| {
                if !challenge_bit(&challenge, round) {
                    // Open the round: the verifier re-creates the
                    // intermediate collection from the input.
                    ShuffleResponse::Source {
                        permutation: round_permutation,
                        randomizers: round_randomizers,
                    }
                } else {
                    // Bridge the round to the output: reveal only the
                    // *difference* between the real shuffle and the round
                    // shuffle, which leaks neither.
                    let round_inverse = round_permutation.inverse();
                    let bridge = Permutation::from_vec(
                        (0..count)
                            .map(|index| permutation.destination(round_inverse.destination(index)))
                            .collect(),
                    )
                    .expect("composition of permutations is a permutation");
                    let adjusted: Vec<Vec<BigUint>> = (0..count)
                        .map(|index| {
                            let source = round_inverse.destination(index);
                            randomizers[source]
                                .iter()
                                .zip(&round_randomizers[source])
                                .map(|(r, rho)| (r + order - rho) % order)
                                .collect()
                        })
                        .collect();
                    ShuffleResponse::Target {
                        permutation: bridge,
                        randomizers: adjusted,
                    }
                }
            })
            .collect();

        let proof = ShufflingProof {
            input_fingerprint,
            output_fingerprint,
            public_key_fingerprint,
            intermediate_fingerprints,
            responses,
        };
        Ok((output, proof))
    }

    /// Fresh re-randomizers in `[1, q - 1]`, one per (ciphertext, block).
    fn sample_randomizers<R: CryptoRng + RngCore>(&self, rng: &mut R) -> Vec<Vec<BigUint>> {
        let cryptosystem = self.public_key.cryptosystem();
        self.ciphertexts
            .iter()
            .map(|ciphertext| {
                (0..ciphertext.len())
                    .map(|_| cryptosystem.random_scalar(rng))
                    .collect()
            })
            .collect()
    }

    /// Applies a permutation and per-block randomizers to the members,
    /// transforming each block with `transform`.
    fn apply(
        &self,
        permutation: &Permutation,
        randomizers: &[Vec<BigUint>],
        transform: BlockTransform,
    ) -> Vec<Ciphertext> {
        let mut transformed: Vec<Option<Ciphertext>> = vec![None; self.ciphertexts.len()];
        for (index, ciphertext) in self.ciphertexts.iter().enumerate() {
            let destination = permutation.destination(index);
            transformed[destination] = Some(transform_ciphertext(
                &self.public_key,
                ciphertext,
                &randomizers[index],
                transform,
            ));
        }
        transformed
            .into_iter()
            .map(|ciphertext| ciphertext.expect("permutation covers every destination"))
            .collect()
    }
}

impl<'a> IntoIterator for &'a CiphertextCollection {
    type Item = &'a Ciphertext;
    type IntoIter = slice::Iter<'a, Ciphertext>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

type BlockTransform = fn(&ThresholdPublicKey, &BigUint, &BigUint, &BigUint) -> (BigUint, BigUint);

/// `(gamma, delta) -> (gamma * g^r, delta * Y^r)`.
fn reencrypt_block(
    public_key: &ThresholdPublicKey,
    gamma: &BigUint,
    delta: &BigUint,
    randomizer: &BigUint,
) -> (BigUint, BigUint) {
    let cryptosystem = public_key.cryptosystem();
    (
        cryptosystem.mul(gamma, &cryptosystem.pow_generator(randomizer)),
        cryptosystem.mul(delta, &cryptosystem.pow(public_key.element(), randomizer)),
    )
}

/// Inverse of [`reencrypt_block`]: strips a known re-encryption.
fn unreencrypt_block(
    public_key: &ThresholdPublicKey,
    gamma: &BigUint,
    delta: &BigUint,
    randomizer: &BigUint,
) -> (BigUint, BigUint) {
    let cryptosystem = public_key.cryptosystem();
    (
        cryptosystem.mul(gamma, &cryptosystem.inv(&cryptosystem.pow_generator(randomizer))),
        cryptosystem.mul(
            delta,
            &cryptosystem.inv(&cryptosystem.pow(public_key.element(), randomizer)),
        ),
    )
}

fn transform_ciphertext(
    public_key: &ThresholdPublicKey,
    ciphertext: &Ciphertext,
    randomizers: &[BigUint],
    transform: BlockTransform,
) -> Ciphertext {
    let mut transformed = Ciphertext::new(
        *ciphertext.cryptosystem_fingerprint(),
        ciphertext.bit_length(),
    );
    for (block, randomizer) in ciphertext.blocks().zip(randomizers) {
        let (gamma, delta) = transform(public_key, block.gamma(), block.delta(), randomizer);
        transformed.append(gamma, delta);
    }
    transformed
}

fn collection_fingerprint(public_key_fingerprint: &Fingerprint, members: &[Ciphertext]) -> Fingerprint {
    let mut writer = Writer::new();
    writer.write_fingerprint(public_key_fingerprint);
    for member in members {
        writer.write_fingerprint(&member.fingerprint());
    }
    writer.fingerprint()
}

/// Fiat–Shamir challenge: SHA-256 over the input, output and key
/// fingerprints plus all round commitments, truncated to
/// [`CHALLENGE_BITS`] bits.
fn challenge_bytes(
    input: &Fingerprint,
    output: &Fingerprint,
    public_key: &Fingerprint,
    intermediates: &[Fingerprint],
) -> [u8; CHALLENGE_BITS / 8] {
    let mut writer = Writer::new();
    writer.write_fingerprint(input);
    writer.write_fingerprint(output);
    writer.write_fingerprint(public_key);
    for intermediate in intermediates {
        writer.write_fingerprint(intermediate);
    }
    let digest = writer.fingerprint();
    digest.as_bytes()[..CHALLENGE_BITS / 8]
        .try_into()
        .expect("digest is longer than the challenge")
}

/// Bit `index` of the challenge, MSB first.
fn challenge_bit(challenge: &[u8; CHALLENGE_BITS / 8], index: usize) -> bool {
    challenge[index / 8] >> (7 - index % 8) & 1 == 1
}

/// Response for one cut-and-choose round.
#[derive(Debug, Clone, PartialEq)]
enum ShuffleResponse {
    /// Challenge bit 0: reveal the round shuffle itself. The verifier
    /// re-applies it to the input collection.
    Source {
        permutation: Permutation,
        randomizers: Vec<Vec<BigUint>>,
    },
    /// Challenge bit 1: reveal the bridge from the round's intermediate
    /// collection to the output. The verifier strips the bridge from the
    /// output to recover the intermediate collection.
    Target {
        permutation: Permutation,
        randomizers: Vec<Vec<BigUint>>,
    },
}

impl ShuffleResponse {
    fn tag(&self) -> u32 {
        match self {
            Self::Source { .. } => 0,
            Self::Target { .. } => 1,
        }
    }

    fn parts(&self) -> (&Permutation, &Vec<Vec<BigUint>>) {
        match self {
            Self::Source {
                permutation,
                randomizers,
            }
            | Self::Target {
                permutation,
                randomizers,
            } => (permutation, randomizers),
        }
    }
}

/// Non-interactive zero-knowledge proof that one [`CiphertextCollection`]
/// is a permutation and re-encryption of another.
///
/// # Construction
///
/// The prover who shuffled `A` into `B` with permutation `pi` and
/// randomizers `r` runs [`CHALLENGE_BITS`] independent rounds. In round
/// `l` it samples a fresh shuffle `(sigma_l, rho_l)`, applies it to `A` to
/// obtain the intermediate collection `M_l`, and commits to `M_l` by its
/// fingerprint. Only after all commitments are fixed is the challenge
/// derived by hashing `(A, B, Y, M_0 .. M_{t-1})` fingerprints, one bit
/// per round:
///
/// - bit 0: reveal `(sigma_l, rho_l)`; the verifier checks that applying
///   them to `A` reproduces `M_l`.
/// - bit 1: reveal the bridge `(pi ∘ sigma_l^{-1}, r - rho_l)`; the
///   verifier checks that it carries `M_l` to `B`.
///
/// Each round leaks either a random shuffle unrelated to `pi` or the
/// composition of `pi` with one, so nothing about `pi` or `r` is revealed;
/// yet a prover who did not actually shuffle can satisfy at most one
/// branch per round, so forging the proof requires guessing all
/// [`CHALLENGE_BITS`] challenge bits in advance.
#[derive(Debug, Clone, PartialEq)]
pub struct ShufflingProof {
    input_fingerprint: Fingerprint,
    output_fingerprint: Fingerprint,
    public_key_fingerprint: Fingerprint,
    intermediate_fingerprints: Vec<Fingerprint>,
    responses: Vec<ShuffleResponse>,
}

impl ShufflingProof {
    /// Returns the fingerprint of the input collection.
    pub fn input_fingerprint(&self) -> &Fingerprint {
        &self.input_fingerprint
    }

    /// Returns the fingerprint of the output collection.
    pub fn output_fingerprint(&self) -> &Fingerprint {
        &self.output_fingerprint
    }

    /// Returns the fingerprint of the threshold public key.
    pub fn public_key_fingerprint(&self) -> &Fingerprint {
        &self.public_key_fingerprint
    }

    /// Verifies that `output` is a permutation and re-encryption of
    /// `input`.
    ///
    /// The verifier recomputes both collection fingerprints, reconstructs
    /// the intermediate collection of every round from the revealed branch,
    /// compares it against the committed fingerprint, and finally re-derives
    /// the challenge to confirm each round answered the branch it was
    /// actually asked.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidShuffleProof`] on any mismatch.
    pub fn verify(
        &self,
        input: &CiphertextCollection,
        output: &CiphertextCollection,
    ) -> Result<(), Error> {
        let count = input.len();
        if count == 0
            || output.len() != count
            || self.intermediate_fingerprints.len() != CHALLENGE_BITS
            || self.responses.len() != CHALLENGE_BITS
        {
            return Err(Error::InvalidShuffleProof);
        }
        let public_key_fingerprint = input.public_key().fingerprint();
        if output.public_key().fingerprint() != public_key_fingerprint
            || self.public_key_fingerprint != public_key_fingerprint
            || self.input_fingerprint != input.fingerprint()
            || self.output_fingerprint != output.fingerprint()
        {
            return Err(Error::InvalidShuffleProof);
        }

        let cryptosystem = input.public_key().cryptosystem();
        let order = cryptosystem.order();
        let block_count = input.get(0).expect("count > 0").len();
        let challenge = challenge_bytes(
            &self.input_fingerprint,
            &self.output_fingerprint,
            &self.public_key_fingerprint,
            &self.intermediate_fingerprints,
        );

        for (round, response) in self.responses.iter().enumerate() {
            if challenge_bit(&challenge, round) != (response.tag() == 1) {
                return Err(Error::InvalidShuffleProof);
            }
            let (permutation, randomizers) = response.parts();
            let well_formed = permutation.len() == count
                && randomizers.len() == count
                && randomizers.iter().all(|per_block| {
                    per_block.len() == block_count
                        && per_block.iter().all(|randomizer| randomizer < order)
                });
            if !well_formed {
                return Err(Error::InvalidShuffleProof);
            }

            let intermediate = match response {
                ShuffleResponse::Source {
                    permutation,
                    randomizers,
                } => input.apply(permutation, randomizers, reencrypt_block),
                ShuffleResponse::Target {
                    permutation,
                    randomizers,
                } => {
                    // M[i] = unreenc(B[bridge(i)], adjusted[i]), so that
                    // reenc(M, bridge, adjusted) == B.
                    (0..count)
                        .map(|index| {
                            let target = output
                                .get(permutation.destination(index))
                                .expect("count checked above");
                            transform_ciphertext(
                                input.public_key(),
                                target,
                                &randomizers[index],
                                unreencrypt_block,
                            )
                        })
                        .collect()
                }
            };

            let reconstructed =
                collection_fingerprint(&self.public_key_fingerprint, &intermediate);
            if reconstructed != self.intermediate_fingerprints[round] {
                return Err(Error::InvalidShuffleProof);
            }
        }
        Ok(())
    }

    /// Serializes this proof as
    /// `(version, input fp, output fp, key fp, [M_l fp], [responses])`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::versioned();
        writer.write_fingerprint(&self.input_fingerprint);
        writer.write_fingerprint(&self.output_fingerprint);
        writer.write_fingerprint(&self.public_key_fingerprint);
        writer.write_u64(self.intermediate_fingerprints.len() as u64);
        for fingerprint in &self.intermediate_fingerprints {
            writer.write_fingerprint(fingerprint);
        }
        for response in &self.responses {
            let (permutation, randomizers) = response.parts();
            writer.write_u32(response.tag());
            writer.write_u64(permutation.len() as u64);
            for index in 0..permutation.len() {
                writer.write_u64(permutation.destination(index) as u64);
            }
            for per_ciphertext in randomizers {
                writer.write_u64(per_ciphertext.len() as u64);
                for randomizer in per_ciphertext {
                    writer.write_uint(randomizer);
                }
            }
        }
        writer.into_bytes()
    }

    /// Parses a proof serialized by [`Self::to_bytes()`]. Structural only;
    /// call [`Self::verify()`] against the collections to check it.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Serialization`] on malformed input (including
    /// response tables that are not permutations).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::versioned(bytes)?;
        let input_fingerprint = reader.read_fingerprint("input")?;
        let output_fingerprint = reader.read_fingerprint("output")?;
        let public_key_fingerprint = reader.read_fingerprint("public_key")?;
        let round_count = reader.read_u64("round_count")?;
        let round_count = usize::try_from(round_count)
            .map_err(|_| SerializationError::InvalidField("round_count"))?;

        let intermediate_fingerprints = (0..round_count)
            .map(|_| reader.read_fingerprint("intermediate"))
            .collect::<Result<Vec<_>, _>>()?;

        let mut responses = Vec::with_capacity(round_count);
        for _ in 0..round_count {
            let tag = reader.read_u32("response_tag")?;
            let count = reader.read_u64("ciphertext_count")?;
            let count = usize::try_from(count)
                .map_err(|_| SerializationError::InvalidField("ciphertext_count"))?;

            let mut forward = Vec::with_capacity(count);
            for _ in 0..count {
                let destination = reader.read_u64("destination")?;
                forward.push(
                    usize::try_from(destination)
                        .map_err(|_| SerializationError::InvalidField("destination"))?,
                );
            }
            let permutation = Permutation::from_vec(forward)
                .ok_or(SerializationError::InvalidField("permutation"))?;

            let mut randomizers = Vec::with_capacity(count);
            for _ in 0..count {
                let block_count = reader.read_u64("block_count")?;
                let block_count = usize::try_from(block_count)
                    .map_err(|_| SerializationError::InvalidField("block_count"))?;
                let per_ciphertext = (0..block_count)
                    .map(|_| reader.read_uint("randomizer"))
                    .collect::<Result<Vec<_>, _>>()?;
                randomizers.push(per_ciphertext);
            }

            responses.push(match tag {
                0 => ShuffleResponse::Source {
                    permutation,
                    randomizers,
                },
                1 => ShuffleResponse::Target {
                    permutation,
                    randomizers,
                },
                _ => return Err(SerializationError::InvalidField("response_tag").into()),
            });
        }
        reader.finish()?;

        Ok(Self {
            input_fingerprint,
            output_fingerprint,
            public_key_fingerprint,
            intermediate_fingerprints,
            responses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    use crate::group::test_params::test_cryptosystem_256;
    use crate::sharing::{Params, ThresholdEncryptionSetUp, ThresholdPublicKey};

    fn threshold_public_key() -> ThresholdPublicKey {
        let mut rng = thread_rng();
        let cryptosystem = test_cryptosystem_256();
        let params = Params::new(3, 2);
        let keypairs: Vec<_> = (0..3).map(|_| cryptosystem.keypair(&mut rng)).collect();

        let mut setup = ThresholdEncryptionSetUp::new(cryptosystem.clone(), params);
        for (i, keypair) in keypairs.iter().enumerate() {
            setup.add_trustee_public_key(i, keypair.public().clone()).unwrap();
        }
        let own = setup.generate_commitment(0, &mut rng).unwrap();
        setup.add_trustee_commitment(0, own).unwrap();
        for trustee in 1..3 {
            let mut other = ThresholdEncryptionSetUp::new(cryptosystem.clone(), params);
            for (i, keypair) in keypairs.iter().enumerate() {
                other.add_trustee_public_key(i, keypair.public().clone()).unwrap();
            }
            let commitment = other.generate_commitment(trustee, &mut rng).unwrap();
            setup.add_trustee_commitment(trustee, commitment).unwrap();
        }
        setup.generate_public_key().unwrap()
    }

    fn sample_collection(public_key: &ThresholdPublicKey, votes: &[&str]) -> CiphertextCollection {
        let mut rng = thread_rng();
        let mut collection = CiphertextCollection::new(public_key.clone());
        for vote in votes {
            collection
                .add_ciphertext(public_key.encrypt_text(vote, &mut rng))
                .unwrap();
        }
        collection
    }

    #[test]
    fn permutation_generation_and_inverse() {
        let mut rng = thread_rng();
        let permutation = Permutation::generate(10, &mut rng);

        let mut destinations: Vec<_> = permutation.as_slice().to_vec();
        destinations.sort_unstable();
        assert_eq!(destinations, (0..10).collect::<Vec<_>>());

        let inverse = permutation.inverse();
        for index in 0..10 {
            assert_eq!(inverse.destination(permutation.destination(index)), index);
        }
    }

    #[test]
    fn invalid_one_line_notations_are_rejected() {
        assert!(Permutation::from_vec(vec![0, 1, 2]).is_some());
        assert!(Permutation::from_vec(vec![]).is_some());
        assert!(Permutation::from_vec(vec![0, 0, 2]).is_none());
        assert!(Permutation::from_vec(vec![1, 2, 3]).is_none());
    }

    #[test]
    fn collection_rejects_incompatible_ciphertexts() {
        let mut rng = thread_rng();
        let public_key = threshold_public_key();
        let mut collection = sample_collection(&public_key, &["vote A", "vote B"]);

        // Different block count: a two-block message.
        let long = public_key.encrypt_bytes(&[0_u8; 40], &mut rng);
        assert_eq!(
            collection.add_ciphertext(long).unwrap_err(),
            Error::IncompatibleCiphertext
        );

        // Different cryptosystem.
        let foreign = crate::group::Cryptosystem::generate_with_min_bits(128, 128, &mut rng)
            .unwrap()
            .keypair(&mut rng)
            .public()
            .encrypt_text("alien", &mut rng);
        assert_eq!(
            collection.add_ciphertext(foreign).unwrap_err(),
            Error::IncompatibleCiphertext
        );
    }

    #[test]
    fn honest_shuffle_verifies() {
        let mut rng = thread_rng();
        let public_key = threshold_public_key();
        let collection = sample_collection(&public_key, &["vote A", "vote B", "vote C"]);

        let (shuffled, proof) = collection.shuffle_with_proof(&mut rng).unwrap();
        assert_eq!(shuffled.len(), collection.len());
        proof.verify(&collection, &shuffled).unwrap();

        // A shuffle of the shuffle also verifies, and the proofs chain by
        // fingerprint.
        let (twice, second_proof) = shuffled.shuffle_with_proof(&mut rng).unwrap();
        second_proof.verify(&shuffled, &twice).unwrap();
        assert_eq!(
            *second_proof.input_fingerprint(),
            shuffled.fingerprint()
        );
    }

    #[test]
    fn proof_does_not_transfer_to_other_collections() {
        let mut rng = thread_rng();
        let public_key = threshold_public_key();
        let collection = sample_collection(&public_key, &["vote A", "vote B", "vote C"]);

        let (shuffled, proof) = collection.shuffle_with_proof(&mut rng).unwrap();

        // Unrelated collection of the same size.
        let other = sample_collection(&public_key, &["vote A", "vote B", "vote C"]);
        assert_eq!(
            proof.verify(&other, &shuffled).unwrap_err(),
            Error::InvalidShuffleProof
        );
        assert_eq!(
            proof.verify(&shuffled, &collection).unwrap_err(),
            Error::InvalidShuffleProof
        );
    }

    #[test]
    fn replacing_one_ciphertext_breaks_the_proof() {
        let mut rng = thread_rng();
        let public_key = threshold_public_key();
        let collection = sample_collection(&public_key, &["vote A", "vote B", "vote C"]);

        let (shuffled, proof) = collection.shuffle_with_proof(&mut rng).unwrap();

        // Swap in a fresh encryption of one of the same plaintexts; the
        // multiset of votes is unchanged but the proof must still reject.
        let mut tampered = CiphertextCollection::new(public_key.clone());
        for (index, ciphertext) in shuffled.iter().enumerate() {
            let ciphertext = if index == 1 {
                public_key.encrypt_text("vote A", &mut rng)
            } else {
                ciphertext.clone()
            };
            tampered.add_ciphertext(ciphertext).unwrap();
        }
        assert_eq!(
            proof.verify(&collection, &tampered).unwrap_err(),
            Error::InvalidShuffleProof
        );
    }

    #[test]
    fn tampered_commitments_break_the_proof() {
        let mut rng = thread_rng();
        let public_key = threshold_public_key();
        let collection = sample_collection(&public_key, &["vote A", "vote B"]);

        let (shuffled, proof) = collection.shuffle_with_proof(&mut rng).unwrap();

        // Altering a committed intermediate fingerprint after the fact
        // changes the re-derived challenge and is rejected.
        let mut tampered = proof.clone();
        tampered.intermediate_fingerprints[0] = tampered.intermediate_fingerprints[1];
        assert_eq!(
            tampered.verify(&collection, &shuffled).unwrap_err(),
            Error::InvalidShuffleProof
        );

        // Swapping a response between rounds breaks the round check.
        let mut tampered = proof.clone();
        tampered.responses.swap(0, 1);
        assert!(tampered.verify(&collection, &shuffled).is_err());
    }

    #[test]
    fn proof_serialization_round_trip() {
        let mut rng = thread_rng();
        let public_key = threshold_public_key();
        let collection = sample_collection(&public_key, &["vote A", "vote B"]);

        let (shuffled, proof) = collection.shuffle_with_proof(&mut rng).unwrap();
        let bytes = proof.to_bytes();
        let restored = ShufflingProof::from_bytes(&bytes).unwrap();
        assert_eq!(restored, proof);
        assert_eq!(restored.to_bytes(), bytes);
        restored.verify(&collection, &shuffled).unwrap();
    }
}
