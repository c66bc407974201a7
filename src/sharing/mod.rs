//! Distributed threshold key generation for ElGamal encryption.
//!
//! The scheme follows Pedersen-style verifiable secret sharing run without a
//! trusted dealer: every trustee acts as a dealer of its own random
//! polynomial, and the threshold secret is the (never materialized) sum of
//! all polynomials' constant terms. Private channels between trustees are
//! realized as ElGamal encryption of each share under the recipient's
//! personal public key, so the whole exchange can run through an untrusted
//! bulletin board.
//!
//! # Protocol outline
//!
//! **Inputs:** the shared [`Cryptosystem`], the number of trustees `n`, and
//! the decryption threshold `k` with `2 <= k <= n`.
//!
//! 1. Every trustee registers every trustee's personal public key with its
//!    own [`ThresholdEncryptionSetUp`] instance.
//! 2. Every trustee generates a [`ThresholdEncryptionCommitment`]: public
//!    coefficients `A_t = g^{a_t}` of a random degree-`k-1` polynomial `f`,
//!    plus `f(i + 1)` encrypted for every other trustee `i`.
//! 3. Commitments are published; every trustee registers all `n` of them
//!    and compares the setup [fingerprint](ThresholdEncryptionSetUp::fingerprint)
//!    with every other trustee out of band. Matching fingerprints guarantee
//!    all trustees derive keys from the same commitment set.
//! 4. Every trustee decrypts the shares addressed to it, verifies each one
//!    against the issuer's public coefficients (the VSS check
//!    `g^{f_j(i+1)} == prod_t A_{j,t}^{(i+1)^t}`), and sums them into its
//!    threshold private share. Anyone can compute the
//!    [`ThresholdPublicKey`] from the commitments alone.
//!
//! A failed VSS check identifies the offending trustee by index; the
//! protocol treats this as evidence of fraud or corruption and never
//! attempts recovery.
//!
//! # Examples
//!
//! Threshold scheme requiring 2 of 3 trustees:
//!
//! ```
//! # use modp_elgamal::{group::Cryptosystem, sharing::{Params, ThresholdEncryptionSetUp}};
//! # use rand::thread_rng;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut rng = thread_rng();
//! let cryptosystem = Cryptosystem::generate_with_min_bits(256, 256, &mut rng)?;
//! let params = Params::new(3, 2);
//!
//! let keypairs: Vec<_> = (0..3).map(|_| cryptosystem.keypair(&mut rng)).collect();
//! let mut setups: Vec<_> = (0..3)
//!     .map(|_| ThresholdEncryptionSetUp::new(cryptosystem.clone(), params))
//!     .collect();
//! for setup in &mut setups {
//!     for (i, keypair) in keypairs.iter().enumerate() {
//!         setup.add_trustee_public_key(i, keypair.public().clone())?;
//!     }
//! }
//!
//! // Each trustee generates and publishes a commitment...
//! let commitments: Vec<_> = setups
//!     .iter_mut()
//!     .enumerate()
//!     .map(|(i, setup)| setup.generate_commitment(i, &mut rng))
//!     .collect::<Result<_, _>>()?;
//! // ...and registers everyone's commitments.
//! for setup in &mut setups {
//!     for (j, commitment) in commitments.iter().enumerate() {
//!         setup.add_trustee_commitment(j, commitment.clone())?;
//!     }
//! }
//!
//! // Trustee 0 derives its threshold keypair.
//! let keypair = setups[0].generate_keypair(0, keypairs[0].secret())?;
//! let ciphertext = keypair.public().encrypt_text("tally me", &mut rng);
//! # let _ = ciphertext;
//! # Ok(())
//! # }
//! ```

use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand_core::{CryptoRng, RngCore};

use std::{error, fmt};

use crate::{
    bitstream::BitStream,
    encryption::Ciphertext,
    group::Cryptosystem,
    keys::{PublicKey, SecretKey},
    serialization::{Fingerprint, Reader, SerializationError, Writer},
};

mod key_set;
pub use self::key_set::{ThresholdKeypair, ThresholdPrivateKey, ThresholdPublicKey};

/// Errors that can occur during threshold encryption setup.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// An output was requested before all required registrations were made.
    IncompleteSetup,
    /// A registration was attempted after the setup already produced an
    /// output.
    SetupSealed,
    /// A public key or commitment for this trustee index was already
    /// registered.
    DuplicateTrustee(usize),
    /// The commitment belongs to a different cryptosystem, scheme size, or
    /// trustee index.
    IncompatibleCommitment,
    /// The commitment of the given trustee failed the verifiable secret
    /// sharing check: the encrypted share does not lie on the committed
    /// polynomial.
    InvalidCommitment(usize),
    /// The setup instance never generated its own commitment for this
    /// trustee index, so the own share is unavailable.
    MissingOwnCommitment,
    /// The supplied secret key does not match the registered public key of
    /// the trustee.
    KeyMismatch,
    /// Malformed serialized commitment data.
    Serialization(SerializationError),
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompleteSetup => {
                formatter.write_str("not all trustee registrations are present")
            }
            Self::SetupSealed => {
                formatter.write_str("setup already produced an output and is sealed")
            }
            Self::DuplicateTrustee(index) => {
                write!(formatter, "trustee {index} was already registered")
            }
            Self::IncompatibleCommitment => {
                formatter.write_str("commitment is not compatible with this setup")
            }
            Self::InvalidCommitment(index) => write!(
                formatter,
                "commitment of trustee {index} failed the secret sharing check"
            ),
            Self::MissingOwnCommitment => {
                formatter.write_str("setup instance did not generate a commitment for this trustee")
            }
            Self::KeyMismatch => {
                formatter.write_str("secret key does not match the registered public key")
            }
            Self::Serialization(err) => write!(formatter, "cannot parse commitment: {err}"),
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

/// Parameters of a threshold ElGamal encryption scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
    /// Total number of trustees (the `n` in "`k` of `n`" decryption).
    pub trustees: usize,
    /// Minimum number of trustees required to decrypt (the `k`).
    pub threshold: usize,
}

impl Params {
    /// Creates new parameters.
    ///
    /// # Panics
    ///
    /// Panics if `threshold` is not in `2..=trustees`.
    pub fn new(trustees: usize, threshold: usize) -> Self {
        assert!(
            threshold >= 2 && threshold <= trustees,
            "threshold {threshold} must be in 2..={trustees}"
        );
        Self {
            trustees,
            threshold,
        }
    }
}

/// Public coefficients `A_t = g^{a_t}` of a trustee's secret polynomial,
/// evaluated "in the exponent".
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PublicPolynomial(pub(crate) Vec<BigUint>);

impl PublicPolynomial {
    pub(crate) fn value_at_zero(&self) -> &BigUint {
        &self.0[0]
    }

    /// Computes `prod_t A_t^{x^t} mod p`, the public image of the secret
    /// polynomial value `f(x)`.
    pub(crate) fn value_at(&self, cryptosystem: &Cryptosystem, x: &BigUint) -> BigUint {
        let mut exponent = BigUint::one();
        let mut value = BigUint::one();
        for coefficient in &self.0 {
            value = cryptosystem.mul(&value, &cryptosystem.pow(coefficient, &exponent));
            exponent = exponent * x % cryptosystem.order();
        }
        value
    }
}

/// Evaluates `f(x) = sum_t a_t x^t mod q` by Horner's rule.
fn evaluate_polynomial(coefficients: &[BigUint], x: &BigUint, order: &BigUint) -> BigUint {
    let mut value = BigUint::zero();
    for coefficient in coefficients.iter().rev() {
        value = (value * x + coefficient) % order;
    }
    value
}

/// Encodes a share as a fixed-width integer of `nbits` bits, the plaintext
/// transmitted to the recipient trustee.
fn encode_share(cryptosystem: &Cryptosystem, value: &BigUint) -> Vec<u8> {
    let mut stream = BitStream::new();
    stream
        .put_uint(value, u64::from(cryptosystem.nbits()))
        .expect("share is reduced mod q and q < 2^nbits");
    stream.to_bytes()
}

/// Decodes a share encoded by [`encode_share`]; `None` if the plaintext has
/// the wrong width or the value is not reduced mod `q`.
fn decode_share(cryptosystem: &Cryptosystem, bytes: &[u8]) -> Option<BigUint> {
    let nbits = u64::from(cryptosystem.nbits());
    if bytes.len() as u64 != (nbits + 7) / 8 {
        return None;
    }
    let mut stream = BitStream::from_bytes(bytes);
    let value = stream.get_uint(nbits).ok()?;
    (value < *cryptosystem.order()).then_some(value)
}

/// Published contribution of one trustee to the threshold key: the public
/// polynomial coefficients plus the per-recipient encrypted shares. The
/// entry for the issuing trustee itself is a distinguished empty
/// placeholder; the issuer keeps its own share locally.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdEncryptionCommitment {
    cryptosystem_fingerprint: Fingerprint,
    params: Params,
    trustee_index: usize,
    public_coefficients: Vec<BigUint>,
    encrypted_shares: Vec<Option<Ciphertext>>,
}

impl ThresholdEncryptionCommitment {
    /// Returns the index of the trustee that issued this commitment.
    pub fn trustee_index(&self) -> usize {
        self.trustee_index
    }

    /// Returns the scheme parameters this commitment was issued for.
    pub fn params(&self) -> Params {
        self.params
    }

    /// Returns the fingerprint of the cryptosystem of the threshold scheme.
    pub fn cryptosystem_fingerprint(&self) -> &Fingerprint {
        &self.cryptosystem_fingerprint
    }

    /// Returns the public coefficients `A_t = g^{a_t}`.
    pub fn public_coefficients(&self) -> &[BigUint] {
        &self.public_coefficients
    }

    /// Returns the encrypted share addressed to `recipient`, or `None` for
    /// the issuer's own placeholder entry.
    ///
    /// # Panics
    ///
    /// Panics if `recipient` is out of bounds.
    pub fn encrypted_share(&self, recipient: usize) -> Option<&Ciphertext> {
        self.encrypted_shares[recipient].as_ref()
    }

    /// Computes the commitment fingerprint over the public coefficients and
    /// the fingerprints of the encrypted shares.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut writer = Writer::new();
        writer.write_fingerprint(&self.cryptosystem_fingerprint);
        writer.write_u64(self.params.trustees as u64);
        writer.write_u64(self.params.threshold as u64);
        writer.write_u64(self.trustee_index as u64);
        for coefficient in &self.public_coefficients {
            writer.write_uint(coefficient);
        }
        for share in &self.encrypted_shares {
            match share {
                Some(ciphertext) => writer.write_fingerprint(&ciphertext.fingerprint()),
                None => writer.write_bytes(&[]),
            }
        }
        writer.fingerprint()
    }

    /// Serializes this commitment as
    /// `(version, cryptosystem fp, n, k, j, coefficients, shares)`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::versioned();
        writer.write_fingerprint(&self.cryptosystem_fingerprint);
        writer.write_u64(self.params.trustees as u64);
        writer.write_u64(self.params.threshold as u64);
        writer.write_u64(self.trustee_index as u64);
        for coefficient in &self.public_coefficients {
            writer.write_uint(coefficient);
        }
        for share in &self.encrypted_shares {
            match share {
                Some(ciphertext) => {
                    writer.write_u32(1);
                    writer.write_bytes(&ciphertext.to_bytes());
                }
                None => writer.write_u32(0),
            }
        }
        writer.into_bytes()
    }

    /// Parses a commitment serialized by [`Self::to_bytes()`], checking its
    /// structure (counts, placeholder position).
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Serialization`] on malformed input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::versioned(bytes)?;
        let cryptosystem_fingerprint = reader.read_fingerprint("cryptosystem")?;
        let trustees = read_count(&mut reader, "trustees")?;
        let threshold = read_count(&mut reader, "threshold")?;
        let trustee_index = read_count(&mut reader, "trustee_index")?;
        if threshold < 2 || threshold > trustees || trustee_index >= trustees {
            return Err(SerializationError::InvalidField("threshold").into());
        }

        let public_coefficients = (0..threshold)
            .map(|_| reader.read_uint("coefficient"))
            .collect::<Result<Vec<_>, _>>()?;

        let mut encrypted_shares = Vec::with_capacity(trustees);
        for recipient in 0..trustees {
            let present = reader.read_u32("share_tag")?;
            let share = match present {
                0 => None,
                1 => {
                    let share_bytes = reader.read_bytes("share")?;
                    Some(Ciphertext::from_bytes(&share_bytes)?)
                }
                _ => return Err(SerializationError::InvalidField("share_tag").into()),
            };
            if share.is_none() != (recipient == trustee_index) {
                return Err(SerializationError::InvalidField("share_tag").into());
            }
            encrypted_shares.push(share);
        }
        reader.finish()?;

        Ok(Self {
            cryptosystem_fingerprint,
            params: Params {
                trustees,
                threshold,
            },
            trustee_index,
            public_coefficients,
            encrypted_shares,
        })
    }
}

fn read_count(reader: &mut Reader<'_>, name: &'static str) -> Result<usize, SerializationError> {
    usize::try_from(reader.read_u64(name)?).map_err(|_| SerializationError::InvalidField(name))
}

/// Own polynomial evaluation retained when generating a commitment; it
/// enters the trustee's threshold share without ever leaving the instance.
#[derive(Debug, Clone)]
struct OwnShare {
    trustee_index: usize,
    value: BigUint,
}

/// Mediator for setting up a threshold encryption scheme.
///
/// An instance accumulates trustee registrations (personal public keys,
/// then commitments) and derives the outputs of the protocol: the trustee's
/// own commitment, the shared [`ThresholdPublicKey`], the trustee's
/// [`ThresholdKeypair`], and the setup fingerprint that all trustees compare
/// out of band. Once any of the combined outputs is produced the instance is
/// *sealed*: further registrations fail with [`Error::SetupSealed`], so a
/// fingerprint handed out always covers exactly the registrations it was
/// computed from.
#[derive(Debug, Clone)]
pub struct ThresholdEncryptionSetUp {
    cryptosystem: Cryptosystem,
    params: Params,
    trustee_keys: Vec<Option<PublicKey>>,
    commitments: Vec<Option<ThresholdEncryptionCommitment>>,
    own_share: Option<OwnShare>,
    sealed: bool,
}

impl ThresholdEncryptionSetUp {
    /// Creates a setup instance for the given cryptosystem and scheme
    /// parameters.
    pub fn new(cryptosystem: Cryptosystem, params: Params) -> Self {
        Self {
            cryptosystem,
            params,
            trustee_keys: vec![None; params.trustees],
            commitments: vec![None; params.trustees],
            own_share: None,
            sealed: false,
        }
    }

    /// Returns the scheme parameters.
    pub fn params(&self) -> Params {
        self.params
    }

    /// Returns the cryptosystem of the threshold scheme.
    pub fn cryptosystem(&self) -> &Cryptosystem {
        &self.cryptosystem
    }

    /// Registers the personal public key of a trustee. The key is used to
    /// transmit that trustee's secret shares confidentially; it need not
    /// belong to the same cryptosystem as the threshold scheme.
    ///
    /// The key of the trustee running this instance should come from local
    /// trusted storage rather than from the bulletin board.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::SetupSealed`] after an output was produced and
    /// with [`Error::DuplicateTrustee`] if the index was already registered.
    ///
    /// # Panics
    ///
    /// Panics if `trustee` is out of bounds.
    pub fn add_trustee_public_key(&mut self, trustee: usize, key: PublicKey) -> Result<(), Error> {
        assert!(
            trustee < self.params.trustees,
            "trustee index {trustee} out of bounds, expected a value in 0..{}",
            self.params.trustees
        );
        if self.sealed {
            return Err(Error::SetupSealed);
        }
        if self.trustee_keys[trustee].is_some() {
            return Err(Error::DuplicateTrustee(trustee));
        }
        self.trustee_keys[trustee] = Some(key);
        Ok(())
    }

    /// Registers the published commitment of a trustee.
    ///
    /// The commitment of the trustee running this instance should come from
    /// local trusted storage; combined with the out-of-band fingerprint
    /// comparison this prevents the bulletin board from swapping
    /// commitments in transit.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::SetupSealed`] after an output was produced, with
    /// [`Error::DuplicateTrustee`] on a repeated index, and with
    /// [`Error::IncompatibleCommitment`] if the commitment's cryptosystem,
    /// parameters or embedded trustee index do not match.
    ///
    /// # Panics
    ///
    /// Panics if `trustee` is out of bounds.
    pub fn add_trustee_commitment(
        &mut self,
        trustee: usize,
        commitment: ThresholdEncryptionCommitment,
    ) -> Result<(), Error> {
        assert!(
            trustee < self.params.trustees,
            "trustee index {trustee} out of bounds, expected a value in 0..{}",
            self.params.trustees
        );
        if self.sealed {
            return Err(Error::SetupSealed);
        }
        if commitment.trustee_index != trustee
            || commitment.params != self.params
            || commitment.cryptosystem_fingerprint != *self.cryptosystem.fingerprint()
        {
            return Err(Error::IncompatibleCommitment);
        }
        if self.commitments[trustee].is_some() {
            return Err(Error::DuplicateTrustee(trustee));
        }
        self.commitments[trustee] = Some(commitment);
        Ok(())
    }

    /// Generates this trustee's commitment: a fresh random polynomial of
    /// degree `k - 1`, its public coefficients, and the encrypted share
    /// `f(i + 1)` for every other trustee. The trustee's own share is
    /// retained inside this instance for [`Self::generate_keypair()`].
    ///
    /// # Errors
    ///
    /// Fails with [`Error::IncompleteSetup`] unless all trustee public keys
    /// are registered, and with [`Error::SetupSealed`] on a sealed
    /// instance.
    ///
    /// # Panics
    ///
    /// Panics if `trustee` is out of bounds.
    pub fn generate_commitment<R: CryptoRng + RngCore>(
        &mut self,
        trustee: usize,
        rng: &mut R,
    ) -> Result<ThresholdEncryptionCommitment, Error> {
        assert!(
            trustee < self.params.trustees,
            "trustee index {trustee} out of bounds, expected a value in 0..{}",
            self.params.trustees
        );
        if self.sealed {
            return Err(Error::SetupSealed);
        }
        if self.trustee_keys.iter().any(Option::is_none) {
            return Err(Error::IncompleteSetup);
        }

        // Random polynomial of degree k - 1 with a nonzero constant term.
        let mut coefficients: Vec<BigUint> = Vec::with_capacity(self.params.threshold);
        coefficients.push(loop {
            let constant = self.cryptosystem.random_exponent(rng);
            if !constant.is_zero() {
                break constant;
            }
        });
        coefficients.extend((1..self.params.threshold).map(|_| self.cryptosystem.random_exponent(rng)));

        let public_coefficients = coefficients
            .iter()
            .map(|coefficient| self.cryptosystem.pow_generator(coefficient))
            .collect();

        let encrypted_shares = (0..self.params.trustees)
            .map(|recipient| {
                if recipient == trustee {
                    return None;
                }
                let point = BigUint::from(recipient as u64 + 1);
                let share = evaluate_polynomial(&coefficients, &point, self.cryptosystem.order());
                let plaintext = encode_share(&self.cryptosystem, &share);
                let recipient_key = self.trustee_keys[recipient]
                    .as_ref()
                    .expect("checked above that all keys are present");
                Some(recipient_key.encrypt_bytes(&plaintext, rng))
            })
            .collect();

        let own_point = BigUint::from(trustee as u64 + 1);
        self.own_share = Some(OwnShare {
            trustee_index: trustee,
            value: evaluate_polynomial(&coefficients, &own_point, self.cryptosystem.order()),
        });

        Ok(ThresholdEncryptionCommitment {
            cryptosystem_fingerprint: *self.cryptosystem.fingerprint(),
            params: self.params,
            trustee_index: trustee,
            public_coefficients,
            encrypted_shares,
        })
    }

    /// Derives the threshold public key from the registered commitments.
    /// Anyone with all commitments can perform this computation. Seals the
    /// instance.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::IncompleteSetup`] unless all commitments are
    /// registered.
    pub fn generate_public_key(&mut self) -> Result<ThresholdPublicKey, Error> {
        if self.commitments.iter().any(Option::is_none) {
            return Err(Error::IncompleteSetup);
        }
        self.sealed = true;
        Ok(self.compute_public_key())
    }

    /// Derives this trustee's threshold keypair: decrypts the shares
    /// addressed to `trustee`, verifies each against the issuer's public
    /// coefficients, and sums them with the trustee's own retained share.
    /// Seals the instance.
    ///
    /// # Errors
    ///
    /// - [`Error::IncompleteSetup`] unless all commitments (and the
    ///   trustee's registered public key) are present.
    /// - [`Error::MissingOwnCommitment`] if this instance did not generate
    ///   the commitment for `trustee`.
    /// - [`Error::KeyMismatch`] if `secret_key` does not match the
    ///   registered public key.
    /// - [`Error::InvalidCommitment`] naming the issuing trustee if a share
    ///   fails to decrypt, decode, or pass the secret sharing check.
    ///
    /// # Panics
    ///
    /// Panics if `trustee` is out of bounds.
    pub fn generate_keypair(
        &mut self,
        trustee: usize,
        secret_key: &SecretKey,
    ) -> Result<ThresholdKeypair, Error> {
        assert!(
            trustee < self.params.trustees,
            "trustee index {trustee} out of bounds, expected a value in 0..{}",
            self.params.trustees
        );
        if self.commitments.iter().any(Option::is_none) {
            return Err(Error::IncompleteSetup);
        }
        let own_share = self
            .own_share
            .as_ref()
            .filter(|own| own.trustee_index == trustee)
            .ok_or(Error::MissingOwnCommitment)?;
        let registered_key = self.trustee_keys[trustee]
            .as_ref()
            .ok_or(Error::IncompleteSetup)?;
        if PublicKey::from(secret_key) != *registered_key {
            return Err(Error::KeyMismatch);
        }

        let point = BigUint::from(trustee as u64 + 1);
        let mut share = own_share.value.clone();
        for issuer in 0..self.params.trustees {
            let commitment = self.commitments[issuer]
                .as_ref()
                .expect("checked above that all commitments are present");
            let polynomial = PublicPolynomial(commitment.public_coefficients.clone());
            let expected = polynomial.value_at(&self.cryptosystem, &point);

            if issuer == trustee {
                // The registered own commitment must match the retained
                // share; a mismatch means the bulletin board swapped it.
                if self.cryptosystem.pow_generator(&own_share.value) != expected {
                    return Err(Error::InvalidCommitment(issuer));
                }
                continue;
            }

            let ciphertext = commitment.encrypted_shares[trustee]
                .as_ref()
                .ok_or(Error::InvalidCommitment(issuer))?;
            let received = secret_key
                .decrypt_to_bytes(ciphertext)
                .ok()
                .and_then(|plaintext| decode_share(&self.cryptosystem, &plaintext))
                .ok_or(Error::InvalidCommitment(issuer))?;
            if self.cryptosystem.pow_generator(&received) != expected {
                return Err(Error::InvalidCommitment(issuer));
            }
            share = (share + received) % self.cryptosystem.order();
        }

        self.sealed = true;
        let public = self.compute_public_key();
        Ok(ThresholdKeypair::new(
            public.clone(),
            ThresholdPrivateKey::new(trustee, share, public),
        ))
    }

    /// Computes the setup fingerprint over the cryptosystem, the scheme
    /// parameters, and all commitment fingerprints in trustee order. All
    /// trustees must obtain the same value before trusting derived keys.
    /// Seals the instance.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::IncompleteSetup`] unless all commitments are
    /// registered.
    pub fn fingerprint(&mut self) -> Result<Fingerprint, Error> {
        if self.commitments.iter().any(Option::is_none) {
            return Err(Error::IncompleteSetup);
        }
        self.sealed = true;

        let mut writer = Writer::new();
        writer.write_fingerprint(self.cryptosystem.fingerprint());
        writer.write_u64(self.params.trustees as u64);
        writer.write_u64(self.params.threshold as u64);
        for commitment in &self.commitments {
            let commitment = commitment.as_ref().expect("checked above");
            writer.write_fingerprint(&commitment.fingerprint());
        }
        Ok(writer.fingerprint())
    }

    /// Builds the threshold public key from the (complete) commitments:
    /// `Y = prod_j A_{j,0}` and `Y_i = prod_j prod_t A_{j,t}^{(i+1)^t}`.
    fn compute_public_key(&self) -> ThresholdPublicKey {
        let polynomials: Vec<_> = self
            .commitments
            .iter()
            .map(|commitment| {
                let commitment = commitment.as_ref().expect("all commitments present");
                PublicPolynomial(commitment.public_coefficients.clone())
            })
            .collect();

        let mut key = BigUint::one();
        for polynomial in &polynomials {
            key = self.cryptosystem.mul(&key, polynomial.value_at_zero());
        }

        let verification_keys = (0..self.params.trustees)
            .map(|trustee| {
                let point = BigUint::from(trustee as u64 + 1);
                let mut value = BigUint::one();
                for polynomial in &polynomials {
                    value = self
                        .cryptosystem
                        .mul(&value, &polynomial.value_at(&self.cryptosystem, &point));
                }
                value
            })
            .collect();

        ThresholdPublicKey::new(self.cryptosystem.clone(), self.params, key, verification_keys)
    }
}
