//! Safe-prime cryptosystem parameters and modular group arithmetic.
//!
//! A [`Cryptosystem`] fixes the multiplicative group used by every other
//! protocol in this crate: a safe prime `p = 2q + 1`, its prime order-`q`
//! subgroup `G` of quadratic residues, and a generator `g` of `G`. All keys,
//! ciphertexts and proofs are bound to a cryptosystem through its
//! [`Fingerprint`], and loading parameters from untrusted storage re-runs the
//! full verification (primality, safe-prime structure, generator order).

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand_core::{CryptoRng, RngCore};

use std::{error, fmt, fs, io, path::Path};

use crate::{
    keys::Keypair,
    serialization::{Fingerprint, Reader, SerializationError, Writer},
    SecretKey,
};

/// Default lower bound on the modulus bit length. Parameters below this are
/// rejected as too weak for production use.
pub const DEFAULT_MIN_BITS: u32 = 1024;

/// Number of Miller–Rabin rounds used when verifying primality.
const MILLER_RABIN_ROUNDS: u32 = 64;

/// Small primes for trial division ahead of Miller–Rabin.
const SMALL_PRIMES: [u32; 15] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47];

/// Errors detected while generating or verifying cryptosystem parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParametersError {
    /// The requested or loaded modulus is shorter than the configured
    /// minimum bit length.
    WeakParameters {
        /// Bit length of the offending modulus.
        nbits: u32,
        /// Configured minimum bit length.
        min_bits: u32,
    },
    /// `p` or `q` failed the primality test.
    NotPrime,
    /// `p` and `q` are prime but `p != 2q + 1`, or the modulus does not have
    /// the declared bit length.
    NotSafePrime,
    /// `g` is not a generator of the order-`q` subgroup.
    InvalidGenerator,
    /// The parameter file could not be parsed.
    Serialization(SerializationError),
    /// The parameter file could not be read or written.
    Io(io::ErrorKind),
}

impl fmt::Display for ParametersError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WeakParameters { nbits, min_bits } => write!(
                formatter,
                "modulus of {nbits} bits is below the required minimum of {min_bits} bits"
            ),
            Self::NotPrime => formatter.write_str("p or q failed the primality test"),
            Self::NotSafePrime => {
                formatter.write_str("parameters do not describe a safe-prime group")
            }
            Self::InvalidGenerator => {
                formatter.write_str("g does not generate the order-q subgroup")
            }
            Self::Serialization(err) => write!(formatter, "cannot parse parameter file: {err}"),
            Self::Io(kind) => write!(formatter, "cannot access parameter file: {kind}"),
        }
    }
}

impl error::Error for ParametersError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SerializationError> for ParametersError {
    fn from(err: SerializationError) -> Self {
        Self::Serialization(err)
    }
}

/// ElGamal cryptosystem parameters `(nbits, p, q, g)`.
///
/// `p` is a safe prime of exactly `nbits` bits, `q = (p - 1) / 2` is prime,
/// and `g` generates the subgroup of quadratic residues of order `q`.
/// Instances are immutable; equality compares [fingerprints](Self::fingerprint),
/// which is how keys and ciphertexts produced by different operators are
/// matched to the same election group.
///
/// # Examples
///
/// ```
/// # use modp_elgamal::group::Cryptosystem;
/// # use rand::thread_rng;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut rng = thread_rng();
/// // Production deployments use `Cryptosystem::generate(1024, &mut rng)` or
/// // larger; a reduced minimum keeps this example fast.
/// let cryptosystem = Cryptosystem::generate_with_min_bits(256, 256, &mut rng)?;
/// let keypair = cryptosystem.keypair(&mut rng);
///
/// let ciphertext = keypair.public().encrypt_text("attack at dawn", &mut rng);
/// let plaintext = keypair.secret().decrypt_to_text(&ciphertext)?;
/// assert_eq!(plaintext, "attack at dawn");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Cryptosystem {
    nbits: u32,
    prime: BigUint,
    order: BigUint,
    generator: BigUint,
    fingerprint: Fingerprint,
}

impl fmt::Debug for Cryptosystem {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Cryptosystem")
            .field("nbits", &self.nbits)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl PartialEq for Cryptosystem {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for Cryptosystem {}

impl Cryptosystem {
    /// Generates fresh safe-prime parameters of exactly `nbits` bits.
    ///
    /// This is a slow operation for production bit lengths; expect minutes
    /// for 2048-bit parameters.
    ///
    /// # Errors
    ///
    /// Fails with [`ParametersError::WeakParameters`] if `nbits` is below
    /// [`DEFAULT_MIN_BITS`].
    pub fn generate<R: CryptoRng + RngCore>(
        nbits: u32,
        rng: &mut R,
    ) -> Result<Self, ParametersError> {
        Self::generate_with_min_bits(nbits, DEFAULT_MIN_BITS, rng)
    }

    /// Generates fresh parameters with an explicit minimum bit length.
    ///
    /// The minimum exists as a deployment policy knob; lowering it below
    /// [`DEFAULT_MIN_BITS`] is only appropriate for tests.
    ///
    /// # Errors
    ///
    /// Fails with [`ParametersError::WeakParameters`] if `nbits < min_bits`
    /// or `nbits < 16`.
    pub fn generate_with_min_bits<R: CryptoRng + RngCore>(
        nbits: u32,
        min_bits: u32,
        rng: &mut R,
    ) -> Result<Self, ParametersError> {
        if nbits < min_bits || nbits < 16 {
            return Err(ParametersError::WeakParameters { nbits, min_bits });
        }

        let (prime, order) = loop {
            // Sample q of nbits - 1 bits with the top bit set, so that
            // p = 2q + 1 has exactly nbits bits.
            let mut candidate = rng.gen_biguint(u64::from(nbits) - 1);
            candidate.set_bit(u64::from(nbits) - 2, true);
            candidate.set_bit(0, true);
            if !is_probable_prime(&candidate, MILLER_RABIN_ROUNDS, rng) {
                continue;
            }
            let prime = (&candidate << 1_u8) + 1_u32;
            if is_probable_prime(&prime, MILLER_RABIN_ROUNDS, rng) {
                break (prime, candidate);
            }
        };

        // The square of any element of Z*_p outside {1, p - 1} generates the
        // subgroup of quadratic residues, which has prime order q.
        let generator = loop {
            let base = rng.gen_biguint_range(&BigUint::from(2_u32), &(&prime - 1_u32));
            let generator = base.modpow(&BigUint::from(2_u32), &prime);
            if !generator.is_one() {
                break generator;
            }
        };

        Ok(Self::assemble(nbits, prime, order, generator))
    }

    /// Constructs a cryptosystem from externally supplied parameters,
    /// verifying them in full: exact bit length, primality of `p` and `q`
    /// (Miller–Rabin with 64 rounds), the safe-prime relation `p = 2q + 1`,
    /// and that `g` generates the order-`q` subgroup.
    ///
    /// # Errors
    ///
    /// Returns the corresponding [`ParametersError`] variant if any check
    /// fails.
    pub fn from_parameters<R: CryptoRng + RngCore>(
        nbits: u32,
        prime: BigUint,
        order: BigUint,
        generator: BigUint,
        rng: &mut R,
    ) -> Result<Self, ParametersError> {
        Self::from_parameters_with_min_bits(nbits, prime, order, generator, DEFAULT_MIN_BITS, rng)
    }

    /// Constructs and verifies a cryptosystem with an explicit minimum bit
    /// length; see [`Self::from_parameters()`].
    ///
    /// # Errors
    ///
    /// Returns the corresponding [`ParametersError`] variant if any check
    /// fails.
    pub fn from_parameters_with_min_bits<R: CryptoRng + RngCore>(
        nbits: u32,
        prime: BigUint,
        order: BigUint,
        generator: BigUint,
        min_bits: u32,
        rng: &mut R,
    ) -> Result<Self, ParametersError> {
        if nbits < min_bits || nbits < 16 {
            return Err(ParametersError::WeakParameters { nbits, min_bits });
        }
        if prime.bits() != u64::from(nbits) || (&order << 1_u8) + 1_u32 != prime {
            return Err(ParametersError::NotSafePrime);
        }
        if !is_probable_prime(&prime, MILLER_RABIN_ROUNDS, rng)
            || !is_probable_prime(&order, MILLER_RABIN_ROUNDS, rng)
        {
            return Err(ParametersError::NotPrime);
        }
        if generator <= BigUint::one()
            || generator >= prime
            || !generator.modpow(&order, &prime).is_one()
        {
            return Err(ParametersError::InvalidGenerator);
        }
        Ok(Self::assemble(nbits, prime, order, generator))
    }

    fn assemble(nbits: u32, prime: BigUint, order: BigUint, generator: BigUint) -> Self {
        let mut writer = Writer::new();
        writer.write_u32(nbits);
        writer.write_uint(&prime);
        writer.write_uint(&order);
        writer.write_uint(&generator);
        let fingerprint = writer.fingerprint();

        Self {
            nbits,
            prime,
            order,
            generator,
            fingerprint,
        }
    }

    /// Returns the modulus bit length.
    pub fn nbits(&self) -> u32 {
        self.nbits
    }

    /// Returns the safe prime `p`.
    pub fn prime(&self) -> &BigUint {
        &self.prime
    }

    /// Returns the subgroup order `q = (p - 1) / 2`.
    pub fn order(&self) -> &BigUint {
        &self.order
    }

    /// Returns the subgroup generator `g`.
    pub fn generator(&self) -> &BigUint {
        &self.generator
    }

    /// Returns the fingerprint binding keys and ciphertexts to this
    /// cryptosystem.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Checks membership in the order-`q` subgroup: `1 <= x < p` and
    /// `x^q == 1 (mod p)`.
    pub fn is_group_element(&self, element: &BigUint) -> bool {
        !element.is_zero()
            && *element < self.prime
            && element.modpow(&self.order, &self.prime).is_one()
    }

    /// Generates a fresh ElGamal keypair under this cryptosystem.
    pub fn keypair<R: CryptoRng + RngCore>(&self, rng: &mut R) -> Keypair {
        Keypair::from(SecretKey::new(self.clone(), self.random_scalar(rng)))
    }

    /// Uniform scalar in `[1, q - 1]`, used for secret keys and encryption
    /// randomness.
    pub(crate) fn random_scalar<R: CryptoRng + RngCore>(&self, rng: &mut R) -> BigUint {
        rng.gen_biguint_range(&BigUint::one(), &self.order)
    }

    /// Uniform scalar in `[0, q - 1]`, used for polynomial coefficients and
    /// proof nonces.
    pub(crate) fn random_exponent<R: CryptoRng + RngCore>(&self, rng: &mut R) -> BigUint {
        rng.gen_biguint_below(&self.order)
    }

    /// `g^exponent mod p`.
    pub(crate) fn pow_generator(&self, exponent: &BigUint) -> BigUint {
        self.generator.modpow(exponent, &self.prime)
    }

    /// `base^exponent mod p`.
    pub(crate) fn pow(&self, base: &BigUint, exponent: &BigUint) -> BigUint {
        base.modpow(exponent, &self.prime)
    }

    /// `a * b mod p`.
    pub(crate) fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        a * b % &self.prime
    }

    /// Multiplicative inverse modulo `p` via Fermat's little theorem
    /// (`p` is prime).
    pub(crate) fn inv(&self, element: &BigUint) -> BigUint {
        element.modpow(&(&self.prime - 2_u32), &self.prime)
    }

    /// Multiplicative inverse modulo `q` (`q` is prime).
    pub(crate) fn inv_exponent(&self, exponent: &BigUint) -> BigUint {
        exponent.modpow(&(&self.order - 2_u32), &self.order)
    }

    /// Serializes the parameters as a versioned canonical stream; the
    /// contents of a `.pvcryptosys` parameter file.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::versioned();
        writer.write_u32(self.nbits);
        writer.write_uint(&self.prime);
        writer.write_uint(&self.order);
        writer.write_uint(&self.generator);
        writer.into_bytes()
    }

    /// Parses parameters from [`Self::to_bytes()`] output, re-running the
    /// full verification of [`Self::from_parameters()`].
    ///
    /// # Errors
    ///
    /// Fails with [`ParametersError::Serialization`] on malformed input and
    /// with the corresponding variant on verification failure.
    pub fn from_bytes<R: CryptoRng + RngCore>(
        bytes: &[u8],
        rng: &mut R,
    ) -> Result<Self, ParametersError> {
        Self::from_bytes_with_min_bits(bytes, DEFAULT_MIN_BITS, rng)
    }

    /// Parses and verifies parameters with an explicit minimum bit length;
    /// see [`Self::from_bytes()`].
    ///
    /// # Errors
    ///
    /// Fails with [`ParametersError::Serialization`] on malformed input and
    /// with the corresponding variant on verification failure.
    pub fn from_bytes_with_min_bits<R: CryptoRng + RngCore>(
        bytes: &[u8],
        min_bits: u32,
        rng: &mut R,
    ) -> Result<Self, ParametersError> {
        let mut reader = Reader::versioned(bytes)?;
        let nbits = reader.read_u32("nbits")?;
        let prime = reader.read_uint("p")?;
        let order = reader.read_uint("q")?;
        let generator = reader.read_uint("g")?;
        reader.finish()?;
        Self::from_parameters_with_min_bits(nbits, prime, order, generator, min_bits, rng)
    }

    /// Writes the parameter file at `path`.
    ///
    /// # Errors
    ///
    /// Fails with [`ParametersError::Io`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ParametersError> {
        fs::write(path, self.to_bytes()).map_err(|err| ParametersError::Io(err.kind()))
    }

    /// Loads and verifies the parameter file at `path`.
    ///
    /// # Errors
    ///
    /// Fails with [`ParametersError::Io`] if the file cannot be read, and
    /// with the [`Self::from_bytes()`] errors otherwise.
    pub fn load<R: CryptoRng + RngCore>(
        path: impl AsRef<Path>,
        rng: &mut R,
    ) -> Result<Self, ParametersError> {
        let bytes = fs::read(path).map_err(|err| ParametersError::Io(err.kind()))?;
        Self::from_bytes(&bytes, rng)
    }
}

/// Miller–Rabin primality test with `rounds` random bases, preceded by
/// trial division against small primes.
fn is_probable_prime<R: CryptoRng + RngCore>(
    candidate: &BigUint,
    rounds: u32,
    rng: &mut R,
) -> bool {
    for &small in &SMALL_PRIMES {
        let small = BigUint::from(small);
        if *candidate < small {
            return false;
        }
        if candidate % &small == BigUint::zero() {
            return *candidate == small;
        }
    }

    // candidate - 1 = 2^trailing * odd
    let minus_one = candidate - 1_u32;
    let trailing = minus_one.trailing_zeros().expect("candidate > 1");
    let odd = &minus_one >> trailing;

    'witness: for _ in 0..rounds {
        let base = rng.gen_biguint_range(&BigUint::from(2_u32), &minus_one);
        let mut power = base.modpow(&odd, candidate);
        if power.is_one() || power == minus_one {
            continue;
        }
        for _ in 1..trailing {
            power = power.modpow(&BigUint::from(2_u32), candidate);
            if power == minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}
