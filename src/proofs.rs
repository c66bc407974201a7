//! Zero-knowledge proofs.

use num_bigint::BigUint;
use rand_core::{CryptoRng, RngCore};

use crate::{group::Cryptosystem, serialization::Writer};

/// Zero-knowledge proof of equality of two discrete logarithms in different
/// bases, aka Chaum–Pedersen protocol.
///
/// # Construction
///
/// Public parameters are the group generator `g` and a second base `gamma`
/// (the random element of an ElGamal block). Prover and verifier know
/// elements `Y = g^s` and `d = gamma^s`; the prover additionally knows the
/// shared discrete log `s`.
///
/// The interactive sigma protocol:
///
/// 1. **Commitment:** the prover samples `w` uniform in `[0, q - 1]` and
///    sends `t1 = g^w`, `t2 = gamma^w`.
/// 2. **Challenge:** the verifier sends a random scalar `c`.
/// 3. **Response:** the prover sends `u = w + c * s mod q`.
///
/// Verification equations:
///
/// ```text
/// g^u     == t1 * Y^c (mod p)
/// gamma^u == t2 * d^c (mod p)
/// ```
///
/// The non-interactive version derives the challenge by the Fiat–Shamir
/// transform: `c = SHA-256(g, Y, gamma, d, t1, t2) mod q` over the canonical
/// field encoding of the operands. The proof is represented and serialized
/// as `(t1, t2, u)`; the verifier recomputes `c` from the commitments, so
/// any mutation of the statement or the proof breaks the hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEqualityProof {
    commitment_generator: BigUint,
    commitment_base: BigUint,
    response: BigUint,
}

impl LogEqualityProof {
    /// Creates a proof that `log_g(key) == log_base(power) == secret`.
    ///
    /// It is not checked whether `secret` actually is the shared discrete
    /// log of `key` and `power`; a proof for a false statement will simply
    /// not verify.
    pub fn new<R: CryptoRng + RngCore>(
        cryptosystem: &Cryptosystem,
        base: &BigUint,
        key: &BigUint,
        power: &BigUint,
        secret: &BigUint,
        rng: &mut R,
    ) -> Self {
        let nonce = cryptosystem.random_exponent(rng);
        let commitment_generator = cryptosystem.pow_generator(&nonce);
        let commitment_base = cryptosystem.pow(base, &nonce);
        let challenge = Self::challenge(
            cryptosystem,
            base,
            key,
            power,
            &commitment_generator,
            &commitment_base,
        );
        let response = (nonce + challenge * secret) % cryptosystem.order();

        Self {
            commitment_generator,
            commitment_base,
            response,
        }
    }

    /// Verifies this proof against the statement
    /// `log_g(key) == log_base(power)`.
    #[must_use = "verification fail is returned as `false` and should be handled"]
    pub fn verify(
        &self,
        cryptosystem: &Cryptosystem,
        base: &BigUint,
        key: &BigUint,
        power: &BigUint,
    ) -> bool {
        let challenge = Self::challenge(
            cryptosystem,
            base,
            key,
            power,
            &self.commitment_generator,
            &self.commitment_base,
        );

        let generator_lhs = cryptosystem.pow_generator(&self.response);
        let generator_rhs = cryptosystem.mul(
            &self.commitment_generator,
            &cryptosystem.pow(key, &challenge),
        );
        let base_lhs = cryptosystem.pow(base, &self.response);
        let base_rhs =
            cryptosystem.mul(&self.commitment_base, &cryptosystem.pow(power, &challenge));

        generator_lhs == generator_rhs && base_lhs == base_rhs
    }

    /// Fiat–Shamir challenge over the canonical encoding of
    /// `(g, key, base, power, t1, t2)`, reduced modulo `q`.
    fn challenge(
        cryptosystem: &Cryptosystem,
        base: &BigUint,
        key: &BigUint,
        power: &BigUint,
        commitment_generator: &BigUint,
        commitment_base: &BigUint,
    ) -> BigUint {
        let mut writer = Writer::new();
        writer.write_uint(cryptosystem.generator());
        writer.write_uint(key);
        writer.write_uint(base);
        writer.write_uint(power);
        writer.write_uint(commitment_generator);
        writer.write_uint(commitment_base);
        writer.challenge_scalar(cryptosystem.order())
    }

    pub(crate) fn from_parts(
        commitment_generator: BigUint,
        commitment_base: BigUint,
        response: BigUint,
    ) -> Self {
        Self {
            commitment_generator,
            commitment_base,
            response,
        }
    }

    /// Returns the commitment `t1 = g^w`.
    pub fn commitment_generator(&self) -> &BigUint {
        &self.commitment_generator
    }

    /// Returns the commitment `t2 = base^w`.
    pub fn commitment_base(&self) -> &BigUint {
        &self.commitment_base
    }

    /// Returns the response `u = w + c * s mod q`.
    pub fn response(&self) -> &BigUint {
        &self.response
    }
}
