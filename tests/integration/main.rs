//! Integration tests exercising the full election flows through the public
//! API: parameter distribution, distributed key generation, voting,
//! mixing, and threshold decryption.

use num_bigint::BigUint;
use rand_core::{CryptoRng, RngCore};

use modp_elgamal::{
    group::Cryptosystem,
    sharing::{
        Params, ThresholdEncryptionCommitment, ThresholdEncryptionSetUp, ThresholdKeypair,
        ThresholdPublicKey,
    },
    Ciphertext, DecryptionError, Fingerprint, Keypair, ThresholdDecryptionCombinator,
};

mod basic;
mod sharing;
mod shuffling;

/// 256-bit safe-prime group used by the protocol-level tests. Small enough
/// to keep the mixnet suites fast, large enough to exercise multi-limb
/// arithmetic.
const P_256: &str = "8785ea16a48e88596374f68a0b7e57b1789697b3c448ea5366a427fc98ce4127";
const Q_256: &str = "43c2f50b5247442cb1ba7b4505bf2bd8bc4b4bd9e2247529b35213fe4c672093";
const G_256: &str = "4a134b41766284c7516a3db19a041616f44dfd9b01a1d5c6946b0138d65d942d";

/// 512-bit safe-prime group for the encryption round-trip tests.
const P_512: &str = "fd0a0b34af2d4f76ca6b1c9ee6c2d624121f142e8aaf58935ccfbae95d73d6a2\
                     77c389690c02fa50e8363d0c4c70b8cc48dc92c370a305ae31dafb0acb5b9f13";
const Q_512: &str = "7e85059a5796a7bb65358e4f73616b12090f8a174557ac49ae67dd74aeb9eb51\
                     3be1c4b486017d28741b1e8626385c66246e4961b85182d718ed7d8565adcf89";
const G_512: &str = "43dfd7dee88ee7e1ac19aa4a98a07bf5a8ea1d8d2f864ed5b2494ce2d9e87a8b\
                     def6abdf048a5bc4266a1872b12ba60d731dbdbda2a87c2c9babb04a5cb48cda";

/// The 1024-bit MODP group of RFC 2409 (Oakley group 2): `p` is a safe
/// prime with `p = 7 (mod 8)`, so `g = 2` is a quadratic residue and
/// generates the order-`q` subgroup.
const P_1024: &str = "ffffffffffffffffc90fdaa22168c234c4c6628b80dc1cd129024e088a67cc74\
                      020bbea63b139b22514a08798e3404ddef9519b3cd3a431b302b0a6df25f1437\
                      4fe1356d6d51c245e485b576625e7ec6f44c42e9a637ed6b0bff5cb6f406b7ed\
                      ee386bfb5a899fa5ae9f24117c4b1fe649286651ece65381ffffffffffffffff";
const Q_1024: &str = "7fffffffffffffffe487ed5110b4611a62633145c06e0e68948127044533e63a\
                      0105df531d89cd9128a5043cc71a026ef7ca8cd9e69d218d98158536f92f8a1b\
                      a7f09ab6b6a8e122f242dabb312f3f637a262174d31bf6b585ffae5b7a035bf6\
                      f71c35fdad44cfd2d74f9208be258ff324943328f67329c0ffffffffffffffff";

fn uint(hex: &str) -> BigUint {
    BigUint::parse_bytes(hex.as_bytes(), 16).expect("valid hex constant")
}

pub fn cryptosystem_256() -> Cryptosystem {
    Cryptosystem::from_parameters_with_min_bits(
        256,
        uint(P_256),
        uint(Q_256),
        uint(G_256),
        256,
        &mut rand::thread_rng(),
    )
    .expect("pre-verified constants")
}

pub fn cryptosystem_512() -> Cryptosystem {
    Cryptosystem::from_parameters_with_min_bits(
        512,
        uint(P_512),
        uint(Q_512),
        uint(G_512),
        512,
        &mut rand::thread_rng(),
    )
    .expect("pre-verified constants")
}

pub fn cryptosystem_1024() -> Cryptosystem {
    Cryptosystem::from_parameters(
        1024,
        uint(P_1024),
        uint(Q_1024),
        BigUint::from(2_u32),
        &mut rand::thread_rng(),
    )
    .expect("pre-verified constants")
}

/// A complete election bootstrap: every trustee runs its own
/// [`ThresholdEncryptionSetUp`] instance against the same published data,
/// exactly as the distributed protocol prescribes.
pub struct Rig {
    pub cryptosystem: Cryptosystem,
    pub trustee_keys: Vec<Keypair>,
    pub commitments: Vec<ThresholdEncryptionCommitment>,
    pub threshold_keys: Vec<ThresholdKeypair>,
    pub setup_fingerprints: Vec<Fingerprint>,
}

impl Rig {
    pub fn new<R: CryptoRng + RngCore>(
        cryptosystem: Cryptosystem,
        params: Params,
        rng: &mut R,
    ) -> Self {
        let trustee_keys: Vec<_> = (0..params.trustees)
            .map(|_| cryptosystem.keypair(rng))
            .collect();

        let mut setups: Vec<_> = (0..params.trustees)
            .map(|_| ThresholdEncryptionSetUp::new(cryptosystem.clone(), params))
            .collect();
        for setup in &mut setups {
            for (i, keypair) in trustee_keys.iter().enumerate() {
                setup
                    .add_trustee_public_key(i, keypair.public().clone())
                    .unwrap();
            }
        }

        let commitments: Vec<_> = setups
            .iter_mut()
            .enumerate()
            .map(|(i, setup)| setup.generate_commitment(i, rng).unwrap())
            .collect();
        for setup in &mut setups {
            for (j, commitment) in commitments.iter().enumerate() {
                setup
                    .add_trustee_commitment(j, commitment.clone())
                    .unwrap();
            }
        }

        let threshold_keys: Vec<_> = setups
            .iter_mut()
            .enumerate()
            .map(|(i, setup)| setup.generate_keypair(i, trustee_keys[i].secret()).unwrap())
            .collect();
        let setup_fingerprints = setups
            .iter_mut()
            .map(|setup| setup.fingerprint().unwrap())
            .collect();

        Self {
            cryptosystem,
            trustee_keys,
            commitments,
            threshold_keys,
            setup_fingerprints,
        }
    }

    pub fn public(&self) -> &ThresholdPublicKey {
        self.threshold_keys[0].public()
    }

    /// Decrypts `ciphertext` with the cooperation of the given trustees.
    pub fn decrypt_with<R: CryptoRng + RngCore>(
        &self,
        ciphertext: &Ciphertext,
        trustees: &[usize],
        rng: &mut R,
    ) -> Result<String, DecryptionError> {
        let mut combinator =
            ThresholdDecryptionCombinator::new(self.public().clone(), ciphertext.clone())?;
        for &trustee in trustees {
            let share = self.threshold_keys[trustee]
                .private()
                .partial_decryption(ciphertext, rng)?;
            combinator.add_partial_decryption(share)?;
        }
        combinator.decrypt_to_text()
    }
}
