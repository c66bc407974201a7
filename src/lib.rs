//! ElGamal encryption and verifiable mix-net protocols over safe-prime
//! modular groups, the cryptographic core of an end-to-end verifiable
//! electronic voting system.
//!
//! # ⚠ Warnings
//!
//! While the logic in this crate relies on standard cryptographic
//! assumptions (complexity of discrete log and decisional Diffie–Hellman in
//! the quadratic-residue subgroup of a safe-prime group), it has not been
//! independently verified for correctness or absence of side-channel attack
//! vectors. Big-integer arithmetic is **not** constant-time. **Use at your
//! own risk.**
//!
//! Plain ElGamal is vulnerable to [chosen-ciphertext attacks][CCA]; the
//! protocols here derive their integrity from the accompanying
//! zero-knowledge proofs and fingerprint comparisons, not from the
//! encryption alone.
//!
//! # Overview
//!
//! - [`group::Cryptosystem`] fixes the election group: a safe prime
//!   `p = 2q + 1` and a generator of the order-`q` subgroup. Every other
//!   object is bound to its cryptosystem by [`Fingerprint`].
//! - [`PublicKey`] / [`SecretKey`] / [`Keypair`] provide single-recipient
//!   encryption of arbitrary byte messages as block [`Ciphertext`]s.
//! - The [`sharing`] module runs dealer-less distributed key generation:
//!   trustees exchange [commitments](sharing::ThresholdEncryptionCommitment)
//!   carrying verifiable secret shares and derive a
//!   [`sharing::ThresholdPublicKey`] plus one
//!   [`sharing::ThresholdPrivateKey`] each.
//! - [`PartialDecryption`]s carry per-block Chaum–Pedersen
//!   [`LogEqualityProof`]s; a [`ThresholdDecryptionCombinator`] verifies
//!   them and recovers plaintext by Lagrange interpolation in the exponent
//!   once `k` of `n` trustees contribute.
//! - The [`shuffle`] module implements the re-encryption mixnet:
//!   [`shuffle::CiphertextCollection`]s shuffle with a cut-and-choose
//!   [`shuffle::ShufflingProof`] (128-bit soundness) so ballots can be
//!   anonymized verifiably before decryption.
//! - [`bitstream::BitStream`] and the [`serialization`] module define the
//!   deterministic bit- and byte-level layouts; fingerprints persist across
//!   files and operators, so these layouts are part of the public
//!   interface.
//!
//! # Crate features
//!
//! ## `serde`
//!
//! *(off by default)*
//!
//! Enables [`Serialize`](::serde::Serialize) /
//! [`Deserialize`](::serde::Deserialize) implementations for the types that
//! travel between operators (fingerprints, ciphertexts, partial
//! decryptions, shuffling proofs). Values serialize as their canonical byte
//! strings, base64url-encoded for human-readable formats. Deserialization
//! performs structural checks only; cryptographic verification happens when
//! the values are used.
//!
//! # Examples
//!
//! Encrypting a ballot under a freshly generated keypair:
//!
//! ```
//! # use modp_elgamal::group::Cryptosystem;
//! # use rand::thread_rng;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut rng = thread_rng();
//! // 1024+ bits in production; small parameters keep the example fast.
//! let cryptosystem = Cryptosystem::generate_with_min_bits(256, 256, &mut rng)?;
//! let keypair = cryptosystem.keypair(&mut rng);
//!
//! let ciphertext = keypair.public().encrypt_text("Dummy vote #0", &mut rng);
//! // The fingerprint is the voter's receipt.
//! let receipt = ciphertext.fingerprint();
//!
//! assert_eq!(keypair.secret().decrypt_to_text(&ciphertext)?, "Dummy vote #0");
//! assert_eq!(ciphertext.fingerprint(), receipt);
//! # Ok(())
//! # }
//! ```
//!
//! See the [`sharing`] and [`shuffle`] module docs for the threshold and
//! mixnet flows.
//!
//! [CCA]: https://en.wikipedia.org/wiki/Chosen-ciphertext_attack

// Linter settings.
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::doc_markdown,
    clippy::similar_names
)]

pub mod bitstream;
mod decryption;
mod encryption;
pub mod group;
mod keys;
mod proofs;
#[cfg(feature = "serde")]
mod serde;
pub mod serialization;
pub mod sharing;
pub mod shuffle;

pub use crate::{
    decryption::{
        Error as DecryptionError, PartialDecryption, PartialDecryptionBlock,
        ThresholdDecryptionCombinator,
    },
    encryption::{Ciphertext, CiphertextBlock},
    keys::{Error as KeyError, Keypair, PublicKey, SecretKey},
    proofs::LogEqualityProof,
    serialization::Fingerprint,
};

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
