//! Threshold keys derived from a completed setup.

use num_bigint::BigUint;
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use std::fmt;

use crate::{
    decryption::{self, PartialDecryption},
    encryption::{self, Ciphertext},
    group::Cryptosystem,
    keys::Error as KeyError,
    proofs::LogEqualityProof,
    serialization::{Fingerprint, Reader, Writer},
    sharing::Params,
};

/// Public key of a threshold encryption scheme: the shared element
/// `Y = g^{sum_j a_{j,0}}` together with the per-trustee verification values
/// `Y_i = g^{s_i}` that partial decryption proofs are checked against.
///
/// Everyone — voters, auditors, trustees — derives this key from the same
/// commitment set, so its [fingerprint](Self::fingerprint) doubles as a
/// cross-operator consistency check.
#[derive(Clone, PartialEq, Eq)]
pub struct ThresholdPublicKey {
    cryptosystem: Cryptosystem,
    params: Params,
    key: BigUint,
    verification_keys: Vec<BigUint>,
}

impl fmt::Debug for ThresholdPublicKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ThresholdPublicKey")
            .field("params", &self.params)
            .field("key", &hex::encode(self.key.to_bytes_be()))
            .finish()
    }
}

impl ThresholdPublicKey {
    pub(crate) fn new(
        cryptosystem: Cryptosystem,
        params: Params,
        key: BigUint,
        verification_keys: Vec<BigUint>,
    ) -> Self {
        debug_assert_eq!(verification_keys.len(), params.trustees);
        Self {
            cryptosystem,
            params,
            key,
            verification_keys,
        }
    }

    /// Returns the scheme parameters.
    pub fn params(&self) -> Params {
        self.params
    }

    /// Returns the cryptosystem this key is bound to.
    pub fn cryptosystem(&self) -> &Cryptosystem {
        &self.cryptosystem
    }

    /// Returns the shared public element `Y`.
    pub fn element(&self) -> &BigUint {
        &self.key
    }

    /// Returns the public commitment `Y_i` to the share of the given
    /// trustee.
    ///
    /// # Panics
    ///
    /// Panics if `trustee` is out of bounds.
    pub fn verification_key(&self, trustee: usize) -> &BigUint {
        &self.verification_keys[trustee]
    }

    /// Encrypts an arbitrary byte message under the shared key; any subset
    /// of `k` trustees can later decrypt it.
    pub fn encrypt_bytes<R: CryptoRng + RngCore>(&self, message: &[u8], rng: &mut R) -> Ciphertext {
        encryption::encrypt_with_element(&self.cryptosystem, &self.key, message, rng)
    }

    /// Encrypts a text message; see [`Self::encrypt_bytes()`].
    pub fn encrypt_text<R: CryptoRng + RngCore>(&self, message: &str, rng: &mut R) -> Ciphertext {
        self.encrypt_bytes(message.as_bytes(), rng)
    }

    /// Computes the key fingerprint over
    /// `(cryptosystem fingerprint, n, k, Y, Y_0 .. Y_{n-1})`.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut writer = Writer::new();
        writer.write_fingerprint(self.cryptosystem.fingerprint());
        writer.write_u64(self.params.trustees as u64);
        writer.write_u64(self.params.threshold as u64);
        writer.write_uint(&self.key);
        for verification_key in &self.verification_keys {
            writer.write_uint(verification_key);
        }
        writer.fingerprint()
    }

    /// Serializes this key as
    /// `(version, cryptosystem fingerprint, n, k, Y, Y_i)`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::versioned();
        writer.write_fingerprint(self.cryptosystem.fingerprint());
        writer.write_u64(self.params.trustees as u64);
        writer.write_u64(self.params.threshold as u64);
        writer.write_uint(&self.key);
        for verification_key in &self.verification_keys {
            writer.write_uint(verification_key);
        }
        writer.into_bytes()
    }

    /// Parses a key serialized by [`Self::to_bytes()`], rejecting elements
    /// outside the order-`q` subgroup.
    ///
    /// # Errors
    ///
    /// Fails with [`KeyError::IncompatibleCryptosystem`] on a fingerprint
    /// mismatch and [`KeyError::InvalidPublicKey`] if `Y` or any `Y_i` is
    /// not a group element.
    pub fn from_bytes(cryptosystem: &Cryptosystem, bytes: &[u8]) -> Result<Self, KeyError> {
        let mut reader = Reader::versioned(bytes)?;
        let fingerprint = reader.read_fingerprint("cryptosystem")?;
        let trustees = reader.read_u64("trustees")?;
        let threshold = reader.read_u64("threshold")?;
        let (trustees, threshold) = match (usize::try_from(trustees), usize::try_from(threshold)) {
            (Ok(trustees), Ok(threshold)) if threshold >= 2 && threshold <= trustees => {
                (trustees, threshold)
            }
            _ => {
                return Err(crate::serialization::SerializationError::InvalidField("threshold").into())
            }
        };
        let key = reader.read_uint("key")?;
        let verification_keys = (0..trustees)
            .map(|_| reader.read_uint("verification_key"))
            .collect::<Result<Vec<_>, _>>()?;
        reader.finish()?;

        if fingerprint != *cryptosystem.fingerprint() {
            return Err(KeyError::IncompatibleCryptosystem);
        }
        if !cryptosystem.is_group_element(&key)
            || !verification_keys
                .iter()
                .all(|verification_key| cryptosystem.is_group_element(verification_key))
        {
            return Err(KeyError::InvalidPublicKey);
        }

        Ok(Self::new(
            cryptosystem.clone(),
            Params {
                trustees,
                threshold,
            },
            key,
            verification_keys,
        ))
    }
}

/// Private share of a threshold key held by a single trustee.
///
/// The share alone cannot decrypt anything; the trustee uses it to produce
/// [partial decryptions](Self::partial_decryption) which a
/// [combinator](crate::ThresholdDecryptionCombinator) assembles once `k`
/// trustees have contributed.
#[derive(Clone)]
pub struct ThresholdPrivateKey {
    index: usize,
    share: BigUint,
    public: ThresholdPublicKey,
}

impl fmt::Debug for ThresholdPrivateKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ThresholdPrivateKey")
            .field("index", &self.index)
            .field("public", &self.public)
            .finish()
    }
}

impl ThresholdPrivateKey {
    pub(crate) fn new(index: usize, share: BigUint, public: ThresholdPublicKey) -> Self {
        Self {
            index,
            share,
            public,
        }
    }

    /// Returns the 0-based index of the trustee holding this share.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the threshold public key of the scheme.
    pub fn public(&self) -> &ThresholdPublicKey {
        &self.public
    }

    pub(crate) fn share(&self) -> &BigUint {
        &self.share
    }

    /// Produces this trustee's partial decryption of `ciphertext`: per
    /// block, the value `d = gamma^{s_i}` with a Chaum–Pedersen proof that
    /// `log_g(Y_i) = log_gamma(d)`, i.e. that `d` was computed with the
    /// committed share and nothing else.
    ///
    /// # Errors
    ///
    /// Fails with [`decryption::Error::IncompatibleCiphertext`] if the
    /// ciphertext belongs to a different cryptosystem.
    pub fn partial_decryption<R: CryptoRng + RngCore>(
        &self,
        ciphertext: &Ciphertext,
        rng: &mut R,
    ) -> Result<PartialDecryption, decryption::Error> {
        let cryptosystem = self.public.cryptosystem();
        if ciphertext.cryptosystem_fingerprint() != cryptosystem.fingerprint() {
            return Err(decryption::Error::IncompatibleCiphertext);
        }

        let verification_key = self.public.verification_key(self.index);
        let blocks = ciphertext
            .blocks()
            .map(|block| {
                let element = cryptosystem.pow(block.gamma(), &self.share);
                let proof = LogEqualityProof::new(
                    cryptosystem,
                    block.gamma(),
                    verification_key,
                    &element,
                    &self.share,
                    rng,
                );
                (element, proof)
            })
            .collect();

        Ok(PartialDecryption::new(
            self.index,
            *cryptosystem.fingerprint(),
            self.public.fingerprint(),
            ciphertext.fingerprint(),
            blocks,
        ))
    }

    /// Serializes this key as the threshold public key followed by
    /// `(trustee index, share)`. The buffer contains secret material;
    /// callers should zeroize it after use.
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut writer = Writer::versioned();
        writer.write_bytes(&self.public.to_bytes());
        writer.write_u64(self.index as u64);
        writer.write_uint(&self.share);
        Zeroizing::new(writer.into_bytes())
    }

    /// Parses a key serialized by [`Self::to_bytes()`].
    ///
    /// # Errors
    ///
    /// Propagates [`ThresholdPublicKey::from_bytes()`] errors; fails with
    /// [`KeyError::InvalidSecretKey`] if the share is not reduced mod `q`
    /// or the trustee index is out of range.
    pub fn from_bytes(cryptosystem: &Cryptosystem, bytes: &[u8]) -> Result<Self, KeyError> {
        let mut reader = Reader::versioned(bytes)?;
        let public_bytes = reader.read_bytes("public_key")?;
        let public = ThresholdPublicKey::from_bytes(cryptosystem, &public_bytes)?;
        let index = reader.read_u64("trustee_index")?;
        let share = reader.read_uint("share")?;
        reader.finish()?;

        let index = usize::try_from(index)
            .ok()
            .filter(|index| *index < public.params().trustees)
            .ok_or(KeyError::InvalidSecretKey)?;
        if share >= *cryptosystem.order() {
            return Err(KeyError::InvalidSecretKey);
        }
        Ok(Self::new(index, share, public))
    }
}

/// A trustee's view of the completed threshold scheme: the shared public
/// key and the trustee's private share.
#[derive(Debug, Clone)]
pub struct ThresholdKeypair {
    public: ThresholdPublicKey,
    private: ThresholdPrivateKey,
}

impl ThresholdKeypair {
    pub(crate) fn new(public: ThresholdPublicKey, private: ThresholdPrivateKey) -> Self {
        Self { public, private }
    }

    /// Returns the shared public key.
    pub fn public(&self) -> &ThresholdPublicKey {
        &self.public
    }

    /// Returns the trustee's private key.
    pub fn private(&self) -> &ThresholdPrivateKey {
        &self.private
    }

    /// Returns the public and private keys comprising this keypair.
    pub fn into_tuple(self) -> (ThresholdPublicKey, ThresholdPrivateKey) {
        (self.public, self.private)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    use crate::group::test_params::test_cryptosystem_256;
    use crate::sharing::ThresholdEncryptionSetUp;

    fn sample_keypair(params: Params) -> ThresholdKeypair {
        let mut rng = thread_rng();
        let cryptosystem = test_cryptosystem_256();
        let keypairs: Vec<_> = (0..params.trustees)
            .map(|_| cryptosystem.keypair(&mut rng))
            .collect();

        let mut setup = ThresholdEncryptionSetUp::new(cryptosystem.clone(), params);
        for (i, keypair) in keypairs.iter().enumerate() {
            setup.add_trustee_public_key(i, keypair.public().clone()).unwrap();
        }
        let own = setup.generate_commitment(0, &mut rng).unwrap();
        setup.add_trustee_commitment(0, own).unwrap();
        for trustee in 1..params.trustees {
            let mut other = ThresholdEncryptionSetUp::new(cryptosystem.clone(), params);
            for (i, keypair) in keypairs.iter().enumerate() {
                other.add_trustee_public_key(i, keypair.public().clone()).unwrap();
            }
            let commitment = other.generate_commitment(trustee, &mut rng).unwrap();
            setup.add_trustee_commitment(trustee, commitment).unwrap();
        }
        setup.generate_keypair(0, keypairs[0].secret()).unwrap()
    }

    #[test]
    fn threshold_key_encrypts_and_fingerprints() {
        let mut rng = thread_rng();
        let keypair = sample_keypair(Params::new(3, 2));
        let public = keypair.public();

        let ciphertext = public.encrypt_text("ballot", &mut rng);
        assert_eq!(
            ciphertext.cryptosystem_fingerprint(),
            public.cryptosystem().fingerprint()
        );
        assert!(public.cryptosystem().is_group_element(public.element()));
        for trustee in 0..3 {
            assert!(public
                .cryptosystem()
                .is_group_element(public.verification_key(trustee)));
        }
    }

    #[test]
    fn public_key_serialization_round_trip() {
        let keypair = sample_keypair(Params::new(3, 2));
        let public = keypair.public();
        let cryptosystem = public.cryptosystem().clone();

        let bytes = public.to_bytes();
        let restored = ThresholdPublicKey::from_bytes(&cryptosystem, &bytes).unwrap();
        assert_eq!(restored, *public);
        assert_eq!(restored.fingerprint(), public.fingerprint());
        assert_eq!(restored.to_bytes(), bytes);
    }

    #[test]
    fn private_key_serialization_round_trip() {
        let keypair = sample_keypair(Params::new(3, 2));
        let cryptosystem = keypair.public().cryptosystem().clone();

        let bytes = keypair.private().to_bytes();
        let restored = ThresholdPrivateKey::from_bytes(&cryptosystem, &bytes).unwrap();
        assert_eq!(restored.index(), keypair.private().index());
        assert_eq!(restored.share(), keypair.private().share());
        assert_eq!(
            restored.public().fingerprint(),
            keypair.public().fingerprint()
        );
    }

    #[test]
    fn tampered_public_key_is_rejected() {
        let keypair = sample_keypair(Params::new(3, 2));
        let public = keypair.public();
        let cryptosystem = public.cryptosystem().clone();

        // Replace Y with an element of order 2.
        let mut bogus = public.clone();
        bogus.key = cryptosystem.prime() - 1_u32;
        let err = ThresholdPublicKey::from_bytes(&cryptosystem, &bogus.to_bytes()).unwrap_err();
        assert_eq!(err, KeyError::InvalidPublicKey);
    }
}
