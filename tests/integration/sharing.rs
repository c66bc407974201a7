//! Distributed key generation and threshold decryption scenarios.

use rand::thread_rng;

use modp_elgamal::{
    sharing::{Params, ThresholdEncryptionSetUp},
    DecryptionError, PartialDecryption, ThresholdDecryptionCombinator,
};

use crate::{cryptosystem_1024, cryptosystem_256, Rig};

#[test]
fn five_trustee_setup_agrees_on_fingerprints() {
    let mut rng = thread_rng();
    let rig = Rig::new(cryptosystem_1024(), Params::new(5, 3), &mut rng);

    // Every trustee computed the setup fingerprint over its own view of
    // the commitments; all five must agree before anyone trusts the keys.
    let reference = rig.setup_fingerprints[0];
    for fingerprint in &rig.setup_fingerprints[1..] {
        assert_eq!(*fingerprint, reference);
    }

    // The election server, which holds no secrets, derives the same
    // fingerprint and the same threshold public key from the published
    // commitments alone.
    let mut server = ThresholdEncryptionSetUp::new(rig.cryptosystem.clone(), Params::new(5, 3));
    for (j, commitment) in rig.commitments.iter().enumerate() {
        // Commitments travel through the bulletin board as bytes.
        let published =
            modp_elgamal::sharing::ThresholdEncryptionCommitment::from_bytes(&commitment.to_bytes())
                .unwrap();
        server.add_trustee_commitment(j, published).unwrap();
    }
    assert_eq!(server.fingerprint().unwrap(), reference);
    let server_key = server.generate_public_key().unwrap();
    assert_eq!(
        server_key.fingerprint(),
        rig.threshold_keys[0].public().fingerprint()
    );

    // All trustees hold the same public key.
    for keypair in &rig.threshold_keys[1..] {
        assert_eq!(keypair.public().fingerprint(), server_key.fingerprint());
    }

    // And a quorum of three can decrypt a ballot.
    let ciphertext = rig.public().encrypt_text("Dummy vote #0", &mut rng);
    assert_eq!(
        rig.decrypt_with(&ciphertext, &[0, 2, 4], &mut rng).unwrap(),
        "Dummy vote #0"
    );
}

#[test]
fn vote_receipts_match_stored_ballots() {
    let mut rng = thread_rng();
    let rig = Rig::new(cryptosystem_256(), Params::new(5, 3), &mut rng);

    let votes: Vec<String> = (0..20).map(|i| format!("Dummy vote #{i}")).collect();
    let ballots: Vec<_> = votes
        .iter()
        .map(|vote| rig.public().encrypt_text(vote, &mut rng))
        .collect();
    // Receipts are taken before upload...
    let receipts: Vec<_> = ballots.iter().map(|ballot| ballot.fingerprint()).collect();

    // ...and compared against what the server stored (bytes round trip).
    for (ballot, receipt) in ballots.iter().zip(&receipts) {
        let stored = modp_elgamal::Ciphertext::from_bytes(&ballot.to_bytes()).unwrap();
        assert_eq!(stored.fingerprint(), *receipt);
    }

    // Every ballot still decrypts to its vote.
    for (ballot, vote) in ballots.iter().zip(&votes) {
        assert_eq!(
            rig.decrypt_with(ballot, &[1, 2, 3], &mut rng).unwrap(),
            *vote
        );
    }
}

#[test]
fn tampered_partial_decryption_is_rejected() {
    let mut rng = thread_rng();
    let rig = Rig::new(cryptosystem_256(), Params::new(5, 3), &mut rng);

    let ciphertext = rig.public().encrypt_text("Dummy vote #13", &mut rng);
    let mut combinator =
        ThresholdDecryptionCombinator::new(rig.public().clone(), ciphertext.clone()).unwrap();

    for trustee in [0, 1] {
        let share = rig.threshold_keys[trustee]
            .private()
            .partial_decryption(&ciphertext, &mut rng)
            .unwrap();
        combinator.add_partial_decryption(share).unwrap();
    }

    // The third cooperating trustee submits a share with the response `u`
    // of one block incremented by 1. The response is the final field of
    // the serialized share, so the mutation is a single-byte edit of the
    // file a real attacker would have to make.
    let share = rig.threshold_keys[2]
        .private()
        .partial_decryption(&ciphertext, &mut rng)
        .unwrap();
    let mut bytes = share.to_bytes();
    let last = bytes.len() - 1;
    bytes[last] = bytes[last].wrapping_add(1);
    let forged = PartialDecryption::from_bytes(&bytes).unwrap();

    assert_eq!(
        combinator.add_partial_decryption(forged).unwrap_err(),
        DecryptionError::InvalidPartialDecryptionProof
    );

    // The honest share still goes through afterwards.
    combinator.add_partial_decryption(share).unwrap();
    assert_eq!(combinator.decrypt_to_text().unwrap(), "Dummy vote #13");
}

#[test]
fn two_of_three_survive_key_loss() {
    let mut rng = thread_rng();
    let mut rig = Rig::new(cryptosystem_256(), Params::new(3, 2), &mut rng);

    let votes: Vec<String> = (0..5).map(|i| format!("Dummy vote #{i}")).collect();
    let ballots: Vec<_> = votes
        .iter()
        .map(|vote| rig.public().encrypt_text(vote, &mut rng))
        .collect();

    // Trustee 0's key material is destroyed.
    rig.threshold_keys.remove(0);
    rig.trustee_keys.remove(0);

    // Trustees 1 and 2 (now at positions 0 and 1) still decrypt all votes.
    for (ballot, vote) in ballots.iter().zip(&votes) {
        assert_eq!(rig.decrypt_with(ballot, &[0, 1], &mut rng).unwrap(), *vote);
    }

    // Any single trustee alone is below the threshold.
    for trustee in 0..2 {
        let mut combinator =
            ThresholdDecryptionCombinator::new(rig.public().clone(), ballots[0].clone()).unwrap();
        let share = rig.threshold_keys[trustee]
            .private()
            .partial_decryption(&ballots[0], &mut rng)
            .unwrap();
        combinator.add_partial_decryption(share).unwrap();
        assert_eq!(
            combinator.decrypt_to_bytes().unwrap_err(),
            DecryptionError::NotEnoughShares
        );
    }
}
