//! Mixnet scenarios: chained shuffles, proofs, and tally correctness.

use rand::{seq::SliceRandom, thread_rng};

use modp_elgamal::{
    sharing::Params,
    shuffle::{CiphertextCollection, Error as ShuffleError},
};

use crate::{cryptosystem_256, Rig};

fn collect_votes(rig: &Rig, votes: &[String]) -> CiphertextCollection {
    let mut rng = thread_rng();
    let mut collection = CiphertextCollection::new(rig.public().clone());
    for vote in votes {
        collection
            .add_ciphertext(rig.public().encrypt_text(vote, &mut rng))
            .unwrap();
    }
    collection
}

#[test]
fn three_mixes_preserve_the_vote_multiset() {
    let mut rng = thread_rng();
    let rig = Rig::new(cryptosystem_256(), Params::new(5, 3), &mut rng);

    let votes: Vec<String> = (0..20).map(|i| format!("Dummy vote #{i}")).collect();
    let collection = collect_votes(&rig, &votes);

    // A random 3-subset of trustees runs the mix chain; each link is a
    // shuffle with proof, verified against its endpoints.
    let mut mixers: Vec<usize> = (0..5).collect();
    mixers.shuffle(&mut rng);
    mixers.truncate(3);

    let mut collections = vec![collection];
    for _ in &mixers {
        let (next, proof) = collections.last().unwrap().shuffle_with_proof(&mut rng).unwrap();
        proof.verify(collections.last().unwrap(), &next).unwrap();
        collections.push(next);
    }

    // The mixers (a decryption quorum) decrypt the final collection; the
    // tally is the original multiset of votes, in mixed order.
    let last_mix = collections.last().unwrap();
    let mut tally: Vec<String> = last_mix
        .iter()
        .map(|ballot| rig.decrypt_with(ballot, &mixers, &mut rng).unwrap())
        .collect();

    let mut expected = votes.clone();
    expected.sort();
    tally.sort();
    assert_eq!(tally, expected);
}

#[test]
fn substituted_ballot_invalidates_the_mix_proof() {
    let mut rng = thread_rng();
    let rig = Rig::new(cryptosystem_256(), Params::new(3, 2), &mut rng);

    let votes: Vec<String> = (0..8).map(|i| format!("Dummy vote #{i}")).collect();
    let collection = collect_votes(&rig, &votes);

    let (mixed_once, first_proof) = collection.shuffle_with_proof(&mut rng).unwrap();
    let (mixed_twice, second_proof) = mixed_once.shuffle_with_proof(&mut rng).unwrap();
    first_proof.verify(&collection, &mixed_once).unwrap();
    second_proof.verify(&mixed_once, &mixed_twice).unwrap();

    // Replace one ballot of the final collection with a fresh encryption
    // of a vote already present. The multiset of plaintexts is unchanged,
    // yet the substitution must break the proof chain.
    let mut tampered = CiphertextCollection::new(rig.public().clone());
    for (index, ballot) in mixed_twice.iter().enumerate() {
        let ballot = if index == 3 {
            rig.public().encrypt_text("Dummy vote #0", &mut rng)
        } else {
            ballot.clone()
        };
        tampered.add_ciphertext(ballot).unwrap();
    }

    assert_eq!(
        second_proof.verify(&mixed_once, &tampered).unwrap_err(),
        ShuffleError::InvalidShuffleProof
    );
    // The untouched first link still verifies.
    first_proof.verify(&collection, &mixed_once).unwrap();
}

#[test]
fn shuffled_ballots_remain_decryptable_per_position() {
    let mut rng = thread_rng();
    let rig = Rig::new(cryptosystem_256(), Params::new(3, 2), &mut rng);

    let votes: Vec<String> = (0..4).map(|i| format!("Dummy vote #{i}")).collect();
    let collection = collect_votes(&rig, &votes);
    let (shuffled, proof) = collection.shuffle_with_proof(&mut rng).unwrap();
    proof.verify(&collection, &shuffled).unwrap();

    // Decrypting the shuffled collection yields exactly the original
    // votes, each exactly once.
    let mut seen: Vec<String> = shuffled
        .iter()
        .map(|ballot| rig.decrypt_with(ballot, &[0, 2], &mut rng).unwrap())
        .collect();
    seen.sort();
    let mut expected = votes;
    expected.sort();
    assert_eq!(seen, expected);
}
