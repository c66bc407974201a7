//! Single-recipient encryption and the on-disk formats.

use rand::thread_rng;

use modp_elgamal::{group::Cryptosystem, Ciphertext, PublicKey, SecretKey};

use crate::{cryptosystem_1024, cryptosystem_512};

#[test]
fn encrypt_decrypt_round_trip() {
    let mut rng = thread_rng();
    let keypair = cryptosystem_512().keypair(&mut rng);

    for message in [
        "x",
        "Dummy vote #0",
        "a ballot that does not fit into a single 511-bit block, \
         so the bit-length header has to do its job",
    ] {
        let ciphertext = keypair.public().encrypt_text(message, &mut rng);
        assert_eq!(keypair.secret().decrypt_to_text(&ciphertext).unwrap(), message);
    }
}

#[test]
fn parameter_file_round_trip() {
    let mut rng = thread_rng();
    let cryptosystem = cryptosystem_1024();

    // The parameter bytes are what a `.pvcryptosys` file holds; loading
    // them re-runs the full verification.
    let bytes = cryptosystem.to_bytes();
    let loaded = Cryptosystem::from_bytes(&bytes, &mut rng).unwrap();
    assert_eq!(loaded, cryptosystem);
    assert_eq!(loaded.fingerprint(), cryptosystem.fingerprint());

    let path = std::env::temp_dir().join(format!(
        "modp-elgamal-test-{}.pvcryptosys",
        std::process::id()
    ));
    cryptosystem.save(&path).unwrap();
    let loaded = Cryptosystem::load(&path, &mut rng).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded, cryptosystem);
}

#[test]
fn key_files_round_trip() {
    let mut rng = thread_rng();
    let cryptosystem = cryptosystem_512();
    let keypair = cryptosystem.keypair(&mut rng);

    let public = PublicKey::from_bytes(&cryptosystem, &keypair.public().to_bytes()).unwrap();
    assert_eq!(public, *keypair.public());

    let secret = SecretKey::from_bytes(&cryptosystem, &keypair.secret().to_bytes()).unwrap();
    let ciphertext = public.encrypt_text("restored keys still work", &mut rng);
    assert_eq!(
        secret.decrypt_to_text(&ciphertext).unwrap(),
        "restored keys still work"
    );
}

#[test]
fn ciphertext_files_round_trip() {
    let mut rng = thread_rng();
    let keypair = cryptosystem_512().keypair(&mut rng);

    let ciphertext = keypair.public().encrypt_text("persist this ballot", &mut rng);
    let restored = Ciphertext::from_bytes(&ciphertext.to_bytes()).unwrap();
    assert_eq!(restored, ciphertext);
    assert_eq!(restored.fingerprint(), ciphertext.fingerprint());
    assert_eq!(
        keypair.secret().decrypt_to_text(&restored).unwrap(),
        "persist this ballot"
    );
}

#[test]
fn keys_are_rejected_under_the_wrong_cryptosystem() {
    let mut rng = thread_rng();
    let keypair = cryptosystem_512().keypair(&mut rng);

    let other = crate::cryptosystem_256();
    assert!(PublicKey::from_bytes(&other, &keypair.public().to_bytes()).is_err());
    assert!(SecretKey::from_bytes(&other, &keypair.secret().to_bytes()).is_err());
}
