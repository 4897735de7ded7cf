#![allow(dead_code)] // not every test binary uses every helper

use std::time::Duration;

use shipshape::github::GithubClient;

/// Client pointed at a wiremock server, with the standard 30s timeout
/// shortened for tests.
pub fn client(base_url: &str) -> GithubClient {
    GithubClient::new(base_url, Duration::from_secs(5)).unwrap()
}

/// Deterministic throwaway RSA signing key, PEM-encoded.
pub fn test_pem() -> String {
    use rand_chacha::ChaCha8Rng;
    use rand_chacha::rand_core::SeedableRng;
    use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};

    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let key = rsa::RsaPrivateKey::new(&mut rng, 2048).unwrap();
    key.to_pkcs1_pem(LineEnding::LF).unwrap().to_string()
}
