use base64::{Engine, prelude::BASE64_STANDARD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const SIGNATURE_SEPARATOR: char = '|';

/// Signs marker payloads so a browser can't forge a logged-in cookie.
#[derive(Clone)]
pub(crate) struct CookieSigner {
    secret: Hmac<Sha256>,
}

impl CookieSigner {
    pub fn new(secret: &[u8]) -> Self {
        let secret = Hmac::new_from_slice(secret).expect("Hmac accepts any secret length");
        Self { secret }
    }

    pub fn random() -> Self {
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        Self::new(&secret)
    }

    /// `base64(hmac(payload))|payload`
    pub fn sign(&self, payload: &str) -> String {
        let mut hmac = self.secret.clone();
        hmac.update(payload.as_bytes());
        let signature = BASE64_STANDARD.encode(hmac.finalize().into_bytes());

        format!("{signature}{SIGNATURE_SEPARATOR}{payload}")
    }

    /// Returns the payload when the signature checks out.
    pub fn verify<'a>(&self, value: &'a str) -> Option<&'a str> {
        let (signature, payload) = value.split_once(SIGNATURE_SEPARATOR)?;
        let received = BASE64_STANDARD.decode(signature).ok()?;

        let mut hmac = self.secret.clone();
        hmac.update(payload.as_bytes());
        let expected = hmac.finalize().into_bytes();

        if received.ct_eq(&expected[..]).into() {
            Some(payload)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod signed {
    use super::CookieSigner;

    #[test]
    fn sign_and_verify() {
        let signer = CookieSigner::new(b"secret");
        let signed = signer.sign(r#"{"service":"google"}"#);

        assert_eq!(signer.verify(&signed), Some(r#"{"service":"google"}"#));
    }

    #[test]
    fn tampered() {
        let signer = CookieSigner::new(b"secret");
        let signed = signer.sign(r#"{"service":"google"}"#);
        let tampered = signed.replace("google", "twitter");

        assert_eq!(signer.verify(&tampered), None);
        assert_eq!(signer.verify("no separator"), None);
        assert_eq!(signer.verify("%%%|payload"), None);
    }

    #[test]
    fn other_secret() {
        let signed = CookieSigner::new(b"secret").sign("payload");
        assert_eq!(CookieSigner::new(b"other").verify(&signed), None);
        assert_eq!(CookieSigner::random().verify(&signed), None);
    }
}
