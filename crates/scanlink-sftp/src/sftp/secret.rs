use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

/// Mutable byte copy of a credential that is wiped as soon as it has been
/// lent out once, and again when dropped.
pub struct SecretBuffer {
    bytes: Vec<u8>,
}

impl SecretBuffer {
    pub fn from_secret(secret: &SecretString) -> Self {
        Self {
            bytes: secret.expose_secret().as_bytes().to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hand the plaintext to `f`. Every byte is zeroed when `f` returns,
    /// whether it succeeded, failed or panicked.
    pub fn lend<R>(&mut self, f: impl FnOnce(&[u8]) -> R) -> R {
        let guard = ScrubOnExit(self.bytes.as_mut_slice());
        let result = f(&*guard.0);
        drop(guard);
        result
    }

    /// True once every byte has been overwritten with zero.
    pub fn is_scrubbed(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }
}

struct ScrubOnExit<'a>(&'a mut [u8]);

impl Drop for ScrubOnExit<'_> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBuffer([REDACTED; {} bytes])", self.bytes.len())
    }
}

/// Copy `secret` into a scrubbed buffer and lend it to `f` once.
pub fn with_secret<R>(secret: &SecretString, f: impl FnOnce(&[u8]) -> R) -> R {
    SecretBuffer::from_secret(secret).lend(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn secret() -> SecretString {
        SecretString::new("hunter2".to_string())
    }

    #[test]
    fn test_scrubbed_after_success() {
        let mut buf = SecretBuffer::from_secret(&secret());
        let seen = buf.lend(|b| b.to_vec());
        assert_eq!(seen, b"hunter2");
        assert_eq!(buf.len(), 7);
        assert!(buf.is_scrubbed());
    }

    #[test]
    fn test_scrubbed_after_error() {
        let mut buf = SecretBuffer::from_secret(&secret());
        let res: Result<(), &str> = buf.lend(|_| Err("rejected"));
        assert!(res.is_err());
        assert!(buf.is_scrubbed());
    }

    #[test]
    fn test_scrubbed_after_panic() {
        let mut buf = SecretBuffer::from_secret(&secret());
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            buf.lend(|_| panic!("transport blew up"));
        }));
        assert!(outcome.is_err());
        assert!(buf.is_scrubbed());
    }

    #[test]
    fn test_debug_redacts() {
        let buf = SecretBuffer::from_secret(&secret());
        let shown = format!("{:?}", buf);
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("7 bytes"));
    }

    #[test]
    fn test_with_secret_passes_plaintext() {
        let len = with_secret(&secret(), |b| b.len());
        assert_eq!(len, 7);
    }
}
