//! One-time verification code generation.

use rand::Rng;

/// Source of one-time codes.
pub trait OtpGenerator: Send + Sync {
    /// Produce a fresh code of exactly `length` characters.
    fn random_secret(&self, length: usize) -> String;
}

/// Decimal codes drawn from the thread-local CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericOtp;

impl OtpGenerator for NumericOtp {
    fn random_secret(&self, length: usize) -> String {
        let mut rng = rand::rng();
        (0..length)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_length_and_alphabet() {
        let code = NumericOtp.random_secret(6);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_zero_length() {
        assert_eq!(NumericOtp.random_secret(0), "");
    }

    #[test]
    fn test_codes_vary() {
        // 20 six-digit codes colliding on a single value is not a realistic outcome
        let first = NumericOtp.random_secret(6);
        assert!((0..20).any(|_| NumericOtp.random_secret(6) != first));
    }
}
