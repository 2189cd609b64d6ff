#![forbid(unsafe_code)]

// Sent once by a subscriber from its private socket to the publisher's
// well-known path. The publisher learns the subscriber's address from the
// datagram's source; the payload only has to match.
pub const REGISTRATION_TOKEN: [u8; 8] = *b"REGISTER";

#[inline]
pub fn is_registration(datagram: &[u8]) -> bool {
    datagram == REGISTRATION_TOKEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_eight_bytes() {
        assert_eq!(REGISTRATION_TOKEN.len(), 8);
        assert!(is_registration(b"REGISTER"));
    }

    #[test]
    fn rejects_prefixes_and_trailing_bytes() {
        assert!(!is_registration(b"REGIST"));
        assert!(!is_registration(b"REGISTER\0"));
        assert!(!is_registration(b""));
    }
}
