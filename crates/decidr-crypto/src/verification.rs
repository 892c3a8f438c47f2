//! Human-comparable verification codes.
//!
//! Both endpoints turn their transcript fingerprint into a short list of
//! BIP-39 words and the humans compare them out of band. A transposed or
//! substituted word means the two sides did not complete the same handshake.

/// Bits consumed per word (2^11 = 2048 wordlist entries).
const BITS_PER_WORD: usize = 11;

/// Word count used by the endpoints.
pub const DEFAULT_WORD_COUNT: usize = 6;

/// English BIP-39 word at `index`. Only the low 11 bits are used.
pub fn word_at(index: u16) -> &'static str {
    bip39::Language::English.word_list()[usize::from(index) & 0x7ff]
}

/// Derive up to `word_count` words from `fingerprint`.
///
/// The fingerprint is read as a bit string, most significant bit of each
/// byte first, and cut into consecutive 11-bit groups. Stops after
/// `word_count` words or when fewer than 11 bits remain.
pub fn verification_words(fingerprint: &[u8], word_count: usize) -> Vec<&'static str> {
    let available = fingerprint.len() * 8 / BITS_PER_WORD;
    (0..available.min(word_count))
        .map(|word| {
            let start = word * BITS_PER_WORD;
            let index = (start..start + BITS_PER_WORD).fold(0u16, |acc, bit| {
                let set = fingerprint[bit / 8] & (0x80 >> (bit % 8)) != 0;
                (acc << 1) | u16::from(set)
            });
            word_at(index)
        })
        .collect()
}

/// Verification words joined with `-`, e.g. `vanish-old-tonight-...`.
pub fn verification_code(fingerprint: &[u8], word_count: usize) -> String {
    verification_words(fingerprint, word_count).join("-")
}
