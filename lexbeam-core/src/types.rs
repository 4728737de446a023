use crate::{LexbeamError, Result};

/// One phrasal constraint: an ordered sequence of vocabulary token ids.
pub type RawPhrase = Vec<u32>;

/// The raw constraints for one sentence, each a list of token ids.
pub type RawPhraseList = Vec<RawPhrase>;

/// Reserved "no token" / padding sentinel. Never a valid constraint token
/// and never emitted in avoided or wanted sets.
pub const PAD_ID: u32 = 0;

/// Validate raw constraint phrases before trie construction.
///
/// Rejects empty phrases and the reserved id 0; when `vocab_size` is given,
/// also rejects out-of-vocabulary ids.
pub fn validate_phrases(phrases: &[RawPhrase], vocab_size: Option<usize>) -> Result<()> {
    for (i, phrase) in phrases.iter().enumerate() {
        if phrase.is_empty() {
            return Err(LexbeamError::EmptyPhrase(i));
        }
        for &token in phrase {
            if token == PAD_ID {
                return Err(LexbeamError::ReservedToken(i));
            }
            if let Some(vocab_size) = vocab_size {
                if token as usize >= vocab_size {
                    return Err(LexbeamError::OutOfVocabulary { token, vocab_size });
                }
            }
        }
    }
    Ok(())
}
