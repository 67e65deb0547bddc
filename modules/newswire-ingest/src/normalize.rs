//! Normalizer — canonicalizes a candidate's identity key (URL) and its
//! comparison key (title) so superficially different strings referring to
//! the same resource compare equal. Best-effort, never fails.

use newswire_common::{normalize_url, title_key, Candidate, NormalizedKey};

pub fn normalize(candidate: &Candidate) -> NormalizedKey {
    NormalizedKey {
        url: normalize_url(&candidate.url),
        title_key: title_key(&candidate.title),
    }
}
