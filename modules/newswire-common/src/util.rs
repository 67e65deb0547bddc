// Shared normalization and vector-math helpers used by the pipeline and
// the store implementations.

use url::Url;

/// Canonicalize a URL for use as a uniqueness key: keep scheme+host+path,
/// drop the query string and fragment so tracking parameters do not create
/// spurious distinct identities. Malformed input falls back to the trimmed
/// raw string — normalization never fails.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut parsed) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    parsed.set_query(None);
    parsed.set_fragment(None);
    parsed.to_string().trim_end_matches('/').to_string()
}

/// Separators outlets use to append their name to headlines.
const SUFFIX_SEPARATORS: &[&str] = &[" | ", " – ", " — ", " - "];

/// Normalize a title into a comparison key: strip a trailing
/// `| Outlet` / `- Outlet` suffix, lowercase, replace punctuation with
/// spaces (letters — accented ones included — and digits survive), and
/// collapse whitespace. Used only for the fast-path exact-match
/// short-circuit, never as the sole authority.
pub fn title_key(raw: &str) -> String {
    let mut title = raw.trim();
    for sep in SUFFIX_SEPARATORS {
        if let Some(idx) = title.rfind(sep) {
            let tail = &title[idx + sep.len()..];
            // Outlet suffixes are short: a few words, no sentence marks.
            // "mbl.is" is a suffix; a dash mid-headline is not.
            let words = tail.split_whitespace().count();
            if (1..=4).contains(&words)
                && tail.chars().count() <= 40
                && !tail.contains(['?', '!'])
            {
                title = title[..idx].trim_end();
            }
        }
    }

    let lowered = title.to_lowercase();
    let mut key = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        if c.is_alphanumeric() {
            key.push(c);
        } else {
            key.push(' ');
        }
    }
    key.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cosine similarity for f32 embedding vectors. Returns 0.0 for zero-norm
/// or length-mismatched inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}
