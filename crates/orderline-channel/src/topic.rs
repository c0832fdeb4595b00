//! Topic-exchange routing.
//!
//! Routing keys and binding keys are dot-separated words. In a binding key
//! `*` stands for exactly one word and `#` for zero or more words.

/// Whether a message published with `routing_key` reaches a queue bound
/// with `binding_key`.
#[must_use]
pub fn topic_matches(binding_key: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = binding_key.split('.').collect();
    let words: Vec<&str> = if routing_key.is_empty() {
        Vec::new()
    } else {
        routing_key.split('.').collect()
    };
    matches_words(&pattern, &words)
}

fn matches_words(pattern: &[&str], words: &[&str]) -> bool {
    match pattern.split_first() {
        None => words.is_empty(),
        Some((&"#", rest)) => (0..=words.len()).any(|skip| matches_words(rest, &words[skip..])),
        Some((&"*", rest)) => !words.is_empty() && matches_words(rest, &words[1..]),
        Some((word, rest)) => words.first() == Some(word) && matches_words(rest, &words[1..]),
    }
}
