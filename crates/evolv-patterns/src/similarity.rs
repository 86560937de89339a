//! Pattern-to-pattern similarity

use crate::pattern::ErrorPattern;

/// Levenshtein edit distance over Unicode scalar values
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// `1 - distance / max_len`, or 0.0 when both strings are empty
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / max_len as f64
}

/// Average of the factors both patterns define: error type equality,
/// category equality and stack-trace text similarity. 0.0 if none apply.
pub fn calculate_pattern_similarity(p1: &ErrorPattern, p2: &ErrorPattern) -> f64 {
    let mut factors = Vec::with_capacity(3);

    if let (Some(a), Some(b)) = (&p1.fields.error_type, &p2.fields.error_type) {
        factors.push(if a == b { 1.0 } else { 0.0 });
    }

    if !p1.category.is_empty() && !p2.category.is_empty() {
        factors.push(if p1.category == p2.category { 1.0 } else { 0.0 });
    }

    if let (Some(a), Some(b)) = (&p1.fields.stack_trace, &p2.fields.stack_trace) {
        factors.push(string_similarity(a, b));
    }

    if factors.is_empty() {
        return 0.0;
    }
    factors.iter().sum::<f64>() / factors.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternFields;

    fn pattern(category: &str, error_type: Option<&str>, stack: Option<&str>) -> ErrorPattern {
        ErrorPattern::new(
            "p",
            category,
            PatternFields {
                error_type: error_type.map(str::to_string),
                stack_trace: stack.map(str::to_string),
                ..PatternFields::default()
            },
            0.5,
        )
    }

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
        assert_eq!(levenshtein_distance("héllo", "hello"), 1);
    }

    #[test]
    fn test_string_similarity() {
        assert_eq!(string_similarity("abc", "abc"), 1.0);
        assert_eq!(string_similarity("", ""), 0.0);
        assert!((string_similarity("kitten", "sitting") - (1.0 - 3.0 / 7.0)).abs() < 1e-12);
    }

    #[test]
    fn test_identical_patterns() {
        let a = pattern("runtime", Some("NPE"), Some("at Foo.bar"));
        let b = pattern("runtime", Some("NPE"), Some("at Foo.bar"));
        assert_eq!(calculate_pattern_similarity(&a, &b), 1.0);
    }

    #[test]
    fn test_only_shared_factors_are_averaged() {
        // Error type on one side only: category (1.0) and stack (0.5) count.
        let a = pattern("runtime", Some("NPE"), Some("abcd"));
        let b = pattern("runtime", None, Some("abxy"));
        assert!((calculate_pattern_similarity(&a, &b) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_no_shared_factors() {
        let a = pattern("", Some("NPE"), None);
        let b = pattern("", None, Some("trace"));
        assert_eq!(calculate_pattern_similarity(&a, &b), 0.0);
    }
}
