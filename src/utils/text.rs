/// Lowercase `text` and join its space-separated words with `separator`.
///
/// Used to derive preference keys from panel titles ("MS Teachers" → "ms-teachers").
pub fn slugify(text: &str, separator: &str) -> String {
    text.to_lowercase()
        .split(' ')
        .collect::<Vec<_>>()
        .join(separator)
}

/// Truncate to `width` characters, appending an ellipsis when cut
pub fn fit(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width <= 1 {
        return text.chars().take(width).collect();
    }
    let mut out: String = text.chars().take(width - 1).collect();
    out.push('…');
    out
}

/// Split `text` into lines of at most `width` characters
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    if width == 0 || text.is_empty() {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(width)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("MS Teachers", "-"), "ms-teachers");
        assert_eq!(slugify("HS  Teachers", "_"), "hs__teachers");
        assert_eq!(slugify("", "-"), "");
    }

    #[test]
    fn test_fit_and_wrap() {
        assert_eq!(fit("Available Periods", 9), "Availabl…");
        assert_eq!(fit("Preps", 9), "Preps");
        assert_eq!(wrap("Advisor + Coach", 7), vec!["Advisor", " + Coac", "h"]);
        assert_eq!(wrap("", 7), vec![""]);
    }
}
