/// Instagram-handle extraction from bios, page text and URLs.
///
/// Handles are best-effort: a text with no discoverable handle is not an
/// error, the caller just leaves the field empty.

// Path segments under instagram.com that are never profile handles.
const SYSTEM_PATHS: [&str; 7] = ["p", "reel", "tv", "stories", "explore", "accounts", "direct"];

// Words that follow "IG"/"insta" in bios without being a username.
const FILLER_WORDS: [&str; 5] = ["follow", "me", "on", "for", "more"];

/// Pulls a handle out of an `instagram.com/<handle>` URL anywhere in the
/// input. Works on full pages of text as well as bare links.
pub fn handle_from_url(text: &str) -> Option<String> {
    const MARKER: &str = "instagram.com/";

    let mut from = 0;
    while let Some(pos) = find_ignore_ascii_case(&text[from..], MARKER) {
        let rest = &text[from + pos + MARKER.len()..];
        let candidate = leading_handle_chars(rest);
        if !candidate.is_empty() && !SYSTEM_PATHS.contains(&candidate.to_lowercase().as_str()) {
            return Some(candidate.to_string());
        }
        from += pos + MARKER.len();
    }
    None
}

/// Pulls a handle out of free bio text.
///
/// Strategies, in order:
/// 1. A plain `instagram.com/<handle>` link.
/// 2. An `IG`/`insta`/`instagram` marker followed by `:`/whitespace and an
///    optional `@`, e.g. "IG: @tokyo.matcha" or "insta tokyomatcha".
pub fn handle_from_text(text: &str) -> Option<String> {
    if let Some(handle) = handle_from_url(text) {
        return Some(handle);
    }

    for marker in ["instagram", "insta", "ig"] {
        let mut from = 0;
        while let Some(pos) = find_ignore_ascii_case(&text[from..], marker) {
            let start = from + pos;
            let boundary_before =
                start == 0 || !text.as_bytes()[start - 1].is_ascii_alphanumeric();
            if boundary_before {
                let rest = &text[start + marker.len()..];
                if let Some(handle) = handle_after_marker(rest) {
                    return Some(handle);
                }
            }
            from = start + marker.len();
        }
    }
    None
}

fn handle_after_marker(rest: &str) -> Option<String> {
    // A separator is required so that "insta" never eats into "instagram".
    if !rest.starts_with([' ', '\t', ':', '@']) {
        return None;
    }
    let rest = rest.trim_start_matches([' ', '\t', ':']);
    let rest = rest.strip_prefix('@').unwrap_or(rest);

    let candidate = leading_handle_chars(rest);
    if candidate.is_empty() || FILLER_WORDS.contains(&candidate.to_lowercase().as_str()) {
        return None;
    }
    Some(candidate.to_string())
}

fn leading_handle_chars(text: &str) -> &str {
    let end = text
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '.' && c != '_')
        .unwrap_or(text.len());
    text[..end].trim_end_matches('.')
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::{handle_from_text, handle_from_url};

    #[test]
    fn handle_from_url_valid() {
        let urls = [
            ("https://www.instagram.com/bluebottle/", "bluebottle"),
            ("https://instagram.com/tokyo.matcha", "tokyo.matcha"),
            ("instagram.com/cafe_kitsune/", "cafe_kitsune"),
            ("see https://WWW.INSTAGRAM.COM/LoudCafe for pics", "LoudCafe"),
        ];
        for (url, expected) in urls {
            assert_eq!(handle_from_url(url).as_deref(), Some(expected), "{url}");
        }
    }

    #[test]
    fn handle_from_url_skips_system_paths() {
        assert_eq!(handle_from_url("https://www.instagram.com/p/Cx1abc/"), None);
        assert_eq!(handle_from_url("https://instagram.com/explore/tags/matcha"), None);
        // A system path followed by a real profile link still resolves.
        assert_eq!(
            handle_from_url("instagram.com/reel/abc instagram.com/realcafe").as_deref(),
            Some("realcafe")
        );
    }

    #[test]
    fn handle_from_text_markers() {
        let bios = [
            ("IG: @tokyo.matcha \u{2615}", "tokyo.matcha"),
            ("Insta: cafe_kitsune", "cafe_kitsune"),
            ("find us on instagram @espresso.lab", "espresso.lab"),
            ("ig slowpour_coffee", "slowpour_coffee"),
            ("bio with link instagram.com/beanthere.done", "beanthere.done"),
        ];
        for (bio, expected) in bios {
            assert_eq!(handle_from_text(bio).as_deref(), Some(expected), "{bio}");
        }
    }

    #[test]
    fn handle_from_text_rejects_noise() {
        let bios = [
            "best matcha in shibuya",
            "follow us on instagram for more",
            "night owl cafe, open late",
            "IG:",
        ];
        for bio in bios {
            assert_eq!(handle_from_text(bio), None, "{bio}");
        }
    }

    #[test]
    fn trailing_punctuation_is_trimmed() {
        assert_eq!(
            handle_from_text("IG: @tokyo.matcha. DM for orders").as_deref(),
            Some("tokyo.matcha")
        );
    }
}
