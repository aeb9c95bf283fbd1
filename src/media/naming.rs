use url::Url;

/// Extensions kept from the media URL; anything else is treated as jpg
const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// Guesses the file extension from the URL path, defaulting to `jpg`
pub fn guess_extension(media_url: &str) -> &'static str {
    let ext = Url::parse(media_url)
        .ok()
        .and_then(|u| {
            u.path()
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_ascii_lowercase())
        })
        .unwrap_or_default();

    KNOWN_EXTENSIONS
        .iter()
        .find(|known| **known == ext)
        .copied()
        .unwrap_or("jpg")
}

pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/jpeg",
    }
}

/// `instagram_{author}_{short code}.{ext}`
pub fn media_filename(author: &str, short_code: &str, ext: &str) -> String {
    let sanitize = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            .collect()
    };
    let code = if short_code.is_empty() {
        "post".to_string()
    } else {
        sanitize(short_code)
    };
    format!("instagram_{}_{}.{}", sanitize(author), code, ext)
}

/// `Instagram - @{author} - {first 50 chars of caption}`
pub fn media_title(author: &str, caption: &str) -> String {
    format!("Instagram - @{} - {}", author, truncate_chars(caption, 50))
}

/// First 100 characters of the caption
pub fn alt_text(caption: &str) -> String {
    truncate_chars(caption, 100).to_string()
}

/// Longest prefix of `s` with at most `max` characters
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
