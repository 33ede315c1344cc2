use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use std::sync::LazyLock;

static DATA_URI_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(\s*data:(image/[A-Za-z0-9.+-]+);base64,([A-Za-z0-9+/=\s]+)\)")
        .expect("data URI pattern is valid")
});

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!-- filingkit:image:(\d+) -->").expect("placeholder pattern is valid")
});

/// A raster image lifted out of a Markdown stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub alt: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

/// The marker a recognizer leaves where the `index`-th image belongs.
pub fn image_placeholder(index: usize) -> String {
    format!("<!-- filingkit:image:{} -->", index)
}

/// Replaces every `![alt](data:image/...;base64,...)` with a placeholder and
/// returns the decoded images in order of appearance.
///
/// A data URI whose payload does not decode is left in the text untouched.
pub fn lift_data_uri_images(markdown: &str) -> (String, Vec<EmbeddedImage>) {
    let mut images = Vec::new();
    let mut out = String::with_capacity(markdown.len());
    let mut last = 0;

    for caps in DATA_URI_IMAGE.captures_iter(markdown) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        let payload: String = caps[3].chars().filter(|c| !c.is_whitespace()).collect();
        let Ok(data) = STANDARD.decode(payload.as_bytes()) else {
            tracing::warn!("Skipping undecodable embedded image ({} bytes of base64)", payload.len());
            continue;
        };

        out.push_str(&markdown[last..whole.start]);
        out.push_str(&image_placeholder(images.len()));
        last = whole.end;

        images.push(EmbeddedImage {
            alt: caps[1].to_string(),
            media_type: caps[2].to_ascii_lowercase(),
            data,
        });
    }

    out.push_str(&markdown[last..]);
    (out, images)
}

/// Substitutes each placeholder with `replacement(index)`. Placeholders with no
/// replacement (out-of-range indices) are dropped.
pub fn replace_placeholders<F>(markup: &str, mut replacement: F) -> String
where
    F: FnMut(usize) -> Option<String>,
{
    PLACEHOLDER
        .replace_all(markup, |caps: &regex::Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(&mut replacement)
                .unwrap_or_default()
        })
        .into_owned()
}

/// File extension for an image media type, falling back to sniffing the bytes.
pub fn image_extension(media_type: &str, data: &[u8]) -> &'static str {
    match media_type {
        "image/png" => return "png",
        "image/jpeg" | "image/jpg" => return "jpg",
        "image/gif" => return "gif",
        "image/svg+xml" => return "svg",
        "image/bmp" => return "bmp",
        "image/webp" => return "webp",
        _ => {}
    }
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        "png"
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "jpg"
    } else if data.starts_with(b"GIF8") {
        "gif"
    } else {
        "bin"
    }
}
