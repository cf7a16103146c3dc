//! Content-type and filename helpers for uploaded media.

const FALLBACK_EXTENSION: &str = "bin";
const MAX_EXTENSION_LEN: usize = 10;

/// Whether a declared content type names an image (`image/*`).
pub fn is_image_content_type(content_type: &str) -> bool {
    let essence = content_type.trim();
    essence.len() > "image/".len()
        && essence
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

/// Extension used when the original bytes are stored untouched.
///
/// Takes the filename suffix, lowercased. Anything that is not a short run of
/// ASCII alphanumerics is replaced so it cannot smuggle a path into the
/// remote filename.
pub fn extension_from_filename(filename: &str) -> String {
    let suffix = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or_default();

    let valid = !suffix.is_empty()
        && suffix.len() <= MAX_EXTENSION_LEN
        && suffix.chars().all(|c| c.is_ascii_alphanumeric());

    if valid {
        suffix.to_ascii_lowercase()
    } else {
        tracing::warn!(
            "Upload filename {:?} has no usable extension, using .{}",
            filename,
            FALLBACK_EXTENSION
        );
        FALLBACK_EXTENSION.to_string()
    }
}
