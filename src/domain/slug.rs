//! URL slug and default SEO derivation.

use crate::models::{CourseVariant, SeoDetails};

/// Characters of the course description kept in the default SEO description.
pub const SEO_DESCRIPTION_CHARS: usize = 150;

/// Lowercase, hyphen-separated, ASCII alphanumeric slug for `name`.
///
/// Punctuation is dropped, runs of whitespace, `-` and `_` collapse to a single
/// hyphen, and leading/trailing hyphens are trimmed. Applying it twice yields
/// the same slug.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_separator = true;
        }
    }

    slug
}

pub fn default_seo_title(name: &str, variant: CourseVariant) -> String {
    format!("Learn {} | {} Course", name.trim(), variant.label())
}

pub fn default_seo_description(description: &str) -> Option<String> {
    let description = description.trim();
    if description.is_empty() {
        return None;
    }
    let head: String = description.chars().take(SEO_DESCRIPTION_CHARS).collect();
    Some(format!("{}...", head.trim_end()))
}

/// Fill absent SEO fields. Explicitly set values are never replaced.
pub fn fill_seo_defaults(
    seo: &mut SeoDetails,
    name: &str,
    description: &str,
    variant: CourseVariant,
) {
    if is_blank(seo.title.as_deref()) {
        seo.title = Some(default_seo_title(name, variant));
    }
    if is_blank(seo.description.as_deref()) {
        seo.description = default_seo_description(description);
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}
