//! Input validation and sanitization functions for aclgen
//!
//! Everything that ends up verbatim in a device configuration (remarks,
//! filter names) passes through here first.

/// Maximum length of a filter name accepted by the supported platforms.
pub const MAX_FILTER_NAME_LEN: usize = 64;

/// Width of the text after `remark ` on one line.
pub const REMARK_WIDTH: usize = 100;

/// Sanitizes text for use in a device remark.
///
/// Control characters (newlines included) become spaces and runs of
/// whitespace collapse to one space, so a remark can never break out onto
/// a configuration line of its own.
///
/// # Examples
///
/// ```
/// use aclgen::validators::sanitize_remark;
///
/// assert_eq!(sanitize_remark("  allow\tDNS \n from corp "), "allow DNS from corp");
/// assert!(!sanitize_remark("line\npermit ip any any").contains('\n'));
/// ```
pub fn sanitize_remark(input: &str) -> String {
    input
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sanitizes `text` and splits it into chunks of at most `width`
/// characters, breaking at spaces where possible.
///
/// Words longer than `width` are split hard. Empty input yields no chunks.
///
/// # Examples
///
/// ```
/// use aclgen::validators::wrap_remark;
///
/// assert_eq!(wrap_remark("one two three", 7), vec!["one two", "three"]);
/// assert!(wrap_remark("   ", 10).is_empty());
/// ```
pub fn wrap_remark(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in sanitize_remark(text).split(' ').filter(|w| !w.is_empty()) {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.push(word.drain(..width).collect());
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.len()
        } else {
            current.chars().count() + 1 + word.len()
        };
        if needed > width {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Validates a filter name taken from a header target.
///
/// # Errors
///
/// Returns `Err` if:
/// - Name is empty
/// - Name contains whitespace or control characters
/// - Name exceeds 64 characters
pub fn validate_filter_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Filter name is missing (first target option)".to_string());
    }
    if name.chars().count() > MAX_FILTER_NAME_LEN {
        return Err(format!(
            "Filter name too long (max {MAX_FILTER_NAME_LEN} characters)"
        ));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err("Filter name cannot contain whitespace".to_string());
    }
    Ok(())
}
