/// Maximum accepted filename length in characters
pub const MAX_FILENAME_LEN: usize = 256;

/// Minimum accepted filename length in characters
pub const MIN_FILENAME_LEN: usize = 3;

/// Exact length of a hex encoded SHA-256 digest
pub const SHA256_HEX_LEN: usize = 64;

/// Passwords must be strictly longer than this
pub const MIN_PASSWORD_LEN: usize = 16;

const FILENAME_EDGE_CHARS: &[char] = &['.', '-', '_'];
const FILENAME_FORBIDDEN_PAIRS: &[&str] = &["--", "..", "__"];

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

fn is_filename_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

fn is_password_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')
}

/// Checks a client supplied backup filename.
///
/// Accepts 3 to 256 characters from `[A-Za-z0-9._-]`, not starting or ending
/// with `.`, `-` or `_`, and without any of `--`, `..`, `__`.
pub fn is_filename_allowed(filename: &str) -> bool {
    let len = filename.chars().count();
    if !(MIN_FILENAME_LEN..=MAX_FILENAME_LEN).contains(&len) {
        return false;
    }

    if filename.starts_with(FILENAME_EDGE_CHARS) || filename.ends_with(FILENAME_EDGE_CHARS) {
        return false;
    }

    if FILENAME_FORBIDDEN_PAIRS
        .iter()
        .any(|pair| filename.contains(pair))
    {
        return false;
    }

    filename.chars().all(is_filename_char)
}

/// Checks the shape of a client supplied SHA-256 checksum.
///
/// Only length and the alphanumeric class are checked, so letters outside
/// `a-f` pass as long as the string is 64 characters long.
pub fn is_sha256_allowed(checksum: &str) -> bool {
    checksum.chars().count() == SHA256_HEX_LEN && checksum.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Checks a client supplied password: longer than 16 characters, base64 alphabet only.
pub fn is_password_allowed(password: &str) -> bool {
    password.chars().count() > MIN_PASSWORD_LEN && password.chars().all(is_password_char)
}

/// Reduces a filename to a single safe path component.
///
/// Anything up to the last `/` or `\` is dropped, characters outside
/// `[A-Za-z0-9._-]` are removed and leading dots are stripped. Names that end
/// up empty are rejected. A name that already passed [`is_filename_allowed`]
/// comes back unchanged.
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    let last_component = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    if last_component.len() != filename.len() {
        tracing::warn!("Path separators stripped from filename: {:?}", filename);
    }

    let cleaned: String = last_component.chars().filter(|&c| is_filename_char(c)).collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        return Err(ValidationError {
            code: "INVALID_FILENAME",
            message: format!("Filename {:?} has no usable characters", filename),
        });
    }

    Ok(cleaned.to_string())
}
