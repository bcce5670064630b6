//! Remote shell command construction.
//!
//! Pure string builders for the file operations the session port exposes.
//! Everything interpolated into a command goes through [`shell_quote`].

/// Quote `value` as a single POSIX shell word.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Escape `text` so `sed` matches it literally inside an `s/…/…/` pattern.
fn sed_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '/' | '.' | '*' | '[' | ']' | '^' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape `text` for the replacement half of an `s/…/…/` expression.
fn sed_replacement(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '/' | '&') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// In-place substitution of every literal occurrence of `find` with `replace`.
#[must_use]
pub fn substitute_command(path: &str, find: &str, replace: &str) -> String {
    let script = format!("s/{}/{}/g", sed_pattern(find), sed_replacement(replace));
    format!("sed -i -e {} {}", shell_quote(&script), shell_quote(path))
}

/// Append `line` to `path` unless an identical line is already present.
#[must_use]
pub fn append_command(path: &str, line: &str) -> String {
    let path = shell_quote(path);
    let line = shell_quote(line);
    format!("grep -qxF -- {line} {path} 2>/dev/null || printf '%s\\n' {line} >> {path}")
}
