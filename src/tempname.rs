//! Long-path-safe temporary-file naming.
//!
//! Staging an in-progress write (write to a temp name, then atomically
//! rename into place) needs a temp name that stays short regardless of how
//! long the real basename is, so the staged path doesn't trip a backend's
//! path-length limit even when the real name nearly does.

/// Upper bound on a generated temp name's length, chosen to stay well
/// under Windows' legacy 260-character `MAX_PATH` once joined with a
/// reasonably deep root path.
pub const MAX_TEMP_NAME_LEN: usize = 160;

const SUFFIX: &str = ".tmp";

#[cfg(windows)]
const PREFIX: &str = "~";
#[cfg(not(windows))]
const PREFIX: &str = ".";

/// Build a temp name for `basename`: the platform's conventional temp
/// marker, then as much of `basename` as fits, then `.tmp` — truncating by
/// characters (not bytes, so multi-byte UTF-8 is never split) so the whole
/// name never exceeds [`MAX_TEMP_NAME_LEN`].
pub fn temp_name(basename: &str) -> String {
    let budget = MAX_TEMP_NAME_LEN.saturating_sub(PREFIX.len() + SUFFIX.len());
    let truncated: String = basename.chars().take(budget).collect();
    format!("{PREFIX}{truncated}{SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_basename_is_truncated_within_limit() {
        let basename = "a".repeat(300);
        let name = temp_name(&basename);
        assert!(name.chars().count() <= MAX_TEMP_NAME_LEN);
        assert!(name.ends_with(".tmp"));
        assert!(name.starts_with(PREFIX));
    }

    #[test]
    fn short_basename_wraps_without_truncation() {
        let name = temp_name("report.csv");
        assert_eq!(name, format!("{PREFIX}report.csv{SUFFIX}"));
    }

    #[test]
    fn unicode_basename_truncates_by_char_not_byte() {
        let basename = "シ".repeat(300);
        let name = temp_name(&basename);
        assert!(name.chars().count() <= MAX_TEMP_NAME_LEN);
    }

    #[test]
    fn empty_basename_still_produces_valid_name() {
        let name = temp_name("");
        assert_eq!(name, format!("{PREFIX}{SUFFIX}"));
    }
}
