//! Naming helpers shared by the build stages.
//!
//! Names are deterministic and human readable, but they are a debugging side
//! channel: stages pass [`NodeRef`](crate::id::NodeRef) handles, never
//! re-derive names.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::ConfigError;

/// Common node-name suffixes.
pub mod suffix {
    pub const LOCATOR: &str = "LOC";
    pub const BONE: &str = "BONE";
    pub const FK_JOINT: &str = "FK_JNT";
    pub const IK_JOINT: &str = "IK_JNT";
    pub const CONTROL: &str = "CTRL";
    pub const SECONDARY_CONTROL: &str = "SCND_CTRL";
    pub const ZERO: &str = "ZERO";
    pub const OFFSET: &str = "OFS";
    pub const SPACE: &str = "SPACE";
    pub const DRIVEN: &str = "SRT";
    pub const GROUP: &str = "GRP";
    pub const IK_HANDLE: &str = "IKH";
    pub const MODULE: &str = "MOD";
    pub const SHAPE: &str = "Shape";
}

static END_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+$").expect("static pattern compiles"));

/// Uppercase letter for a 1-based segment index: 1 -> `A`, 26 -> `Z`.
pub fn alpha_index(index: u32) -> Result<char, ConfigError> {
    if index == 0 || index > 26 {
        return Err(ConfigError::SegmentRangeExceeded {
            count: index,
            max: 26,
        });
    }
    Ok((b'A' + (index - 1) as u8) as char)
}

pub fn with_suffix(base: &str, suffix: &str) -> String {
    format!("{base}_{suffix}")
}

/// Replace the last occurrence of `find` in `name`, or append `replace` if
/// `find` is absent.
pub fn swap_suffix(name: &str, find: &str, replace: &str) -> String {
    match name.rfind(find) {
        Some(at) => {
            let mut out = String::with_capacity(name.len());
            out.push_str(&name[..at]);
            out.push_str(replace);
            out.push_str(&name[at + find.len()..]);
            out
        }
        None => with_suffix(name, replace),
    }
}

/// Drop trailing copy digits, `wrist_IK_JNT1` -> `wrist_IK_JNT`.
pub fn strip_end_digits(name: &str) -> String {
    END_DIGITS.replace(name, "").into_owned()
}

/// Zero-padded two digit index, the numbering used by finger and spine
/// segments.
pub fn zero_pad(index: u32) -> String {
    format!("{index:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_indices() {
        assert_eq!(alpha_index(1).unwrap(), 'A');
        assert_eq!(alpha_index(2).unwrap(), 'B');
        assert_eq!(alpha_index(26).unwrap(), 'Z');
        assert!(alpha_index(0).is_err());
        assert!(alpha_index(27).is_err());
    }

    #[test]
    fn suffix_swapping() {
        assert_eq!(swap_suffix("L_wrist_LOC", "LOC", "BONE"), "L_wrist_BONE");
        assert_eq!(
            swap_suffix("L_wrist_FK_JNT", "JNT", "CTRL"),
            "L_wrist_FK_CTRL"
        );
        assert_eq!(swap_suffix("L_wrist", "LOC", "BONE"), "L_wrist_BONE");
    }

    #[test]
    fn end_digit_cleanup() {
        assert_eq!(strip_end_digits("L_elbow_IK_JNT1"), "L_elbow_IK_JNT");
        assert_eq!(strip_end_digits("L_elbow_IK_JNT"), "L_elbow_IK_JNT");
    }
}
