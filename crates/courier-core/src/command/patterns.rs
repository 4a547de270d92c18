//! Canonical parameter fragments.
//!
//! Every fragment consumes the separating whitespace in front of the value
//! and contains exactly one capture group. To build a parameter that is not
//! preceded by whitespace (for instance a command with a dynamic suffix),
//! write the fragment by hand.

/// One run of non-whitespace characters.
pub const WORD: &str = r"\s+(\S+)";

/// A double-quoted span (quotes included in the capture) or one run of
/// non-whitespace characters.
pub const STRING: &str = r#"\s+((?:".*?")|(?:\S+))"#;

/// An optionally negative number without leading zeros, with an optional
/// decimal fraction.
pub const NUM: &str = r"\s+(-?(?:0|[1-9][0-9]*)(?:\.[0-9]+)?)";

/// Everything up to the end of the input.
pub const REST: &str = r"\s+(.*)";
