//! Compiled command matching with optional-parameter back-off.
//!
//! A [`CommandMatcher`] turns a [`CommandSpec`] into a short list of anchored
//! regular expressions, one per back-off attempt:
//!
//! ```text
//! params:   a  b?  c  d?          attempt 0:  a b c d
//!                                 attempt 1:  a b c      (d removed)
//!                                 attempt 2:  a   c      (d, b removed)
//! ```
//!
//! Optional parameters are removed cumulatively, starting from the last one
//! declared. The first attempt that matches wins.

use std::collections::HashSet;
use std::fmt;

use regex::{Captures, Regex};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::trace;

use crate::command::spec::{CommandSpec, Param};
use crate::error::{CommandError, CommandResult};

/// Key under which the full capture list is serialized for named matches.
pub const ALL_KEY: &str = "_all";

// ============================================================================
// Match results
// ============================================================================

/// Captured values for named parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NamedArgs {
    /// Name → value, in declaration order.
    entries: Vec<(String, String)>,
    /// Every captured value, named or not, in positional order.
    all: Vec<String>,
}

impl NamedArgs {
    /// Returns the value captured for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns every captured value in positional order.
    pub fn all(&self) -> &[String] {
        &self.all
    }

    /// Iterates over `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of named values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no named value was captured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for NamedArgs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len() + 1))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.serialize_entry(ALL_KEY, &self.all)?;
        map.end()
    }
}

/// The captured parameters of a successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandArgs {
    /// The spec declares no named parameters: raw captures in order.
    Positional(Vec<String>),
    /// The spec declares named parameters.
    Named(NamedArgs),
}

impl CommandArgs {
    /// Returns every captured value in positional order.
    pub fn all(&self) -> &[String] {
        match self {
            Self::Positional(values) => values,
            Self::Named(named) => named.all(),
        }
    }

    /// Returns the value captured for `name`. Always `None` for positional args.
    pub fn get(&self, name: &str) -> Option<&str> {
        match self {
            Self::Positional(_) => None,
            Self::Named(named) => named.get(name),
        }
    }
}

impl Serialize for CommandArgs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Positional(values) => values.serialize(serializer),
            Self::Named(named) => named.serialize(serializer),
        }
    }
}

/// A successful command match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMatch {
    command: String,
    args: CommandArgs,
    omitted: Vec<String>,
}

impl CommandMatch {
    /// Returns the command text as it appeared, without trigger or bot suffix.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the captured parameters.
    pub fn args(&self) -> &CommandArgs {
        &self.args
    }

    /// Consumes the match, returning the captured parameters.
    pub fn into_args(self) -> CommandArgs {
        self.args
    }

    /// Returns the value captured for a named parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.args.get(name)
    }

    /// Returns every captured value in positional order.
    pub fn all(&self) -> &[String] {
        self.args.all()
    }

    /// Returns `true` if the spec declares named parameters.
    pub fn is_named(&self) -> bool {
        matches!(self.args, CommandArgs::Named(_))
    }

    /// Returns the optional parameters removed by back-off, in removal order.
    pub fn omitted(&self) -> &[String] {
        &self.omitted
    }
}

// ============================================================================
// CommandMatcher
// ============================================================================

/// One anchored pattern of the back-off sequence.
struct Attempt {
    regex: Regex,
    /// Indices into the spec's parameters that this attempt keeps.
    kept: Vec<usize>,
    /// Indices removed so far, most recently removed last.
    omitted: Vec<usize>,
}

/// A validated, compiled [`CommandSpec`].
///
/// Compiling checks that every fragment contains exactly one capture group
/// and that names are unique, then builds every back-off attempt up front.
/// Matching never fails: a non-matching input yields `None`.
pub struct CommandMatcher {
    spec: CommandSpec,
    /// Capture groups contained in the command fragment itself.
    command_groups: usize,
    named: bool,
    attempts: Vec<Attempt>,
}

impl CommandMatcher {
    /// Validates and compiles `spec`.
    pub fn new(spec: CommandSpec) -> CommandResult<Self> {
        let command_groups = count_groups("command", spec.get_command())?;
        validate_params(&spec)?;

        let optional: Vec<usize> = spec
            .params()
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_optional())
            .map(|(i, _)| i)
            .collect();

        let mut attempts = Vec::with_capacity(optional.len() + 1);
        let mut omitted = Vec::new();
        loop {
            let kept: Vec<usize> = (0..spec.params().len())
                .filter(|i| !omitted.contains(i))
                .collect();
            let regex = build_regex(&spec, &kept)?;
            attempts.push(Attempt {
                regex,
                kept,
                omitted: omitted.clone(),
            });

            match optional.len().checked_sub(omitted.len() + 1) {
                Some(next) => omitted.push(optional[next]),
                None => break,
            }
        }

        Ok(Self {
            named: spec.has_named_params(),
            spec,
            command_groups,
            attempts,
        })
    }

    /// Returns the spec this matcher was compiled from.
    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// Returns the number of patterns tried before giving up.
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// Matches `text`, returning `None` if it is not this command.
    pub fn find(&self, text: &str) -> Option<CommandMatch> {
        if !text.starts_with(self.spec.get_trigger()) {
            return None;
        }

        self.attempts.iter().enumerate().find_map(|(step, attempt)| {
            let caps = attempt.regex.captures(text)?;
            trace!(
                command = self.spec.get_command(),
                backoff_steps = step,
                "Command matched"
            );
            Some(self.build_match(&caps, attempt))
        })
    }

    /// Returns `true` if `text` matches this command.
    pub fn is_match(&self, text: &str) -> bool {
        self.find(text).is_some()
    }

    fn build_match(&self, caps: &Captures<'_>, attempt: &Attempt) -> CommandMatch {
        let params = self.spec.params();
        let command = caps.get(1).map_or("", |m| m.as_str()).to_string();
        let first_param_group = 2 + self.command_groups;

        let values: Vec<String> = attempt
            .kept
            .iter()
            .enumerate()
            .map(|(pos, &index)| {
                // Non-participating groups capture the empty string.
                let raw = caps.get(first_param_group + pos).map_or("", |m| m.as_str());
                if self.named && params[index].strips_quotes() {
                    strip_quotes(raw).to_string()
                } else {
                    raw.to_string()
                }
            })
            .collect();

        let args = if self.named {
            let entries = attempt
                .kept
                .iter()
                .zip(&values)
                .filter_map(|(&index, value)| {
                    params[index]
                        .name()
                        .map(|name| (name.to_string(), value.clone()))
                })
                .collect();
            CommandArgs::Named(NamedArgs {
                entries,
                all: values,
            })
        } else {
            CommandArgs::Positional(values)
        };

        let omitted = attempt
            .omitted
            .iter()
            .filter_map(|&index| params[index].name().map(str::to_string))
            .collect();

        CommandMatch {
            command,
            args,
            omitted,
        }
    }
}

impl fmt::Debug for CommandMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandMatcher")
            .field("spec", &self.spec)
            .field("attempts", &self.attempts.len())
            .finish()
    }
}

/// Compiles `spec` and matches `text` in one call.
pub fn match_command(text: &str, spec: &CommandSpec) -> CommandResult<Option<CommandMatch>> {
    spec.matches(text)
}

// ============================================================================
// Helpers
// ============================================================================

fn describe(index: usize, param: &Param) -> String {
    match param.name() {
        Some(name) => format!("parameter #{index} ('{name}')"),
        None => format!("parameter #{index}"),
    }
}

fn count_groups(target: &str, fragment: &str) -> CommandResult<usize> {
    Regex::new(fragment)
        .map(|regex| regex.captures_len() - 1)
        .map_err(|e| CommandError::InvalidPattern {
            target: target.to_string(),
            reason: e.to_string(),
        })
}

fn validate_params(spec: &CommandSpec) -> CommandResult<()> {
    let mut seen = HashSet::new();

    for (index, param) in spec.params().iter().enumerate() {
        let target = describe(index, param);
        let found = count_groups(&target, param.pattern())?;
        if found != 1 {
            return Err(CommandError::CaptureCount { target, found });
        }

        if let Some(name) = param.name() {
            if name == ALL_KEY {
                return Err(CommandError::ReservedName(name.to_string()));
            }
            if !seen.insert(name) {
                return Err(CommandError::DuplicateName(name.to_string()));
            }
        }
    }

    Ok(())
}

fn build_regex(spec: &CommandSpec, kept: &[usize]) -> CommandResult<Regex> {
    let mut pattern = String::from("^");
    pattern.push_str(&regex::escape(spec.get_trigger()));
    pattern.push('(');
    pattern.push_str(spec.get_command());
    pattern.push(')');

    if let Some(bot_name) = spec.get_bot_name() {
        pattern.push_str("(?:@");
        pattern.push_str(&regex::escape(bot_name));
        pattern.push_str(")?");
    }

    for &index in kept {
        pattern.push_str(spec.params()[index].pattern());
    }
    pattern.push('$');

    Regex::new(&pattern).map_err(|e| CommandError::InvalidPattern {
        target: "command".to_string(),
        reason: e.to_string(),
    })
}

/// Removes one layer of matching `"` or `'` quotes around the whole value.
fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::patterns::{NUM, REST, STRING, WORD};
    use crate::command::spec::NamedParam;
    use serde_json::json;

    fn set_loc() -> CommandSpec {
        CommandSpec::new("setLoc")
            .named("lat", NUM)
            .named("lon", NUM)
            .bot_name("bot")
    }

    #[test]
    fn test_named_match_with_bot_suffix() {
        let found = match_command("/setLoc@bot 51.5 -0.12", &set_loc())
            .unwrap()
            .unwrap();

        assert_eq!(found.command(), "setLoc");
        assert_eq!(found.get("lat"), Some("51.5"));
        assert_eq!(found.get("lon"), Some("-0.12"));
        assert_eq!(found.all(), ["51.5", "-0.12"]);
        assert_eq!(
            serde_json::to_value(found.args()).unwrap(),
            json!({"lat": "51.5", "lon": "-0.12", "_all": ["51.5", "-0.12"]})
        );
    }

    #[test]
    fn test_bot_suffix_is_optional_and_literal() {
        let matcher = set_loc().compile().unwrap();

        assert!(matcher.is_match("/setLoc 1 2"));
        assert!(!matcher.is_match("/setLoc@other 1 2"));
        assert!(!matcher.is_match("/setLoc@ 1 2"));
    }

    #[test]
    fn test_input_without_trigger_never_matches() {
        let matcher = set_loc().compile().unwrap();

        assert!(matcher.find("setLoc 1 2").is_none());
        assert!(matcher.find(" /setLoc 1 2").is_none());
        assert!(matcher.find("").is_none());
    }

    #[test]
    fn test_custom_trigger_is_literal() {
        let matcher = CommandSpec::new("roll")
            .trigger(".")
            .named("sides", NUM)
            .compile()
            .unwrap();

        assert_eq!(matcher.find(".roll 20").unwrap().get("sides"), Some("20"));
        assert!(matcher.find("xroll 20").is_none());
    }

    #[test]
    fn test_anchoring_and_case_sensitivity() {
        let matcher = set_loc().compile().unwrap();

        assert!(!matcher.is_match("/setLocation 1 2"));
        assert!(!matcher.is_match("/SETLOC 1 2"));
        assert!(!matcher.is_match("/setLoc 1 2 3"));
        assert!(!matcher.is_match("/setLoc 1"));
    }

    #[test]
    fn test_no_optionals_means_single_attempt() {
        let matcher = set_loc().compile().unwrap();
        assert_eq!(matcher.attempt_count(), 1);

        let found = matcher.find("/setLoc 1 2").unwrap();
        assert!(found.omitted().is_empty());
    }

    #[test]
    fn test_backoff_removes_last_optional_first() {
        // Optional parameters at positions 2 and 4. Both "drop 4" and
        // "drop 2" fit four words; dropping 4 must win.
        let matcher = CommandSpec::new("cmd")
            .named("p0", WORD)
            .named("p1", WORD)
            .optional("p2", WORD)
            .named("p3", WORD)
            .optional("p4", WORD)
            .compile()
            .unwrap();
        assert_eq!(matcher.attempt_count(), 3);

        let found = matcher.find("/cmd a b c d").unwrap();
        assert_eq!(found.omitted(), ["p4"]);
        assert_eq!(found.get("p2"), Some("c"));
        assert_eq!(found.get("p3"), Some("d"));
        assert_eq!(found.get("p4"), None);
    }

    #[test]
    fn test_backoff_is_cumulative() {
        let matcher = CommandSpec::new("cmd")
            .optional("a", NUM)
            .named("b", WORD)
            .optional("c", NUM)
            .compile()
            .unwrap();

        let found = matcher.find("/cmd word").unwrap();
        assert_eq!(found.omitted(), ["c", "a"]);
        assert_eq!(found.get("b"), Some("word"));
        assert_eq!(found.all(), ["word"]);

        // Dropping only `a` would fit, but that subset is never tried.
        assert!(matcher.find("/cmd word 3").is_none());
    }

    #[test]
    fn test_optional_in_the_middle() {
        let matcher = CommandSpec::new("cmd")
            .named("a", WORD)
            .optional("b", NUM)
            .named("c", WORD)
            .compile()
            .unwrap();

        let full = matcher.find("/cmd x 5 y").unwrap();
        assert_eq!(full.all(), ["x", "5", "y"]);

        let short = matcher.find("/cmd x y").unwrap();
        assert_eq!(short.get("a"), Some("x"));
        assert_eq!(short.get("b"), None);
        assert_eq!(short.get("c"), Some("y"));
        assert_eq!(short.omitted(), ["b"]);
    }

    #[test]
    fn test_quotes_stripped_by_default() {
        let spec = CommandSpec::new("say").named("text", STRING);
        let found = spec.matches(r#"/say "hello world""#).unwrap().unwrap();
        assert_eq!(found.get("text"), Some("hello world"));

        let found = spec.matches("/say 'single'").unwrap().unwrap();
        assert_eq!(found.get("text"), Some("single"));
    }

    #[test]
    fn test_quotes_kept_when_disabled() {
        let spec =
            CommandSpec::new("say").param(NamedParam::new("text", STRING).strip_quotes(false));
        let found = spec.matches(r#"/say "hello world""#).unwrap().unwrap();
        assert_eq!(found.get("text"), Some(r#""hello world""#));
        assert_eq!(found.all(), [r#""hello world""#]);
    }

    #[test]
    fn test_mismatched_or_lone_quotes_are_kept() {
        let spec = CommandSpec::new("say").named("text", WORD);
        assert_eq!(
            spec.matches(r#"/say "oops'"#).unwrap().unwrap().get("text"),
            Some(r#""oops'"#)
        );
        assert_eq!(
            spec.matches(r#"/say ""#).unwrap().unwrap().get("text"),
            Some(r#"""#)
        );
    }

    #[test]
    fn test_positional_results_are_raw() {
        let found = CommandSpec::new("say")
            .raw(STRING)
            .raw(WORD)
            .matches(r#"/say "quoted text" tail"#)
            .unwrap()
            .unwrap();

        assert!(!found.is_named());
        assert_eq!(found.all(), [r#""quoted text""#, "tail"]);
        assert_eq!(found.get("anything"), None);
        assert_eq!(
            serde_json::to_value(found.args()).unwrap(),
            json!([r#""quoted text""#, "tail"])
        );
    }

    #[test]
    fn test_unnamed_fragment_keeps_its_position() {
        let found = CommandSpec::new("move")
            .named("from", WORD)
            .raw(r"\s+(to)")
            .named("dest", WORD)
            .matches("/move home to work")
            .unwrap()
            .unwrap();

        let CommandArgs::Named(named) = found.args() else {
            panic!("expected named args");
        };
        assert_eq!(named.len(), 2);
        assert_eq!(named.all(), ["home", "to", "work"]);
        assert_eq!(
            named.iter().collect::<Vec<_>>(),
            vec![("from", "home"), ("dest", "work")]
        );
    }

    #[test]
    fn test_unnamed_fragment_shifts_after_backoff() {
        let found = CommandSpec::new("route")
            .named("from", WORD)
            .optional("via", NUM)
            .raw(r"\s+(to)")
            .named("dest", WORD)
            .matches("/route a to b")
            .unwrap()
            .unwrap();

        assert_eq!(found.all(), ["a", "to", "b"]);
        assert_eq!(found.omitted(), ["via"]);
    }

    #[test]
    fn test_rest_keeps_inner_whitespace() {
        let found = CommandSpec::new("echo")
            .named("text", REST)
            .matches("/echo hello   big world")
            .unwrap()
            .unwrap();
        assert_eq!(found.get("text"), Some("hello   big world"));
    }

    #[test]
    fn test_command_fragment_groups_do_not_shift_params() {
        let matcher = CommandSpec::new("(get|set)Loc")
            .named("lat", NUM)
            .compile()
            .unwrap();

        let found = matcher.find("/getLoc 7").unwrap();
        assert_eq!(found.command(), "getLoc");
        assert_eq!(found.get("lat"), Some("7"));
    }

    #[test]
    fn test_command_alternation_stays_anchored() {
        let matcher = CommandSpec::new("start|begin").compile().unwrap();

        assert!(matcher.is_match("/start"));
        assert!(matcher.is_match("/begin"));
        assert!(!matcher.is_match("/start now"));
        assert!(!matcher.is_match("/xbegin"));
    }

    #[test]
    fn test_fragment_without_group_is_rejected() {
        let err = CommandSpec::new("cmd").raw(r"\s+\S+").compile().unwrap_err();
        assert_eq!(
            err,
            CommandError::CaptureCount {
                target: "parameter #0".to_string(),
                found: 0
            }
        );
    }

    #[test]
    fn test_fragment_with_two_groups_is_rejected() {
        let err = CommandSpec::new("cmd")
            .named("pair", r"\s+(\S+)\s+(\S+)")
            .compile()
            .unwrap_err();
        assert!(matches!(err, CommandError::CaptureCount { found: 2, .. }));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let err = CommandSpec::new("cmd").named("x", r"\s+(").compile().unwrap_err();
        assert!(matches!(err, CommandError::InvalidPattern { .. }));

        let err = CommandSpec::new("cmd[").compile().unwrap_err();
        assert!(matches!(err, CommandError::InvalidPattern { .. }));
    }

    #[test]
    fn test_duplicate_and_reserved_names_are_rejected() {
        let err = CommandSpec::new("cmd")
            .named("x", WORD)
            .named("x", WORD)
            .compile()
            .unwrap_err();
        assert_eq!(err, CommandError::DuplicateName("x".to_string()));

        let err = CommandSpec::new("cmd").named("_all", WORD).compile().unwrap_err();
        assert_eq!(err, CommandError::ReservedName("_all".to_string()));
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes(r#""a b""#), "a b");
        assert_eq!(strip_quotes("'a'"), "a");
        assert_eq!(strip_quotes(r#""""#), "");
        assert_eq!(strip_quotes(r#"'a""#), r#"'a""#);
        assert_eq!(strip_quotes("plain"), "plain");
    }
}
