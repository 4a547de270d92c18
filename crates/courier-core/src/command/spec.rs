//! Declarative command patterns.

use crate::command::matcher::{CommandMatch, CommandMatcher};
use crate::error::CommandResult;

/// The trigger used when none is configured.
pub const DEFAULT_TRIGGER: &str = "/";

/// A named parameter descriptor.
///
/// ```rust
/// use courier_core::command::{NamedParam, patterns};
///
/// let title = NamedParam::new("title", patterns::STRING)
///     .optional(true)
///     .strip_quotes(false);
/// assert!(title.is_optional());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedParam {
    name: String,
    pattern: String,
    optional: bool,
    strip_quotes: bool,
}

impl NamedParam {
    /// Creates a required parameter that strips wrapping quotes.
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            optional: false,
            strip_quotes: true,
        }
    }

    /// Sets whether the parameter may be omitted from the input.
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Sets whether one layer of wrapping quotes is removed from the capture.
    pub fn strip_quotes(mut self, strip: bool) -> Self {
        self.strip_quotes = strip;
        self
    }

    /// Returns the parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the pattern fragment.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns `true` if the parameter may be omitted.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Returns `true` if wrapping quotes are stripped from the capture.
    pub fn strips_quotes(&self) -> bool {
        self.strip_quotes
    }
}

/// One entry in a command's parameter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// An unnamed fragment. Its capture is only reachable positionally.
    Raw(String),
    /// A named descriptor.
    Named(NamedParam),
}

impl Param {
    /// Returns the pattern fragment.
    pub fn pattern(&self) -> &str {
        match self {
            Self::Raw(pattern) => pattern,
            Self::Named(param) => param.pattern(),
        }
    }

    /// Returns the parameter name, if it has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Raw(_) => None,
            Self::Named(param) => Some(param.name()),
        }
    }

    /// Returns `true` if the parameter may be omitted. Unnamed fragments never are.
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Named(param) if param.is_optional())
    }

    /// Returns `true` if wrapping quotes are stripped from the capture.
    pub fn strips_quotes(&self) -> bool {
        match self {
            Self::Raw(_) => true,
            Self::Named(param) => param.strips_quotes(),
        }
    }
}

impl From<NamedParam> for Param {
    fn from(param: NamedParam) -> Self {
        Self::Named(param)
    }
}

impl From<&str> for Param {
    fn from(pattern: &str) -> Self {
        Self::Raw(pattern.to_string())
    }
}

impl From<String> for Param {
    fn from(pattern: String) -> Self {
        Self::Raw(pattern)
    }
}

/// A command pattern: trigger, command, parameters and an optional bot name.
///
/// The command and parameter fragments are regular expressions and are
/// concatenated verbatim; the trigger and the bot name are matched literally.
///
/// # Example
///
/// ```rust
/// use courier_core::command::{CommandSpec, patterns};
///
/// let spec = CommandSpec::new("setLoc")
///     .named("lat", patterns::NUM)
///     .named("lon", patterns::NUM)
///     .bot_name("bot");
///
/// let found = spec.matches("/setLoc@bot 51.5 -0.12").unwrap().unwrap();
/// assert_eq!(found.get("lat"), Some("51.5"));
/// assert_eq!(found.all(), ["51.5", "-0.12"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    trigger: String,
    command: String,
    params: Vec<Param>,
    bot_name: Option<String>,
}

impl CommandSpec {
    /// Creates a spec for `command` with the default trigger and no parameters.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            trigger: DEFAULT_TRIGGER.to_string(),
            command: command.into(),
            params: Vec::new(),
            bot_name: None,
        }
    }

    /// Sets the trigger prefix.
    pub fn trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = trigger.into();
        self
    }

    /// Sets the bot name accepted as `trigger+command@name`.
    pub fn bot_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.bot_name = (!name.is_empty()).then_some(name);
        self
    }

    /// Appends a parameter.
    pub fn param(mut self, param: impl Into<Param>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Appends an unnamed fragment.
    pub fn raw(self, pattern: impl Into<String>) -> Self {
        self.param(Param::Raw(pattern.into()))
    }

    /// Appends a required named parameter.
    pub fn named(self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.param(NamedParam::new(name, pattern))
    }

    /// Appends an optional named parameter.
    pub fn optional(self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.param(NamedParam::new(name, pattern).optional(true))
    }

    /// Returns the trigger prefix.
    pub fn get_trigger(&self) -> &str {
        &self.trigger
    }

    /// Returns the command fragment.
    pub fn get_command(&self) -> &str {
        &self.command
    }

    /// Returns the bot name, if set.
    pub fn get_bot_name(&self) -> Option<&str> {
        self.bot_name.as_deref()
    }

    /// Returns the parameters in declaration order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Returns `true` if at least one parameter is named.
    pub fn has_named_params(&self) -> bool {
        self.params.iter().any(|p| p.name().is_some())
    }

    /// Validates the spec and compiles every back-off attempt.
    pub fn compile(&self) -> CommandResult<CommandMatcher> {
        CommandMatcher::new(self.clone())
    }

    /// Compiles the spec and matches `text` against it.
    ///
    /// Prefer [`compile`](Self::compile) when matching repeatedly.
    pub fn matches(&self, text: &str) -> CommandResult<Option<CommandMatch>> {
        Ok(self.compile()?.find(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::patterns::{NUM, WORD};

    #[test]
    fn test_defaults() {
        let spec = CommandSpec::new("ping");
        assert_eq!(spec.get_trigger(), "/");
        assert_eq!(spec.get_command(), "ping");
        assert!(spec.params().is_empty());
        assert_eq!(spec.get_bot_name(), None);
        assert!(!spec.has_named_params());
    }

    #[test]
    fn test_builder_preserves_order() {
        let spec = CommandSpec::new("move")
            .named("x", NUM)
            .raw(r"\s+(to)")
            .optional("y", NUM)
            .param(NamedParam::new("label", WORD).strip_quotes(false));

        let names: Vec<_> = spec.params().iter().map(Param::name).collect();
        assert_eq!(names, vec![Some("x"), None, Some("y"), Some("label")]);
        assert!(spec.params()[2].is_optional());
        assert!(!spec.params()[3].strips_quotes());
        assert!(spec.params()[1].strips_quotes());
        assert!(spec.has_named_params());
    }

    #[test]
    fn test_empty_bot_name_is_unset() {
        let spec = CommandSpec::new("ping").bot_name("");
        assert_eq!(spec.get_bot_name(), None);
    }
}
