//! Ordered argument sets and command-line rendering
//!
//! Rendering walks the arguments in declaration order; receiving argument
//! parsers may depend on that order, so it is never changed.

use crate::model::argument::{Argument, mask, split_multi};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Runtime overrides keyed by argument name
pub type RuntimeArguments = BTreeMap<String, String>;

/// Prefix/delimiter convention plus the ordered arguments of one app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Flag prefix, e.g. `-` or `--`
    #[serde(default)]
    pub prefix: String,
    /// Separator between flag and value, e.g. `" "` or `=`
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Arguments in rendering order
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

fn default_delimiter() -> String {
    " ".to_string()
}

impl Configuration {
    /// Create an empty configuration
    pub fn new(prefix: impl Into<String>, delimiter: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: delimiter.into(),
            arguments: Vec::new(),
        }
    }

    /// Builder-style variant of `add_argument` for static defaults
    #[must_use]
    pub fn with(mut self, argument: Argument) -> Self {
        self.add_argument(argument);
        self
    }

    /// Return the first duplicated argument name, if any
    pub fn duplicate_name(&self) -> Option<&str> {
        let mut seen = HashSet::with_capacity(self.arguments.len());
        self.arguments
            .iter()
            .map(|a| a.name.as_str())
            .find(|name| !seen.insert(*name))
    }

    /// Look up an argument by name
    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.name == name)
    }

    /// Look up an argument by name for modification
    pub fn argument_mut(&mut self, name: &str) -> Option<&mut Argument> {
        self.arguments.iter_mut().find(|a| a.name == name)
    }

    /// Whether an argument with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.argument(name).is_some()
    }

    /// Append an argument; returns false if the name is already taken
    pub fn add_argument(&mut self, argument: Argument) -> bool {
        if self.contains(&argument.name) {
            return false;
        }
        self.arguments.push(argument);
        true
    }

    /// Remove an argument by name; returns whether it existed
    pub fn remove_argument(&mut self, name: &str) -> bool {
        let before = self.arguments.len();
        self.arguments.retain(|a| a.name != name);
        before != self.arguments.len()
    }

    /// Whether anything in this configuration is meant for the user to edit
    pub fn has_user_arguments(&self) -> bool {
        self.arguments.iter().any(|a| !a.is_runtime_argument)
    }

    /// Resolve the value rendering would use, after validation
    ///
    /// Runtime overrides win for runtime arguments. A value that violates the
    /// argument's type is treated as unset.
    pub fn effective_value(&self, argument: &Argument, runtime: Option<&RuntimeArguments>) -> Option<String> {
        let runtime_value = if argument.is_runtime_argument {
            runtime
                .and_then(|r| r.get(&argument.name))
                .filter(|v| !v.trim().is_empty())
        } else {
            None
        };
        let raw = runtime_value.or(argument.value.as_ref())?;

        match argument.validate(raw) {
            Ok(valid) => Some(valid),
            Err(e) => {
                if argument.is_password_like() {
                    warn!("Ignoring invalid value for argument '{}': {e}", argument.name);
                } else {
                    warn!(
                        "Ignoring invalid value '{raw}' for argument '{}': {e}",
                        argument.name
                    );
                }
                None
            }
        }
    }

    /// Whether an argument must have a value right now
    ///
    /// Runtime arguments are never required from the user. A `requiredOnArgument`
    /// predicate restricts the requirement to when the other argument's effective
    /// value equals the given value.
    pub fn is_required(&self, argument: &Argument, runtime: Option<&RuntimeArguments>) -> bool {
        if !argument.required || argument.is_runtime_argument {
            return false;
        }
        match argument.required_condition() {
            None => true,
            Some((other, expected)) => self
                .argument(other)
                .and_then(|o| self.effective_value(o, runtime))
                .is_some_and(|v| v == expected),
        }
    }

    /// Names of required arguments without a valid value
    pub fn missing_required(&self, runtime: Option<&RuntimeArguments>) -> Vec<String> {
        self.arguments
            .iter()
            .filter(|a| self.is_required(a, runtime))
            .filter(|a| self.effective_value(a, runtime).is_none())
            .map(|a| a.name.clone())
            .collect()
    }

    /// Build the argv passed to the spawned process
    pub fn tokens(&self, runtime: Option<&RuntimeArguments>) -> Vec<String> {
        let mut out = Vec::with_capacity(self.arguments.len() * 2);
        self.walk(runtime, |argument, value| {
            self.emit(&argument.name, value, &mut out);
        });
        out
    }

    /// Render the command line as a display string
    ///
    /// With `masked`, password-like values are replaced before they reach the
    /// string. The argv from `tokens` is never masked.
    pub fn render(&self, runtime: Option<&RuntimeArguments>, masked: bool) -> String {
        let mut out = Vec::with_capacity(self.arguments.len() * 2);
        self.walk(runtime, |argument, value| {
            if masked && argument.is_password_like() {
                self.emit(&argument.name, &mask(value), &mut out);
            } else {
                self.emit(&argument.name, value, &mut out);
            }
        });
        out.iter()
            .map(|t| quote(t))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Visit every emitted `(argument, literal value)` in order
    fn walk<F>(&self, runtime: Option<&RuntimeArguments>, mut visit: F)
    where
        F: FnMut(&Argument, &str),
    {
        for argument in &self.arguments {
            let Some(value) = self.effective_value(argument, runtime) else {
                continue;
            };

            if argument.is_multi {
                for element in split_multi(&value) {
                    visit(argument, &argument.mapped(&element));
                }
            } else {
                visit(argument, &argument.mapped(&value));
            }
        }
    }

    fn emit(&self, name: &str, value: &str, out: &mut Vec<String>) {
        if self.delimiter.trim().is_empty() {
            out.push(format!("{}{name}", self.prefix));
            out.push(value.to_string());
        } else {
            out.push(format!("{}{name}{}{value}", self.prefix, self.delimiter));
        }
    }
}

/// Wrap a token in double quotes if it contains whitespace
fn quote(token: &str) -> String {
    if token.chars().any(char::is_whitespace) {
        format!("\"{token}\"")
    } else {
        token.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::argument::ArgumentType;

    fn caller_config() -> Configuration {
        Configuration::new("-", " ")
            .with(Argument::new("U", ArgumentType::String).required().with_value("me@example.com"))
            .with(Argument::new("P", ArgumentType::Password).required().with_value("hunter2"))
            .with(
                Argument::new("R", ArgumentType::Bool)
                    .mapping(&[("True", "1"), ("False", "0")])
                    .with_value("True"),
            )
            .with(Argument::new("DLL", "int[0..1000]".parse().unwrap()).with_value("5000"))
    }

    #[test]
    fn test_bool_mapping_renders_literal() {
        let config = Configuration::new("-", " ").with(
            Argument::new("R", ArgumentType::Bool)
                .mapping(&[("True", "1"), ("False", "0")])
                .with_value("True"),
        );
        assert_eq!(config.render(None, false), "-R 1");
        assert_eq!(config.tokens(None), vec!["-R", "1"]);
    }

    #[test]
    fn test_out_of_range_is_unset() {
        let config = caller_config();
        let rendered = config.render(None, false);
        assert!(!rendered.contains("DLL"));
        assert!(!config.tokens(None).iter().any(|t| t.contains("5000")));
    }

    #[test]
    fn test_order_is_preserved() {
        let config = caller_config();
        assert_eq!(
            config.tokens(None),
            vec!["-U", "me@example.com", "-P", "hunter2", "-R", "1"]
        );
    }

    #[test]
    fn test_masked_render_hides_password_only() {
        let config = caller_config();
        let masked = config.render(None, true);
        assert!(masked.contains("-P h*******"));
        assert!(!masked.contains("hunter2"));
        assert!(masked.contains("me@example.com"));

        // The argv is unaffected by masking
        assert!(config.tokens(None).contains(&"hunter2".to_string()));
    }

    #[test]
    fn test_equals_delimiter_single_token() {
        let config = Configuration::new("--", "=")
            .with(Argument::new("connection", ArgumentType::String).with_value("127.0.0.1:8079"));
        assert_eq!(config.tokens(None), vec!["--connection=127.0.0.1:8079"]);
    }

    #[test]
    fn test_multi_emits_one_flag_per_element() {
        let config = Configuration::new("-", " ").with(
            Argument::new("WEPS", ArgumentType::String)
                .multi()
                .with_value("192.168.0.10 192.168.0.11"),
        );
        assert_eq!(
            config.tokens(None),
            vec!["-WEPS", "192.168.0.10", "-WEPS", "192.168.0.11"]
        );
    }

    #[test]
    fn test_multi_quotes_elements_with_spaces() {
        let config = Configuration::new("-", " ").with(
            Argument::new("M", ArgumentType::Path)
                .multi()
                .with_value("C:\\My Sounds\nD:\\sounds"),
        );
        assert_eq!(config.render(None, false), "-M \"C:\\My Sounds\" -M D:\\sounds");
    }

    #[test]
    fn test_runtime_argument_needs_override() {
        let config = Configuration::new("-", " ")
            .with(Argument::new("extern_platform", "selection[lidarts,nakka]".parse().unwrap()).runtime());
        assert!(config.tokens(None).is_empty());

        let runtime: RuntimeArguments =
            [("extern_platform".to_string(), "nakka".to_string())].into();
        assert_eq!(config.tokens(Some(&runtime)), vec!["-extern_platform", "nakka"]);
    }

    #[test]
    fn test_runtime_override_wins_over_persisted_value() {
        let config = Configuration::new("-", " ").with(
            Argument::new("extern_platform", ArgumentType::String)
                .runtime()
                .with_value("lidarts"),
        );
        assert_eq!(config.tokens(None), vec!["-extern_platform", "lidarts"]);

        let runtime: RuntimeArguments =
            [("extern_platform".to_string(), "nakka".to_string())].into();
        assert_eq!(config.tokens(Some(&runtime)), vec!["-extern_platform", "nakka"]);
    }

    #[test]
    fn test_runtime_override_ignored_for_regular_argument() {
        let config = Configuration::new("-", " ")
            .with(Argument::new("B", ArgumentType::String).with_value("board-1"));
        let runtime: RuntimeArguments = [("B".to_string(), "board-2".to_string())].into();
        assert_eq!(config.tokens(Some(&runtime)), vec!["-B", "board-1"]);
    }

    #[test]
    fn test_missing_required() {
        let config = Configuration::new("-", " ")
            .with(Argument::new("U", ArgumentType::String).required())
            .with(Argument::new("B", ArgumentType::String).with_value("board"));
        assert_eq!(config.missing_required(None), vec!["U".to_string()]);
        // Rendering still succeeds without the missing value
        assert_eq!(config.tokens(None), vec!["-B", "board"]);
    }

    #[test]
    fn test_required_on_argument_single_equality() {
        let config = Configuration::new("-", " ")
            .with(Argument::new("extern_platform", "selection[lidarts,nakka]".parse().unwrap()).runtime())
            .with(Argument::new("lidarts_user", ArgumentType::String).required_on("extern_platform=lidarts"))
            .with(Argument::new("nakka_user", ArgumentType::String).required_on("extern_platform=nakka"));

        let lidarts: RuntimeArguments =
            [("extern_platform".to_string(), "lidarts".to_string())].into();
        assert_eq!(config.missing_required(Some(&lidarts)), vec!["lidarts_user".to_string()]);

        let nakka: RuntimeArguments = [("extern_platform".to_string(), "nakka".to_string())].into();
        assert_eq!(config.missing_required(Some(&nakka)), vec!["nakka_user".to_string()]);

        assert!(config.missing_required(None).is_empty());
    }

    #[test]
    fn test_runtime_argument_never_required() {
        let config = Configuration::new("-", " ")
            .with(Argument::new("extern_platform", ArgumentType::String).required().runtime());
        assert!(config.missing_required(None).is_empty());
    }

    #[test]
    fn test_duplicate_name_detection() {
        let mut config = Configuration::new("-", " ").with(Argument::new("U", ArgumentType::String));
        assert!(!config.add_argument(Argument::new("U", ArgumentType::String)));
        assert!(config.duplicate_name().is_none());

        config.arguments.push(Argument::new("U", ArgumentType::Password));
        assert_eq!(config.duplicate_name(), Some("U"));
    }

    #[test]
    fn test_remove_argument() {
        let mut config = caller_config();
        assert!(config.remove_argument("DLL"));
        assert!(!config.remove_argument("DLL"));
        assert!(!config.contains("DLL"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: rendered numeric tokens always sit inside the declared bounds
            #[test]
            fn rendered_ints_are_within_bounds(
                min in -1000i64..1000,
                span in 0i64..1000,
                value in -5000i64..5000,
            ) {
                let max = min + span;
                let kind: ArgumentType = format!("int[{min}..{max}]").parse().unwrap();
                let config = Configuration::new("-", " ")
                    .with(Argument::new("N", kind).with_value(value.to_string()));

                let tokens = config.tokens(None);
                if tokens.is_empty() {
                    prop_assert!(value < min || value > max);
                } else {
                    let rendered: i64 = tokens[1].parse().unwrap();
                    prop_assert!(rendered >= min && rendered <= max);
                }
            }

            /// Property: N multi elements render as exactly N flags, in order
            #[test]
            fn multi_renders_every_element_in_order(
                elements in prop::collection::vec("[a-zA-Z0-9_.:]{1,12}", 1..8)
            ) {
                let config = Configuration::new("-", " ").with(
                    Argument::new("WEPS", ArgumentType::String)
                        .multi()
                        .with_value(elements.join(" ")),
                );
                let tokens = config.tokens(None);
                prop_assert_eq!(tokens.len(), elements.len() * 2);

                let flags: Vec<&String> = tokens.iter().step_by(2).collect();
                prop_assert!(flags.iter().all(|f| f.as_str() == "-WEPS"));

                let values: Vec<String> = tokens.iter().skip(1).step_by(2).cloned().collect();
                prop_assert_eq!(values, elements);
            }

            /// Property: masked output never leaks more than the first character
            #[test]
            fn masked_password_leaks_at_most_first_char(secret in "[a-zA-Z0-9]{2,24}") {
                let config = Configuration::new("-", " ")
                    .with(Argument::new("P", ArgumentType::Password).with_value(secret.clone()));

                let masked = config.render(None, true);
                let plain = config.render(None, false);
                let expected = format!("-P {}", mask(&secret));
                prop_assert_eq!(&masked, &expected);
                prop_assert!(plain.contains(&secret));
                prop_assert_ne!(masked, plain);
            }
        }
    }
}
