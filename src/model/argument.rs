//! Typed, constraint-checked configuration arguments
//!
//! An `Argument` is one named value of an app configuration. Its `type` string
//! carries both the base kind and its constraint (`int[0..1000]`,
//! `selection[lidarts,nakka]`), which is parsed into `ArgumentType` on load and
//! written back in the same textual form.

use crate::error::DartsHubError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of mask characters appended after the first visible character
pub const MASK_LENGTH: usize = 7;

/// Mask character used for password-like values
pub const MASK_CHAR: char = '*';

/// Name fragments that mark an argument as secret
const PASSWORD_PATTERNS: [&str; 7] = [
    "password", "passwd", "secret", "token", "apikey", "api_key", "api-key",
];

/// Base kind and constraint of an argument
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentType {
    /// Free text
    String,
    /// Free text that must never be shown
    Password,
    /// `True` / `False`
    Bool,
    /// Integer with optional inclusive bounds
    Int {
        /// Lower bound
        min: Option<i64>,
        /// Upper bound
        max: Option<i64>,
    },
    /// Float with optional inclusive bounds
    Float {
        /// Lower bound
        min: Option<f64>,
        /// Upper bound
        max: Option<f64>,
    },
    /// Directory path
    Path,
    /// File path
    File,
    /// One of a fixed set of choices
    Selection(Vec<String>),
}

/// Why a value was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Value is blank
    #[error("value is empty")]
    Empty,
    /// Value does not parse as the argument's kind
    #[error("'{value}' is not a valid {kind}")]
    Malformed {
        /// Rejected value
        value: String,
        /// Expected kind
        kind: &'static str,
    },
    /// Value parses but lies outside the declared range
    #[error("'{value}' is outside {range}")]
    OutOfRange {
        /// Rejected value
        value: String,
        /// Declared range as written in the type
        range: String,
    },
    /// Value is not one of the declared choices
    #[error("'{value}' is not one of {choices:?}")]
    InvalidChoice {
        /// Rejected value
        value: String,
        /// Allowed values
        choices: Vec<String>,
    },
}

impl ArgumentType {
    /// Short name of the base kind
    pub fn base_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Password => "password",
            Self::Bool => "bool",
            Self::Int { .. } => "int",
            Self::Float { .. } => "float",
            Self::Path => "path",
            Self::File => "file",
            Self::Selection(_) => "selection",
        }
    }

    /// Check a raw value against the type and return its normalized form
    pub fn validate(&self, raw: &str) -> Result<String, ValidationError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(ValidationError::Empty);
        }

        match self {
            Self::String | Self::Password | Self::Path | Self::File => Ok(raw.to_string()),
            Self::Bool => match value.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok("True".to_string()),
                "false" | "0" => Ok("False".to_string()),
                _ => Err(ValidationError::Malformed {
                    value: value.to_string(),
                    kind: "bool",
                }),
            },
            Self::Int { min, max } => {
                let parsed: i64 = value.parse().map_err(|_| ValidationError::Malformed {
                    value: value.to_string(),
                    kind: "int",
                })?;
                if min.is_some_and(|m| parsed < m) || max.is_some_and(|m| parsed > m) {
                    return Err(ValidationError::OutOfRange {
                        value: value.to_string(),
                        range: self.to_string(),
                    });
                }
                Ok(parsed.to_string())
            }
            Self::Float { min, max } => {
                let parsed: f64 = value.parse().map_err(|_| ValidationError::Malformed {
                    value: value.to_string(),
                    kind: "float",
                })?;
                if !parsed.is_finite() {
                    return Err(ValidationError::Malformed {
                        value: value.to_string(),
                        kind: "float",
                    });
                }
                if min.is_some_and(|m| parsed < m) || max.is_some_and(|m| parsed > m) {
                    return Err(ValidationError::OutOfRange {
                        value: value.to_string(),
                        range: self.to_string(),
                    });
                }
                Ok(value.to_string())
            }
            Self::Selection(choices) => {
                if choices.iter().any(|c| c == value) {
                    Ok(value.to_string())
                } else {
                    Err(ValidationError::InvalidChoice {
                        value: value.to_string(),
                        choices: choices.clone(),
                    })
                }
            }
        }
    }
}

impl fmt::Display for ArgumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn bound<T: fmt::Debug>(b: Option<&T>) -> String {
            b.map(|v| format!("{v:?}")).unwrap_or_default()
        }

        match self {
            Self::Int {
                min: None,
                max: None,
            }
            | Self::Float {
                min: None,
                max: None,
            } => f.write_str(self.base_name()),
            Self::Int { min, max } => write!(
                f,
                "int[{}..{}]",
                bound(min.as_ref()),
                bound(max.as_ref())
            ),
            Self::Float { min, max } => write!(
                f,
                "float[{}..{}]",
                bound(min.as_ref()),
                bound(max.as_ref())
            ),
            Self::Selection(choices) => write!(f, "selection[{}]", choices.join(",")),
            other => f.write_str(other.base_name()),
        }
    }
}

impl FromStr for ArgumentType {
    type Err = DartsHubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DartsHubError::InvalidArgumentType(s.to_string());
        let s_trim = s.trim();

        let (base, constraint) = match s_trim.find('[') {
            Some(open) => {
                let inner = s_trim[open + 1..].strip_suffix(']').ok_or_else(invalid)?;
                (&s_trim[..open], Some(inner))
            }
            None => (s_trim, None),
        };

        match (base.to_ascii_lowercase().as_str(), constraint) {
            ("string", None) => Ok(Self::String),
            ("password", None) => Ok(Self::Password),
            ("bool", None) => Ok(Self::Bool),
            ("path", None) => Ok(Self::Path),
            ("file", None) => Ok(Self::File),
            ("int", None) => Ok(Self::Int {
                min: None,
                max: None,
            }),
            ("float", None) => Ok(Self::Float {
                min: None,
                max: None,
            }),
            ("int", Some(range)) => {
                let (min, max) = split_range(range).ok_or_else(invalid)?;
                Ok(Self::Int {
                    min: parse_bound(min).map_err(|()| invalid())?,
                    max: parse_bound(max).map_err(|()| invalid())?,
                })
            }
            ("float", Some(range)) => {
                let (min, max) = split_range(range).ok_or_else(invalid)?;
                let min: Option<f64> = parse_bound(min).map_err(|()| invalid())?;
                let max: Option<f64> = parse_bound(max).map_err(|()| invalid())?;
                if min.is_some_and(f64::is_nan) || max.is_some_and(f64::is_nan) {
                    return Err(invalid());
                }
                Ok(Self::Float { min, max })
            }
            ("selection", Some(choices)) => {
                let choices: Vec<String> = choices
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(ToString::to_string)
                    .collect();
                if choices.is_empty() {
                    return Err(invalid());
                }
                Ok(Self::Selection(choices))
            }
            _ => Err(invalid()),
        }
    }
}

fn split_range(range: &str) -> Option<(&str, &str)> {
    range.split_once("..")
}

fn parse_bound<T: FromStr>(bound: &str) -> Result<Option<T>, ()> {
    let bound = bound.trim();
    if bound.is_empty() {
        return Ok(None);
    }
    bound.parse().map(Some).map_err(|_| ())
}

impl Serialize for ArgumentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ArgumentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One named, typed configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argument {
    /// Stable key; command-line flag name and migration anchor
    pub name: String,
    /// Base kind and constraint
    #[serde(rename = "type")]
    pub kind: ArgumentType,
    /// Whether a value must be present before the app may run
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    /// Display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_human: Option<String>,
    /// Grouping for presentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Stored value (typed values in their string form)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Logical value -> literal command-line token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_mapping: Option<BTreeMap<String, String>>,
    /// `"otherArgument=value"`: required only while the other argument equals value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_on_argument: Option<String>,
    /// Value is a whitespace or line separated list, one flag per element
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_multi: bool,
    /// Only supplied through profile runtime overrides at launch
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_runtime_argument: bool,
    /// The user touched this field since its default
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_value_changed: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde skip_serializing_if passes a reference
pub(crate) fn is_false(b: &bool) -> bool {
    !*b
}

impl Argument {
    /// Create an optional argument without a value
    pub fn new(name: impl Into<String>, kind: ArgumentType) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            name_human: None,
            section: None,
            value: None,
            value_mapping: None,
            required_on_argument: None,
            is_multi: false,
            is_runtime_argument: false,
            is_value_changed: false,
        }
    }

    /// Mark the argument as required
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the display label
    #[must_use]
    pub fn human(mut self, label: impl Into<String>) -> Self {
        self.name_human = Some(label.into());
        self
    }

    /// Set the presentation section
    #[must_use]
    pub fn in_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// Set a default value (does not count as a user change)
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the value mapping
    #[must_use]
    pub fn mapping(mut self, pairs: &[(&str, &str)]) -> Self {
        self.value_mapping = Some(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        );
        self
    }

    /// Make the argument conditionally required
    #[must_use]
    pub fn required_on(mut self, predicate: impl Into<String>) -> Self {
        self.required = true;
        self.required_on_argument = Some(predicate.into());
        self
    }

    /// Mark the argument as multi-value
    #[must_use]
    pub fn multi(mut self) -> Self {
        self.is_multi = true;
        self
    }

    /// Mark the argument as runtime-only
    #[must_use]
    pub fn runtime(mut self) -> Self {
        self.is_runtime_argument = true;
        self
    }

    /// Store a user-provided value
    pub fn set_value(&mut self, value: Option<String>) {
        self.value = value.filter(|v| !v.trim().is_empty());
        self.is_value_changed = true;
    }

    /// Validate a value against this argument's type
    ///
    /// Multi-value arguments validate every element.
    pub fn validate(&self, raw: &str) -> Result<String, ValidationError> {
        if self.is_multi {
            let elements = split_multi(raw);
            if elements.is_empty() {
                return Err(ValidationError::Empty);
            }
            for element in &elements {
                self.kind.validate(element)?;
            }
            return Ok(raw.to_string());
        }
        self.kind.validate(raw)
    }

    /// Translate a validated value through `valueMapping`
    pub fn mapped(&self, value: &str) -> String {
        let Some(mapping) = &self.value_mapping else {
            return value.to_string();
        };
        mapping
            .get(value)
            .or_else(|| {
                mapping
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(value))
                    .map(|(_, v)| v)
            })
            .cloned()
            .unwrap_or_else(|| value.to_string())
    }

    /// Whether the value must never be surfaced in logs or status panels
    pub fn is_password_like(&self) -> bool {
        if self.kind == ArgumentType::Password {
            return true;
        }
        let name = self.name.to_ascii_lowercase();
        let label = self
            .name_human
            .as_deref()
            .unwrap_or_default()
            .to_ascii_lowercase();
        PASSWORD_PATTERNS
            .iter()
            .any(|p| name.contains(p) || label.contains(p))
    }

    /// Parse the `requiredOnArgument` predicate into `(argument, value)`
    pub fn required_condition(&self) -> Option<(&str, &str)> {
        self.required_on_argument
            .as_deref()
            .and_then(|p| p.split_once('='))
            .map(|(name, value)| (name.trim(), value.trim()))
    }

    /// Whether the argument currently holds a value
    pub fn has_value(&self) -> bool {
        self.value.as_deref().is_some_and(|v| !v.trim().is_empty())
    }
}

/// Replace all but the first character with a fixed-length mask
pub fn mask(value: &str) -> String {
    let mut masked = String::with_capacity(MASK_LENGTH + 4);
    if let Some(first) = value.chars().next() {
        masked.push(first);
    }
    masked.extend(std::iter::repeat_n(MASK_CHAR, MASK_LENGTH));
    masked
}

/// Split a multi-value string into its elements
///
/// Values containing line breaks are split per line (so elements may contain
/// spaces); otherwise on any whitespace. Blank elements are dropped.
pub fn split_multi(value: &str) -> Vec<String> {
    let elements: Vec<&str> = if value.contains('\n') {
        value.lines().collect()
    } else {
        value.split_whitespace().collect()
    };
    elements
        .into_iter()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(ToString::to_string)
        .collect()
}
