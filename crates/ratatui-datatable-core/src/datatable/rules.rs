//! Interpreter for the declarative validation rules attached to column editors.

use super::column::Rule;
use super::column::RuleKind;
use super::error::ConfigError;
use super::filter::stringify;
use regex::Regex;
use serde_json::Value;

#[derive(Clone, Debug)]
enum Check {
    Required,
    Pattern(Regex),
    MinLength(usize),
    MaxLength(usize),
    Min(f64),
    Max(f64),
    Email,
    Unique,
}

#[derive(Clone, Debug)]
struct CompiledRule {
    check: Check,
    message: Option<String>,
}

/// Rules of one column, with patterns compiled once.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn compile(field: &str, rules: &[Rule]) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .map(|rule| {
                let check = match &rule.kind {
                    RuleKind::Required => Check::Required,
                    RuleKind::Pattern { pattern } => {
                        Check::Pattern(Regex::new(pattern).map_err(|source| {
                            ConfigError::InvalidPattern {
                                field: field.to_string(),
                                source,
                            }
                        })?)
                    }
                    RuleKind::MinLength { min } => Check::MinLength(*min),
                    RuleKind::MaxLength { max } => Check::MaxLength(*max),
                    RuleKind::Min { min } => Check::Min(*min),
                    RuleKind::Max { max } => Check::Max(*max),
                    RuleKind::Email => Check::Email,
                    RuleKind::Unique => Check::Unique,
                };
                Ok(CompiledRule {
                    check,
                    message: rule.message.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether the set asks for cross-row uniqueness.
    pub fn is_unique(&self) -> bool {
        self.rules.iter().any(|r| matches!(r.check, Check::Unique))
    }

    /// Validates `value`. `others` are the same field's values in every *other* row and are only
    /// consulted for the unique rule. Returns the first failing rule's message.
    pub fn validate<'a>(
        &self,
        value: Option<&Value>,
        others: impl IntoIterator<Item = Option<&'a Value>>,
    ) -> Result<(), String> {
        let text = stringify(value);
        let empty = text.trim().is_empty() || is_empty_array(value);

        for rule in &self.rules {
            let failed = match &rule.check {
                Check::Required => empty.then(|| "This field is required".to_string()),
                // remaining rules only judge present values
                _ if empty => None,
                Check::Pattern(re) => (!re.is_match(&text)).then(|| "Invalid format".to_string()),
                Check::MinLength(min) => (text.chars().count() < *min)
                    .then(|| format!("Must be at least {min} characters")),
                Check::MaxLength(max) => (text.chars().count() > *max)
                    .then(|| format!("Must be at most {max} characters")),
                Check::Min(min) => match as_number(value) {
                    Some(n) if n < *min => Some(format!("Must be at least {min}")),
                    Some(_) => None,
                    None => Some("Must be a number".to_string()),
                },
                Check::Max(max) => match as_number(value) {
                    Some(n) if n > *max => Some(format!("Must be at most {max}")),
                    Some(_) => None,
                    None => Some("Must be a number".to_string()),
                },
                Check::Email => {
                    (!looks_like_email(&text)).then(|| "Invalid email address".to_string())
                }
                Check::Unique => None,
            };
            if let Some(default) = failed {
                return Err(rule.message.clone().unwrap_or(default));
            }
        }

        if empty {
            return Ok(());
        }
        let Some(rule) = self.rules.iter().find(|r| matches!(r.check, Check::Unique)) else {
            return Ok(());
        };
        if others.into_iter().any(|other| stringify(other) == text) {
            return Err(rule
                .message
                .clone()
                .unwrap_or_else(|| "Value must be unique".to_string()));
        }
        Ok(())
    }
}

fn is_empty_array(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Array(items)) if items.is_empty())
}

fn as_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn looks_like_email(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(rules: Vec<Rule>) -> RuleSet {
        RuleSet::compile("f", &rules).unwrap()
    }

    #[test]
    fn required_fails_on_blank() {
        let rules = set(vec![Rule::required()]);
        assert!(rules.validate(None, []).is_err());
        assert!(rules.validate(Some(&json!("  ")), []).is_err());
        assert!(rules.validate(Some(&json!("x")), []).is_ok());
    }

    #[test]
    fn unique_compares_against_other_rows_only() {
        let rules = set(vec![Rule::required(), Rule::unique().with_message("taken")]);
        let others = [json!("Doe"), json!("Roe")];
        assert_eq!(
            rules.validate(Some(&json!("Doe")), others.iter().map(Some)),
            Err("taken".to_string())
        );
        assert!(rules
            .validate(Some(&json!("Poe")), others.iter().map(Some))
            .is_ok());
    }

    #[test]
    fn optional_rules_skip_empty_values() {
        let rules = set(vec![Rule::new(RuleKind::MinLength { min: 3 }), Rule::unique()]);
        let others = [json!("")];
        assert!(rules.validate(Some(&json!("")), others.iter().map(Some)).is_ok());
        assert!(rules.validate(Some(&json!("ab")), []).is_err());
    }

    #[test]
    fn numeric_bounds_and_patterns() {
        let rules = set(vec![
            Rule::new(RuleKind::Min { min: 1.0 }),
            Rule::new(RuleKind::Max { max: 9.0 }),
        ]);
        assert!(rules.validate(Some(&json!(0)), []).is_err());
        assert!(rules.validate(Some(&json!(5)), []).is_ok());
        assert!(rules.validate(Some(&json!("abc")), []).is_err());

        let pat = set(vec![Rule::pattern("^[A-Z]{2}$").with_message("two caps")]);
        assert_eq!(
            pat.validate(Some(&json!("ab")), []),
            Err("two caps".to_string())
        );
    }

    #[test]
    fn bad_pattern_is_a_config_error() {
        let err = RuleSet::compile("code", &[Rule::pattern("(")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }
}
