//! Configuration expressions and the references they make.
//!
//! Values come from the JSON configuration syntax: every JSON string may be a
//! template containing `${ ... }` interpolations. Interpolation bodies are
//! scanned for traversals (`var.region`, `aws_instance.web.id`,
//! `module.net.vpc_id`, ...) which become [`Reference`]s; function names and
//! quoted literals inside the body are skipped.

use crate::address::is_identifier;
use crate::{ConfigError, ResourceMode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Template(Template),
    List(Vec<Expression>),
    Object(BTreeMap<String, Expression>),
}

impl Expression {
    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(value) => Self::Bool(*value),
            Value::Number(value) => Self::Number(value.clone()),
            Value::String(value) => Self::Template(value.parse()?),
            Value::Array(items) => Self::List(
                items
                    .iter()
                    .map(Self::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(entries) => Self::Object(
                entries
                    .iter()
                    .map(|(key, value)| Self::from_json(value).map(|expr| (key.clone(), expr)))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    /// Parse a string as a template, e.g. `"${var.region}"`.
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        Ok(Self::Template(source.parse()?))
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self::Template(Template {
            parts: vec![TemplatePart::Literal(value.into())],
        })
    }

    pub fn as_literal_str(&self) -> Option<&str> {
        match self {
            Self::Template(template) => template.as_literal(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(number) => number.as_u64(),
            Self::Template(template) => template.as_literal()?.parse().ok(),
            _ => None,
        }
    }

    /// Every reference in the expression, in document order.
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Self::Template(template) => {
                for part in &template.parts {
                    if let TemplatePart::Interpolation { references, .. } = part {
                        out.extend(references.iter());
                    }
                }
            }
            Self::List(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            Self::Object(entries) => {
                for value in entries.values() {
                    value.collect_references(out);
                }
            }
            Self::Null | Self::Bool(_) | Self::Number(_) => {}
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub parts: Vec<TemplatePart>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplatePart {
    Literal(String),
    Interpolation {
        source: String,
        references: Vec<Reference>,
    },
}

impl Template {
    pub fn as_literal(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [] => Some(""),
            [TemplatePart::Literal(value)] => Some(value),
            _ => None,
        }
    }
}

impl std::str::FromStr for Template {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = input;

        while let Some(start) = rest.find("${") {
            // `$${` escapes a literal `${`.
            if start > 0 && rest[..start].ends_with('$') {
                literal.push_str(&rest[..start - 1]);
                literal.push_str("${");
                rest = &rest[start + 2..];
                continue;
            }

            literal.push_str(&rest[..start]);
            let body_start = start + 2;
            let Some(len) = interpolation_len(&rest[body_start..]) else {
                return Err(ConfigError::interpolation(input, "unterminated '${'"));
            };
            let body = &rest[body_start..body_start + len];
            if body.trim().is_empty() {
                return Err(ConfigError::interpolation(input, "empty interpolation"));
            }

            if !literal.is_empty() {
                parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
            }
            parts.push(TemplatePart::Interpolation {
                source: body.trim().to_string(),
                references: scan_references(input, body)?,
            });
            rest = &rest[body_start + len + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }
        Ok(Self { parts })
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                TemplatePart::Literal(value) => f.write_str(&value.replace("${", "$${"))?,
                TemplatePart::Interpolation { source, .. } => write!(f, "${{{source}}}")?,
            }
        }
        Ok(())
    }
}

/// Length of the interpolation body up to its matching `}`.
fn interpolation_len(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in body.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' if depth == 0 => return Some(idx),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn scan_references(input: &str, body: &str) -> Result<Vec<Reference>, ConfigError> {
    let chars: Vec<char> = body.chars().collect();
    let mut references = Vec::new();
    let mut idx = 0usize;

    while idx < chars.len() {
        let ch = chars[idx];
        if ch == '"' {
            idx += 1;
            while idx < chars.len() && chars[idx] != '"' {
                if chars[idx] == '\\' {
                    idx += 1;
                }
                idx += 1;
            }
            idx += 1;
            continue;
        }
        if ch.is_ascii_digit() {
            while idx < chars.len() && (chars[idx].is_ascii_alphanumeric() || chars[idx] == '.') {
                idx += 1;
            }
            continue;
        }
        if !(ch.is_ascii_alphabetic() || ch == '_') {
            idx += 1;
            continue;
        }

        let start = idx;
        while idx < chars.len() && is_traversal_char(chars[idx]) {
            idx += 1;
        }
        let token: String = chars[start..idx].iter().collect();

        let mut lookahead = idx;
        while lookahead < chars.len() && chars[lookahead].is_whitespace() {
            lookahead += 1;
        }
        if chars.get(lookahead) == Some(&'(') {
            // function call
            continue;
        }

        if let Some(reference) = Reference::parse_traversal(input, &token)? {
            references.push(reference);
        }
    }

    Ok(references)
}

fn strip_index(segment: &str) -> &str {
    segment
        .split_once('[')
        .map_or(segment, |(base, _)| base)
}

fn is_traversal_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.' | '*' | '[' | ']')
}

/// Something a configuration expression depends on.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reference {
    Variable {
        name: String,
    },
    ResourceAttribute {
        mode: ResourceMode,
        resource_type: String,
        name: String,
        attribute: Option<String>,
    },
    ModuleOutput {
        module: String,
        output: String,
    },
    SelfAttribute {
        attribute: String,
    },
    Count {
        field: String,
    },
    Path {
        field: String,
    },
    Local {
        name: String,
    },
}

impl Reference {
    /// Parse a single traversal such as `var.region` or `aws_instance.web.id`.
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        Self::parse_traversal(source, source.trim())?
            .ok_or_else(|| ConfigError::interpolation(source, "not a reference"))
    }

    fn parse_traversal(input: &str, token: &str) -> Result<Option<Self>, ConfigError> {
        if matches!(token, "true" | "false" | "null") {
            return Ok(None);
        }

        let segments: Vec<&str> = token.split('.').collect();
        let invalid = |reason: &str| ConfigError::interpolation(input, format!("{token}: {reason}"));
        let rest = |from: usize| -> Option<String> {
            (segments.len() > from).then(|| segments[from..].join("."))
        };

        let reference = match segments.as_slice() {
            [single] => return Err(invalid(&format!("bare identifier '{single}' is not a reference"))),
            ["var", name, ..] if is_identifier(strip_index(name)) => Self::Variable {
                name: strip_index(name).to_string(),
            },
            ["var", ..] => return Err(invalid("expected var.<name>")),
            ["self", ..] => Self::SelfAttribute {
                attribute: rest(1).unwrap_or_default(),
            },
            ["count", field] => Self::Count {
                field: (*field).to_string(),
            },
            ["path", field] => Self::Path {
                field: (*field).to_string(),
            },
            ["local", name, ..] => Self::Local {
                name: (*name).to_string(),
            },
            ["module", module, output, ..] => Self::ModuleOutput {
                module: (*module).to_string(),
                output: rest(2).unwrap_or_default(),
            },
            ["module", ..] => return Err(invalid("expected module.<name>.<output>")),
            ["data", resource_type, name, ..] => Self::ResourceAttribute {
                mode: ResourceMode::Data,
                resource_type: (*resource_type).to_string(),
                name: (*name).to_string(),
                attribute: rest(3),
            },
            ["data", ..] => return Err(invalid("expected data.<type>.<name>")),
            [resource_type, name, ..] => Self::ResourceAttribute {
                mode: ResourceMode::Managed,
                resource_type: (*resource_type).to_string(),
                name: (*name).to_string(),
                attribute: rest(2),
            },
            [] => return Ok(None),
        };

        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(invalid("empty traversal segment"));
        }
        Ok(Some(reference))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable { .. })
    }

    /// The reference as written in configuration.
    pub fn full_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable { name } => write!(f, "var.{name}"),
            Self::ResourceAttribute {
                mode,
                resource_type,
                name,
                attribute,
            } => {
                if *mode == ResourceMode::Data {
                    f.write_str("data.")?;
                }
                write!(f, "{resource_type}.{name}")?;
                if let Some(attribute) = attribute {
                    write!(f, ".{attribute}")?;
                }
                Ok(())
            }
            Self::ModuleOutput { module, output } => write!(f, "module.{module}.{output}"),
            Self::SelfAttribute { attribute } => write!(f, "self.{attribute}"),
            Self::Count { field } => write!(f, "count.{field}"),
            Self::Path { field } => write!(f, "path.{field}"),
            Self::Local { name } => write!(f, "local.{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(source: &str) -> Vec<String> {
        Expression::parse(source)
            .expect("expression should parse")
            .references()
            .into_iter()
            .map(Reference::full_key)
            .collect()
    }

    #[test]
    fn template_variable_expected_variable_reference() {
        let expr = Expression::parse("${var.region}").expect("should parse");
        let references = expr.references();
        assert_eq!(references.len(), 1);
        assert!(references[0].is_variable());
    }

    #[test]
    fn template_resource_attribute_expected_full_key_round_trip() {
        assert_eq!(refs("${aws_instance.x.region}"), vec!["aws_instance.x.region"]);
        assert_eq!(refs("zone-${data.aws_az.all.names[0]}"), vec!["data.aws_az.all.names[0]"]);
    }

    #[test]
    fn template_function_call_expected_arguments_only() {
        assert_eq!(
            refs(r#"${lookup(var.amis, "us-east-1")}-${module.net.vpc_id}"#),
            vec!["var.amis", "module.net.vpc_id"]
        );
    }

    #[test]
    fn template_plain_string_expected_literal() {
        let expr = Expression::parse("us-east-1").expect("should parse");
        assert_eq!(expr.as_literal_str(), Some("us-east-1"));
        assert!(expr.references().is_empty());
    }

    #[test]
    fn template_escaped_dollar_expected_literal() {
        let expr = Expression::parse("$${not.interpolated}").expect("should parse");
        assert_eq!(expr.as_literal_str(), Some("${not.interpolated}"));
    }

    #[test]
    fn template_unterminated_expected_error() {
        assert!(Expression::parse("${var.region").is_err());
        assert!(Expression::parse("${}").is_err());
        assert!(Expression::parse("${region}").is_err());
        assert!(Expression::parse("${module.only}").is_err());
    }

    #[test]
    fn template_display_expected_source_text() {
        let template: Template = "a-${var.b}-$${c}".parse().expect("should parse");
        assert_eq!(template.to_string(), "a-${var.b}-$${c}");
    }

    #[test]
    fn self_and_count_references_expected_kinds() {
        let expr = Expression::parse("${self.private_ip}:${count.index}:${path.module}")
            .expect("should parse");
        let kinds: Vec<&Reference> = expr.references();
        assert!(matches!(kinds[0], Reference::SelfAttribute { .. }));
        assert!(matches!(kinds[1], Reference::Count { .. }));
        assert!(matches!(kinds[2], Reference::Path { .. }));
    }
}
