use crate::{ConfigError, ModulePath};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceMode {
    #[default]
    Managed,
    Data,
}

/// Address of a resource, optionally narrowed to one counted instance.
///
/// `module.network.aws_subnet.private[2]` parses to path `["network"]`,
/// type `aws_subnet`, name `private`, index `2`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceAddress {
    pub path: ModulePath,
    pub mode: ResourceMode,
    pub resource_type: String,
    pub name: String,
    pub index: Option<u64>,
}

impl ResourceAddress {
    pub fn new(path: ModulePath, resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path,
            mode: ResourceMode::Managed,
            resource_type: resource_type.into(),
            name: name.into(),
            index: None,
        }
    }

    pub fn with_mode(mut self, mode: ResourceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_index(mut self, index: u64) -> Self {
        self.index = Some(index);
        self
    }

    /// The resource block this address belongs to.
    pub fn without_index(&self) -> Self {
        Self {
            index: None,
            ..self.clone()
        }
    }

    /// Provider type implied by the resource type: `aws_instance` -> `aws`.
    pub fn provider_type(&self) -> &str {
        resource_provider_type(&self.resource_type)
    }
}

pub fn resource_provider_type(resource_type: &str) -> &str {
    resource_type
        .split_once('_')
        .map_or(resource_type, |(prefix, _)| prefix)
}

pub(crate) fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
}

impl FromStr for ResourceAddress {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = input.trim().split('.').collect();
        let mut cursor = 0usize;
        let mut path = Vec::new();

        while segments.get(cursor) == Some(&"module") {
            let Some(name) = segments.get(cursor + 1) else {
                return Err(ConfigError::address(input, "module name is missing"));
            };
            if !is_identifier(name) {
                return Err(ConfigError::address(
                    input,
                    format!("module name '{name}' is invalid"),
                ));
            }
            path.push((*name).to_string());
            cursor += 2;
        }

        let mut mode = ResourceMode::Managed;
        if segments.get(cursor) == Some(&"data") {
            mode = ResourceMode::Data;
            cursor += 1;
        }

        let rest = &segments[cursor.min(segments.len())..];
        let [resource_type, name] = rest else {
            return Err(ConfigError::address(
                input,
                "expected <type>.<name> after the module path",
            ));
        };

        if !is_identifier(resource_type) {
            return Err(ConfigError::address(
                input,
                format!("resource type '{resource_type}' is invalid"),
            ));
        }

        let (name, index) = split_index(input, name)?;
        if !is_identifier(name) {
            return Err(ConfigError::address(
                input,
                format!("resource name '{name}' is invalid"),
            ));
        }

        Ok(Self {
            path: ModulePath::new(path),
            mode,
            resource_type: (*resource_type).to_string(),
            name: name.to_string(),
            index,
        })
    }
}

fn split_index<'a>(input: &str, segment: &'a str) -> Result<(&'a str, Option<u64>), ConfigError> {
    let Some(open) = segment.find('[') else {
        return Ok((segment, None));
    };
    let Some(raw) = segment[open + 1..].strip_suffix(']') else {
        return Err(ConfigError::address(input, "unterminated index"));
    };
    let index = raw
        .parse::<u64>()
        .map_err(|_| ConfigError::address(input, format!("index '{raw}' is not a number")))?;
    Ok((&segment[..open], Some(index)))
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path.prefix())?;
        if self.mode == ResourceMode::Data {
            f.write_str("data.")?;
        }
        write!(f, "{}.{}", self.resource_type, self.name)?;
        if let Some(index) = self.index {
            write!(f, "[{index}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_nested_indexed_address_expected_all_parts() {
        let address: ResourceAddress = "module.network.aws_subnet.private[2]"
            .parse()
            .expect("address should parse");
        assert_eq!(address.path, ModulePath::new(["network"]));
        assert_eq!(address.mode, ResourceMode::Managed);
        assert_eq!(address.resource_type, "aws_subnet");
        assert_eq!(address.name, "private");
        assert_eq!(address.index, Some(2));
        assert_eq!(address.to_string(), "module.network.aws_subnet.private[2]");
    }

    #[test]
    fn parse_data_address_expected_data_mode() {
        let address: ResourceAddress = "data.aws_ami.ubuntu".parse().expect("address should parse");
        assert_eq!(address.mode, ResourceMode::Data);
        assert_eq!(address.to_string(), "data.aws_ami.ubuntu");
    }

    #[test]
    fn parse_missing_name_expected_error() {
        let error = "aws_instance".parse::<ResourceAddress>().expect_err("should fail");
        assert!(matches!(error, ConfigError::InvalidAddress { .. }));
    }

    #[test]
    fn parse_bad_index_expected_error() {
        assert!("aws_instance.web[x]".parse::<ResourceAddress>().is_err());
        assert!("aws_instance.web[1".parse::<ResourceAddress>().is_err());
        assert!("module.aws_instance".parse::<ResourceAddress>().is_err());
    }

    #[test]
    fn provider_type_prefix_expected_first_segment() {
        let address: ResourceAddress = "google_compute_instance.vm".parse().expect("parse");
        assert_eq!(address.provider_type(), "google");
        assert_eq!(resource_provider_type("null"), "null");
    }
}
