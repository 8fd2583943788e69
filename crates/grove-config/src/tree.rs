use crate::{ConfigError, Expression, ModulePath, Reference, ResourceAddress, ResourceMode};
use crate::address::{is_identifier, resource_provider_type};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableConfig {
    pub name: String,
    pub default: Option<Value>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub alias: Option<String>,
    pub attributes: BTreeMap<String, Expression>,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Expression) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// `aws` or, when aliased, `aws.west`.
    pub fn full_name(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{}.{alias}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn references(&self) -> Vec<&Reference> {
        self.attributes
            .values()
            .flat_map(Expression::references)
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub mode: ResourceMode,
    pub resource_type: String,
    pub name: String,
    /// Explicit provider, e.g. `aws.west`.
    pub provider: Option<String>,
    pub count: Option<Expression>,
    pub attributes: BTreeMap<String, Expression>,
}

impl ResourceConfig {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode: ResourceMode::Managed,
            resource_type: resource_type.into(),
            name: name.into(),
            provider: None,
            count: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn data(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode: ResourceMode::Data,
            ..Self::new(resource_type, name)
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Expression) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn address(&self, path: &ModulePath) -> ResourceAddress {
        ResourceAddress::new(path.clone(), &self.resource_type, &self.name).with_mode(self.mode)
    }

    /// The provider this resource is configured with.
    pub fn provider_name(&self) -> String {
        self.provider
            .clone()
            .unwrap_or_else(|| resource_provider_type(&self.resource_type).to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleCall {
    pub name: String,
    pub source: String,
    pub inputs: BTreeMap<String, Expression>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub variables: Vec<VariableConfig>,
    pub providers: Vec<ProviderConfig>,
    pub resources: Vec<ResourceConfig>,
    pub modules: Vec<ModuleCall>,
}

impl ModuleConfig {
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
            && self.providers.is_empty()
            && self.resources.is_empty()
            && self.modules.is_empty()
    }

    pub fn merge(&mut self, other: ModuleConfig) {
        self.variables.extend(other.variables);
        self.providers.extend(other.providers);
        self.resources.extend(other.resources);
        self.modules.extend(other.modules);
    }

    pub fn provider(&self, full_name: &str) -> Option<&ProviderConfig> {
        self.providers
            .iter()
            .find(|provider| provider.full_name() == full_name)
    }

    pub fn resource(&self, mode: ResourceMode, resource_type: &str, name: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|resource| {
            resource.mode == mode && resource.resource_type == resource_type && resource.name == name
        })
    }

    /// Parse one document in the JSON configuration syntax.
    pub fn from_json_value(value: &Value) -> Result<Self, ConfigError> {
        let Value::Object(document) = value else {
            return Err(ConfigError::module(
                ModulePath::root(),
                "configuration document must be a JSON object",
            ));
        };

        let mut config = Self::default();
        for (key, body) in document {
            match key.as_str() {
                "variable" => {
                    for (name, block) in as_object(key, body)? {
                        config.variables.push(parse_variable(name, block)?);
                    }
                }
                "provider" => {
                    for (name, blocks) in as_object(key, body)? {
                        for block in one_or_many(blocks) {
                            config.providers.push(parse_provider(name, block)?);
                        }
                    }
                }
                "resource" | "data" => {
                    let mode = if key == "data" {
                        ResourceMode::Data
                    } else {
                        ResourceMode::Managed
                    };
                    for (resource_type, named) in as_object(key, body)? {
                        for (name, block) in as_object(resource_type, named)? {
                            config
                                .resources
                                .push(parse_resource(mode, resource_type, name, block)?);
                        }
                    }
                }
                "module" => {
                    for (name, block) in as_object(key, body)? {
                        config.modules.push(parse_module_call(name, block)?);
                    }
                }
                "output" | "locals" | "terraform" => {}
                other => {
                    return Err(ConfigError::module(
                        ModulePath::root(),
                        format!("unknown top-level block '{other}'"),
                    ));
                }
            }
        }
        Ok(config)
    }
}

fn as_object<'a>(key: &str, value: &'a Value) -> Result<&'a Map<String, Value>, ConfigError> {
    value.as_object().ok_or_else(|| {
        ConfigError::module(ModulePath::root(), format!("'{key}' must be a JSON object"))
    })
}

fn one_or_many(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn attributes(
    block: &Map<String, Value>,
    reserved: &[&str],
) -> Result<BTreeMap<String, Expression>, ConfigError> {
    block
        .iter()
        .filter(|(key, _)| !reserved.contains(&key.as_str()))
        .map(|(key, value)| Expression::from_json(value).map(|expr| (key.clone(), expr)))
        .collect()
}

fn string_field(block: &Map<String, Value>, owner: &str, key: &str) -> Result<Option<String>, ConfigError> {
    match block.get(key) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(ConfigError::module(
            ModulePath::root(),
            format!("{owner}: '{key}' must be a string"),
        )),
    }
}

fn parse_variable(name: &str, block: &Value) -> Result<VariableConfig, ConfigError> {
    let block = as_object(name, block)?;
    Ok(VariableConfig {
        name: name.to_string(),
        default: block.get("default").cloned(),
        description: string_field(block, &format!("variable.{name}"), "description")?,
    })
}

fn parse_provider(name: &str, block: &Value) -> Result<ProviderConfig, ConfigError> {
    let owner = format!("provider.{name}");
    let block = as_object(&owner, block)?;
    Ok(ProviderConfig {
        name: name.to_string(),
        alias: string_field(block, &owner, "alias")?,
        attributes: attributes(block, &["alias"])?,
    })
}

fn parse_resource(
    mode: ResourceMode,
    resource_type: &str,
    name: &str,
    block: &Value,
) -> Result<ResourceConfig, ConfigError> {
    let owner = format!("{resource_type}.{name}");
    let block = as_object(&owner, block)?;
    Ok(ResourceConfig {
        mode,
        resource_type: resource_type.to_string(),
        name: name.to_string(),
        provider: string_field(block, &owner, "provider")?,
        count: block.get("count").map(Expression::from_json).transpose()?,
        attributes: attributes(block, &["provider", "count", "depends_on", "lifecycle"])?,
    })
}

fn parse_module_call(name: &str, block: &Value) -> Result<ModuleCall, ConfigError> {
    let owner = format!("module.{name}");
    let block = as_object(&owner, block)?;
    let Some(source) = string_field(block, &owner, "source")? else {
        return Err(ConfigError::module(
            ModulePath::root(),
            format!("{owner}: 'source' is required"),
        ));
    };
    Ok(ModuleCall {
        name: name.to_string(),
        source,
        inputs: attributes(block, &["source"])?,
    })
}

/// Loaded configuration for a module and every module it calls.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleTree {
    pub name: String,
    pub path: ModulePath,
    pub config: ModuleConfig,
    pub children: BTreeMap<String, ModuleTree>,
}

impl ModuleTree {
    /// A tree with no configuration, used when there is nothing to load.
    pub fn empty() -> Self {
        Self {
            name: "root".to_string(),
            ..Self::default()
        }
    }

    pub fn new(config: ModuleConfig) -> Self {
        Self {
            config,
            ..Self::empty()
        }
    }

    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(source).map_err(|source| ConfigError::Json {
            path: "<inline>".into(),
            source,
        })?;
        Ok(Self::new(ModuleConfig::from_json_value(&value)?))
    }

    /// Attach a child module under the call `name`, fixing up its paths.
    pub fn with_child(mut self, name: impl Into<String>, mut child: ModuleTree) -> Self {
        let name = name.into();
        child.name = name.clone();
        child.rebase(self.path.child(name.clone()));
        self.children.insert(name, child);
        self
    }

    fn rebase(&mut self, path: ModulePath) {
        for (name, child) in &mut self.children {
            child.rebase(path.child(name.clone()));
        }
        self.path = path;
    }

    pub fn is_empty(&self) -> bool {
        self.config.is_empty() && self.children.values().all(ModuleTree::is_empty)
    }

    /// The subtree at `path`, relative to this tree's root.
    pub fn child(&self, path: &ModulePath) -> Option<&ModuleTree> {
        let mut current = self;
        for segment in path.segments().iter().skip(self.path.len()) {
            current = current.children.get(segment)?;
        }
        Some(current)
    }

    /// This module and every descendant, depth first, parents before children.
    pub fn descendants(&self) -> Vec<&ModuleTree> {
        let mut out = vec![self];
        for child in self.children.values() {
            out.extend(child.descendants());
        }
        out
    }

    /// Nearest configuration for provider `full_name`, searching from `path`
    /// up to the root module.
    pub fn provider_config(&self, full_name: &str, path: &ModulePath) -> Option<(&ModulePath, &ProviderConfig)> {
        path.ancestors().find_map(|ancestor| {
            let module = self.child(&ancestor)?;
            module
                .config
                .provider(full_name)
                .map(|provider| (&module.path, provider))
        })
    }

    /// Check the whole tree for structural problems, reporting all of them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        for module in self.descendants() {
            module.collect_problems(&mut problems);
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::InvalidModule {
                path: self.path.to_string(),
                problems,
            })
        }
    }

    fn collect_problems(&self, problems: &mut Vec<String>) {
        let config = &self.config;
        let at = &self.path;

        let mut seen = BTreeSet::new();
        for variable in &config.variables {
            if !seen.insert(variable.name.as_str()) {
                problems.push(format!("{at}: variable '{}' declared more than once", variable.name));
            }
        }
        let variables = seen;

        let mut seen = BTreeSet::new();
        for provider in &config.providers {
            if !is_identifier(&provider.name) {
                problems.push(format!("{at}: provider name '{}' is invalid", provider.name));
            }
            if !seen.insert(provider.full_name()) {
                problems.push(format!(
                    "{at}: provider '{}' configured more than once",
                    provider.full_name()
                ));
            }
        }

        let mut seen = BTreeSet::new();
        for resource in &config.resources {
            let address = resource.address(at);
            if !seen.insert(address.clone()) {
                problems.push(format!("{at}: resource '{address}' declared more than once"));
            }
            if let Some(count) = &resource.count {
                if count.references().is_empty() && count.as_u64().is_none() {
                    problems.push(format!("{address}: count must be a non-negative integer"));
                }
            }
        }

        let mut seen = BTreeSet::new();
        for call in &config.modules {
            if !seen.insert(call.name.as_str()) {
                problems.push(format!("{at}: module '{}' called more than once", call.name));
            }
            if !self.children.contains_key(&call.name) {
                problems.push(format!("{at}: module '{}' is not loaded", call.name));
            }
        }

        let expressions = config
            .providers
            .iter()
            .flat_map(|provider| provider.attributes.values())
            .chain(config.resources.iter().flat_map(|r| r.attributes.values().chain(r.count.iter())))
            .chain(config.modules.iter().flat_map(|call| call.inputs.values()));
        for expression in expressions {
            for reference in expression.references() {
                if let Reference::Variable { name } = reference {
                    if !variables.contains(name.as_str()) {
                        problems.push(format!("{at}: unknown variable referenced: '{name}'"));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_str_blocks_expected_config() {
        let tree = ModuleTree::from_json_str(
            r#"{
                "variable": { "region": { "default": "us-east-1" } },
                "provider": { "aws": [ { "region": "${var.region}" }, { "alias": "west", "region": "us-west-2" } ] },
                "resource": { "aws_instance": { "web": { "ami": "ami-123", "count": 2, "provider": "aws.west" } } },
                "data": { "aws_ami": { "ubuntu": {} } }
            }"#,
        )
        .expect("config should parse");

        assert_eq!(tree.config.variables.len(), 1);
        assert_eq!(tree.config.providers.len(), 2);
        assert!(tree.config.provider("aws.west").is_some());
        let web = tree
            .config
            .resource(ResourceMode::Managed, "aws_instance", "web")
            .expect("web should exist");
        assert_eq!(web.provider_name(), "aws.west");
        assert_eq!(web.count.as_ref().and_then(Expression::as_u64), Some(2));
        assert!(!web.attributes.contains_key("provider"));
        let ami = tree
            .config
            .resource(ResourceMode::Data, "aws_ami", "ubuntu")
            .expect("data source should exist");
        assert_eq!(ami.provider_name(), "aws");
        tree.validate().expect("tree should be valid");
    }

    #[test]
    fn validate_duplicates_and_unknown_variable_expected_all_problems() {
        let mut config = ModuleConfig::default();
        config.providers.push(ProviderConfig::new("aws"));
        config.providers.push(
            ProviderConfig::new("aws")
                .with_attribute("region", Expression::parse("${var.missing}").expect("parse")),
        );
        config.resources.push(ResourceConfig::new("aws_instance", "web"));
        config.resources.push(ResourceConfig::new("aws_instance", "web"));

        let error = ModuleTree::new(config).validate().expect_err("should be invalid");
        let ConfigError::InvalidModule { problems, .. } = error else {
            panic!("unexpected error kind");
        };
        assert_eq!(problems.len(), 3, "{problems:?}");
    }

    #[test]
    fn unknown_block_expected_error() {
        let error = ModuleTree::from_json_str(r#"{ "resources": {} }"#).expect_err("should fail");
        assert!(error.to_string().contains("unknown top-level block 'resources'"));
    }

    #[test]
    fn provider_config_child_module_expected_inherited_from_root() {
        let mut root = ModuleConfig::default();
        root.providers.push(ProviderConfig::new("aws"));
        let tree = ModuleTree::new(root).with_child("net", ModuleTree::empty());

        let (found_at, provider) = tree
            .provider_config("aws", &ModulePath::new(["net"]))
            .expect("inherited config should be found");
        assert!(found_at.is_root());
        assert_eq!(provider.full_name(), "aws");
        assert!(tree.provider_config("gcp", &ModulePath::root()).is_none());
    }

    #[test]
    fn empty_tree_expected_empty_and_root_child() {
        let tree = ModuleTree::empty();
        assert!(tree.is_empty());
        assert!(tree.child(&ModulePath::root()).is_some());
        assert!(tree.child(&ModulePath::new(["missing"])).is_none());
        tree.validate().expect("empty tree should be valid");
    }
}
