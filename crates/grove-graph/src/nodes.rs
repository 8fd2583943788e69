use grove_config::{ModulePath, ProviderConfig, ResourceAddress, resource_provider_type};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const ROOT_NODE_NAME: &str = "root";

/// Which walk a provider node takes part in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFlavor {
    Apply,
    Plan,
    Refresh,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderNode {
    /// Symbolic name, including any alias: `aws` or `aws.west`.
    pub name: String,
    pub path: ModulePath,
    pub flavor: ProviderFlavor,
    pub disabled: bool,
    pub config: Option<ProviderConfig>,
}

impl ProviderNode {
    pub fn new(name: impl Into<String>, path: ModulePath, flavor: ProviderFlavor) -> Self {
        Self {
            name: name.into(),
            path,
            flavor,
            disabled: false,
            config: None,
        }
    }

    /// Provider type without the alias: `aws.west` -> `aws`.
    pub fn provider_type(&self) -> &str {
        provider_type(&self.name)
    }
}

pub fn provider_type(name: &str) -> &str {
    name.split_once('.').map_or(name, |(ty, _)| ty)
}

pub fn provider_node_name(name: &str, path: &ModulePath) -> String {
    format!("{}provider.{name}", path.prefix())
}

/// Builds the provider node for a symbolic name in a module.
pub type ProviderFactory = Arc<dyn Fn(&str, &ModulePath) -> ProviderNode + Send + Sync>;

pub fn provider_factory(flavor: ProviderFlavor) -> ProviderFactory {
    Arc::new(move |name: &str, path: &ModulePath| ProviderNode::new(name, path.clone(), flavor))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub address: ResourceAddress,
    /// Explicit provider from configuration, e.g. `aws.west`.
    pub provider: Option<String>,
}

/// A request to attach an existing real-world object to a resource address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTarget {
    pub addr: ResourceAddress,
    pub id: String,
    /// Explicit provider, e.g. `aws.west`.
    pub provider: Option<String>,
}

impl ImportTarget {
    pub fn new(addr: ResourceAddress, id: impl Into<String>) -> Self {
        Self {
            addr,
            id: id.into(),
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImportNode {
    pub target: ImportTarget,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Resource(ResourceNode),
    Provider(ProviderNode),
    Import(ImportNode),
    Root,
}

impl NodeKind {
    /// Node identity within a graph.
    pub fn name(&self) -> String {
        match self {
            Self::Resource(resource) => resource.address.to_string(),
            Self::Provider(provider) => provider_node_name(&provider.name, &provider.path),
            Self::Import(import) => format!(
                "{} (import id: {})",
                import.target.addr, import.target.id
            ),
            Self::Root => ROOT_NODE_NAME.to_string(),
        }
    }

    /// The provider a consumer node needs, and the module it lives in.
    pub fn provided_by(&self) -> Option<(String, &ModulePath)> {
        match self {
            Self::Resource(resource) => Some((
                resource
                    .provider
                    .clone()
                    .unwrap_or_else(|| resource.address.provider_type().to_string()),
                &resource.address.path,
            )),
            Self::Import(import) => Some((
                import
                    .target
                    .provider
                    .clone()
                    .unwrap_or_else(|| resource_provider_type(&import.target.addr.resource_type).to_string()),
                &import.target.addr.path,
            )),
            Self::Provider(_) | Self::Root => None,
        }
    }

    pub fn as_provider(&self) -> Option<&ProviderNode> {
        match self {
            Self::Provider(provider) => Some(provider),
            _ => None,
        }
    }

    pub fn as_provider_mut(&mut self) -> Option<&mut ProviderNode> {
        match self {
            Self::Provider(provider) => Some(provider),
            _ => None,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Resource(_) => "resource",
            Self::Provider(_) => "provider",
            Self::Import(_) => "import",
            Self::Root => "root",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
