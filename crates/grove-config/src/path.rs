use serde::{Deserialize, Serialize};
use std::fmt;

/// Module call names leading from the root module to a nested module.
///
/// The root module has an empty path. Paths render the way addresses prefix
/// them: `module.network.module.subnets`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// This path followed by each enclosing path, ending with the root.
    pub fn ancestors(&self) -> impl Iterator<Item = ModulePath> + '_ {
        (0..=self.0.len())
            .rev()
            .map(move |len| Self(self.0[..len].to_vec()))
    }

    pub fn starts_with(&self, prefix: &ModulePath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Address prefix for things declared in this module, with a trailing dot.
    pub fn prefix(&self) -> String {
        self.0
            .iter()
            .map(|segment| format!("module.{segment}."))
            .collect()
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("root");
        }
        let prefix = self.prefix();
        f.write_str(prefix.trim_end_matches('.'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestors_nested_path_expected_nearest_first() {
        let path = ModulePath::new(["a", "b"]);
        let ancestors: Vec<String> = path.ancestors().map(|p| p.to_string()).collect();
        assert_eq!(ancestors, vec!["module.a.module.b", "module.a", "root"]);
    }

    #[test]
    fn parent_root_expected_none() {
        assert_eq!(ModulePath::root().parent(), None);
        assert_eq!(
            ModulePath::new(["a"]).parent(),
            Some(ModulePath::root())
        );
    }
}
