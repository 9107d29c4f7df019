/// Explicit table of source loaders, built once at process start
use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};

use super::chainfiles::ChainFileSource;
use super::loader::SourceLoader;

#[derive(Clone, Default)]
pub struct SourceRegistry {
    loaders: BTreeMap<String, Arc<dyn SourceLoader>>,
}

impl SourceRegistry {
    pub fn builder() -> SourceRegistryBuilder {
        SourceRegistryBuilder::default()
    }

    /// Registry with the loaders that ship with this crate
    pub fn with_builtin() -> Self {
        Self::builder().register(ChainFileSource::new()).build_unchecked()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn SourceLoader>> {
        self.loaders.get(name)
    }

    /// Loader names in processing order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.loaders.keys().map(String::as_str)
    }

    pub fn loaders(&self) -> impl Iterator<Item = &Arc<dyn SourceLoader>> {
        self.loaders.values()
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

#[derive(Default)]
pub struct SourceRegistryBuilder {
    loaders: Vec<Arc<dyn SourceLoader>>,
}

impl SourceRegistryBuilder {
    pub fn register<L: SourceLoader + 'static>(mut self, loader: L) -> Self {
        self.loaders.push(Arc::new(loader));
        self
    }

    pub fn register_arc(mut self, loader: Arc<dyn SourceLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    /// Fails on duplicate or malformed names
    pub fn build(self) -> Result<SourceRegistry> {
        let mut loaders = BTreeMap::new();
        for loader in self.loaders {
            let name = loader.name().to_string();
            if name.is_empty() || name != name.to_lowercase() || name.contains(char::is_whitespace)
            {
                bail!("Invalid source name '{}': must be lowercase without spaces", name);
            }
            if loaders.insert(name.clone(), loader).is_some() {
                bail!("Source '{}' registered twice", name);
            }
        }
        Ok(SourceRegistry { loaders })
    }

    /// Later registrations replace earlier ones with the same name
    fn build_unchecked(self) -> SourceRegistry {
        let loaders = self
            .loaders
            .into_iter()
            .map(|loader| (loader.name().to_string(), loader))
            .collect();
        SourceRegistry { loaders }
    }
}
