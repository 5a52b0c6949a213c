// crates/matecv-work/src/context.rs

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::ConvertConfig;
use crate::error::Result;

/// Shader mapping tables consulted during material conversion.
pub trait ShaderLookup: Send + Sync {
    /// New shader reference for an old shader name.
    fn shader_name(&self, old_ref: &str) -> Option<&str>;
    /// Family label used by the rename template.
    fn shader_family(&self, old_ref: &str) -> Option<&str>;
}

/// Lookup tables keyed by lowercased shader name.
#[derive(Clone, Debug, Default)]
pub struct ShaderTables {
    names: HashMap<String, String>,
    families: HashMap<String, String>,
}

impl ShaderTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, old_ref: &str, new_ref: &str) -> Self {
        self.names.insert(old_ref.to_lowercase(), new_ref.to_string());
        self
    }

    pub fn with_family<I, S>(mut self, family: &str, shaders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for s in shaders {
            self.families.insert(s.as_ref().to_lowercase(), family.to_string());
        }
        self
    }

    /// `names` is `{old: new}`; `families` is `{family: [shader, ...]}`.
    pub fn from_json(names: &str, families: &str) -> Result<Self> {
        let names: HashMap<String, String> = serde_json::from_str(names)?;
        let families: HashMap<String, Vec<String>> = serde_json::from_str(families)?;

        let mut t = Self::new();
        for (k, v) in names {
            t = t.with_name(&k, &v);
        }
        for (family, shaders) in families {
            t = t.with_family(&family, shaders);
        }
        Ok(t)
    }

    pub fn load(names_path: &Path, families_path: &Path) -> Result<Self> {
        let names = std::fs::read_to_string(names_path)?;
        let families = if families_path.exists() {
            std::fs::read_to_string(families_path)?
        } else {
            "{}".to_string()
        };
        Self::from_json(&names, &families)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl ShaderLookup for ShaderTables {
    fn shader_name(&self, old_ref: &str) -> Option<&str> {
        self.names.get(&old_ref.to_lowercase()).map(String::as_str)
    }

    fn shader_family(&self, old_ref: &str) -> Option<&str> {
        self.families.get(&old_ref.to_lowercase()).map(String::as_str)
    }
}

/// Everything a run reads but never mutates. Built once and shared by `Arc`
/// with every phase and worker task.
pub struct RunContext {
    pub config: ConvertConfig,
    pub shaders: Arc<dyn ShaderLookup>,
}

impl RunContext {
    pub fn new(config: ConvertConfig, shaders: impl ShaderLookup + 'static) -> Self {
        Self { config, shaders: Arc::new(shaders) }
    }
}
