//! Compilation options supplied by the embedding driver

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A value bound to a `TMPL_*` placeholder at assembly time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateValue {
    Int(u64),
    Bytes(Vec<u8>),
}

/// Options for one compiler invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileOptions {
    /// AVM version the emitted program targets
    pub target_avm_version: u64,
    /// 0 disables the optimizer, 1 is the default, 2 enables all passes
    pub optimization_level: u8,
    /// Where artifact writers place their output
    pub out_dir: Option<PathBuf>,
    /// Bindings for template variables, keyed by name without the `TMPL_` prefix
    pub template_variables: BTreeMap<String, TemplateValue>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            target_avm_version: 10,
            optimization_level: 1,
            out_dir: None,
            template_variables: BTreeMap::new(),
        }
    }
}

impl CompileOptions {
    pub fn optimized(&self) -> bool {
        self.optimization_level > 0
    }
}
