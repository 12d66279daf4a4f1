//! Assembly-time context: template-variable bindings and the debug-event map

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::options::TemplateValue;

/// A debug event keyed by bytecode offset, consumed by the external
/// debug-info writer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub subroutine: String,
    pub block: String,
    pub op: String,
}

/// State accumulated while assembling one program
#[derive(Debug, Default)]
pub struct AssembleContext {
    pub template_variables: BTreeMap<String, TemplateValue>,
    pub events: BTreeMap<usize, Event>,
}

impl AssembleContext {
    pub fn new(template_variables: BTreeMap<String, TemplateValue>) -> Self {
        Self {
            template_variables,
            events: BTreeMap::new(),
        }
    }
}
