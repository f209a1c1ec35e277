//! Static model descriptor table
//!
//! Loaded once at startup and immutable for the process lifetime. Lookup
//! of an id absent from the table fails fast at selection time with
//! `ChatError::UnknownModel`, never inside an in-flight request.

use crate::errors::{ChatError, Result};
use std::collections::HashMap;

/// Which wire protocol a model's backend speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Chat-completion style: JSON body with `stream: true`, SSE response
    Completion,

    /// Managed-model style: versioned JSON body, binary event-stream response
    EventStream,
}

/// Static description of one selectable model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    /// Short id used by callers and as the conversation key
    pub id: String,

    /// Human-readable name for the presentation layer
    pub display_name: String,

    /// Protocol family served by this model's backend
    pub provider_kind: ProviderKind,

    /// Exact model identifier sent on the wire
    pub backend_model_name: String,
}

impl ModelDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        provider_kind: ProviderKind,
        backend_model_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            provider_kind,
            backend_model_name: backend_model_name.into(),
        }
    }
}

/// Immutable table of selectable models
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: HashMap<String, ModelDescriptor>,
}

impl ModelCatalog {
    /// Build a catalog from descriptors; later duplicates replace earlier ones
    pub fn new(descriptors: Vec<ModelDescriptor>) -> Self {
        let models = descriptors
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();
        Self { models }
    }

    /// The stock model table
    pub fn default_catalog() -> Self {
        Self::new(vec![
            ModelDescriptor::new(
                "gpt-3.5-turbo",
                "GPT-3.5 Turbo",
                ProviderKind::Completion,
                "gpt-3.5-turbo",
            ),
            ModelDescriptor::new("gpt-4", "GPT-4", ProviderKind::Completion, "gpt-4-turbo"),
            ModelDescriptor::new("gpt-4o", "GPT-4-Omni", ProviderKind::Completion, "gpt-4-o"),
            ModelDescriptor::new(
                "sonnet",
                "Sonnet",
                ProviderKind::EventStream,
                "anthropic.claude-3-sonnet-20240229-v1:0",
            ),
            ModelDescriptor::new(
                "haiku",
                "Haiku",
                ProviderKind::EventStream,
                "anthropic.claude-3-haiku-20240307-v1:0",
            ),
            ModelDescriptor::new(
                "opus",
                "Opus",
                ProviderKind::EventStream,
                "anthropic.claude-3-opus-20240229-v1:0",
            ),
        ])
    }

    /// Look up a descriptor by id
    pub fn get(&self, id: &str) -> Result<&ModelDescriptor> {
        self.models.get(id).ok_or_else(|| ChatError::UnknownModel {
            id: id.to_string(),
        })
    }

    /// Whether the catalog contains this id
    pub fn contains(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    /// Iterate over all descriptors (unordered)
    pub fn iter(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.values()
    }

    /// Number of models in the table
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
