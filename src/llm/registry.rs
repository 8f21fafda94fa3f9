// src/llm/registry.rs
// Capability lookup for model names

/// Which wire shape the provider endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Classic chat-completions: `choices[0].message.content`.
    Chat,
    /// Responses-style endpoint: `input` request field, `output_text` reply.
    Responses,
}

/// Capability tags attached to a model name.
#[derive(Debug, Clone, Copy)]
pub struct ModelCaps {
    /// Some model families ignore or reject caller temperatures; when set,
    /// this value always wins over the configured one.
    pub fixed_temperature: Option<f64>,
    pub response_shape: ResponseShape,
}

impl Default for ModelCaps {
    fn default() -> Self {
        Self {
            fixed_temperature: None,
            response_shape: ResponseShape::Chat,
        }
    }
}

/// Prefix-keyed capability table. Replaces ad-hoc branching on model-name
/// lists: defaults cover the known families, and callers can register
/// additional rules without touching the lookup.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    rules: Vec<(String, ModelCaps)>,
}

impl ModelRegistry {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        // Reasoning families run at a fixed sampling temperature.
        registry.register("o1", ModelCaps {
            fixed_temperature: Some(1.0),
            response_shape: ResponseShape::Chat,
        });
        registry.register("o3", ModelCaps {
            fixed_temperature: Some(1.0),
            response_shape: ResponseShape::Chat,
        });
        registry.register("o4-mini", ModelCaps {
            fixed_temperature: Some(1.0),
            response_shape: ResponseShape::Chat,
        });
        registry.register("deepseek-reasoner", ModelCaps {
            fixed_temperature: Some(1.0),
            response_shape: ResponseShape::Chat,
        });
        // o3-pro only answers on the responses-shaped endpoint.
        registry.register("o3-pro", ModelCaps {
            fixed_temperature: Some(1.0),
            response_shape: ResponseShape::Responses,
        });
        registry
    }

    pub fn register(&mut self, prefix: impl Into<String>, caps: ModelCaps) {
        self.rules.push((prefix.into(), caps));
    }

    /// Longest matching prefix wins; unknown models get standard chat
    /// capabilities.
    pub fn resolve(&self, model: &str) -> ModelCaps {
        self.rules
            .iter()
            .filter(|(prefix, _)| model.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, caps)| *caps)
            .unwrap_or_default()
    }
}
