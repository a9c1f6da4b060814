use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{AppConfig, LlmConfig, ProviderEntry, RoleEntry};
use crate::errors::{SeeShotError, SeeShotResult};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

/// The two decision roles a provider can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Aiming,
    Gameplay,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Aiming => "aiming",
            Role::Gameplay => "gameplay",
        }
    }
}

/// Registry of all available LLM providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: String,
    llm_config: LlmConfig,
}

impl ProviderRegistry {
    pub fn new(llm_config: LlmConfig) -> Self {
        Self {
            providers: HashMap::new(),
            active: llm_config.active_provider.clone(),
            llm_config,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get_active(&self) -> SeeShotResult<Arc<dyn LlmProvider>> {
        self.providers
            .get(&self.active)
            .cloned()
            .ok_or_else(|| SeeShotError::Config(format!("Active provider '{}' not found in registry", self.active)))
    }

    pub fn list_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Return the provider and call configuration for a decision role.
    ///
    /// Role resolution order:
    /// 1. `[llm.roles.<role>]` in config.toml
    /// 2. Fallback: active provider with its default model / temperature
    pub fn call_config_for_role(&self, role: Role) -> SeeShotResult<(Arc<dyn LlmProvider>, CallConfig)> {
        let role_entry: Option<&RoleEntry> = match role {
            Role::Aiming => self.llm_config.roles.aiming.as_ref(),
            Role::Gameplay => self.llm_config.roles.gameplay.as_ref(),
        };

        if let Some(entry) = role_entry {
            let provider = self.providers.get(&entry.provider).cloned().ok_or_else(|| {
                SeeShotError::Config(format!(
                    "Role '{}' references unknown provider '{}'",
                    role.as_str(),
                    entry.provider
                ))
            })?;
            let temperature = entry.temperature.unwrap_or_else(|| {
                self.llm_config
                    .providers
                    .get(&entry.provider)
                    .map(|p| p.temperature)
                    .unwrap_or(0.1)
            });
            tracing::debug!(
                role = role.as_str(),
                provider = %entry.provider,
                model = %entry.model,
                temperature = temperature,
                "resolved role config"
            );
            return Ok((
                provider,
                CallConfig {
                    model: entry.model.clone(),
                    temperature,
                    fallback_models: entry.fallback_models.clone(),
                    ignore_providers: entry.ignore_providers.clone(),
                },
            ));
        }

        let provider = self.get_active()?;
        let (model, temperature) = self
            .llm_config
            .providers
            .get(&self.active)
            .map(|p| (p.model.clone(), p.temperature))
            .unwrap_or_else(|| (String::new(), 0.1));
        tracing::debug!(
            role = role.as_str(),
            provider = %self.active,
            model = %model,
            "role not configured, using active provider fallback"
        );
        Ok((
            provider,
            CallConfig {
                model,
                temperature,
                ..Default::default()
            },
        ))
    }

    /// Build a registry from the loaded app config.
    pub fn from_config(config: &AppConfig) -> SeeShotResult<Self> {
        let mut registry = Self::new(config.llm.clone());
        for (id, entry) in &config.llm.providers {
            let api_key = resolve_api_key(id, entry, |name| std::env::var(name).ok());
            if api_key.is_empty() {
                tracing::warn!(provider = %id, "no API key configured");
            }
            let provider = OpenAiCompatibleProvider::new(id.clone(), entry.api_base.clone(), api_key)?;
            registry.register(Arc::new(provider));
        }
        Ok(registry)
    }
}

/// API key lookup order: `SEESHOT_<ID>_API_KEY`, the entry's `api_key_env`, then `api_key`.
pub fn resolve_api_key(
    id: &str,
    entry: &ProviderEntry,
    lookup: impl Fn(&str) -> Option<String>,
) -> String {
    let prefixed = format!("SEESHOT_{}_API_KEY", id.to_uppercase());
    lookup(&prefixed)
        .or_else(|| entry.api_key_env.as_deref().and_then(&lookup))
        .or_else(|| entry.api_key.clone())
        .unwrap_or_default()
}
