//! Provider registry.
//!
//! Holds the static provider catalog and one adapter instance per wire
//! protocol. Which providers are actually usable is derived at call time
//! from which credential env vars are present, so adding a key to the
//! environment enables a provider without restart.

use std::collections::HashMap;
use std::sync::Arc;

use crate::huggingface::HuggingFaceAdapter;
use crate::openai_compat::OpenAiCompatAdapter;
use crate::traits::ChatAdapter;
use shakes_domain::chat::TaskClass;
use shakes_domain::config::{LlmConfig, ProviderConfig, ProviderKind, ProviderName, TaskModels};
use shakes_domain::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderDescriptor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One usable provider, with its credential resolved. Immutable.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub name: ProviderName,
    pub kind: ProviderKind,
    pub base_url: String,
    pub api_key: String,
    /// Lower = preferred.
    pub priority: u8,
    pub models: TaskModels,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

enum CredentialSource {
    /// Read the catalog's env vars on every call.
    Env,
    /// Fixed map, for tests.
    Fixed(HashMap<ProviderName, String>),
}

/// Static catalog plus adapter instances.
pub struct ProviderRegistry {
    catalog: Vec<ProviderConfig>,
    adapters: HashMap<ProviderName, Arc<dyn ChatAdapter>>,
    credentials: CredentialSource,
}

impl ProviderRegistry {
    /// Build the registry from the application's [`LlmConfig`].
    ///
    /// Adapters are constructed eagerly (one per wire protocol, shared
    /// across providers of that kind); credentials are looked up per
    /// call instead.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let openai_compat: Arc<dyn ChatAdapter> =
            Arc::new(OpenAiCompatAdapter::new(config.request_timeout_ms)?);
        let huggingface: Arc<dyn ChatAdapter> =
            Arc::new(HuggingFaceAdapter::new(config.request_timeout_ms)?);

        let mut adapters: HashMap<ProviderName, Arc<dyn ChatAdapter>> = HashMap::new();
        for pc in &config.providers {
            let adapter = match pc.kind {
                ProviderKind::OpenaiCompat => openai_compat.clone(),
                ProviderKind::Huggingface => huggingface.clone(),
            };
            adapters.insert(pc.name, adapter);
            tracing::debug!(provider = %pc.name, kind = ?pc.kind, "registered provider adapter");
        }

        let mut catalog = config.providers.clone();
        catalog.sort_by_key(|p| p.priority);

        Ok(Self {
            catalog,
            adapters,
            credentials: CredentialSource::Env,
        })
    }

    /// Build a registry with fixed credentials and explicit adapters.
    /// Used by tests to stub out the HTTP layer.
    pub fn with_adapters(
        catalog: Vec<ProviderConfig>,
        credentials: HashMap<ProviderName, String>,
        adapters: HashMap<ProviderName, Arc<dyn ChatAdapter>>,
    ) -> Self {
        let mut catalog = catalog;
        catalog.sort_by_key(|p| p.priority);
        Self {
            catalog,
            adapters,
            credentials: CredentialSource::Fixed(credentials),
        }
    }

    // ── Public query API ───────────────────────────────────────────

    /// Providers whose credential is present, sorted ascending by
    /// priority. Pure read; returns empty rather than erroring.
    pub fn enabled_providers(&self) -> Vec<ProviderDescriptor> {
        self.catalog
            .iter()
            .filter_map(|pc| self.resolve(pc))
            .collect()
    }

    /// The highest-priority enabled provider, if any.
    pub fn primary(&self) -> Option<ProviderDescriptor> {
        self.enabled_providers().into_iter().next()
    }

    /// The preferred provider for a task class.
    ///
    /// Groq carries fast work (cheapest and quickest), OpenRouter carries
    /// standard work to spread load, and advanced work goes back to Groq's
    /// larger model. Absent preferences fall back down the priority order.
    pub fn for_task_class(&self, class: TaskClass) -> Option<ProviderDescriptor> {
        let enabled = self.enabled_providers();
        let find = |name: ProviderName| enabled.iter().find(|p| p.name == name).cloned();

        let preferred = match class {
            TaskClass::Fast => find(ProviderName::Groq),
            TaskClass::Standard => {
                find(ProviderName::Openrouter).or_else(|| find(ProviderName::Groq))
            }
            TaskClass::Advanced => {
                find(ProviderName::Groq).or_else(|| find(ProviderName::Openrouter))
            }
        };
        preferred.or_else(|| enabled.into_iter().next())
    }

    /// The adapter that speaks this provider's wire protocol.
    pub fn adapter_for(&self, name: ProviderName) -> Option<Arc<dyn ChatAdapter>> {
        self.adapters.get(&name).cloned()
    }

    /// Whether at least one provider has a credential.
    pub fn has_any_provider(&self) -> bool {
        !self.enabled_providers().is_empty()
    }

    /// Human-readable guidance shown when no provider is configured, or a
    /// one-line summary of the active set.
    pub fn setup_message(&self) -> String {
        let enabled = self.enabled_providers();
        if enabled.is_empty() {
            return "No AI providers configured. Set at least one credential: \
                    GROQ_API_KEY (free, fast), OPENROUTER_API_KEY (free tier), \
                    HUGGINGFACE_API_KEY (free), OPENAI_API_KEY (paid), or \
                    OLLAMA_BASE_URL for a self-hosted model."
                .into();
        }
        format!(
            "Active AI providers: {}",
            enabled
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    // ── Internal helpers ───────────────────────────────────────────

    /// Resolve one catalog entry into a usable descriptor, or `None` when
    /// its credential is absent. The `local` provider's env var doubles as
    /// a base-URL override.
    fn resolve(&self, pc: &ProviderConfig) -> Option<ProviderDescriptor> {
        let credential = self.credential(pc)?;
        let (base_url, api_key) = if pc.name == ProviderName::Local {
            (credential, "local".to_string())
        } else {
            (pc.base_url.clone(), credential)
        };
        Some(ProviderDescriptor {
            name: pc.name,
            kind: pc.kind,
            base_url,
            api_key,
            priority: pc.priority,
            models: pc.models.clone(),
        })
    }

    fn credential(&self, pc: &ProviderConfig) -> Option<String> {
        match &self.credentials {
            CredentialSource::Env => std::env::var(&pc.credential_env)
                .ok()
                .filter(|v| !v.is_empty()),
            CredentialSource::Fixed(map) => map.get(&pc.name).cloned(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
