use crate::registry::ProviderDescriptor;
use shakes_domain::chat::{CompletionRequest, CompletionResult};
use shakes_domain::error::Result;

/// Trait that every provider adapter must implement.
///
/// Implementations translate between our internal request/result types and
/// the wire format of one provider family's HTTP API (OpenAI-compatible,
/// Hugging Face inference). The descriptor carries the per-provider pieces
/// (endpoint, credential, model table) so one adapter instance can serve
/// every provider of its kind.
#[async_trait::async_trait]
pub trait ChatAdapter: Send + Sync {
    /// Send a chat completion request and wait for the normalized result.
    async fn send(
        &self,
        provider: &ProviderDescriptor,
        req: &CompletionRequest,
    ) -> Result<CompletionResult>;
}
