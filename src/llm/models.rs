//! The two decision models the arbiter races against each other.
//!
//! [`TargetingModel`] looks at the bare frame and answers with a point (or
//! nothing). [`ActionModel`] sees recent history plus the frame and answers
//! with tool calls. Neither performs any effect itself; the control loop does.

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent_engine::memory::MemoryContext;
use crate::errors::{SeeShotError, SeeShotResult};
use crate::llm::prompts::GAMEPLAY_SYSTEM_PROMPT;
use crate::llm::provider::LlmProvider;
use crate::llm::types::{
    CallConfig, ChatMessage, ContentPart, LlmResponse, ProviderMetadata, ToolDef, ToolInvocation,
};
use crate::perception::types::Frame;

#[derive(Debug, Clone, Default)]
pub struct TargetingOutput {
    /// Raw model text; `None` when the provider blocked or returned nothing.
    pub content: Option<String>,
    pub metadata: ProviderMetadata,
}

#[derive(Debug, Clone, Default)]
pub struct ActionOutput {
    pub content: Option<String>,
    pub metadata: ProviderMetadata,
    pub tool_invocations: Vec<ToolInvocation>,
}

#[async_trait]
pub trait TargetingModel: Send + Sync {
    async fn locate(&self, frame: &Frame) -> SeeShotResult<TargetingOutput>;
}

#[async_trait]
pub trait ActionModel: Send + Sync {
    async fn decide(&self, context: &MemoryContext, frame: &Frame) -> SeeShotResult<ActionOutput>;
}

fn metadata(provider: &dyn LlmProvider, resp: &LlmResponse) -> ProviderMetadata {
    ProviderMetadata {
        provider: provider.name().to_string(),
        model: resp.model.clone(),
        response_id: resp.id.clone(),
    }
}

/// Grounding-capable vision model that returns a single aim point.
pub struct AimingModel {
    provider: Arc<dyn LlmProvider>,
    call: CallConfig,
    system_prompt: String,
}

impl AimingModel {
    /// Only these models reliably return pixel coordinates.
    pub const ALLOWED_MODELS: &'static [&'static str] = &[
        "qwen/qwen2.5-vl-3b-instruct:free",
        "qwen/qwen-2.5-vl-7b-instruct:free",
        "qwen/qwen-2.5-vl-7b-instruct",
        "qwen/qwen2.5-vl-32b-instruct:free",
        "qwen/qwen2.5-vl-32b-instruct",
        "qwen/qwen2.5-vl-72b-instruct",
    ];

    /// Router fallback order when none is configured.
    pub const MODELS_ORDERED: &'static [&'static str] = &[
        "qwen/qwen2.5-vl-32b-instruct",
        "qwen/qwen2.5-vl-72b-instruct",
        "qwen/qwen-2.5-vl-7b-instruct",
        "qwen/qwen2.5-vl-32b-instruct:free",
    ];

    pub const DEFAULT_IGNORED_PROVIDERS: &'static [&'static str] = &["Together"];

    pub fn new(
        provider: Arc<dyn LlmProvider>,
        mut call: CallConfig,
        system_prompt: impl Into<String>,
    ) -> SeeShotResult<Self> {
        if !Self::ALLOWED_MODELS.contains(&call.model.as_str()) {
            return Err(SeeShotError::Config(format!(
                "Model '{}' can't be used for aiming. Allowed models are: {:?}",
                call.model,
                Self::ALLOWED_MODELS
            )));
        }
        if call.fallback_models.is_empty() {
            call.fallback_models = Self::MODELS_ORDERED
                .iter()
                .filter(|m| **m != call.model)
                .map(|m| m.to_string())
                .collect();
        } else {
            let model = call.model.clone();
            call.fallback_models.retain(|m| *m != model);
        }
        if call.ignore_providers.is_empty() {
            call.ignore_providers = Self::DEFAULT_IGNORED_PROVIDERS.iter().map(|p| p.to_string()).collect();
        }
        tracing::debug!(model = %call.model, fallbacks = ?call.fallback_models, "aiming model ready");
        Ok(Self {
            provider,
            call,
            system_prompt: system_prompt.into(),
        })
    }

    pub fn call_config(&self) -> &CallConfig {
        &self.call
    }
}

#[async_trait]
impl TargetingModel for AimingModel {
    async fn locate(&self, frame: &Frame) -> SeeShotResult<TargetingOutput> {
        let messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user_parts(vec![frame.to_content_part()]),
        ];
        let resp = self.provider.chat(messages, Vec::new(), &self.call).await?;
        Ok(TargetingOutput {
            metadata: metadata(self.provider.as_ref(), &resp),
            content: resp.content,
        })
    }
}

/// Tool-calling model that picks a gameplay action from recent history.
pub struct GameplayModel {
    provider: Arc<dyn LlmProvider>,
    call: CallConfig,
    tools: Vec<ToolDef>,
}

impl GameplayModel {
    pub fn new(provider: Arc<dyn LlmProvider>, call: CallConfig, tools: Vec<ToolDef>) -> Self {
        Self { provider, call, tools }
    }

    /// Previous action labels, previous images, then the current frame.
    pub fn build_messages(context: &MemoryContext, frame: &Frame) -> Vec<ChatMessage> {
        let mut parts = Vec::with_capacity(context.images.len() + 3);
        if !context.is_empty() {
            parts.push(ContentPart::Text {
                text: format!("Previous actions (oldest first): {:?}", context.actions),
            });
            parts.extend(context.images.iter().cloned());
        }
        parts.push(ContentPart::Text {
            text: "Current frame:".to_string(),
        });
        parts.push(frame.to_content_part());

        vec![
            ChatMessage::system(GAMEPLAY_SYSTEM_PROMPT),
            ChatMessage::user_parts(parts),
        ]
    }
}

#[async_trait]
impl ActionModel for GameplayModel {
    async fn decide(&self, context: &MemoryContext, frame: &Frame) -> SeeShotResult<ActionOutput> {
        let messages = Self::build_messages(context, frame);
        let resp = self.provider.chat(messages, self.tools.clone(), &self.call).await?;
        let tool_invocations = resp.tool_calls.iter().map(ToolInvocation::from_tool_call).collect();
        Ok(ActionOutput {
            metadata: metadata(self.provider.as_ref(), &resp),
            content: resp.content,
            tool_invocations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{FunctionCall, MessageContent, ToolCall};
    use crate::perception::types::ScreenshotMeta;
    use std::sync::Mutex;

    /// Returns a canned response and remembers the last request.
    struct CannedProvider {
        response: LlmResponse,
        seen: Mutex<Option<(Vec<ChatMessage>, usize, CallConfig)>>,
    }

    impl CannedProvider {
        fn new(response: LlmResponse) -> Arc<Self> {
            Arc::new(Self { response, seen: Mutex::new(None) })
        }
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn chat(
            &self,
            messages: Vec<ChatMessage>,
            tools: Vec<ToolDef>,
            cfg: &CallConfig,
        ) -> SeeShotResult<LlmResponse> {
            *self.seen.lock().unwrap() = Some((messages, tools.len(), cfg.clone()));
            Ok(self.response.clone())
        }
    }

    fn frame() -> Frame {
        let meta = ScreenshotMeta {
            monitor_index: 0,
            scale_factor: 1.0,
            physical_width: 1920,
            physical_height: 1080,
        };
        Frame::new(vec![1, 2, 3], meta, "test#0")
    }

    fn call(model: &str) -> CallConfig {
        CallConfig { model: model.into(), temperature: 0.0, ..Default::default() }
    }

    #[test]
    fn test_disallowed_aiming_model_rejected() {
        let provider = CannedProvider::new(LlmResponse::default());
        let err = AimingModel::new(provider, call("gpt-4o"), "p");
        assert!(matches!(err, Err(SeeShotError::Config(_))));
    }

    #[test]
    fn test_fallbacks_exclude_chosen_model() {
        let provider = CannedProvider::new(LlmResponse::default());
        let model = AimingModel::new(provider, call("qwen/qwen2.5-vl-72b-instruct"), "p").unwrap();
        let cfg = model.call_config();
        assert_eq!(cfg.fallback_models.len(), 3);
        assert!(!cfg.fallback_models.contains(&cfg.model));
        assert_eq!(cfg.ignore_providers, vec!["Together"]);
    }

    #[tokio::test]
    async fn test_locate_sends_prompt_and_frame_only() {
        let provider = CannedProvider::new(LlmResponse {
            id: Some("gen-1".into()),
            model: Some("qwen/qwen2.5-vl-32b-instruct".into()),
            content: Some(r#"{"point": {"x": "1", "y": "2"}}"#.into()),
            tool_calls: vec![],
        });
        let model = AimingModel::new(provider.clone(), call("qwen/qwen2.5-vl-32b-instruct"), "find").unwrap();
        let out = model.locate(&frame()).await.unwrap();
        assert_eq!(out.metadata.provider, "canned");
        assert_eq!(out.metadata.response_id.as_deref(), Some("gen-1"));
        assert!(out.content.unwrap().contains("point"));

        let (messages, tools, _) = provider.seen.lock().unwrap().clone().unwrap();
        assert_eq!(tools, 0);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
    }

    #[tokio::test]
    async fn test_decide_decodes_tool_calls() {
        let provider = CannedProvider::new(LlmResponse {
            id: Some("gen-2".into()),
            model: None,
            content: None,
            tool_calls: vec![ToolCall {
                id: "c1".into(),
                call_type: "function".into(),
                function: FunctionCall { name: "reload".into(), arguments: "{}".into() },
            }],
        });
        let tools = crate::llm::tools::load_gameplay_tools().unwrap();
        let model = GameplayModel::new(provider.clone(), call("any"), tools);
        let out = model.decide(&MemoryContext::default(), &frame()).await.unwrap();
        assert_eq!(out.tool_invocations.len(), 1);
        assert_eq!(out.tool_invocations[0].name, "reload");
        assert_eq!(provider.seen.lock().unwrap().as_ref().unwrap().1, 5);
    }

    #[test]
    fn test_gameplay_messages_include_history() {
        let ctx = MemoryContext {
            actions: vec!["Aim & Shoot".into(), "No Action".into()],
            images: vec![frame().to_content_part(), frame().to_content_part()],
        };
        let messages = GameplayModel::build_messages(&ctx, &frame());
        let MessageContent::Parts(parts) = &messages[1].content else {
            panic!("user turn should carry parts");
        };
        // history text + 2 images + label + current frame
        assert_eq!(parts.len(), 5);
        assert!(matches!(&parts[0], ContentPart::Text { text } if text.contains("Aim & Shoot")));

        let empty = GameplayModel::build_messages(&MemoryContext::default(), &frame());
        let MessageContent::Parts(parts) = &empty[1].content else {
            panic!("user turn should carry parts");
        };
        assert_eq!(parts.len(), 2);
    }
}
