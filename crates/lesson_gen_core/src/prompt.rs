//! crates/lesson_gen_core/src/prompt.rs
//!
//! The schema-validated prompt invoker. A `PromptFlow` pairs a prompt template
//! with an input type and an output type: it validates the input, renders the
//! template, calls the `ModelProvider` with the output's JSON Schema, and parses
//! the raw reply back into the output type. Provider text is never trusted
//! unparsed.

use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use regex::{Captures, Regex};
use schemars::{gen::SchemaSettings, JsonSchema};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::ports::{LessonError, ModelProvider};

//=========================================================================================
// Flow Input / Output Contracts
//=========================================================================================

/// A typed input accepted by a `PromptFlow`. Its serialized fields feed the template.
pub trait FlowInput: Serialize + Send + Sync {
    /// Rejects input that must not reach the provider.
    fn check(&self) -> Result<(), LessonError> {
        Ok(())
    }
}

/// A typed output produced by a `PromptFlow`. Its JSON Schema constrains the provider.
pub trait FlowOutput: DeserializeOwned + JsonSchema + Send {
    /// Rejects output that parsed but is still unusable.
    fn check(&self) -> Result<(), LessonError> {
        Ok(())
    }
}

//=========================================================================================
// Templates
//=========================================================================================

/// Matches `{{{name}}}` or `{{name}}`, with optional inner whitespace. The
/// braces must balance.
fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(
            r"\{\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}\}|\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}",
        )
        .expect("placeholder pattern is a valid regex")
    })
}

fn placeholder_name<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map_or("", |m| m.as_str())
}

/// Natural-language prompt text with placeholders filled from an input's fields.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Substitutes every placeholder with the matching field of `input`.
    ///
    /// String fields are inserted verbatim; any other JSON value is inserted as
    /// its JSON text. A placeholder without a matching field is a validation error.
    pub fn render<I: Serialize>(&self, input: &I) -> Result<String, LessonError> {
        let value = serde_json::to_value(input)
            .map_err(|e| LessonError::Validation(format!("input is not serializable: {}", e)))?;
        let fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(LessonError::Validation(format!(
                    "prompt input must be an object, got {}",
                    other
                )))
            }
        };

        let mut missing: Vec<String> = Vec::new();
        let rendered = placeholder_regex().replace_all(&self.text, |caps: &Captures| {
            let name = placeholder_name(caps);
            match fields.get(name) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => {
                    missing.push(name.to_string());
                    String::new()
                }
            }
        });

        if !missing.is_empty() {
            return Err(LessonError::Validation(format!(
                "prompt input is missing field(s): {}",
                missing.join(", ")
            )));
        }
        Ok(rendered.into_owned())
    }
}

//=========================================================================================
// Output Schema
//=========================================================================================

/// The structural constraint sent to the provider alongside a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub description: String,
    /// A self-contained JSON Schema object (sub-schemas inlined).
    pub schema: Value,
}

impl OutputSchema {
    /// Derives the schema of `T`.
    pub fn for_type<T: JsonSchema>(name: impl Into<String>, description: impl Into<String>) -> Self {
        let generator = SchemaSettings::draft07()
            .with(|s| {
                s.inline_subschemas = true;
                s.meta_schema = None;
            })
            .into_generator();
        let root = generator.into_root_schema_for::<T>();
        let schema = serde_json::to_value(&root).unwrap_or_else(|e| {
            warn!(error = %e, "Output schema could not be serialized; sending an open schema");
            Value::Bool(true)
        });
        Self {
            name: name.into(),
            description: description.into(),
            schema,
        }
    }
}

//=========================================================================================
// Output Parsing
//=========================================================================================

/// Removes a Markdown code fence around a model reply, if there is one.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (e.g. `json`) on the opening fence line.
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parses raw provider text into `O`, failing with a generation error.
pub fn parse_structured_output<O: DeserializeOwned>(
    flow: &str,
    raw: &str,
) -> Result<O, LessonError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(LessonError::Generation(format!(
            "{} returned an empty response",
            flow
        )));
    }
    serde_json::from_str(body).map_err(|e| {
        LessonError::Generation(format!(
            "{} returned output that does not match its schema: {}",
            flow, e
        ))
    })
}

//=========================================================================================
// The Invoker
//=========================================================================================

/// A named prompt bound to an input type, an output type, and a provider.
pub struct PromptFlow<I, O> {
    name: &'static str,
    template: PromptTemplate,
    schema: OutputSchema,
    provider: Arc<dyn ModelProvider>,
    _types: PhantomData<fn(&I) -> O>,
}

impl<I: FlowInput, O: FlowOutput> PromptFlow<I, O> {
    pub fn new(
        name: &'static str,
        template: PromptTemplate,
        output_description: &str,
        provider: Arc<dyn ModelProvider>,
    ) -> Self {
        Self {
            name,
            template,
            schema: OutputSchema::for_type::<O>(name, output_description),
            provider,
            _types: PhantomData,
        }
    }

    /// Runs one invocation: exactly one provider call, no retries.
    pub async fn run(&self, input: &I) -> Result<O, LessonError> {
        input.check()?;
        let prompt = self.template.render(input)?;
        debug!(flow = self.name, prompt_len = prompt.len(), "Invoking model provider");

        let raw = self.provider.invoke(&prompt, &self.schema).await?;
        let output: O = parse_structured_output(self.name, &raw)?;
        output.check().inspect_err(|e| {
            warn!(flow = self.name, error = %e, "Provider output failed validation");
        })?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Serialize)]
    struct TopicInput {
        topic: String,
    }

    impl FlowInput for TopicInput {
        fn check(&self) -> Result<(), LessonError> {
            if self.topic.trim().is_empty() {
                return Err(LessonError::Validation("empty".to_string()));
            }
            Ok(())
        }
    }

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Echo {
        text: String,
    }

    impl FlowOutput for Echo {}

    /// Replies with a fixed text and remembers every prompt it saw.
    struct ScriptedProvider {
        reply: PortResult<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn replying(reply: PortResult<String>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn invoke(&self, prompt: &str, _schema: &OutputSchema) -> PortResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(PortError::Unexpected(e.to_string())),
            }
        }
    }

    fn echo_flow(provider: Arc<ScriptedProvider>) -> PromptFlow<TopicInput, Echo> {
        PromptFlow::new(
            "echoFlow",
            PromptTemplate::new("Talk about {{{topic}}} and {{ topic }}."),
            "An echo.",
            provider,
        )
    }

    #[test]
    fn render_substitutes_both_placeholder_forms() {
        let template = PromptTemplate::new("A {{{topic}}} B {{topic}} C {{ topic }}");
        let rendered = template
            .render(&TopicInput {
                topic: "<Rust>".to_string(),
            })
            .unwrap();
        assert_eq!(rendered, "A <Rust> B <Rust> C <Rust>");
    }

    #[test]
    fn render_leaves_unbalanced_braces_outside_the_placeholder() {
        let input = TopicInput {
            topic: "Rust".to_string(),
        };
        assert_eq!(
            PromptTemplate::new("{{{topic}}").render(&input).unwrap(),
            "{Rust"
        );
        assert_eq!(
            PromptTemplate::new("{{topic}}}").render(&input).unwrap(),
            "Rust}"
        );
    }

    #[test]
    fn render_rejects_missing_fields() {
        let template = PromptTemplate::new("{{topic}} and {{feedback}}");
        let err = template
            .render(&TopicInput {
                topic: "x".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, LessonError::Validation(msg) if msg.contains("feedback")));
    }

    #[test]
    fn render_inserts_non_string_values_as_json() {
        #[derive(Serialize)]
        struct Counted {
            count: u32,
        }
        let rendered = PromptTemplate::new("n={{count}}")
            .render(&Counted { count: 3 })
            .unwrap();
        assert_eq!(rendered, "n=3");
    }

    #[test]
    fn parse_accepts_fenced_json() {
        let parsed: Echo =
            parse_structured_output("f", "```json\n{\"text\": \"hi\"}\n```").unwrap();
        assert_eq!(parsed.text, "hi");
    }

    #[test]
    fn parse_rejects_empty_and_malformed_output() {
        let empty = parse_structured_output::<Echo>("f", "   ").unwrap_err();
        assert!(matches!(empty, LessonError::Generation(_)));

        let malformed = parse_structured_output::<Echo>("f", r#"{"other": 1}"#).unwrap_err();
        assert!(matches!(malformed, LessonError::Generation(_)));
    }

    #[test]
    fn schema_is_self_contained() {
        let schema = OutputSchema::for_type::<Echo>("echo", "An echo.");
        assert_eq!(schema.schema["type"], "object");
        assert!(schema.schema["properties"]["text"].is_object());
        assert_eq!(schema.name, "echo");
    }

    #[tokio::test]
    async fn run_renders_calls_once_and_parses() {
        let provider = ScriptedProvider::replying(Ok(r#"{"text":"ok"}"#.to_string()));
        let flow = echo_flow(provider.clone());

        let out = flow
            .run(&TopicInput {
                topic: "Tides".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(out.text, "ok");
        assert_eq!(provider.calls(), 1);
        assert_eq!(
            provider.prompts.lock().unwrap()[0],
            "Talk about Tides and Tides."
        );
    }

    #[tokio::test]
    async fn run_validates_before_calling_provider() {
        let provider = ScriptedProvider::replying(Ok(r#"{"text":"ok"}"#.to_string()));
        let flow = echo_flow(provider.clone());

        let err = flow
            .run(&TopicInput {
                topic: "  ".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LessonError::Validation(_)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn run_maps_provider_failure_to_generation_error() {
        let provider =
            ScriptedProvider::replying(Err(PortError::Unexpected("boom".to_string())));
        let flow = echo_flow(provider);

        let err = flow
            .run(&TopicInput {
                topic: "Tides".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LessonError::Generation(msg) if msg.contains("boom")));
    }
}
