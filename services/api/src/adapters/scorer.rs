//! services/api/src/adapters/scorer.rs
//!
//! This module contains the adapter for the scoring oracle.
//! It implements the `ScoringService` port from the `core` crate.

const SYSTEM_INSTRUCTIONS: &str =
    "あなたは面接官です。必ず指定されたJSON形式で回答してください。";

const RUBRIC_TEMPLATE: &str = r#"あなたは「短時間で述べた意見」を採点する面接官です。
入力には「質問文」「回答文」が与えられます。以下を0-10で採点し、合計100文字以内で講評してください。

評価基準:
- 結論の明確さ（立場が最初に明言されているか）
- 理由の妥当性（具体性や根拠）
- 視点の多様性（反論/条件付きの補足があるか）

質問文: {question}
回答文: {answer}

出力は必ず次のJSONのみ:
{
  "score_clarity": number,
  "score_reasoning": number,
  "score_diversity": number,
  "summary": "100字以内の日本語"
}"#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use daily_drill_core::domain::ScoreCard;
use daily_drill_core::ports::{PortError, PortResult, ScoringService};
use serde::Deserialize;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ScoringService` using an OpenAI-compatible LLM.
///
/// One shot per call: no internal retries, deterministic decoding (low
/// temperature), bounded output length. Any transport failure, non-JSON
/// output or schema-invalid output fails that call only.
#[derive(Clone)]
pub struct OpenAiScorerAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiScorerAdapter {
    /// Creates a new `OpenAiScorerAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// Response Parsing
//=========================================================================================

/// The wire shape the oracle must produce.
#[derive(Deserialize)]
struct ScorerResponse {
    score_clarity: i32,
    score_reasoning: i32,
    score_diversity: i32,
    summary: String,
}

/// Parses and schema-validates the oracle's raw output. Field presence,
/// field types, score ranges and summary length are all enforced here;
/// nothing about the output is trusted.
fn parse_score_card(raw: &str) -> Result<ScoreCard, String> {
    let response: ScorerResponse =
        serde_json::from_str(raw.trim()).map_err(|e| format!("not valid score JSON: {}", e))?;
    let card = ScoreCard {
        score_clarity: response.score_clarity,
        score_reasoning: response.score_reasoning,
        score_diversity: response.score_diversity,
        summary: response.summary,
    };
    card.validate()?;
    Ok(card)
}

//=========================================================================================
// `ScoringService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ScoringService for OpenAiScorerAdapter {
    /// Scores one answer against the fixed three-criteria rubric.
    async fn score(&self, question_text: &str, answer_text: &str) -> PortResult<ScoreCard> {
        let rubric = RUBRIC_TEMPLATE
            .replace("{question}", question_text)
            .replace("{answer}", answer_text);

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(rubric)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.3)
            .max_tokens(200u32)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Scoring oracle returned no text content.".to_string())
            })?;

        parse_score_card(&content).map_err(PortError::Unexpected)
    }
}
