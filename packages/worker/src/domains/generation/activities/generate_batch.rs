//! One generation call: prompt for a chunk of questions and validate the reply.
//!
//! A reply is parsed leniently. Each item is checked on its own, so one
//! malformed question does not discard the rest of the chunk.

use openai_client::{strip_code_blocks, truncate_to_char_boundary, StructuredOutput};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::config::GenerationSettings;
use crate::domains::generation::error::{GenerationError, JobFatalError};
use crate::domains::generation::models::{
    AnswerFormat, Difficulty, JobConfig, QuestionOption, SourceDocument,
};
use crate::kernel::{StructuredPrompt, WorkerDeps};

const TOKENS_PER_QUESTION: u32 = 1_500;
const MAX_REPLY_TOKENS: u32 = 16_384;

// ============================================================================
// Reply schema
// ============================================================================

/// Shape the generation service is asked to return.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QuestionBatchReply {
    pub items: Vec<DraftReply>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DraftReply {
    /// Full question text, including any passage it depends on
    pub statement: String,
    /// Answer options in display order
    pub options: Vec<DraftOptionReply>,
    /// Why the correct option is correct
    #[serde(default)]
    pub explanation: Option<String>,
    /// Estimated difficulty from 1 (easiest) to 5 (hardest)
    #[serde(default)]
    pub difficulty: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DraftOptionReply {
    pub label: String,
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

#[derive(Deserialize)]
struct LooseReply {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

// ============================================================================
// Inputs and outputs
// ============================================================================

/// Document text embedded into document-backed prompts.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentExcerpt {
    pub id: Uuid,
    pub file_name: String,
    pub text: String,
}

impl DocumentExcerpt {
    pub fn from_document(document: &SourceDocument, max_chars: usize) -> Result<Self, JobFatalError> {
        let text = document
            .content()
            .ok_or(JobFatalError::EmptyDocument(document.id))?;

        Ok(Self {
            id: document.id,
            file_name: document.file_name.clone(),
            text: truncate_to_char_boundary(text, max_chars).to_string(),
        })
    }
}

/// Everything one call needs.
#[derive(Debug, Clone)]
pub struct ChunkRequest<'a> {
    pub index: u32,
    pub size: u32,
    pub config: &'a JobConfig,
    pub subject_name: &'a str,
    pub topic_name: &'a str,
    pub document: Option<&'a DocumentExcerpt>,
}

/// A question that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionDraft {
    pub statement: String,
    pub options: Vec<QuestionOption>,
    pub answer_key: String,
    pub explanation: Option<String>,
    pub difficulty: i16,
}

#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub drafts: Vec<QuestionDraft>,
    pub rejected: Vec<GenerationError>,
    /// Items beyond the requested chunk size, dropped.
    pub surplus: usize,
}

// ============================================================================
// Chunking
// ============================================================================

/// Sizes of the calls needed for `requested` questions, `batch_size` at a time.
pub fn plan_chunks(requested: u32, batch_size: u32) -> Vec<u32> {
    let batch_size = batch_size.max(1);
    let mut remaining = requested;
    let mut chunks = Vec::with_capacity(requested.div_ceil(batch_size) as usize);
    while remaining > 0 {
        let size = remaining.min(batch_size);
        chunks.push(size);
        remaining -= size;
    }
    chunks
}

pub fn reply_token_budget(size: u32) -> u32 {
    TOKENS_PER_QUESTION
        .saturating_mul(size)
        .min(MAX_REPLY_TOKENS)
}

// ============================================================================
// Prompt
// ============================================================================

const SYSTEM_PROMPT: &str = "You write original exam questions for public-service \
entrance exams. Questions must be unambiguous, have exactly one correct answer and \
match the requested style. Reply with JSON only.";

pub fn build_prompt(request: &ChunkRequest<'_>, settings: &GenerationSettings) -> StructuredPrompt {
    let config = request.config;
    let mut user = String::new();

    match request.document {
        Some(document) => {
            user.push_str(&format!(
                "Write {} questions based strictly on the document below.\n\n\
                 Document: {}\n---\n{}\n---\n\n",
                request.size, document.file_name, document.text
            ));
        }
        None => {
            user.push_str(&format!("Write {} questions.\n\n", request.size));
        }
    }

    user.push_str(&format!("Subject: {}\n", request.subject_name));
    user.push_str(&format!("Topic: {}\n", request.topic_name));
    user.push_str(&format!("Exam board style: {}\n", config.exam_board_or_default()));
    if let Some(year) = config.exam_year {
        user.push_str(&format!("Reference year: {}\n", year));
    }
    user.push_str(&format!("Difficulty: {}\n", config.difficulty.as_str()));

    match config.answer_format {
        AnswerFormat::MultipleChoice => user.push_str(
            "Format: multiple choice with five options labeled A to E, exactly one marked correct.\n",
        ),
        AnswerFormat::TrueFalse => user.push_str(
            "Format: a statement to judge, with two options labeled T (true) and F (false), \
             exactly one marked correct.\n",
        ),
    }

    if let Some(extra) = config.extra_instructions() {
        user.push_str(&format!("\nAdditional instructions: {}\n", extra));
    }

    user.push_str(
        "\nFor each question give an explanation of the answer and a difficulty estimate from 1 to 5.",
    );

    StructuredPrompt {
        model: settings.model.clone(),
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt: user,
        schema: QuestionBatchReply::openai_schema(),
        schema_name: "question_batch".to_string(),
        temperature: settings.temperature,
        max_tokens: reply_token_budget(request.size),
    }
}

// ============================================================================
// Reply parsing
// ============================================================================

/// Parse a reply, keeping at most `requested` valid questions.
pub fn parse_reply(
    content: &str,
    requested: usize,
    fallback: Difficulty,
) -> Result<ParsedBatch, GenerationError> {
    let content = strip_code_blocks(content.trim());
    if content.is_empty() {
        return Err(GenerationError::EmptyReply);
    }

    let reply: LooseReply = serde_json::from_str(content)
        .map_err(|e| GenerationError::Unparsable(e.to_string()))?;
    if reply.items.is_empty() {
        return Err(GenerationError::NoItems);
    }

    let surplus = reply.items.len().saturating_sub(requested);
    let mut batch = ParsedBatch {
        surplus,
        ..Default::default()
    };

    for (index, value) in reply.items.into_iter().take(requested).enumerate() {
        let item = serde_json::from_value::<DraftReply>(value)
            .map_err(|e| GenerationError::InvalidItem {
                index,
                reason: e.to_string(),
            })
            .and_then(|item| validate_item(index, item, fallback));

        match item {
            Ok(draft) => batch.drafts.push(draft),
            Err(e) => batch.rejected.push(e),
        }
    }

    Ok(batch)
}

fn validate_item(
    index: usize,
    item: DraftReply,
    fallback: Difficulty,
) -> Result<QuestionDraft, GenerationError> {
    let invalid = |reason: &str| GenerationError::InvalidItem {
        index,
        reason: reason.to_string(),
    };

    let statement = item.statement.trim();
    if statement.is_empty() {
        return Err(invalid("statement is empty"));
    }

    let options: Vec<QuestionOption> = item
        .options
        .into_iter()
        .filter(|o| !o.label.trim().is_empty() || !o.text.trim().is_empty())
        .map(|o| QuestionOption {
            label: o.label.trim().to_string(),
            text: o.text.trim().to_string(),
            correct: o.correct,
        })
        .collect();

    let answer_key = answer_key(&options).ok_or_else(|| invalid("no answer options"))?;

    Ok(QuestionDraft {
        statement: statement.to_string(),
        options,
        answer_key,
        explanation: item
            .explanation
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty()),
        difficulty: difficulty_level(item.difficulty, fallback),
    })
}

/// Label of the first option marked correct, else of the first option.
pub fn answer_key(options: &[QuestionOption]) -> Option<String> {
    options
        .iter()
        .find(|o| o.correct)
        .or_else(|| options.first())
        .map(|o| o.label.clone())
}

/// The model's estimate when it is within 1..=5, else the configured level.
pub fn difficulty_level(estimate: Option<i64>, fallback: Difficulty) -> i16 {
    match estimate {
        Some(level @ 1..=5) => level as i16,
        _ => fallback.level(),
    }
}

// ============================================================================
// Activity
// ============================================================================

/// Wait for the rate limiter, call the generation service once and parse.
pub async fn generate_batch(
    request: &ChunkRequest<'_>,
    settings: &GenerationSettings,
    deps: &WorkerDeps,
) -> Result<ParsedBatch, GenerationError> {
    let prompt = build_prompt(request, settings);

    deps.rate_limiter.until_ready().await;
    debug!(
        chunk = request.index,
        size = request.size,
        max_tokens = prompt.max_tokens,
        "Requesting question batch"
    );

    let reply = deps
        .ai
        .generate_structured(prompt)
        .await
        .map_err(|e| GenerationError::Service(e.to_string()))?;

    parse_reply(&reply, request.size as usize, request.config.difficulty)
}
