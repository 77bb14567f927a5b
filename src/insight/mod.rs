// src/insight/mod.rs

//! Narrative commentary on a reconciled series through an OpenAI-compatible
//! chat-completion endpoint.

use serde::{Deserialize, Serialize};

use crate::jquants::client::{build_http_client, check_status};
use crate::reconcile::period::QuarterSlot;
use crate::reconcile::render::render_quarters;
use crate::utils::error::{ApiError, AppError};

/// How many trailing quarters are sent as raw data.
pub const RAW_QUARTERS: usize = 10;
/// How many of those are repeated as the headline facts.
pub const FACT_QUARTERS: usize = 4;

const MAX_TOKENS: u32 = 800;
const TEMPERATURE: f32 = 0.5;

fn tail(slots: &[QuarterSlot], n: usize) -> &[QuarterSlot] {
    &slots[slots.len().saturating_sub(n)..]
}

/// `"{first}～{last}"` of the window, empty when there is nothing to describe.
pub fn accounting_period(slots: &[QuarterSlot]) -> String {
    match (slots.first(), slots.last()) {
        (Some(first), Some(last)) => format!("{}～{}", first.period_label, last.period_label),
        _ => String::new(),
    }
}

/// Language the narrative is requested in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromptLanguage {
    #[default]
    Japanese,
    English,
}

impl PromptLanguage {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ja" | "japanese" => Some(Self::Japanese),
            "en" | "english" => Some(Self::English),
            _ => None,
        }
    }
}

/// Builds the analyst prompt from the display window.
pub fn build_prompt(company_name: &str, slots: &[QuarterSlot], language: PromptLanguage) -> String {
    let raw = render_quarters(tail(slots, RAW_QUARTERS));
    let facts = render_quarters(tail(tail(slots, RAW_QUARTERS), FACT_QUARTERS));
    let period = accounting_period(slots);

    match language {
        PromptLanguage::Japanese => japanese_prompt(company_name, &period, &facts, &raw),
        PromptLanguage::English => english_prompt(company_name, &period, &facts, &raw),
    }
}

fn japanese_prompt(company_name: &str, period: &str, facts: &str, raw: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str("# 命令文\n");
    prompt.push_str(
        "あなたは証券アナリストです。決算書の内容を読み、業績サマリ、売上高・営業利益・自己資本比率の推移、\
         なぜこのような実績になったのかという推測をするインサイトと質問を投げかけてください。\
         推移やサマリについては実際の実績データを用いて具体的に記述してください。\
         （例：2024/3Qの売上高は100億円でしたが2024/4Qは120億円と1.2倍に成長）\
         質問は会社の経営者の視点でなぜどのようなことを実施したと思われるのか、\
         または実施していくべきかを考えさせるような質問にしてください\n",
    );
    prompt.push_str("# 入力文\n");
    prompt.push_str(&format!("企業名：{}\n", company_name));
    prompt.push_str(&format!("会計期間：{}\n", period));
    prompt.push_str("金額の単位は百万円、NetSales_single と OperatingProfit_single は四半期単独の値です。\n");
    prompt.push_str(&format!("四半期データ：\n{}\n", facts));
    prompt.push_str(&format!("元データ：\n{}\n", raw));
    prompt.push_str("# 出力文\n");
    prompt.push_str(
        "下記項目とスキーマ、文字数の対応で出力してください。\
         ただの数値報告ではなく推移やインサイトを与える文章にしてください。\n",
    );
    prompt.push_str("業績サマリ 箇条書きで400文字以内\n");
    prompt.push_str("売上高の推移 箇条書きで200文字以内\n");
    prompt.push_str("営業利益の推移 箇条書きで200文字以内\n");
    prompt.push_str("自己資本 箇条書きで200文字以内\n");
    prompt.push_str("インサイト（質問） 箇条書きで500文字以内\n");
    prompt
}

fn english_prompt(company_name: &str, period: &str, facts: &str, raw: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str("# Instruction\n");
    prompt.push_str(
        "You are a securities analyst. Read the financial results below and write a performance summary, \
         the trends in net sales, operating profit and equity ratio, insight into why the results turned out \
         this way, and questions for management. Quote concrete figures when describing trends \
         (e.g. net sales grew 1.2x from 10,000 in 2024/3Q to 12,000 in 2024/4Q). Phrase the questions from \
         management's point of view: what they are likely to have done, or should do next.\n",
    );
    prompt.push_str("# Input\n");
    prompt.push_str(&format!("Company: {}\n", company_name));
    prompt.push_str(&format!("Accounting period: {}\n", period));
    prompt.push_str("Amounts are in millions of yen; NetSales_single and OperatingProfit_single are single-quarter figures.\n");
    prompt.push_str(&format!("Quarterly data:\n{}\n", facts));
    prompt.push_str(&format!("Raw data:\n{}\n", raw));
    prompt.push_str("# Output\n");
    prompt.push_str(
        "Answer with the following sections and length limits. Describe movements and insight, not a bare \
         list of numbers.\n",
    );
    prompt.push_str("Performance summary: bullet points, up to 400 characters\n");
    prompt.push_str("Net sales trend: bullet points, up to 200 characters\n");
    prompt.push_str("Operating profit trend: bullet points, up to 200 characters\n");
    prompt.push_str("Equity: bullet points, up to 200 characters\n");
    prompt.push_str("Insight (questions): bullet points, up to 500 characters\n");
    prompt
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NarrativeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl NarrativeClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// Sends one user message and returns the first choice's text.
    pub async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        tracing::info!("Requesting narrative from model {}", self.model);
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(ApiError::from)?;
        let response = check_status(response, "/chat/completions").await?;
        let body: ChatResponse = response.json().await.map_err(ApiError::from)?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AppError::Ai("completion returned no content".to_string()))
    }
}
