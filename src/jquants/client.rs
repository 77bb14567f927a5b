// src/jquants/client.rs
use reqwest::{header, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::jquants::models::{
    AuthRefreshResponse, AuthUserResponse, DailyQuote, DailyQuotesResponse, ListedCompany,
    ListedInfoResponse, StatementRow, StatementsResponse,
};
use crate::utils::config::Credentials;
use crate::utils::error::{ApiError, AppError};

const USER_AGENT: &str = concat!("jquants_fins/", env!("CARGO_PKG_VERSION"));
// J-Quants throttles bursts; one request at a time with a short pause is enough.
const DEFAULT_REQUEST_DELAY_MS: u64 = 200;
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Creates a reqwest client shared by the J-Quants, EDINET and chat-completion clients.
pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
}

/// Maps a non-2xx response onto the error taxonomy, keeping the body for diagnostics.
pub async fn check_status(response: Response, what: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    tracing::error!("HTTP error status: {} for {}", status, what);
    match status {
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            tracing::warn!("Received {} - the token is missing, expired or lacks the plan for {}", status, what);
            Err(ApiError::Unauthorized)
        }
        reqwest::StatusCode::NOT_FOUND => Err(ApiError::NotFound(what.to_string())),
        reqwest::StatusCode::TOO_MANY_REQUESTS => Err(ApiError::RateLimited),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Http(status, body))
        }
    }
}

/// Which slice of daily quotes to request.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteQuery {
    Code(String),
    Date(String),
}

impl QuoteQuery {
    /// Used in output file names.
    pub fn key(&self) -> &str {
        match self {
            QuoteQuery::Code(code) => code,
            QuoteQuery::Date(date) => date,
        }
    }

    fn param(&self) -> (&'static str, &str) {
        match self {
            QuoteQuery::Code(code) => ("code", code),
            QuoteQuery::Date(date) => ("date", date),
        }
    }
}

/// J-Quants REST client. The ID token is held explicitly; nothing is global.
#[derive(Debug, Clone)]
pub struct JQuantsClient {
    http: reqwest::Client,
    base_url: String,
    id_token: Option<String>,
    request_delay: Duration,
}

impl JQuantsClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            id_token: None,
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
        })
    }

    pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
        self.id_token = Some(id_token.into());
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, ApiError> {
        // --- Basic Rate Limiting ---
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
        let response = request.header(header::ACCEPT, "application/json").send().await?;
        check_status(response, what).await
    }

    fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let token = self.id_token.as_deref().ok_or(ApiError::Unauthorized)?;
        Ok(self.http.request(method, self.url(path)).bearer_auth(token))
    }

    /// Step 1 of the token chain: mail address + password -> refresh token.
    pub async fn authenticate(&self, mail_address: &str, password: &str) -> Result<String, ApiError> {
        tracing::info!("Requesting refresh token for {}", mail_address);
        let payload = serde_json::json!({
            "mailaddress": mail_address,
            "password": password,
        });
        let request = self.http.post(self.url("/token/auth_user")).json(&payload);
        let response = self.send(request, "/token/auth_user").await?;
        let body: AuthUserResponse = response.json().await?;
        body.refresh_token.ok_or(ApiError::MissingField("refreshToken"))
    }

    /// Step 2 of the token chain: refresh token -> ID token.
    pub async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<String, ApiError> {
        tracing::info!("Exchanging refresh token for an ID token");
        let request = self
            .http
            .post(self.url("/token/auth_refresh"))
            .query(&[("refreshtoken", refresh_token)]);
        let response = self.send(request, "/token/auth_refresh").await?;
        let body: AuthRefreshResponse = response.json().await?;
        body.id_token.ok_or(ApiError::MissingField("idToken"))
    }

    /// Refresh token first, then a pre-issued ID token, then mail + password.
    pub async fn resolve_id_token(&self, credentials: &Credentials) -> Result<String, AppError> {
        if let Some(refresh) = &credentials.refresh_token {
            return Ok(self.exchange_refresh_token(refresh).await?);
        }
        if let Some(id_token) = &credentials.id_token {
            tracing::debug!("Using JQUANTS_ID_TOKEN from the environment");
            return Ok(id_token.clone());
        }
        match (&credentials.mail_address, &credentials.password) {
            (Some(mail), Some(password)) => {
                let refresh = self.authenticate(mail, password).await?;
                Ok(self.exchange_refresh_token(&refresh).await?)
            }
            _ => Err(AppError::Config(
                "Set REFRESH_TOKEN, JQUANTS_ID_TOKEN, or JQUANTS_ID and JQUANTS_PASSWORD".to_string(),
            )),
        }
    }

    /// Follows `pagination_key` until the endpoint stops returning one.
    async fn fetch_paged<T, R, F>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        split: F,
    ) -> Result<Vec<T>, ApiError>
    where
        R: DeserializeOwned,
        F: Fn(R) -> (Vec<T>, Option<String>),
    {
        let mut items = Vec::new();
        let mut pagination_key: Option<String> = None;

        loop {
            let mut request = self.authorized(Method::GET, path)?.query(params);
            if let Some(key) = &pagination_key {
                request = request.query(&[("pagination_key", key.as_str())]);
            }
            let response = self.send(request, path).await?;
            let page: R = response
                .json()
                .await
                .map_err(|e| ApiError::Parse(format!("{}: {}", path, e)))?;
            let (mut batch, next) = split(page);
            tracing::debug!("Fetched {} items from {}", batch.len(), path);
            items.append(&mut batch);

            match next {
                Some(key) if !key.is_empty() => pagination_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }

    /// `GET /listed/info`, optionally narrowed to one code.
    pub async fn listed_info(&self, code: Option<&str>) -> Result<Vec<ListedCompany>, ApiError> {
        let params: Vec<(&str, &str)> = code.map(|c| ("code", c)).into_iter().collect();
        self.fetch_paged("/listed/info", &params, |page: ListedInfoResponse| {
            (page.info, page.pagination_key)
        })
        .await
    }

    /// `GET /fins/statements?code=` — every disclosure on file for the company.
    pub async fn statements(&self, code: &str) -> Result<Vec<StatementRow>, ApiError> {
        tracing::info!("Fetching financial statements for code {}", code);
        self.fetch_paged("/fins/statements", &[("code", code)], |page: StatementsResponse| {
            (page.statements, page.pagination_key)
        })
        .await
    }

    /// `GET /prices/daily_quotes` by code (history) or by date (whole market).
    pub async fn daily_quotes(&self, query: &QuoteQuery) -> Result<Vec<DailyQuote>, ApiError> {
        tracing::info!("Fetching daily quotes for {:?}", query);
        let (name, value) = query.param();
        self.fetch_paged("/prices/daily_quotes", &[(name, value)], |page: DailyQuotesResponse| {
            (page.daily_quotes, page.pagination_key)
        })
        .await
    }
}
