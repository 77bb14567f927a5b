// src/main.rs
mod edinet;
mod insight;
mod jquants;
mod reconcile;
mod storage;
mod utils;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use edinet::client::EdinetClient;
use insight::NarrativeClient;
use jquants::client::{JQuantsClient, QuoteQuery};
use jquants::models::{self, DailyQuote};
use jquants::listed;
use reconcile::render::{render_annual, render_quarters};
use reconcile::QuarterSlot;
use storage::StorageManager;
use utils::config::AppConfig;
use utils::AppError;

/// Command Line Interface for J-Quants financial statements, quotes and EDINET filings
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Output directory for CSV / JSON / Markdown files
    #[arg(short, long, default_value = "./data", global = true)]
    output_dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the login -> refresh token -> ID token chain and print the ID token
    Token,

    /// Search listed companies by name or securities code
    Listed {
        /// Company name fragment, 4-digit code, or code fragment
        query: String,
    },

    /// Reconcile financial statements into single-quarter figures
    Statements {
        /// Securities code (4 or 5 digits)
        #[arg(short, long, required_unless_present = "input")]
        code: Option<String>,

        /// Read a saved `/fins/statements` JSON response instead of calling the API
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// First period label to display, e.g. 2023/1Q
        #[arg(long)]
        from: Option<String>,

        /// Last period label to display, e.g. 2024/4Q
        #[arg(long)]
        to: Option<String>,

        /// Write quarters.csv, annual.csv and metadata to the output directory
        #[arg(long)]
        save: bool,
    },

    /// Save daily quotes for one company or one trading day to CSV
    Quotes {
        /// Securities code
        #[arg(long, conflicts_with = "date", required_unless_present = "date")]
        code: Option<String>,

        /// Trading day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// List documents submitted to EDINET on a given day
    Edinet {
        /// Submission date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// How many documents to print
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Full flow: find the company, reconcile, correlate prices, optionally ask for a narrative
    Dashboard {
        /// Company name or securities code
        query: String,

        /// First period label to display
        #[arg(long)]
        from: Option<String>,

        /// Last period label to display
        #[arg(long)]
        to: Option<String>,

        /// Generate a narrative summary with the chat-completion API
        #[arg(long)]
        insight: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments and load configuration
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);
    let config = AppConfig::from_env();

    // 3. Initialize storage
    let storage = StorageManager::new(&args.output_dir)?;

    match args.command {
        Command::Token => {
            let client = JQuantsClient::new(&config.jquants_api_base)?;
            let id_token = client.resolve_id_token(&config.credentials).await?;
            println!("{}", id_token);
        }
        Command::Listed { query } => {
            let client = authorized_client(&config).await?;
            let companies = listed_candidates(&client, &query).await?;
            let hits = listed::search(&companies, &query);
            if hits.is_empty() {
                tracing::warn!("No listed company matches {:?}", query);
            }
            for company in hits {
                println!("{}", listed::choice_label(company));
            }
        }
        Command::Statements { code, input, from, to, save } => {
            let rows = match &input {
                Some(path) => {
                    tracing::info!("Reading statements from {}", path.display());
                    models::parse_statements_json(&std::fs::read_to_string(path)?)?
                }
                None => {
                    let code = code.as_deref().ok_or_else(|| {
                        AppError::Config("--code is required without --input".to_string())
                    })?;
                    authorized_client(&config).await?.statements(code).await?
                }
            };
            let key = code.unwrap_or_else(|| "offline".to_string());
            report_statements(&storage, &key, &key, &rows, from.as_deref(), to.as_deref(), save)?;
        }
        Command::Quotes { code, date } => {
            let query = match (code, date) {
                (Some(code), _) => QuoteQuery::Code(code),
                (None, Some(date)) => QuoteQuery::Date(date.format("%Y-%m-%d").to_string()),
                (None, None) => return Err(AppError::Config("Pass --code or --date".to_string())),
            };
            let quotes = authorized_client(&config).await?.daily_quotes(&query).await?;
            match storage.save_daily_quotes(query.key(), &quotes)? {
                Some(path) => println!("Saved {} quotes to {}", quotes.len(), path.display()),
                None => tracing::warn!("No quotes returned for {:?}", query),
            }
        }
        Command::Edinet { date, limit } => {
            let client = EdinetClient::new(&config.edinet_api_base)?;
            let documents = client.documents(date).await?;
            println!("Documents: {}", documents.len());
            for doc in documents.iter().take(limit) {
                println!("{}", doc.summary());
            }
            let path = storage.save_documents(date, &documents)?;
            tracing::info!("Saved document list to {}", path.display());
        }
        Command::Dashboard { query, from, to, insight } => {
            run_dashboard(&config, &storage, &query, from.as_deref(), to.as_deref(), insight).await?;
        }
    }

    Ok(())
}

async fn authorized_client(config: &AppConfig) -> Result<JQuantsClient, AppError> {
    let mut client = JQuantsClient::new(&config.jquants_api_base)?;
    if let Some(ms) = config.request_delay_ms {
        client = client.with_request_delay(std::time::Duration::from_millis(ms));
    }
    let id_token = client.resolve_id_token(&config.credentials).await?;
    Ok(client.with_id_token(id_token))
}

/// Explicit bounds win; otherwise show the span that has single-quarter sales.
fn resolve_window<'a>(
    slots: &'a [QuarterSlot],
    from: Option<&str>,
    to: Option<&str>,
) -> Result<&'a [QuarterSlot], AppError> {
    if from.is_some() || to.is_some() {
        return Ok(reconcile::select_window(slots, from, to)?);
    }
    match reconcile::displayable_range(slots) {
        Some((first, last)) => {
            tracing::info!("Periods with chartable data: {} ～ {}", first, last);
            Ok(reconcile::select_window(slots, Some(first), Some(last))?)
        }
        None => {
            tracing::warn!("No quarter has single-quarter net sales; showing every slot");
            Ok(slots)
        }
    }
}

/// Reconciles, prints both tables and optionally saves them. Returns the full series.
fn report_statements(
    storage: &StorageManager,
    code: &str,
    company_name: &str,
    rows: &[models::StatementRow],
    from: Option<&str>,
    to: Option<&str>,
    save: bool,
) -> Result<Vec<QuarterSlot>, AppError> {
    let records = models::to_records(rows);
    tracing::info!("Parsed {} of {} statements", records.len(), rows.len());

    let slots = reconcile::reconcile(&records);
    let missing = slots.iter().filter(|s| s.is_empty()).count();
    tracing::debug!("{} of {} quarter slots have no disclosure", missing, slots.len());
    let annual = reconcile::annual_series(&records);
    let window = resolve_window(&slots, from, to)?;

    if window.is_empty() {
        tracing::warn!("No quarterly data for {}", code);
    } else {
        println!("## Quarterly (million JPY)\n{}", render_quarters(window));
    }
    if !annual.is_empty() {
        println!("## Full year (million JPY)\n{}", render_annual(&annual));
    }

    if save {
        storage.save_quarters(code, window)?;
        storage.save_annual(code, &annual)?;
        storage.save_quarters_metadata(code, company_name, window, slots.len())?;
    }

    Ok(slots)
}

/// A 4-digit code is looked up directly; anything else needs the whole listing.
async fn listed_candidates(client: &JQuantsClient, query: &str) -> Result<Vec<models::ListedCompany>, AppError> {
    let code = listed::code_for_query(query);
    Ok(client.listed_info(code.as_deref()).await?)
}

async fn run_dashboard(
    config: &AppConfig,
    storage: &StorageManager,
    query: &str,
    from: Option<&str>,
    to: Option<&str>,
    want_insight: bool,
) -> Result<(), AppError> {
    let client = authorized_client(config).await?;

    // 1. Resolve the company
    let companies = listed_candidates(&client, query).await?;
    let candidates = listed::search(&companies, query);
    let company = match candidates.as_slice() {
        [] => return Err(AppError::Processing(format!("No listed company matches {:?}", query))),
        [only] => *only,
        [first, rest @ ..] => {
            tracing::info!("{} candidates match {:?}; using the first", rest.len() + 1, query);
            for other in rest {
                tracing::info!("  also matched: {}", listed::choice_label(other));
            }
            *first
        }
    };
    let label = listed::choice_label(company);
    println!("# {}", label);

    // 2. Statements -> reconciled quarters
    let rows = client.statements(&company.code).await?;
    if rows.is_empty() {
        tracing::warn!("No financial data for {}", label);
        return Ok(());
    }
    let slots = report_statements(storage, &company.code, &company.company_name, &rows, from, to, true)?;
    let window = resolve_window(&slots, from, to)?;

    // 3. Prices over the same disclosure span; a failure here only drops the price section
    match client.daily_quotes(&QuoteQuery::Code(company.code.clone())).await {
        Ok(quotes) => report_prices(storage, &company.code, window, &quotes)?,
        Err(e) => tracing::error!("Daily quotes request failed: {}", e),
    }

    // 4. Narrative
    if want_insight {
        if window.is_empty() {
            tracing::warn!("Nothing to summarise for {}", label);
            return Ok(());
        }
        let narrator = NarrativeClient::new(
            &config.openai_api_base,
            config.require_openai_key()?,
            &config.openai_model,
        )?;
        let prompt = insight::build_prompt(&company.company_name, window, config.insight_language);
        let text = narrator.generate(&prompt).await?;
        println!("## Insight\n{}", text);
        storage.save_insight(&company.code, &text)?;
    }

    Ok(())
}

fn report_prices(
    storage: &StorageManager,
    code: &str,
    window: &[QuarterSlot],
    quotes: &[DailyQuote],
) -> Result<(), AppError> {
    let in_window = match reconcile::disclosure_window(window) {
        Some(span) => reconcile::quotes_within(quotes, span),
        None => quotes.to_vec(),
    };
    let Some(last) = in_window.last() else {
        tracing::warn!("No price data for {}", code);
        return Ok(());
    };

    println!(
        "## Prices\n{} quotes from {} to {}; last close: {}",
        in_window.len(),
        in_window[0].date,
        last.date,
        last.close.map_or_else(|| "-".to_string(), |c| c.to_string())
    );
    storage.save_daily_quotes(code, &in_window)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_statements_requires_code_or_input() {
        assert!(Args::try_parse_from(["jquants_fins", "statements"]).is_err());
        let args = Args::try_parse_from(["jquants_fins", "statements", "--input", "s.json", "--from", "2023/1Q"]).unwrap();
        match args.command {
            Command::Statements { input, from, code, .. } => {
                assert_eq!(input, Some(PathBuf::from("s.json")));
                assert_eq!(from.as_deref(), Some("2023/1Q"));
                assert!(code.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_quotes_code_and_date_conflict() {
        assert!(Args::try_parse_from(["jquants_fins", "quotes", "--code", "7203", "--date", "2023-12-29"]).is_err());
        let args = Args::try_parse_from(["jquants_fins", "quotes", "--date", "2023-12-29"]).unwrap();
        match args.command {
            Command::Quotes { date, .. } => assert_eq!(date, NaiveDate::from_ymd_opt(2023, 12, 29)),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_report_statements_from_saved_payload() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        let rows = models::parse_statements_json(
            r#"{"statements": [
                {"DisclosedDate": "2023-08-01", "CurrentFiscalYearEndDate": "2024-03-31", "TypeOfCurrentPeriod": "1Q", "NetSales": "100000000"},
                {"DisclosedDate": "2023-11-01", "CurrentFiscalYearEndDate": "2024-03-31", "TypeOfCurrentPeriod": "2Q", "NetSales": "220000000"},
                {"DisclosedDate": "2024-02-01", "CurrentFiscalYearEndDate": "2024-03-31", "TypeOfCurrentPeriod": "3Q", "NetSales": "330000000"},
                {"DisclosedDate": "2024-05-08", "CurrentFiscalYearEndDate": "2024-03-31", "TypeOfCurrentPeriod": "FY", "NetSales": "460000000"}
            ]}"#,
        )
        .unwrap();

        let slots = report_statements(&storage, "72030", "TestCo", &rows, None, None, true).unwrap();
        let singles: Vec<Option<f64>> = slots.iter().map(|s| s.single.net_sales).collect();
        assert_eq!(singles, vec![Some(100.0), Some(120.0), Some(110.0), Some(130.0)]);
        assert!(dir.path().join("72030").join("quarters.csv").exists());
        assert!(dir.path().join("72030").join("quarters_meta.json").exists());
    }

    #[tokio::test]
    async fn test_listed_candidates_looks_up_display_codes_directly() {
        let mut server = mockito::Server::new_async().await;
        let by_code = server
            .mock("GET", "/listed/info")
            .match_query(mockito::Matcher::Regex("^code=72030$".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"info": [{"Code": "72030", "CompanyName": "トヨタ自動車"}]}"#)
            .expect(1)
            .create_async()
            .await;
        let everything = server
            .mock("GET", "/listed/info")
            .match_query(mockito::Matcher::Regex("^$".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"info": [{"Code": "72030", "CompanyName": "トヨタ自動車"}, {"Code": "72050", "CompanyName": "日野自動車"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let client = JQuantsClient::new(&server.url())
            .unwrap()
            .with_id_token("id")
            .with_request_delay(std::time::Duration::ZERO);
        assert_eq!(listed_candidates(&client, "7203").await.unwrap().len(), 1);
        assert_eq!(listed_candidates(&client, "自動車").await.unwrap().len(), 2);
        by_code.assert_async().await;
        everything.assert_async().await;
    }

    #[test]
    fn test_resolve_window_defaults_to_chartable_span() {
        let rows = models::parse_statements_json(
            r#"[
                {"DisclosedDate": "2023-05-08", "CurrentFiscalYearEndDate": "2023-03-31", "TypeOfCurrentPeriod": "FY", "NetSales": "1"},
                {"DisclosedDate": "2023-08-01", "CurrentFiscalYearEndDate": "2024-03-31", "TypeOfCurrentPeriod": "1Q", "NetSales": "1"}
            ]"#,
        )
        .unwrap();
        let slots = reconcile::reconcile(&models::to_records(&rows));
        let window = resolve_window(&slots, None, None).unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].period_label, "2024/1Q");

        assert!(resolve_window(&slots, Some("1999/1Q"), None).is_err());
    }
}
