//! Stage 3: extract funding records from merged pages with a language model.
//!
//! Every `*.txt` file in the input directory is sent, in filename order, as
//! the user message of one model call. The answer, lightly cleaned up, is
//! written to `<name>_analysis.txt`. The CSV itself is not validated; the
//! output format is enforced only through [`SYSTEM_PROMPT`].

use crate::api::{AnthropicClient, AskAsync};
use crate::config::ExtractorConfig;
use crate::errors::{PipelineError, UnitError};
use crate::models::StageSummary;
use crate::utils::{create_dir, sorted_entries, truncate_for_log};
use std::path::Path;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

/// Instructions sent as the system prompt of every call.
pub const SYSTEM_PROMPT: &str = r#"You are a Funding News Analyzer that only outputs CSV data.

Your task is to analyze funding news articles and extract key information into CSV format.
You must output ONLY the raw CSV data with no additional text, explanations, formatting, or wrapper objects.

Output Format:
- First line: CSV header
- Each subsequent entry on a new line
- Use actual newlines between rows, not \n literals
- No quotes around the entire output

Required columns:
Company,Company Website,Software Category,Founded,Early Adopters/Customers,Raised Amount,Round Type,Funding Date,Lead Investor,Additional Investors

Rules:
1. Only include explicitly stated information
2. Use n/a for missing data
3. Escape commas in fields with double quotes
4. Maintain original capitalization
5. For Additional Investors column, ALWAYS use / to separate multiple investors, never commas (e.g. Ab / Cd / Ef)
6. Keep exact amounts and dates as mentioned
7. Output only the raw CSV data, no wrapper objects or extra formatting
8. Use actual line breaks between rows, not \n escape sequences
9. Format Founded date as Y-M (e.g. 2024-01)

Example output format:
Company,Company Website,Software Category,Founded,Early Adopters/Customers,Raised Amount,Round Type,Funding Date,Lead Investor,Additional Investors
TechCorp,tech.com,AI,2020-03,"Meta, Google",$5M,Seed,2024-03-15,Sequoia,YC / A16Z / Founders Fund"#;

const USER_PREFIX: &str = "Here is the funding news article to analyze:\n\n";

/// Build the user message for one merged page.
pub fn user_message(page_text: &str) -> String {
    format!("{USER_PREFIX}{page_text}")
}

/// Turn escaped `\n` sequences into real newlines and drop one wrapping quote on each side.
pub fn clean_response(raw: &str) -> String {
    let text = raw.replace("\\n", "\n");
    let text = text.strip_prefix('"').unwrap_or(&text);
    let text = text.strip_suffix('"').unwrap_or(text);
    text.to_string()
}

/// Name of the analysis file for a merged page file.
pub fn analysis_filename(merged_name: &str) -> String {
    let stem = merged_name.strip_suffix(".txt").unwrap_or(merged_name);
    format!("{stem}_analysis.txt")
}

/// Run the extractor with the Anthropic API.
#[instrument(level = "info", skip_all, fields(model = %config.model))]
pub async fn run(config: &ExtractorConfig, api_key: Option<String>) -> Result<StageSummary, PipelineError> {
    let client = AnthropicClient::new(config, api_key, SYSTEM_PROMPT);
    extract_all(&client, config).await
}

/// Send every merged page to `model` and write the answers.
///
/// # Arguments
///
/// * `model` - The language model client
/// * `config` - Input and output directories
///
/// # Returns
///
/// One written path per analyzed page, plus the pages whose call failed. A
/// missing input directory yields an empty summary.
///
/// # Errors
///
/// [`PipelineError::Io`] when a merged page cannot be read or an analysis
/// cannot be written.
#[instrument(level = "info", skip_all, fields(input = %config.input_directory.display()))]
pub async fn extract_all<M>(model: &M, config: &ExtractorConfig) -> Result<StageSummary, PipelineError>
where
    M: AskAsync<Response = String>,
{
    if !config.input_directory.is_dir() {
        warn!("No merged pages to analyze");
        return Ok(StageSummary::default());
    }
    create_dir(&config.output_directory).await?;
    let files = sorted_entries(&config.input_directory, |name, path| {
        name.ends_with(".txt") && path.is_file()
    })
    .await?;
    info!(count = files.len(), "Merged pages to analyze");

    let mut summary = StageSummary::default();
    for (name, path) in files {
        info!(file = %name, "Processing");
        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| PipelineError::io(&path, e))?;

        match analyze(model, &name, &content).await {
            Ok(analysis) => {
                let output = config.output_directory.join(analysis_filename(&name));
                write_analysis(&output, &analysis).await?;
                summary.record_written(output);
            }
            Err(e) => {
                error!(file = %name, kind = e.kind(), error = %e, "Failed to analyze");
                summary.record_skipped(name, e);
            }
        }
    }

    info!(
        written = summary.written.len(),
        skipped = summary.skipped.len(),
        "Extractor finished"
    );
    Ok(summary)
}

/// One model call for one merged page.
///
/// The cleaned answer is returned as is, whitespace included. Only an answer
/// that is empty after cleanup is refused, as [`UnitError::EmptyResponse`].
pub async fn analyze<M>(model: &M, name: &str, content: &str) -> Result<String, UnitError>
where
    M: AskAsync<Response = String>,
{
    let raw = model.ask(&user_message(content)).await?;
    debug!(file = %name, response = %truncate_for_log(&raw, 300), "Model response");
    let analysis = clean_response(&raw);
    if analysis.is_empty() {
        return Err(UnitError::EmptyResponse {
            file: name.to_string(),
        });
    }
    Ok(analysis)
}

async fn write_analysis(output: &Path, analysis: &str) -> Result<(), PipelineError> {
    fs::write(output, analysis)
        .await
        .map_err(|e| PipelineError::io(output, e))?;
    info!(path = %output.display(), "Analysis saved");
    Ok(())
}
