//! `promptgate ask` command handler.

use anyhow::{bail, Result};

use promptgate::api::routes::prompts::status_and_body;
use promptgate::invoker::UpstreamInvoker;
use promptgate::prompts::{PromptInput, PromptKind};

use super::CommonArgs;

/// Render one template, invoke once and print the JSON result.
pub(crate) async fn cmd_ask(
    common: CommonArgs,
    endpoint: String,
    user_id: Option<String>,
    ai_name: Option<String>,
    text: String,
) -> Result<()> {
    let kind: PromptKind = endpoint.parse().map_err(anyhow::Error::msg)?;
    if text.trim().is_empty() {
        bail!("text must not be empty");
    }
    let config = common.load()?;
    let invoker = UpstreamInvoker::from_config(&config)?;

    let input = PromptInput {
        text,
        user_id,
        ai_name,
    };
    let prompt = kind.render(&input, &config.persona.ai_name);
    let result = invoker.invoke(&prompt, &config.gemini.model).await;
    let kind_name = result.kind();
    let success = result.is_success();
    let (status, body) = status_and_body(result);

    println!("{}", serde_json::to_string_pretty(&body)?);
    if !success {
        bail!("invocation failed: {} (HTTP {})", kind_name, status.as_u16());
    }
    Ok(())
}
