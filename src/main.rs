use std::sync::Arc;

use anyhow::Context;
use appscanner::browser::{Browser, WebDriverBrowser};
use appscanner::config::AppConfig;
use appscanner::emissary::{Emissary, EmissaryClient};
use appscanner::models::session::SutProperties;
use appscanner::{Pipeline, SessionContext, StrategySelection};
use mimalloc::MiMalloc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const DEFAULT_BROWSER: &str = "firefox";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "appscanner=debug".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let session_file = config
        .test_session_file
        .as_deref()
        .context("TEST_SESSION_FILE must point at the Test Session JSON")?;
    let raw = tokio::fs::read_to_string(session_file)
        .await
        .with_context(|| format!("Failed to read Test Session file {session_file}"))?;
    let sut: SutProperties =
        serde_json::from_str(&raw).context("Test Session file is not valid SUT properties")?;
    sut.validate_for_session()?;

    let selection = StrategySelection::from_names(&sut.test_session.attributes.strategies)?;
    let browser = if selection.needs_browser() {
        let name = sut.browser.as_deref().unwrap_or(DEFAULT_BROWSER);
        Some(Arc::new(WebDriverBrowser::connect(&config.webdriver_url, name).await?))
    } else {
        None
    };

    let engine: Arc<dyn Emissary> = Arc::new(EmissaryClient::new(
        &config.emissary_api_url,
        &config.emissary_api_key,
        config.emissary_api_timeout_secs,
    )?);
    tracing::info!(
        emissary = %config.emissary_api_url,
        test_session_id = %sut.test_session.id,
        "Starting AppScanner"
    );

    let ctx = SessionContext::new(sut, config.emissary_properties(), engine);
    let pipeline = Pipeline::new(
        ctx,
        browser
            .clone()
            .map(|browser| browser as Arc<dyn Browser>),
    )?;
    let result = pipeline.run().await;

    if let Some(browser) = browser {
        if let Err(e) = browser.quit().await {
            tracing::warn!(error = %e, "Failed to close the browser session");
        }
    }

    let outcome = result?;
    if !outcome.verdict.passed() {
        anyhow::bail!("Test Session failed: {}", outcome.verdict);
    }
    Ok(())
}
