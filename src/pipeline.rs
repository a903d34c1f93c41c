//! Eight-phase orchestration of one Test Session.
//!
//! Strategies are resolved from the session before anything runs. Phases run
//! strictly in order against a single `SessionContext`; the first failing
//! phase aborts the pipeline.

use std::sync::Arc;

use crate::browser::Browser;
use crate::errors::AppError;
use crate::models::session::StrategyNames;
use crate::services::context::SessionContext;
use crate::services::poller::CompletionPoller;
use crate::services::scan_driver::ScanSummary;
use crate::services::threshold::Verdict;
use crate::strategies::{
    EmissaryAuthentication, PostScanning, Reporting, Scanners, Scanning, SitesTreePopulation,
    SitesTreeSutAuthentication, Spider,
};

/// One resolved strategy per phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategySelection {
    pub sites_tree_sut_authentication: SitesTreeSutAuthentication,
    pub sites_tree_population: SitesTreePopulation,
    pub emissary_authentication: EmissaryAuthentication,
    pub spider: Spider,
    pub scanners: Scanners,
    pub scanning: Scanning,
    pub post_scanning: PostScanning,
    pub reporting: Reporting,
}

impl StrategySelection {
    pub fn from_names(names: &StrategyNames) -> Result<Self, AppError> {
        Ok(Self {
            sites_tree_sut_authentication: SitesTreeSutAuthentication::from_name(
                &names.sites_tree_sut_authentication_population_strategy,
            )?,
            sites_tree_population: SitesTreePopulation::from_name(
                &names.sites_tree_population_strategy,
            )?,
            emissary_authentication: EmissaryAuthentication::from_name(
                &names.emissary_authentication_strategy,
            )?,
            spider: Spider::from_name(&names.spider_strategy)?,
            scanners: Scanners::from_name(&names.scanners_strategy)?,
            scanning: Scanning::from_name(&names.scanning_strategy)?,
            post_scanning: PostScanning::from_name(&names.post_scanning_strategy)?,
            reporting: Reporting::from_name(&names.reporting_strategy)?,
        })
    }

    /// Check if any selected strategy drives a browser.
    pub fn needs_browser(&self) -> bool {
        self.sites_tree_sut_authentication.needs_browser()
            || self.sites_tree_population.needs_browser()
    }
}

/// Result of a completed pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub verdict: Verdict,
    pub scan: ScanSummary,
    pub reports: Vec<String>,
}

pub struct Pipeline {
    ctx: SessionContext,
    selection: StrategySelection,
    browser: Option<Arc<dyn Browser>>,
    poller: Option<CompletionPoller>,
}

impl Pipeline {
    /// Resolve the session's strategies. Fails on unknown names, or when a
    /// browser-driven strategy is selected without a browser.
    pub fn new(ctx: SessionContext, browser: Option<Arc<dyn Browser>>) -> Result<Self, AppError> {
        let selection =
            StrategySelection::from_names(&ctx.sut().test_session.attributes.strategies)?;
        if selection.needs_browser() && browser.is_none() {
            return Err(AppError::Configuration(format!(
                "Strategies {} and {} need a browser",
                selection.sites_tree_sut_authentication, selection.sites_tree_population
            )));
        }
        Ok(Self {
            ctx,
            selection,
            browser,
            poller: None,
        })
    }

    /// Override the poller built from the session's feedback interval.
    pub fn with_poller(mut self, poller: CompletionPoller) -> Self {
        self.poller = Some(poller);
        self
    }

    pub fn selection(&self) -> &StrategySelection {
        &self.selection
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub async fn run(&self) -> Result<PipelineOutcome, AppError> {
        let ctx = &self.ctx;
        let browser = self.browser.as_deref();
        let s = &self.selection;

        tracing::info!(
            audience = "build_user",
            test_session_id = ctx.test_session_id(),
            base_url = ctx.base_url(),
            "Starting Test Session"
        );

        s.sites_tree_sut_authentication
            .authenticate(ctx, browser)
            .await
            .map_err(|e| phase_failed(SitesTreeSutAuthentication::PHASE, e))?;
        s.sites_tree_population
            .populate(ctx, browser)
            .await
            .map_err(|e| phase_failed(SitesTreePopulation::PHASE, e))?;
        s.emissary_authentication
            .configure(ctx)
            .await
            .map_err(|e| phase_failed(EmissaryAuthentication::PHASE, e))?;
        s.spider
            .scan(ctx)
            .await
            .map_err(|e| phase_failed(Spider::PHASE, e))?;
        s.scanners
            .configure(ctx)
            .await
            .map_err(|e| phase_failed(Scanners::PHASE, e))?;
        let scan = s
            .scanning
            .scan(ctx, self.poller)
            .await
            .map_err(|e| phase_failed(Scanning::PHASE, e))?;
        let verdict = s
            .post_scanning
            .process(ctx)
            .map_err(|e| phase_failed(PostScanning::PHASE, e))?;
        let reports = s
            .reporting
            .create_reports(ctx)
            .await
            .map_err(|e| phase_failed(Reporting::PHASE, e))?;

        tracing::info!(
            audience = "build_user",
            test_session_id = ctx.test_session_id(),
            passed = verdict.passed(),
            number_of_alerts = ctx.number_of_alerts(),
            reports = reports.len(),
            "Test Session finished"
        );

        Ok(PipelineOutcome {
            verdict,
            scan,
            reports,
        })
    }
}

fn phase_failed(phase: &str, error: AppError) -> AppError {
    tracing::error!(audience = "build_user", phase, error = %error, "Phase failed, aborting Test Session");
    error
}
