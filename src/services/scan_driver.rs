//! Crawl-then-attack driver used by the scanning phase.
//!
//! Crawls every context target as the session user, then runs one active scan
//! per session route (or one of the base URL when the session names no
//! routes). Every remote operation is awaited to completion through the
//! completion poller before the next one starts.

use std::sync::Arc;

use async_trait::async_trait;

use crate::emissary::{ActiveScanRequest, Emissary, SpiderAsUserRequest};
use crate::errors::{AppError, EngineError};
use crate::models::scan::{ScanKind, ScanStatus};
use crate::services::context::SessionContext;
use crate::services::poller::{CompletionPoller, ScanProbe};
use crate::services::sequential::run_sequentially;

/// Totals of one scanning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub crawls: usize,
    pub active_scans: usize,
    /// Alerts added to the session by this run.
    pub alerts: u64,
}

// ---------------------------------------------------------------------------
// Probes
// ---------------------------------------------------------------------------

/// Status view of one spider crawl.
pub struct SpiderProbe {
    engine: Arc<dyn Emissary>,
    scan_id: String,
    target: String,
}

impl SpiderProbe {
    pub fn new(engine: Arc<dyn Emissary>, scan_id: String, target: String) -> Self {
        Self {
            engine,
            scan_id,
            target,
        }
    }
}

#[async_trait]
impl ScanProbe for SpiderProbe {
    fn kind(&self) -> ScanKind {
        ScanKind::Spider
    }

    fn scan_id(&self) -> &str {
        &self.scan_id
    }

    fn target(&self) -> &str {
        &self.target
    }

    async fn status(&self) -> Result<ScanStatus, EngineError> {
        self.engine.spider_status(&self.scan_id).await
    }
}

/// Status and alert-count view of one active scan.
pub struct ActiveScanProbe {
    engine: Arc<dyn Emissary>,
    scan_id: String,
    target: String,
}

impl ActiveScanProbe {
    pub fn new(
        engine: Arc<dyn Emissary>,
        scan_id: String,
        target: String,
    ) -> Self {
        Self {
            engine,
            scan_id,
            target,
        }
    }
}

#[async_trait]
impl ScanProbe for ActiveScanProbe {
    fn kind(&self) -> ScanKind {
        ScanKind::ActiveScan
    }

    fn scan_id(&self) -> &str {
        &self.scan_id
    }

    fn target(&self) -> &str {
        &self.target
    }

    async fn status(&self) -> Result<ScanStatus, EngineError> {
        self.engine.ascan_status(&self.scan_id).await
    }

    async fn alerts(&self) -> Option<Result<u64, EngineError>> {
        Some(self.engine.number_of_alerts(&self.target).await)
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// One planned active scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackTarget {
    pub url: String,
    pub method: String,
    pub post_data: String,
}

pub struct ScanDriver<'a> {
    ctx: &'a SessionContext,
    poller: CompletionPoller,
}

impl<'a> ScanDriver<'a> {
    /// Driver polling at the session's feedback interval.
    pub fn new(ctx: &'a SessionContext) -> Self {
        Self {
            poller: CompletionPoller::new(ctx.emissary_properties().api_feedback_speed),
            ctx,
        }
    }

    pub fn with_poller(mut self, poller: CompletionPoller) -> Self {
        self.poller = poller;
        self
    }

    /// Crawl targets: one per session route id, or the base URL alone.
    pub fn crawl_targets(&self) -> Vec<String> {
        let route_ids = self.ctx.sut().test_session.route_ids();
        if route_ids.is_empty() {
            vec![self.ctx.base_url().to_string()]
        } else {
            route_ids
                .into_iter()
                .map(|route| format!("{}{route}", self.ctx.base_url()))
                .collect()
        }
    }

    /// Attack targets: one per session route descriptor, or the base URL
    /// with no method and no body.
    pub fn attack_targets(&self) -> Vec<AttackTarget> {
        let routes = self.ctx.sut().session_routes();
        if routes.is_empty() {
            return vec![AttackTarget {
                url: self.ctx.base_url().to_string(),
                method: String::new(),
                post_data: String::new(),
            }];
        }
        routes
            .into_iter()
            .map(|route| AttackTarget {
                url: format!("{}{}", self.ctx.base_url(), route.id),
                method: route.attributes.method.clone(),
                post_data: route.post_data(),
            })
            .collect()
    }

    /// Crawl every target sequentially, each to completion.
    pub async fn crawl(&self) -> Result<usize, AppError> {
        let context_id = self.ctx.context_id()?.to_string();
        let user_id = self.ctx.user_id()?.to_string();
        let max_children = self.ctx.emissary_properties().max_children;
        let engine = self.ctx.engine_handle();

        let crawled = run_sequentially(self.crawl_targets(), |_, url| {
            let engine = Arc::clone(&engine);
            let request = SpiderAsUserRequest {
                context_id: context_id.clone(),
                user_id: user_id.clone(),
                url: url.clone(),
                max_children,
                recurse: true,
                subtree_only: true,
            };
            async move {
                let scan_id = engine.spider_scan_as_user(&request).await.map_err(|e| {
                    AppError::engine(format!("Failed to start the spider of \"{url}\""), e)
                })?;
                tracing::info!(
                    audience = "build_user",
                    scan_id = %scan_id,
                    url = %url,
                    "Spider started"
                );
                let probe = SpiderProbe::new(engine, scan_id, url);
                self.poller.track(Arc::new(probe)).await
            }
        })
        .await?;

        Ok(crawled.len())
    }

    /// Active-scan every attack target sequentially, adding each target's
    /// terminal alert count to the session.
    pub async fn attack(&self) -> Result<(usize, u64), AppError> {
        let context_id = self.ctx.context_id()?.to_string();
        let engine = self.ctx.engine_handle();
        let before = self.ctx.number_of_alerts();

        let scans = run_sequentially(self.attack_targets(), |_, target| {
            let engine = Arc::clone(&engine);
            let request = ActiveScanRequest {
                url: target.url.clone(),
                recurse: true,
                in_scope_only: false,
                scan_policy_name: String::new(),
                method: target.method.clone(),
                post_data: target.post_data.clone(),
                context_id: context_id.clone(),
            };
            async move {
                let scan_id = engine.ascan_scan(&request).await.map_err(|e| {
                    AppError::engine(
                        format!("Failed to start the active scan of \"{}\"", target.url),
                        e,
                    )
                })?;
                tracing::info!(
                    audience = "build_user",
                    scan_id = %scan_id,
                    url = %target.url,
                    method = %target.method,
                    "Active scan started"
                );
                let probe = ActiveScanProbe::new(engine, scan_id, target.url.clone());
                let outcome = self.poller.track(Arc::new(probe)).await?;
                let total = self.ctx.add_alerts(outcome.alerts);
                tracing::info!(
                    audience = "build_user",
                    url = %target.url,
                    alerts = outcome.alerts,
                    total_alerts = total,
                    "Active scan finished"
                );
                Ok(outcome)
            }
        })
        .await?;

        Ok((scans.len(), self.ctx.number_of_alerts() - before))
    }

    /// Crawl, then attack.
    pub async fn run(&self) -> Result<ScanSummary, AppError> {
        let crawls = self.crawl().await?;
        let (active_scans, alerts) = self.attack().await?;
        Ok(ScanSummary {
            crawls,
            active_scans,
            alerts,
        })
    }
}
