//! Phase 5: tune the Emissary's passive and active scan rules.

use crate::emissary::ActiveScanner;
use crate::errors::AppError;
use crate::services::context::SessionContext;

/// Low-value passive rules: private IP disclosure, cache-control headers,
/// cross-domain script inclusion, sensitive info in URL and referrer,
/// suspicious comments, username hashes, timestamp disclosure, charset
/// mismatch, WSDL detection and loosely scoped cookies.
pub const LOW_VALUE_PASSIVE_SCANNER_IDS: &str =
    "2,10015,10017,10024,10025,10027,10057,10096,90011,90030,90033";

/// DOM based XSS; far too slow on some routes.
pub const DOM_XSS_SCANNER_ID: &str = "40026";

/// The Emissary's default policy.
const SCAN_POLICY_NAME: &str = "";
const SCAN_POLICY_ID: &str = "";

strategy_enum!(Scanners, "scanners", [BrowserAppStandard]);

impl Scanners {
    pub async fn configure(&self, ctx: &SessionContext) -> Result<(), AppError> {
        self.log_invoked("configure");
        match self {
            Self::BrowserAppStandard => {
                configure_passive_scanners(ctx).await?;
                configure_active_scanners(ctx).await
            }
        }
    }
}

async fn configure_passive_scanners(ctx: &SessionContext) -> Result<(), AppError> {
    let resp = ctx
        .engine()
        .pscan_disable_scanners(LOW_VALUE_PASSIVE_SCANNER_IDS)
        .await
        .map_err(|e| {
            AppError::engine(
                format!("Failed to disable passive scanners ({LOW_VALUE_PASSIVE_SCANNER_IDS})"),
                e,
            )
        })?;
    tracing::info!(ids = LOW_VALUE_PASSIVE_SCANNER_IDS, response = %resp, "Disabled passive scanners");
    Ok(())
}

async fn configure_active_scanners(ctx: &SessionContext) -> Result<(), AppError> {
    let engine = ctx.engine();
    let attributes = &ctx.sut().test_session.attributes;

    engine
        .ascan_disable_all_scanners(SCAN_POLICY_NAME)
        .await
        .map_err(|e| AppError::engine("Failed to disable all active scanners", e))?;
    engine
        .ascan_enable_all_scanners(SCAN_POLICY_NAME)
        .await
        .map_err(|e| AppError::engine("Failed to enable all active scanners", e))?;
    engine
        .ascan_disable_scanners(DOM_XSS_SCANNER_ID, SCAN_POLICY_NAME)
        .await
        .map_err(|e| {
            AppError::engine(
                format!("Failed to disable the DOM XSS active scanner ({DOM_XSS_SCANNER_ID})"),
                e,
            )
        })?;

    let scanners = engine
        .ascan_view_scanners(SCAN_POLICY_NAME, SCAN_POLICY_ID)
        .await
        .map_err(|e| AppError::engine("Failed to list the active scanners", e))?;

    let mut tuned = 0usize;
    for scanner in scanners.iter().filter(|s| s.is_enabled()) {
        match engine
            .ascan_set_scanner_attack_strength(
                &scanner.id,
                &attributes.a_scanner_attack_strength,
                SCAN_POLICY_NAME,
            )
            .await
        {
            Ok(_) => {}
            Err(e) => tracing::error!(
                scanner_id = %scanner.id,
                scanner = %scanner.name,
                error = %e,
                "Failed to set attack strength, skipping"
            ),
        }
        match engine
            .ascan_set_scanner_alert_threshold(
                &scanner.id,
                &attributes.a_scanner_alert_threshold,
                SCAN_POLICY_NAME,
            )
            .await
        {
            Ok(_) => tuned += 1,
            Err(e) => tracing::error!(
                scanner_id = %scanner.id,
                scanner = %scanner.name,
                error = %e,
                "Failed to set alert threshold, skipping"
            ),
        }
    }
    tracing::info!(
        tuned,
        attack_strength = %attributes.a_scanner_attack_strength,
        alert_threshold = %attributes.a_scanner_alert_threshold,
        "Tuned active scanners"
    );

    match engine
        .ascan_view_scanners(SCAN_POLICY_NAME, SCAN_POLICY_ID)
        .await
    {
        Ok(scanners) => tracing::info!("Active scanner state:\n{}", scanner_table(&scanners)),
        Err(e) => tracing::error!(error = %e, "Failed to list the active scanners after tuning"),
    }

    Ok(())
}

/// Fixed-width table of scanner state for the log.
fn scanner_table(scanners: &[ActiveScanner]) -> String {
    let name_width = scanners
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0)
        .max("name".len());

    let mut table = format!(
        "{:<8} {:<name_width$} {:<8} {:<15} {:<15}\n",
        "id", "name", "enabled", "attackStrength", "alertThreshold"
    );
    for s in scanners {
        table.push_str(&format!(
            "{:<8} {:<name_width$} {:<8} {:<15} {:<15}\n",
            s.id, s.name, s.enabled, s.attack_strength, s.alert_threshold
        ));
    }
    table
}
