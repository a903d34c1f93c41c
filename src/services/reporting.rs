//! Report housekeeping and generation for a finished session.

use std::path::Path;

use chrono::Utc;

use crate::errors::AppError;
use crate::models::report::{session_report_prefix, ReportKind, REPORT_CATALOGUE};
use crate::models::session::ReportSelection;
use crate::services::context::SessionContext;
use crate::services::sequential::run_sequentially;

/// Timestamp safe for file names, e.g. `2026-10-17T09-41-05`.
pub fn now_as_file_name() -> String {
    Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string()
}

/// Templates selected by the build user; the whole catalogue by default.
///
/// Unknown template names are ignored.
pub fn select_reports(selection: Option<&ReportSelection>) -> Vec<ReportKind> {
    match selection {
        Some(selection) if !selection.template_themes.is_empty() => REPORT_CATALOGUE
            .iter()
            .filter(|kind| {
                selection
                    .template_themes
                    .iter()
                    .any(|theme| theme.name == kind.name)
            })
            .copied()
            .collect(),
        _ => REPORT_CATALOGUE.to_vec(),
    }
}

/// Delete every entry of `results_dir` that belongs to the session.
///
/// Returns the number of entries removed. Any failure is `Housekeeping`.
pub async fn delete_session_reports(
    results_dir: &Path,
    test_session_id: &str,
) -> Result<usize, AppError> {
    let prefix = session_report_prefix(test_session_id);
    let housekeeping = |e: std::io::Error| {
        AppError::Housekeeping(format!(
            "could not clear previous reports for Test Session {test_session_id} in {}: {e}",
            results_dir.display()
        ))
    };

    let mut entries = tokio::fs::read_dir(results_dir).await.map_err(housekeeping)?;
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await.map_err(housekeeping)? {
        if !entry.file_name().to_string_lossy().starts_with(&prefix) {
            continue;
        }
        let path = entry.path();
        let is_dir = entry.file_type().await.map_err(housekeeping)?.is_dir();
        if is_dir {
            tokio::fs::remove_dir_all(&path).await.map_err(housekeeping)?;
        } else {
            tokio::fs::remove_file(&path).await.map_err(housekeeping)?;
        }
        tracing::debug!(path = %path.display(), "Removed previous report");
        removed += 1;
    }

    Ok(removed)
}

/// Clear the session's old reports, then generate each selected report.
///
/// Returns the generated file names.
pub async fn create_reports(ctx: &SessionContext) -> Result<Vec<String>, AppError> {
    let props = ctx.emissary_properties();
    let test_session_id = ctx.test_session_id();

    match delete_session_reports(Path::new(&props.results_dir), test_session_id).await {
        Ok(removed) => tracing::info!(
            audience = "build_user",
            test_session_id,
            removed,
            "Cleared previous reports"
        ),
        Err(notice) => tracing::warn!(audience = "build_user", error = %notice, "Report housekeeping failed"),
    }

    let now = now_as_file_name();
    let descriptors: Vec<_> = select_reports(ctx.sut().test_session.attributes.reports.as_ref())
        .into_iter()
        .map(|kind| {
            kind.descriptor(
                test_session_id,
                &ctx.sut().context.name,
                ctx.base_url(),
                &props.results_dir,
                &now,
            )
        })
        .collect();

    let engine = ctx.engine();
    run_sequentially(descriptors, |_, descriptor| async move {
        engine.generate_report(&descriptor).await.map_err(|e| {
            AppError::engine(
                format!(
                    "Failed to generate report \"{}\" for Test Session {test_session_id}",
                    descriptor.report_file_name
                ),
                e,
            )
        })?;
        tracing::info!(
            audience = "build_user",
            template = %descriptor.template,
            file = %descriptor.report_file_name,
            "Report generated"
        );
        Ok(descriptor.report_file_name)
    })
    .await
}
