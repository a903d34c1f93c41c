//! Staging of base64 definition files into the shared upload directory.
//!
//! The Emissary and this process see the same volume under different mount
//! points, so a staged file has a local path and an Emissary-side path.

use std::future::Future;
use std::path::PathBuf;

use base64::Engine as _;
use uuid::Uuid;

use crate::config::EmissaryProperties;
use crate::errors::AppError;

/// A decoded file written to the upload directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub local_path: PathBuf,
    /// Path the Emissary should read.
    pub emissary_path: String,
}

/// Eight hex characters.
pub fn random_prefix() -> String {
    hex::encode(&Uuid::new_v4().as_bytes()[..4])
}

fn join_dir(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Decode `content_base64` and write it as `<prefix>-<name>`.
pub async fn stage_base64(
    props: &EmissaryProperties,
    name: &str,
    content_base64: &str,
) -> Result<StagedFile, AppError> {
    let content = base64::engine::general_purpose::STANDARD
        .decode(content_base64.trim())
        .map_err(|e| {
            AppError::Validation(format!("{name} import file content is not valid base64: {e}"))
        })?;

    let file_name = format!("{}-{name}", random_prefix());
    let local_path = PathBuf::from(join_dir(&props.app_tester_upload_dir, &file_name));
    tokio::fs::write(&local_path, &content).await.map_err(|e| {
        AppError::Configuration(format!(
            "Failed to write {name} import file to {}: {e}",
            local_path.display()
        ))
    })?;

    let staged = StagedFile {
        emissary_path: join_dir(&props.upload_dir, &file_name),
        local_path,
    };
    tracing::info!(
        local_path = %staged.local_path.display(),
        emissary_path = %staged.emissary_path,
        bytes = content.len(),
        "Staged import file"
    );
    Ok(staged)
}

impl StagedFile {
    /// Remove the local copy. Failure is a notice, never an error.
    pub async fn remove(self) {
        if let Err(e) = tokio::fs::remove_file(&self.local_path).await {
            let notice = AppError::Housekeeping(format!(
                "could not remove staged file {}: {e}",
                self.local_path.display()
            ));
            tracing::warn!(audience = "build_user", error = %notice, "Staged file left behind");
        }
    }
}

/// Stage a file, hand its Emissary path to `import`, then remove it.
pub async fn with_staged_file<T, F, Fut>(
    props: &EmissaryProperties,
    name: &str,
    content_base64: &str,
    import: F,
) -> Result<T, AppError>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let staged = stage_base64(props, name, content_base64).await?;
    let result = import(staged.emissary_path.clone()).await;
    staged.remove().await;
    result
}
