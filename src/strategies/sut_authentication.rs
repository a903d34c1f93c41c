//! Phase 1: authenticate to the SUT through the browser so the Emissary's
//! proxy records the login.

use crate::browser::Browser;
use crate::errors::AppError;
use crate::services::context::SessionContext;

strategy_enum!(
    /// How the browser logs in to the SUT.
    SitesTreeSutAuthentication,
    "sitesTreeSutAuthenticationPopulation",
    [FormStandard, Link, NoAuthentication]
);

impl SitesTreeSutAuthentication {
    pub fn needs_browser(&self) -> bool {
        !matches!(self, Self::NoAuthentication)
    }

    pub async fn authenticate(
        &self,
        ctx: &SessionContext,
        browser: Option<&dyn Browser>,
    ) -> Result<(), AppError> {
        self.log_invoked("authenticate");

        if let Self::NoAuthentication = self {
            return Ok(());
        }

        let browser = browser.ok_or_else(|| {
            AppError::Configuration(format!("The {self} SUT authentication needs a browser"))
        })?;
        let authentication = ctx.sut().authentication.as_ref().ok_or_else(|| {
            AppError::Configuration(format!(
                "The {self} SUT authentication needs the SUT authentication properties"
            ))
        })?;
        let login_url = format!("{}{}", ctx.base_url(), authentication.route);

        browser.navigate(&login_url).await?;
        browser
            .check_and_notify_build_user_if_any_known_browser_errors()
            .await?;

        match self {
            Self::FormStandard => {
                let attributes = &ctx.sut().test_session.attributes;
                browser
                    .find_element_then_send_keys(
                        &authentication.username_field_locater,
                        &attributes.username,
                        true,
                    )
                    .await?;
                browser
                    .find_element_then_send_keys(
                        &authentication.password_field_locater,
                        attributes.password.as_deref().unwrap_or_default(),
                        true,
                    )
                    .await?;
                browser
                    .find_element_then_click(
                        &authentication.submit,
                        Some(&authentication.expected_page_source_success),
                    )
                    .await?;
            }
            Self::Link => {
                browser
                    .check_user_is_authenticated(&authentication.expected_page_source_success)
                    .await?;
            }
            Self::NoAuthentication => {}
        }

        tracing::info!(
            audience = "build_user",
            strategy = self.name(),
            login_url = %login_url,
            "Authenticated to the SUT"
        );
        Ok(())
    }
}
