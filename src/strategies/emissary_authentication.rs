//! Phase 3: configure how the Emissary authenticates as the session user.

use crate::errors::AppError;
use crate::services::auth_config;
use crate::services::context::SessionContext;

strategy_enum!(
    EmissaryAuthentication,
    "emissaryAuthentication",
    [FormStandard, NoAuthentication]
);

impl EmissaryAuthentication {
    pub async fn configure(&self, ctx: &SessionContext) -> Result<(), AppError> {
        self.log_invoked("configure");

        auth_config::configure_spider_bounds(ctx).await?;
        auth_config::apply_context_rules(ctx).await?;

        match self {
            Self::FormStandard => auth_config::register_form_authentication(ctx).await,
            Self::NoAuthentication => auth_config::register_placeholder_user(ctx).await,
        }
    }
}
