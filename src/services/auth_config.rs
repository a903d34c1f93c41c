//! Emissary-side authentication configuration.
//!
//! Bounds the crawler, scopes the context to the session's routes, and
//! registers a form-based login with a forced user so every later request is
//! sent as the authenticated session user.

use crate::errors::AppError;
use crate::services::context::SessionContext;
use crate::services::sequential::run_sequentially;

/// Name of the Emissary's form-based authentication method.
pub const FORM_BASED_AUTHENTICATION: &str = "formBasedAuthentication";

/// User registered when the session does not authenticate.
pub const PLACEHOLDER_USER: &str = "NA";

/// Which session indicator the Emissary watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionIndicator {
    LoggedIn(String),
    LoggedOut(String),
}

impl SessionIndicator {
    /// Logged-in wins when both are configured.
    pub fn select(
        logged_in: Option<&str>,
        logged_out: Option<&str>,
    ) -> Result<Self, AppError> {
        let non_empty = |s: &&str| !s.is_empty();
        match (logged_in.filter(non_empty), logged_out.filter(non_empty)) {
            (Some(indicator), _) => Ok(Self::LoggedIn(indicator.to_string())),
            (None, Some(indicator)) => Ok(Self::LoggedOut(indicator.to_string())),
            (None, None) => Err(AppError::Configuration(
                "Neither loggedInIndicator nor loggedOutIndicator is configured for the SUT"
                    .to_string(),
            )),
        }
    }
}

/// Context inclusion regexes: one per route, else a catch-all under the base URL.
pub fn context_inclusion_targets(base_url: &str, route_ids: &[&str]) -> Vec<String> {
    if route_ids.is_empty() {
        vec![format!("{base_url}.*")]
    } else {
        route_ids
            .iter()
            .map(|route| format!("{base_url}{route}"))
            .collect()
    }
}

/// `authMethodConfigParams` for a form-based login.
///
/// The request data template keeps the Emissary's `{%username%}` and
/// `{%password%}` placeholders percent-encoded.
pub fn login_request_template(
    base_url: &str,
    login_route: &str,
    username_field: &str,
    password_field: &str,
) -> String {
    format!(
        "loginUrl={base_url}{login_route}&loginRequestData={username_field}%3D%7B%25username%25%7D%26{password_field}%3D%7B%25password%25%7D"
    )
}

/// `authCredentialsConfigParams`; only the password is percent-encoded.
pub fn credentials_config_params(username: &str, password: &str) -> String {
    format!(
        "username={username}&password={}",
        urlencoding::encode(password)
    )
}

/// Set the crawl depth and thread count.
pub async fn configure_spider_bounds(ctx: &SessionContext) -> Result<(), AppError> {
    let props = ctx.emissary_properties();
    let engine = ctx.engine();

    let resp = engine
        .set_spider_max_depth(props.max_depth)
        .await
        .map_err(|e| AppError::engine("Failed to set the spider max depth", e))?;
    tracing::info!(max_depth = props.max_depth, response = %resp, "Set spider max depth");

    let resp = engine
        .set_spider_thread_count(props.thread_count)
        .await
        .map_err(|e| AppError::engine("Failed to set the spider thread count", e))?;
    tracing::info!(thread_count = props.thread_count, response = %resp, "Set spider thread count");

    Ok(())
}

/// Include the session's routes in the context, then exclude `excludedRoutes`.
pub async fn apply_context_rules(ctx: &SessionContext) -> Result<(), AppError> {
    let context_name = ctx.sut().context.name.as_str();
    let route_ids = ctx.sut().test_session.route_ids();
    let engine = ctx.engine();

    run_sequentially(
        context_inclusion_targets(ctx.base_url(), &route_ids),
        |_, regex| async move {
            let resp = engine
                .include_in_context(context_name, &regex)
                .await
                .map_err(|e| {
                    AppError::engine(
                        format!("Failed to include \"{regex}\" in context \"{context_name}\""),
                        e,
                    )
                })?;
            tracing::info!(context = context_name, regex = %regex, response = %resp, "Included in context");
            Ok(())
        },
    )
    .await?;

    run_sequentially(
        ctx.sut().test_session.attributes.excluded_routes.iter(),
        |_, regex| async move {
            let resp = engine
                .exclude_from_context(context_name, regex)
                .await
                .map_err(|e| {
                    AppError::engine(
                        format!("Failed to exclude \"{regex}\" from context \"{context_name}\""),
                        e,
                    )
                })?;
            tracing::info!(context = context_name, regex = %regex, response = %resp, "Excluded from context");
            Ok(())
        },
    )
    .await?;

    Ok(())
}

/// Register the form login, the session user and forced-user mode.
pub async fn register_form_authentication(ctx: &SessionContext) -> Result<(), AppError> {
    let sut = ctx.sut();
    let attributes = &sut.test_session.attributes;
    let authentication = sut.authentication.as_ref().ok_or_else(|| {
        AppError::Configuration(
            "Form based authentication needs the SUT authentication properties".to_string(),
        )
    })?;
    let indicator = SessionIndicator::select(
        sut.logged_in_indicator.as_deref(),
        sut.logged_out_indicator.as_deref(),
    )?;
    let context_id = ctx.context_id()?;
    let engine = ctx.engine();

    let config_params = login_request_template(
        ctx.base_url(),
        &authentication.route,
        &authentication.username_field_locater,
        &authentication.password_field_locater,
    );
    let resp = engine
        .set_authentication_method(context_id, FORM_BASED_AUTHENTICATION, &config_params)
        .await
        .map_err(|e| {
            AppError::engine(
                format!("Failed to set the authentication method for context {context_id}"),
                e,
            )
        })?;
    tracing::info!(context_id, response = %resp, "Set form based authentication");

    let resp = match &indicator {
        SessionIndicator::LoggedIn(regex) => engine
            .set_logged_in_indicator(context_id, regex)
            .await
            .map_err(|e| AppError::engine("Failed to set the logged in indicator", e))?,
        SessionIndicator::LoggedOut(regex) => engine
            .set_logged_out_indicator(context_id, regex)
            .await
            .map_err(|e| AppError::engine("Failed to set the logged out indicator", e))?,
    };
    tracing::info!(context_id, indicator = ?indicator, response = %resp, "Set session indicator");

    let user_id = engine
        .new_user(context_id, &attributes.username)
        .await
        .map_err(|e| {
            AppError::engine(
                format!("Failed to create user \"{}\"", attributes.username),
                e,
            )
        })?;
    ctx.set_user_id(user_id)?;
    let user_id = ctx.user_id()?;
    tracing::info!(context_id, user_id, username = %attributes.username, "Created Emissary user");

    let credentials = credentials_config_params(
        &attributes.username,
        attributes.password.as_deref().unwrap_or_default(),
    );
    engine
        .set_authentication_credentials(context_id, user_id, &credentials)
        .await
        .map_err(|e| {
            AppError::engine(format!("Failed to set credentials for user {user_id}"), e)
        })?;

    engine
        .set_user_enabled(context_id, user_id, true)
        .await
        .map_err(|e| AppError::engine(format!("Failed to enable user {user_id}"), e))?;

    engine
        .set_forced_user(context_id, user_id)
        .await
        .map_err(|e| {
            AppError::engine(
                format!("Failed to set user {user_id} as forced user of context {context_id}"),
                e,
            )
        })?;

    engine
        .set_forced_user_mode_enabled(true)
        .await
        .map_err(|e| AppError::engine("Failed to enable forced user mode", e))?;
    tracing::info!(
        audience = "build_user",
        context_id,
        user_id,
        "Forced user mode enabled"
    );

    Ok(())
}

/// Register the placeholder user for sessions without authentication.
pub async fn register_placeholder_user(ctx: &SessionContext) -> Result<(), AppError> {
    let context_id = ctx.context_id()?;
    let user_id = ctx
        .engine()
        .new_user(context_id, PLACEHOLDER_USER)
        .await
        .map_err(|e| AppError::engine("Failed to create the placeholder user", e))?;
    tracing::info!(context_id, user_id = %user_id, "Created placeholder user");
    ctx.set_user_id(user_id)
}
