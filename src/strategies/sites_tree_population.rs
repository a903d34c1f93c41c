//! Phase 2: create the Emissary context and fill its sites tree, either by
//! driving the browser through every session route or by importing an API
//! definition.

use std::time::Duration;

use crate::browser::Browser;
use crate::emissary::OptionValue;
use crate::errors::AppError;
use crate::models::route::RouteDescriptor;
use crate::models::session::DefinitionImport;
use crate::services::context::SessionContext;
use crate::services::sequential::run_sequentially;
use crate::services::staging::with_staged_file;

/// Pause between browser steps while the SUT settles.
const BROWSER_SETTLE: Duration = Duration::from_secs(1);

strategy_enum!(
    /// Where the sites tree comes from.
    SitesTreePopulation,
    "sitesTreePopulation",
    [WebDriverStandard, ImportUrls, OpenApi, Soap, GraphQl]
);

/// Where a definition is read from.
enum DefinitionSource<'a> {
    Url(&'a str),
    File(&'a str),
}

fn definition_source<'a>(
    strategy: SitesTreePopulation,
    import_url: Option<&'a str>,
    import_file_content_base64: Option<&'a str>,
) -> Result<DefinitionSource<'a>, AppError> {
    let non_empty = |s: &&str| !s.trim().is_empty();
    match (
        import_url.filter(non_empty),
        import_file_content_base64.filter(non_empty),
    ) {
        (Some(url), _) => Ok(DefinitionSource::Url(url)),
        (None, Some(content)) => Ok(DefinitionSource::File(content)),
        (None, None) => Err(AppError::Configuration(format!(
            "The {strategy} sites tree population needs an importUrl or importFileContentBase64"
        ))),
    }
}

fn import_properties(
    strategy: SitesTreePopulation,
    import: Option<&DefinitionImport>,
) -> Result<&DefinitionImport, AppError> {
    import.ok_or_else(|| {
        AppError::Configuration(format!(
            "The {strategy} sites tree population needs its import properties in the Test Session"
        ))
    })
}

impl SitesTreePopulation {
    pub fn needs_browser(&self) -> bool {
        matches!(self, Self::WebDriverStandard)
    }

    pub async fn populate(
        &self,
        ctx: &SessionContext,
        browser: Option<&dyn Browser>,
    ) -> Result<(), AppError> {
        self.log_invoked("populate");
        self.create_context(ctx).await?;

        match self {
            Self::WebDriverStandard => {
                let browser = browser.ok_or_else(|| {
                    AppError::Configuration(format!(
                        "The {self} sites tree population needs a browser"
                    ))
                })?;
                self.navigate_routes(ctx, browser).await
            }
            Self::ImportUrls => self.import_urls(ctx).await,
            Self::OpenApi => self.import_open_api(ctx).await,
            Self::Soap => self.import_soap(ctx).await,
            Self::GraphQl => self.import_graph_ql(ctx).await,
        }
    }

    async fn create_context(&self, ctx: &SessionContext) -> Result<(), AppError> {
        let context_name = &ctx.sut().context.name;
        let context_id = ctx
            .engine()
            .new_context(context_name)
            .await
            .map_err(|e| {
                AppError::engine(format!("Failed to create context \"{context_name}\""), e)
            })?;
        tracing::info!(context = %context_name, context_id = %context_id, "Created Emissary context");
        ctx.set_context_id(context_id)
    }

    // -----------------------------------------------------------------------
    // Browser driven
    // -----------------------------------------------------------------------

    async fn navigate_routes(
        &self,
        ctx: &SessionContext,
        browser: &dyn Browser,
    ) -> Result<(), AppError> {
        let base_url = ctx.base_url();
        run_sequentially(ctx.sut().session_routes(), |_, route| async move {
            navigate_route(browser, base_url, route).await.map_err(|e| {
                AppError::Browser(format!(
                    "Error occurred while navigating route \"{}\". The error was: {e}",
                    route.id
                ))
            })
        })
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Definition imports
    // -----------------------------------------------------------------------

    async fn import_urls(&self, ctx: &SessionContext) -> Result<(), AppError> {
        let import = import_properties(*self, ctx.sut().test_session.attributes.import_urls.as_ref())?;
        let content = import
            .import_file_content_base64
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                AppError::Configuration(
                    "The ImportUrls sites tree population needs importFileContentBase64"
                        .to_string(),
                )
            })?;
        let engine = ctx.engine();

        let resp = with_staged_file(ctx.emissary_properties(), "UrlsList", content, |path| async move {
            engine
                .import_urls_file(&path)
                .await
                .map_err(|e| AppError::engine("Failed to import the URLs list into the Emissary", e))
        })
        .await?;
        tracing::info!(response = %resp, "Imported URLs list");
        Ok(())
    }

    async fn import_open_api(&self, ctx: &SessionContext) -> Result<(), AppError> {
        let import = import_properties(*self, ctx.sut().test_session.attributes.open_api.as_ref())?;
        let engine = ctx.engine();
        let base_url = ctx.base_url();
        let context_id = ctx.context_id()?;

        let resp = match definition_source(
            *self,
            import.import_url.as_deref(),
            import.import_file_content_base64.as_deref(),
        )? {
            DefinitionSource::Url(url) => engine
                .openapi_import_url(url, base_url, context_id)
                .await
                .map_err(|e| {
                    AppError::engine(format!("Failed to import the OpenAPI definition from \"{url}\""), e)
                })?,
            DefinitionSource::File(content) => {
                with_staged_file(ctx.emissary_properties(), "OpenApiDefinition", content, |path| async move {
                    engine
                        .openapi_import_file(&path, base_url, context_id)
                        .await
                        .map_err(|e| {
                            AppError::engine("Failed to import the OpenAPI definition file", e)
                        })
                })
                .await?
            }
        };
        tracing::info!(response = %resp, "Imported OpenAPI definition");
        Ok(())
    }

    async fn import_soap(&self, ctx: &SessionContext) -> Result<(), AppError> {
        let import = import_properties(*self, ctx.sut().test_session.attributes.soap.as_ref())?;
        let engine = ctx.engine();

        let resp = match definition_source(
            *self,
            import.import_url.as_deref(),
            import.import_file_content_base64.as_deref(),
        )? {
            DefinitionSource::Url(url) => engine.soap_import_url(url).await.map_err(|e| {
                AppError::engine(format!("Failed to import the SOAP definition from \"{url}\""), e)
            })?,
            DefinitionSource::File(content) => {
                with_staged_file(ctx.emissary_properties(), "SoapDefinition", content, |path| async move {
                    engine
                        .soap_import_file(&path)
                        .await
                        .map_err(|e| AppError::engine("Failed to import the SOAP definition file", e))
                })
                .await?
            }
        };
        tracing::info!(response = %resp, "Imported SOAP definition");
        Ok(())
    }

    async fn import_graph_ql(&self, ctx: &SessionContext) -> Result<(), AppError> {
        let graph_ql = ctx
            .sut()
            .test_session
            .attributes
            .graph_ql
            .as_ref()
            .ok_or_else(|| {
                AppError::Configuration(
                    "The GraphQl sites tree population needs graphQl properties in the Test Session"
                        .to_string(),
                )
            })?;
        let engine = ctx.engine();
        let base_url = ctx.base_url();

        let resp = match definition_source(
            *self,
            graph_ql.import_url.as_deref(),
            graph_ql.import_file_content_base64.as_deref(),
        )? {
            DefinitionSource::Url(url) => engine.graphql_import_url(url, base_url).await.map_err(|e| {
                AppError::engine(format!("Failed to import the GraphQL definition from \"{url}\""), e)
            })?,
            DefinitionSource::File(content) => {
                with_staged_file(ctx.emissary_properties(), "GraphQlDefinition", content, |path| async move {
                    engine
                        .graphql_import_file(&path, base_url)
                        .await
                        .map_err(|e| AppError::engine("Failed to import the GraphQL definition file", e))
                })
                .await?
            }
        };
        tracing::info!(response = %resp, "Imported GraphQL definition");

        run_sequentially(graph_ql.options.iter(), |_, (option, value)| async move {
            let value = OptionValue::from_json(value);
            let resp = engine.graphql_set_option(option, &value).await.map_err(|e| {
                AppError::engine(
                    format!(
                        "Failed to set GraphQL option \"{option}\" to \"{}\"",
                        value.as_param()
                    ),
                    e,
                )
            })?;
            tracing::info!(option = %option, value = %value.as_param(), response = %resp, "Set GraphQL option");
            Ok(())
        })
        .await?;
        Ok(())
    }
}

/// Replay one route's form: navigate, clear and fill every field, submit.
async fn navigate_route(
    browser: &dyn Browser,
    base_url: &str,
    route: &RouteDescriptor,
) -> Result<(), AppError> {
    browser.sleep(BROWSER_SETTLE).await;
    tracing::info!(route = %route.id, "Navigating route");
    browser.navigate(&format!("{base_url}{}", route.id)).await?;
    browser.sleep(BROWSER_SETTLE).await;

    for field in &route.attributes.attack_fields {
        browser
            .find_element_then_clear(&field.name, field.visible)
            .await?;
    }
    for field in &route.attributes.attack_fields {
        browser
            .find_element_then_send_keys(&field.name, &field.value, field.visible)
            .await?;
    }
    browser
        .find_element_then_click(&route.attributes.submit, None)
        .await?;
    browser.sleep(BROWSER_SETTLE).await;
    Ok(())
}
