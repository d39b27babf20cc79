//! Welcome page rendering.

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;

/// Template engine for the HTML pages served by the gateway.
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

/// Context for the welcome page.
#[derive(Debug, Serialize)]
pub struct WelcomeContext<'a> {
    pub cluster: &'a str,
    pub region: &'a str,
    pub version: &'static str,
}

impl TemplateEngine {
    /// Create a new engine with all page templates registered.
    ///
    /// # Errors
    ///
    /// Returns an error if an embedded template fails to compile.
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars
            .register_template_string("welcome", include_str!("../templates/welcome.html.hbs"))
            .context("Failed to register welcome template")?;
        Ok(Self { handlebars })
    }

    /// Render the welcome page.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub fn render_welcome(&self, context: &WelcomeContext) -> Result<String> {
        self.handlebars
            .render("welcome", context)
            .context("Failed to render welcome template")
    }
}
