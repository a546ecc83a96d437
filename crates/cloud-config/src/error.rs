//! Cloud config rendering errors

use thiserror::Error;

/// Errors that can occur while rendering a cloud config
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template could not be parsed
    #[error("failed to parse the cloud config template: {0}")]
    Parse(#[source] minijinja::Error),

    /// The template failed while being executed against the config
    #[error("failed to execute cloud config template: {0}")]
    Execute(#[source] minijinja::Error),
}
