//! GCE cloud config
//!
//! Renders the `[global]` section consumed by the GCE cloud provider.

use crate::error::RenderError;
use crate::ini;
use minijinja::{Environment, context};
use serde::Serialize;

/// Template name registered in the per-render environment.
const TEMPLATE_NAME: &str = "cloud-config";

/// Renders the cloud config in gcfg format. Every field is optional, which is
/// why each assignment is always emitted and tags are repeated per element.
const CLOUD_CONFIG_TEMPLATE: &str = concat!(
    "[global]\n",
    "project-id = {{ global.project_id | ini_escape }}\n",
    "local-zone = {{ global.local_zone | ini_escape }}\n",
    "network-name = {{ global.network_name | ini_escape }}\n",
    "subnetwork-name = {{ global.subnetwork_name | ini_escape }}\n",
    "multizone = {{ global.multizone }}\n",
    "regional = {{ global.regional }}\n",
    "{% for tag in global.node_tags %}node-tags = {{ tag | ini_escape }}\n{% endfor %}",
);

/// Cloud configuration; only the `global` section is supported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CloudConfig {
    /// The `[global]` section
    pub global: GlobalOpts,
}

/// Values of the `[global]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GlobalOpts {
    /// GCP project ID
    pub project_id: String,
    /// Zone the nodes run in
    pub local_zone: String,
    /// VPC network name
    pub network_name: String,
    /// Subnetwork name
    pub subnetwork_name: String,
    /// Whether the cluster spans multiple zones
    pub multizone: bool,
    /// Whether the cluster is regional
    pub regional: bool,
    /// Network tags added to every node
    pub node_tags: Vec<String>,
}

impl CloudConfig {
    /// Renders the configuration using [`ini::escape`] for every string value.
    pub fn render(&self) -> Result<String, RenderError> {
        self.render_with(ini::escape)
    }

    /// Renders the configuration, passing every interpolated string value
    /// through `escape`.
    ///
    /// The environment is built per call, so nothing is registered globally.
    pub fn render_with(&self, escape: fn(&str) -> String) -> Result<String, RenderError> {
        let mut env = Environment::new();
        env.add_filter("ini_escape", move |value: String| escape(&value));
        env.add_template(TEMPLATE_NAME, CLOUD_CONFIG_TEMPLATE)
            .map_err(RenderError::Parse)?;

        let template = env.get_template(TEMPLATE_NAME).map_err(RenderError::Parse)?;
        template
            .render(context! { global => &self.global })
            .map_err(RenderError::Execute)
    }
}
