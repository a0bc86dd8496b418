use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use http::Method;
use serde::Deserialize;
use volley::{DispatchConfig, RequestDescriptor, TransportOptions};

/// A run described in TOML: what to send, how hard, and where to report.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunPlan {
    pub request: RequestSection,
    pub load: DispatchConfig,
    #[serde(default)]
    pub transport: TransportOptions,
    #[serde(default)]
    pub report: ReportSection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestSection {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub content_type: Option<String>,
    pub json: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportSection {
    pub path: Option<PathBuf>,
    pub directory: Option<PathBuf>,
    pub summary_bucket_ms: u64,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            path: None,
            directory: None,
            summary_bucket_ms: 1000,
        }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

impl RunPlan {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run plan {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let plan: RunPlan = toml::from_str(content).context("Failed to parse run plan")?;
        if plan.report.summary_bucket_ms == 0 {
            bail!("report.summary_bucket_ms must be at least 1");
        }
        Ok(plan)
    }
}

impl RequestSection {
    pub fn descriptor(&self) -> Result<RequestDescriptor> {
        let method = Method::from_bytes(self.method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("Invalid method {:?}", self.method))?;
        let mut descriptor = RequestDescriptor::new(method, &self.url)?.with_headers(
            self.headers
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        )?;
        match (&self.body, &self.json) {
            (Some(_), Some(_)) => bail!("request.body and request.json are mutually exclusive"),
            (Some(body), None) => {
                let content_type = self.content_type.as_deref().unwrap_or("text/plain");
                descriptor = descriptor.with_body(content_type, body.clone())?;
            }
            (None, Some(json)) => {
                descriptor = descriptor.with_json(json)?;
            }
            (None, None) => {}
        }
        Ok(descriptor)
    }
}
