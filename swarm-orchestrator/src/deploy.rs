//! Deployment hook.

use crate::models::{DeployEnvironment, DeploymentConfig, DeploymentReport};
use async_trait::async_trait;
use serde_json::json;

/// Triggers a deployment once a build has passed review.
///
/// Failures are reported, never raised: a failed deployment does not undo
/// earlier phases.
#[async_trait]
pub trait Deployer: Send + Sync {
    fn environment(&self) -> DeployEnvironment;

    async fn deploy(&self) -> DeploymentReport;
}

/// POSTs `{"environment", "timestamp"}` to a webhook. Single attempt.
#[derive(Debug, Clone)]
pub struct WebhookDeployer {
    client: reqwest::Client,
    config: DeploymentConfig,
}

impl WebhookDeployer {
    pub fn new(config: DeploymentConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: DeploymentConfig) -> Self {
        Self { client, config }
    }

    pub fn webhook_url(&self) -> &str {
        &self.config.webhook_url
    }
}

#[async_trait]
impl Deployer for WebhookDeployer {
    fn environment(&self) -> DeployEnvironment {
        self.config.environment
    }

    async fn deploy(&self) -> DeploymentReport {
        let body = json!({
            "environment": self.config.environment.to_string(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        match self
            .client
            .post(&self.config.webhook_url)
            .json(&body)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => DeploymentReport {
                success: true,
                message: format!(
                    "Deployment triggered successfully for {}",
                    self.config.environment
                ),
            },
            Ok(response) => DeploymentReport {
                success: false,
                message: format!("Deployment failed: HTTP {}", response.status()),
            },
            Err(e) => DeploymentReport {
                success: false,
                message: format!("Deployment failed: {}", e),
            },
        }
    }
}
