//! HTTP implementation of the step executor and compensator.

use async_trait::async_trait;
use common::{Method, ResourceId, StepInput, StepResult};
use reqwest::{Client, RequestBuilder};
use saga::{Compensator, ServiceError, StepExecutor};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::response::extract_resource_id;

/// Client for the external CRUD services.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct CrudClient {
    http: Client,
    config: ClientConfig,
}

impl CrudClient {
    /// Builds a client whose requests time out after `config.timeout`.
    pub fn new(config: ClientConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(transport_error)?;
        Ok(Self { http, config })
    }

    fn resource_url(base_url: &str, id: &ResourceId) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), id)
    }

    fn required_id(input: &StepInput) -> Result<&ResourceId, ServiceError> {
        input
            .resource_id
            .as_ref()
            .filter(|id| !id.is_empty())
            .ok_or(ServiceError::MissingResourceId {
                method: input.method,
            })
    }

    fn mock_result(input: &StepInput) -> Result<StepResult, ServiceError> {
        match input.method {
            Method::Create => Ok(StepResult::new(format!(
                "mock-{}-{}",
                input.payload.operation,
                chrono::Utc::now().timestamp()
            ))),
            Method::Update | Method::Delete => {
                Ok(StepResult::new(Self::required_id(input)?.clone()))
            }
        }
    }

    /// Sends the request and returns the response once it is known to be 2xx.
    async fn send(request: RequestBuilder) -> Result<reqwest::Response, ServiceError> {
        let response = request.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Reads the id from a JSON body; bodies that are not JSON carry no id.
    async fn response_id(response: reqwest::Response) -> Option<ResourceId> {
        let body = response.json::<Value>().await.ok()?;
        extract_resource_id(&body)
    }
}

fn transport_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Transport(format!("request timed out: {e}"))
    } else {
        ServiceError::Transport(e.to_string())
    }
}

#[async_trait]
impl StepExecutor for CrudClient {
    #[tracing::instrument(skip_all, fields(base_url = %input.base_url, method = %input.method))]
    async fn perform(&self, input: &StepInput) -> Result<StepResult, ServiceError> {
        if self.config.mock_mode {
            return Self::mock_result(input);
        }

        let base_url = input.base_url.trim_end_matches('/');
        match input.method {
            Method::Create => {
                let request = self
                    .http
                    .post(format!("{base_url}/create"))
                    .json(&input.payload);
                let response = Self::send(request).await?;
                match Self::response_id(response).await {
                    Some(id) => Ok(StepResult::new(id)),
                    None => {
                        tracing::warn!("create response carried no resource id");
                        Ok(StepResult::default())
                    }
                }
            }
            Method::Update => {
                let id = Self::required_id(input)?;
                let request = self
                    .http
                    .put(Self::resource_url(base_url, id))
                    .json(&input.payload);
                let response = Self::send(request).await?;
                let confirmed = Self::response_id(response).await;
                Ok(StepResult::new(confirmed.unwrap_or_else(|| id.clone())))
            }
            Method::Delete => {
                let id = Self::required_id(input)?;
                let request = self.http.delete(Self::resource_url(base_url, id));
                Self::send(request).await?;
                Ok(StepResult::new(id.clone()))
            }
        }
    }
}

#[async_trait]
impl Compensator for CrudClient {
    #[tracing::instrument(skip(self))]
    async fn undo(&self, base_url: &str, resource_id: &ResourceId) -> Result<(), ServiceError> {
        if self.config.mock_mode {
            tracing::debug!("mock mode, rollback skipped");
            return Ok(());
        }

        let request = self.http.delete(Self::resource_url(base_url, resource_id));
        Self::send(request).await?;
        Ok(())
    }
}
