//! HTTP implementation of the orchestrator API

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::resources::{ClusterCreated, ClusterRequest, PodObject, ServiceObject};
use super::{OrchestratorApi, OrchestratorError};
use crate::cluster::Selector;

/// List envelope returned by the orchestrator's collection endpoints
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// Orchestrator client talking to the REST API
#[derive(Clone)]
pub struct HttpOrchestrator {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpOrchestrator {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.header("Authorization", format!("Bearer {}", token)),
            None => req,
        }
    }

    async fn check(
        response: reqwest::Response,
        kind: &str,
        name: &str,
    ) -> Result<reqwest::Response, OrchestratorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());

        Err(match status.as_u16() {
            404 => OrchestratorError::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            },
            400 | 422 => OrchestratorError::Rejected(message),
            code => OrchestratorError::Api {
                status: code,
                message,
            },
        })
    }

    async fn list<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        selector: &Selector,
        kind: &str,
    ) -> Result<Vec<T>, OrchestratorError> {
        let req = self
            .client
            .get(self.url(path))
            .query(&[("labelSelector", selector.to_label_selector())]);

        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;

        let response = Self::check(response, kind, path).await?;
        let list: ListResponse<T> = response
            .json()
            .await
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;
        Ok(list.items)
    }

    async fn delete(&self, path: &str, kind: &str, name: &str) -> Result<(), OrchestratorError> {
        let response = self
            .authorize(self.client.delete(self.url(path)))
            .send()
            .await
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;

        Self::check(response, kind, name).await?;
        Ok(())
    }
}

#[async_trait]
impl OrchestratorApi for HttpOrchestrator {
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<PodObject>, OrchestratorError> {
        self.list(
            &format!("/api/v1/namespaces/{}/pods", namespace),
            selector,
            "pod",
        )
        .await
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), OrchestratorError> {
        self.delete(
            &format!("/api/v1/namespaces/{}/pods/{}", namespace, name),
            "pod",
            name,
        )
        .await
    }

    async fn list_services(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<ServiceObject>, OrchestratorError> {
        self.list(
            &format!("/api/v1/namespaces/{}/services", namespace),
            selector,
            "service",
        )
        .await
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), OrchestratorError> {
        self.delete(
            &format!("/api/v1/namespaces/{}/services/{}", namespace, name),
            "service",
            name,
        )
        .await
    }

    async fn create_cluster(
        &self,
        request: &ClusterRequest,
    ) -> Result<ClusterCreated, OrchestratorError> {
        let path = format!("/apis/dask/v1/namespaces/{}/clusters", request.namespace);
        let req = self.client.post(self.url(&path)).json(request);

        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;

        let response = Self::check(response, "cluster", &request.name).await?;
        response
            .json()
            .await
            .map_err(|e| OrchestratorError::Transport(e.to_string()))
    }

    async fn scale_cluster(
        &self,
        namespace: &str,
        name: &str,
        replicas: u32,
    ) -> Result<(), OrchestratorError> {
        let path = format!(
            "/apis/dask/v1/namespaces/{}/clusters/{}/scale",
            namespace, name
        );
        let req = self
            .client
            .post(self.url(&path))
            .json(&json!({ "replicas": replicas }));

        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;

        Self::check(response, "cluster", name).await?;
        Ok(())
    }

    async fn adapt_cluster(
        &self,
        namespace: &str,
        name: &str,
        minimum: u32,
        maximum: Option<u32>,
    ) -> Result<(), OrchestratorError> {
        let path = format!(
            "/apis/dask/v1/namespaces/{}/clusters/{}/adapt",
            namespace, name
        );
        let req = self
            .client
            .post(self.url(&path))
            .json(&json!({ "minimum": minimum, "maximum": maximum }));

        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;

        Self::check(response, "cluster", name).await?;
        Ok(())
    }
}
