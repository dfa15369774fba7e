//! Analysis submission and lifecycle endpoints.

use std::time::Duration;

use sandpit_core::{
    Ack, Analysis, AnalysisList, AnalysisRequest, AnalysisTarget, ApiResponse, Result,
    SandpitError, StatusUpdate, TaskRef,
};
use serde_json::Value;

use crate::client::{Body, Operation, SandpitClient};
use crate::stream::SseStream;

/// Analysis endpoints
pub struct AnalysisApi<'a> {
    client: &'a SandpitClient,
}

impl<'a> AnalysisApi<'a> {
    pub(crate) fn new(client: &'a SandpitClient) -> Self {
        Self { client }
    }

    /// Submit a new analysis.
    ///
    /// Validates the request locally first; compatibility violations fail
    /// before anything is sent. The returned [`TaskRef`] carries the task
    /// identifier used by every subsequent call.
    pub async fn submit(&self, request: AnalysisRequest) -> Result<TaskRef> {
        request.validate()?;

        let fields = request.form_fields();
        let body = match request.target {
            AnalysisTarget::File { filename, content } => Body::Multipart {
                fields,
                filename,
                content,
            },
            _ => Body::Form(fields),
        };

        let response: ApiResponse<TaskRef> = self
            .client
            .execute(Operation::post("/analysis", "analyze", body))
            .await?;
        Ok(response.data)
    }

    /// Submit file content with default environment settings
    pub async fn submit_file(
        &self,
        filename: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Result<TaskRef> {
        self.submit(AnalysisRequest::file(filename, content)).await
    }

    /// Submit a URL for browser detonation with default settings
    pub async fn submit_url(&self, url: impl Into<String>) -> Result<TaskRef> {
        self.submit(AnalysisRequest::url(url)).await
    }

    /// Submit a URL whose payload the guest downloads and executes
    pub async fn submit_download(&self, url: impl Into<String>) -> Result<TaskRef> {
        self.submit(AnalysisRequest::download(url)).await
    }

    /// Re-run a previous task with default settings
    pub async fn rerun(&self, task_id: &str) -> Result<TaskRef> {
        self.submit(AnalysisRequest::rerun(task_id)).await
    }

    /// Fetch the full analysis record. Cacheable: a completed analysis is
    /// immutable, so repeat fetches within the TTL are served locally.
    pub async fn get(&self, task_id: &str) -> Result<Analysis> {
        let response: ApiResponse<Analysis> = self
            .client
            .execute(
                Operation::get(format!("/analysis/{task_id}"), "status")
                    .cached("get_analysis", vec![task_id.to_string()]),
            )
            .await?;
        Ok(response.data)
    }

    /// Browse task history
    #[must_use]
    pub fn list(&self) -> ListRequestBuilder<'a> {
        ListRequestBuilder::new(self.client)
    }

    /// Poll the current task state. Never cached: polling must observe
    /// fresh state.
    pub async fn status(&self, task_id: &str) -> Result<Analysis> {
        let response: ApiResponse<Analysis> = self
            .client
            .execute(Operation::get(
                format!("/analysis/{task_id}/status"),
                "status",
            ))
            .await?;
        Ok(response.data)
    }

    /// Fetch the raw monitor snapshot (process tree, events). Never cached.
    pub async fn monitor(&self, task_id: &str) -> Result<Value> {
        let response: ApiResponse<Value> = self
            .client
            .execute(Operation::get(
                format!("/analysis/{task_id}/monitor"),
                "status",
            ))
            .await?;
        Ok(response.data)
    }

    /// Extend the run time of an in-flight task
    pub async fn add_time(&self, task_id: &str) -> Result<Ack> {
        self.client
            .execute(Operation::post(
                format!("/analysis/{task_id}/time"),
                "analyze",
                Body::None,
            ))
            .await
    }

    /// Stop a running task
    pub async fn stop(&self, task_id: &str) -> Result<Ack> {
        self.client
            .execute(Operation::post(
                format!("/analysis/{task_id}/stop"),
                "analyze",
                Body::None,
            ))
            .await
    }

    /// Delete a task. Also drops any locally cached record of it, so a
    /// subsequent `get` observes the deletion.
    pub async fn delete(&self, task_id: &str) -> Result<Ack> {
        let ack: Ack = self
            .client
            .execute(Operation::delete(format!("/analysis/{task_id}"), "analyze"))
            .await?;
        self.client.invalidate("get_analysis", &[task_id]).await;
        Ok(ack)
    }

    /// Live status feed for a running task
    pub async fn status_stream(&self, task_id: &str) -> Result<SseStream<StatusUpdate>> {
        self.client
            .execute_stream(format!("/analysis/{task_id}/status/stream"), "status")
            .await
    }

    /// Live monitor feed for a running task
    pub async fn monitor_stream(&self, task_id: &str) -> Result<SseStream<Value>> {
        self.client
            .execute_stream(format!("/analysis/{task_id}/monitor/stream"), "status")
            .await
    }

    /// Poll `status` every `interval` until the task reaches a terminal
    /// state, then fetch and return the full record.
    ///
    /// # Errors
    ///
    /// Propagates any polling or fetch failure; there is no internal
    /// deadline, callers wanting one should wrap this in a timeout.
    pub async fn wait_for_completion(
        &self,
        task_id: &str,
        interval: Duration,
    ) -> Result<Analysis> {
        loop {
            let current = self.status(task_id).await?;
            if current.status.is_terminal() {
                return self.get(task_id).await;
            }
            tokio::time::sleep(interval).await;
        }
    }
}

/// Builder for task-history queries
pub struct ListRequestBuilder<'a> {
    client: &'a SandpitClient,
    team: bool,
    skip: u32,
    limit: u32,
}

impl<'a> ListRequestBuilder<'a> {
    fn new(client: &'a SandpitClient) -> Self {
        Self {
            client,
            team: false,
            skip: 0,
            limit: 25,
        }
    }

    /// Browse the team history instead of the personal one
    #[must_use]
    pub const fn team(mut self, team: bool) -> Self {
        self.team = team;
        self
    }

    /// Number of leading items to skip
    #[must_use]
    pub const fn skip(mut self, skip: u32) -> Self {
        self.skip = skip;
        self
    }

    /// Page size, 1-100
    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Execute the query
    pub async fn send(self) -> Result<AnalysisList> {
        if self.limit < 1 || self.limit > 100 {
            return Err(SandpitError::Validation(
                "limit must be between 1 and 100".into(),
            ));
        }

        let response: ApiResponse<AnalysisList> = self
            .client
            .execute(
                Operation::get("/analysis", "list")
                    .query(vec![
                        ("team", self.team.to_string()),
                        ("skip", self.skip.to_string()),
                        ("limit", self.limit.to_string()),
                    ])
                    .cached(
                        "list_analyses",
                        vec![
                            self.team.to_string(),
                            self.skip.to_string(),
                            self.limit.to_string(),
                        ],
                    ),
            )
            .await?;
        Ok(response.data)
    }
}
