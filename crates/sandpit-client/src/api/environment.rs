//! Guest environment catalog endpoint.

use sandpit_core::{ApiResponse, EnvironmentInfo, Result};

use crate::client::{Operation, SandpitClient};

/// Environment endpoints
pub struct EnvironmentApi<'a> {
    client: &'a SandpitClient,
}

impl<'a> EnvironmentApi<'a> {
    pub(crate) fn new(client: &'a SandpitClient) -> Self {
        Self { client }
    }

    /// List the guest environments the account can use. Cacheable: the
    /// catalog changes rarely.
    pub async fn get(&self) -> Result<EnvironmentInfo> {
        let response: ApiResponse<EnvironmentInfo> = self
            .client
            .execute(
                Operation::get("/environment", "environment").cached("environment", Vec::new()),
            )
            .await?;
        Ok(response.data)
    }
}
