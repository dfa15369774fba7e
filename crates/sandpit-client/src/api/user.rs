//! Account endpoints.

use sandpit_core::{ApiResponse, Result, UserInfo, UserPreset};

use crate::client::{Operation, SandpitClient};

/// Account endpoints
pub struct UserApi<'a> {
    client: &'a SandpitClient,
}

impl<'a> UserApi<'a> {
    pub(crate) fn new(client: &'a SandpitClient) -> Self {
        Self { client }
    }

    /// Fetch account information and remaining API allowance
    pub async fn info(&self, team: bool) -> Result<UserInfo> {
        let response: ApiResponse<UserInfo> = self
            .client
            .execute(
                Operation::get("/user", "user")
                    .query(vec![("team", team.to_string())])
                    .cached("user_info", vec![team.to_string()]),
            )
            .await?;
        Ok(response.data)
    }

    /// List saved environment presets
    pub async fn presets(&self) -> Result<Vec<UserPreset>> {
        let response: ApiResponse<Vec<UserPreset>> = self
            .client
            .execute(Operation::get("/user/presets", "user").cached("user_presets", Vec::new()))
            .await?;
        Ok(response.data)
    }
}
