//! Division assignment

use super::{ApiError, Client};

pub struct AuthorizationApi<'a> {
    client: &'a Client,
}

impl<'a> AuthorizationApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Move objects of `object_type` (e.g. `QUEUE`) into a division.
    pub async fn move_objects_to_division(
        &self,
        division_id: &str,
        object_type: &str,
        object_ids: &[String],
    ) -> Result<(), ApiError> {
        let path = format!(
            "/api/v2/authorization/divisions/{}/objects/{}",
            division_id, object_type
        );
        self.client.post_no_content(&path, object_ids).await
    }
}
