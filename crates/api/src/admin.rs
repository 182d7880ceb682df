//! Admin API surface
//!
//! Thin wrappers over the pipeline for the console's management endpoints.
//! Payload shapes belong to the backend; they pass through as JSON values.

use hubx_auth::CredentialStore;
use serde_json::{json, Value};

use crate::client::ApiClient;
use crate::error::ApiError;

/// The console's device/user/binding management endpoints.
pub struct AdminApi<S: CredentialStore + 'static> {
    client: ApiClient<S>,
}

impl<S: CredentialStore + 'static> AdminApi<S> {
    #[must_use]
    pub fn new(client: ApiClient<S>) -> Self {
        Self { client }
    }

    /// The underlying pipeline, for endpoints not wrapped here.
    #[must_use]
    pub fn client(&self) -> &ApiClient<S> {
        &self.client
    }

    /// List registered devices.
    pub async fn devices(&self) -> Result<Value, ApiError> {
        self.client.get("/devices").await
    }

    /// List known users.
    pub async fn users(&self) -> Result<Value, ApiError> {
        self.client.get("/users").await
    }

    /// List user/device bindings.
    pub async fn bindings(&self) -> Result<Value, ApiError> {
        self.client.get("/bindings").await
    }

    /// Bind a device to a user.
    pub async fn create_binding(&self, user_id: &str, device_id: &str) -> Result<Value, ApiError> {
        self.client
            .post("/bindings", &json!({ "user_id": user_id, "device_id": device_id }))
            .await
    }

    /// Remove a binding.
    pub async fn delete_binding(&self, binding_id: &str) -> Result<(), ApiError> {
        self.client.delete(&format!("/bindings/{binding_id}")).await
    }
}
