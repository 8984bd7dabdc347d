//! HTTP connector for the reference resolver

use std::sync::Arc;

use async_trait::async_trait;
use grove_controller::Connector;
use grove_remote::{Credentials, GraphAdminApi, HttpAdminApi, RemoteError};

/// Opens authenticated HTTP handles to remote administration APIs.
#[derive(Default)]
pub struct HttpConnector;

impl HttpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> Result<Arc<dyn GraphAdminApi>, RemoteError> {
        let api = HttpAdminApi::new(url, credentials.clone())?;
        Ok(Arc::new(api))
    }
}
