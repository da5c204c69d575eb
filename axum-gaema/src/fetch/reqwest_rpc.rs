use oauth2::reqwest::{Client, redirect::Policy};

use crate::fetch::{FetchError, FetchRequest, FetchRpc, RpcResult};

/// Client for the OAuth2 token exchange. Redirects are not followed there.
pub fn default_reqwest_client() -> Client {
    Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap_or_default()
}

/// [`FetchRpc`] backed by reqwest.
#[derive(Clone)]
pub struct ReqwestRpc {
    client: Client,
}

impl ReqwestRpc {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestRpc {
    fn default() -> Self {
        let client = Client::builder()
            .redirect(Policy::limited(5))
            .build()
            .unwrap_or_default();

        Self { client }
    }
}

impl FetchRpc for ReqwestRpc {
    async fn make_fetch_call(&self, request: FetchRequest) -> Result<RpcResult, FetchError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);

        if let Some(payload) = request.payload {
            builder = builder.body(payload);
        }

        let response = builder.send().await.map_err(FetchError::new)?;
        let status_code = response.status().as_u16();
        let content = response.bytes().await.map_err(FetchError::new)?;

        Ok(RpcResult {
            status_code,
            content,
        })
    }
}
