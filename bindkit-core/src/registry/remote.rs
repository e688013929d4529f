//! Remote revocation of credential sources.

use std::future::Future;

use thiserror::Error;

use super::types::CredentialSource;

/// Errors from a remote revocation attempt.
#[derive(Debug, Error)]
pub enum RevocationError {
    /// The request could not be delivered.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    /// The server refused the revocation.
    #[error("server rejected revocation: status {status}")]
    Rejected {
        /// HTTP status returned by the server.
        status: u16,
    },
}

/// Server-side registry that can revoke a credential.
pub trait RemoteCredentialRepository: Send + Sync {
    /// Revokes the credential on the server.
    fn delete(
        &self,
        source: &CredentialSource,
    ) -> impl Future<Output = Result<(), RevocationError>> + Send;
}

/// HTTP revocation client against the authentication server's WebAuthn
/// endpoint.
pub struct HttpRevocationService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRevocationService {
    /// Creates a client for the given server base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Creates a client reusing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn revocation_url(&self, source: &CredentialSource) -> String {
        format!(
            "{}/webauthn/credentials/{}",
            self.base_url.trim_end_matches('/'),
            hex::encode(&source.id)
        )
    }
}

impl RemoteCredentialRepository for HttpRevocationService {
    async fn delete(&self, source: &CredentialSource) -> Result<(), RevocationError> {
        let response = self
            .client
            .delete(self.revocation_url(source))
            .query(&[("rpId", source.relying_party_id.as_str())])
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RevocationError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> CredentialSource {
        CredentialSource::new(vec![0xab, 0xcd], "rp.example.com", vec![1, 2, 3])
    }

    #[tokio::test]
    async fn test_successful_revocation() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/webauthn/credentials/abcd")
            .match_query(mockito::Matcher::UrlEncoded(
                "rpId".into(),
                "rp.example.com".into(),
            ))
            .with_status(204)
            .create_async()
            .await;

        let service = HttpRevocationService::new(server.url());
        service.delete(&source()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_revocation_carries_the_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/webauthn/credentials/abcd")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let service = HttpRevocationService::new(server.url());
        let err = service.delete(&source()).await.unwrap_err();
        assert!(matches!(err, RevocationError::Rejected { status: 500 }));
    }
}
