//! Request-side decoration: the bearer credential.

use reqwest::RequestBuilder;
use tracing::trace;

use crate::auth::{Credential, CredentialStore};

use super::request::RequestContext;

/// Credential for this attempt: the retry's own refreshed credential if it
/// has one, otherwise whatever the store holds right now.
pub fn credential_for(context: &RequestContext, store: &dyn CredentialStore) -> Option<Credential> {
    context.credential().cloned().or_else(|| store.get())
}

/// Attach `Authorization: Bearer <credential>` when a credential is present.
/// Without one the request goes out anonymous and the server decides.
pub fn authorize(builder: RequestBuilder, credential: Option<&Credential>) -> RequestBuilder {
    match credential {
        Some(credential) => builder.bearer_auth(credential.expose()),
        None => {
            trace!("No credential, sending anonymous request");
            builder
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::header::AUTHORIZATION;

    use super::*;
    use crate::auth::MemoryCredentialStore;

    const HOUR: Duration = Duration::from_secs(3600);

    fn build(credential: Option<&Credential>) -> reqwest::Request {
        let client = reqwest::Client::new();
        authorize(client.get("http://localhost:8000/api/v1/user/profile"), credential)
            .build()
            .unwrap()
    }

    #[test]
    fn test_header_present_with_credential() {
        let request = build(Some(&Credential::new("abc")));
        assert_eq!(request.headers().get(AUTHORIZATION).unwrap(), "Bearer abc");
    }

    #[test]
    fn test_header_absent_without_credential() {
        let request = build(None);
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_credential_read_lazily_from_store() {
        let store = MemoryCredentialStore::new();
        let context = RequestContext::initial();
        assert!(credential_for(&context, &store).is_none());

        store.set(Credential::new("one"), HOUR);
        assert_eq!(credential_for(&context, &store), Some(Credential::new("one")));

        store.set(Credential::new("two"), HOUR);
        assert_eq!(credential_for(&context, &store), Some(Credential::new("two")));
    }

    #[test]
    fn test_retry_uses_its_own_credential() {
        let store = MemoryCredentialStore::with_credential(Credential::new("other"), HOUR);
        let retry = RequestContext::initial().retry_with(Credential::new("mine"));
        assert_eq!(credential_for(&retry, &store), Some(Credential::new("mine")));
    }

    #[test]
    fn test_expired_credential_is_not_attached() {
        let store = MemoryCredentialStore::with_credential(Credential::new("old"), Duration::ZERO);
        let credential = credential_for(&RequestContext::initial(), &store);
        let request = build(credential.as_ref());
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }
}
