use std::borrow::Cow;

use url::form_urlencoded;

use crate::{
    error::AuthError,
    fetch::FetchRequest,
    outcome::Outcome,
    providers::{AuthUser, IdentityProvider, services},
    request::RequestAdapter,
    scope::AuthScope,
};

pub const OPENID_ENDPOINT: &str = "https://www.google.com/accounts/o8/ud";

const OPENID_NS: &str = "http://specs.openid.net/auth/2.0";
const IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";
const AX_NS: &str = "http://openid.net/srv/ax/1.0";

const AX_FIRST_NAME: &str = "http://axschema.org/namePerson/first";
const AX_FULL_NAME: &str = "http://axschema.org/namePerson";
const AX_LAST_NAME: &str = "http://axschema.org/namePerson/last";
const AX_EMAIL: &str = "http://axschema.org/contact/email";
const AX_LANGUAGE: &str = "http://axschema.org/pref/language";
const AX_USERNAME: &str = "http://axschema.org/namePerson/friendly";

const AX_ATTRIBUTES: [(&str, &str); 6] = [
    ("firstname", AX_FIRST_NAME),
    ("fullname", AX_FULL_NAME),
    ("lastname", AX_LAST_NAME),
    ("email", AX_EMAIL),
    ("language", AX_LANGUAGE),
    ("username", AX_USERNAME),
];

/// Google accounts over OpenID 2.0 with attribute exchange.
pub struct GoogleOpenId {
    name: Cow<'static, str>,
    endpoint: String,
}

impl GoogleOpenId {
    pub fn new() -> Self {
        Self {
            name: Cow::Borrowed(services::GOOGLE),
            endpoint: OPENID_ENDPOINT.to_owned(),
        }
    }

    /// Google Apps accounts of `domain`. The provider is named after the
    /// domain.
    pub fn apps(domain: &str) -> Self {
        Self {
            name: Cow::Owned(domain.to_owned()),
            endpoint: format!("https://www.google.com/a/{domain}/o8/ud?be=o8"),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Where to send the browser to start the login.
    pub fn redirect_url(&self, request: &RequestAdapter) -> String {
        let return_to = request.callback_url();
        let realm = request.base_url();
        let required = AX_ATTRIBUTES
            .iter()
            .map(|(alias, _)| *alias)
            .collect::<Vec<_>>()
            .join(",");

        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("openid.ns", OPENID_NS)
            .append_pair("openid.claimed_id", IDENTIFIER_SELECT)
            .append_pair("openid.identity", IDENTIFIER_SELECT)
            .append_pair("openid.return_to", &return_to)
            .append_pair("openid.realm", &realm)
            .append_pair("openid.mode", "checkid_setup")
            .append_pair("openid.ns.ax", AX_NS)
            .append_pair("openid.ax.mode", "fetch_request");

        for (alias, uri) in AX_ATTRIBUTES {
            query.append_pair(&format!("openid.ax.type.{alias}"), uri);
        }
        query.append_pair("openid.ax.required", &required);

        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{separator}{}", self.endpoint, query.finish())
    }

    /// The arguments we got back, echoed to the endpoint for verification.
    fn verification_fields(request: &RequestAdapter) -> Vec<(String, String)> {
        let mut fields: Vec<(String, String)> = request
            .arguments
            .iter()
            .filter(|(name, _)| name.as_str() != "openid.mode")
            .filter_map(|(name, values)| Some((name.clone(), values.last()?.clone())))
            .collect();
        fields.sort();
        fields.push(("openid.mode".to_owned(), "check_authentication".to_owned()));
        fields
    }

    fn user_from_request(&self, request: &RequestAdapter) -> AuthUser {
        let ax_alias = request.arguments.iter().find_map(|(name, values)| {
            let alias = name.strip_prefix("openid.ns.")?;
            (values.last().map(String::as_str) == Some(AX_NS)).then_some(alias)
        });

        let ax_value = |uri: &str| -> Option<String> {
            let alias = ax_alias?;
            let type_prefix = format!("openid.{alias}.type.");
            let attribute = request.arguments.iter().find_map(|(name, values)| {
                let attribute = name.strip_prefix(&type_prefix)?;
                (values.last().map(String::as_str) == Some(uri)).then_some(attribute)
            })?;

            request
                .argument(&format!("openid.{alias}.value.{attribute}"))
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };

        let first_name = ax_value(AX_FIRST_NAME);
        let last_name = ax_value(AX_LAST_NAME);
        let email = ax_value(AX_EMAIL);

        let name = ax_value(AX_FULL_NAME).or_else(|| {
            let parts: Vec<&str> = [&first_name, &last_name]
                .into_iter()
                .flatten()
                .map(String::as_str)
                .collect();
            if parts.is_empty() {
                email
                    .as_deref()
                    .and_then(|email| email.split('@').next())
                    .map(str::to_owned)
            } else {
                Some(parts.join(" "))
            }
        });

        AuthUser {
            service: self.name.to_string(),
            id: request.argument("openid.claimed_id").map(str::to_owned),
            name,
            first_name,
            last_name,
            email,
            locale: ax_value(AX_LANGUAGE).map(|l| l.to_lowercase()),
            username: ax_value(AX_USERNAME),
            access_token: None,
        }
    }
}

impl Default for GoogleOpenId {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for GoogleOpenId {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature(&self) -> &str {
        "Google OpenID"
    }

    fn is_callback(&self, request: &RequestAdapter) -> bool {
        request.has_argument("openid.mode")
    }

    async fn authenticate_redirect(&self, scope: &mut AuthScope) -> Result<Outcome<()>, AuthError> {
        tracing::debug!("starting openid login with {}", self.name);
        Ok(scope.redirect(self.redirect_url(&scope.request)))
    }

    async fn get_authenticated_user(
        &self,
        scope: &mut AuthScope,
    ) -> Result<Option<AuthUser>, AuthError> {
        let mode = scope.get_argument("openid.mode", None, true)?;
        if mode != "id_res" {
            tracing::debug!("openid login ended with mode {mode}");
            return Ok(None);
        }

        let fields = Self::verification_fields(&scope.request);
        let request = FetchRequest::form(
            self.endpoint.clone(),
            fields.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        );

        let response = scope.http().fetch(request).await;
        if let Some(error) = &response.error {
            tracing::warn!("Invalid OpenID response: {error}");
            return Ok(None);
        }

        if !response.text().contains("is_valid:true") {
            tracing::warn!("Invalid OpenID response: {}", response.text());
            return Ok(None);
        }

        Ok(Some(self.user_from_request(&scope.request)))
    }
}

#[cfg(test)]
mod google {
    use axum::http::Request;

    use crate::request::RequestAdapter;

    use super::{AX_NS, GoogleOpenId, OPENID_ENDPOINT};

    fn adapter(uri: &str) -> RequestAdapter {
        let req = Request::get(uri)
            .header("host", "example.com")
            .body(())
            .unwrap();
        let (parts, _) = req.into_parts();
        RequestAdapter::from_parts(&parts)
    }

    #[test]
    fn redirect_url() {
        let provider = GoogleOpenId::new();
        let url = provider.redirect_url(&adapter("/gaema/login/google"));

        let (endpoint, query) = url.split_once('?').unwrap();
        assert_eq!(endpoint, OPENID_ENDPOINT);

        let params: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap();
        let get = |name: &str| {
            params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("openid.mode"), Some("checkid_setup"));
        assert_eq!(
            get("openid.return_to"),
            Some("http://example.com/gaema/login/google")
        );
        assert_eq!(get("openid.realm"), Some("http://example.com/"));
        assert_eq!(get("openid.ns.ax"), Some(AX_NS));
        assert_eq!(
            get("openid.ax.type.email"),
            Some("http://axschema.org/contact/email")
        );
    }

    #[test]
    fn apps_endpoint() {
        let provider = GoogleOpenId::apps("example.com");
        assert_eq!(
            provider.endpoint(),
            "https://www.google.com/a/example.com/o8/ud?be=o8"
        );

        let url = provider.redirect_url(&adapter("/"));
        assert!(url.starts_with("https://www.google.com/a/example.com/o8/ud?be=o8&openid.ns="));
    }

    #[test]
    fn attribute_exchange() {
        let req = adapter(
            "/?openid.mode=id_res\
             &openid.claimed_id=https%3A%2F%2Fwww.google.com%2Faccounts%2Fo8%2Fid%3Fid%3Dabc\
             &openid.ns.ext1=http%3A%2F%2Fopenid.net%2Fsrv%2Fax%2F1.0\
             &openid.ext1.type.a=http%3A%2F%2Faxschema.org%2FnamePerson%2Ffirst\
             &openid.ext1.value.a=Bob\
             &openid.ext1.type.b=http%3A%2F%2Faxschema.org%2FnamePerson%2Flast\
             &openid.ext1.value.b=Smith\
             &openid.ext1.type.c=http%3A%2F%2Faxschema.org%2Fcontact%2Femail\
             &openid.ext1.value.c=bob%40example.com\
             &openid.ext1.type.d=http%3A%2F%2Faxschema.org%2Fpref%2Flanguage\
             &openid.ext1.value.d=EN-US",
        );

        let user = GoogleOpenId::new().user_from_request(&req);
        assert_eq!(user.service, "google");
        assert_eq!(
            user.id.as_deref(),
            Some("https://www.google.com/accounts/o8/id?id=abc")
        );
        assert_eq!(user.first_name.as_deref(), Some("Bob"));
        assert_eq!(user.last_name.as_deref(), Some("Smith"));
        assert_eq!(user.name.as_deref(), Some("Bob Smith"));
        assert_eq!(user.email.as_deref(), Some("bob@example.com"));
        assert_eq!(user.locale.as_deref(), Some("en-us"));
    }

    #[test]
    fn name_falls_back_to_email() {
        let req = adapter(
            "/?openid.ns.ax=http%3A%2F%2Fopenid.net%2Fsrv%2Fax%2F1.0\
             &openid.ax.type.email=http%3A%2F%2Faxschema.org%2Fcontact%2Femail\
             &openid.ax.value.email=alice%40example.com",
        );

        let user = GoogleOpenId::new().user_from_request(&req);
        assert_eq!(user.name.as_deref(), Some("alice"));
    }

    #[test]
    fn verification_fields() {
        let req = adapter("/?openid.mode=id_res&openid.sig=abc&openid.signed=mode");
        let fields = GoogleOpenId::verification_fields(&req);

        assert_eq!(
            fields.last().unwrap(),
            &("openid.mode".to_owned(), "check_authentication".to_owned())
        );
        assert!(fields.contains(&("openid.sig".to_owned(), "abc".to_owned())));
        assert_eq!(fields.iter().filter(|(k, _)| k == "openid.mode").count(), 1);
    }
}
