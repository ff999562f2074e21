//! OAuth 2.0 client record.

use crate::oauth::ordered_set::OrderedSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Grant type assumed when a client declares none
pub const DEFAULT_GRANT_TYPE: &str = "authorization_code";

/// Response type assumed when a client declares none
pub const DEFAULT_RESPONSE_TYPE: &str = "code";

/// Grant type a public client may never use
pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

/// Client capabilities consumed by the protocol layer.
pub trait OAuth2Client {
    fn id(&self) -> &str;
    fn redirect_uris(&self) -> &[String];
    fn hashed_secret(&self) -> &[u8];
    fn scopes(&self) -> Vec<String>;
    fn grant_types(&self) -> Vec<String>;
    fn response_types(&self) -> Vec<String>;
    fn owner(&self) -> &str;
    fn is_public(&self) -> bool;
    fn is_disabled(&self) -> bool;
}

/// OAuth 2.0 client.
///
/// Empty fields are absent-tolerant on load and the secret is omitted when
/// empty, so partial documents and records written before `disabled` and
/// `allowedTenantAccess` existed still deserialize.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Client {
    /// Client identifier
    pub id: String,

    /// Tenant IDs the client has been given rights to access
    pub allowed_tenant_access: OrderedSet,

    /// Human-readable name presented to the end-user during authorization
    #[serde(rename = "clientName")]
    pub name: String,

    /// Client secret. Cleartext only on its way into the registry; the
    /// registry replaces it with an Argon2 PHC hash before it is persisted.
    #[serde(rename = "clientSecret", skip_serializing_if = "String::is_empty")]
    pub secret: String,

    /// Allowed redirect URIs
    pub redirect_uris: Vec<String>,

    /// Grant types the client may use; empty reads as `authorization_code`
    pub grant_types: Vec<String>,

    /// Response types the client may use; empty reads as `code`
    pub response_types: Vec<String>,

    /// Scopes the client may request
    pub scopes: OrderedSet,

    /// Owner of the client, typically a developer or organisation
    pub owner: String,

    pub policy_uri: String,
    pub terms_of_service_uri: String,
    pub client_uri: String,
    pub logo_uri: String,

    /// Ways to contact the people responsible for the client
    pub contacts: Vec<String>,

    /// Public clients hold no secret and cannot use `client_credentials`
    pub public: bool,

    /// Disabled clients fail every grant and token operation
    pub disabled: bool,
}

impl Client {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// True only for the zero-value client.
    pub fn is_empty(&self) -> bool {
        *self == Client::default()
    }

    pub fn enable_scope_access<I, S>(&mut self, scopes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.extend(scopes);
    }

    pub fn disable_scope_access<I, S>(&mut self, scopes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for scope in scopes {
            self.scopes.remove(scope.as_ref());
        }
    }

    pub fn enable_tenant_access<I, S>(&mut self, tenant_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tenant_access.extend(tenant_ids);
    }

    pub fn disable_tenant_access<I, S>(&mut self, tenant_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tenant_id in tenant_ids {
            self.allowed_tenant_access.remove(tenant_id.as_ref());
        }
    }

    pub fn has_tenant_access(&self, tenant_id: &str) -> bool {
        self.allowed_tenant_access.contains(tenant_id)
    }

    /// Whether the client may use `grant_type` right now.
    pub fn allows_grant_type(&self, grant_type: &str) -> bool {
        if self.disabled {
            return false;
        }
        if self.public && grant_type == CLIENT_CREDENTIALS_GRANT {
            return false;
        }
        self.grant_types().iter().any(|g| g == grant_type)
    }
}

impl OAuth2Client for Client {
    fn id(&self) -> &str {
        &self.id
    }

    fn redirect_uris(&self) -> &[String] {
        &self.redirect_uris
    }

    fn hashed_secret(&self) -> &[u8] {
        self.secret.as_bytes()
    }

    fn scopes(&self) -> Vec<String> {
        self.scopes.to_vec()
    }

    // https://openid.net/specs/openid-connect-registration-1_0.html#ClientMetadata
    fn grant_types(&self) -> Vec<String> {
        if self.grant_types.is_empty() {
            return vec![DEFAULT_GRANT_TYPE.to_string()];
        }
        self.grant_types.clone()
    }

    fn response_types(&self) -> Vec<String> {
        if self.response_types.is_empty() {
            return vec![DEFAULT_RESPONSE_TYPE.to_string()];
        }
        self.response_types.clone()
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn is_public(&self) -> bool {
        self.public
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("scopes", &self.scopes)
            .field("allowed_tenant_access", &self.allowed_tenant_access)
            .field("public", &self.public)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

/// Criteria for listing clients. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ClientFilter {
    pub owner: Option<String>,
    pub tenant: Option<String>,
    pub scope: Option<String>,
    pub public: Option<bool>,
    pub disabled: Option<bool>,
    pub limit: Option<usize>,
}

impl ClientFilter {
    pub fn matches(&self, client: &Client) -> bool {
        self.owner.as_ref().is_none_or(|owner| &client.owner == owner)
            && self
                .tenant
                .as_ref()
                .is_none_or(|tenant| client.has_tenant_access(tenant))
            && self
                .scope
                .as_ref()
                .is_none_or(|scope| client.scopes.contains(scope))
            && self.public.is_none_or(|public| client.public == public)
            && self
                .disabled
                .is_none_or(|disabled| client.disabled == disabled)
    }

    /// Filter, order by id and apply the limit.
    pub fn apply(&self, clients: impl IntoIterator<Item = Client>) -> Vec<Client> {
        let mut result: Vec<Client> = clients.into_iter().filter(|c| self.matches(c)).collect();
        result.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(limit) = self.limit {
            result.truncate(limit);
        }
        result
    }
}
