use http::StatusCode;
use relay_catalog::CatalogError;
use relay_core::HttpError;
use thiserror::Error;

/// Errors surfaced by the routing and dispatch core
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The named route does not exist or is disabled
    #[error("route not active: {route}")]
    RouteNotActive { route: String },

    /// Selection exhausted every candidate provider
    #[error("no provider available")]
    NoProviderAvailable,

    /// The upstream request exceeded its timeout
    #[error("upstream timeout contacting provider `{provider}`")]
    UpstreamTimeout { provider: String },

    /// The upstream connection failed (DNS, refused, TLS)
    #[error("upstream unreachable: {detail}")]
    UpstreamUnreachable { detail: String },

    /// The provider rejected the request; forwarded without retry
    #[error("upstream rejected the request ({status}): {body}")]
    UpstreamClient { status: u16, body: String },

    /// The provider failed server-side
    #[error("upstream server error ({status}): {body}")]
    UpstreamServer { status: u16, body: String },

    /// Every attempt in the retry budget failed
    #[error("no provider succeeded after {attempts} attempts")]
    UpstreamUnavailable { attempts: u32 },

    /// The provider's stored credential could not be decrypted
    #[error("credential decrypt failed for provider `{provider}`")]
    Decrypt { provider: String },

    /// The upstream payload could not be translated to the canonical shape
    #[error("adapter translation failed: {0}")]
    Adapter(String),

    /// A catalog read failed inside the request path
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl GatewayError {
    /// Whether dispatch may retry this failure on another provider
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamTimeout { .. }
                | Self::UpstreamUnreachable { .. }
                | Self::UpstreamServer { .. }
                | Self::Decrypt { .. }
        )
    }
}

impl HttpError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::RouteNotActive { .. } => StatusCode::NOT_FOUND,
            Self::NoProviderAvailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::UpstreamUnreachable { .. }
            | Self::UpstreamServer { .. }
            | Self::UpstreamUnavailable { .. }
            | Self::Decrypt { .. }
            | Self::Adapter(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamClient { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
            }
            Self::Catalog(e) => match e {
                CatalogError::ProviderNotFound(_) | CatalogError::RouteNotFound(_) => StatusCode::NOT_FOUND,
                CatalogError::NameConflict(_) | CatalogError::Validation(_) => StatusCode::BAD_REQUEST,
                CatalogError::Crypto(_) | CatalogError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::RouteNotActive { .. } => "not_found_error",
            Self::NoProviderAvailable => "no_provider_available",
            Self::UpstreamTimeout { .. } => "upstream_timeout",
            Self::UpstreamUnreachable { .. } => "upstream_unreachable",
            Self::UpstreamClient { .. } => "upstream_client_error",
            Self::UpstreamServer { .. } => "upstream_error",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::Decrypt { .. } => "credential_error",
            Self::Adapter(_) => "adapter_error",
            Self::Catalog(e) => match e {
                CatalogError::ProviderNotFound(_) | CatalogError::RouteNotFound(_) => "not_found_error",
                CatalogError::NameConflict(_) | CatalogError::Validation(_) => "invalid_request_error",
                CatalogError::Crypto(_) | CatalogError::Io(_) => "internal_error",
            },
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Catalog(CatalogError::Crypto(_) | CatalogError::Io(_)) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}
