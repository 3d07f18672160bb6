//! Fixed endpoints, client identity, and pagination constants for the app API.

/// OAuth token endpoint (authorization-code and refresh-token grants).
pub const AUTH_TOKEN_URL: &str = "https://oauth.secure.pixiv.net/auth/token";

/// Web login page that starts the PKCE authorization flow.
pub const LOGIN_URL: &str = "https://app-api.pixiv.net/web/v1/login";

/// Redirect URI registered for the Android client.
pub const REDIRECT_URI: &str = "https://app-api.pixiv.net/web/v1/users/auth/pixiv/callback";

/// Base URL of the app API.
pub const API_BASE_URL: &str = "https://app-api.pixiv.net";

/// Path of the illustration search endpoint, relative to [`API_BASE_URL`].
pub const SEARCH_ILLUST_PATH: &str = "/v1/search/illust";

/// Public client identity of the Android app. Not a per-user secret.
pub const CLIENT_ID: &str = "MOBrBDS8blbauoSck0ZfDbtuzpyT";

/// Public client secret of the Android app. Not a per-user secret.
pub const CLIENT_SECRET: &str = "lsACyCD94FhDUtGTXi3QzcFE2uU1hqtDaKeqrdwj";

/// `client` value sent to the login page.
pub const LOGIN_CLIENT: &str = "pixiv-android";

/// Number of items the search endpoint returns per page. Fixed by the server.
pub const PAGE_SIZE: u32 = 30;

/// Absolute page ceiling for a single crawl, independent of user limits.
pub const SAFETY_CAP_PAGES: u32 = 2000;

/// Referer expected by the image CDN.
pub const IMAGE_REFERER: &str = "https://www.pixiv.net/";

/// Artwork page prefix used for report links.
pub const ARTWORK_URL_PREFIX: &str = "https://www.pixiv.net/en/artworks/";

/// Remote endpoints used by the token and search clients.
///
/// Production code uses [`Endpoints::default`]; tests point these at a mock
/// server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// OAuth token endpoint.
    pub auth_token_url: String,
    /// Login page for the authorization-code flow.
    pub login_url: String,
    /// Redirect URI sent with the code exchange.
    pub redirect_uri: String,
    /// App API base URL.
    pub api_base_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_token_url: AUTH_TOKEN_URL.to_string(),
            login_url: LOGIN_URL.to_string(),
            redirect_uri: REDIRECT_URI.to_string(),
            api_base_url: API_BASE_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Endpoints that route both the token and API calls to one base URL.
    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            auth_token_url: format!("{base}/auth/token"),
            login_url: format!("{base}/web/v1/login"),
            redirect_uri: REDIRECT_URI.to_string(),
            api_base_url: base.to_string(),
        }
    }

    /// Full URL of the illustration search endpoint.
    #[must_use]
    pub fn search_url(&self) -> String {
        format!(
            "{}{}",
            self.api_base_url.trim_end_matches('/'),
            SEARCH_ILLUST_PATH
        )
    }
}
