//! Connection target with an embedded session credential.

use url::Url;

use companion_protocol::constants::TOKEN_QUERY_PARAM;

/// WebSocket URL carrying the session credential as a query parameter.
///
/// `Debug` and `Display` redact the credential so the endpoint can be
/// logged freely.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Builds an endpoint from a base URL and a credential token.
    ///
    /// Any existing `token` parameter on `base` is replaced.
    pub fn new(base: &str, token: &str) -> Result<Self, url::ParseError> {
        let mut url = Url::parse(base)?;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != TOKEN_QUERY_PARAM)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (k, v) in &kept {
                pairs.append_pair(k, v);
            }
            pairs.append_pair(TOKEN_QUERY_PARAM, token);
        }
        Ok(Self { url })
    }

    /// Wraps a URL that already embeds its credential.
    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            url: Url::parse(url)?,
        })
    }

    /// Full URL including the credential. Never log this.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Returns `true` if the URL carries a credential.
    pub fn has_token(&self) -> bool {
        self.url.query_pairs().any(|(k, _)| k == TOKEN_QUERY_PARAM)
    }

    /// URL with the credential value replaced by `***`.
    pub fn redacted(&self) -> String {
        if !self.has_token() {
            return self.url.to_string();
        }
        let mut url = self.url.clone();
        let pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(k, v)| {
                if k == TOKEN_QUERY_PARAM {
                    (k.into_owned(), "***".to_owned())
                } else {
                    (k.into_owned(), v.into_owned())
                }
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
        url.to_string()
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Endpoint").field(&self.redacted()).finish()
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.redacted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_appends_token() {
        let ep = Endpoint::new("wss://host/ws", "abc").unwrap();
        assert_eq!(ep.as_str(), "wss://host/ws?token=abc");
        assert!(ep.has_token());
    }

    #[test]
    fn new_keeps_other_params_and_replaces_token() {
        let ep = Endpoint::new("ws://host/ws?device=phone&token=old", "new").unwrap();
        assert_eq!(ep.as_str(), "ws://host/ws?device=phone&token=new");
    }

    #[test]
    fn token_is_percent_encoded() {
        let ep = Endpoint::new("ws://host/ws", "a b&c").unwrap();
        assert_eq!(ep.as_str(), "ws://host/ws?token=a+b%26c");
    }

    #[test]
    fn debug_and_display_redact_token() {
        let ep = Endpoint::parse("wss://host/ws?token=secret").unwrap();
        let debug = format!("{ep:?}");
        let display = ep.to_string();
        assert!(!debug.contains("secret"));
        assert!(!display.contains("secret"));
        assert!(display.contains("token=***"));
    }

    #[test]
    fn redacted_without_token_is_unchanged() {
        let ep = Endpoint::parse("ws://localhost:8080/ws").unwrap();
        assert_eq!(ep.redacted(), "ws://localhost:8080/ws");
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(Endpoint::new("not a url", "t").is_err());
    }
}
