//! Hosted widget URL construction.
//!
//! The widget domain follows the target network: test networks use the
//! sandbox domain (which serves every operation from its root), mainnet
//! uses the production domain with an operation-specific path. Only
//! allow-listed query parameters are ever attached; anything else is
//! dropped without comment so a caller bug cannot leak stray parameters
//! into the payment provider's URL.

use url::Url;

use super::RampKind;
use crate::session::SessionToken;

pub(crate) const PRODUCTION_DOMAIN: &str = "pay.coinbase.com";
pub(crate) const SANDBOX_DOMAIN: &str = "pay-sandbox.coinbase.com";

const ONRAMP_PATH: &str = "/buy/select-asset";
const OFFRAMP_PATH: &str = "/v3/sell/input";

/// Query parameters the widget accepts, beyond the session token itself.
pub(crate) const ALLOWED_QUERY_PARAMS: [&str; 7] = [
    "defaultNetwork",
    "defaultAsset",
    "fiatCurrency",
    "presetFiatAmount",
    "presetCryptoAmount",
    "partnerUserId",
    "redirectUrl",
];

pub(crate) fn build_widget_url(
    kind: RampKind,
    testnet: bool,
    token: &SessionToken,
    params: &[(&str, String)],
) -> Url {
    let domain = if testnet {
        SANDBOX_DOMAIN
    } else {
        PRODUCTION_DOMAIN
    };
    let path = if testnet {
        ""
    } else {
        match kind {
            RampKind::OnRamp => ONRAMP_PATH,
            RampKind::OffRamp => OFFRAMP_PATH,
        }
    };

    let raw = format!("https://{domain}{path}");
    let mut url = match Url::parse(&raw) {
        Ok(url) => url,
        // Both domains and paths are compile-time constants.
        Err(err) => unreachable!("static widget URL {raw} failed to parse: {err}"),
    };

    url.query_pairs_mut()
        .append_pair("sessionToken", token.as_str());
    for (key, value) in params {
        if !value.is_empty() && ALLOWED_QUERY_PARAMS.contains(key) {
            url.query_pairs_mut().append_pair(key, value);
        }
    }

    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn query_map(url: &Url) -> HashMap<String, String> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn sandbox_offramp_drops_path_and_unknown_params() {
        let token = SessionToken::new("tok");
        let url = build_widget_url(
            RampKind::OffRamp,
            true,
            &token,
            &[
                ("defaultAsset", "USDC".to_string()),
                ("presetCryptoAmount", "50".to_string()),
                ("foo", "bar".to_string()),
            ],
        );

        assert_eq!(url.host_str(), Some(SANDBOX_DOMAIN));
        assert_eq!(url.path(), "/");

        let query = query_map(&url);
        assert_eq!(query.get("sessionToken").map(String::as_str), Some("tok"));
        assert_eq!(query.get("defaultAsset").map(String::as_str), Some("USDC"));
        assert_eq!(
            query.get("presetCryptoAmount").map(String::as_str),
            Some("50")
        );
        assert!(!query.contains_key("foo"));
    }

    #[test]
    fn production_paths_differ_per_operation() {
        let token = SessionToken::new("tok");

        let onramp = build_widget_url(RampKind::OnRamp, false, &token, &[]);
        assert_eq!(onramp.host_str(), Some(PRODUCTION_DOMAIN));
        assert_eq!(onramp.path(), "/buy/select-asset");

        let offramp = build_widget_url(RampKind::OffRamp, false, &token, &[]);
        assert_eq!(offramp.path(), "/v3/sell/input");
    }

    #[test]
    fn empty_values_are_dropped() {
        let token = SessionToken::new("tok");
        let url = build_widget_url(
            RampKind::OnRamp,
            true,
            &token,
            &[
                ("partnerUserId", String::new()),
                ("redirectUrl", String::new()),
                ("presetFiatAmount", "100".to_string()),
            ],
        );

        let query = query_map(&url);
        assert!(!query.contains_key("partnerUserId"));
        assert!(!query.contains_key("redirectUrl"));
        assert_eq!(query.get("presetFiatAmount").map(String::as_str), Some("100"));
    }
}
