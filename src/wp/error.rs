//! Typed errors for origin and Store API calls.
//!
//! The display strings double as user-facing messages: credentials problems,
//! an inactive plugin, and an unreachable origin each get a distinct,
//! actionable message rather than a generic failure.

use thiserror::Error;

/// Errors from the WordPress/WooCommerce resource APIs.
#[derive(Debug, Clone, Error)]
pub enum OriginError {
  /// 401/403: wrong consumer key/secret. Never retried.
  #[error("Origin rejected the API credentials; check the consumer key and secret")]
  Unauthorized,

  /// A wc/ route that should exist returned no-route: the plugin is
  /// deactivated, not the network.
  #[error("WooCommerce REST route missing; the WooCommerce plugin appears to be inactive")]
  PluginInactive,

  /// DNS/connect failures: the origin is not reachable at all.
  #[error("Could not connect to the origin: {0}")]
  NotConnected(String),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Origin returned HTTP {status} for {url}")]
  Http { status: u16, url: String },

  #[error("Failed to parse origin response: {0}")]
  Parse(String),

  #[error("Origin request failed: {0}")]
  Network(String),
}

impl OriginError {
  pub fn from_reqwest(err: reqwest::Error) -> Self {
    if err.is_connect() {
      OriginError::NotConnected(err.to_string())
    } else if err.is_timeout() {
      OriginError::Network(format!("timed out: {}", err))
    } else if err.is_decode() {
      OriginError::Parse(err.to_string())
    } else {
      OriginError::Network(err.to_string())
    }
  }
}

/// Errors from the Store API cart endpoints.
///
/// Known WooCommerce coupon error codes map to specific variants so the UI
/// can show precise messages; unknown codes carry the raw server message.
#[derive(Debug, Clone, Error)]
pub enum StoreApiError {
  /// The whole cart subsystem is unreachable (plugin deactivated or Store
  /// API routes missing). Callers downgrade to a local-only cart.
  #[error("Store API unavailable: {0}")]
  StoreUnavailable(String),

  /// The server never issued a cart token. Distinct from holding a real
  /// token: callers must not fabricate one and press on.
  #[error("The store did not issue a cart session token")]
  TokenNotIssued,

  #[error("Coupon \"{code}\" does not exist")]
  CouponNotFound { code: String },

  #[error("Coupon \"{code}\" has expired")]
  CouponExpired { code: String },

  #[error("Coupon \"{code}\" has reached its usage limit")]
  CouponUsageLimit { code: String },

  #[error("Your cart does not meet the minimum amount for coupon \"{code}\"")]
  CouponMinimumNotMet { code: String },

  #[error("Your cart exceeds the maximum amount for coupon \"{code}\"")]
  CouponMaximumExceeded { code: String },

  #[error("Coupon \"{code}\" is restricted to a different email address")]
  CouponEmailRestricted { code: String },

  #[error("Coupon \"{code}\" is already applied to your cart")]
  CouponAlreadyApplied { code: String },

  /// Unknown error code: the raw server message passes through.
  #[error("{0}")]
  Rejected(String),

  #[error("Store API request failed: {0}")]
  Network(String),
}

/// Error signatures indicating the Store API routes themselves are gone.
const NO_ROUTE_CODES: &[&str] = &["rest_no_route", "woocommerce_rest_authentication_error"];

impl StoreApiError {
  /// Map a WooCommerce error body to a typed error. `code` is the
  /// machine-readable error code; `coupon` the coupon involved, if any.
  pub fn from_error_body(code: &str, message: &str, coupon: Option<&str>) -> Self {
    if NO_ROUTE_CODES.contains(&code) {
      return StoreApiError::StoreUnavailable(message.to_string());
    }

    let coupon_code = || coupon.unwrap_or_default().to_string();
    match code {
      "woocommerce_rest_cart_coupon_does_not_exist" => StoreApiError::CouponNotFound {
        code: coupon_code(),
      },
      "woocommerce_rest_cart_coupon_expired" => StoreApiError::CouponExpired {
        code: coupon_code(),
      },
      "woocommerce_rest_cart_coupon_usage_limit_reached" => StoreApiError::CouponUsageLimit {
        code: coupon_code(),
      },
      "woocommerce_rest_cart_coupon_minimum_amount" => StoreApiError::CouponMinimumNotMet {
        code: coupon_code(),
      },
      "woocommerce_rest_cart_coupon_maximum_amount" => StoreApiError::CouponMaximumExceeded {
        code: coupon_code(),
      },
      "woocommerce_rest_cart_coupon_email_restriction" => StoreApiError::CouponEmailRestricted {
        code: coupon_code(),
      },
      "woocommerce_rest_cart_coupon_already_applied" => StoreApiError::CouponAlreadyApplied {
        code: coupon_code(),
      },
      _ => StoreApiError::Rejected(message.to_string()),
    }
  }

  /// Whether this error means the cart subsystem is gone entirely, as
  /// opposed to one rejected operation.
  pub fn is_store_unavailable(&self) -> bool {
    matches!(self, StoreApiError::StoreUnavailable(_))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_known_coupon_codes_map_to_variants() {
    let err = StoreApiError::from_error_body(
      "woocommerce_rest_cart_coupon_expired",
      "server text",
      Some("SAVE10"),
    );
    assert!(matches!(err, StoreApiError::CouponExpired { ref code } if code == "SAVE10"));
    assert_eq!(err.to_string(), "Coupon \"SAVE10\" has expired");
  }

  #[test]
  fn test_unknown_code_passes_raw_message() {
    let err = StoreApiError::from_error_body("something_new", "Computer says no", None);
    assert_eq!(err.to_string(), "Computer says no");
  }

  #[test]
  fn test_no_route_signature_means_unavailable() {
    let err = StoreApiError::from_error_body("rest_no_route", "No route", None);
    assert!(err.is_store_unavailable());
  }
}
