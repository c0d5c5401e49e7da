pub mod clock;
pub use clock::now_millis;
pub mod url_validation;
pub use url_validation::{UrlValidationError, validate_http_url, validate_realtime_url};
