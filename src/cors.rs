use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::{Request, Response};

const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization, Stripe-Signature";

/// Adds `Access-Control-Allow-*` headers for allowed origins and answers
/// preflight requests with 204.
pub struct Cors {
    allowed: Vec<String>,
    preview_suffix: String,
}

impl Cors {
    pub fn new(allowed: Vec<String>, preview_suffix: &str) -> Self {
        Cors {
            allowed,
            preview_suffix: preview_suffix.to_string(),
        }
    }

    /// Exact list match, or an https Netlify deploy of the site
    /// (`<name>--<site>.netlify.app`).
    pub fn is_allowed(&self, origin: &str) -> bool {
        if self.allowed.iter().any(|o| o == origin) {
            return true;
        }
        match origin.strip_prefix("https://") {
            Some(host) if !self.preview_suffix.is_empty() => {
                host == self.preview_suffix
                    || host
                        .strip_suffix(self.preview_suffix.as_str())
                        .map_or(false, |prefix| prefix.len() > 2 && prefix.ends_with("--"))
            }
            _ => false,
        }
    }
}

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let origin = match req.headers().get_one("Origin") {
            Some(o) if self.is_allowed(o) => o.to_string(),
            Some(o) => {
                log::debug!("[cors] origin not allowed: {}", o);
                return;
            }
            None => return,
        };

        res.set_header(Header::new("Access-Control-Allow-Origin", origin));
        res.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
        res.set_header(Header::new("Access-Control-Allow-Methods", ALLOW_METHODS));
        res.set_header(Header::new("Access-Control-Allow-Headers", ALLOW_HEADERS));
        res.set_header(Header::new("Vary", "Origin"));
    }
}

/// Catch-all preflight route.
#[options("/<_..>")]
pub fn preflight() -> Status {
    Status::NoContent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_ALLOWED_ORIGINS, NETLIFY_PREVIEW_SUFFIX};

    fn cors() -> Cors {
        Cors::new(
            DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect(),
            NETLIFY_PREVIEW_SUFFIX,
        )
    }

    #[test]
    fn exact_origins_are_allowed() {
        let c = cors();
        assert!(c.is_allowed("https://smarttrails.pro"));
        assert!(c.is_allowed("http://localhost:5173"));
        assert!(!c.is_allowed("https://smarttrails.pro.evil.com"));
        assert!(!c.is_allowed("http://smarttrails.pro"));
    }

    #[test]
    fn netlify_previews_are_allowed() {
        let c = cors();
        assert!(c.is_allowed(
            "https://feature-test-customize-page--delightful-croquembouche-cafa23.netlify.app"
        ));
        assert!(c.is_allowed("https://delightful-croquembouche-cafa23.netlify.app"));
        assert!(!c.is_allowed("https://evil-delightful-croquembouche-cafa23.netlify.app"));
        assert!(!c.is_allowed("http://x--delightful-croquembouche-cafa23.netlify.app"));
    }
}
