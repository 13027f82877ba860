use std::fmt;

// ── Defaults ──────────────────────────────────────────

const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
const DEFAULT_OPENAI_INTRO_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MONGODB_DB: &str = "trekai";
const DEFAULT_SQLITE_PATH: &str = "data/trekai.db";
const DEFAULT_SITE_URL: &str = "https://smarttrails.pro";
const DEFAULT_FREE_MONTHLY_GENERATIONS: u32 = 5;
const DEFAULT_ANONYMOUS_HOURLY_GENERATIONS: u32 = 3;

/// Origins allowed when `ALLOWED_ORIGINS` is not set.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "https://smarttrails.pro",
    "https://www.smarttrails.pro",
    "http://localhost:3000",
    "http://localhost:5173",
    "http://localhost:8080",
    "http://127.0.0.1:8080",
];

/// Netlify host suffix whose preview deploys are always allowed.
pub const NETLIFY_PREVIEW_SUFFIX: &str = "delightful-croquembouche-cafa23.netlify.app";

// ── Types ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub intro_model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub project_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub pro_monthly_price: String,
    pub pro_annual_price: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseConfig {
    Mongo { uri: String, db_name: String },
    Sqlite { path: String },
}

impl DatabaseConfig {
    pub fn backend(&self) -> &'static str {
        match self {
            DatabaseConfig::Mongo { .. } => "mongo",
            DatabaseConfig::Sqlite { .. } => "sqlite",
        }
    }
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai: OpenAiConfig,
    pub firebase: FirebaseConfig,
    pub stripe: StripeConfig,
    pub database: DatabaseConfig,
    pub site_url: String,
    pub allowed_origins: Vec<String>,
    pub free_monthly_generations: u32,
    pub anonymous_hourly_generations: u32,
}

/// Every key that was missing or unparsable.
#[derive(Debug, Default, PartialEq)]
pub struct ConfigError {
    pub missing: Vec<String>,
    pub invalid: Vec<String>,
}

impl ConfigError {
    fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing {}", self.missing.join(", ")));
        }
        if !self.invalid.is_empty() {
            parts.push(format!("invalid {}", self.invalid.join(", ")));
        }
        write!(f, "configuration error: {}", parts.join("; "))
    }
}

// ── Loading ───────────────────────────────────────────

struct Reader<F> {
    lookup: F,
    errors: ConfigError,
}

impl<F: Fn(&str) -> Option<String>> Reader<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&mut self, key: &str) -> String {
        match self.get(key) {
            Some(v) => v,
            None => {
                self.errors.missing.push(key.to_string());
                String::new()
            }
        }
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn number<T: std::str::FromStr>(&mut self, key: &str, default: T) -> T {
        match self.get(key) {
            None => default,
            Some(v) => match v.parse() {
                Ok(n) => n,
                Err(_) => {
                    self.errors.invalid.push(key.to_string());
                    default
                }
            },
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut r = Reader {
            lookup,
            errors: ConfigError::default(),
        };

        let openai = OpenAiConfig {
            api_key: r.required("OPENAI_API_KEY"),
            model: r.or("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
            intro_model: r.or("OPENAI_INTRO_MODEL", DEFAULT_OPENAI_INTRO_MODEL),
            base_url: r
                .or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            timeout_secs: r.number("OPENAI_TIMEOUT_SECS", DEFAULT_OPENAI_TIMEOUT_SECS),
        };

        let firebase = FirebaseConfig {
            project_id: r.required("FIREBASE_PROJECT_ID"),
            api_key: r.required("FIREBASE_API_KEY"),
        };

        let stripe = StripeConfig {
            secret_key: r.required("STRIPE_SECRET_KEY"),
            webhook_secret: r.required("STRIPE_WEBHOOK_SECRET"),
            pro_monthly_price: r.or("STRIPE_PRO_PLAN_MONTHLY_ID", ""),
            pro_annual_price: r.or("STRIPE_PRO_PLAN_ANNUAL_ID", ""),
        };

        let database = match r.or("DATABASE_BACKEND", "mongo").to_lowercase().as_str() {
            "sqlite" => DatabaseConfig::Sqlite {
                path: r.or("SQLITE_PATH", DEFAULT_SQLITE_PATH),
            },
            "mongo" | "mongodb" => DatabaseConfig::Mongo {
                uri: r.required("MONGODB_URI"),
                db_name: r.or("MONGODB_DB", DEFAULT_MONGODB_DB),
            },
            _ => {
                r.errors.invalid.push("DATABASE_BACKEND".to_string());
                DatabaseConfig::Sqlite {
                    path: DEFAULT_SQLITE_PATH.to_string(),
                }
            }
        };

        let allowed_origins = match r.get("ALLOWED_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(|o| o.trim().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            None => DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        let config = Config {
            openai,
            firebase,
            stripe,
            database,
            site_url: r
                .or("SITE_URL", DEFAULT_SITE_URL)
                .trim_end_matches('/')
                .to_string(),
            allowed_origins,
            free_monthly_generations: r
                .number("FREE_MONTHLY_GENERATIONS", DEFAULT_FREE_MONTHLY_GENERATIONS),
            anonymous_hourly_generations: r.number(
                "ANONYMOUS_HOURLY_GENERATIONS",
                DEFAULT_ANONYMOUS_HOURLY_GENERATIONS,
            ),
        };

        if r.errors.is_empty() {
            Ok(config)
        } else {
            Err(r.errors)
        }
    }
}
