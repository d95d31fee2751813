//! Session cookie settings read from the environment.
//!
//! Debug builds fall back to permissive defaults with a warning; release
//! builds require every toggle to be set explicitly and valid.

use std::path::PathBuf;

use actix_web::cookie::{Key, SameSite};
use mockable::Env;
use tracing::warn;
use zeroize::Zeroizing;

const SESSION_KEY_DEFAULT_PATH: &str = "/var/run/secrets/session_key";
const SESSION_KEY_MIN_LEN: usize = 64;
const KEY_FILE_ENV: &str = "SESSION_KEY_FILE";
const COOKIE_SECURE_ENV: &str = "SESSION_COOKIE_SECURE";
const SAMESITE_ENV: &str = "SESSION_SAMESITE";
const ALLOW_EPHEMERAL_ENV: &str = "SESSION_ALLOW_EPHEMERAL";
const BOOL_EXPECTED: &str = "1|0|true|false|yes|no|y|n";
const SAMESITE_EXPECTED: &str = "Strict|Lax|None";

/// How strictly settings are validated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildMode {
    Debug,
    Release,
}

impl BuildMode {
    #[must_use]
    pub fn from_debug_assertions() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Release
        }
    }
}

/// Validated cookie settings.
pub struct SessionSettings {
    /// Signing and encryption key for the private cookie.
    pub key: Key,
    pub cookie_secure: bool,
    pub same_site: SameSite,
}

#[derive(thiserror::Error, Debug)]
pub enum SessionConfigError {
    #[error("missing required environment variable: {name}")]
    MissingEnv { name: &'static str },
    #[error("invalid value for {name}='{value}'; expected {expected}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("failed to read session key at {path}: {source}")]
    KeyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session key at {path} too short: need >= {min_len} bytes, got {length}")]
    KeyTooShort {
        path: PathBuf,
        length: usize,
        min_len: usize,
    },
    #[error("SESSION_SAMESITE=None requires SESSION_COOKIE_SECURE=1")]
    InsecureSameSiteNone,
    #[error("SESSION_ALLOW_EPHEMERAL must be 0 in release builds")]
    EphemeralNotAllowed,
}

/// One environment toggle with its parser and debug fallback.
struct Toggle<T> {
    name: &'static str,
    expected: &'static str,
    parse: fn(&str) -> Option<T>,
    debug_default: T,
}

impl<T: Copy> Toggle<T> {
    fn read<E: Env>(&self, env: &E, mode: BuildMode) -> Result<T, SessionConfigError> {
        let Some(value) = env.string(self.name) else {
            return match mode {
                BuildMode::Debug => {
                    warn!(name = self.name, "session toggle not set; using debug default");
                    Ok(self.debug_default)
                }
                BuildMode::Release => Err(SessionConfigError::MissingEnv { name: self.name }),
            };
        };
        match ((self.parse)(&value), mode) {
            (Some(parsed), _) => Ok(parsed),
            (None, BuildMode::Debug) => {
                warn!(name = self.name, %value, "invalid session toggle; using debug default");
                Ok(self.debug_default)
            }
            (None, BuildMode::Release) => Err(SessionConfigError::InvalidEnv {
                name: self.name,
                value,
                expected: self.expected,
            }),
        }
    }
}

const COOKIE_SECURE: Toggle<bool> = Toggle {
    name: COOKIE_SECURE_ENV,
    expected: BOOL_EXPECTED,
    parse: parse_bool,
    debug_default: true,
};

const ALLOW_EPHEMERAL: Toggle<bool> = Toggle {
    name: ALLOW_EPHEMERAL_ENV,
    expected: BOOL_EXPECTED,
    parse: parse_bool,
    debug_default: false,
};

const SAME_SITE: Toggle<SameSite> = Toggle {
    name: SAMESITE_ENV,
    expected: SAMESITE_EXPECTED,
    parse: parse_same_site,
    debug_default: SameSite::Lax,
};

/// Build session settings from the environment.
///
/// # Errors
///
/// In release mode, any missing or invalid toggle, an unreadable or short
/// key file, `SameSite=None` without `Secure`, or an ephemeral-key opt-in is
/// an error.
///
/// # Examples
///
/// ```rust
/// use mockable::MockEnv;
/// use tokengate::inbound::http::session_config::{BuildMode, session_settings_from_env};
///
/// let mut env = MockEnv::new();
/// env.expect_string().returning(|_| None);
/// let settings = session_settings_from_env(&env, BuildMode::Debug).expect("debug defaults");
/// assert!(settings.cookie_secure);
/// ```
pub fn session_settings_from_env<E: Env>(
    env: &E,
    mode: BuildMode,
) -> Result<SessionSettings, SessionConfigError> {
    let cookie_secure = COOKIE_SECURE.read(env, mode)?;
    let same_site = SAME_SITE.read(env, mode)?;
    if same_site == SameSite::None && !cookie_secure {
        match mode {
            BuildMode::Release => return Err(SessionConfigError::InsecureSameSiteNone),
            BuildMode::Debug => {
                warn!("SESSION_SAMESITE=None without a secure cookie; browsers may drop it");
            }
        }
    }
    let allow_ephemeral = ALLOW_EPHEMERAL.read(env, mode)?;
    if allow_ephemeral && mode == BuildMode::Release {
        return Err(SessionConfigError::EphemeralNotAllowed);
    }
    let key = session_key(env, mode, allow_ephemeral)?;

    Ok(SessionSettings {
        key,
        cookie_secure,
        same_site,
    })
}

fn session_key<E: Env>(
    env: &E,
    mode: BuildMode,
    allow_ephemeral: bool,
) -> Result<Key, SessionConfigError> {
    let path = PathBuf::from(
        env.string(KEY_FILE_ENV)
            .unwrap_or_else(|| SESSION_KEY_DEFAULT_PATH.to_owned()),
    );

    match std::fs::read(&path).map(Zeroizing::new) {
        Ok(bytes) if mode == BuildMode::Release && bytes.len() < SESSION_KEY_MIN_LEN => {
            Err(SessionConfigError::KeyTooShort {
                length: bytes.len(),
                path,
                min_len: SESSION_KEY_MIN_LEN,
            })
        }
        Ok(bytes) => Ok(Key::derive_from(&bytes)),
        Err(error) if mode == BuildMode::Debug || allow_ephemeral => {
            warn!(path = %path.display(), %error, "using temporary session key (dev only)");
            Ok(Key::generate())
        }
        Err(source) => Err(SessionConfigError::KeyRead { path, source }),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn parse_same_site(value: &str) -> Option<SameSite> {
    match value.to_ascii_lowercase().as_str() {
        "lax" => Some(SameSite::Lax),
        "strict" => Some(SameSite::Strict),
        "none" => Some(SameSite::None),
        _ => None,
    }
}
