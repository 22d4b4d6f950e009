//! User accounts (`core.user`).
//!
//! Stored passwords carry their algorithm as a prefix: `{plain}secret` or
//! `{argon2}m=19456,t=2,p=1$<salt>$<hash>` (salt and hash are unpadded
//! base64). Writing `newpassword` on a node replaces `password` with its
//! Argon2id hash during the pre-insert/pre-update hooks.

use std::sync::LazyLock;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use rand::RngCore;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::handler::{decode_typed, encode, load_typed};
use crate::{HookContext, ModelError, ModelResult, Node, NodeHandler, ValidationErrors};

const NODE_TYPE: &str = "core.user";

const SALT_SIZE: usize = 16;
const HASH_SIZE: usize = 32;

const VALID_ALGORITHMS: [&str; 2] = ["plain", "argon2"];

/// Upper bound for the Argon2 time cost taken from node metadata.
const MAX_TIME_COST: u32 = 10;

static PASSWORD_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\{([A-Za-z0-9]+)\}(.*)$").expect("valid password pattern"));

static EMAIL_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("valid email pattern")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub login: String,
    pub name: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub gender: String,
    pub locale: String,
    pub timezone: String,
    pub roles: Vec<String>,
    pub enabled: bool,
    pub locked: bool,
    pub expired: bool,
    pub password: String,
    /// Plain-text replacement password; hashed into `password` on save.
    #[serde(rename = "newpassword", skip_serializing_if = "String::is_empty")]
    pub new_password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserMeta {
    /// Argon2 time cost used for the next hash.
    pub password_cost: u32,
    pub password_algo: String,
}

impl Default for UserMeta {
    fn default() -> Self {
        Self {
            password_cost: PasswordParams::default().time_cost,
            password_algo: "argon2".to_string(),
        }
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for PasswordParams {
    fn default() -> Self {
        // OWASP baseline for Argon2id
        Self {
            memory_cost: 19 * 1024,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl PasswordParams {
    /// Cheap parameters for tests and fixtures.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn encode(&self) -> String {
        format!("m={},t={},p={}", self.memory_cost, self.time_cost, self.parallelism)
    }

    fn decode(raw: &str) -> Option<Self> {
        let mut params = Self::default();
        for part in raw.split(',') {
            let (key, value) = part.split_once('=')?;
            let value: u32 = value.parse().ok()?;
            match key {
                "m" => params.memory_cost = value,
                "t" => params.time_cost = value,
                "p" => params.parallelism = value,
                _ => return None,
            }
        }
        Some(params)
    }
}

/// User account handler.
#[derive(Debug, Clone, Default)]
pub struct UserHandler {
    params: PasswordParams,
}

impl UserHandler {
    #[must_use]
    pub fn with_params(params: PasswordParams) -> Self {
        Self { params }
    }

    fn update_password(&self, node: &mut Node) -> ModelResult<()> {
        let (mut user, mut meta) =
            decode_typed::<User, UserMeta>(NODE_TYPE, node.data.clone(), node.meta.clone())?;

        if user.new_password.is_empty() {
            return Ok(());
        }

        let params = PasswordParams {
            time_cost: meta.password_cost.clamp(1, MAX_TIME_COST),
            ..self.params
        };
        user.password = hash_password(&user.new_password, &params)?;
        user.new_password.clear();
        meta.password_algo = "argon2".to_string();
        meta.password_cost = params.time_cost;

        node.data = encode(NODE_TYPE, &user)?;
        node.meta = encode(NODE_TYPE, &meta)?;
        Ok(())
    }
}

impl NodeHandler for UserHandler {
    fn get_struct(&self) -> (Value, Value) {
        let meta = UserMeta {
            password_cost: self.params.time_cost,
            ..UserMeta::default()
        };
        (
            encode(NODE_TYPE, &User::default()).unwrap_or_default(),
            encode(NODE_TYPE, &meta).unwrap_or_default(),
        )
    }

    fn load(&self, data: Value, meta: Value) -> ModelResult<(Value, Value)> {
        load_typed::<User, UserMeta>(NODE_TYPE, data, meta)
    }

    fn validate(&self, node: &Node, errors: &mut ValidationErrors) {
        let user: User = match node.data_as() {
            Ok(user) => user,
            Err(e) => {
                errors.add_error("data", format!("Invalid user payload: {e}"));
                return;
            }
        };

        if user.login.is_empty() {
            errors.add_error("data.login", "Login cannot be empty");
        }

        if user.name.is_empty() {
            errors.add_error("data.name", "Name cannot be empty");
        }

        if user.password.is_empty() {
            if user.new_password.is_empty() {
                errors.add_error("data.password", "Password cannot be empty");
            }
        } else {
            match split_password(&user.password) {
                None => errors.add_error("data.password", "Invalid password format"),
                Some((algo, _)) if !VALID_ALGORITHMS.contains(&algo) => {
                    errors.add_error("data.password", "Invalid algorithm selected");
                }
                Some(_) => {}
            }
        }

        if !user.email.is_empty() && !is_email(&user.email) {
            errors.add_error("data.email", "Email is not valid");
        }

        if !user.gender.is_empty() && user.gender != "m" && user.gender != "f" {
            errors.add_error("data.gender", "Invalid gender code");
        }
    }

    fn pre_insert(&self, node: &mut Node, _ctx: &dyn HookContext) -> ModelResult<()> {
        self.update_password(node)
    }

    fn pre_update(&self, node: &mut Node, _ctx: &dyn HookContext) -> ModelResult<()> {
        self.update_password(node)
    }
}

/// Splits `{algo}value` into its parts.
fn split_password(stored: &str) -> Option<(&str, &str)> {
    let captures = PASSWORD_FORMAT.captures(stored)?;
    Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
}

fn is_email(email: &str) -> bool {
    EMAIL_FORMAT.is_match(email)
}

fn derive(password: &str, salt: &[u8], params: &PasswordParams) -> ModelResult<[u8; HASH_SIZE]> {
    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(HASH_SIZE),
    )
    .map_err(|e| ModelError::Password(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut out = [0u8; HASH_SIZE];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut out)
        .map_err(|e| ModelError::Password(e.to_string()))?;
    Ok(out)
}

/// Hashes `password` into the `{argon2}...` stored form.
pub fn hash_password(password: &str, params: &PasswordParams) -> ModelResult<String> {
    let mut salt = [0u8; SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    let hash = derive(password, &salt, params)?;

    Ok(format!(
        "{{argon2}}{}${}${}",
        params.encode(),
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    ))
}

/// Checks `candidate` against a stored `{algo}value` password.
///
/// Unknown algorithms and malformed stored values never match.
pub fn verify_password(stored: &str, candidate: &str) -> ModelResult<bool> {
    match split_password(stored) {
        Some(("plain", value)) => Ok(value == candidate),
        Some(("argon2", value)) => {
            let mut parts = value.splitn(3, '$');
            let (Some(params), Some(salt), Some(hash)) = (parts.next(), parts.next(), parts.next())
            else {
                return Ok(false);
            };
            let Some(params) = PasswordParams::decode(params) else {
                return Ok(false);
            };
            let (Ok(salt), Ok(expected)) = (STANDARD_NO_PAD.decode(salt), STANDARD_NO_PAD.decode(hash))
            else {
                return Ok(false);
            };
            let actual = derive(candidate, &salt, &params)?;
            Ok(actual.as_slice() == expected.as_slice())
        }
        _ => Ok(false),
    }
}
