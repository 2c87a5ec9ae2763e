// ABOUTME: Container environment values with host environment interpolation.
// ABOUTME: Values are resolved at deploy time so secrets never reach the state file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
}

impl EnvValue {
    /// Resolve to a concrete value, or the name of the missing variable.
    pub fn resolve(&self) -> Result<String, String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromEnv { var, default } => std::env::var(var)
                .ok()
                .or_else(|| default.clone())
                .ok_or_else(|| var.clone()),
        }
    }
}

/// Resolve every value; fails with the first missing variable name.
pub fn resolve_env_map(map: &HashMap<String, EnvValue>) -> Result<HashMap<String, String>, String> {
    map.iter()
        .map(|(k, v)| v.resolve().map(|resolved| (k.clone(), resolved)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_literals_env_and_defaults() {
        let mut env = HashMap::new();
        env.insert("MODE".to_string(), EnvValue::Literal("prod".to_string()));
        env.insert(
            "TOKEN".to_string(),
            EnvValue::FromEnv {
                var: "ZEROSHIFT_TEST_TOKEN".to_string(),
                default: None,
            },
        );
        env.insert(
            "REGION".to_string(),
            EnvValue::FromEnv {
                var: "ZEROSHIFT_TEST_MISSING".to_string(),
                default: Some("eu".to_string()),
            },
        );

        temp_env::with_var("ZEROSHIFT_TEST_TOKEN", Some("s3cret"), || {
            let resolved = resolve_env_map(&env).unwrap();
            assert_eq!(resolved["MODE"], "prod");
            assert_eq!(resolved["TOKEN"], "s3cret");
            assert_eq!(resolved["REGION"], "eu");
        });
    }

    #[test]
    fn missing_variable_is_named() {
        let value = EnvValue::FromEnv {
            var: "ZEROSHIFT_TEST_ABSENT".to_string(),
            default: None,
        };
        temp_env::with_var_unset("ZEROSHIFT_TEST_ABSENT", || {
            assert_eq!(value.resolve(), Err("ZEROSHIFT_TEST_ABSENT".to_string()));
        });
    }
}
