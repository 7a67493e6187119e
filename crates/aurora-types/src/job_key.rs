//! Job keys: `cluster/role` for listing, `cluster/role/environment/name` for everything else.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Render a role key (`cluster/role`).
pub fn make_role_key(cluster: &str, role: &str) -> String {
    format!("{}/{}", cluster, role)
}

/// Render a full job key (`cluster/role/environment/name`).
pub fn make_full_key(cluster: &str, role: &str, environment: &str, name: &str) -> String {
    format!("{}/{}/{}/{}", cluster, role, environment, name)
}

/// Identity of a job (full key) or of a role's job set (role key).
///
/// Environment and name are either both present or both absent. Segments are
/// not validated: a segment containing `/` renders into an ambiguous key and is
/// passed through as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawJobKey")]
pub struct JobKey {
    cluster: String,
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl JobKey {
    pub fn role(cluster: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            role: role.into(),
            environment: None,
            name: None,
        }
    }

    pub fn full(
        cluster: impl Into<String>,
        role: impl Into<String>,
        environment: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            role: role.into(),
            environment: Some(environment.into()),
            name: Some(name.into()),
        }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn role_name(&self) -> &str {
        &self.role
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_full(&self) -> bool {
        self.environment.is_some()
    }

    /// Role key of this job (drops environment and name).
    pub fn role_key(&self) -> String {
        make_role_key(&self.cluster, &self.role)
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.environment, &self.name) {
            (Some(env), Some(name)) => {
                f.write_str(&make_full_key(&self.cluster, &self.role, env, name))
            }
            _ => f.write_str(&make_role_key(&self.cluster, &self.role)),
        }
    }
}

#[derive(Deserialize)]
struct RawJobKey {
    cluster: String,
    role: String,
    #[serde(default)]
    environment: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl TryFrom<RawJobKey> for JobKey {
    type Error = String;

    fn try_from(raw: RawJobKey) -> Result<Self, Self::Error> {
        match (raw.environment, raw.name) {
            (Some(env), Some(name)) => Ok(JobKey::full(raw.cluster, raw.role, env, name)),
            (None, None) => Ok(JobKey::role(raw.cluster, raw.role)),
            _ => Err("partial job key: environment and name must be given together".to_string()),
        }
    }
}
