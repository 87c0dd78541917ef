use serde::{Deserialize, Serialize};

use crate::config::LogisticsRoles;

/// Identity delivered by the Discord OAuth flow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub discord_id: String,
    #[serde(default)]
    pub discord_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_logistics_staff: bool,
    #[serde(default)]
    pub is_academy_staff: bool,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Role fields returned by `/auth/refresh`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRefresh {
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_logistics_staff: bool,
    #[serde(default)]
    pub is_academy_staff: bool,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl UserIdentity {
    /// Staff flag, or a role named in the logistics set
    pub fn is_logistics_staff(&self, logistics_roles: &LogisticsRoles) -> bool {
        if self.is_staff || self.is_logistics_staff {
            return true;
        }
        self.roles.iter().any(|role| logistics_roles.contains(role))
    }

    /// Serialized role set used to detect changes
    pub fn role_signature(&self) -> String {
        serde_json::json!({
            "isStaff": self.is_staff,
            "isLogisticsStaff": self.is_logistics_staff,
            "isAcademyStaff": self.is_academy_staff,
            "roles": self.roles,
        })
        .to_string()
    }

    /// Overwrite role fields only; returns whether the role set changed
    pub fn merge_roles(&mut self, refresh: RoleRefresh) -> bool {
        let before = self.role_signature();
        self.is_staff = refresh.is_staff;
        self.is_logistics_staff = refresh.is_logistics_staff;
        self.is_academy_staff = refresh.is_academy_staff;
        self.roles = refresh.roles;
        before != self.role_signature()
    }

    /// Account fields only, with every role and staff flag cleared
    pub fn without_privileges(self) -> Self {
        Self {
            is_staff: false,
            is_logistics_staff: false,
            is_academy_staff: false,
            roles: Vec::new(),
            ..self
        }
    }

    pub fn avatar_url(&self) -> Option<String> {
        self.avatar.as_ref().filter(|a| !a.is_empty()).map(|hash| {
            if hash.starts_with("http") {
                hash.clone()
            } else {
                format!(
                    "https://cdn.discordapp.com/avatars/{}/{}.png",
                    self.discord_id, hash
                )
            }
        })
    }
}
