use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::role::Role;
use crate::error::ApiError;
use crate::store::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-user-role";
pub const MANAGE_GROUPS_HEADER: &str = "x-manage-groups";

/// Caller identity supplied by the upstream gateway. Authentication happens
/// before requests reach this service; the headers are trusted as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub role: Role,
    /// Groups whose projects this caller may see. Ignored for unrestricted
    /// roles.
    pub manage_groups: Vec<i64>,
}

impl Caller {
    /// `None` when the caller may see every group.
    pub fn visible_groups(&self) -> Option<&[i64]> {
        if self.role.is_unrestricted() {
            None
        } else {
            Some(&self.manage_groups)
        }
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|id| *id > 0)
            .ok_or(ApiError::Unauthorized)?;
        let role: Role = header(parts, ROLE_HEADER)
            .and_then(|v| v.parse().ok())
            .ok_or(ApiError::Unauthorized)?;
        let manage_groups = match header(parts, MANAGE_GROUPS_HEADER) {
            Some(raw) => parse_groups(raw).ok_or(ApiError::Unauthorized)?,
            None => Vec::new(),
        };

        Ok(Self {
            user_id,
            role,
            manage_groups,
        })
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    let value = parts.headers.get(name)?.to_str().ok()?.trim();
    if value.is_empty() { None } else { Some(value) }
}

fn parse_groups(raw: &str) -> Option<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role, groups: &[i64]) -> Caller {
        Caller {
            user_id: 1,
            role,
            manage_groups: groups.to_vec(),
        }
    }

    #[test]
    fn parse_groups_accepts_spaces_and_trailing_comma() {
        assert_eq!(parse_groups("1, 2,3,"), Some(vec![1, 2, 3]));
        assert_eq!(parse_groups(""), Some(vec![]));
    }

    #[test]
    fn parse_groups_rejects_garbage() {
        assert_eq!(parse_groups("1,x"), None);
    }

    #[test]
    fn unrestricted_roles_see_all_groups() {
        assert_eq!(caller(Role::Admin, &[3]).visible_groups(), None);
        assert_eq!(caller(Role::Manager, &[]).visible_groups(), None);
    }

    #[test]
    fn restricted_roles_see_manage_groups() {
        assert_eq!(
            caller(Role::GroupManager, &[3, 4]).visible_groups(),
            Some(&[3, 4][..])
        );
        assert_eq!(caller(Role::Member, &[]).visible_groups(), Some(&[][..]));
    }
}
