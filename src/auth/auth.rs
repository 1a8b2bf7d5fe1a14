use crate::error::AppError;
use crate::model::role::{AccessLevel, Role};
use crate::permissions::{self, HasPermissions};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

/// Caller identity with live permissions, inserted by
/// [`crate::auth::middleware::auth_middleware`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
    pub access_level: AccessLevel,
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Missing token".to_string())),
        )
    }
}

impl HasPermissions for AuthUser {
    fn role(&self) -> Role {
        self.role
    }
    fn access_level(&self) -> AccessLevel {
        self.access_level
    }
    fn is_active(&self) -> bool {
        // inactive callers never get past the middleware
        true
    }
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        permissions::is_admin(Some(self))
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin only".to_string()))
        }
    }

    /// Access-level gate for a feature of the feature table.
    pub fn require_feature(&self, feature: &str) -> Result<(), AppError> {
        if permissions::profile_can_access(Some(self), feature) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Your access level does not include {feature}"
            )))
        }
    }

    /// Role gate for a capability of the capability table.
    pub fn require_capability(&self, capability: &str) -> Result<(), AppError> {
        if permissions::role_allows(self.role, capability) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin only".to_string()))
        }
    }

    pub fn can_view_all_customers(&self) -> bool {
        permissions::can_view_all_customers(Some(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn caller(role: Role, access_level: AccessLevel) -> AuthUser {
        AuthUser {
            user_id: 1,
            email: "front@salon.test".to_string(),
            role,
            access_level,
        }
    }

    #[actix_web::test]
    async fn extractor_requires_middleware_identity() {
        let req = TestRequest::default().to_http_request();
        let err = AuthUser::extract(&req).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        req.extensions_mut().insert(caller(Role::User, AccessLevel::Full));
        assert_eq!(AuthUser::extract(&req).await.unwrap().user_id, 1);
    }

    #[test]
    fn restricted_staff_are_gated_by_feature_and_role() {
        let staff = caller(Role::User, AccessLevel::Restricted);
        assert!(staff.require_feature("services").is_ok());
        assert!(staff.require_feature("inventory").is_err());
        assert!(staff.require_capability("manage_customers").is_ok());
        assert!(staff.require_capability("manage_workers").is_err());
        assert!(staff.require_admin().is_err());
        assert!(!staff.can_view_all_customers());
    }
}
