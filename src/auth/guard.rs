use crate::auth::token::Identity;
use crate::db::models::Role;

/// Static classification of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    /// Any authenticated user whose default area is this one; a user
    /// belonging to the other area is sent home instead.
    AuthRequired { area: Role },
    /// Only the named role may enter.
    RoleRestricted(Role),
    /// Only unauthenticated visitors may proceed (login, register pages).
    LoginOnly,
}

/// Whether the caller is a browser (wants redirects) or an API client
/// (wants a machine-readable 403 on wrong role).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerKind {
    Browser,
    Api,
}

/// Outcome of evaluating a request against the route table. Pure data;
/// the host application turns it into an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Proceed,
    /// Send to the login page, preserving the originally requested path
    /// so a successful login can return the user there.
    RedirectToLogin { next: String },
    /// Send to the identity's own default area.
    Redirect { to: String },
    /// Wrong role, API caller: a structured 403 instead of a redirect.
    Forbidden,
}

/// Prefix-matched route classification table. Longest prefix wins;
/// unmatched paths are public, since a storefront's unlisted routes are
/// catalog pages.
pub struct RouteTable {
    routes: Vec<(String, RouteClass)>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(vec![
            ("/".into(), RouteClass::Public),
            ("/login".into(), RouteClass::LoginOnly),
            ("/register".into(), RouteClass::LoginOnly),
            ("/account".into(), RouteClass::AuthRequired { area: Role::Customer }),
            ("/orders".into(), RouteClass::AuthRequired { area: Role::Customer }),
            ("/admin".into(), RouteClass::RoleRestricted(Role::Admin)),
        ])
    }
}

impl RouteTable {
    pub fn new(routes: Vec<(String, RouteClass)>) -> Self {
        Self { routes }
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        self.routes
            .iter()
            .filter(|(prefix, _)| path_has_prefix(path, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, class)| *class)
            .unwrap_or(RouteClass::Public)
    }

    /// Evaluates one inbound request. A pure function of (route,
    /// identity); no state survives between requests.
    pub fn evaluate(
        &self,
        path: &str,
        identity: Option<&Identity>,
        caller: CallerKind,
    ) -> AccessDecision {
        match (self.classify(path), identity) {
            (RouteClass::Public, _) => AccessDecision::Proceed,

            (RouteClass::AuthRequired { .. }, None) | (RouteClass::RoleRestricted(_), None) => {
                AccessDecision::RedirectToLogin { next: path.to_string() }
            }

            (RouteClass::AuthRequired { area }, Some(identity)) => {
                if identity.role == area {
                    AccessDecision::Proceed
                } else {
                    // e.g. an administrator visiting a customer-only page
                    AccessDecision::Redirect { to: identity.role.default_area().to_string() }
                }
            }

            (RouteClass::RoleRestricted(role), Some(identity)) => {
                if identity.role == role {
                    AccessDecision::Proceed
                } else {
                    match caller {
                        // Never a bare 403 page for browsers
                        CallerKind::Browser => AccessDecision::Redirect {
                            to: identity.role.default_area().to_string(),
                        },
                        CallerKind::Api => AccessDecision::Forbidden,
                    }
                }
            }

            (RouteClass::LoginOnly, Some(identity)) => {
                AccessDecision::Redirect { to: identity.role.default_area().to_string() }
            }
            (RouteClass::LoginOnly, None) => AccessDecision::Proceed,
        }
    }
}

/// `/admin` matches `/admin` and `/admin/orders` but not `/administrator`.
fn path_has_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn customer() -> Identity {
        Identity { user_id: Uuid::new_v4(), email: "c@x.com".into(), role: Role::Customer }
    }

    fn admin() -> Identity {
        Identity { user_id: Uuid::new_v4(), email: "a@x.com".into(), role: Role::Admin }
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = RouteTable::default();
        assert_eq!(table.classify("/"), RouteClass::Public);
        assert_eq!(table.classify("/products/42"), RouteClass::Public);
        assert_eq!(table.classify("/admin"), RouteClass::RoleRestricted(Role::Admin));
        assert_eq!(table.classify("/admin/orders"), RouteClass::RoleRestricted(Role::Admin));
        assert_eq!(
            table.classify("/account/settings"),
            RouteClass::AuthRequired { area: Role::Customer }
        );
    }

    #[test]
    fn test_prefix_does_not_match_mid_segment() {
        let table = RouteTable::default();
        // Not the admin area, falls back to public
        assert_eq!(table.classify("/administrator"), RouteClass::Public);
    }

    #[test]
    fn test_public_always_proceeds() {
        let table = RouteTable::default();
        assert_eq!(table.evaluate("/products", None, CallerKind::Browser), AccessDecision::Proceed);
        assert_eq!(
            table.evaluate("/products", Some(&admin()), CallerKind::Browser),
            AccessDecision::Proceed
        );
    }

    #[test]
    fn test_unauthenticated_redirects_to_login_preserving_path() {
        let table = RouteTable::default();
        assert_eq!(
            table.evaluate("/account/settings", None, CallerKind::Browser),
            AccessDecision::RedirectToLogin { next: "/account/settings".into() }
        );
        assert_eq!(
            table.evaluate("/admin/orders", None, CallerKind::Browser),
            AccessDecision::RedirectToLogin { next: "/admin/orders".into() }
        );
    }

    #[test]
    fn test_wrong_role_browser_redirects_to_own_area() {
        let table = RouteTable::default();
        // Customer at an admin-only route: redirected home, never a 403 page
        assert_eq!(
            table.evaluate("/admin", Some(&customer()), CallerKind::Browser),
            AccessDecision::Redirect { to: "/account".into() }
        );
    }

    #[test]
    fn test_wrong_role_api_gets_forbidden() {
        let table = RouteTable::default();
        assert_eq!(
            table.evaluate("/admin", Some(&customer()), CallerKind::Api),
            AccessDecision::Forbidden
        );
    }

    #[test]
    fn test_admin_in_customer_area_redirects_to_admin_area() {
        let table = RouteTable::default();
        assert_eq!(
            table.evaluate("/account", Some(&admin()), CallerKind::Browser),
            AccessDecision::Redirect { to: "/admin".into() }
        );
    }

    #[test]
    fn test_login_only_routes() {
        let table = RouteTable::default();
        assert_eq!(table.evaluate("/login", None, CallerKind::Browser), AccessDecision::Proceed);
        assert_eq!(
            table.evaluate("/login", Some(&customer()), CallerKind::Browser),
            AccessDecision::Redirect { to: "/account".into() }
        );
        assert_eq!(
            table.evaluate("/register", Some(&admin()), CallerKind::Browser),
            AccessDecision::Redirect { to: "/admin".into() }
        );
    }

    #[test]
    fn test_matching_roles_proceed() {
        let table = RouteTable::default();
        assert_eq!(
            table.evaluate("/admin", Some(&admin()), CallerKind::Browser),
            AccessDecision::Proceed
        );
        assert_eq!(
            table.evaluate("/account", Some(&customer()), CallerKind::Browser),
            AccessDecision::Proceed
        );
    }
}
