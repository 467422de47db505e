// Route declarations
//
// Associates each application path with the gate protecting it. Shared by the
// server's page middleware and the CLI navigator, and loadable from YAML:
//
//   - path: /customers
//     title: Customers
//     guard: roles
//     roles: [admin, manager, sales]
//
// Decision: A `roles` guard with no `roles` list deserializes to the empty set
// and therefore admits nobody. "Any logged-in user" is spelled `authenticated`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::RouteConfigError;
use crate::role::{Role, RoleSet};

/// What a route demands before it may render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "guard", rename_all = "snake_case")]
pub enum RouteGuard {
    /// Open to everyone, including while the session initializes.
    Public,
    /// Any logged-in identity.
    Authenticated,
    /// Logged-in identities whose role is on the list.
    Roles {
        #[serde(default)]
        roles: RoleSet,
    },
}

impl std::fmt::Display for RouteGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteGuard::Public => write!(f, "public"),
            RouteGuard::Authenticated => write!(f, "authenticated"),
            RouteGuard::Roles { roles } => write!(f, "roles: {}", roles),
        }
    }
}

/// A single declared route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDeclaration {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub guard: RouteGuard,
}

impl RouteDeclaration {
    pub fn new(path: impl Into<String>, guard: RouteGuard) -> Self {
        Self {
            path: path.into(),
            title: None,
            guard,
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn matches(&self, path: &str) -> bool {
        if self.path == "/" {
            return path == "/";
        }
        path == self.path
            || (path.starts_with(&self.path) && path[self.path.len()..].starts_with('/'))
    }
}

const SALES_DESK: RoleSet = RoleSet::of(&[Role::Admin, Role::Manager, Role::Sales]);
const WAREHOUSE: RoleSet = RoleSet::of(&[Role::Admin, Role::Manager, Role::Storekeeper]);
const TREASURY: RoleSet = RoleSet::of(&[
    Role::Admin,
    Role::Manager,
    Role::Accountant,
    Role::Cashier,
]);
const ADMINISTRATION: RoleSet = RoleSet::of(&[Role::Admin]);

/// The set of declared routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<RouteDeclaration>,
}

impl RouteTable {
    /// Validate and build a table. Paths must start with `/` and be unique.
    pub fn from_declarations(routes: Vec<RouteDeclaration>) -> Result<Self, RouteConfigError> {
        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(routes.len());
        for mut route in routes {
            if !route.path.starts_with('/') {
                return Err(RouteConfigError::InvalidPath(route.path));
            }
            route.path = normalize(&route.path).to_string();
            if !seen.insert(route.path.clone()) {
                return Err(RouteConfigError::DuplicatePath(route.path));
            }
            normalized.push(route);
        }
        Ok(Self { routes: normalized })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, RouteConfigError> {
        let routes: Vec<RouteDeclaration> = serde_yaml::from_str(yaml)?;
        Self::from_declarations(routes)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RouteConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Sections of the business application and who may open them.
    pub fn business_default() -> Self {
        Self {
            routes: vec![
                RouteDeclaration::new("/login", RouteGuard::Public).titled("Sign in"),
                RouteDeclaration::new("/unauthorized", RouteGuard::Public).titled("Access denied"),
                RouteDeclaration::new("/", RouteGuard::Authenticated).titled("Dashboard"),
                RouteDeclaration::new("/profile", RouteGuard::Authenticated).titled("My profile"),
                RouteDeclaration::new("/customers", RouteGuard::Roles { roles: SALES_DESK })
                    .titled("Customers"),
                RouteDeclaration::new("/quotations", RouteGuard::Roles { roles: SALES_DESK })
                    .titled("Quotations"),
                RouteDeclaration::new("/stock", RouteGuard::Roles { roles: WAREHOUSE })
                    .titled("Stock"),
                RouteDeclaration::new("/cash-flow", RouteGuard::Roles { roles: TREASURY })
                    .titled("Cash flow"),
                RouteDeclaration::new(
                    "/users",
                    RouteGuard::Roles {
                        roles: ADMINISTRATION,
                    },
                )
                .titled("Users"),
            ],
        }
    }

    /// The most specific declaration covering `path`.
    ///
    /// Query string and fragment are ignored; `/customers/42` is covered by
    /// `/customers`. The root route only covers `/` itself.
    pub fn lookup(&self, path: &str) -> Option<&RouteDeclaration> {
        let path = normalize(strip_query(path));
        self.routes
            .iter()
            .filter(|route| route.matches(path))
            .max_by_key(|route| route.path.len())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteDeclaration> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::business_default()
    }
}

fn strip_query(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_exact_and_nested() {
        let table = RouteTable::business_default();

        let route = table.lookup("/customers").unwrap();
        assert_eq!(route.path, "/customers");

        let route = table.lookup("/customers/42/edit?tab=contacts").unwrap();
        assert_eq!(route.path, "/customers");

        let route = table.lookup("/stock/").unwrap();
        assert_eq!(route.path, "/stock");
    }

    #[test]
    fn test_lookup_respects_segment_boundaries() {
        let table = RouteTable::business_default();
        assert!(table.lookup("/customersx").is_none());
        assert!(table.lookup("/nowhere").is_none());
        assert_eq!(table.lookup("/").unwrap().path, "/");
        assert_eq!(table.lookup("/?welcome=1").unwrap().path, "/");
    }

    #[test]
    fn test_business_default_guards() {
        let table = RouteTable::business_default();
        assert_eq!(table.lookup("/login").unwrap().guard, RouteGuard::Public);
        assert_eq!(table.lookup("/").unwrap().guard, RouteGuard::Authenticated);
        match table.lookup("/users").unwrap().guard {
            RouteGuard::Roles { roles } => assert_eq!(roles, RoleSet::of(&[Role::Admin])),
            other => panic!("unexpected guard {:?}", other),
        }
        match table.lookup("/cash-flow").unwrap().guard {
            RouteGuard::Roles { roles } => {
                assert!(roles.contains(Role::Cashier));
                assert!(!roles.contains(Role::Sales));
            }
            other => panic!("unexpected guard {:?}", other),
        }
    }

    #[test]
    fn test_yaml_declarations() {
        let yaml = r#"
- path: /login
  guard: public
- path: /reports/
  title: Reports
  guard: roles
  roles: [accountant, manager]
- path: /archive
  guard: roles
"#;
        let table = RouteTable::from_yaml_str(yaml).unwrap();
        assert_eq!(table.len(), 3);

        let reports = table.lookup("/reports/2024").unwrap();
        assert_eq!(reports.path, "/reports");
        assert_eq!(reports.title.as_deref(), Some("Reports"));
        assert_eq!(
            reports.guard,
            RouteGuard::Roles {
                roles: RoleSet::of(&[Role::Accountant, Role::Manager])
            }
        );

        // Omitted list admits nobody.
        assert_eq!(
            table.lookup("/archive").unwrap().guard,
            RouteGuard::Roles {
                roles: RoleSet::EMPTY
            }
        );
    }

    #[test]
    fn test_yaml_rejects_bad_declarations() {
        let duplicate = "- path: /stock\n  guard: public\n- path: /stock/\n  guard: authenticated\n";
        assert!(matches!(
            RouteTable::from_yaml_str(duplicate),
            Err(RouteConfigError::DuplicatePath(p)) if p == "/stock"
        ));

        let relative = "- path: stock\n  guard: public\n";
        assert!(matches!(
            RouteTable::from_yaml_str(relative),
            Err(RouteConfigError::InvalidPath(_))
        ));

        let unknown_role = "- path: /stock\n  guard: roles\n  roles: [owner]\n";
        assert!(matches!(
            RouteTable::from_yaml_str(unknown_role),
            Err(RouteConfigError::Parse(_))
        ));

        let unknown_guard = "- path: /stock\n  guard: everyone\n";
        assert!(RouteTable::from_yaml_str(unknown_guard).is_err());
    }

    #[test]
    fn test_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.yaml");
        std::fs::write(&path, "- path: /\n  guard: authenticated\n").unwrap();

        let table = RouteTable::from_yaml_file(&path).unwrap();
        assert_eq!(table.lookup("/").unwrap().guard, RouteGuard::Authenticated);

        assert!(matches!(
            RouteTable::from_yaml_file(dir.path().join("missing.yaml")),
            Err(RouteConfigError::Io(_))
        ));
    }
}
