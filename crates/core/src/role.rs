// Business roles and role allow-lists
//
// Roles are a closed set: unknown role strings are rejected, never defaulted.
// A RoleSet is the allow-list attached to a role-gated route. The empty set is
// a legal value and admits nobody.

use serde::de::Deserializer;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Business role of an identity.
/// - `admin`: full access, including user management
/// - `manager`: every business section
/// - `sales`: customers and quotations
/// - `storekeeper`: stock
/// - `accountant`: cash flow reporting
/// - `cashier`: cash flow entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Sales,
    Storekeeper,
    Accountant,
    Cashier,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Manager,
        Role::Sales,
        Role::Storekeeper,
        Role::Accountant,
        Role::Cashier,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Sales => "sales",
            Role::Storekeeper => "storekeeper",
            Role::Accountant => "accountant",
            Role::Cashier => "cashier",
        }
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known role.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown role: {0}")]
pub struct RoleParseError(pub String);

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "sales" => Ok(Role::Sales),
            "storekeeper" => Ok(Role::Storekeeper),
            "accountant" => Ok(Role::Accountant),
            "cashier" => Ok(Role::Cashier),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

/// Set of roles permitted on a route.
///
/// Serialized as a list of role names.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RoleSet(u8);

impl RoleSet {
    /// Admits nobody.
    pub const EMPTY: RoleSet = RoleSet(0);

    /// Build a set at compile time, e.g. for route declarations.
    pub const fn of(roles: &[Role]) -> Self {
        let mut bits = 0u8;
        let mut i = 0;
        while i < roles.len() {
            bits |= roles[i].bit();
            i += 1;
        }
        RoleSet(bits)
    }

    pub fn all() -> Self {
        Self::of(&Role::ALL)
    }

    pub const fn contains(&self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn insert(&mut self, role: Role) {
        self.0 |= role.bit();
    }

    pub fn remove(&mut self, role: Role) {
        self.0 &= !role.bit();
    }

    /// Roles in the set, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        Role::ALL.into_iter().filter(move |role| self.contains(*role))
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        let mut set = RoleSet::EMPTY;
        for role in iter {
            set.insert(role);
        }
        set
    }
}

impl fmt::Debug for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(nobody)");
        }
        let names: Vec<&str> = self.iter().map(|role| role.as_str()).collect();
        f.write_str(&names.join(", "))
    }
}

impl Serialize for RoleSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for role in self.iter() {
            seq.serialize_element(&role)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let roles = Vec::<Role>::deserialize(deserializer)?;
        Ok(roles.into_iter().collect())
    }
}
