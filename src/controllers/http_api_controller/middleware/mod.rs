mod auth;

pub use auth::{Principal, PrincipalLayer, ROLES_HEADER};
