pub mod claims;
pub mod extract;
pub mod password;
pub mod tokens;

pub use claims::Claims;
pub use extract::{CurrentUser, MaybeAuth, RequireAuth, RequireClient, RequireTechnician, RequireVerifiedTechnician};
pub use tokens::{TokenError, TokenService};
