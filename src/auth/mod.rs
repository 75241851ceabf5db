//! Authentication: password hashing, access tokens, one-time codes and
//! the request extractors that enforce roles.

pub mod codes;
mod error;
pub mod extract;
pub mod password;
pub mod token;

pub use error::AuthError;
pub use extract::{AdminUser, AuthUser, BuyerUser, SellerUser};
pub use token::{Claims, IssuedToken, TokenKeys};
