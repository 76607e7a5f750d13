pub mod jwt;

pub use jwt::{Claims, IssuedPair, TokenService};
