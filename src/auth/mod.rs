//! Bearer-token authentication core.
//!
//! - `codec`: HS512 compact tokens, with distinct decode failures.
//! - `revocation`: revoked token ids until their natural expiry.
//! - `lockout`: failed-attempt counting and time-bounded locks.
//! - `gate`: the per-request pipeline producing an `AuthenticationDecision`.
//! - `issuer`: access/refresh pairs for logins, access reissue for refresh.
//! - `credentials`: password login against a `PrincipalStore`.

pub mod clock;
pub mod codec;
pub mod config;
pub mod cookie;
pub mod credentials;
pub mod error;
pub mod gate;
pub mod issuer;
pub mod key;
pub mod lockout;
pub mod postgres;
pub mod principal;
pub mod revocation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{DecodeError, IssuedToken, TokenClaims, TokenCodec, TokenKind, TokenLifetimes};
pub use config::{AuthConfig, ConfigError, CookieSettings};
pub use credentials::{hash_password, hash_password_with, Authenticator};
pub use error::{AuthError, StoreError};
pub use gate::{AuthenticatedPrincipal, AuthenticationDecision, AuthenticationGate, GateOutcome};
pub use issuer::{TokenIssuer, TokenPair};
pub use key::{KeyError, SigningKey};
pub use lockout::{LockState, LockStatus, LockoutPolicy};
pub use postgres::PgPrincipalStore;
pub use principal::{InMemoryPrincipalStore, Principal, PrincipalStore, ADMIN_ROLE};
pub use revocation::{spawn_sweeper, InMemoryRevocationStore, RevocationStore};
