//! Satchel Session State
//!
//! A key/value session layered over a string item store:
//! - The root session persists its whole bag under one storage key
//! - Every write goes through an identity check; the first write starts the session
//! - Expiring and flash tiers nest their bags inside the root bag
//! - The non-persisting tier lives in a separate, shorter-lived store
//! - Listeners observe changes per key

mod clock;
mod error;
mod events;
mod expiring;
mod flash;
mod identity;
mod non_persisting;
mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SessionError;
pub use events::{ChangeEvent, ListenerId, StateEventHandler};
pub use expiring::{ExpiringSession, ExpiryEntry, EXPIRING_SESSION_KEY};
pub use flash::{FlashSession, FLASH_SESSION_KEY};
pub use identity::{Identity, IdentityGenerator, EPHEMERAL_PREFIX, PERSISTENT_PREFIX};
pub use non_persisting::NonPersistingSession;
pub use session::{
    Session, SessionOptions, DEFAULT_SESSION_KEY, DEFAULT_TOKEN_KEY, RESERVED_KEYS,
    SESSION_ID_KEY, USER_SESSION_KEY,
};

pub use satchel_storage::StateBag;

pub type Result<T> = std::result::Result<T, SessionError>;
