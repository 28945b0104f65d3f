//! Data models for Phylactery

pub mod account;
pub mod blog;
pub mod borrow;
pub mod enums;
pub mod external;
pub mod item;
pub mod member;
pub mod rank;
pub mod reservation;
pub mod tag;

// Re-export commonly used types
pub use account::{Account, SessionClaims};
pub use blog::{BlogPost, EmailOrder};
pub use borrow::BorrowRecord;
pub use enums::{ApprovalStatus, EmailAudience, FormStatus, ItemType, RankName};
pub use external::{ExternalBorrowingForm, ExternalBorrowingItemRecord};
pub use item::{AvailabilityInfo, Item};
pub use member::{Member, Membership, MemberStatus};
pub use rank::{ActiveRanks, RankAssignment, Tier};
pub use reservation::Reservation;
pub use tag::Tag;
