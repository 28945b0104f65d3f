//! Text-coded domain enums shared by members, library and blog

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Postgres};
use utoipa::ToSchema;

/// Implements string conversions and sqlx TEXT mapping for a code enum.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $code:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }

        impl sqlx::Type<Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> Decode<'r, Postgres> for $name {
            fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s: String = Decode::<Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl Encode<'_, Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as Encode<Postgres>>::encode(self.as_str(), buf)
            }
        }

        impl sqlx::postgres::PgHasArrayType for $name {
            fn array_type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::postgres::PgHasArrayType>::array_type_info()
            }
        }
    };
}

// ---------------------------------------------------------------------------
// RankName
// ---------------------------------------------------------------------------

/// Club ranks. Committee positions are held by one member at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum RankName {
    #[serde(rename = "EXCLUDED")]
    Excluded,
    #[serde(rename = "GATEKEEPER")]
    Gatekeeper,
    #[serde(rename = "WEBKEEPER")]
    Webkeeper,
    #[serde(rename = "COMMITTEE")]
    Committee,
    #[serde(rename = "LIFE-MEMBER")]
    LifeMember,
    #[serde(rename = "PRESIDENT")]
    President,
    #[serde(rename = "VICE-PRESIDENT")]
    VicePresident,
    #[serde(rename = "SECRETARY")]
    Secretary,
    #[serde(rename = "TREASURER")]
    Treasurer,
    #[serde(rename = "LIBRARIAN")]
    Librarian,
    #[serde(rename = "FRESHER-REP")]
    FresherRep,
    #[serde(rename = "OCM")]
    Ocm,
    #[serde(rename = "IPP")]
    Ipp,
}

text_enum!(RankName {
    Excluded => "EXCLUDED",
    Gatekeeper => "GATEKEEPER",
    Webkeeper => "WEBKEEPER",
    Committee => "COMMITTEE",
    LifeMember => "LIFE-MEMBER",
    President => "PRESIDENT",
    VicePresident => "VICE-PRESIDENT",
    Secretary => "SECRETARY",
    Treasurer => "TREASURER",
    Librarian => "LIBRARIAN",
    FresherRep => "FRESHER-REP",
    Ocm => "OCM",
    Ipp => "IPP",
});

impl RankName {
    /// Positions filled through a committee transfer
    pub const COMMITTEE_POSITIONS: &'static [RankName] = &[
        RankName::President,
        RankName::VicePresident,
        RankName::Secretary,
        RankName::Treasurer,
        RankName::Librarian,
        RankName::FresherRep,
        RankName::Ocm,
        RankName::Ipp,
    ];

    pub fn is_committee_position(&self) -> bool {
        Self::COMMITTEE_POSITIONS.contains(self)
    }

    /// Ranks that grant staff access
    pub fn is_staff(&self) -> bool {
        self.is_committee_position() || *self == RankName::Webkeeper
    }

    pub fn label(&self) -> &'static str {
        match self {
            RankName::Excluded => "Excluded",
            RankName::Gatekeeper => "Gatekeeper",
            RankName::Webkeeper => "Webkeeper",
            RankName::Committee => "Committee",
            RankName::LifeMember => "Life Member",
            RankName::President => "President",
            RankName::VicePresident => "Vice President",
            RankName::Secretary => "Secretary",
            RankName::Treasurer => "Treasurer",
            RankName::Librarian => "Librarian",
            RankName::FresherRep => "Fresher Rep",
            RankName::Ocm => "OCM",
            RankName::Ipp => "IPP (Immediate Past President)",
        }
    }
}

// ---------------------------------------------------------------------------
// ItemType
// ---------------------------------------------------------------------------

/// Library item kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ItemType {
    #[serde(rename = "BK")]
    Book,
    #[serde(rename = "BG")]
    BoardGame,
    #[serde(rename = "CG")]
    CardGame,
    #[serde(rename = "OT")]
    Other,
}

text_enum!(ItemType {
    Book => "BK",
    BoardGame => "BG",
    CardGame => "CG",
    Other => "OT",
});

impl ItemType {
    pub fn label(&self) -> &'static str {
        match self {
            ItemType::Book => "Book",
            ItemType::BoardGame => "Board Game",
            ItemType::CardGame => "Card Game",
            ItemType::Other => "Other",
        }
    }
}

// ---------------------------------------------------------------------------
// FormStatus
// ---------------------------------------------------------------------------

/// External borrowing form lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum FormStatus {
    #[serde(rename = "U")]
    Unapproved,
    #[serde(rename = "D")]
    Denied,
    #[serde(rename = "A")]
    Approved,
    #[serde(rename = "C")]
    Completed,
}

text_enum!(FormStatus {
    Unapproved => "U",
    Denied => "D",
    Approved => "A",
    Completed => "C",
});

// ---------------------------------------------------------------------------
// ApprovalStatus
// ---------------------------------------------------------------------------

/// Reservation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ApprovalStatus {
    #[serde(rename = "?")]
    Pending,
    #[serde(rename = "A")]
    Approved,
    #[serde(rename = "X")]
    Denied,
    #[serde(rename = "!")]
    Completed,
}

text_enum!(ApprovalStatus {
    Pending => "?",
    Approved => "A",
    Denied => "X",
    Completed => "!",
});

// ---------------------------------------------------------------------------
// EmailAudience
// ---------------------------------------------------------------------------

/// Who receives a blog email order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EmailAudience {
    AllMembers,
    CurrentMembers,
    Committee,
    Gatekeepers,
}

text_enum!(EmailAudience {
    AllMembers => "all_members",
    CurrentMembers => "current_members",
    Committee => "committee",
    Gatekeepers => "gatekeepers",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_codes_match_serde() {
        for rank in RankName::ALL {
            let json = serde_json::to_string(rank).unwrap();
            assert_eq!(json, format!("\"{}\"", rank.as_str()));
            assert_eq!(rank.as_str().parse::<RankName>().unwrap(), *rank);
        }
    }

    #[test]
    fn test_committee_positions() {
        assert!(RankName::Librarian.is_committee_position());
        assert!(!RankName::Committee.is_committee_position());
        assert!(!RankName::Gatekeeper.is_staff());
        assert!(RankName::Webkeeper.is_staff());
    }

    #[test]
    fn test_unknown_item_type() {
        assert!("XX".parse::<ItemType>().is_err());
        assert_eq!("BG".parse::<ItemType>().unwrap(), ItemType::BoardGame);
    }
}
