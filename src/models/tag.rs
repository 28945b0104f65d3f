//! Item tags and the tag hierarchy

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Tag {
    pub id: i32,
    pub name: String,
}

/// A tag with its direct parents
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagWithParents {
    pub id: i32,
    pub name: String,
    pub parents: Vec<Tag>,
}

/// One edge of the tag hierarchy
#[derive(Debug, Clone, Copy, FromRow)]
pub struct TagEdge {
    pub tag_id: i32,
    pub parent_id: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetBaseTags {
    /// Tag names; unknown names are created
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetTagParents {
    /// Parent tag names; unknown names are created
    pub parents: Vec<String>,
}

/// Result of recomputing computed tags
#[derive(Debug, Serialize, ToSchema)]
pub struct TagRefreshReport {
    pub items_refreshed: usize,
}
