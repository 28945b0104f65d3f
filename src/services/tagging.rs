//! Computed tag derivation

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::models::{item::Item, tag::TagEdge};

/// Most player-count tags generated for one item
const MAX_PLAYER_TAGS: usize = 12;

pub const HIGH_VALUE_TAG: &str = "High Value";

/// Tags every item gets from its own fields
pub fn automatic_tag_names(item: &Item) -> Vec<String> {
    let mut names = vec![item.item_type.label().to_string()];

    let min = item.min_players.or(item.max_players);
    let max = item.max_players.or(item.min_players);
    if let (Some(min), Some(max)) = (min, max) {
        names.extend(
            (min.max(1)..=max)
                .take(MAX_PLAYER_TAGS)
                .map(|n| format!("{} Players", n)),
        );
    }

    if item.high_value {
        names.push(HIGH_VALUE_TAG.to_string());
    }
    names
}

/// Every tag reachable from `seeds` through parent edges, seeds included.
/// Cycles terminate.
pub fn propagate(seeds: &[i32], edges: &[TagEdge]) -> BTreeSet<i32> {
    let mut parents: HashMap<i32, Vec<i32>> = HashMap::new();
    for edge in edges {
        parents.entry(edge.tag_id).or_default().push(edge.parent_id);
    }

    let mut seen: BTreeSet<i32> = BTreeSet::new();
    let mut queue: VecDeque<i32> = seeds.iter().copied().collect();
    while let Some(tag) = queue.pop_front() {
        if !seen.insert(tag) {
            continue;
        }
        if let Some(ps) = parents.get(&tag) {
            queue.extend(ps.iter().copied().filter(|p| !seen.contains(p)));
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::ItemType;
    use chrono::Utc;

    fn item(min: Option<i32>, max: Option<i32>, high_value: bool) -> Item {
        Item {
            id: 1,
            name: "Catan".into(),
            slug: "catan".into(),
            description: String::new(),
            condition: String::new(),
            notes: String::new(),
            item_type: ItemType::BoardGame,
            image_url: None,
            is_borrowable: true,
            high_value,
            min_players: min,
            max_players: max,
            average_play_time: None,
            created_at: Utc::now(),
            modified_at: None,
        }
    }

    fn edge(tag_id: i32, parent_id: i32) -> TagEdge {
        TagEdge { tag_id, parent_id }
    }

    #[test]
    fn test_automatic_tags() {
        let names = automatic_tag_names(&item(Some(3), Some(4), true));
        assert_eq!(names, vec!["Board Game", "3 Players", "4 Players", "High Value"]);
    }

    #[test]
    fn test_player_tags_capped() {
        let names = automatic_tag_names(&item(Some(1), Some(99), false));
        assert_eq!(names.len(), 1 + 12);
        assert_eq!(names.last().map(String::as_str), Some("12 Players"));
    }

    #[test]
    fn test_single_player_bound() {
        let names = automatic_tag_names(&item(Some(2), None, false));
        assert_eq!(names, vec!["Board Game", "2 Players"]);
    }

    #[test]
    fn test_propagate_follows_parents() {
        // 1 -> 2 -> 3, 4 -> 3
        let edges = [edge(1, 2), edge(2, 3), edge(4, 3)];
        let tags = propagate(&[1], &edges);
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_propagate_terminates_on_cycles() {
        let edges = [edge(1, 2), edge(2, 1), edge(2, 5)];
        let tags = propagate(&[1], &edges);
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec![1, 2, 5]);
    }
}
