//! Event store key layout
//!
//! | Key | Type | Holds |
//! |---|---|---|
//! | `search:{type}:top` | sorted set | term -> search count |
//! | `search:{type}:{term}:meta` | hash | `count`, `total_response_time`, `last_searched`, `results_count` |
//! | `search:type:{type}:count` | string | searches of that type |
//! | `search:hours:{HH}` | string | searches during that hour of day |
//! | `statistics:latest` | string | JSON statistics snapshot |

use crate::types::SearchType;

/// Snapshot cache slot
pub const STATISTICS_CACHE_KEY: &str = "statistics:latest";

pub const META_COUNT: &str = "count";
pub const META_TOTAL_RESPONSE_TIME: &str = "total_response_time";
pub const META_LAST_SEARCHED: &str = "last_searched";
pub const META_RESULTS_COUNT: &str = "results_count";

/// Sorted set ranking the terms of one search type
pub fn top_terms(search_type: SearchType) -> String {
    format!("search:{}:top", search_type)
}

/// Metadata hash for one term
pub fn term_meta(search_type: SearchType, term: &str) -> String {
    format!("search:{}:{}:meta", search_type, term)
}

/// Total searches of one type
pub fn type_count(search_type: SearchType) -> String {
    format!("search:type:{}:count", search_type)
}

/// Searches during one hour of day (0-23)
pub fn hour(hour: u32) -> String {
    format!("search:hours:{:02}", hour)
}

/// All hour-of-day keys in scan order
pub fn all_hours() -> impl Iterator<Item = (u32, String)> {
    (0..24).map(|h| (h, hour(h)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(top_terms(SearchType::People), "search:people:top");
        assert_eq!(
            term_meta(SearchType::Movies, "A New Hope"),
            "search:movies:A New Hope:meta"
        );
        assert_eq!(type_count(SearchType::People), "search:type:people:count");
        assert_eq!(hour(7), "search:hours:07");
        assert_eq!(hour(23), "search:hours:23");
    }

    #[test]
    fn test_all_hours() {
        let hours: Vec<_> = all_hours().collect();
        assert_eq!(hours.len(), 24);
        assert_eq!(hours[0], (0, "search:hours:00".to_string()));
        assert_eq!(hours[23].0, 23);
    }
}
