//! Session join links
//!
//! A join link is the base URL with the host's transport id in the `room`
//! query parameter. A link without `room` means "start a new session".

use crate::types::PlayerId;

const ROOM_PARAM: &str = "room=";

/// Build the link guests open to join `host_id`
pub fn join_link(base_url: &str, host_id: &str) -> String {
    let base = base_url.split(['?', '#']).next().unwrap_or(base_url);
    format!("{}?{}{}", base, ROOM_PARAM, host_id)
}

/// Extract the host id from a join link
pub fn room_from_link(link: &str) -> Option<PlayerId> {
    let query = link.split_once('?')?.1;
    let query = query.split('#').next().unwrap_or(query);
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix(ROOM_PARAM))
        .map(str::trim)
        .filter(|room| !room.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_link_round_trips_room() {
        let link = join_link("http://localhost:6573/", "127.0.0.1:40111");
        assert_eq!(link, "http://localhost:6573/?room=127.0.0.1:40111");
        assert_eq!(room_from_link(&link).as_deref(), Some("127.0.0.1:40111"));
    }

    #[test]
    fn test_join_link_replaces_existing_query() {
        let link = join_link("http://example.com/play?room=old#top", "new");
        assert_eq!(link, "http://example.com/play?room=new");
    }

    #[test]
    fn test_missing_room_means_new_session() {
        assert_eq!(room_from_link("http://localhost:6573/"), None);
        assert_eq!(room_from_link("http://localhost:6573/?lang=de"), None);
        assert_eq!(room_from_link("http://localhost:6573/?room="), None);
    }

    #[test]
    fn test_room_among_other_params() {
        assert_eq!(
            room_from_link("http://x/?lang=de&room=01HXYZ#frag").as_deref(),
            Some("01HXYZ")
        );
    }
}
