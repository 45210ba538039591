//! Magnet URI assembly for DHT-backed descriptor lookups.

use magpie_core::InfoHash;
use url::form_urlencoded;

/// Tracker bookkeeping sentinels that must never appear in a magnet URI.
const TRACKER_SENTINELS: [&str; 2] = ["no-DHT", "DHT"];

/// Build `magnet:?xt=urn:btih:<hex>` with one `&tr=` parameter per real
/// tracker.
pub(crate) fn magnet_uri(infohash: InfoHash, trackers: &[String]) -> String {
    let mut uri = format!("magnet:?xt=urn:btih:{infohash}");
    for tracker in trackers {
        if TRACKER_SENTINELS.contains(&tracker.as_str()) {
            continue;
        }
        uri.push_str("&tr=");
        uri.extend(form_urlencoded::byte_serialize(tracker.as_bytes()));
    }
    uri
}
