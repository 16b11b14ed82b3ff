use crate::model::CanonicalItem;
use chrono::{DateTime, Utc};

/// Minimal item with the fields the aggregation code looks at.
pub(crate) fn item(title: &str, channel_link: &str, pub_date: DateTime<Utc>) -> CanonicalItem {
    CanonicalItem {
        title: title.to_owned(),
        description: format!("{} summary", title),
        content: String::new(),
        item_link: format!("{}/{}", channel_link, title),
        channel_link: channel_link.to_owned(),
        channel_title: format!("Channel {}", channel_link),
        category: "news".to_owned(),
        pub_date,
        creator: None,
        comments: None,
        guid: None,
        media_url: None,
        favicon: None,
    }
}
