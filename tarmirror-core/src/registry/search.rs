use crate::{MirrorError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::debug;

pub const SEARCH_PAGE_SIZE: usize = 250;
pub const SEARCH_MAX_RESULTS: usize = 5250;

const SEARCH_TEXT: &str = "boost-exact:false";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    objects: Vec<SearchObject>,
}

#[derive(Debug, Deserialize)]
struct SearchObject {
    package: SearchPackage,
}

#[derive(Debug, Deserialize)]
struct SearchPackage {
    name: String,
}

/// Names of the `count` most popular packages, in ranking order.
///
/// `count` is capped at [`SEARCH_MAX_RESULTS`]; fewer names come back when the
/// registry runs out of results.
pub async fn top_packages(client: &Client, registry: &str, count: usize) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut seen = BTreeSet::new();

    for (from, size) in search_pages(count) {
        let url = format!(
            "{}/-/v1/search?text={}&size={}&from={}&quality=0.0&popularity=1.0&maintenance=0.0",
            registry.trim_end_matches('/'),
            urlencoding::encode(SEARCH_TEXT),
            size,
            from
        );

        debug!("search request: {}", url);

        let page = client
            .get(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|source| MirrorError::Http {
                url: url.clone(),
                source,
            })?
            .json::<SearchResponse>()
            .await
            .map_err(|source| MirrorError::Http {
                url: url.clone(),
                source,
            })?;

        let received = page.objects.len();

        for object in page.objects {
            if seen.insert(object.package.name.clone()) {
                names.push(object.package.name);
            }
        }

        if received < size {
            break;
        }
    }

    names.truncate(count.min(SEARCH_MAX_RESULTS));
    Ok(names)
}

/// `(from, size)` offsets covering the first `count` search results.
fn search_pages(count: usize) -> Vec<(usize, usize)> {
    let total = count.min(SEARCH_MAX_RESULTS);
    let mut pages = Vec::new();
    let mut from = 0;

    while from < total {
        let size = SEARCH_PAGE_SIZE.min(total - from);
        pages.push((from, size));
        from += size;
    }

    pages
}
