//! Aggregator domains never treated as a property's own website.
//!
//! Listing aggregators, social networks and review sites either block
//! scraping or carry stale data.

use url::Url;

pub const DENYLISTED_DOMAINS: &[&str] = &[
    // Listing aggregators
    "apartments.com",
    "zillow.com",
    "trulia.com",
    "realtor.com",
    "rent.com",
    "apartmentguide.com",
    "apartmentlist.com",
    "hotpads.com",
    "forrent.com",
    "zumper.com",
    "padmapper.com",
    "redfin.com",
    "homes.com",
    "rentals.com",
    "apartmenthomeliving.com",
    "craigslist.org",
    // Reviews
    "yelp.com",
    "apartmentratings.com",
    "bbb.org",
    "glassdoor.com",
    "indeed.com",
    "tripadvisor.com",
    // Social
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "youtube.com",
    "tiktok.com",
    "pinterest.com",
    "reddit.com",
    "nextdoor.com",
    // Search engines and reference
    "google.com",
    "yahoo.com",
    "bing.com",
    "wikipedia.org",
];

/// Host of a URL, lowercased, without a leading `www.`. Accepts bare hosts.
pub fn host_of(url: &str) -> Option<String> {
    let trimmed = url.trim();
    let parsed = Url::parse(trimmed)
        .or_else(|_| Url::parse(&format!("https://{}", trimmed)))
        .ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// True when the URL's host is a denylisted domain or a subdomain of one.
/// Unparseable URLs are treated as denied.
pub fn is_denylisted(url: &str) -> bool {
    let Some(host) = host_of(url) else {
        return true;
    };
    DENYLISTED_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
}
