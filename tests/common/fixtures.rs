//! Search response fixtures

use serde_json::{Value, json};

/// Path of the mocked search endpoint
pub const SEARCH_PATH: &str = "/v3/businesses/search";

/// Token the mocked endpoint accepts
pub const TEST_TOKEN: &str = "test-api-key";

/// A complete business record as the upstream API reports it
pub fn business(name: &str) -> Value {
    json!({
        "id": format!("id-{}", name.to_lowercase().replace(' ', "-")),
        "name": name,
        "categories": [{"alias": "pizza", "title": "Pizza"}],
        "location": {
            "address1": "200 Queen St W",
            "city": "Toronto",
            "state": "ON",
            "zip_code": "M5V 3C6",
            "country": "CA"
        },
        "phone": "+14165550142",
        "url": format!("https://www.yelp.com/biz/{}", name.to_lowercase().replace(' ', "-")),
        "coordinates": {"latitude": 43.6503, "longitude": -79.3872},
        "rating": 4.0
    })
}

/// A record with only the required fields and explicit nulls elsewhere
pub fn sparse_business(name: &str) -> Value {
    json!({
        "name": name,
        "categories": [],
        "location": {"address1": null, "city": "Toronto", "state": null, "zip_code": ""},
        "phone": "",
        "url": null,
        "coordinates": {"latitude": null, "longitude": null}
    })
}

/// Search response body holding `businesses` and an optional `total`
pub fn search_body(businesses: Vec<Value>, total: Option<u64>) -> Value {
    match total {
        Some(total) => json!({"businesses": businesses, "total": total}),
        None => json!({"businesses": businesses}),
    }
}

/// Error envelope the upstream API returns with 4xx/5xx statuses
pub fn error_body(code: &str, description: &str) -> Value {
    json!({"error": {"code": code, "description": description}})
}
