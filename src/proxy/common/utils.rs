// Utility functions
use url::Url;

const SERVICES_SEGMENT: &str = "services";
const MAP_SERVER_SEGMENT: &str = "MapServer";

/// Derive the short service name from a backend URL.
///
/// `https://host/arcgis/rest/services/Roads/MapServer` -> `Roads`.
/// Returns `None` when there is no `services` segment or nothing after it.
pub fn derive_service_name(service_url: &str) -> Option<String> {
    let path = match Url::parse(service_url) {
        Ok(url) => url.path().to_string(),
        Err(_) => service_url.to_string(),
    };

    let mut segments = path.split('/').filter(|s| !s.is_empty());
    segments.by_ref().find(|s| *s == SERVICES_SEGMENT)?;
    segments.next().map(str::to_string)
}

/// Build the upstream URL for a proxied request.
///
/// Stored URLs already end in `.../MapServer`, so a leading `MapServer`
/// sub-path segment is dropped. When `token` is set it replaces any client
/// `token` parameter; without one the client query is forwarded as is.
/// Other parameters keep their order.
pub fn build_target_url(
    service_url: &str,
    sub_path: &str,
    query: &[(String, String)],
    token: Option<&str>,
) -> Result<Url, url::ParseError> {
    let mut segments: Vec<&str> = sub_path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.first() == Some(&MAP_SERVER_SEGMENT) {
        segments.remove(0);
    }

    let mut target = service_url.trim_end_matches('/').to_string();
    if !segments.is_empty() {
        target.push('/');
        target.push_str(&segments.join("/"));
    }

    let mut url = Url::parse(&target)?;

    let mut pairs: Vec<(&str, &str)> = query
        .iter()
        .filter(|(k, _)| token.is_none() || k != "token")
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    if let Some(token) = token {
        pairs.push(("token", token));
    }

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    Ok(url)
}

/// Decode a raw query string into ordered pairs
pub fn parse_query(raw: Option<&str>) -> Vec<(String, String)> {
    raw.map(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .into_owned()
            .collect()
    })
    .unwrap_or_default()
}

/// Query string with the `token` value masked, for log lines
pub fn redact_token(raw: &str) -> String {
    let pairs = parse_query(Some(raw));
    if !pairs.iter().any(|(k, _)| k == "token") {
        return raw.to_string();
    }
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(k, v)| {
            if k == "token" {
                (k.as_str(), "***")
            } else {
                (k.as_str(), v.as_str())
            }
        }))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROADS: &str = "https://host/arcgis/rest/services/Roads/MapServer";

    #[test]
    fn test_derive_service_name() {
        assert_eq!(derive_service_name(ROADS).as_deref(), Some("Roads"));
        assert_eq!(
            derive_service_name("https://host/server/rest/services/Hydro/Rivers/MapServer")
                .as_deref(),
            Some("Hydro")
        );
        assert_eq!(
            derive_service_name("arcgis/rest/services/Parcels/MapServer").as_deref(),
            Some("Parcels")
        );
    }

    #[test]
    fn test_derive_service_name_without_services_segment() {
        assert_eq!(derive_service_name("https://host/arcgis/rest/Roads/MapServer"), None);
        assert_eq!(derive_service_name("https://host/arcgis/rest/services/"), None);
        assert_eq!(derive_service_name(""), None);
    }

    #[test]
    fn test_map_server_segment_not_doubled() {
        let url = build_target_url(ROADS, "MapServer/0/query", &[], Some("T1")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://host/arcgis/rest/services/Roads/MapServer/0/query?token=T1"
        );
        assert_eq!(url.as_str().matches("MapServer").count(), 1);
    }

    #[test]
    fn test_roads_layer_zero() {
        let url = build_target_url(ROADS, "MapServer/0", &[], Some("T1")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://host/arcgis/rest/services/Roads/MapServer/0?token=T1"
        );
    }

    #[test]
    fn test_sub_path_without_map_server_prefix() {
        let url = build_target_url(ROADS, "export", &[], None).unwrap();
        assert_eq!(url.as_str(), "https://host/arcgis/rest/services/Roads/MapServer/export");

        let url = build_target_url(ROADS, "", &[], None).unwrap();
        assert_eq!(url.as_str(), ROADS);
    }

    #[test]
    fn test_client_token_is_overridden_and_params_kept() {
        let query = vec![
            ("f".to_string(), "json".to_string()),
            ("token".to_string(), "CLIENT".to_string()),
            ("where".to_string(), "1=1".to_string()),
        ];
        let url = build_target_url(ROADS, "MapServer/0/query", &query, Some("T1")).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("f".to_string(), "json".to_string()),
                ("where".to_string(), "1=1".to_string()),
                ("token".to_string(), "T1".to_string()),
            ]
        );
    }

    #[test]
    fn test_client_token_kept_without_portal_token() {
        let query = vec![
            ("f".to_string(), "json".to_string()),
            ("token".to_string(), "CLIENT".to_string()),
        ];
        let url = build_target_url(ROADS, "MapServer/0", &query, None).unwrap();
        assert_eq!(
            url.as_str(),
            "https://host/arcgis/rest/services/Roads/MapServer/0?f=json&token=CLIENT"
        );
    }

    #[test]
    fn test_parse_query() {
        assert!(parse_query(None).is_empty());
        assert_eq!(
            parse_query(Some("f=json&where=1%3D1")),
            vec![
                ("f".to_string(), "json".to_string()),
                ("where".to_string(), "1=1".to_string()),
            ]
        );
    }

    #[test]
    fn test_redact_token() {
        assert_eq!(redact_token("f=json&token=SECRET"), "f=json&token=***");
        assert_eq!(redact_token("f=json"), "f=json");
    }
}
