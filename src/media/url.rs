//! Feed URL hygiene

/// Strip the query string: everything from the first `?` on
pub fn strip_query(url: &str) -> &str {
    match url.find('?') {
        Some(pos) => &url[..pos],
        None => url,
    }
}

/// Whether the URL looks fetchable: starts with `http` or `//`, any case
pub fn is_remote(url: &str) -> bool {
    let lower = url.get(..4).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("//") || lower.starts_with("http")
}

/// Normalize and filter a desired URL list, keeping order
pub fn normalize_urls<I, S>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for url in urls {
        let url = strip_query(url.as_ref());
        if is_remote(url) {
            out.push(url.to_string());
        }
    }
    out
}

/// URL to actually request; protocol relative URLs go over https
pub fn fetchable(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url.to_string()
    }
}

/// Last path segment, used as the stored file name
pub fn basename(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}
