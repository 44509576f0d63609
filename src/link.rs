use std::collections::BTreeMap;

/// 一個已解析的 `Link` 標頭項目。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub rel: String,
    /// `rel` 以外的參數，值已去除引號。
    pub params: BTreeMap<String, String>,
}

impl Link {
    /// 解析多個 `Link` 標頭值，只保留帶有 URL 的項目。
    ///
    /// 單一標頭值中以逗號分隔的多個連結也會被拆開。
    ///
    /// # 範例
    ///
    /// ```
    /// use dns01_acme::link::Link;
    ///
    /// let links = Link::parse_all(["<https://ca.test/cert/1/1>;rel=\"alternate\""]);
    /// assert_eq!(links[0].url, "https://ca.test/cert/1/1");
    /// assert_eq!(links[0].rel, "alternate");
    /// ```
    pub fn parse_all<'a, I>(values: I) -> Vec<Link>
    where
        I: IntoIterator<Item = &'a str>,
    {
        values
            .into_iter()
            .flat_map(split_links)
            .filter_map(Self::parse)
            .collect()
    }

    /// 解析單一連結；沒有 `<url>` 時回傳 `None`。
    pub fn parse(chunk: &str) -> Option<Link> {
        let mut link = Link::default();

        for piece in chunk.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some(url) = piece.strip_prefix('<').and_then(|p| p.strip_suffix('>')) {
                link.url = url.to_string();
                continue;
            }

            let (key, value) = match piece.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim().trim_matches('"')),
                None => (piece, ""),
            };
            if key.is_empty() {
                continue;
            }

            if key.eq_ignore_ascii_case("rel") {
                link.rel = value.to_string();
            } else {
                link.params.insert(key.to_string(), value.to_string());
            }
        }

        (!link.url.is_empty()).then_some(link)
    }

    pub fn is_alternate(&self) -> bool {
        self.rel.eq_ignore_ascii_case("alternate")
    }
}

/// 在 `, <` 處切開同一標頭值中的多個連結。
fn split_links(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let bytes = value.as_bytes();

    for (i, b) in bytes.iter().enumerate() {
        if *b == b',' && value[i + 1..].trim_start().starts_with('<') {
            parts.push(&value[start..i]);
            start = i + 1;
        }
    }
    parts.push(&value[start..]);
    parts
}
