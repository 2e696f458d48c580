use crate::object::ObjectId;

/// A location inside the store's namespace.
///
/// Mirrors the two address forms the store capability accepts: a live,
/// mutable path rooted at the store's single root tree (`Named`), or an
/// absolute content address rooted at a specific object (`ByHash`), written
/// in the store capability's own convention as `/<hash>/rest...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorePath {
    Named(Vec<String>),
    ByHash(ObjectId, Vec<String>),
}

impl StorePath {
    pub fn named(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        StorePath::Named(segments.into_iter().map(Into::into).collect())
    }

    pub fn by_hash(id: ObjectId, segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        StorePath::ByHash(id, segments.into_iter().map(Into::into).collect())
    }

    /// Parse `"a/b/c"` as a named path, or `"/<hash>/rest"` as a content address.
    pub fn parse(s: &str) -> Self {
        let s = s.trim_matches('/');
        if let Some(rest) = s.strip_prefix("ipfs/") {
            let mut parts = rest.splitn(2, '/');
            let hash = parts.next().unwrap_or_default();
            if let Ok(id) = hash.parse::<ObjectId>() {
                let tail: Vec<String> = parts
                    .next()
                    .map(|r| r.split('/').filter(|p| !p.is_empty()).map(String::from).collect())
                    .unwrap_or_default();
                return StorePath::ByHash(id, tail);
            }
        }
        StorePath::named(s.split('/').filter(|p| !p.is_empty()))
    }

    pub fn join(&self, segment: impl Into<String>) -> Self {
        match self {
            StorePath::Named(segs) => {
                let mut segs = segs.clone();
                segs.push(segment.into());
                StorePath::Named(segs)
            }
            StorePath::ByHash(id, segs) => {
                let mut segs = segs.clone();
                segs.push(segment.into());
                StorePath::ByHash(id.clone(), segs)
            }
        }
    }

    pub fn segments(&self) -> &[String] {
        match self {
            StorePath::Named(s) | StorePath::ByHash(_, s) => s,
        }
    }

    pub fn display(&self) -> String {
        match self {
            StorePath::Named(segs) => segs.join("/"),
            StorePath::ByHash(id, segs) => {
                if segs.is_empty() {
                    format!("/ipfs/{id}")
                } else {
                    format!("/ipfs/{id}/{}", segs.join("/"))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_named_path_splits_on_slash() {
        let p = StorePath::parse("repo/master/head/data");
        assert_eq!(
            p,
            StorePath::named(["repo", "master", "head", "data"])
        );
    }

    #[test]
    fn parse_hash_path_recognizes_ipfs_prefix() {
        let id = ObjectId::try_from("a".repeat(64)).unwrap();
        let p = StorePath::parse(&format!("/ipfs/{id}/data/bundle"));
        assert_eq!(p, StorePath::by_hash(id, ["data", "bundle"]));
    }

    #[test]
    fn join_appends_a_segment() {
        let p = StorePath::named(["a"]).join("b");
        assert_eq!(p.segments(), ["a", "b"]);
    }
}
