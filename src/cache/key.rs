//! Stable cache key derivation.
//!
//! Keys are `family:kind:params` with parameters canonicalized in a fixed
//! order so the same logical query always produces the same key and absent
//! parameters never vary it.

use crate::api::ListQuery;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a paginated list query within a family.
    pub fn list(family: &str, query: &ListQuery) -> Self {
        let mut params = String::new();
        if let Some(ref name) = query.name {
            params.push_str("name=");
            params.push_str(name);
            params.push('&');
        }
        params.push_str(&format!("limit={}&offset={}", query.limit, query.offset));
        CacheKey(format!("{}:list:{}", family, params))
    }

    /// Key for a single resource by id.
    pub fn detail(family: &str, id: i64) -> Self {
        CacheKey(format!("{}:detail:{}", family, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_query_same_key() {
        let a = CacheKey::list("products", &ListQuery::page(25, 0));
        let b = CacheKey::list("products", &ListQuery::page(25, 0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_absent_name_does_not_vary_key() {
        let q = ListQuery {
            name: None,
            limit: 25,
            offset: 0,
        };
        assert_eq!(
            CacheKey::list("products", &q),
            CacheKey::list("products", &ListQuery::page(25, 0))
        );
    }

    #[test]
    fn test_name_filter_changes_key() {
        let with = CacheKey::list("products", &ListQuery::page(25, 0).with_name("bolt"));
        let without = CacheKey::list("products", &ListQuery::page(25, 0));
        assert_ne!(with, without);
        assert_eq!(with.as_str(), "products:list:name=bolt&limit=25&offset=0");
    }

    #[test]
    fn test_detail_key_shape() {
        let key = CacheKey::detail("stocks", 42);
        assert_eq!(key.as_str(), "stocks:detail:42");
    }
}
