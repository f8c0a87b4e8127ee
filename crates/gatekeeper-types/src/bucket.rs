use crate::Identity;

/// Keys of one (identity, route) bucket in the Shared Token Store
///
/// Layout: `{prefix}{identity}:{path}:tokens` and `{prefix}{identity}:{path}:ts`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKeys {
    pub tokens: String,
    pub timestamp: String,
}

impl BucketKeys {
    pub fn new(prefix: &str, identity: &Identity, route_path: &str) -> Self {
        let base = format!("{}{}:{}", prefix, identity.as_str(), route_path);
        Self {
            tokens: format!("{}:tokens", base),
            timestamp: format!("{}:ts", base),
        }
    }
}
