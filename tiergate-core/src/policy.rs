//! # Tier Policy
//!
//! A [`TierPolicy`] is the table that maps every gRPC path (`/package.Service/Method`)
//! found in a `DescriptorPool` to the minimum tier declared on that method, and the
//! decision logic run against each inbound request.
//!
//! The table is built once at startup, it is immutable and cheap to clone, so a single
//! policy can be shared by every connection of a server.
use crate::{
    metadata,
    options::{DEFAULT_TIER_OPTION, OptionError, TierOption},
};
use prost_reflect::{DescriptorError, DescriptorPool, MethodDescriptor};
use std::{collections::BTreeMap, str::FromStr, sync::Arc};
use tonic::{
    Status,
    metadata::{MetadataKey, MetadataMap, errors::InvalidMetadataKey},
};

/// Metadata entry carrying the caller's tier when none is configured.
pub const DEFAULT_METADATA_KEY: &str = "tier";

/// Errors that can occur when building a [`TierPolicy`].
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Failed to decode file descriptor set: '{0}'")]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Option(#[from] OptionError),
    #[error("Invalid metadata key '{key}': '{source}'")]
    InvalidMetadataKey {
        key: String,
        source: InvalidMetadataKey,
    },
}

/// Reasons a request is refused by [`TierPolicy::authorize`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TierError {
    #[error("Missing '{0}' metadata")]
    MissingTier(String),
    #[error("Malformed '{key}' metadata: '{value}' is not a non-negative integer")]
    MalformedTier { key: String, value: String },
    #[error("Tier {actual} is below the required tier {required}")]
    Insufficient { required: u32, actual: u32 },
    #[error("Method '{0}' is not declared in the descriptor set")]
    UnknownMethod(String),
}

impl From<TierError> for Status {
    fn from(err: TierError) -> Self {
        match err {
            TierError::MissingTier(_) | TierError::MalformedTier { .. } => {
                Status::invalid_argument(err.to_string())
            }
            TierError::Insufficient { .. } | TierError::UnknownMethod(_) => {
                Status::permission_denied(err.to_string())
            }
        }
    }
}

/// What to do with a request whose path is not a method of the descriptor pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownMethod {
    /// Forward the request untouched (e.g. server reflection, health checks).
    #[default]
    Allow,
    /// Refuse the request with `PERMISSION_DENIED`.
    Deny,
}

/// Settings used to build a [`TierPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Full name of the method option holding the minimum tier.
    pub option_name: String,
    /// Metadata entry the caller's tier is read from.
    pub metadata_key: String,
    pub unknown_method: UnknownMethod,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            option_name: DEFAULT_TIER_OPTION.to_string(),
            metadata_key: DEFAULT_METADATA_KEY.to_string(),
            unknown_method: UnknownMethod::default(),
        }
    }
}

/// The tier requirement of a single gRPC path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// The path is not a method of any service in the pool.
    Unknown,
    /// The method exists but does not declare a minimum tier.
    Open,
    /// The method requires a caller tier greater or equal to this value.
    MinTier(u32),
}

/// A row of [`TierPolicy::methods`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodTier {
    /// gRPC path of the method (e.g. `/showcase.v1.ShowcaseService/GetPremiumInsights`).
    pub path: String,
    pub min_tier: Option<u32>,
}

#[derive(Debug)]
struct Inner {
    methods: BTreeMap<String, Option<u32>>,
    metadata_key: String,
    unknown_method: UnknownMethod,
}

/// The minimum tier of every method of a descriptor pool.
#[derive(Debug, Clone)]
pub struct TierPolicy {
    inner: Arc<Inner>,
}

impl TierPolicy {
    /// Builds the policy from every service and method in `pool`.
    ///
    /// # Returns
    ///
    /// * `Ok(TierPolicy)` - The policy.
    /// * `Err(PolicyError)` - If the option cannot be resolved, a method declares an
    ///   invalid tier, or the metadata key is not a valid gRPC metadata key.
    pub fn from_pool(pool: &DescriptorPool, config: &PolicyConfig) -> Result<Self, PolicyError> {
        let metadata_key = MetadataKey::<tonic::metadata::Ascii>::from_str(&config.metadata_key)
            .map_err(|source| PolicyError::InvalidMetadataKey {
                key: config.metadata_key.clone(),
                source,
            })?;

        let option = TierOption::resolve(pool, &config.option_name)?;

        let mut methods = BTreeMap::new();
        for service in pool.services() {
            for method in service.methods() {
                let min_tier = option.min_tier(&method)?;
                tracing::debug!(path = %http_path(&method), ?min_tier, "Registered method");
                methods.insert(http_path(&method), min_tier);
            }
        }

        Ok(Self {
            inner: Arc::new(Inner {
                methods,
                metadata_key: metadata_key.as_str().to_string(),
                unknown_method: config.unknown_method,
            }),
        })
    }

    /// Decodes an encoded `FileDescriptorSet` and builds the policy from it.
    pub fn from_file_descriptor_set(
        file_descriptor_set: &[u8],
        config: &PolicyConfig,
    ) -> Result<Self, PolicyError> {
        let pool = DescriptorPool::decode(file_descriptor_set)?;
        Self::from_pool(&pool, config)
    }

    /// Metadata entry the caller's tier is read from.
    pub fn metadata_key(&self) -> &str {
        &self.inner.metadata_key
    }

    /// Looks up the requirement of a gRPC path.
    pub fn requirement(&self, path: &str) -> Requirement {
        match self.inner.methods.get(path) {
            None => Requirement::Unknown,
            Some(None) => Requirement::Open,
            Some(Some(tier)) => Requirement::MinTier(*tier),
        }
    }

    /// Decides whether a request to `path` carrying `metadata` may proceed.
    ///
    /// Open methods never look at the metadata. Tiered methods require the caller tier
    /// to be present, well formed, and greater or equal to the declared minimum.
    pub fn authorize(&self, path: &str, metadata: &MetadataMap) -> Result<(), TierError> {
        match self.requirement(path) {
            Requirement::Unknown => match self.inner.unknown_method {
                UnknownMethod::Allow => Ok(()),
                UnknownMethod::Deny => Err(TierError::UnknownMethod(path.to_string())),
            },
            Requirement::Open => Ok(()),
            Requirement::MinTier(required) => {
                let actual = metadata::caller_tier(metadata, self.metadata_key())?;
                if actual < required {
                    return Err(TierError::Insufficient { required, actual });
                }
                Ok(())
            }
        }
    }

    /// Every known method and its minimum tier, ordered by path.
    pub fn methods(&self) -> impl Iterator<Item = MethodTier> + '_ {
        self.inner
            .methods
            .iter()
            .map(|(path, min_tier)| MethodTier {
                path: path.clone(),
                min_tier: *min_tier,
            })
    }
}

/// The HTTP/2 path tonic routes a method on.
pub fn http_path(method: &MethodDescriptor) -> String {
    format!("/{}/{}", method.parent_service().full_name(), method.name())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::options::test::{extension, pool_with, varint_option};
    use prost_types::field_descriptor_proto::{Label, Type};
    use showcase_service::FILE_DESCRIPTOR_SET;
    use tonic::metadata::MetadataValue;

    const PUBLIC: &str = "/showcase.v1.ShowcaseService/GetPublicProfile";
    const STANDARD: &str = "/showcase.v1.ShowcaseService/GetStandardReport";
    const PREMIUM: &str = "/showcase.v1.ShowcaseService/GetPremiumInsights";

    fn policy(config: PolicyConfig) -> TierPolicy {
        TierPolicy::from_file_descriptor_set(FILE_DESCRIPTOR_SET, &config).unwrap()
    }

    fn with_tier(value: &'static str) -> MetadataMap {
        let mut metadata = MetadataMap::new();
        metadata.insert("tier", MetadataValue::from_static(value));
        metadata
    }

    #[test]
    fn reads_requirements_from_method_options() {
        let policy = policy(PolicyConfig::default());

        assert_eq!(policy.requirement(PUBLIC), Requirement::Open);
        assert_eq!(policy.requirement(STANDARD), Requirement::MinTier(1));
        assert_eq!(policy.requirement(PREMIUM), Requirement::MinTier(2));
        assert_eq!(
            policy.requirement("/showcase.v1.ShowcaseService/Ghost"),
            Requirement::Unknown
        );
    }

    #[test]
    fn lists_methods_sorted_by_path() {
        let methods: Vec<_> = policy(PolicyConfig::default()).methods().collect();

        assert_eq!(
            methods,
            vec![
                MethodTier {
                    path: PREMIUM.to_string(),
                    min_tier: Some(2)
                },
                MethodTier {
                    path: PUBLIC.to_string(),
                    min_tier: None
                },
                MethodTier {
                    path: STANDARD.to_string(),
                    min_tier: Some(1)
                },
            ]
        );
    }

    #[test]
    fn open_methods_ignore_metadata() {
        let policy = policy(PolicyConfig::default());

        assert_eq!(policy.authorize(PUBLIC, &MetadataMap::new()), Ok(()));
        assert_eq!(policy.authorize(PUBLIC, &with_tier("garbage")), Ok(()));
    }

    #[test]
    fn tier_must_reach_the_minimum() {
        let policy = policy(PolicyConfig::default());

        assert_eq!(policy.authorize(PREMIUM, &with_tier("2")), Ok(()));
        assert_eq!(policy.authorize(PREMIUM, &with_tier("7")), Ok(()));
        assert_eq!(
            policy.authorize(PREMIUM, &with_tier("1")),
            Err(TierError::Insufficient {
                required: 2,
                actual: 1
            })
        );
        assert_eq!(policy.authorize(STANDARD, &with_tier("1")), Ok(()));
    }

    #[test]
    fn tiered_methods_require_metadata() {
        let policy = policy(PolicyConfig::default());

        assert_eq!(
            policy.authorize(STANDARD, &MetadataMap::new()),
            Err(TierError::MissingTier("tier".to_string()))
        );
        assert!(matches!(
            policy.authorize(STANDARD, &with_tier("gold")),
            Err(TierError::MalformedTier { .. })
        ));
    }

    #[test]
    fn zero_tier_still_requires_metadata() {
        let pool = pool_with(
            extension(".google.protobuf.MethodOptions", Type::Uint32, Label::Optional),
            &varint_option(0),
        );
        let policy = TierPolicy::from_pool(
            &pool,
            &PolicyConfig {
                option_name: "test.v1.min_tier".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        let tiered = "/test.v1.Svc/Tiered";

        assert_eq!(policy.requirement(tiered), Requirement::MinTier(0));
        assert_eq!(policy.requirement("/test.v1.Svc/Open"), Requirement::Open);
        assert_eq!(
            policy.authorize(tiered, &MetadataMap::new()),
            Err(TierError::MissingTier("tier".to_string()))
        );
        assert_eq!(
            policy.authorize(tiered, &with_tier("-0")),
            Err(TierError::MalformedTier {
                key: "tier".to_string(),
                value: "-0".to_string()
            })
        );
        assert_eq!(policy.authorize(tiered, &with_tier("0")), Ok(()));
    }

    #[test]
    fn extra_metadata_is_ignored() {
        let policy = policy(PolicyConfig::default());

        let mut metadata = with_tier("2");
        metadata.insert("x-other", MetadataValue::from_static("junk"));
        metadata.insert("x-tier", MetadataValue::from_static("0"));

        assert_eq!(policy.authorize(PREMIUM, &metadata), Ok(()));
    }

    #[test]
    fn unknown_methods_follow_the_config() {
        let allow = policy(PolicyConfig::default());
        assert_eq!(allow.authorize("/grpc.health.v1.Health/Check", &MetadataMap::new()), Ok(()));

        let deny = policy(PolicyConfig {
            unknown_method: UnknownMethod::Deny,
            ..Default::default()
        });
        assert_eq!(
            deny.authorize("/grpc.health.v1.Health/Check", &MetadataMap::new()),
            Err(TierError::UnknownMethod(
                "/grpc.health.v1.Health/Check".to_string()
            ))
        );
    }

    #[test]
    fn custom_metadata_key_is_used() {
        let policy = policy(PolicyConfig {
            metadata_key: "X-Caller-Tier".to_string(),
            ..Default::default()
        });
        assert_eq!(policy.metadata_key(), "x-caller-tier");

        let mut metadata = MetadataMap::new();
        metadata.insert("x-caller-tier", MetadataValue::from_static("2"));
        assert_eq!(policy.authorize(PREMIUM, &metadata), Ok(()));

        assert_eq!(
            policy.authorize(PREMIUM, &with_tier("2")),
            Err(TierError::MissingTier("x-caller-tier".to_string()))
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = TierPolicy::from_file_descriptor_set(
            FILE_DESCRIPTOR_SET,
            &PolicyConfig {
                option_name: "tier.v1.max_tier".to_string(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::Option(OptionError::OptionNotFound(_))
        ));

        let err = TierPolicy::from_file_descriptor_set(
            FILE_DESCRIPTOR_SET,
            &PolicyConfig {
                metadata_key: "not a key".to_string(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidMetadataKey { .. }));

        let err = TierPolicy::from_file_descriptor_set(b"not a descriptor", &PolicyConfig::default())
            .unwrap_err();
        assert!(matches!(err, PolicyError::Descriptor(_)));
    }

    #[test]
    fn errors_map_to_grpc_codes() {
        let status = Status::from(TierError::MissingTier("tier".to_string()));
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status = Status::from(TierError::MalformedTier {
            key: "tier".to_string(),
            value: "-1".to_string(),
        });
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status = Status::from(TierError::Insufficient {
            required: 2,
            actual: 0,
        });
        assert_eq!(status.code(), tonic::Code::PermissionDenied);
        assert_eq!(status.message(), "Tier 0 is below the required tier 2");

        let status = Status::from(TierError::UnknownMethod("/a.B/C".to_string()));
        assert_eq!(status.code(), tonic::Code::PermissionDenied);
    }
}
