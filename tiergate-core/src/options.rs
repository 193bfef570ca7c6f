//! # Tier Method Option
//!
//! Reads the minimum caller tier declared on RPC methods through a custom
//! `google.protobuf.MethodOptions` extension.
//!
//! `prost-reflect` decodes method options into a `DynamicMessage`, resolving any extension
//! that is defined in the same `DescriptorPool`. That is why the descriptor set handed to
//! [`TierOption::resolve`] must contain the file declaring the extension, not only the
//! services using it (`protoc --include_imports` does this).
use prost_reflect::{DescriptorPool, ExtensionDescriptor, Kind, MethodDescriptor, Value};

/// Full name of the extension used when none is configured.
pub const DEFAULT_TIER_OPTION: &str = "tier.v1.min_tier";

const METHOD_OPTIONS: &str = "google.protobuf.MethodOptions";

#[derive(Debug, thiserror::Error)]
pub enum OptionError {
    #[error("Method option '{0}' is not defined in the descriptor set")]
    OptionNotFound(String),
    #[error("Option '{name}' extends '{extendee}', expected 'google.protobuf.MethodOptions'")]
    NotAMethodOption { name: String, extendee: String },
    #[error("Option '{name}' has type '{kind:?}', expected a singular integer")]
    UnsupportedOptionType { name: String, kind: Kind },
    #[error("Method '{method}' declares an invalid minimum tier: {value}")]
    InvalidMinTier { method: String, value: String },
}

/// A resolved handle on the tier method option.
#[derive(Debug, Clone)]
pub struct TierOption {
    extension: ExtensionDescriptor,
}

impl TierOption {
    /// Looks up the extension `name` in `pool` and checks that it can hold a tier.
    ///
    /// # Returns
    ///
    /// * `Ok(TierOption)` - The extension exists, extends `MethodOptions` and is a singular integer.
    /// * `Err(OptionError)` - Otherwise.
    pub fn resolve(pool: &DescriptorPool, name: &str) -> Result<Self, OptionError> {
        let extension = pool
            .get_extension_by_name(name)
            .ok_or_else(|| OptionError::OptionNotFound(name.to_string()))?;

        let extendee = extension.containing_message();
        if extendee.full_name() != METHOD_OPTIONS {
            return Err(OptionError::NotAMethodOption {
                name: name.to_string(),
                extendee: extendee.full_name().to_string(),
            });
        }

        let kind = extension.kind();
        if extension.is_list() || !is_integer(&kind) {
            return Err(OptionError::UnsupportedOptionType {
                name: name.to_string(),
                kind,
            });
        }

        Ok(Self { extension })
    }

    /// Full name of the underlying extension (e.g. `tier.v1.min_tier`).
    pub fn name(&self) -> &str {
        self.extension.full_name()
    }

    /// Reads the minimum tier declared on `method`.
    ///
    /// Returns `Ok(None)` when the method does not set the option.
    pub fn min_tier(&self, method: &MethodDescriptor) -> Result<Option<u32>, OptionError> {
        let options = method.options();

        if !options.has_extension(&self.extension) {
            return Ok(None);
        }

        let value = options.get_extension(&self.extension);
        let tier = match value.as_ref() {
            Value::U32(v) => Some(*v),
            Value::U64(v) => u32::try_from(*v).ok(),
            Value::I32(v) => u32::try_from(*v).ok(),
            Value::I64(v) => u32::try_from(*v).ok(),
            _ => None,
        };

        tier.map(Some).ok_or_else(|| OptionError::InvalidMinTier {
            method: method.full_name().to_string(),
            value: format!("{:?}", value.as_ref()),
        })
    }
}

fn is_integer(kind: &Kind) -> bool {
    matches!(
        kind,
        Kind::Int32
            | Kind::Int64
            | Kind::Uint32
            | Kind::Uint64
            | Kind::Sint32
            | Kind::Sint64
            | Kind::Fixed32
            | Kind::Fixed64
            | Kind::Sfixed32
            | Kind::Sfixed64
    )
}
