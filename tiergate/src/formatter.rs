use colored::*;
use std::fmt::Display;
use tiergate_core::{
    PolicyError,
    client::{CallError, ClientConnectError},
    policy::MethodTier,
    prost_reflect,
    tonic::Status,
};

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

/// The methods of a descriptor set with their minimum tier.
pub struct TierTable(pub Vec<MethodTier>);

pub struct GenericError<T: Display>(pub &'static str, pub T);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<serde_json::Value> for FormattedString {
    fn from(value: serde_json::Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

impl From<Status> for FormattedString {
    fn from(status: Status) -> Self {
        FormattedString(format!(
            "{} code={:?} message={:?}",
            "gRPC Failed:".red().bold(),
            status.code(),
            status.message()
        ))
    }
}

impl From<CallError> for FormattedString {
    fn from(err: CallError) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Call Failed:".red().bold(), err))
    }
}

impl From<ClientConnectError> for FormattedString {
    fn from(err: ClientConnectError) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Connection Error:".red().bold(), err))
    }
}

impl From<PolicyError> for FormattedString {
    fn from(err: PolicyError) -> Self {
        FormattedString(format!(
            "{}\n\n'{}'",
            "Failed to build tier policy:".red().bold(),
            err
        ))
    }
}

impl From<prost_reflect::DescriptorError> for FormattedString {
    fn from(err: prost_reflect::DescriptorError) -> Self {
        FormattedString(format!(
            "{}\n\n'{}'",
            "Failed to parse file descriptor:".red().bold(),
            err
        ))
    }
}

impl From<std::io::Error> for FormattedString {
    fn from(err: std::io::Error) -> Self {
        FormattedString(format!(
            "{}\n\n'{}'",
            "Failed to read file:".red().bold(),
            err
        ))
    }
}

impl<T: Display> From<GenericError<T>> for FormattedString {
    fn from(GenericError(msg, err): GenericError<T>) -> Self {
        FormattedString(format!("{}:\n\n'{}'", msg.red().bold(), err))
    }
}

impl From<TierTable> for FormattedString {
    fn from(TierTable(methods): TierTable) -> Self {
        if methods.is_empty() {
            return FormattedString("No methods found.".yellow().to_string());
        }

        let width = methods.iter().map(|m| m.path.len()).max().unwrap_or(0);

        let mut out = String::new();
        out.push_str("Method tiers:\n");
        for method in methods {
            let tier = match method.min_tier {
                Some(tier) => tier.to_string().yellow(),
                None => "-".dimmed(),
            };
            let path = format!("{:<width$}", method.path);
            out.push_str(&format!("  {}  {}\n", path.green(), tier));
        }
        FormattedString(out.trim_end().to_string())
    }
}
