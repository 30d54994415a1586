//! Macros for defining typed identifier types.

/// Macro to define a typed wrapper around an opaque provider identifier.
///
/// Provider identifiers (`vol-0abc...`, `snap-0def...`, `i-0123...`) carry no
/// structure this crate relies on. The wrapper only guarantees the value is
/// non-empty and free of whitespace, and keeps volume, snapshot and instance
/// identifiers from being mixed up.
///
/// This generates:
/// - A `KIND` constant used in error messages and log fields
/// - `parse()` for validated construction
/// - `as_str()` and `into_inner()` accessors
/// - `Display`, `FromStr`, `AsRef<str>` implementations
/// - `Serialize` and `Deserialize` as a plain string
///
/// # Example
///
/// ```ignore
/// define_id!(VolumeId, "volume");
///
/// let id: VolumeId = "vol-0123456789abcdef0".parse()?;
/// assert_eq!(id.as_str(), "vol-0123456789abcdef0");
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident, $kind:literal) => {
        /// A typed provider identifier for this resource type.
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// The resource kind this identifier names.
            pub const KIND: &'static str = $kind;

            /// Parses an identifier, rejecting empty or whitespace-bearing input.
            pub fn parse(s: &str) -> Result<Self, $crate::IdError> {
                $crate::validate(Self::KIND, s)?;
                Ok(Self(s.to_string()))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the wrapper and returns the raw identifier.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::IdError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                $crate::validate(Self::KIND, &s)?;
                Ok(Self(s))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::try_from(s).map_err(serde::de::Error::custom)
            }
        }
    };
}
