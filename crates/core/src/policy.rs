//! Canonical-name policy: how file names map to install names, and which
//! dependency paths are considered portable or fixable.
//!
//! The policy is plain data passed into every call. It deserializes from
//! YAML/JSON with every field optional.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default size below which files are treated as placeholder stubs.
pub const DEFAULT_STUB_THRESHOLD: u64 = 50_000;

/// Dependencies the rewriter knows how to point at `@rpath`.
pub const DEFAULT_FIXABLE_LIBRARIES: &[&str] = &[
    "libusb-1.0.0",
    "libopencv_highgui",
    "libopencv_videoio",
    "libopencv_imgcodecs",
    "libopencv_imgproc",
    "libopencv_core",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} must not contain '.' (got {value:?})")]
    DottedExtension { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalNamePolicy {
    /// Extension of "flattened" library files whose numeric version suffix is
    /// dropped (`libqhyccd.20.bin` -> `libqhyccd`).
    pub flattened_extension: String,
    /// Extension of native dylibs; version suffixes are kept.
    pub native_extension: String,
    /// Relocatable search-path marker.
    pub relocatable_prefix: String,
    /// Prefixes of absolute, machine-specific install locations.
    pub system_prefixes: Vec<String>,
    /// Loader- or executable-relative markers.
    pub loader_relative_prefixes: Vec<String>,
    /// Dependency base names the rewriter may normalize to `@rpath`.
    pub fixable_libraries: Vec<String>,
    /// Files smaller than this many bytes are stubs and never rewritten.
    pub stub_threshold: u64,
}

impl Default for CanonicalNamePolicy {
    fn default() -> Self {
        Self {
            flattened_extension: "bin".to_string(),
            native_extension: "dylib".to_string(),
            relocatable_prefix: "@rpath/".to_string(),
            system_prefixes: vec!["/usr/local/".to_string(), "/opt/".to_string()],
            loader_relative_prefixes: vec![
                "@loader_path/".to_string(),
                "@executable_path/".to_string(),
            ],
            fixable_libraries: DEFAULT_FIXABLE_LIBRARIES.iter().map(|s| s.to_string()).collect(),
            stub_threshold: DEFAULT_STUB_THRESHOLD,
        }
    }
}

impl CanonicalNamePolicy {
    /// Canonical base name for `filename` under the default policy.
    pub fn from_filename(filename: &str) -> String {
        Self::default().canonical_name(filename)
    }

    /// Expected library base name for a file name.
    ///
    /// ```
    /// use normalizer_core::policy::CanonicalNamePolicy;
    ///
    /// let policy = CanonicalNamePolicy::default();
    /// assert_eq!(policy.canonical_name("libqhyccd.20.bin"), "libqhyccd");
    /// assert_eq!(policy.canonical_name("libqhyccd.20.dylib"), "libqhyccd.20");
    /// assert_eq!(policy.canonical_name("libASICamera2.bin"), "libASICamera2");
    /// ```
    pub fn canonical_name(&self, filename: &str) -> String {
        if let Some(stem) = strip_extension(filename, &self.flattened_extension) {
            return match stem.rsplit_once('.') {
                Some((base, version))
                    if !base.is_empty() && version.chars().any(|c| c.is_ascii_digit()) =>
                {
                    base.to_string()
                }
                _ => stem.to_string(),
            };
        }
        if let Some(stem) = strip_extension(filename, &self.native_extension) {
            return stem.to_string();
        }
        filename.to_string()
    }

    /// The install name a library with this canonical name should carry.
    pub fn expected_identity(&self, canonical: &str) -> String {
        format!("{}{}.{}", self.relocatable_prefix, canonical, self.native_extension)
    }

    /// Relocatable path for an allow-listed dependency.
    pub fn relocatable_path(&self, library: &str) -> String {
        self.expected_identity(library)
    }

    /// The allow-listed library a dependency path refers to, if any.
    pub fn fixable_library_in(&self, path: &str) -> Option<&str> {
        self.fixable_libraries.iter().map(String::as_str).find(|lib| path.contains(lib))
    }

    pub fn is_fixable(&self, base_name: &str) -> bool {
        self.fixable_libraries.iter().any(|lib| lib == base_name)
    }

    pub fn is_system_path(&self, path: &str) -> bool {
        self.system_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    pub fn is_loader_relative(&self, path: &str) -> bool {
        self.loader_relative_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Whether `filename` has one of the library extensions this policy knows.
    pub fn is_library_file(&self, filename: &str) -> bool {
        strip_extension(filename, &self.flattened_extension).is_some()
            || strip_extension(filename, &self.native_extension).is_some()
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        for (field, ext) in [
            ("flattened_extension", &self.flattened_extension),
            ("native_extension", &self.native_extension),
        ] {
            if ext.is_empty() {
                return Err(PolicyError::Empty { field });
            }
            if ext.contains('.') {
                return Err(PolicyError::DottedExtension { field, value: ext.clone() });
            }
        }
        if self.relocatable_prefix.is_empty() {
            return Err(PolicyError::Empty { field: "relocatable_prefix" });
        }
        Ok(())
    }
}

fn strip_extension<'a>(filename: &'a str, extension: &str) -> Option<&'a str> {
    filename.strip_suffix(extension)?.strip_suffix('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattened_names_drop_version_suffix() {
        let policy = CanonicalNamePolicy::default();
        assert_eq!(policy.canonical_name("libqhyccd.bin"), "libqhyccd");
        assert_eq!(policy.canonical_name("libqhyccd.20.bin"), "libqhyccd");
        assert_eq!(policy.canonical_name("libfoo.v2.bin"), "libfoo");
        assert_eq!(policy.canonical_name("libfoo.beta.bin"), "libfoo.beta");
    }

    #[test]
    fn native_names_keep_version_suffix() {
        let policy = CanonicalNamePolicy::default();
        assert_eq!(policy.canonical_name("libusb-1.0.0.dylib"), "libusb-1.0.0");
        assert_eq!(policy.canonical_name("libfoo.20.dylib"), "libfoo.20");
    }

    #[test]
    fn other_names_pass_through() {
        assert_eq!(CanonicalNamePolicy::from_filename("README"), "README");
        assert_eq!(CanonicalNamePolicy::from_filename("libbin"), "libbin");
    }

    #[test]
    fn expected_identity_uses_prefix_and_native_extension() {
        let policy = CanonicalNamePolicy::default();
        assert_eq!(policy.expected_identity("libfoo"), "@rpath/libfoo.dylib");
    }

    #[test]
    fn fixable_library_lookup_matches_substrings() {
        let policy = CanonicalNamePolicy::default();
        assert_eq!(
            policy.fixable_library_in("/opt/x/libusb-1.0.0.dylib"),
            Some("libusb-1.0.0")
        );
        assert_eq!(policy.fixable_library_in("/opt/x/libother.dylib"), None);
    }

    #[test]
    fn partial_policy_documents_fill_in_defaults() {
        let policy: CanonicalNamePolicy =
            serde_json::from_str(r#"{"stub_threshold": 10, "fixable_libraries": ["libbar"]}"#)
                .unwrap();
        assert_eq!(policy.stub_threshold, 10);
        assert_eq!(policy.fixable_libraries, vec!["libbar".to_string()]);
        assert_eq!(policy.native_extension, "dylib");
    }

    #[test]
    fn validation_rejects_bad_extensions() {
        let policy =
            CanonicalNamePolicy { native_extension: ".dylib".into(), ..Default::default() };
        assert!(matches!(policy.validate(), Err(PolicyError::DottedExtension { .. })));
        let policy = CanonicalNamePolicy { relocatable_prefix: String::new(), ..Default::default() };
        assert_eq!(policy.validate(), Err(PolicyError::Empty { field: "relocatable_prefix" }));
        assert!(CanonicalNamePolicy::default().validate().is_ok());
    }
}
