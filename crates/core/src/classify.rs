//! Problem classifier: turns decoded slices into typed defects.

use crate::model::{CommandKind, CommandRef, Image, LoadCommand, Slice};
use crate::policy::CanonicalNamePolicy;
use crate::report::{Problem, ProblemKind};

/// Classify every slice of `image` for a library whose canonical base name is
/// `canonical`. A defect in any slice is reported with that slice's location.
pub fn classify_image(
    image: &Image,
    canonical: &str,
    policy: &CanonicalNamePolicy,
) -> Vec<Problem> {
    image
        .slices
        .iter()
        .enumerate()
        .flat_map(|(index, slice)| classify_slice(index, slice, canonical, policy))
        .collect()
}

pub fn classify_slice(
    slice_index: usize,
    slice: &Slice,
    canonical: &str,
    policy: &CanonicalNamePolicy,
) -> Vec<Problem> {
    let expected_id = policy.expected_identity(canonical);
    let own_suffix = format!("/{}.{}", canonical, policy.native_extension);
    let mut problems = Vec::new();

    for (command_index, command) in slice.commands.iter().enumerate() {
        let Some(path) = command.path_str() else { continue };
        let location = CommandRef { slice: slice_index, command: command_index };

        if command.kind == CommandKind::Identity {
            // A missing identity is legal; a present one must be canonical.
            if path != expected_id {
                problems.push(problem(
                    ProblemKind::IdentityMismatch,
                    format!("{path} -> {expected_id}"),
                    location,
                    slice,
                    path,
                    Some(expected_id.clone()),
                ));
            }
            continue;
        }

        if path == expected_id || path.ends_with(&own_suffix) {
            continue;
        }
        if let Some(kind) = dependency_defect(path, policy) {
            let description = match kind {
                ProblemKind::AbsolutePathDependency => format!("Absolute path: {path}"),
                ProblemKind::LoaderRelativeDependency => format!("Non-portable path: {path}"),
                _ => format!("Versioned library: {path}"),
            };
            let replacement = dependency_replacement(command, policy);
            problems.push(problem(kind, description, location, slice, path, replacement));
        }
    }

    problems
}

/// Classify one dependency path; `None` means it is accepted as portable.
pub fn dependency_defect(path: &str, policy: &CanonicalNamePolicy) -> Option<ProblemKind> {
    if policy.is_system_path(path) {
        return Some(ProblemKind::AbsolutePathDependency);
    }
    if policy.is_loader_relative(path) {
        return Some(ProblemKind::LoaderRelativeDependency);
    }

    let native_suffix = format!(".{}", policy.native_extension);
    let (_, tail) = path.rsplit_once(policy.relocatable_prefix.as_str())?;
    if !path.contains(native_suffix.as_str()) {
        return None;
    }
    let lib_name = tail.strip_suffix(native_suffix.as_str()).unwrap_or(tail);
    if policy.is_fixable(lib_name) {
        return None;
    }
    let (base, version) = lib_name.rsplit_once('.')?;
    let numeric = !version.is_empty() && version.chars().all(|c| c.is_ascii_digit());
    if numeric && !policy.is_fixable(base) {
        Some(ProblemKind::UnnormalizedVersionedDependency)
    } else {
        None
    }
}

fn dependency_replacement(command: &LoadCommand, policy: &CanonicalNamePolicy) -> Option<String> {
    let current = command.path_str()?;
    let library = policy.fixable_library_in(current)?;
    let replacement = policy.relocatable_path(library);
    (replacement != current).then_some(replacement)
}

fn problem(
    kind: ProblemKind,
    description: String,
    location: CommandRef,
    slice: &Slice,
    current: &str,
    replacement: Option<String>,
) -> Problem {
    Problem {
        kind,
        description,
        location: Some(location),
        arch: Some(slice.arch.clone()),
        current: Some(current.to_string()),
        replacement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_image;
    use crate::fixtures::{fat, DylibBuilder, CPU_TYPE_ARM64};

    fn classify(bytes: &[u8], canonical: &str) -> Vec<Problem> {
        let image = decode_image(bytes).unwrap();
        classify_image(&image, canonical, &CanonicalNamePolicy::default())
    }

    #[test]
    fn canonical_identity_and_system_dependencies_are_clean() {
        let bytes = DylibBuilder::new()
            .identity("@rpath/libfoo.dylib")
            .dependency("/usr/lib/libSystem.B.dylib")
            .dependency("/System/Library/Frameworks/IOKit.framework/Versions/A/IOKit")
            .dependency("@rpath/libusb-1.0.0.dylib")
            .min_len(0)
            .build();
        assert!(classify(&bytes, "libfoo").is_empty());
    }

    #[test]
    fn missing_identity_is_not_a_problem() {
        let bytes = DylibBuilder::new().dependency("/usr/lib/libc++.1.dylib").min_len(0).build();
        assert!(classify(&bytes, "libfoo").is_empty());
    }

    #[test]
    fn identity_mismatch_carries_old_and_new() {
        let bytes =
            DylibBuilder::new().identity("/usr/local/lib/libfoo.20.dylib").min_len(0).build();
        let problems = classify(&bytes, "libfoo");
        assert_eq!(problems.len(), 1);
        let p = &problems[0];
        assert_eq!(p.kind, ProblemKind::IdentityMismatch);
        assert_eq!(p.current.as_deref(), Some("/usr/local/lib/libfoo.20.dylib"));
        assert_eq!(p.replacement.as_deref(), Some("@rpath/libfoo.dylib"));
        assert_eq!(p.location, Some(CommandRef { slice: 0, command: 0 }));
        assert_eq!(p.arch.as_deref(), Some("x86_64"));
    }

    #[test]
    fn dependency_rules_follow_prefixes() {
        let policy = CanonicalNamePolicy::default();
        assert_eq!(
            dependency_defect("/usr/local/lib/libz.dylib", &policy),
            Some(ProblemKind::AbsolutePathDependency)
        );
        assert_eq!(
            dependency_defect("/opt/x/libusb-1.0.0.dylib", &policy),
            Some(ProblemKind::AbsolutePathDependency)
        );
        assert_eq!(
            dependency_defect("@loader_path/libbar.dylib", &policy),
            Some(ProblemKind::LoaderRelativeDependency)
        );
        assert_eq!(
            dependency_defect("@executable_path/../Frameworks/libbar.dylib", &policy),
            Some(ProblemKind::LoaderRelativeDependency)
        );
        assert_eq!(
            dependency_defect("@rpath/libqhyccd.20.dylib", &policy),
            Some(ProblemKind::UnnormalizedVersionedDependency)
        );
        assert_eq!(dependency_defect("@rpath/libqhyccd.dylib", &policy), None);
        assert_eq!(dependency_defect("@rpath/libusb-1.0.0.dylib", &policy), None);
        assert_eq!(dependency_defect("@rpath/libfoo.v2.dylib", &policy), None);
        assert_eq!(dependency_defect("/usr/lib/libSystem.B.dylib", &policy), None);
    }

    #[test]
    fn dependencies_on_own_identity_are_skipped() {
        let bytes = DylibBuilder::new()
            .identity("@rpath/libfoo.dylib")
            .dependency("/usr/local/lib/libfoo.dylib")
            .min_len(0)
            .build();
        assert!(classify(&bytes, "libfoo").is_empty());
    }

    #[test]
    fn replacement_only_for_allow_listed_dependencies() {
        let bytes = DylibBuilder::new()
            .identity("@rpath/libfoo.dylib")
            .dependency("@loader_path/libopencv_core.dylib")
            .dependency("/usr/local/lib/libgphoto2.dylib")
            .min_len(0)
            .build();
        let problems = classify(&bytes, "libfoo");
        assert_eq!(problems.len(), 2);
        assert_eq!(problems[0].replacement.as_deref(), Some("@rpath/libopencv_core.dylib"));
        assert_eq!(problems[1].replacement, None);
    }

    #[test]
    fn custom_allow_list_changes_classification() {
        let policy = CanonicalNamePolicy {
            fixable_libraries: vec!["libqhyccd.20".into()],
            ..Default::default()
        };
        assert_eq!(dependency_defect("@rpath/libqhyccd.20.dylib", &policy), None);
    }

    #[test]
    fn problems_are_attributed_to_their_slice() {
        let good = DylibBuilder::new()
            .identity("@rpath/libfoo.dylib")
            .dependency("@rpath/libusb-1.0.0.dylib")
            .min_len(0)
            .build();
        let bad = DylibBuilder::new()
            .cpu(CPU_TYPE_ARM64, 0)
            .identity("@rpath/libfoo.dylib")
            .dependency("/opt/x/libusb-1.0.0.dylib")
            .min_len(0)
            .build();
        let problems = classify(&fat(&[good, bad]), "libfoo");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].location, Some(CommandRef { slice: 1, command: 1 }));
        assert_eq!(problems[0].arch.as_deref(), Some("arm64"));
    }
}
