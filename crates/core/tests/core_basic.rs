use normalizer_core::{version, CanonicalNamePolicy};

#[test]
fn version_is_non_empty() {
    let v = version();
    assert!(!v.is_empty());
}

#[test]
fn from_filename_uses_default_policy() {
    assert_eq!(CanonicalNamePolicy::from_filename("libqhyccd.20.bin"), "libqhyccd");
    assert_eq!(CanonicalNamePolicy::from_filename("libASICamera2.bin"), "libASICamera2");
    assert_eq!(CanonicalNamePolicy::from_filename("libusb-1.0.0.dylib"), "libusb-1.0.0");
}
