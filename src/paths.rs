//! Channel-aware object keys and URLs for the release layout.
//!
//! Manifests and binaries are addressed the same way everywhere - by the
//! update client, the promotion loop, and the (external) publisher:
//!
//! ```text
//! {app}/[{channel}/]{os}-{arch}.json
//! {app}/[{channel}/]{version}/{os}-{arch}.gz
//! ```
//!
//! The channel segment is omitted for `stable`. Every segment is
//! percent-escaped individually so app names and versions cannot smuggle
//! separators into the key.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::manifest::Channel;

/// Characters escaped within a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// The running platform as `{os}-{arch}`, e.g. `linux-x86_64`.
///
/// Publishers must use the same naming for the layout to resolve.
pub fn platform() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

fn escape(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Object key of the update manifest for `app` on `channel` and `platform`.
pub fn manifest_key(app: &str, channel: &Channel, platform: &str) -> String {
    let mut segments = vec![escape(app)];
    if !channel.is_stable() {
        segments.push(escape(channel.as_str()));
    }
    segments.push(format!("{}.json", escape(platform)));
    segments.join("/")
}

/// Object key of the gzipped binary for `app`/`version` on `channel` and
/// `platform`.
pub fn binary_key(app: &str, channel: &Channel, version: &str, platform: &str) -> String {
    let mut segments = vec![escape(app)];
    if !channel.is_stable() {
        segments.push(escape(channel.as_str()));
    }
    segments.push(escape(version));
    segments.push(format!("{}.gz", escape(platform)));
    segments.join("/")
}

/// Join an object key onto a base URL, inserting the trailing slash when the
/// base lacks one.
pub fn join_url(base: &str, key: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{key}")
    } else {
        format!("{base}/{key}")
    }
}
