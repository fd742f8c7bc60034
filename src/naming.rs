//! The naming convention shared with the processing pipeline.
//!
//! An uploaded video lives at `{prefix}/{file name}`. The pipeline writes its
//! output next to it under a name that contains the video's base name and the
//! [`MODEL_MARKER`], with either a `.usdz` or an `.mp4` extension.

use crate::error::LandShapeError;
use crate::types::ArtifactKind;

/// Substring every pipeline output carries in its name.
pub const MODEL_MARKER: &str = "_model";

/// Extensions recognized as artifacts, in lookup order.
pub const ARTIFACT_KINDS: [ArtifactKind; 2] =
    [ArtifactKind::Interactive3dAsset, ArtifactKind::PlayableVideo];

/// Returns the file name with its last extension removed.
///
/// Names without an extension, and dot-files such as `.clip`, are returned unchanged.
pub fn base_name(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// Builds the object key a file is uploaded to.
///
/// The key is the literal file name under the prefix; uploading two files with the
/// same name overwrites the first.
pub fn destination_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

/// Normalizes a prefix into the form used for listings (`videos/`).
pub fn listing_prefix(prefix: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        String::new()
    } else {
        format!("{}/", prefix)
    }
}

/// Rejects names that cannot be used as the last segment of an object key.
pub fn validate_file_name(file_name: &str) -> Result<(), LandShapeError> {
    if file_name.is_empty()
        || file_name.contains('/')
        || file_name.contains('\\')
        || file_name == "."
        || file_name == ".."
    {
        return Err(LandShapeError::InvalidFileName(file_name.to_string()));
    }
    Ok(())
}

/// Classifies an object name by its extension.
pub fn classify(name: &str) -> Option<ArtifactKind> {
    ARTIFACT_KINDS
        .into_iter()
        .find(|kind| name.ends_with(&format!(".{}", kind.extension())))
}

/// Checks a single object name against the artifact rule for `base_name`.
pub fn artifact_kind_for(name: &str, base_name: &str, marker: &str) -> Option<ArtifactKind> {
    if !name.contains(marker) || !name.contains(base_name) {
        return None;
    }
    classify(name)
}

/// Returns the first name in `names` that is an artifact of `base_name`.
///
/// Matching is by substring, so a base name of `house` also matches
/// `house2_model.mp4`. Listing order decides between several candidates.
pub fn match_artifact<'a, I>(names: I, base_name: &str, marker: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .find(|name| artifact_kind_for(name, base_name, marker).is_some())
}

/// The exact keys the pipeline is expected to write, for direct lookups.
pub fn expected_artifact_keys(
    prefix: &str,
    base_name: &str,
    marker: &str,
) -> Vec<(String, ArtifactKind)> {
    ARTIFACT_KINDS
        .into_iter()
        .map(|kind| {
            let name = format!("{}{}.{}", base_name, marker, kind.extension());
            (destination_key(prefix, &name), kind)
        })
        .collect()
}

/// Formats a countdown as `MM:SS`.
pub fn format_countdown(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
