//! JSON ingestion of the builder shell.
//!
//! The accepted document is a structural export of the definition: the
//! same shape as [`SkeletonBuilder`], camelCase keys, curves either as a
//! name (`"stepped"`) or four Bezier control points. Parsing yields the
//! shell; finalization resolves it into an immutable [`SkeletonData`].
//!
//! [`SkeletonData`]: crate::SkeletonData

use crate::builder::SkeletonBuilder;
use crate::error::Error;
use crate::model::SkeletonData;

pub fn skeleton_from_json_str(text: &str) -> Result<SkeletonData, Error> {
    let builder: SkeletonBuilder =
        serde_json::from_str(text).map_err(|e| Error::JsonParse {
            message: e.to_string(),
        })?;
    builder.finalize()
}

pub fn skeleton_from_json_slice(bytes: &[u8]) -> Result<SkeletonData, Error> {
    let builder: SkeletonBuilder =
        serde_json::from_slice(bytes).map_err(|e| Error::JsonParse {
            message: e.to_string(),
        })?;
    builder.finalize()
}
