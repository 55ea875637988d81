//! Layered merge of two spec trees.
//!
//! [`stitch_layers`] merges a weak layer into a strong one field by field
//! without clobbering strong opinions: dictionaries merge recursively with
//! strong keys winning, relationship target lists are copied wholesale only
//! when the strong side has none, time samples merge per sample point, and
//! every other field copies only where the strong side is silent. Specs
//! present only in the weak tree are deep-copied, descendants included.

use crate::layer::{fields, ChangeBlock, Layer};
use crate::listop::ListOp;
use crate::path::Path;
use crate::value::{Dict, TimeSampleMap, Value};

/// Merges `weak` into `strong`. Layer-level frame metadata widens to the
/// union of both ranges; a frames-per-second or frame-precision mismatch is
/// a warning and the strong value is kept. `ignore_time_samples` suppresses
/// all time-sample merging.
pub fn stitch_layers(strong: &Layer, weak: &Layer, ignore_time_samples: bool) {
    let _block = ChangeBlock::new(strong);
    stitch_frame_metadata(strong, weak);
    for path in weak.spec_paths() {
        if strong.has_spec(&path) {
            stitch_info(strong, weak, &path, ignore_time_samples);
        } else {
            copy_spec(strong, weak, &path, ignore_time_samples);
        }
    }
}

/// Merges the fields of the weak spec at `path` into the strong spec at the
/// same path. Both specs must exist; descendants are not touched.
pub fn stitch_info(strong: &Layer, weak: &Layer, path: &Path, ignore_time_samples: bool) {
    for field in weak.list_fields(path) {
        let Some(weak_value) = weak.get_field(path, &field) else {
            continue;
        };
        if field == fields::TIME_SAMPLES {
            if !ignore_time_samples {
                stitch_time_samples(strong, path, &weak_value);
            }
            continue;
        }
        if field == fields::TARGET_PATHS {
            stitch_target_paths(strong, path, &weak_value);
            continue;
        }
        match (strong.get_field(path, &field), weak_value) {
            // Dictionaries merge recursively; strong keys win.
            (Some(Value::Dict(mut strong_dict)), Value::Dict(weak_dict)) => {
                strong_dict.merge_under(&weak_dict);
                strong.set_field(path, &field, Value::Dict(strong_dict));
            }
            (Some(_), _) => {}
            (None, weak_value) => {
                strong.set_field(path, &field, weak_value);
            }
        }
    }
}

/// A strong relationship with no target opinions at all takes the weak
/// side's entire edit list; otherwise the strong list stands untouched.
fn stitch_target_paths(strong: &Layer, path: &Path, weak_value: &Value) {
    let strong_targets = strong
        .get_field(path, fields::TARGET_PATHS)
        .and_then(|v| v.as_path_list_op().cloned())
        .unwrap_or_default();
    if !strong_targets.is_empty() {
        return;
    }
    if let Value::PathListOp(weak_targets) = weak_value {
        let mut copied: ListOp<Path> = ListOp::new();
        copied.copy_items(weak_targets);
        strong.set_field(path, fields::TARGET_PATHS, Value::PathListOp(copied));
    }
}

/// Per-sample merge: a weak sample point copies over only where the strong
/// attribute has no sample at that time. Partially overlapping sample sets
/// interleave rather than clobbering attribute-wide.
fn stitch_time_samples(strong: &Layer, path: &Path, weak_value: &Value) {
    let Value::TimeSamples(weak_samples) = weak_value else {
        return;
    };
    let mut strong_samples: TimeSampleMap = strong
        .get_field(path, fields::TIME_SAMPLES)
        .and_then(|v| v.as_time_samples().cloned())
        .unwrap_or_default();
    let mut changed = false;
    for (time, value) in weak_samples {
        if !strong_samples.contains_key(time) {
            strong_samples.insert(*time, value.clone());
            changed = true;
        }
    }
    if changed {
        strong.set_field(path, fields::TIME_SAMPLES, Value::TimeSamples(strong_samples));
    }
}

/// Deep-copies a spec present only in the weak tree. Parents come first in
/// the caller's iteration order, so the parent spec always exists by the
/// time a child is copied.
fn copy_spec(strong: &Layer, weak: &Layer, path: &Path, ignore_time_samples: bool) {
    let Some(data) = weak.spec_data(path) else {
        return;
    };
    if !strong.create_spec(path, data.spec_type) {
        return;
    }
    for (field, value) in data.fields {
        if ignore_time_samples && field == fields::TIME_SAMPLES {
            continue;
        }
        strong.set_field(path, &field, value);
    }
}

fn stitch_frame_metadata(strong: &Layer, weak: &Layer) {
    widen_frame(strong, weak, fields::START_FRAME, f64::min);
    widen_frame(strong, weak, fields::END_FRAME, f64::max);
    keep_strong_or_warn(strong, weak, fields::FRAMES_PER_SECOND);
    keep_strong_or_warn(strong, weak, fields::FRAME_PRECISION);
}

fn widen_frame(strong: &Layer, weak: &Layer, field: &str, pick: fn(f64, f64) -> f64) {
    let weak_frame = weak.metadata_field(field).and_then(|v| v.as_double());
    let strong_frame = strong.metadata_field(field).and_then(|v| v.as_double());
    match (strong_frame, weak_frame) {
        (Some(s), Some(w)) => {
            strong.set_metadata_field(field, Value::Double(pick(s, w)));
        }
        (None, Some(w)) => {
            strong.set_metadata_field(field, Value::Double(w));
        }
        _ => {}
    }
}

fn keep_strong_or_warn(strong: &Layer, weak: &Layer, field: &str) {
    match (strong.metadata_field(field), weak.metadata_field(field)) {
        (Some(s), Some(w)) => {
            if s != w {
                crate::diag::post_warning(format!(
                    "'{}' mismatch stitching {} into {}: keeping {:?}, ignoring {:?}",
                    field,
                    weak.identifier(),
                    strong.identifier(),
                    s,
                    w
                ));
            }
        }
        (None, Some(w)) => {
            strong.set_metadata_field(field, w);
        }
        _ => {}
    }
}
