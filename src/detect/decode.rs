use anyhow::{anyhow, Result};

use crate::detect::result::RawDetection;

/// Number of leading box values in a YOLO-style output row: cx, cy, w, h,
/// objectness.
const BOX_FIELDS: usize = 5;

/// Decode a flat block of YOLO-style output rows.
///
/// Each row is `[cx, cy, w, h, objectness, score_0, .., score_n]`. The class id
/// is the arg-max over the score vector (first index wins on ties) and the
/// confidence is that maximum score. Every row is returned; no thresholding
/// happens here.
pub fn decode_rows(data: &[f32], row_len: usize) -> Result<Vec<RawDetection>> {
    if row_len <= BOX_FIELDS {
        return Err(anyhow!(
            "output row length {} leaves no class scores (need > {})",
            row_len,
            BOX_FIELDS
        ));
    }
    if data.len() % row_len != 0 {
        return Err(anyhow!(
            "output of {} values is not a whole number of {}-value rows",
            data.len(),
            row_len
        ));
    }

    let detections = data
        .chunks_exact(row_len)
        .map(|row| {
            let (class_id, confidence) = arg_max(&row[BOX_FIELDS..]);
            RawDetection {
                class_id,
                confidence,
                center_x: row[0],
                center_y: row[1],
                width: row[2],
                height: row[3],
            }
        })
        .collect();
    Ok(detections)
}

fn arg_max(scores: &[f32]) -> (usize, f32) {
    let mut best = (0, scores[0]);
    for (idx, &score) in scores.iter().enumerate().skip(1) {
        if score > best.1 {
            best = (idx, score);
        }
    }
    best
}
