/// One model output row decoded into class, confidence and box.
///
/// Box geometry is normalized to `0..1` relative to the frame, with the box
/// described by its center point and size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub confidence: f32,
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
}

impl RawDetection {
    pub fn new(class_id: usize, confidence: f32, center: (f32, f32), size: (f32, f32)) -> Self {
        Self {
            class_id,
            confidence,
            center_x: center.0,
            center_y: center.1,
            width: size.0,
            height: size.1,
        }
    }
}
