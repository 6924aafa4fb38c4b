//! RetinaFace-style prior box (anchor) generation.
//!
//! The detector predicts offsets relative to a fixed grid of anchor boxes rather than absolute
//! coordinates. The grid is defined by a small number of feature map strides, each carrying a
//! couple of anchor sizes, tiled densely over the input resolution.

use super::BoundingRect;

/// One feature-map level: a stride relative to the input image, and the anchor (box) sizes
/// placed at every grid cell of that level.
#[derive(Debug, Clone, Copy)]
pub struct LayerInfo {
    pub stride: u32,
    pub sizes: [u32; 2],
}

/// The full anchor configuration used by the face detector, tuned for a 640x640 input.
#[derive(Debug, Clone, Copy)]
pub struct AnchorParams {
    pub input_size: u32,
    pub layers: [LayerInfo; 3],
}

impl AnchorParams {
    pub const DEFAULT: AnchorParams = AnchorParams {
        input_size: 640,
        layers: [
            LayerInfo { stride: 8, sizes: [16, 32] },
            LayerInfo { stride: 16, sizes: [64, 128] },
            LayerInfo { stride: 32, sizes: [256, 512] },
        ],
    };
}

/// A generated, immutable set of anchors in normalised `[0, 1]` center/size coordinates, in the
/// exact order the network emits its per-anchor predictions.
#[derive(Debug, Clone)]
pub struct Anchors {
    boxes: Vec<BoundingRect>,
}

impl Anchors {
    /// Generates the anchor grid for `params`.
    pub fn generate(params: &AnchorParams) -> Self {
        let input = params.input_size as f32;
        let mut boxes = Vec::new();

        for layer in &params.layers {
            let grid = (params.input_size as f32 / layer.stride as f32).ceil() as u32;
            for i in 0..grid {
                for j in 0..grid {
                    let cx = (j as f32 + 0.5) * layer.stride as f32 / input;
                    let cy = (i as f32 + 0.5) * layer.stride as f32 / input;
                    for &size in &layer.sizes {
                        let s = size as f32 / input;
                        boxes.push(BoundingRect::from_center(cx, cy, s, s));
                    }
                }
            }
        }

        Self { boxes }
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn get(&self, index: usize) -> BoundingRect {
        self.boxes[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundingRect> {
        self.boxes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_two_anchors_per_grid_cell_per_layer() {
        let anchors = Anchors::generate(&AnchorParams::DEFAULT);
        let expected: usize = AnchorParams::DEFAULT
            .layers
            .iter()
            .map(|layer| {
                let grid = (AnchorParams::DEFAULT.input_size as f32 / layer.stride as f32).ceil() as usize;
                grid * grid * layer.sizes.len()
            })
            .sum();
        assert_eq!(anchors.len(), expected);
    }

    #[test]
    fn anchor_centers_are_normalised() {
        let anchors = Anchors::generate(&AnchorParams::DEFAULT);
        for anchor in anchors.iter() {
            assert!(anchor.xc >= 0.0 && anchor.xc <= 1.0);
            assert!(anchor.yc >= 0.0 && anchor.yc <= 1.0);
        }
    }
}
