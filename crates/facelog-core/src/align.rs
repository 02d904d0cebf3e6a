//! Face alignment to the canonical ArcFace crop.
//!
//! A 4-DOF similarity (scale, rotation, translation) is fitted in closed form
//! from the five detected landmarks to the InsightFace template, then the
//! frame is resampled into a 112×112 crop.

/// Side length of the aligned crop fed to ArcFace.
pub const ALIGNED_SIZE: usize = 112;

/// InsightFace reference landmarks for a 112×112 crop.
pub const TEMPLATE_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

/// Similarity transform `p' = [[a, -b], [b, a]] * p + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub a: f32,
    pub b: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Similarity {
    pub const IDENTITY: Similarity = Similarity { a: 1.0, b: 0.0, tx: 0.0, ty: 0.0 };

    /// Least-squares fit mapping `src` onto `dst`.
    ///
    /// Falls back to the identity when the source points are degenerate
    /// (all coincident).
    pub fn fit(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Self {
        let n = src.len() as f32;
        let (sx, sy) = centroid(src);
        let (dx, dy) = centroid(dst);

        let mut dot = 0.0f32;
        let mut cross = 0.0f32;
        let mut norm = 0.0f32;
        for (&(px, py), &(qx, qy)) in src.iter().zip(dst.iter()) {
            let (px, py) = (px - sx, py - sy);
            let (qx, qy) = (qx - dx, qy - dy);
            dot += px * qx + py * qy;
            cross += px * qy - py * qx;
            norm += px * px + py * py;
        }

        if norm / n < 1e-9 {
            return Self::IDENTITY;
        }

        let a = dot / norm;
        let b = cross / norm;
        Self {
            a,
            b,
            tx: dx - (a * sx - b * sy),
            ty: dy - (b * sx + a * sy),
        }
    }

    pub fn apply(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (
            self.a * x - self.b * y + self.tx,
            self.b * x + self.a * y + self.ty,
        )
    }

    /// Inverse transform, or `None` when the scale is zero.
    pub fn inverse(&self) -> Option<Similarity> {
        let det = self.a * self.a + self.b * self.b;
        if det < 1e-12 {
            return None;
        }
        let a = self.a / det;
        let b = -self.b / det;
        Some(Similarity {
            a,
            b,
            tx: -(a * self.tx - b * self.ty),
            ty: -(b * self.tx + a * self.ty),
        })
    }
}

fn centroid(pts: &[(f32, f32); 5]) -> (f32, f32) {
    let n = pts.len() as f32;
    let (sx, sy) = pts.iter().fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x, ay + y));
    (sx / n, sy / n)
}

/// Bilinear sample of a grayscale frame; outside pixels read as black.
fn sample(frame: &[u8], width: usize, height: usize, x: f32, y: f32) -> f32 {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let px = |xi: i64, yi: i64| -> f32 {
        if xi < 0 || yi < 0 || xi >= width as i64 || yi >= height as i64 {
            0.0
        } else {
            frame[yi as usize * width + xi as usize] as f32
        }
    };

    let (x0, y0) = (x0 as i64, y0 as i64);
    let top = px(x0, y0) * (1.0 - fx) + px(x0 + 1, y0) * fx;
    let bottom = px(x0, y0 + 1) * (1.0 - fx) + px(x0 + 1, y0 + 1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Warp a grayscale frame into a `size`×`size` crop using `to_crop`.
pub fn warp(frame: &[u8], width: u32, height: u32, to_crop: &Similarity, size: usize) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let mut out = vec![0u8; size * size];
    if frame.len() < w * h {
        return out;
    }
    let Some(to_frame) = to_crop.inverse() else {
        return out;
    };

    for oy in 0..size {
        for ox in 0..size {
            let (sx, sy) = to_frame.apply((ox as f32, oy as f32));
            out[oy * size + ox] = sample(frame, w, h, sx, sy).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Align a detected face to the canonical 112×112 ArcFace crop.
pub fn align_face(frame: &[u8], width: u32, height: u32, landmarks: &[(f32, f32); 5]) -> Vec<u8> {
    let to_crop = Similarity::fit(landmarks, &TEMPLATE_112);
    warp(frame, width, height, &to_crop, ALIGNED_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32, tol: f32) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_fit_identity() {
        let t = Similarity::fit(&TEMPLATE_112, &TEMPLATE_112);
        assert!(close(t.a, 1.0, 1e-4), "a = {}", t.a);
        assert!(close(t.b, 0.0, 1e-4), "b = {}", t.b);
        assert!(close(t.tx, 0.0, 1e-3), "tx = {}", t.tx);
        assert!(close(t.ty, 0.0, 1e-3), "ty = {}", t.ty);
    }

    #[test]
    fn test_fit_recovers_half_scale() {
        let src = TEMPLATE_112.map(|(x, y)| (x * 2.0 + 10.0, y * 2.0 + 5.0));
        let t = Similarity::fit(&src, &TEMPLATE_112);
        assert!(close(t.a, 0.5, 1e-3), "a = {}", t.a);
        assert!(close(t.b, 0.0, 1e-3), "b = {}", t.b);

        let (x, y) = t.apply(src[2]);
        assert!(close(x, TEMPLATE_112[2].0, 1e-2) && close(y, TEMPLATE_112[2].1, 1e-2));
    }

    #[test]
    fn test_fit_recovers_rotation() {
        // Rotate the template by 90°: (x, y) -> (-y, x)
        let src = TEMPLATE_112.map(|(x, y)| (-y, x));
        let t = Similarity::fit(&src, &TEMPLATE_112);
        for (s, d) in src.iter().zip(TEMPLATE_112.iter()) {
            let (x, y) = t.apply(*s);
            assert!(close(x, d.0, 1e-2) && close(y, d.1, 1e-2), "{x},{y} vs {d:?}");
        }
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = Similarity { a: 0.8, b: 0.3, tx: 12.0, ty: -4.0 };
        let inv = t.inverse().unwrap();
        let (x, y) = inv.apply(t.apply((33.0, 71.0)));
        assert!(close(x, 33.0, 1e-3) && close(y, 71.0, 1e-3));
    }

    #[test]
    fn test_degenerate_landmarks_fall_back_to_identity() {
        let src = [(5.0, 5.0); 5];
        assert_eq!(Similarity::fit(&src, &TEMPLATE_112), Similarity::IDENTITY);
    }

    #[test]
    fn test_align_face_output_size() {
        let frame = vec![128u8; 640 * 480];
        let aligned = align_face(&frame, 640, 480, &TEMPLATE_112);
        assert_eq!(aligned.len(), ALIGNED_SIZE * ALIGNED_SIZE);
    }

    #[test]
    fn test_bright_landmark_lands_on_template() {
        let (w, h) = (200usize, 200usize);
        let mut frame = vec![0u8; w * h];
        let src: [(f32, f32); 5] = [
            (80.0, 60.0),
            (120.0, 60.0),
            (100.0, 85.0),
            (85.0, 110.0),
            (115.0, 110.0),
        ];
        for y in 58..63 {
            for x in 78..83 {
                frame[y * w + x] = 255;
            }
        }

        let aligned = align_face(&frame, w as u32, h as u32, &src);

        let (rx, ry) = (TEMPLATE_112[0].0.round() as usize, TEMPLATE_112[0].1.round() as usize);
        let peak = (ry - 1..=ry + 1)
            .flat_map(|y| (rx - 1..=rx + 1).map(move |x| (x, y)))
            .map(|(x, y)| aligned[y * ALIGNED_SIZE + x])
            .max()
            .unwrap_or(0);
        assert!(peak > 100, "expected bright patch near ({rx}, {ry}), peak={peak}");
    }
}
