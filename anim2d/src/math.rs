//! Small 2D affine math used by the pose solver.
//!
//! All angles in the public data model are degrees; radians only appear
//! transiently inside solver math.

/// Row-major 2x3 affine transform. The third column is translation, so
/// composition reads `parent * local`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Matrix2x3 {
    pub m00: f32,
    pub m01: f32,
    pub tx: f32,
    pub m10: f32,
    pub m11: f32,
    pub ty: f32,
}

impl Matrix2x3 {
    pub const IDENTITY: Matrix2x3 = Matrix2x3 {
        m00: 1.0,
        m01: 0.0,
        tx: 0.0,
        m10: 0.0,
        m11: 1.0,
        ty: 0.0,
    };

    /// Builds a local transform from position, rotation, per-axis scale
    /// and shear angles. The x axis is rotated by `rotation + shear_x`,
    /// the y axis by `rotation + 90 + shear_y`.
    pub fn from_local(
        position_x: f32,
        position_y: f32,
        rotation_degrees: f32,
        scale_x: f32,
        scale_y: f32,
        shear_x: f32,
        shear_y: f32,
    ) -> Matrix2x3 {
        let rotation_x = (rotation_degrees + shear_x).to_radians();
        let rotation_y = (rotation_degrees + 90.0 + shear_y).to_radians();
        Matrix2x3 {
            m00: rotation_x.cos() * scale_x,
            m01: rotation_y.cos() * scale_y,
            tx: position_x,
            m10: rotation_x.sin() * scale_x,
            m11: rotation_y.sin() * scale_y,
            ty: position_y,
        }
    }

    pub fn from_parts(upper: Matrix2x2, translation: [f32; 2]) -> Matrix2x3 {
        Matrix2x3 {
            m00: upper.m00,
            m01: upper.m01,
            tx: translation[0],
            m10: upper.m10,
            m11: upper.m11,
            ty: translation[1],
        }
    }

    /// Affine composition: `self` applied after `rhs`.
    pub fn mul(&self, rhs: &Matrix2x3) -> Matrix2x3 {
        Matrix2x3 {
            m00: self.m00 * rhs.m00 + self.m01 * rhs.m10,
            m01: self.m00 * rhs.m01 + self.m01 * rhs.m11,
            tx: self.m00 * rhs.tx + self.m01 * rhs.ty + self.tx,
            m10: self.m10 * rhs.m00 + self.m11 * rhs.m10,
            m11: self.m10 * rhs.m01 + self.m11 * rhs.m11,
            ty: self.m10 * rhs.tx + self.m11 * rhs.ty + self.ty,
        }
    }

    pub fn transform_position(&self, v: [f32; 2]) -> [f32; 2] {
        [
            self.m00 * v[0] + self.m01 * v[1] + self.tx,
            self.m10 * v[0] + self.m11 * v[1] + self.ty,
        ]
    }

    pub fn upper2x2(&self) -> Matrix2x2 {
        Matrix2x2 {
            m00: self.m00,
            m01: self.m01,
            m10: self.m10,
            m11: self.m11,
        }
    }

    pub fn set_upper2x2(&mut self, m: Matrix2x2) {
        self.m00 = m.m00;
        self.m01 = m.m01;
        self.m10 = m.m10;
        self.m11 = m.m11;
    }

    pub fn determinant_upper2x2(&self) -> f32 {
        self.m00 * self.m11 - self.m01 * self.m10
    }

    /// Column 0 is the world x axis, column 1 the world y axis.
    pub fn column(&self, index: usize) -> [f32; 2] {
        if index == 0 {
            [self.m00, self.m10]
        } else {
            [self.m01, self.m11]
        }
    }

    pub fn set_column(&mut self, index: usize, v: [f32; 2]) {
        if index == 0 {
            self.m00 = v[0];
            self.m10 = v[1];
        } else {
            self.m01 = v[0];
            self.m11 = v[1];
        }
    }

    pub fn translation(&self) -> [f32; 2] {
        [self.tx, self.ty]
    }

    pub fn set_translation(&mut self, v: [f32; 2]) {
        self.tx = v[0];
        self.ty = v[1];
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Matrix2x2 {
    pub m00: f32,
    pub m01: f32,
    pub m10: f32,
    pub m11: f32,
}

impl Matrix2x2 {
    pub fn from_rotation(radians: f32) -> Matrix2x2 {
        let cos = radians.cos();
        let sin = radians.sin();
        Matrix2x2 {
            m00: cos,
            m01: -sin,
            m10: sin,
            m11: cos,
        }
    }

    pub fn mul(&self, rhs: &Matrix2x2) -> Matrix2x2 {
        Matrix2x2 {
            m00: self.m00 * rhs.m00 + self.m01 * rhs.m10,
            m01: self.m00 * rhs.m01 + self.m01 * rhs.m11,
            m10: self.m10 * rhs.m00 + self.m11 * rhs.m10,
            m11: self.m10 * rhs.m01 + self.m11 * rhs.m11,
        }
    }

    pub fn determinant(&self) -> f32 {
        self.m00 * self.m11 - self.m01 * self.m10
    }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Maps a degree value into `(-180, 180]`.
pub fn clamp_degrees(mut degrees: f32) -> f32 {
    degrees = degrees.rem_euclid(360.0);
    if degrees > 180.0 {
        degrees -= 360.0;
    }
    degrees
}

/// Maps a radian value into `(-PI, PI]` for single-wrap inputs.
pub fn clamp_radians(mut radians: f32) -> f32 {
    const PI: f32 = std::f32::consts::PI;
    const PI2: f32 = 2.0 * std::f32::consts::PI;
    if radians > PI {
        radians -= PI2;
    } else if radians < -PI {
        radians += PI2;
    }
    radians
}

/// Interpolates two angles along the short arc.
pub fn lerp_degrees(a: f32, b: f32, t: f32) -> f32 {
    a + clamp_degrees(b - a) * t
}
