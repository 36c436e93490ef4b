//! CPU cubemap images and direction lookups

use glam::{Vec2, Vec3, Vec4};

use crate::core::{Error, Result};

/// Largest accepted face resolution
pub const MAX_CAPTURE_RESOLUTION: u32 = 4096;

/// Cube face in the conventional +X, -X, +Y, -Y, +Z, -Z order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PosX = 0,
    NegX = 1,
    PosY = 2,
    NegY = 3,
    PosZ = 4,
    NegZ = 5,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PosX,
        CubeFace::NegX,
        CubeFace::PosY,
        CubeFace::NegY,
        CubeFace::PosZ,
        CubeFace::NegZ,
    ];

    /// Face hit by `dir` and the face coordinates in [0, 1]
    pub fn from_direction(dir: Vec3) -> (CubeFace, Vec2) {
        let a = dir.abs();
        let (face, sc, tc, ma) = if a.x >= a.y && a.x >= a.z {
            if dir.x >= 0.0 {
                (CubeFace::PosX, -dir.z, -dir.y, a.x)
            } else {
                (CubeFace::NegX, dir.z, -dir.y, a.x)
            }
        } else if a.y >= a.z {
            if dir.y >= 0.0 {
                (CubeFace::PosY, dir.x, dir.z, a.y)
            } else {
                (CubeFace::NegY, dir.x, -dir.z, a.y)
            }
        } else if dir.z >= 0.0 {
            (CubeFace::PosZ, dir.x, -dir.y, a.z)
        } else {
            (CubeFace::NegZ, -dir.x, -dir.y, a.z)
        };

        if ma <= 0.0 {
            return (CubeFace::PosX, Vec2::splat(0.5));
        }
        let uv = Vec2::new(sc / ma, tc / ma) * 0.5 + 0.5;
        (face, uv)
    }

    /// Unnormalized direction through face coordinates `uv` in [0, 1]
    pub fn direction(self, uv: Vec2) -> Vec3 {
        let sc = uv.x * 2.0 - 1.0;
        let tc = uv.y * 2.0 - 1.0;
        match self {
            CubeFace::PosX => Vec3::new(1.0, -tc, -sc),
            CubeFace::NegX => Vec3::new(-1.0, -tc, sc),
            CubeFace::PosY => Vec3::new(sc, 1.0, tc),
            CubeFace::NegY => Vec3::new(sc, -1.0, -tc),
            CubeFace::PosZ => Vec3::new(sc, -tc, 1.0),
            CubeFace::NegZ => Vec3::new(-sc, -tc, -1.0),
        }
    }
}

/// Six square RGBA32F faces
///
/// Texels start cleared to zero; alpha 0 in a world-position cubemap marks
/// background (sky).
#[derive(Clone, Debug)]
pub struct Cubemap {
    resolution: u32,
    texels: Vec<Vec4>,
}

impl Cubemap {
    /// Cleared cubemap with `resolution` x `resolution` texels per face.
    ///
    /// A resolution of 0 is raised to 1.
    pub fn new(resolution: u32) -> Result<Self> {
        let resolution = resolution.max(1);
        if resolution > MAX_CAPTURE_RESOLUTION {
            return Err(Error::CaptureResolution(resolution));
        }
        let res = resolution as usize;
        let count = res
            .checked_mul(res)
            .and_then(|n| n.checked_mul(6))
            .ok_or(Error::CaptureResolution(resolution))?;
        Ok(Self {
            resolution,
            texels: vec![Vec4::ZERO; count],
        })
    }

    /// Fill every texel from the normalized direction through its center
    pub fn from_fn(resolution: u32, mut f: impl FnMut(Vec3) -> Vec4) -> Result<Self> {
        let mut cubemap = Self::new(resolution)?;
        let res = cubemap.resolution;
        for face in CubeFace::ALL {
            for y in 0..res {
                for x in 0..res {
                    let dir = cubemap.texel_direction(face, x, y);
                    cubemap.set(face, x, y, f(dir));
                }
            }
        }
        Ok(cubemap)
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    #[inline]
    fn texel_index(&self, face: CubeFace, x: u32, y: u32) -> usize {
        let res = self.resolution as usize;
        face as usize * res * res + y as usize * res + x as usize
    }

    pub fn get(&self, face: CubeFace, x: u32, y: u32) -> Vec4 {
        self.texels[self.texel_index(face, x, y)]
    }

    pub fn set(&mut self, face: CubeFace, x: u32, y: u32, value: Vec4) {
        let i = self.texel_index(face, x, y);
        self.texels[i] = value;
    }

    /// Normalized direction through the center of a texel
    pub fn texel_direction(&self, face: CubeFace, x: u32, y: u32) -> Vec3 {
        let res = self.resolution as f32;
        let uv = Vec2::new((x as f32 + 0.5) / res, (y as f32 + 0.5) / res);
        face.direction(uv).normalize()
    }

    /// Nearest-texel lookup
    pub fn sample(&self, dir: Vec3) -> Vec4 {
        let (face, uv) = CubeFace::from_direction(dir);
        let max = self.resolution - 1;
        let x = ((uv.x * self.resolution as f32) as u32).min(max);
        let y = ((uv.y * self.resolution as f32) as u32).min(max);
        self.get(face, x, y)
    }
}
