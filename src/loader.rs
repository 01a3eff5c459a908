//! Turning an asset path into [`RawGeometry`].

use nalgebra::Point3;
use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};

use crate::error::LoadError;
use crate::geometry::RawGeometry;

/// Fetches and decodes a named asset. The only place the viewer suspends.
#[allow(async_fn_in_trait)]
pub trait FileLoader {
    async fn load(&self, path: &str) -> Result<RawGeometry, LoadError>;
}

/// Fetches PLY files over HTTP from the page's origin.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpLoader;

#[cfg(target_arch = "wasm32")]
impl FileLoader for HttpLoader {
    async fn load(&self, path: &str) -> Result<RawGeometry, LoadError> {
        let network = |e: gloo_net::Error| LoadError::Network { path: path.to_owned(), reason: e.to_string() };
        let response = gloo_net::http::Request::get(path).send().await.map_err(network)?;
        if !response.ok() {
            return Err(LoadError::Status { path: path.to_owned(), status: response.status() });
        }
        let bytes = response.binary().await.map_err(network)?;
        log::debug!("fetched {path} ({} bytes)", bytes.len());
        decode_ply(path, &bytes)
    }
}

/// Decodes ASCII or binary PLY: vertex positions, optional `red/green/blue`
/// colours and optional `face` connectivity.
pub fn decode_ply(path: &str, bytes: &[u8]) -> Result<RawGeometry, LoadError> {
    let parser = Parser::<DefaultElement>::new();
    let mut source = bytes;
    let ply = parser
        .read_ply(&mut source)
        .map_err(|e| LoadError::Parse { path: path.to_owned(), reason: e.to_string() })?;

    let vertices = ply
        .payload
        .get("vertex")
        .ok_or_else(|| LoadError::MissingVertices { path: path.to_owned() })?;

    let mut points = Vec::with_capacity(vertices.len());
    for (i, v) in vertices.iter().enumerate() {
        let coord = |name: &str| {
            v.get(name).and_then(scalar).ok_or_else(|| LoadError::Parse {
                path: path.to_owned(),
                reason: format!("vertex {i} has no numeric '{name}'"),
            })
        };
        points.push(Point3::new(coord("x")?, coord("y")?, coord("z")?));
    }

    let colors = vertices
        .iter()
        .map(|v| {
            let channel = |name: &str| v.get(name).and_then(color_channel);
            Some([channel("red")?, channel("green")?, channel("blue")?])
        })
        .collect::<Option<Vec<_>>>()
        .filter(|c| !c.is_empty());

    let faces = ply
        .payload
        .get("face")
        .map(|faces| {
            faces
                .iter()
                .filter_map(|f| f.get("vertex_indices").or_else(|| f.get("vertex_index")))
                .filter_map(indices)
                .collect::<Vec<_>>()
        })
        .filter(|f| !f.is_empty());

    Ok(RawGeometry { points, colors, faces })
}

fn scalar(p: &Property) -> Option<f32> {
    Some(match *p {
        Property::Char(v) => v as f32,
        Property::UChar(v) => v as f32,
        Property::Short(v) => v as f32,
        Property::UShort(v) => v as f32,
        Property::Int(v) => v as f32,
        Property::UInt(v) => v as f32,
        Property::Float(v) => v,
        Property::Double(v) => v as f32,
        _ => return None,
    })
}

/// Integer channels are 0..=255; float channels are 0..=1 and get scaled.
fn color_channel(p: &Property) -> Option<u8> {
    let c = match *p {
        Property::Float(v) => v.clamp(0.0, 1.0) * 255.0,
        Property::Double(v) => v.clamp(0.0, 1.0) as f32 * 255.0,
        _ => scalar(p)?.clamp(0.0, 255.0),
    };
    Some(c.round() as u8)
}

/// Face index list; a face with a negative index is dropped.
fn indices(p: &Property) -> Option<Vec<u32>> {
    fn conv<T: Copy>(v: &[T]) -> Option<Vec<u32>>
    where
        u32: TryFrom<T>,
    {
        v.iter().map(|&i| u32::try_from(i).ok()).collect()
    }
    match p {
        Property::ListChar(v) => conv(v),
        Property::ListUChar(v) => conv(v),
        Property::ListShort(v) => conv(v),
        Property::ListUShort(v) => conv(v),
        Property::ListInt(v) => conv(v),
        Property::ListUInt(v) => conv(v),
        _ => None,
    }
}
