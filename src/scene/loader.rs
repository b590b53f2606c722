//! JSON scene descriptions.
//!
//! A scene file lists named time samplings and objects with their channels:
//!
//! ```json
//! {
//!   "name": "shot",
//!   "time_samplings": { "anim": { "type": "acyclic", "times": [0.0, 0.5, 1.0] } },
//!   "objects": [
//!     { "path": "/geo", "kind": "xform",
//!       "xform": { "time_sampling": "anim",
//!                  "samples": [[{ "op": "translate", "values": [0, 0, 0] }]] } },
//!     { "path": "/geo/mesh", "kind": "polymesh", "topology": "homogeneous",
//!       "geometry": { "P": { "pod": "float32", "extent": 3, "time_sampling": "anim",
//!                            "samples": [[0, 0, 0, 1, 0, 0, 0, 1, 0]] } } }
//!   ]
//! }
//! ```
//!
//! Objects may appear in any order; parents are created before children.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use half::f16;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::MemoryArchive;
use crate::core::{ChannelGroup, NodeKind, RawSample, TimeSampling, TopologyVariance};
use crate::geom::{CameraSample, XformOp, XformSample};
use crate::util::{mat4_from_row_major, Error, PlainOldDataType, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SceneFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    time_samplings: BTreeMap<String, TimeSamplingDesc>,
    objects: Vec<ObjectDesc>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TimeSamplingDesc {
    Identity,
    Uniform {
        time_per_cycle: f64,
        #[serde(default)]
        start_time: f64,
    },
    Cyclic {
        time_per_cycle: f64,
        times: Vec<f64>,
    },
    Acyclic {
        times: Vec<f64>,
    },
}

impl TimeSamplingDesc {
    fn build(&self) -> TimeSampling {
        match self {
            Self::Identity => TimeSampling::IDENTITY,
            Self::Uniform {
                time_per_cycle,
                start_time,
            } => TimeSampling::uniform(*time_per_cycle, *start_time),
            Self::Cyclic {
                time_per_cycle,
                times,
            } => TimeSampling::cyclic(*time_per_cycle, times.clone()),
            Self::Acyclic { times } => TimeSampling::acyclic(times.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObjectDesc {
    path: String,
    kind: String,
    #[serde(default)]
    topology: Option<String>,
    #[serde(default)]
    geometry: BTreeMap<String, ChannelDesc>,
    #[serde(default)]
    arbitrary: BTreeMap<String, ChannelDesc>,
    #[serde(default)]
    user: BTreeMap<String, ChannelDesc>,
    #[serde(default)]
    properties: BTreeMap<String, ChannelDesc>,
    #[serde(default)]
    xform: Option<XformDesc>,
    #[serde(default)]
    camera: Option<CameraDesc>,
}

fn default_extent() -> usize {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChannelDesc {
    pod: PlainOldDataType,
    #[serde(default = "default_extent")]
    extent: usize,
    #[serde(default)]
    time_sampling: Option<String>,
    /// `"matrix"` reads each 16 float64 values as one row-major transform.
    #[serde(default)]
    interpretation: Option<String>,
    samples: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct XformDesc {
    #[serde(default)]
    time_sampling: Option<String>,
    #[serde(default = "default_true")]
    inherits: bool,
    samples: Vec<Vec<XformOp>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CameraDesc {
    #[serde(default)]
    time_sampling: Option<String>,
    samples: Vec<CameraSample>,
}

/// Load a scene file. The archive is named after the scene or the file stem.
pub fn load_file(path: impl AsRef<Path>) -> Result<MemoryArchive> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scene".to_string());
    load_str(&text, &stem)
}

/// Load a scene description from a string.
pub fn load_str(json: &str, default_name: &str) -> Result<MemoryArchive> {
    let scene: SceneFile = serde_json::from_str(json)?;
    build(scene, default_name)
}

fn build(scene: SceneFile, default_name: &str) -> Result<MemoryArchive> {
    let samplings: BTreeMap<String, Arc<TimeSampling>> = scene
        .time_samplings
        .iter()
        .map(|(name, desc)| (name.clone(), Arc::new(desc.build())))
        .collect();
    let lookup = |name: &Option<String>| -> Result<Option<Arc<TimeSampling>>> {
        match name {
            None => Ok(None),
            Some(n) => samplings
                .get(n)
                .cloned()
                .map(Some)
                .ok_or_else(|| Error::invalid(format!("unknown time sampling '{n}'"))),
        }
    };

    let mut archive = MemoryArchive::new(scene.name.as_deref().unwrap_or(default_name));

    let mut objects = scene.objects;
    objects.sort_by_key(|o| o.path.split('/').filter(|s| !s.is_empty()).count());

    for obj in &objects {
        let kind = NodeKind::from_str(&obj.kind);
        if kind == NodeKind::Unknown && !obj.kind.eq_ignore_ascii_case("unknown") {
            return Err(Error::invalid(format!("{}: unknown kind '{}'", obj.path, obj.kind)));
        }
        let node = archive.add_node(&obj.path, kind)?;

        if let Some(t) = &obj.topology {
            let variance = TopologyVariance::from_str(t)
                .ok_or_else(|| Error::invalid(format!("{}: unknown topology '{t}'", obj.path)))?;
            archive.set_topology_variance(node, variance)?;
        }

        let groups = [
            (ChannelGroup::Geometry, &obj.geometry),
            (ChannelGroup::Arbitrary, &obj.arbitrary),
            (ChannelGroup::User, &obj.user),
            (ChannelGroup::Object, &obj.properties),
        ];
        for (group, channels) in groups {
            for (name, desc) in channels {
                let samples = desc
                    .samples
                    .iter()
                    .map(|values| decode_sample(desc, values))
                    .collect::<Result<Vec<_>>>()
                    .map_err(|e| Error::invalid(format!("{}.{name}: {e}", obj.path)))?;
                archive.add_channel(node, group, name, lookup(&desc.time_sampling)?, samples)?;
            }
        }

        if let Some(x) = &obj.xform {
            if kind != NodeKind::Xform {
                return Err(Error::invalid(format!("{}: xform samples on a {kind}", obj.path)));
            }
            let samples = x
                .samples
                .iter()
                .map(|ops| XformSample::from_ops(ops.iter().cloned(), x.inherits))
                .collect();
            archive.set_xform(node, lookup(&x.time_sampling)?, samples)?;
        }

        if let Some(c) = &obj.camera {
            archive.set_camera(node, lookup(&c.time_sampling)?, c.samples.clone())?;
        }
    }

    debug!("loaded scene with {} objects", objects.len());
    Ok(archive)
}

fn number(v: &Value) -> Result<f64> {
    match v {
        Value::Number(n) => n.as_f64().ok_or_else(|| Error::invalid("number out of range")),
        Value::Bool(b) => Ok(*b as u8 as f64),
        other => Err(Error::invalid(format!("expected a number, got {other}"))),
    }
}

fn decode_sample(desc: &ChannelDesc, values: &[Value]) -> Result<RawSample> {
    let extent = desc.extent.max(1);
    if values.len() % extent != 0 {
        return Err(Error::ShapeMismatch {
            expected: format!("multiple of {extent} values"),
            actual: format!("{} values", values.len()),
        });
    }

    if desc.interpretation.as_deref() == Some("matrix") {
        let flat = values.iter().map(number).collect::<Result<Vec<_>>>()?;
        if flat.len() % 16 != 0 {
            return Err(Error::ShapeMismatch {
                expected: "16 values per matrix".into(),
                actual: format!("{} values", flat.len()),
            });
        }
        let matrices = flat
            .chunks_exact(16)
            .map(|c| {
                let mut m = [0.0; 16];
                m.copy_from_slice(c);
                mat4_from_row_major(&m)
            })
            .collect();
        return Ok(RawSample::from_matrices(matrices));
    }

    use PlainOldDataType as P;
    if desc.pod.is_string() {
        let strings = values
            .iter()
            .map(|v| match v {
                Value::String(s) => Ok(s.clone()),
                other => Err(Error::invalid(format!("expected a string, got {other}"))),
            })
            .collect::<Result<Vec<_>>>()?;
        let mut sample = RawSample::from_strings(strings);
        sample.extent = extent;
        sample.pod = desc.pod;
        return Ok(sample);
    }

    let mut bytes = Vec::with_capacity(values.len() * desc.pod.num_bytes());
    for v in values {
        let x = number(v)?;
        match desc.pod {
            P::Boolean => bytes.push((x != 0.0) as u8),
            P::Uint8 => bytes.push(x as u8),
            P::Int8 => bytes.extend_from_slice(&(x as i8).to_le_bytes()),
            P::Uint16 => bytes.extend_from_slice(&(x as u16).to_le_bytes()),
            P::Int16 => bytes.extend_from_slice(&(x as i16).to_le_bytes()),
            P::Uint32 => bytes.extend_from_slice(&(x as u32).to_le_bytes()),
            P::Int32 => bytes.extend_from_slice(&(x as i32).to_le_bytes()),
            P::Uint64 => bytes.extend_from_slice(&(x as u64).to_le_bytes()),
            P::Int64 => bytes.extend_from_slice(&(x as i64).to_le_bytes()),
            P::Float16 => bytes.extend_from_slice(&f16::from_f64(x).to_le_bytes()),
            P::Float32 => bytes.extend_from_slice(&(x as f32).to_le_bytes()),
            P::Float64 => bytes.extend_from_slice(&x.to_le_bytes()),
            P::String | P::Wstring | P::Unknown => {
                return Err(Error::invalid(format!("unsupported pod {}", desc.pod)))
            }
        }
    }
    RawSample::from_pod_bytes(desc.pod, extent, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ArchiveReader;
    use crate::util::StorageKind;

    const SCENE: &str = r#"{
        "name": "shot",
        "time_samplings": {
            "anim": { "type": "acyclic", "times": [0.0, 0.5, 1.0] },
            "fps": { "type": "uniform", "time_per_cycle": 1.0 }
        },
        "objects": [
            { "path": "/geo/mesh", "kind": "polymesh",
              "geometry": {
                  "P": { "pod": "float32", "extent": 3, "time_sampling": "anim",
                         "samples": [[0,0,0, 1,0,0, 0,1,0], [0,0,1, 1,0,1, 0,1,1], [0,0,2, 1,0,2, 0,1,2]] },
                  ".faceCounts": { "pod": "int32", "samples": [[3]] },
                  ".faceIndices": { "pod": "int32", "samples": [[0, 1, 2]] }
              },
              "arbitrary": { "tag": { "pod": "string", "samples": [["a"]] } },
              "properties": { "visible": { "pod": "int8", "time_sampling": "fps", "samples": [[1], [0]] } } },
            { "path": "/geo", "kind": "xform",
              "xform": { "time_sampling": "fps",
                         "samples": [[{ "op": "translate", "values": [0, 0, 0] }],
                                     [{ "op": "translate", "values": [2, 0, 0] }]] } },
            { "path": "/cam", "kind": "camera",
              "camera": { "samples": [{ "focal_length": 50.0 }] } }
        ]
    }"#;

    #[test]
    fn test_load_scene() {
        let a = load_str(SCENE, "fallback").unwrap();
        assert_eq!(a.name(), "shot");
        assert_eq!(a.num_nodes(), 4); // root + 3

        let mesh = a.lookup("/geo/mesh").unwrap();
        assert_eq!(a.node_kind(mesh).unwrap(), NodeKind::PolyMesh);
        assert_eq!(a.topology_variance(mesh).unwrap(), TopologyVariance::Homogeneous);

        let p = a.read_raw_sample(mesh, ChannelGroup::Geometry, "P", 2).unwrap();
        assert_eq!(p.num_entries(), 3);
        assert_eq!(p.as_f32().unwrap()[2], 2.0);

        let vis = a.read_raw_sample(mesh, ChannelGroup::Object, "visible", 1).unwrap();
        assert_eq!(vis.as_i32(), Some(&[0][..]));

        let tag = a.read_raw_sample(mesh, ChannelGroup::Arbitrary, "tag", 0).unwrap();
        assert_eq!(tag.storage_kind(), StorageKind::String);

        let geo = a.lookup("/geo").unwrap();
        assert_eq!(a.read_xform_sample(geo, 1).unwrap().translation().x, 2.0);

        let cam = a.lookup("/cam").unwrap();
        assert_eq!(a.read_camera_sample(cam, 0).unwrap().focal_length, 50.0);
        assert_eq!(a.time_range(), Some((0.0, 1.0)));
    }

    #[test]
    fn test_rejects_bad_scenes() {
        let unknown_ts = r#"{ "objects": [ { "path": "/m", "kind": "points",
            "geometry": { "P": { "pod": "float", "extent": 3, "time_sampling": "nope", "samples": [[0,0,0]] } } } ] }"#;
        assert!(matches!(load_str(unknown_ts, "x"), Err(Error::InvalidScene(_))));

        let ragged = r#"{ "objects": [ { "path": "/m", "kind": "points",
            "geometry": { "P": { "pod": "float", "extent": 3, "samples": [[0,0]] } } } ] }"#;
        assert!(matches!(load_str(ragged, "x"), Err(Error::InvalidScene(_))));

        let orphan = r#"{ "objects": [ { "path": "/a/b", "kind": "points" } ] }"#;
        assert!(matches!(load_str(orphan, "x"), Err(Error::NodeNotFound(_))));

        let bad_kind = r#"{ "objects": [ { "path": "/a", "kind": "teapot" } ] }"#;
        assert!(load_str(bad_kind, "x").is_err());

        assert!(matches!(load_str("{", "x"), Err(Error::Json(_))));
    }

    #[test]
    fn test_matrix_interpretation() {
        let scene = r#"{ "objects": [ { "path": "/m", "kind": "polymesh",
            "arbitrary": { "xf": { "pod": "float64", "extent": 16, "interpretation": "matrix",
                "samples": [[1,0,0,0, 0,1,0,0, 0,0,1,0, 5,6,7,1]] } } } ] }"#;
        let a = load_str(scene, "x").unwrap();
        let m = a.lookup("/m").unwrap();
        let s = a.read_raw_sample(m, ChannelGroup::Arbitrary, "xf", 0).unwrap();
        assert_eq!(s.as_matrices().unwrap()[0].w_axis.truncate().z, 7.0);
    }
}
