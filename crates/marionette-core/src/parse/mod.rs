//! Project parsing.
//!
//! Two independent builders produce equivalent [`Project`]s from the two
//! export formats: [`scml`] drives a finite-state machine over the markup tag
//! stream, [`scon`] walks the JSON value tree. Both end by applying the same
//! default-inheritance fixups so a project round-trips identically through
//! either format.

pub mod scml;
pub mod scon;

use std::collections::HashMap;

use thiserror::Error;

use crate::data::{KeyPayload, Project, Vec2, DEFAULT_PIVOT};

pub use scml::parse_scml;
pub use scon::parse_scon;

#[derive(Debug, Error)]
pub enum ParseError {
    /// A tag appeared somewhere its parent does not allow. Terminal for the
    /// whole document; no partial model is returned.
    #[error("unexpected element <{tag}> at line {line} (inside <{parent}>)")]
    UnexpectedElement {
        tag: String,
        line: usize,
        parent: String,
    },
    #[error("malformed markup: {0}")]
    Markup(#[from] quick_xml::Error),
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing required document field `{0}`")]
    MissingDocumentField(&'static str),
    #[error("invalid document: {0}")]
    InvalidDocument(&'static str),
}

/// Applies the inheritance rules both builders share, after the raw tree is
/// assembled:
///
/// * each key's spin is copied into its payload, where the angle tween
///   reads it;
/// * an object payload still carrying the sentinel pivot takes the pivot of
///   the file it references;
/// * a bone payload takes its visual size from the entity object-info whose
///   name matches the timeline name.
pub(crate) fn apply_inherited_defaults(project: &mut Project) {
    let pivots: HashMap<(i32, i32), Vec2> = project
        .folders
        .iter()
        .flat_map(|folder| {
            folder
                .files
                .iter()
                .map(move |file| ((folder.id, file.id), file.pivot))
        })
        .collect();

    for entity in &mut project.entities {
        let sizes: HashMap<String, Vec2> = entity
            .object_infos
            .iter()
            .map(|info| (info.name.clone(), Vec2::new(info.width, info.height)))
            .collect();

        for animation in &mut entity.animations {
            for timeline in &mut animation.timelines {
                let size = sizes.get(&timeline.name).copied();
                for key in &mut timeline.keys {
                    let spin = key.spin;
                    match &mut key.payload {
                        KeyPayload::Bone(bone) => {
                            bone.spin = spin;
                            if let Some(size) = size {
                                bone.size = size;
                            }
                        }
                        KeyPayload::Object(object) => {
                            object.spin = spin;
                            if object.pivot == DEFAULT_PIVOT {
                                if let (Some(folder), Some(file)) = (object.folder, object.file) {
                                    if let Some(pivot) = pivots.get(&(folder, file)) {
                                        object.pivot = *pivot;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
