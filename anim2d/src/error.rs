use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown parent bone '{parent}' for bone '{bone}'")]
    UnknownBoneParent { bone: String, parent: String },

    #[error("bone '{bone}' declared before its parent '{parent}'")]
    NonTopologicalBone { bone: String, parent: String },

    #[error("root bone '{bone}' must not have a parent")]
    RootBoneHasParent { bone: String },

    #[error("non-root bone '{bone}' must declare a parent")]
    MissingBoneParent { bone: String },

    #[error("duplicate id '{id}' for {kind}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("unknown bone '{bone}' referenced by slot '{slot}'")]
    UnknownSlotBone { slot: String, bone: String },

    #[error("unknown target bone '{target}' for {kind} constraint '{constraint}'")]
    UnknownConstraintTarget {
        kind: &'static str,
        constraint: String,
        target: String,
    },

    #[error("unknown target slot '{target}' for path constraint '{constraint}'")]
    UnknownPathConstraintTargetSlot { constraint: String, target: String },

    #[error("unknown bone '{bone}' in chain of {kind} constraint '{constraint}'")]
    UnknownConstraintBone {
        kind: &'static str,
        constraint: String,
        bone: String,
    },

    #[error("{kind} constraint '{constraint}' has an empty bone chain")]
    EmptyConstraintChain {
        kind: &'static str,
        constraint: String,
    },

    #[error("linked mesh '{attachment}' references unknown skin '{skin}'")]
    LinkedMeshUnknownSkin { attachment: String, skin: String },

    #[error("linked mesh '{attachment}' references slot '{slot}' absent from skin '{skin}'")]
    LinkedMeshUnknownSlot {
        attachment: String,
        skin: String,
        slot: String,
    },

    #[error("linked mesh '{attachment}' references parent '{parent}' absent from skin '{skin}', slot '{slot}'")]
    LinkedMeshUnknownParent {
        attachment: String,
        skin: String,
        slot: String,
        parent: String,
    },

    #[error("linked mesh '{attachment}' parent '{parent}' is not a mesh attachment")]
    LinkedMeshParentNotMesh { attachment: String, parent: String },

    #[error("unknown slot '{slot}' referenced by skin '{skin}'")]
    UnknownSkinSlot { skin: String, slot: String },

    #[error("path constraint '{constraint}' requires a default skin")]
    PathConstraintMissingDefaultSkin { constraint: String },

    #[error("path constraint '{constraint}' target slot '{slot}' carries no attachments")]
    PathConstraintNoAttachments { constraint: String, slot: String },

    #[error("path constraint target attachment '{attachment}' is not a path (constraint '{constraint}')")]
    PathConstraintNonPathAttachment {
        constraint: String,
        attachment: String,
    },

    #[error("invalid weighted vertex stream for attachment '{attachment}': {message}")]
    InvalidVertexStream { attachment: String, message: String },

    #[error("unknown clip: {name}")]
    UnknownClip { name: String },

    #[error("unknown {kind} constraint '{constraint}' referenced by clip '{clip}'")]
    UnknownClipConstraint {
        clip: String,
        kind: &'static str,
        constraint: String,
    },

    #[error("unknown slot '{slot}' referenced by clip '{clip}'")]
    UnknownClipSlot { clip: String, slot: String },

    #[error("unknown skin '{skin}' referenced by deform timeline in clip '{clip}'")]
    UnknownDeformSkin { clip: String, skin: String },

    #[error("unknown slot '{slot}' referenced by deform timeline in clip '{clip}', skin '{skin}'")]
    UnknownDeformSlot {
        clip: String,
        skin: String,
        slot: String,
    },

    #[error(
        "unknown attachment '{attachment}' referenced by deform timeline in clip '{clip}', skin '{skin}', slot '{slot}'"
    )]
    UnknownDeformAttachment {
        clip: String,
        skin: String,
        slot: String,
        attachment: String,
    },

    #[error(
        "deform timeline for '{attachment}' exceeds base vertices ({offset} + {len} > {base}) in clip '{clip}'"
    )]
    DeformVertexOverflow {
        clip: String,
        attachment: String,
        offset: usize,
        len: usize,
        base: usize,
    },

    #[error("deform timeline target '{attachment}' is not deformable")]
    DeformTargetNotDeformable { attachment: String },

    #[error("unknown slot '{slot}' referenced by draw order timeline in clip '{clip}'")]
    UnknownDrawOrderSlot { clip: String, slot: String },

    #[cfg(feature = "json")]
    #[error("failed to parse skeleton JSON: {message}")]
    JsonParse { message: String },
}
