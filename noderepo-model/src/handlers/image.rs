use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use noderepo_types::ProcessStatus;

use crate::handler::{decode_typed, encode, load_typed};
use crate::{HookContext, ModelResult, Node, NodeHandler};

const NODE_TYPE: &str = "media.image";

/// Channel on which image nodes request their remote source be fetched.
/// The payload is the node reference.
pub const DOWNLOAD_CHANNEL: &str = "media_file_download";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Image {
    pub reference: String,
    pub name: String,
    pub source_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
    pub size: u64,
    pub content_type: String,
    pub length: u64,
    pub exif: BTreeMap<String, String>,
    pub hash: String,
    pub source_status: ProcessStatus,
    pub source_error: String,
}

/// Image (`media.image`).
///
/// Setting `source_url` on a node whose source is still `Init` flags it for
/// download; the post-hooks then publish the node reference on
/// [`DOWNLOAD_CHANNEL`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageHandler;

impl ImageHandler {
    fn flag_download(node: &mut Node) -> ModelResult<()> {
        let (data, mut meta) =
            decode_typed::<Image, ImageMeta>(NODE_TYPE, node.data.clone(), node.meta.clone())?;

        if !data.source_url.is_empty() && meta.source_status == ProcessStatus::Init {
            meta.source_status = ProcessStatus::Update;
            meta.source_error.clear();
            node.meta = encode(NODE_TYPE, &meta)?;
        }
        Ok(())
    }

    fn request_download(node: &Node, ctx: &dyn HookContext) -> ModelResult<()> {
        let (_, meta) =
            decode_typed::<Image, ImageMeta>(NODE_TYPE, node.data.clone(), node.meta.clone())?;

        if meta.source_status == ProcessStatus::Update {
            ctx.notify(DOWNLOAD_CHANNEL, &node.reference.to_string())?;
        }
        Ok(())
    }
}

impl NodeHandler for ImageHandler {
    fn get_struct(&self) -> (Value, Value) {
        (
            encode(NODE_TYPE, &Image::default()).unwrap_or_default(),
            encode(NODE_TYPE, &ImageMeta::default()).unwrap_or_default(),
        )
    }

    fn load(&self, data: Value, meta: Value) -> ModelResult<(Value, Value)> {
        load_typed::<Image, ImageMeta>(NODE_TYPE, data, meta)
    }

    fn pre_insert(&self, node: &mut Node, _ctx: &dyn HookContext) -> ModelResult<()> {
        Self::flag_download(node)
    }

    fn pre_update(&self, node: &mut Node, _ctx: &dyn HookContext) -> ModelResult<()> {
        Self::flag_download(node)
    }

    fn post_insert(&self, node: &mut Node, ctx: &dyn HookContext) -> ModelResult<()> {
        Self::request_download(node, ctx)
    }

    fn post_update(&self, node: &mut Node, ctx: &dyn HookContext) -> ModelResult<()> {
        Self::request_download(node, ctx)
    }
}
