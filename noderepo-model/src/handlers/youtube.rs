use serde::{Deserialize, Serialize};
use serde_json::Value;

use noderepo_types::ProcessStatus;

use crate::handler::{decode_typed, encode, load_typed};
use crate::{HookContext, ModelResult, Node, NodeHandler};

const NODE_TYPE: &str = "media.youtube";

/// Channel on which video nodes request their oEmbed metadata be fetched.
/// The payload is the node reference.
pub const YOUTUBE_CHANNEL: &str = "media_youtube_update";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Youtube {
    /// YouTube video id.
    pub vid: String,
    pub status: ProcessStatus,
    pub error: String,
}

/// oEmbed answer for the video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeMeta {
    #[serde(rename = "type")]
    pub kind: String,
    pub html: String,
    pub width: u32,
    pub height: u32,
    pub version: String,
    pub title: String,
    pub provider_name: String,
    pub author_name: String,
    pub author_url: String,
    pub provider_url: String,
    pub thumbnail_url: String,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
}

/// YouTube video (`media.youtube`).
///
/// Same flow as images: a `vid` on a node still in `Init` moves it to
/// `Update`, and the post-hooks publish the reference on
/// [`YOUTUBE_CHANNEL`] while it stays there.
#[derive(Debug, Clone, Copy, Default)]
pub struct YoutubeHandler;

impl YoutubeHandler {
    fn decode(node: &Node) -> ModelResult<(Youtube, YoutubeMeta)> {
        decode_typed::<Youtube, YoutubeMeta>(NODE_TYPE, node.data.clone(), node.meta.clone())
    }

    fn flag_update(node: &mut Node) -> ModelResult<()> {
        let (mut data, _) = Self::decode(node)?;

        if !data.vid.is_empty() && data.status == ProcessStatus::Init {
            data.status = ProcessStatus::Update;
            node.data = encode(NODE_TYPE, &data)?;
        }
        Ok(())
    }

    fn request_update(node: &Node, ctx: &dyn HookContext) -> ModelResult<()> {
        let (data, _) = Self::decode(node)?;

        if !data.vid.is_empty() && data.status == ProcessStatus::Update {
            ctx.notify(YOUTUBE_CHANNEL, &node.reference.to_string())?;
        }
        Ok(())
    }
}

impl NodeHandler for YoutubeHandler {
    fn get_struct(&self) -> (Value, Value) {
        (
            encode(NODE_TYPE, &Youtube::default()).unwrap_or_default(),
            encode(NODE_TYPE, &YoutubeMeta::default()).unwrap_or_default(),
        )
    }

    fn load(&self, data: Value, meta: Value) -> ModelResult<(Value, Value)> {
        load_typed::<Youtube, YoutubeMeta>(NODE_TYPE, data, meta)
    }

    fn pre_insert(&self, node: &mut Node, _ctx: &dyn HookContext) -> ModelResult<()> {
        Self::flag_update(node)
    }

    fn pre_update(&self, node: &mut Node, _ctx: &dyn HookContext) -> ModelResult<()> {
        Self::flag_update(node)
    }

    fn post_insert(&self, node: &mut Node, ctx: &dyn HookContext) -> ModelResult<()> {
        Self::request_update(node, ctx)
    }

    fn post_update(&self, node: &mut Node, ctx: &dyn HookContext) -> ModelResult<()> {
        Self::request_update(node, ctx)
    }
}
