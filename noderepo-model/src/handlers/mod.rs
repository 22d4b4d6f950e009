//! Built-in node types.

mod default;
mod image;
mod post;
mod user;
mod youtube;

pub use default::DefaultHandler;
pub use image::{DOWNLOAD_CHANNEL, Image, ImageHandler, ImageMeta};
pub use post::{Post, PostHandler, PostMeta};
pub use user::{PasswordParams, User, UserHandler, UserMeta, hash_password, verify_password};
pub use youtube::{YOUTUBE_CHANNEL, Youtube, YoutubeHandler, YoutubeMeta};
