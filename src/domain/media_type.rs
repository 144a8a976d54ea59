use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Media type of a Work, detected by the processor that handled its
/// originating asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MediaType {
	Unknown,
	Movie,
	Epub,
	Audiobook,
	Comic,
	TvShow,
	Podcast,
	Music,
}

impl Default for MediaType {
	fn default() -> Self {
		MediaType::Unknown
	}
}
